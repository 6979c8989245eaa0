//! Sentiment Classifier
//!
//! Maps free text to a compound polarity score in [-1, 1] (VADER lexicon)
//! and a coarse label. Pure and infallible.

use serde::{Deserialize, Serialize};
use std::fmt;
use vader_sentiment::SentimentIntensityAnalyzer;

/// Scores at or above this are positive
pub const POSITIVE_THRESHOLD: f64 = 0.05;

/// Scores at or below this are negative
pub const NEGATIVE_THRESHOLD: f64 = -0.05;

/// Coarse polarity label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Neutral,
    Negative,
}

impl SentimentLabel {
    /// Label for a compound score
    pub fn from_score(score: f64) -> Self {
        if score >= POSITIVE_THRESHOLD {
            SentimentLabel::Positive
        } else if score <= NEGATIVE_THRESHOLD {
            SentimentLabel::Negative
        } else {
            SentimentLabel::Neutral
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentLabel::Positive => "positive",
            SentimentLabel::Neutral => "neutral",
            SentimentLabel::Negative => "negative",
        }
    }
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification result
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Sentiment {
    pub label: SentimentLabel,
    pub score: f64,
}

/// Classify text. Empty or whitespace-only text is neutral with score 0.0.
pub fn classify(text: &str) -> Sentiment {
    let score = compound_score(text);
    Sentiment {
        label: SentimentLabel::from_score(score),
        score,
    }
}

fn compound_score(text: &str) -> f64 {
    if text.trim().is_empty() {
        return 0.0;
    }

    let analyzer = SentimentIntensityAnalyzer::new();
    let scores = analyzer.polarity_scores(text);
    scores
        .get("compound")
        .copied()
        .filter(|s| s.is_finite())
        .map(|s| s.clamp(-1.0, 1.0))
        .unwrap_or(0.0)
}
