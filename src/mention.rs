//! Mention Data Model
//!
//! Inbound mentions, their authors, and the write-once interaction records
//! produced when we reply to one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Interaction kind recorded for replies produced by the mention pipeline
pub const INTERACTION_MENTION: &str = "mention";

/// Platform identifier of a mention.
///
/// Identifiers arrive string-encoded and may exceed any fixed-width integer,
/// so ordering compares them as unbounded non-negative integers: fewer
/// significant digits sort first, equal lengths compare digit by digit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MentionId(String);

/// Error returned when an identifier is not a decimal integer
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid mention id: {0:?}")]
pub struct InvalidMentionId(pub String);

impl MentionId {
    /// Parse a decimal identifier
    pub fn parse(raw: &str) -> Result<Self, InvalidMentionId> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(InvalidMentionId(raw.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Identifier as received
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Digits without leading zeros ("0" for zero)
    fn significant(&self) -> &str {
        let digits = self.0.trim_start_matches('0');
        if digits.is_empty() {
            "0"
        } else {
            digits
        }
    }
}

impl Ord for MentionId {
    fn cmp(&self, other: &Self) -> Ordering {
        let (a, b) = (self.significant(), other.significant());
        a.len().cmp(&b.len()).then_with(|| a.cmp(b))
    }
}

impl PartialOrd for MentionId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for MentionId {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for MentionId {}

impl fmt::Display for MentionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for MentionId {
    type Err = InvalidMentionId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Author of a mention
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Author {
    pub id: String,
    pub username: String,
    /// Free-text profile bio
    pub description: String,
    pub followers: u64,
}

/// A received notification that the account was referenced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mention {
    pub id: MentionId,
    pub text: String,
    pub author: Author,
}

impl Mention {
    pub fn new(id: MentionId, text: impl Into<String>, author: Author) -> Self {
        Self {
            id,
            text: text.into(),
            author,
        }
    }
}

/// Author profile passed to the reply generator
#[derive(Debug, Clone, Serialize)]
pub struct AuthorProfile {
    pub username: String,
    pub bio: String,
    pub followers: u64,
}

/// Generation context for a single reply
#[derive(Debug, Clone, Serialize)]
pub struct ReplyContext {
    pub text: String,
    pub profile: AuthorProfile,
    /// Sentiment label of the mention text
    pub sentiment: String,
}

impl ReplyContext {
    pub fn for_mention(mention: &Mention, sentiment_label: &str) -> Self {
        Self {
            text: mention.text.clone(),
            profile: AuthorProfile {
                username: mention.author.username.clone(),
                bio: mention.author.description.clone(),
                followers: mention.author.followers,
            },
            sentiment: sentiment_label.to_string(),
        }
    }
}

/// Append-only interaction log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub user_id: String,
    pub username: String,
    pub tweet_id: String,
    pub interaction_type: String,
    pub our_response: String,
    /// Compound sentiment score in [-1, 1]
    pub sentiment: f64,
    pub created_at: DateTime<Utc>,
}
