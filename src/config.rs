//! Configuration management

use crate::pipeline::PipelineConfig;
use crate::rate_limit::RateLimitConfig;
use anyhow::Result;
use std::path::PathBuf;
use std::time::Duration;

/// Longest accepted rate window (one year)
pub const MAX_RATE_WINDOW_SECS: u64 = 365 * 24 * 3600;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable with colors
    Text,
    /// One JSON object per line
    Json,
}

/// Bot configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite database path for watermark + interaction log
    pub db_path: PathBuf,

    /// Reply ceiling per rate window
    pub max_replies_per_hour: u32,

    /// Rate window length in seconds
    pub rate_window_secs: u64,

    /// Keywords for the reply filter hook
    pub reply_keywords: Vec<String>,

    /// Sleep between polling cycles in seconds
    pub poll_interval_secs: u64,

    /// Maximum characters per sent reply
    pub reply_max_chars: usize,

    /// Sentiment score at or below which a mention is flagged
    pub sentiment_alert_threshold: f64,

    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        let pipeline = PipelineConfig::default();
        let rate = RateLimitConfig::default();
        Self {
            db_path: PathBuf::from("data").join("bot.db"),
            max_replies_per_hour: rate.max_replies,
            rate_window_secs: rate.window_secs,
            reply_keywords: pipeline.reply_keywords,
            poll_interval_secs: 60,
            reply_max_chars: pipeline.reply_max_chars,
            sentiment_alert_threshold: pipeline.sentiment_alert_threshold,
            log_format: LogFormat::Text,
        }
    }
}

impl Config {
    /// Load configuration from `.env` (if present) and environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    /// Missing or unparsable values fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let db_path = lookup("MENTIONBOT_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.db_path);

        let max_replies_per_hour = lookup("MENTIONBOT_MAX_REPLIES_PER_HOUR")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(defaults.max_replies_per_hour);

        let rate_window_secs = lookup("MENTIONBOT_RATE_WINDOW_SECS")
            .and_then(|v| v.trim().parse().ok())
            .filter(|&secs: &u64| secs > 0 && secs <= MAX_RATE_WINDOW_SECS)
            .unwrap_or(defaults.rate_window_secs);

        let reply_keywords = lookup("MENTIONBOT_REPLY_KEYWORDS")
            .map(|v| {
                v.split(',')
                    .map(|k| k.trim().to_lowercase())
                    .filter(|k| !k.is_empty())
                    .collect()
            })
            .unwrap_or(defaults.reply_keywords);

        let poll_interval_secs = lookup("MENTIONBOT_POLL_INTERVAL_SECS")
            .and_then(|v| v.trim().parse().ok())
            .filter(|&secs: &u64| secs > 0)
            .unwrap_or(defaults.poll_interval_secs);

        let reply_max_chars = lookup("MENTIONBOT_REPLY_MAX_CHARS")
            .and_then(|v| v.trim().parse().ok())
            .filter(|&n: &usize| n > 0)
            .unwrap_or(defaults.reply_max_chars);

        let sentiment_alert_threshold = lookup("MENTIONBOT_SENTIMENT_ALERT_THRESHOLD")
            .and_then(|v| v.trim().parse().ok())
            .filter(|t: &f64| (-1.0..=1.0).contains(t))
            .unwrap_or(defaults.sentiment_alert_threshold);

        let log_format = lookup("MENTIONBOT_LOG_FORMAT")
            .map(|v| match v.trim().to_lowercase().as_str() {
                "json" => LogFormat::Json,
                _ => LogFormat::Text,
            })
            .unwrap_or(defaults.log_format);

        Ok(Self {
            db_path,
            max_replies_per_hour,
            rate_window_secs,
            reply_keywords,
            poll_interval_secs,
            reply_max_chars,
            sentiment_alert_threshold,
            log_format,
        })
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn rate_limit(&self) -> RateLimitConfig {
        RateLimitConfig {
            max_replies: self.max_replies_per_hour,
            window_secs: self.rate_window_secs,
        }
    }

    pub fn pipeline(&self) -> PipelineConfig {
        PipelineConfig {
            reply_keywords: self.reply_keywords.clone(),
            reply_max_chars: self.reply_max_chars,
            sentiment_alert_threshold: self.sentiment_alert_threshold,
        }
    }
}
