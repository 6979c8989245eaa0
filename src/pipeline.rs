//! Mention Pipeline
//!
//! Drives one polling cycle: read the watermark, fetch newer mentions,
//! handle them one at a time in ascending id order, and advance the
//! watermark after every mention whatever its outcome.
//!
//! ```text
//! watermark ──► fetch ──► sort/dedup ──► for each mention:
//!                                          eligible? ──► handle_mention
//!                                          advance watermark (always)
//! ```
//!
//! Delivery is at-most-once: a mention that fails is logged and never
//! retried. Only batch-level failures (fetch, watermark access) abort the
//! cycle, leaving the watermark where it was.

use crate::clients::{ClientError, GenerationError, MessagingClient, ReplyGenerator};
use crate::clock::Clock;
use crate::mention::{InteractionRecord, Mention, MentionId, ReplyContext, INTERACTION_MENTION};
use crate::rate_limit::ReplyRateLimiter;
use crate::runner::panic_message;
use crate::sentiment;
use crate::store::{Store, StoreError, MENTIONS_SINCE_ID};
use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Keywords for the (currently inactive) reply filter
    pub reply_keywords: Vec<String>,
    /// Sent replies are cut to this many characters
    pub reply_max_chars: usize,
    /// Mentions scoring at or below this log a sentiment alert
    pub sentiment_alert_threshold: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            reply_keywords: ["pricing", "cost", "hire", "available"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            reply_max_chars: 270,
            sentiment_alert_threshold: -0.5,
        }
    }
}

/// Result of handling one mention that did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MentionOutcome {
    /// Reply sent and logged
    Replied { reply_id: String },
    /// Not eligible for an auto-reply
    Ineligible,
    /// Moderation disallowed the text
    ModerationRejected,
    /// Hourly reply ceiling reached
    RateLimited,
}

/// Per-mention hard failure. The batch continues past it.
#[derive(Debug, thiserror::Error)]
pub enum MentionError {
    #[error("Moderation failed: {0}")]
    Moderation(#[source] GenerationError),

    #[error("Reply generation failed: {0}")]
    Generation(#[source] GenerationError),

    #[error("Sending reply failed: {0}")]
    Send(#[source] ClientError),

    #[error("Reply {reply_id} sent but not logged: {source}")]
    LogWrite {
        reply_id: String,
        #[source]
        source: StoreError,
    },

    #[error("Handler panicked: {0}")]
    Panicked(String),
}

/// Batch-level failure. The cycle aborts and is retried next time.
#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    #[error("Fetching mentions failed: {0}")]
    Fetch(#[source] ClientError),

    #[error("Reading watermark failed: {0}")]
    WatermarkRead(#[source] StoreError),

    #[error("Advancing watermark to {mention_id} failed: {source}")]
    WatermarkWrite {
        mention_id: MentionId,
        #[source]
        source: StoreError,
    },
}

/// Summary of one polling cycle
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    /// Mentions returned by the fetch
    pub fetched: usize,
    /// Mentions dropped as stale (≤ watermark) or duplicate
    pub dropped: usize,
    pub replied: usize,
    pub ineligible: usize,
    pub moderated: usize,
    pub rate_limited: usize,
    pub failed: usize,
    /// Watermark after the cycle
    pub watermark: Option<MentionId>,
    /// Stopped early on shutdown
    pub interrupted: bool,
}

impl CycleReport {
    /// Mentions whose watermark was committed this cycle
    pub fn processed(&self) -> usize {
        self.replied + self.ineligible + self.moderated + self.rate_limited + self.failed
    }

    fn tally(&mut self, result: &Result<MentionOutcome, MentionError>) {
        match result {
            Ok(MentionOutcome::Replied { .. }) => self.replied += 1,
            Ok(MentionOutcome::Ineligible) => self.ineligible += 1,
            Ok(MentionOutcome::ModerationRejected) => self.moderated += 1,
            Ok(MentionOutcome::RateLimited) => self.rate_limited += 1,
            Err(_) => self.failed += 1,
        }
    }
}

/// Reply eligibility. Every non-empty mention gets a reply; the keyword
/// filter is available through [`matches_reply_keywords`] but not applied.
pub fn should_reply(text: &str) -> bool {
    !text.is_empty()
}

/// Case-insensitive substring match against the reply keywords
pub fn matches_reply_keywords(text: &str, keywords: &[String]) -> bool {
    let lowered = text.to_lowercase();
    keywords
        .iter()
        .filter(|k| !k.is_empty())
        .any(|k| lowered.contains(&k.to_lowercase()))
}

/// Cut `text` to at most `max_chars` characters (not bytes)
pub fn truncate_reply(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}

/// Mention polling and auto-reply orchestrator
pub struct MentionPipeline {
    client: Arc<dyn MessagingClient>,
    generator: Arc<dyn ReplyGenerator>,
    store: Arc<dyn Store>,
    limiter: Arc<ReplyRateLimiter>,
    clock: Arc<dyn Clock>,
    config: PipelineConfig,
}

impl MentionPipeline {
    pub fn new(
        client: Arc<dyn MessagingClient>,
        generator: Arc<dyn ReplyGenerator>,
        store: Arc<dyn Store>,
        limiter: Arc<ReplyRateLimiter>,
        clock: Arc<dyn Clock>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            client,
            generator,
            store,
            limiter,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn rate_limiter(&self) -> &Arc<ReplyRateLimiter> {
        &self.limiter
    }

    /// Committed watermark, if any
    pub fn watermark(&self) -> Result<Option<MentionId>, StoreError> {
        let Some(raw) = self.store.get_state(MENTIONS_SINCE_ID)? else {
            return Ok(None);
        };
        MentionId::parse(&raw)
            .map(Some)
            .map_err(|_| StoreError::InvalidValue {
                key: MENTIONS_SINCE_ID.to_string(),
                value: raw,
            })
    }

    fn advance_watermark(&self, id: &MentionId) -> Result<(), CycleError> {
        self.store
            .set_state(MENTIONS_SINCE_ID, id.as_str())
            .map_err(|source| CycleError::WatermarkWrite {
                mention_id: id.clone(),
                source,
            })?;
        debug!("Watermark advanced to {}", id);
        Ok(())
    }

    /// Run a single polling cycle to completion
    pub async fn poll_and_reply_once(&self) -> Result<CycleReport, CycleError> {
        let (_tx, shutdown) = watch::channel(false);
        self.poll_and_reply(&shutdown).await
    }

    /// Run a single polling cycle, stopping between mentions once
    /// `shutdown` reads `true`
    pub async fn poll_and_reply(
        &self,
        shutdown: &watch::Receiver<bool>,
    ) -> Result<CycleReport, CycleError> {
        let since = self.watermark().map_err(CycleError::WatermarkRead)?;

        let mut mentions = self
            .client
            .get_mentions_since(since.as_ref())
            .await
            .map_err(CycleError::Fetch)?;

        let mut report = CycleReport {
            fetched: mentions.len(),
            watermark: since.clone(),
            ..Default::default()
        };

        if mentions.is_empty() {
            debug!("No new mentions");
            return Ok(report);
        }

        mentions.sort_by(|a, b| a.id.cmp(&b.id));
        mentions.dedup_by(|a, b| a.id == b.id);
        if let Some(w) = &since {
            mentions.retain(|m| m.id > *w);
        }
        report.dropped = report.fetched - mentions.len();
        if report.dropped > 0 {
            warn!(
                "Dropped {} stale or duplicate mentions (watermark {:?})",
                report.dropped,
                since.as_ref().map(|w| w.as_str())
            );
        }

        info!("Processing {} new mentions", mentions.len());

        for mention in &mentions {
            if *shutdown.borrow() {
                info!("Shutdown requested, stopping before mention {}", mention.id);
                report.interrupted = true;
                break;
            }

            let result = match AssertUnwindSafe(self.process_mention(mention))
                .catch_unwind()
                .await
            {
                Ok(result) => result,
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    error!("Handling mention {} panicked: {}", mention.id, message);
                    Err(MentionError::Panicked(message))
                }
            };
            report.tally(&result);

            // Postcondition: watermark covers this mention whatever happened
            self.advance_watermark(&mention.id)?;
            report.watermark = Some(mention.id.clone());
        }

        info!(
            "Cycle done: {} replied, {} moderated, {} rate limited, {} failed, {} ineligible",
            report.replied, report.moderated, report.rate_limited, report.failed, report.ineligible
        );
        Ok(report)
    }

    async fn process_mention(&self, mention: &Mention) -> Result<MentionOutcome, MentionError> {
        if !should_reply(&mention.text) {
            debug!("Mention {} not eligible for reply", mention.id);
            return Ok(MentionOutcome::Ineligible);
        }

        if matches_reply_keywords(&mention.text, &self.config.reply_keywords) {
            debug!("Mention {} matches reply keywords", mention.id);
        }

        let result = self.handle_mention(mention).await;
        if let Err(e) = &result {
            error!("Failed to handle mention {}: {}", mention.id, e);
        }
        result
    }

    /// Turn one eligible mention into a sent reply and a log entry
    pub async fn handle_mention(&self, mention: &Mention) -> Result<MentionOutcome, MentionError> {
        let allowed = self
            .generator
            .moderate_text(&mention.text)
            .await
            .map_err(MentionError::Moderation)?;
        if !allowed {
            info!("Skipping reply to mention {} due to moderation", mention.id);
            return Ok(MentionOutcome::ModerationRejected);
        }

        if !self.limiter.can_reply() {
            warn!("Skipping reply to mention {}: hourly reply limit reached", mention.id);
            return Ok(MentionOutcome::RateLimited);
        }

        let sentiment = sentiment::classify(&mention.text);
        if sentiment.score <= self.config.sentiment_alert_threshold {
            warn!(
                "Negative sentiment alert: mention {} from @{} scored {:.3}",
                mention.id, mention.author.username, sentiment.score
            );
        }

        let context = ReplyContext::for_mention(mention, sentiment.label.as_str());
        let reply = self
            .generator
            .generate_reply(&context)
            .await
            .map_err(MentionError::Generation)?;

        let text = truncate_reply(&reply, self.config.reply_max_chars);
        let reply_id = self
            .client
            .reply(&mention.id, &text)
            .await
            .map_err(MentionError::Send)?;

        let record = InteractionRecord {
            user_id: mention.author.id.clone(),
            username: mention.author.username.clone(),
            tweet_id: mention.id.to_string(),
            interaction_type: INTERACTION_MENTION.to_string(),
            our_response: reply,
            sentiment: sentiment.score,
            created_at: self.clock.now(),
        };
        self.store
            .log_interaction(&record)
            .map_err(|source| MentionError::LogWrite {
                reply_id: reply_id.clone(),
                source,
            })?;

        self.limiter.record_reply();

        info!("Replied to mention {} with {}", mention.id, reply_id);
        Ok(MentionOutcome::Replied { reply_id })
    }
}
