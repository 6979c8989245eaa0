//! Mention Bot
//!
//! Unattended engagement agent: polls an account's mentions, decides whether
//! to answer, generates a reply, and records every interaction durably.
//!
//! # Features
//!
//! - **Watermark cursor**: resumable, monotonic `mentions_since_id` in SQLite
//! - **Failure isolation**: one bad mention never halts the batch
//! - **Moderation gate**: disallowed text is skipped before generation
//! - **Rate limiting**: sliding 60-minute ceiling on sent replies
//! - **Sentiment**: VADER compound score + label per mention
//!
//! # Architecture
//!
//! ```text
//! Runner ──► MentionPipeline ──► MessagingClient (fetch / reply)
//!   (loop)        │
//!                 ├── ReplyGenerator (moderate / generate)
//!                 ├── ReplyRateLimiter (in-memory window)
//!                 ├── sentiment::classify
//!                 └── Store (watermark + interaction log)
//! ```

pub mod clients;
pub mod clock;
pub mod config;
pub mod logging;
pub mod mention;
pub mod pipeline;
pub mod rate_limit;
pub mod runner;
pub mod sentiment;
pub mod store;

pub use clients::{ClientError, GenerationError, MessagingClient, ReplyGenerator};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Config, LogFormat};
pub use mention::{Author, InteractionRecord, Mention, MentionId, ReplyContext};
pub use pipeline::{
    matches_reply_keywords, should_reply, truncate_reply, CycleError, CycleReport, MentionError,
    MentionOutcome, MentionPipeline, PipelineConfig,
};
pub use rate_limit::{RateLimitConfig, RateLimitStats, ReplyRateLimiter};
pub use runner::{spawn_signal_listener, RunStats, Runner};
pub use sentiment::{classify, Sentiment, SentimentLabel};
pub use store::{SqliteStore, Store, StoreError, MENTIONS_SINCE_ID};
