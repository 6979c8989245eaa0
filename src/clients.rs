//! Collaborator Interfaces
//!
//! The social platform client and the reply generator are implemented
//! outside this crate; the pipeline only sees these traits.

use crate::mention::{Mention, MentionId, ReplyContext};
use async_trait::async_trait;

/// Error types for messaging platform operations
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Send failed: {0}")]
    Send(String),

    #[error("Malformed response: {0}")]
    Malformed(String),
}

/// Error types for the reply generation service
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("Moderation check failed: {0}")]
    Moderation(String),

    #[error("Generation failed: {0}")]
    Generation(String),
}

/// Social platform operations used by the pipeline
#[async_trait]
pub trait MessagingClient: Send + Sync {
    /// Fetch mentions newer than `since`; `None` fetches all available
    async fn get_mentions_since(
        &self,
        since: Option<&MentionId>,
    ) -> Result<Vec<Mention>, ClientError>;

    /// Post `text` as a reply to `mention_id`, returning the sent message id
    async fn reply(&self, mention_id: &MentionId, text: &str) -> Result<String, ClientError>;
}

/// Language generation + moderation service
#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    /// Produce reply text for a mention
    async fn generate_reply(&self, context: &ReplyContext) -> Result<String, GenerationError>;

    /// `true` when `text` is allowed
    async fn moderate_text(&self, text: &str) -> Result<bool, GenerationError>;
}
