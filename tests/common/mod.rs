//! Shared fakes for pipeline and runner tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use mentionbot::{
    Author, ClientError, Clock, GenerationError, InteractionRecord, ManualClock, Mention,
    MentionId, MentionPipeline, MessagingClient, PipelineConfig, RateLimitConfig, ReplyContext,
    ReplyGenerator, ReplyRateLimiter, SqliteStore, Store, StoreError,
};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::watch;

pub fn id(s: &str) -> MentionId {
    MentionId::parse(s).expect("valid id")
}

pub fn mention(mention_id: &str, text: &str) -> Mention {
    Mention::new(
        id(mention_id),
        text,
        Author {
            id: format!("user-{}", mention_id),
            username: format!("fan{}", mention_id),
            description: "indie dev".to_string(),
            followers: 250,
        },
    )
}

/// How the fake platform fails a fetch
#[derive(Debug, Clone, Copy)]
pub enum FetchFailure {
    Transport,
    Auth,
    Panic,
}

/// In-memory social platform
#[derive(Default)]
pub struct FakeClient {
    pub mentions: Mutex<Vec<Mention>>,
    /// Return every mention, ignoring `since`
    pub ignore_since: AtomicBool,
    pub fetch_failure: Mutex<Option<FetchFailure>>,
    pub fetch_calls: Mutex<Vec<Option<MentionId>>>,
    pub fail_send_for: Mutex<HashSet<String>>,
    pub sent: Mutex<Vec<(MentionId, String)>>,
    next_reply_id: AtomicUsize,
}

impl FakeClient {
    pub fn with_mentions(mentions: Vec<Mention>) -> Self {
        let client = Self::default();
        *client.mentions.lock() = mentions;
        client
    }

    pub fn push(&self, m: Mention) {
        self.mentions.lock().push(m);
    }

    pub fn sent_ids(&self) -> Vec<String> {
        self.sent.lock().iter().map(|(m, _)| m.to_string()).collect()
    }
}

#[async_trait]
impl MessagingClient for FakeClient {
    async fn get_mentions_since(
        &self,
        since: Option<&MentionId>,
    ) -> Result<Vec<Mention>, ClientError> {
        self.fetch_calls.lock().push(since.cloned());

        let failure = *self.fetch_failure.lock();
        match failure {
            Some(FetchFailure::Transport) => {
                return Err(ClientError::Transport("connection reset".into()))
            }
            Some(FetchFailure::Auth) => return Err(ClientError::Auth("token expired".into())),
            Some(FetchFailure::Panic) => panic!("platform client bug"),
            None => {}
        }

        let ignore_since = self.ignore_since.load(Ordering::SeqCst);
        let mentions = self
            .mentions
            .lock()
            .iter()
            .filter(|m| ignore_since || since.map_or(true, |s| m.id > *s))
            .cloned()
            .collect();
        Ok(mentions)
    }

    async fn reply(&self, mention_id: &MentionId, text: &str) -> Result<String, ClientError> {
        if self.fail_send_for.lock().contains(mention_id.as_str()) {
            return Err(ClientError::Send("duplicate content".into()));
        }
        self.sent.lock().push((mention_id.clone(), text.to_string()));
        let n = self.next_reply_id.fetch_add(1, Ordering::SeqCst);
        Ok(format!("reply-{}", 9000 + n))
    }
}

/// Scripted generation + moderation service
#[derive(Default)]
pub struct FakeGenerator {
    /// Texts containing any of these are disallowed
    pub blocked_words: Mutex<Vec<String>>,
    /// Texts containing any of these make moderation itself fail
    pub moderation_errors: Mutex<Vec<String>>,
    /// Texts containing any of these make generation fail
    pub generation_errors: Mutex<Vec<String>>,
    /// Texts containing any of these make generation panic
    pub panic_words: Mutex<Vec<String>>,
    /// Fixed reply text, otherwise a greeting
    pub fixed_reply: Mutex<Option<String>>,
    /// Flipped to `true` on the first generation
    pub shutdown_trigger: Mutex<Option<watch::Sender<bool>>>,
    pub moderated: Mutex<Vec<String>>,
    pub contexts: Mutex<Vec<ReplyContext>>,
}

fn contains_any(text: &str, words: &[String]) -> bool {
    words.iter().any(|w| text.contains(w.as_str()))
}

#[async_trait]
impl ReplyGenerator for FakeGenerator {
    async fn generate_reply(&self, context: &ReplyContext) -> Result<String, GenerationError> {
        self.contexts.lock().push(context.clone());

        if let Some(tx) = self.shutdown_trigger.lock().take() {
            let _ = tx.send(true);
        }

        if contains_any(&context.text, &self.panic_words.lock()) {
            panic!("generator bug on {:?}", context.text);
        }

        if contains_any(&context.text, &self.generation_errors.lock()) {
            return Err(GenerationError::Generation("model overloaded".into()));
        }

        Ok(self
            .fixed_reply
            .lock()
            .clone()
            .unwrap_or_else(|| format!("Thanks @{}!", context.profile.username)))
    }

    async fn moderate_text(&self, text: &str) -> Result<bool, GenerationError> {
        self.moderated.lock().push(text.to_string());

        if contains_any(text, &self.moderation_errors.lock()) {
            return Err(GenerationError::Moderation("moderation timeout".into()));
        }
        Ok(!contains_any(text, &self.blocked_words.lock()))
    }
}

/// SQLite store with injectable write failures
pub struct FlakyStore {
    pub inner: SqliteStore,
    pub fail_log: AtomicBool,
    pub fail_state_write: AtomicBool,
}

impl FlakyStore {
    pub fn new(inner: SqliteStore) -> Self {
        Self {
            inner,
            fail_log: AtomicBool::new(false),
            fail_state_write: AtomicBool::new(false),
        }
    }
}

fn injected() -> StoreError {
    StoreError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk full"))
}

impl Store for FlakyStore {
    fn get_state(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.inner.get_state(key)
    }

    fn set_state(&self, key: &str, value: &str) -> Result<(), StoreError> {
        if self.fail_state_write.load(Ordering::SeqCst) {
            return Err(injected());
        }
        self.inner.set_state(key, value)
    }

    fn log_interaction(&self, record: &InteractionRecord) -> Result<(), StoreError> {
        if self.fail_log.load(Ordering::SeqCst) {
            return Err(injected());
        }
        self.inner.log_interaction(record)
    }
}

/// Pipeline wired to fakes and a temp SQLite database
pub struct Harness {
    pub dir: TempDir,
    pub client: Arc<FakeClient>,
    pub generator: Arc<FakeGenerator>,
    pub store: Arc<FlakyStore>,
    pub limiter: Arc<ReplyRateLimiter>,
    pub clock: Arc<ManualClock>,
    pub pipeline: Arc<MentionPipeline>,
}

impl Harness {
    pub fn new(mentions: Vec<Mention>) -> Self {
        Self::with_limit(mentions, RateLimitConfig::default())
    }

    pub fn with_limit(mentions: Vec<Mention>, rate: RateLimitConfig) -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        Self::in_dir(dir, mentions, rate)
    }

    /// Build against an existing directory (simulates a restart)
    pub fn in_dir(dir: TempDir, mentions: Vec<Mention>, rate: RateLimitConfig) -> Self {
        let store = SqliteStore::open(&dir.path().join("bot.db")).expect("Failed to open store");
        let store = Arc::new(FlakyStore::new(store));
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap(),
        ));
        let limiter = Arc::new(ReplyRateLimiter::new(rate, clock.clone()));
        let client = Arc::new(FakeClient::with_mentions(mentions));
        let generator = Arc::new(FakeGenerator::default());

        let pipeline = Arc::new(MentionPipeline::new(
            client.clone(),
            generator.clone(),
            store.clone(),
            limiter.clone(),
            clock.clone() as Arc<dyn Clock>,
            PipelineConfig::default(),
        ));

        Self {
            dir,
            client,
            generator,
            store,
            limiter,
            clock,
            pipeline,
        }
    }

    pub fn watermark(&self) -> Option<String> {
        self.pipeline
            .watermark()
            .expect("watermark readable")
            .map(|w| w.to_string())
    }

    pub fn logged(&self) -> Vec<InteractionRecord> {
        let mut records = self.store.inner.recent_interactions(1000).expect("readable log");
        records.reverse();
        records
    }
}
