//! Reply Rate Limiting
//!
//! Process-wide ceiling on sent replies per trailing window (sliding window
//! algorithm). The window lives in memory only, so a restart resets the
//! count.
//!
//! Usage: call [`ReplyRateLimiter::can_reply`] before attempting a reply and
//! [`ReplyRateLimiter::record_reply`] only once the reply is confirmed sent.
//! Denied or failed attempts never consume quota.

use crate::clock::{Clock, SystemClock};
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, warn};

/// Rate limiter configuration
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum sent replies per window
    pub max_replies: u32,
    /// Window length in seconds
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_replies: 30,   // 30 replies
            window_secs: 3600, // per hour
        }
    }
}

/// Rate limiter statistics
#[derive(Debug, Clone)]
pub struct RateLimitStats {
    pub replies_in_window: usize,
    pub remaining: u32,
    pub config: RateLimitConfig,
}

/// Sliding-window limiter over sent-reply timestamps
pub struct ReplyRateLimiter {
    config: RateLimitConfig,
    /// Sent-reply timestamps, oldest first
    window: Mutex<VecDeque<DateTime<Utc>>>,
    clock: Arc<dyn Clock>,
}

impl ReplyRateLimiter {
    pub fn new(config: RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            window: Mutex::new(VecDeque::new()),
            clock,
        }
    }

    /// Default config on the system clock
    pub fn with_defaults() -> Self {
        Self::new(RateLimitConfig::default(), Arc::new(SystemClock))
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// `None` when the window does not fit a `chrono::Duration`
    fn window_len(&self) -> Option<Duration> {
        i64::try_from(self.config.window_secs)
            .ok()
            .and_then(Duration::try_seconds)
    }

    /// Drop entries that fell out of the trailing window.
    /// A window reaching past the representable time range keeps everything.
    fn purge(&self, window: &mut VecDeque<DateTime<Utc>>, now: DateTime<Utc>) {
        let Some(cutoff) = self
            .window_len()
            .and_then(|len| now.checked_sub_signed(len))
        else {
            return;
        };
        while window.front().is_some_and(|&t| t <= cutoff) {
            window.pop_front();
        }
    }

    /// Purge expired entries, then report whether another reply fits under
    /// the ceiling. Does not record anything.
    pub fn can_reply(&self) -> bool {
        let now = self.clock.now();
        let mut window = self.window.lock();
        self.purge(&mut window, now);

        let allowed = window.len() < self.config.max_replies as usize;
        if allowed {
            debug!(
                "Reply allowed ({} of {} used)",
                window.len(),
                self.config.max_replies
            );
        } else {
            warn!(
                "Reply rate limit reached ({} replies in the last {}s)",
                window.len(),
                self.config.window_secs
            );
        }
        allowed
    }

    /// Record a confirmed sent reply at the current time
    pub fn record_reply(&self) {
        let now = self.clock.now();
        let mut window = self.window.lock();
        window.push_back(now);
    }

    /// Current stats (purges like `can_reply`)
    pub fn stats(&self) -> RateLimitStats {
        let now = self.clock.now();
        let mut window = self.window.lock();
        self.purge(&mut window, now);

        RateLimitStats {
            replies_in_window: window.len(),
            remaining: self.config.max_replies.saturating_sub(window.len() as u32),
            config: self.config.clone(),
        }
    }
}
