//! Polling Loop
//!
//! Runs the mention pipeline forever: one cycle, then a fixed sleep.
//! A cycle that errors or panics is logged and the loop carries on after
//! the usual sleep; the process never exits on a runtime fault.
//!
//! Shutdown is cooperative through a `watch` flag. The pipeline checks it
//! between mentions, so a stop lands after the current mention's handling
//! and watermark write, never mid-handler.

use crate::pipeline::{CycleReport, MentionPipeline};
use futures_util::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Counters over the lifetime of a loop
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    pub cycles: u64,
    pub failed_cycles: u64,
    pub replies_sent: u64,
}

/// Outer control loop around a [`MentionPipeline`]
pub struct Runner {
    pipeline: Arc<MentionPipeline>,
    poll_interval: Duration,
}

impl Runner {
    pub fn new(pipeline: Arc<MentionPipeline>, poll_interval: Duration) -> Self {
        Self {
            pipeline,
            poll_interval,
        }
    }

    /// Run one cycle, containing errors and panics.
    /// Returns `None` when the cycle did not complete.
    pub async fn run_cycle(&self, shutdown: &watch::Receiver<bool>) -> Option<CycleReport> {
        let cycle = AssertUnwindSafe(self.pipeline.poll_and_reply(shutdown)).catch_unwind();
        match cycle.await {
            Ok(Ok(report)) => Some(report),
            Ok(Err(e)) => {
                error!("Polling cycle aborted: {}", e);
                None
            }
            Err(panic) => {
                error!("Polling cycle panicked: {}", panic_message(panic.as_ref()));
                None
            }
        }
    }

    /// Loop until `shutdown` reads `true`
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> RunStats {
        info!("Starting mention loop (polling every {:?})", self.poll_interval);
        let mut stats = RunStats::default();

        loop {
            if *shutdown.borrow() {
                break;
            }

            stats.cycles += 1;
            match self.run_cycle(&shutdown).await {
                Some(report) => stats.replies_sent += report.replied as u64,
                None => stats.failed_cycles += 1,
            }

            if self.sleep_or_shutdown(&mut shutdown).await {
                break;
            }
        }

        info!(
            "Mention loop stopped after {} cycles ({} failed, {} replies)",
            stats.cycles, stats.failed_cycles, stats.replies_sent
        );
        stats
    }

    /// Sleep for the poll interval. Returns `true` if shutdown was requested.
    async fn sleep_or_shutdown(&self, shutdown: &mut watch::Receiver<bool>) -> bool {
        let sleep = tokio::time::sleep(self.poll_interval);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                _ = &mut sleep => return *shutdown.borrow(),
                changed = shutdown.changed() => match changed {
                    Ok(()) if *shutdown.borrow() => return true,
                    Ok(()) => continue,
                    Err(_) => {
                        // Sender gone: nobody can request shutdown anymore
                        (&mut sleep).await;
                        return false;
                    }
                },
            }
        }
    }
}

/// Spawn a task that flips `shutdown` on Ctrl-C or SIGTERM
pub fn spawn_signal_listener(shutdown: watch::Sender<bool>) -> JoinHandle<()> {
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("Shutting down gracefully...");
        let _ = shutdown.send(true);
    })
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = term.recv() => {}
            }
        }
        Err(e) => {
            warn!("SIGTERM handler unavailable: {}", e);
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
