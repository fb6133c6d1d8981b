//! Generic poller runner and control surface.
//!
//! The runner owns the interval timer, the rate-limit backoff and the
//! source-state snapshot; the `PollSource` implementation owns the
//! provider call and the dedup/cursor logic.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use argus_core::NotificationDraft;
use argus_persistence::SnapshotFile;
use argus_telemetry::metrics::{POLLER_BACKOFF_MULTIPLIER, POLL_CYCLES_TOTAL};

use crate::error::{PollerError, Result};
use crate::source_state::SourceState;

/// A pollable source.
pub trait PollSource: Send + 'static {
    /// Stable source name (snapshot key, metrics label, API path).
    fn name(&self) -> &'static str;

    /// One poll cycle: fetch, filter the ring, update cursors, return new
    /// drafts. Cursor updates only happen on non-empty responses; the
    /// runner stamps `last_poll_at` either way.
    fn poll(
        &mut self,
        state: &mut SourceState,
    ) -> impl std::future::Future<Output = Result<Vec<NotificationDraft>>> + Send;
}

/// Runner configuration.
#[derive(Debug, Clone)]
pub struct PollerRuntimeConfig {
    /// Nominal polling interval.
    pub interval: Duration,
    /// Upper bound for the rate-limit interval multiplier.
    pub backoff_cap: u32,
    /// Start paused instead of running.
    pub start_stopped: bool,
}

impl Default for PollerRuntimeConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300),
            backoff_cap: 10,
            start_stopped: false,
        }
    }
}

/// Control commands for a poller task.
enum PollerCommand {
    Start,
    Stop,
    /// Poll now, regardless of the interval.
    Kick,
    Status {
        reply: oneshot::Sender<PollerStatus>,
    },
    Shutdown,
}

/// Poller status exposed over the API.
#[derive(Debug, Clone, Serialize)]
pub struct PollerStatus {
    pub name: String,
    pub running: bool,
    pub interval_secs: u64,
    /// 1 = nominal; doubled per rate-limit response, capped.
    pub backoff_multiplier: u32,
    pub last_poll_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub cursor: Option<String>,
}

/// Handle to a running poller task.
#[derive(Clone)]
pub struct PollerHandle {
    name: &'static str,
    tx: mpsc::Sender<PollerCommand>,
}

impl PollerHandle {
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub async fn start(&self) {
        let _ = self.tx.send(PollerCommand::Start).await;
    }

    pub async fn stop(&self) {
        let _ = self.tx.send(PollerCommand::Stop).await;
    }

    /// Wake the poller immediately.
    pub async fn kick(&self) {
        let _ = self.tx.send(PollerCommand::Kick).await;
    }

    pub async fn status(&self) -> Option<PollerStatus> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(PollerCommand::Status { reply }).await.ok()?;
        rx.await.ok()
    }

    /// Request graceful shutdown; the final snapshot is flushed first.
    pub async fn shutdown(&self) {
        let _ = self.tx.send(PollerCommand::Shutdown).await;
    }
}

struct PollerTask<S> {
    source: S,
    config: PollerRuntimeConfig,
    snapshot: Arc<SnapshotFile>,
    drafts: mpsc::Sender<NotificationDraft>,
    rx: mpsc::Receiver<PollerCommand>,

    state: SourceState,
    running: bool,
    multiplier: u32,
}

impl<S: PollSource> PollerTask<S> {
    fn effective_interval(&self) -> Duration {
        self.config.interval.saturating_mul(self.multiplier)
    }

    fn status(&self) -> PollerStatus {
        PollerStatus {
            name: self.source.name().to_string(),
            running: self.running,
            interval_secs: self.config.interval.as_secs(),
            backoff_multiplier: self.multiplier,
            last_poll_at: self.state.last_poll_at,
            last_error: self.state.last_error.clone(),
            cursor: self.state.last_seen_id.clone(),
        }
    }

    async fn run(mut self) {
        let name = self.source.name();
        info!(source = name, interval_secs = self.config.interval.as_secs(), "Poller started");

        // Scheduled next poll; control commands must not reset it.
        let mut next_poll = tokio::time::Instant::now() + self.effective_interval();

        loop {
            tokio::select! {
                _ = tokio::time::sleep_until(next_poll), if self.running => {
                    self.poll_cycle().await;
                    next_poll = tokio::time::Instant::now() + self.effective_interval();
                }
                command = self.rx.recv() => {
                    match command {
                        Some(PollerCommand::Start) => {
                            if !self.running {
                                info!(source = name, "Poller resumed");
                                self.running = true;
                                next_poll = tokio::time::Instant::now() + self.effective_interval();
                            }
                        }
                        Some(PollerCommand::Stop) => {
                            if self.running {
                                info!(source = name, "Poller stopped");
                                self.running = false;
                            }
                        }
                        Some(PollerCommand::Kick) => {
                            if self.running {
                                debug!(source = name, "Poller kicked");
                                self.poll_cycle().await;
                                next_poll = tokio::time::Instant::now() + self.effective_interval();
                            }
                        }
                        Some(PollerCommand::Status { reply }) => {
                            let _ = reply.send(self.status());
                        }
                        Some(PollerCommand::Shutdown) | None => {
                            break;
                        }
                    }
                }
            }
        }

        // Final snapshot on the way out.
        self.persist();
        info!(source = name, "Poller shut down");
    }

    async fn poll_cycle(&mut self) {
        let name = self.source.name();
        let result = self.source.poll(&mut self.state).await;
        self.state.last_poll_at = Some(Utc::now());

        match result {
            Ok(drafts) => {
                self.state.last_error = None;
                if self.multiplier != 1 {
                    info!(source = name, "Rate-limit backoff cleared");
                    self.multiplier = 1;
                }
                POLL_CYCLES_TOTAL.with_label_values(&[name, "ok"]).inc();

                let count = drafts.len();
                for draft in drafts {
                    if self.drafts.send(draft).await.is_err() {
                        warn!(source = name, "Enrichment channel closed");
                        return;
                    }
                }
                if count > 0 {
                    debug!(source = name, count, "New events forwarded to enrichment");
                }
            }
            Err(PollerError::RateLimited) => {
                self.multiplier = (self.multiplier.saturating_mul(2)).min(self.config.backoff_cap);
                self.state.last_error = Some("rate limited".to_string());
                POLL_CYCLES_TOTAL
                    .with_label_values(&[name, "rate_limited"])
                    .inc();
                warn!(source = name, multiplier = self.multiplier, "Provider rate limited, backing off");
            }
            Err(e) => {
                self.state.last_error = Some(e.to_string());
                POLL_CYCLES_TOTAL.with_label_values(&[name, "error"]).inc();
                warn!(source = name, error = %e, "Poll cycle failed");
            }
        }

        POLLER_BACKOFF_MULTIPLIER
            .with_label_values(&[name])
            .set(i64::from(self.multiplier));
        self.persist();
    }

    fn persist(&self) {
        if let Err(e) = self
            .snapshot
            .store_source(self.source.name(), self.state.to_snapshot())
        {
            warn!(source = self.source.name(), error = %e, "Snapshot write failed");
        }
    }
}

/// Spawn a poller task for `source`.
#[must_use]
pub fn spawn_poller<S: PollSource>(
    source: S,
    config: PollerRuntimeConfig,
    snapshot: Arc<SnapshotFile>,
    drafts: mpsc::Sender<NotificationDraft>,
) -> (PollerHandle, JoinHandle<()>) {
    let name = source.name();
    let contents = snapshot.load();
    let state = contents
        .sources
        .get(name)
        .map(SourceState::from_snapshot)
        .unwrap_or_default();
    let (tx, rx) = mpsc::channel(16);
    let task = PollerTask {
        source,
        running: !config.start_stopped,
        config,
        snapshot,
        drafts,
        rx,
        state,
        multiplier: 1,
    };
    let join = tokio::spawn(task.run());
    (PollerHandle { name, tx }, join)
}
