//! Periodic state refresh.
//!
//! One cancellable loop keeps subscribers current instead of every consumer
//! polling on its own. The loop refreshes immediately on spawn, then on a
//! fixed interval. Refreshes never overlap: a tick that elapses while a
//! refresh is still in flight is skipped (`MissedTickBehavior::Skip`), not
//! queued. Stopping the driver is deterministic — once stopped, no further
//! tick can fire.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::AppContext;

/// One refresh pass. The daemon implementation publishes a state snapshot;
/// tests substitute counters or slow stubs.
#[async_trait::async_trait]
pub trait Refresher: Send + Sync + 'static {
    async fn refresh(&self) -> Result<()>;
}

pub struct RefreshDriver {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl RefreshDriver {
    /// Start the refresh loop: one immediate refresh, then one per interval.
    pub fn spawn(interval: Duration, refresher: Arc<dyn Refresher>) -> Self {
        let (shutdown, mut stopped) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // An interval elapsing mid-refresh is dropped, not replayed.
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!(interval_ms = interval.as_millis() as u64, "refresh driver started");

            loop {
                tokio::select! {
                    biased;

                    changed = stopped.changed() => {
                        if changed.is_err() || *stopped.borrow() {
                            break;
                        }
                    }

                    // First tick completes immediately.
                    _ = ticker.tick() => {
                        if let Err(e) = refresher.refresh().await {
                            warn!(err = %e, "refresh failed — will retry next tick");
                        }
                    }
                }
            }
            debug!("refresh driver stopped");
        });

        Self { shutdown, handle }
    }

    /// Stop the loop and wait for it to wind down. After this returns no
    /// further refresh runs; the driver cannot be restarted.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.handle.await;
    }
}

// ── Daemon refresher ─────────────────────────────────────────────────────────

/// Publishes a `state.snapshot` notification with the current task list and
/// per-repository overlap analysis for every repository a client has asked
/// about, bounding consumer staleness to one refresh interval.
pub struct SnapshotPublisher {
    ctx: Arc<AppContext>,
}

impl SnapshotPublisher {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait::async_trait]
impl Refresher for SnapshotPublisher {
    async fn refresh(&self) -> Result<()> {
        let tasks = self.ctx.task_registry.list_tasks().await;

        let repos: BTreeSet<PathBuf> = self.ctx.watched_repos.read().await.clone();
        let mut repo_states = Vec::with_capacity(repos.len());
        for repo in repos {
            // One unreachable repo must not hide the rest of the snapshot.
            match self
                .ctx
                .analyzer
                .analyze(self.ctx.worktree_manager.as_ref(), &repo)
                .await
            {
                Ok(analysis) => repo_states.push(serde_json::json!({
                    "repoPath": repo,
                    "analysis": analysis,
                })),
                Err(e) => {
                    warn!(repo = %repo.display(), err = %e, "snapshot skipped repo");
                }
            }
        }

        self.ctx.broadcaster.broadcast(
            "state.snapshot",
            serde_json::json!({
                "tasks": tasks,
                "repos": repo_states,
            }),
        );
        Ok(())
    }
}
