//! Background janitor — sweeps aged-out completed tasks.
//!
//! Runs on a fixed interval. Only `completed` tasks older than the retention
//! threshold are removed; `failed` tasks stay visible until restart.

use std::sync::Arc;

use tracing::info;

use super::registry::TaskRegistry;
use crate::config::CleanupConfig;

/// Perpetual janitor loop. Call inside a `tokio::spawn` during startup.
pub async fn run_task_janitor(registry: Arc<TaskRegistry>, config: CleanupConfig) {
    let retention = chrono::Duration::seconds(config.task_retention_secs);
    info!(
        interval_secs = config.janitor_interval_secs,
        retention_secs = config.task_retention_secs,
        "task janitor started"
    );

    let mut interval =
        tokio::time::interval(std::time::Duration::from_secs(config.janitor_interval_secs));
    interval.tick().await; // first tick fires immediately — skip it
    loop {
        interval.tick().await;
        let removed = registry.cleanup_completed_tasks(retention).await;
        if removed > 0 {
            info!(removed, "janitor swept completed tasks");
        }
    }
}
