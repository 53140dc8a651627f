use crate::AppContext;
use anyhow::Result;
use serde_json::{json, Value};

pub async fn ping(_params: Value, _ctx: &AppContext) -> Result<Value> {
    Ok(json!({ "pong": true }))
}

pub async fn status(_params: Value, ctx: &AppContext) -> Result<Value> {
    let tasks = ctx.task_registry.list_tasks().await;
    let running = tasks
        .iter()
        .filter(|t| t.status == crate::tasks::TaskStatus::Running)
        .count();
    Ok(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "uptime": ctx.started_at.elapsed().as_secs(),
        "totalTasks": tasks.len(),
        "runningTasks": running,
        "watchedRepos": ctx.watched_repos.read().await.len(),
    }))
}
