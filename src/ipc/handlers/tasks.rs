use crate::AppContext;
use anyhow::Result;
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Deserialize)]
struct StartParams {
    #[serde(rename = "worktreeName")]
    worktree_name: String,
    #[serde(rename = "workingDirectory")]
    working_directory: String,
    #[serde(rename = "taskDescription")]
    task_description: String,
}

#[derive(Deserialize)]
struct TaskIdParams {
    #[serde(rename = "taskId")]
    task_id: String,
}

pub async fn start(params: Value, ctx: &AppContext) -> Result<Value> {
    let p: StartParams = serde_json::from_value(params)?;
    let task_id = ctx
        .task_registry
        .start_task(&p.worktree_name, &p.working_directory, &p.task_description)
        .await?;
    Ok(json!(task_id))
}

pub async fn cancel(params: Value, ctx: &AppContext) -> Result<Value> {
    let p: TaskIdParams = serde_json::from_value(params)?;
    ctx.task_registry.cancel_task(&p.task_id).await?;
    Ok(json!(null))
}

pub async fn status(params: Value, ctx: &AppContext) -> Result<Value> {
    let p: TaskIdParams = serde_json::from_value(params)?;
    let task = ctx.task_registry.get_task_status(&p.task_id).await?;
    Ok(serde_json::to_value(task)?)
}

pub async fn list(_params: Value, ctx: &AppContext) -> Result<Value> {
    let tasks = ctx.task_registry.list_tasks().await;
    Ok(serde_json::to_value(tasks)?)
}

pub async fn cleanup(_params: Value, ctx: &AppContext) -> Result<Value> {
    let retention = chrono::Duration::seconds(ctx.config.cleanup.task_retention_secs);
    let removed = ctx.task_registry.cleanup_completed_tasks(retention).await;
    Ok(json!(removed))
}
