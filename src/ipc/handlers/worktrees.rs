use crate::AppContext;
use anyhow::Result;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::PathBuf;

#[derive(Deserialize)]
struct RepoParams {
    #[serde(rename = "repoPath")]
    repo_path: PathBuf,
}

#[derive(Deserialize)]
struct CreateParams {
    #[serde(rename = "repoPath")]
    repo_path: PathBuf,
    name: String,
    branch: String,
}

#[derive(Deserialize)]
struct NamedParams {
    #[serde(rename = "repoPath")]
    repo_path: PathBuf,
    name: String,
}

pub async fn list(params: Value, ctx: &AppContext) -> Result<Value> {
    let p: RepoParams = serde_json::from_value(params)?;
    let worktrees = ctx.worktree_manager.list(&p.repo_path).await?;
    ctx.watch_repo(p.repo_path).await;
    Ok(serde_json::to_value(worktrees)?)
}

pub async fn create(params: Value, ctx: &AppContext) -> Result<Value> {
    let p: CreateParams = serde_json::from_value(params)?;
    let info = ctx
        .worktree_manager
        .create(&p.repo_path, &p.name, &p.branch)
        .await?;
    ctx.watch_repo(p.repo_path).await;
    Ok(serde_json::to_value(info)?)
}

pub async fn delete(params: Value, ctx: &AppContext) -> Result<Value> {
    let p: NamedParams = serde_json::from_value(params)?;
    ctx.worktree_manager.delete(&p.repo_path, &p.name).await?;
    Ok(json!(null))
}

pub async fn modified_files(params: Value, ctx: &AppContext) -> Result<Value> {
    let p: NamedParams = serde_json::from_value(params)?;
    let files = ctx
        .worktree_manager
        .changed_files(&p.repo_path, &p.name)
        .await?;
    Ok(serde_json::to_value(files)?)
}
