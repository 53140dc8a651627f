use crate::analysis;
use crate::error::CoreError;
use crate::AppContext;
use anyhow::Result;
use serde::Deserialize;
use serde_json::Value;
use std::path::PathBuf;

#[derive(Deserialize)]
struct OverlapParams {
    #[serde(rename = "repoPath")]
    repo_path: PathBuf,
}

#[derive(Deserialize)]
struct DependencyParams {
    #[serde(rename = "repoPath")]
    repo_path: PathBuf,
    #[serde(rename = "filePaths")]
    file_paths: Vec<String>,
}

pub async fn overlaps(params: Value, ctx: &AppContext) -> Result<Value> {
    let p: OverlapParams = serde_json::from_value(params)?;
    let analysis = ctx
        .analyzer
        .analyze(ctx.worktree_manager.as_ref(), &p.repo_path)
        .await?;
    ctx.watch_repo(p.repo_path).await;
    Ok(serde_json::to_value(analysis)?)
}

pub async fn dependencies(params: Value, ctx: &AppContext) -> Result<Value> {
    let p: DependencyParams = serde_json::from_value(params)?;

    // File scanning is blocking IO — run it off the reactor, bounded like
    // every other collaborator call.
    let timeout = std::time::Duration::from_secs(ctx.config.git_timeout_secs);
    let handle = tokio::task::spawn_blocking(move || {
        analysis::analyze_dependencies(&p.repo_path, &p.file_paths)
    });
    let nodes = match tokio::time::timeout(timeout, handle).await {
        Err(_) => {
            return Err(CoreError::Transient(format!(
                "dependency scan timed out after {}s",
                timeout.as_secs()
            ))
            .into())
        }
        Ok(Err(join)) => {
            return Err(CoreError::Transient(format!("dependency scan panicked: {join}")).into())
        }
        Ok(Ok(nodes)) => nodes,
    };
    Ok(serde_json::to_value(nodes)?)
}
