//! Coding-agent subprocess driver.
//!
//! Spawns the configured CLI in the task's worktree, streams stdout/stderr
//! lines into the task's output buffer as they arrive, and reports the final
//! outcome to the registry. A per-task timeout bounds the whole run; a hung
//! subprocess is killed rather than holding the task in `running` forever.

use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

use super::registry::TaskRegistry;

/// Run one task's subprocess to completion. Never returns an error — every
/// failure path is recorded on the task itself via `finish_task`.
pub(crate) async fn drive(
    registry: TaskRegistry,
    task_id: String,
    command: String,
    working_directory: String,
    description: String,
    timeout_secs: u64,
) {
    let mut child = match Command::new(&command)
        .arg(&description)
        .current_dir(&working_directory)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .stdin(Stdio::null())
        .spawn()
    {
        Ok(c) => c,
        Err(e) => {
            registry
                .finish_task(
                    &task_id,
                    Err(format!(
                        "failed to spawn `{command}` — is it installed and on PATH? ({e})"
                    )),
                )
                .await;
            return;
        }
    };

    let Some(stdout) = child.stdout.take() else {
        registry
            .finish_task(&task_id, Err("no stdout from subprocess".to_string()))
            .await;
        return;
    };
    let Some(stderr) = child.stderr.take() else {
        registry
            .finish_task(&task_id, Err("no stderr from subprocess".to_string()))
            .await;
        return;
    };

    // Hand the child to the registry so cancel_task can kill it.
    registry.attach_child(&task_id, child).await;

    // Drain stderr in the background, tagged so interleaved output stays
    // attributable.
    let stderr_registry = registry.clone();
    let stderr_task_id = task_id.clone();
    let stderr_reader = tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            stderr_registry
                .append_output(&stderr_task_id, format!("stderr: {line}"))
                .await;
        }
    });

    let run = async {
        let mut lines = BufReader::new(stdout).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            registry.append_output(&task_id, line).await;
        }
        // stdout closed — the process is exiting (or was killed by cancel).
        let _ = stderr_reader.await;
        match registry.detach_child(&task_id).await {
            Some(mut child) => match child.wait().await {
                Ok(status) if status.success() => Ok(()),
                Ok(status) => Err(format!(
                    "exited with code {}",
                    status.code().unwrap_or(-1)
                )),
                Err(e) => Err(format!("failed to wait for subprocess: {e}")),
            },
            // cancel_task already took and killed the child; the task is
            // terminal and finish_task below will be a no-op.
            None => Err("cancelled".to_string()),
        }
    };

    let result = match tokio::time::timeout(
        std::time::Duration::from_secs(timeout_secs),
        run,
    )
    .await
    {
        Ok(outcome) => outcome,
        Err(_) => {
            warn!(task_id = %task_id, timeout_secs, "task timed out — killing subprocess");
            if let Some(mut child) = registry.detach_child(&task_id).await {
                let _ = child.kill().await;
                let _ = child.wait().await;
            }
            Err(format!("task timed out after {timeout_secs}s"))
        }
    };

    debug!(task_id = %task_id, ok = result.is_ok(), "subprocess finished");
    registry.finish_task(&task_id, result).await;
}
