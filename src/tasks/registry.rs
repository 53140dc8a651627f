//! Task registry — the single authority over task state.
//!
//! The registry is an explicitly constructed in-memory store; consumers only
//! ever receive clones of its tasks. All transitions go through this module
//! so the forward-only lifecycle cannot be bypassed.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio::process::Child;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use super::{runner, valid_transition, Task, TaskStatus};
use crate::config::RunnerConfig;
use crate::error::{CoreError, CoreResult};

/// Cheaply clonable handle — clones share the same underlying store, so the
/// background runner can own a handle without wrapping the registry itself.
#[derive(Clone)]
pub struct TaskRegistry {
    config: RunnerConfig,
    /// task_id -> Task
    tasks: Arc<RwLock<HashMap<String, Task>>>,
    /// Live subprocess handles for running tasks. `cancel_task` takes the
    /// handle out to kill it; the runner takes it out to wait on exit.
    children: Arc<Mutex<HashMap<String, Child>>>,
}

impl TaskRegistry {
    pub fn new(config: RunnerConfig) -> Self {
        Self {
            config,
            tasks: Arc::new(RwLock::new(HashMap::new())),
            children: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Admit a new task and launch its coding-agent subprocess.
    ///
    /// The task is inserted in `running` state with `started_at = now` and an
    /// initial output line before this returns, so an immediate
    /// `get_task_status` from the same caller observes it. The subprocess
    /// itself runs in the background and reports back through
    /// [`finish_task`](Self::finish_task).
    pub async fn start_task(
        &self,
        worktree_name: &str,
        working_directory: &str,
        description: &str,
    ) -> CoreResult<String> {
        if description.trim().is_empty() {
            return Err(CoreError::InvalidRequest(
                "task description must be non-empty".to_string(),
            ));
        }
        if worktree_name.trim().is_empty() {
            return Err(CoreError::InvalidRequest(
                "worktree name must be non-empty".to_string(),
            ));
        }
        let dir = Path::new(working_directory);
        if !dir.is_dir() {
            return Err(CoreError::WorktreeNotFound(format!(
                "working directory does not exist: {working_directory}"
            )));
        }
        if !dir.join(".git").exists() {
            return Err(CoreError::InvalidRequest(format!(
                "working directory is not a worktree checkout: {working_directory}"
            )));
        }

        let task_id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();
        let task = Task {
            id: task_id.clone(),
            description: description.to_string(),
            status: TaskStatus::Running,
            started_at: Some(now),
            completed_at: None,
            output: vec![format!("Starting task: {description}")],
            working_directory: working_directory.to_string(),
            worktree_name: worktree_name.to_string(),
        };

        {
            let mut tasks = self.tasks.write().await;
            let running = tasks
                .values()
                .filter(|t| t.status == TaskStatus::Running)
                .count();
            if self.config.max_concurrent_tasks > 0
                && running >= self.config.max_concurrent_tasks
            {
                return Err(CoreError::Conflict(format!(
                    "maximum concurrent tasks reached ({})",
                    self.config.max_concurrent_tasks
                )));
            }
            tasks.insert(task_id.clone(), task);
        }

        info!(task_id = %task_id, worktree = worktree_name, "task admitted");

        let registry = self.clone();
        let id = task_id.clone();
        let command = self.config.claude_command.clone();
        let cwd = working_directory.to_string();
        let prompt = description.to_string();
        let timeout_secs = self.config.task_timeout_secs;
        tokio::spawn(async move {
            runner::drive(registry, id, command, cwd, prompt, timeout_secs).await;
        });

        Ok(task_id)
    }

    /// Cancel a running task — strict policy.
    ///
    /// Only `running` tasks can be cancelled; the task transitions to
    /// `failed` with `completed_at = now` and a cancellation marker appended.
    /// Cancelling a terminal task is a conflict, an unknown id is not found.
    /// The state change is recorded immediately; killing the subprocess is a
    /// best-effort request.
    pub async fn cancel_task(&self, task_id: &str) -> CoreResult<()> {
        {
            let mut tasks = self.tasks.write().await;
            let task = tasks
                .get_mut(task_id)
                .ok_or_else(|| CoreError::TaskNotFound(task_id.to_string()))?;
            if task.status != TaskStatus::Running {
                return Err(CoreError::Conflict(format!(
                    "task {task_id} is not running (status: {})",
                    task.status
                )));
            }
            task.status = TaskStatus::Failed;
            task.completed_at = Some(Utc::now());
            task.output.push("Task cancelled by user".to_string());
        }

        if let Some(mut child) = self.children.lock().await.remove(task_id) {
            if let Err(e) = child.kill().await {
                warn!(task_id, err = %e, "failed to kill cancelled task process");
            }
            let _ = child.wait().await;
        }

        info!(task_id, "task cancelled");
        Ok(())
    }

    /// Snapshot of one task.
    pub async fn get_task_status(&self, task_id: &str) -> CoreResult<Task> {
        self.tasks
            .read()
            .await
            .get(task_id)
            .cloned()
            .ok_or_else(|| CoreError::TaskNotFound(task_id.to_string()))
    }

    /// Snapshot of all known tasks, terminal ones included, sorted by
    /// (started_at, id) for stable enumeration.
    pub async fn list_tasks(&self) -> Vec<Task> {
        let mut tasks: Vec<Task> = self.tasks.read().await.values().cloned().collect();
        tasks.sort_by(|a, b| (a.started_at, &a.id).cmp(&(b.started_at, &b.id)));
        tasks
    }

    /// Remove completed tasks whose `completed_at` is older than `older_than`.
    ///
    /// Failed tasks are never swept — they stay visible for inspection.
    /// Returns the number of tasks removed.
    pub async fn cleanup_completed_tasks(&self, older_than: Duration) -> usize {
        let cutoff = Utc::now() - older_than;
        let mut tasks = self.tasks.write().await;
        let before = tasks.len();
        tasks.retain(|_, task| {
            !(task.status == TaskStatus::Completed
                && task.completed_at.is_some_and(|done| done < cutoff))
        });
        let removed = before - tasks.len();
        if removed > 0 {
            debug!(removed, "cleaned up completed tasks");
        }
        removed
    }

    /// Count of tasks currently in `running` state.
    pub async fn running_count(&self) -> usize {
        self.tasks
            .read()
            .await
            .values()
            .filter(|t| t.status == TaskStatus::Running)
            .count()
    }

    // ── Runner callbacks ────────────────────────────────────────────────────

    /// Store the live subprocess handle for a task.
    pub(crate) async fn attach_child(&self, task_id: &str, child: Child) {
        self.children
            .lock()
            .await
            .insert(task_id.to_string(), child);
    }

    /// Take the subprocess handle back (runner waits on it, cancel kills it).
    pub(crate) async fn detach_child(&self, task_id: &str) -> Option<Child> {
        self.children.lock().await.remove(task_id)
    }

    /// Append one output line to a running task. Lines arriving after the
    /// task reached a terminal state are dropped.
    pub(crate) async fn append_output(&self, task_id: &str, line: String) {
        if let Some(task) = self.tasks.write().await.get_mut(task_id) {
            if task.status == TaskStatus::Running {
                task.output.push(line);
            }
        }
    }

    /// Record the subprocess outcome.
    ///
    /// A result arriving after cancellation finds the task already terminal
    /// and leaves it untouched — no transition leaves a terminal state.
    pub(crate) async fn finish_task(&self, task_id: &str, result: Result<(), String>) {
        let mut tasks = self.tasks.write().await;
        let Some(task) = tasks.get_mut(task_id) else {
            warn!(task_id, "finished task no longer in registry");
            return;
        };

        let target = match result {
            Ok(()) => TaskStatus::Completed,
            Err(_) => TaskStatus::Failed,
        };
        if !valid_transition(task.status, target) {
            debug!(task_id, status = %task.status, "ignoring late result for terminal task");
            return;
        }

        task.status = target;
        task.completed_at = Some(Utc::now());
        match result {
            Ok(()) => task.output.push("Task completed".to_string()),
            Err(e) => task.output.push(format!("Error: {e}")),
        }
        info!(task_id, status = %task.status, "task finished");
    }
}

/// Thread-safe wrapper for use in `AppContext`.
pub type SharedTaskRegistry = Arc<TaskRegistry>;
