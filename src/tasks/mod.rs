//! Task lifecycle: data model, registry, subprocess runner, janitor.

pub mod janitor;
pub mod registry;
pub(crate) mod runner;

pub use registry::{SharedTaskRegistry, TaskRegistry};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One tracked coding-agent session bound to a worktree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub description: String,
    pub status: TaskStatus,
    pub started_at: Option<DateTime<Utc>>,
    /// Set exactly when the task reaches a terminal state.
    pub completed_at: Option<DateTime<Utc>>,
    /// Append-only subprocess output, one line per entry.
    pub output: Vec<String>,
    pub working_directory: String,
    pub worktree_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    /// No transition leaves a terminal state.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Valid task status transitions — forward-only, no resurrection.
pub fn valid_transition(from: TaskStatus, to: TaskStatus) -> bool {
    use TaskStatus::*;
    matches!(
        (from, to),
        (Pending, Running) | (Running, Completed) | (Running, Failed)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use TaskStatus::*;

    #[test]
    fn lifecycle_is_forward_only() {
        assert!(valid_transition(Pending, Running));
        assert!(valid_transition(Running, Completed));
        assert!(valid_transition(Running, Failed));

        assert!(!valid_transition(Completed, Running));
        assert!(!valid_transition(Failed, Running));
        assert!(!valid_transition(Completed, Failed));
        assert!(!valid_transition(Running, Pending));
        assert!(!valid_transition(Pending, Completed));
    }

    #[test]
    fn terminal_states() {
        assert!(Completed.is_terminal());
        assert!(Failed.is_terminal());
        assert!(!Pending.is_terminal());
        assert!(!Running.is_terminal());
    }
}
