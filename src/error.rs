//! Typed failure taxonomy shared by the registry, the analysis engine, and
//! the RPC boundary.
//!
//! Every boundary failure is translated into one of these kinds before it
//! reaches a caller; raw git2/serde/IO faults never cross the IPC layer.

use thiserror::Error;

// ── RPC error codes ──────────────────────────────────────────────────────────
//
// taskNotFound     = -32001
// conflict         = -32002  (operation not permitted from the current state)
// transient        = -32003  (collaborator unreachable or timed out — retry)
// worktreeNotFound = -32005

pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;
pub const UNAUTHORIZED: i32 = -32004;
pub const TASK_NOT_FOUND: i32 = -32001;
pub const CONFLICT: i32 = -32002;
pub const TRANSIENT: i32 = -32003;
pub const WORKTREE_NOT_FOUND: i32 = -32005;

/// Errors surfaced by the coordination core.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("task not found: {0}")]
    TaskNotFound(String),

    #[error("worktree not found: {0}")]
    WorktreeNotFound(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The external collaborator (git, subprocess) could not be reached or
    /// timed out. Safe to retry; prior state is unchanged.
    #[error("transient failure: {0}")]
    Transient(String),

    /// The operation is not permitted from the current state — cancelling a
    /// terminal task, or admitting a task past the concurrency cap.
    #[error("conflict: {0}")]
    Conflict(String),
}

impl CoreError {
    /// JSON-RPC error code for this failure kind.
    pub fn rpc_code(&self) -> i32 {
        match self {
            CoreError::TaskNotFound(_) => TASK_NOT_FOUND,
            CoreError::WorktreeNotFound(_) => WORKTREE_NOT_FOUND,
            CoreError::InvalidRequest(_) => INVALID_PARAMS,
            CoreError::Transient(_) => TRANSIENT,
            CoreError::Conflict(_) => CONFLICT,
        }
    }

    /// True when the caller may simply re-invoke the failing operation.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::Transient(_))
    }
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;
