//! Git worktree collaborator.
//!
//! Each coding session operates in its own worktree so parallel sessions
//! never touch each other's checkout. The manager owns worktree identity and
//! observes change state; it never mutates a worktree's contents.

pub mod manager;

pub use manager::{
    ChangedFile, GitWorktreeManager, SharedWorktreeManager, WorktreeInfo, WorktreeStatus,
};
