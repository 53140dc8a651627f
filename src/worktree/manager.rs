//! Git worktree manager.
//!
//! Worktrees live at `{repo}/.grove/worktrees/{name}` and are branched from
//! HEAD at creation time. All git2 work runs on `spawn_blocking` and is
//! bounded by a timeout so no caller ever hangs on a wedged repository.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::analysis::{ChangeSource, WorktreeChanges};
use crate::error::{CoreError, CoreResult};

// ── Types ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorktreeInfo {
    pub id: String,
    pub name: String,
    pub branch: String,
    pub path: PathBuf,
    pub status: WorktreeStatus,
    pub created_at: DateTime<Utc>,
    /// Most recent observed change time. Never moves backwards.
    pub last_activity: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorktreeStatus {
    /// Uncommitted changes present — a session is (or was) working here.
    Active,
    /// Checkout is clean.
    Idle,
    /// Directory is missing or the repository cannot be opened.
    Error,
}

/// One modified file inside one worktree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangedFile {
    pub path: String,
    pub modified_at: DateTime<Utc>,
}

/// Stable per-name identity, assigned once and kept for the process lifetime.
#[derive(Debug, Clone)]
struct Identity {
    id: String,
    created_at: DateTime<Utc>,
    last_activity: DateTime<Utc>,
}

// ── Manager ─────────────────────────────────────────────────────────────────

pub struct GitWorktreeManager {
    /// worktree name -> stable identity
    identities: RwLock<HashMap<String, Identity>>,
    /// Upper bound on any single blocking git2 call.
    git_timeout: Duration,
}

impl GitWorktreeManager {
    pub fn new(git_timeout_secs: u64) -> Self {
        Self {
            identities: RwLock::new(HashMap::new()),
            git_timeout: Duration::from_secs(git_timeout_secs),
        }
    }

    /// Create a worktree named `name` on `branch` (branched from HEAD when
    /// the branch does not exist yet).
    pub async fn create(
        &self,
        repo_path: &Path,
        name: &str,
        branch: &str,
    ) -> CoreResult<WorktreeInfo> {
        if name.trim().is_empty() || branch.trim().is_empty() {
            return Err(CoreError::InvalidRequest(
                "worktree name and branch must be non-empty".to_string(),
            ));
        }
        // git rejects path separators in worktree names.
        if name.contains('/') || name.contains('\\') {
            return Err(CoreError::InvalidRequest(format!(
                "worktree name may not contain path separators: {name}"
            )));
        }
        check_repo_path(repo_path)?;

        let wt_path = worktree_root(repo_path).join(name);
        let repo = repo_path.to_path_buf();
        let name_owned = name.to_string();
        let branch_owned = branch.to_string();
        let wt = wt_path.clone();
        self.run_git(move || create_worktree_blocking(&repo, &name_owned, &branch_owned, &wt))
            .await?;

        let now = Utc::now();
        let identity = {
            let mut map = self.identities.write().await;
            map.entry(name.to_string())
                .or_insert_with(|| Identity {
                    id: uuid::Uuid::new_v4().to_string(),
                    created_at: now,
                    last_activity: now,
                })
                .clone()
        };

        info!(name, branch, path = %wt_path.display(), "worktree created");
        Ok(WorktreeInfo {
            id: identity.id,
            name: name.to_string(),
            branch: branch.to_string(),
            path: wt_path,
            status: WorktreeStatus::Idle,
            created_at: identity.created_at,
            last_activity: identity.last_activity,
        })
    }

    /// List all worktrees of `repo_path`, sorted by name.
    ///
    /// A worktree whose directory is gone or whose repository cannot be
    /// opened is still listed, with `Error` status, so a stale entry never
    /// silently disappears from observers.
    pub async fn list(&self, repo_path: &Path) -> CoreResult<Vec<WorktreeInfo>> {
        check_repo_path(repo_path)?;

        let repo = repo_path.to_path_buf();
        let raw = self.run_git(move || list_worktrees_blocking(&repo)).await?;

        let mut infos = Vec::with_capacity(raw.len());
        let mut map = self.identities.write().await;
        for entry in raw {
            let identity = map
                .entry(entry.name.clone())
                .or_insert_with(|| Identity {
                    id: uuid::Uuid::new_v4().to_string(),
                    created_at: Utc::now(),
                    last_activity: entry.latest_change.unwrap_or_else(Utc::now),
                });
            // last_activity is monotone: only observed changes move it forward.
            if let Some(seen) = entry.latest_change {
                if seen > identity.last_activity {
                    identity.last_activity = seen;
                }
            }
            infos.push(WorktreeInfo {
                id: identity.id.clone(),
                name: entry.name,
                branch: entry.branch,
                path: entry.path,
                status: entry.status,
                created_at: identity.created_at,
                last_activity: identity.last_activity,
            });
        }
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(infos)
    }

    /// Remove a worktree: prune the git registration and delete its directory.
    pub async fn delete(&self, repo_path: &Path, name: &str) -> CoreResult<()> {
        check_repo_path(repo_path)?;

        let repo = repo_path.to_path_buf();
        let name_owned = name.to_string();
        self.run_git(move || delete_worktree_blocking(&repo, &name_owned))
            .await?;

        self.identities.write().await.remove(name);
        debug!(name, "worktree removed");
        Ok(())
    }

    /// Files with uncommitted changes in one worktree, with their mtimes.
    pub async fn changed_files(
        &self,
        repo_path: &Path,
        name: &str,
    ) -> CoreResult<Vec<ChangedFile>> {
        check_repo_path(repo_path)?;

        let repo = repo_path.to_path_buf();
        let name_owned = name.to_string();
        self.run_git(move || changed_files_blocking(&repo, &name_owned))
            .await
    }

    /// Resolve a worktree by its checkout path. Used by the task registry to
    /// validate that a task's working directory belongs to a known worktree.
    pub async fn find_by_path(
        &self,
        repo_path: &Path,
        dir: &Path,
    ) -> CoreResult<Option<WorktreeInfo>> {
        let all = self.list(repo_path).await?;
        Ok(all.into_iter().find(|w| w.path == dir))
    }

    /// Run a blocking git2 closure with the configured timeout.
    ///
    /// Timeout and join failures surface as transient errors; git "not found"
    /// maps to `WorktreeNotFound`.
    async fn run_git<T, F>(&self, f: F) -> CoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let handle = tokio::task::spawn_blocking(f);
        match tokio::time::timeout(self.git_timeout, handle).await {
            Err(_) => Err(CoreError::Transient(format!(
                "git operation timed out after {}s",
                self.git_timeout.as_secs()
            ))),
            Ok(Err(join)) => Err(CoreError::Transient(format!(
                "git operation panicked: {join}"
            ))),
            Ok(Ok(result)) => result.map_err(map_git_error),
        }
    }
}

fn check_repo_path(repo_path: &Path) -> CoreResult<()> {
    if !repo_path.exists() {
        return Err(CoreError::InvalidRequest(format!(
            "repository path does not exist: {}",
            repo_path.display()
        )));
    }
    Ok(())
}

fn worktree_root(repo_path: &Path) -> PathBuf {
    repo_path.join(".grove").join("worktrees")
}

fn map_git_error(e: anyhow::Error) -> CoreError {
    if let Some(git) = e.downcast_ref::<git2::Error>() {
        if git.code() == git2::ErrorCode::NotFound {
            return CoreError::WorktreeNotFound(git.message().to_string());
        }
    }
    CoreError::Transient(format!("{e:#}"))
}

// ── Blocking git2 helpers ────────────────────────────────────────────────────

struct RawWorktree {
    name: String,
    branch: String,
    path: PathBuf,
    status: WorktreeStatus,
    latest_change: Option<DateTime<Utc>>,
}

fn create_worktree_blocking(
    repo_path: &Path,
    name: &str,
    branch_name: &str,
    wt_path: &Path,
) -> Result<()> {
    let repo = git2::Repository::open(repo_path)
        .context("failed to open repository for worktree creation")?;

    if let Some(parent) = wt_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create worktree base directory")?;
    }

    let head = repo.head().context("repository has no HEAD")?;
    let head_commit = head
        .peel_to_commit()
        .context("HEAD does not point to a commit")?;

    // Create branch from HEAD, reusing it if it already exists.
    let branch = match repo.branch(branch_name, &head_commit, false) {
        Ok(b) => b,
        Err(e) if e.code() == git2::ErrorCode::Exists => {
            debug!(branch = branch_name, "branch already exists — reusing");
            repo.find_branch(branch_name, git2::BranchType::Local)
                .context("failed to find existing branch")?
        }
        Err(e) => bail!("failed to create branch {}: {}", branch_name, e),
    };

    let branch_ref = branch.get();
    let mut wt_opts = git2::WorktreeAddOptions::new();
    wt_opts.reference(Some(branch_ref));
    repo.worktree(name, wt_path, Some(&wt_opts))
        .context("failed to add git worktree")?;

    Ok(())
}

fn list_worktrees_blocking(repo_path: &Path) -> Result<Vec<RawWorktree>> {
    let repo =
        git2::Repository::open(repo_path).context("failed to open repository for listing")?;
    let names = repo.worktrees().context("failed to list worktrees")?;

    let mut out = Vec::new();
    for name in names.iter().flatten() {
        let Ok(wt) = repo.find_worktree(name) else {
            continue;
        };
        let wt_path = wt.path().to_path_buf();

        match git2::Repository::open(&wt_path) {
            Ok(wt_repo) => {
                let branch = wt_repo
                    .head()
                    .ok()
                    .and_then(|h| h.shorthand().map(str::to_string))
                    .unwrap_or_else(|| "unknown".to_string());
                let changed = scan_changes(&wt_repo, &wt_path)?;
                let latest_change = changed.iter().map(|c| c.modified_at).max();
                let status = if changed.is_empty() {
                    WorktreeStatus::Idle
                } else {
                    WorktreeStatus::Active
                };
                out.push(RawWorktree {
                    name: name.to_string(),
                    branch,
                    path: wt_path,
                    status,
                    latest_change,
                });
            }
            Err(e) => {
                warn!(name, err = %e, "worktree unreadable — reporting error status");
                out.push(RawWorktree {
                    name: name.to_string(),
                    branch: "unknown".to_string(),
                    path: wt_path,
                    status: WorktreeStatus::Error,
                    latest_change: None,
                });
            }
        }
    }
    Ok(out)
}

fn delete_worktree_blocking(repo_path: &Path, name: &str) -> Result<()> {
    let repo =
        git2::Repository::open(repo_path).context("failed to open repository for removal")?;
    let wt = repo.find_worktree(name)?;
    let wt_path = wt.path().to_path_buf();

    let mut prune_opts = git2::WorktreePruneOptions::new();
    prune_opts.valid(true).working_tree(true);
    wt.prune(Some(&mut prune_opts))
        .context("failed to prune worktree")?;
    if wt_path.exists() {
        std::fs::remove_dir_all(&wt_path).context("failed to remove worktree directory")?;
    }
    Ok(())
}

fn changed_files_blocking(repo_path: &Path, name: &str) -> Result<Vec<ChangedFile>> {
    let repo = git2::Repository::open(repo_path).context("failed to open repository")?;
    let wt = repo.find_worktree(name)?;
    let wt_path = wt.path().to_path_buf();
    let wt_repo =
        git2::Repository::open(&wt_path).context("failed to open worktree repository")?;
    scan_changes(&wt_repo, &wt_path)
}

/// Walk `git status` of a worktree and collect new/modified paths with their
/// filesystem mtimes. Deleted entries carry no mtime and are skipped.
fn scan_changes(wt_repo: &git2::Repository, wt_path: &Path) -> Result<Vec<ChangedFile>> {
    let mut opts = git2::StatusOptions::new();
    opts.include_untracked(true).recurse_untracked_dirs(true);
    let statuses = wt_repo
        .statuses(Some(&mut opts))
        .context("failed to get worktree status")?;

    let mut out = Vec::new();
    for entry in statuses.iter() {
        let s = entry.status();
        let relevant = s.is_wt_new()
            || s.is_wt_modified()
            || s.is_index_new()
            || s.is_index_modified();
        if !relevant {
            continue;
        }
        let Some(rel) = entry.path() else { continue };
        let modified_at = std::fs::metadata(wt_path.join(rel))
            .and_then(|m| m.modified())
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());
        out.push(ChangedFile {
            path: rel.to_string(),
            modified_at,
        });
    }
    out.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(out)
}

// ── Snapshot source ──────────────────────────────────────────────────────────

#[async_trait::async_trait]
impl ChangeSource for GitWorktreeManager {
    /// Point-in-time snapshot of every worktree's changed files.
    ///
    /// Any failure is reported as transient with no partial result — callers
    /// retry on the next refresh.
    async fn snapshot(&self, repo_path: &Path) -> CoreResult<Vec<WorktreeChanges>> {
        let worktrees = self
            .list(repo_path)
            .await
            .map_err(|e| CoreError::Transient(format!("snapshot unavailable: {e}")))?;

        let mut out = Vec::with_capacity(worktrees.len());
        for wt in worktrees {
            if wt.status == WorktreeStatus::Error {
                // An unreadable worktree cannot contribute changes; skipping
                // it keeps the snapshot self-consistent.
                continue;
            }
            let files = self
                .changed_files(repo_path, &wt.name)
                .await
                .map_err(|e| CoreError::Transient(format!("snapshot unavailable: {e}")))?;
            out.push(WorktreeChanges {
                worktree: wt.name,
                files,
            });
        }
        Ok(out)
    }
}

/// Thread-safe wrapper for use in `AppContext`.
pub type SharedWorktreeManager = Arc<GitWorktreeManager>;
