pub mod analysis;
pub mod config;
pub mod error;
pub mod ipc;
pub mod refresh;
pub mod tasks;
pub mod worktree;

// Re-export auth so main.rs can use grove::auth directly.
pub use ipc::auth;

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use analysis::OverlapAnalyzer;
use config::DaemonConfig;
use ipc::event::EventBroadcaster;
use tasks::{SharedTaskRegistry, TaskRegistry};
use tokio::sync::RwLock;
use worktree::{GitWorktreeManager, SharedWorktreeManager};

/// Shared application state passed to every RPC handler and background task.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<DaemonConfig>,
    pub broadcaster: Arc<EventBroadcaster>,
    /// Single authority over task state.
    pub task_registry: SharedTaskRegistry,
    /// Git worktree collaborator; also the analysis engine's snapshot source.
    pub worktree_manager: SharedWorktreeManager,
    pub analyzer: Arc<OverlapAnalyzer>,
    /// Repositories clients have asked about — the refresh driver publishes
    /// snapshots for each of these.
    pub watched_repos: Arc<RwLock<BTreeSet<PathBuf>>>,
    pub started_at: std::time::Instant,
    /// Local WebSocket auth token. Every new connection must send a
    /// `daemon.auth` RPC with this token before any other method call.
    /// Empty string means auth is disabled (not recommended).
    pub auth_token: String,
}

impl AppContext {
    pub fn new(config: DaemonConfig, auth_token: String) -> Self {
        let broadcaster = Arc::new(EventBroadcaster::new());
        let task_registry = Arc::new(TaskRegistry::new(config.runner.clone()));
        let worktree_manager = Arc::new(GitWorktreeManager::new(config.git_timeout_secs));
        let analyzer = Arc::new(OverlapAnalyzer::new(config.risk.clone()));
        Self {
            config: Arc::new(config),
            broadcaster,
            task_registry,
            worktree_manager,
            analyzer,
            watched_repos: Arc::new(RwLock::new(BTreeSet::new())),
            started_at: std::time::Instant::now(),
            auth_token,
        }
    }

    /// Remember a repository so the refresh driver keeps its state current.
    pub async fn watch_repo(&self, repo_path: PathBuf) {
        self.watched_repos.write().await.insert(repo_path);
    }
}
