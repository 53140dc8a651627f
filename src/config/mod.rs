use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::error;

const DEFAULT_PORT: u16 = 4310;
const DEFAULT_MAX_CONCURRENT_TASKS: usize = 3;
const DEFAULT_TASK_TIMEOUT_SECS: u64 = 3600;
const DEFAULT_CLAUDE_COMMAND: &str = "claude";
const DEFAULT_RECENCY_WINDOW_MINS: i64 = 15;
const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 5;
const DEFAULT_JANITOR_INTERVAL_SECS: u64 = 300;
const DEFAULT_TASK_RETENTION_SECS: i64 = 3600;
const DEFAULT_GIT_TIMEOUT_SECS: u64 = 30;

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

// ─── RunnerConfig ─────────────────────────────────────────────────────────────

/// Coding-agent subprocess configuration (`[runner]` in config.toml).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Command used to launch a coding session. Default: "claude".
    pub claude_command: String,
    /// Maximum tasks in `running` state at once. Default: 3.
    pub max_concurrent_tasks: usize,
    /// Hard wall-clock limit per task (seconds). Default: 3600 (1 hour).
    /// A task that exceeds it is killed and marked failed.
    pub task_timeout_secs: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            claude_command: DEFAULT_CLAUDE_COMMAND.to_string(),
            max_concurrent_tasks: DEFAULT_MAX_CONCURRENT_TASKS,
            task_timeout_secs: DEFAULT_TASK_TIMEOUT_SECS,
        }
    }
}

// ─── RiskConfig ───────────────────────────────────────────────────────────────

/// Conflict-risk classification thresholds (`[risk]` in config.toml).
///
/// Thresholds can be tuned per-deployment without rebuilding the daemon.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RiskConfig {
    /// Two-worktree overlaps whose modification times fall within this many
    /// minutes of each other classify as high risk. Default: 15.
    pub recency_window_mins: i64,
    /// Extra exact file names treated as low risk (merged with the built-in
    /// lock/generated-file table).
    pub low_risk_files: Vec<String>,
    /// Extra file-name suffixes treated as low risk (e.g. ".generated.ts").
    pub low_risk_suffixes: Vec<String>,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            recency_window_mins: DEFAULT_RECENCY_WINDOW_MINS,
            low_risk_files: Vec::new(),
            low_risk_suffixes: Vec::new(),
        }
    }
}

impl RiskConfig {
    pub fn recency_window(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.recency_window_mins)
    }
}

// ─── RefreshConfig ────────────────────────────────────────────────────────────

/// Snapshot refresh cadence (`[refresh]` in config.toml).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RefreshConfig {
    /// Seconds between state snapshots broadcast to subscribers. Default: 5.
    pub interval_secs: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_REFRESH_INTERVAL_SECS,
        }
    }
}

// ─── CleanupConfig ────────────────────────────────────────────────────────────

/// Task janitor configuration (`[cleanup]` in config.toml).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CleanupConfig {
    /// Seconds between janitor sweeps. Default: 300.
    pub janitor_interval_secs: u64,
    /// Completed tasks older than this many seconds are swept. Default: 3600.
    /// Failed tasks are never swept — they stay visible until restart.
    pub task_retention_secs: i64,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            janitor_interval_secs: DEFAULT_JANITOR_INTERVAL_SECS,
            task_retention_secs: DEFAULT_TASK_RETENTION_SECS,
        }
    }
}

// ─── DaemonConfig ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub port: u16,
    pub data_dir: PathBuf,
    pub log: String,
    /// Bind address for the WebSocket server (GROVED_BIND env var, default: "127.0.0.1").
    pub bind_address: String,
    /// Log output format: "pretty" (default) | "json" (structured for log aggregators).
    pub log_format: String,
    /// Upper bound on any single git2 operation (seconds). Expiry surfaces as
    /// a transient error, never a hang.
    pub git_timeout_secs: u64,
    /// Coding-agent subprocess settings.
    pub runner: RunnerConfig,
    /// Conflict-risk thresholds.
    pub risk: RiskConfig,
    /// Snapshot refresh cadence.
    pub refresh: RefreshConfig,
    /// Task janitor settings.
    pub cleanup: CleanupConfig,
}

/// `{data_dir}/config.toml` — all fields are optional overrides.
/// Priority: CLI / env var  >  TOML  >  built-in default.
#[derive(Deserialize, Default)]
struct TomlConfig {
    /// WebSocket server port (default: 4310).
    port: Option<u16>,
    /// Log level filter string, e.g. "debug", "info,grove=trace" (default: "info").
    log: Option<String>,
    /// Bind address (default: "127.0.0.1"; use "0.0.0.0" for LAN access).
    bind_address: Option<String>,
    /// Log output format: "pretty" | "json".
    log_format: Option<String>,
    /// Per-operation git timeout in seconds (default: 30).
    git_timeout_secs: Option<u64>,
    /// Runner configuration (`[runner]`).
    runner: Option<RunnerConfig>,
    /// Risk thresholds (`[risk]`).
    risk: Option<RiskConfig>,
    /// Refresh cadence (`[refresh]`).
    refresh: Option<RefreshConfig>,
    /// Janitor configuration (`[cleanup]`).
    cleanup: Option<CleanupConfig>,
}

fn load_toml(data_dir: &Path) -> Option<TomlConfig> {
    let path = data_dir.join("config.toml");
    let contents = std::fs::read_to_string(&path).ok()?;
    match toml::from_str::<TomlConfig>(&contents) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            error!(path = %path.display(), err = %e, "failed to parse config.toml — using defaults");
            None
        }
    }
}

impl DaemonConfig {
    /// Build config from CLI/env args + optional TOML file.
    ///
    /// Priority (highest to lowest):
    ///   1. CLI / env — passed as `Some(value)` from clap
    ///   2. TOML file at `{data_dir}/config.toml`
    ///   3. Built-in defaults
    pub fn new(
        port: Option<u16>,
        data_dir: Option<PathBuf>,
        log: Option<String>,
        bind_address: Option<String>,
    ) -> Self {
        let data_dir = data_dir.unwrap_or_else(default_data_dir);

        // Load TOML as the lowest-priority override layer
        let toml = load_toml(&data_dir).unwrap_or_default();

        let port = port.or(toml.port).unwrap_or(DEFAULT_PORT);
        let log = log.or(toml.log).unwrap_or_else(|| "info".to_string());

        let bind_address = bind_address
            .or(std::env::var("GROVED_BIND").ok().filter(|s| !s.is_empty()))
            .or(toml.bind_address)
            .unwrap_or_else(default_bind_address);

        let log_format = std::env::var("GROVED_LOG_FORMAT")
            .ok()
            .filter(|s| !s.is_empty())
            .or(toml.log_format)
            .unwrap_or_else(|| "pretty".to_string());

        let git_timeout_secs = toml.git_timeout_secs.unwrap_or(DEFAULT_GIT_TIMEOUT_SECS);

        Self {
            port,
            data_dir,
            log,
            bind_address,
            log_format,
            git_timeout_secs,
            runner: toml.runner.unwrap_or_default(),
            risk: toml.risk.unwrap_or_default(),
            refresh: toml.refresh.unwrap_or_default(),
            cleanup: toml.cleanup.unwrap_or_default(),
        }
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self::new(None, Some(default_data_dir()), None, None)
    }
}

fn default_data_dir() -> PathBuf {
    #[cfg(target_os = "macos")]
    {
        // ~/Library/Application Support/grove
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("grove");
        }
    }
    #[cfg(target_os = "linux")]
    {
        // $XDG_DATA_HOME/grove or ~/.local/share/grove
        if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
            return PathBuf::from(xdg).join("grove");
        }
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(".local").join("share").join("grove");
        }
    }
    #[cfg(target_os = "windows")]
    {
        // %APPDATA%\grove
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata).join("grove");
        }
    }
    PathBuf::from(".grove")
}
