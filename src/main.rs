use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use grove::analysis::{ConflictRisk, OverlapAnalyzer};
use grove::config::DaemonConfig;
use grove::refresh::{RefreshDriver, SnapshotPublisher};
use grove::worktree::GitWorktreeManager;
use grove::{auth, ipc, tasks, AppContext};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(
    name = "groved",
    about = "Grove — coordination daemon for parallel AI coding sessions across Git worktrees",
    version
)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// JSON-RPC WebSocket server port
    #[arg(long, env = "GROVED_PORT")]
    port: Option<u16>,

    /// Data directory for config, auth token, and logs
    #[arg(long, env = "GROVED_DATA_DIR")]
    data_dir: Option<std::path::PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "GROVED_LOG")]
    log: Option<String>,

    /// Bind address for the WebSocket server (default: 127.0.0.1)
    #[arg(long, env = "GROVED_BIND")]
    bind_address: Option<String>,

    /// Write logs to this file path (rotated daily). Optional.
    #[arg(long, env = "GROVED_LOG_FILE")]
    log_file: Option<std::path::PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Start the daemon server (default when no subcommand given).
    ///
    /// Examples:
    ///   groved serve
    ///   groved
    Serve,
    /// One-shot overlap analysis of a repository's worktrees.
    ///
    /// Prints the conflict report and exits non-zero when any file carries
    /// high conflict risk — usable as a pre-merge gate in scripts.
    ///
    /// Examples:
    ///   groved analyze --repo .
    ///   groved analyze --repo /path/to/repo
    Analyze {
        /// Repository to analyze
        #[arg(long)]
        repo: std::path::PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Init once — must happen before any tracing calls.
    let log_level = args.log.as_deref().unwrap_or("info").to_owned();
    let log_format = std::env::var("GROVED_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());
    let _file_guard = setup_logging(&log_level, args.log_file.as_deref(), &log_format);

    match args.command {
        Some(Command::Analyze { repo }) => run_analyze(&repo).await,
        None | Some(Command::Serve) => {
            run_server(args.port, args.data_dir, args.log, args.bind_address).await
        }
    }
}

/// Initialize the tracing subscriber.
/// If `log_file` is set, logs go to both stdout and a daily-rolling file.
/// Returns a `WorkerGuard` that must stay alive for the process lifetime.
///
/// `log_format` may be `"pretty"` (default, human-readable compact format) or
/// `"json"` (structured JSON for log aggregators).
///
/// If the log directory cannot be created, falls back to stdout-only logging
/// with a warning — never panics.
fn setup_logging(
    log_level: &str,
    log_file: Option<&std::path::Path>,
    log_format: &str,
) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let use_json = log_format == "json";

    if let Some(path) = log_file {
        let dir = path.parent().unwrap_or_else(|| std::path::Path::new("."));
        let filename = path
            .file_name()
            .unwrap_or_else(|| std::ffi::OsStr::new("groved.log"));

        // Ensure the directory exists before tracing-appender tries to open it.
        if let Err(e) = std::fs::create_dir_all(dir) {
            eprintln!(
                "warn: could not create log directory '{}': {e} — falling back to stdout",
                dir.display()
            );
            if use_json {
                tracing_subscriber::fmt().json().with_env_filter(log_level).init();
            } else {
                tracing_subscriber::fmt().with_env_filter(log_level).compact().init();
            }
            return None;
        }

        let appender = tracing_appender::rolling::daily(dir, filename);
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);

        if use_json {
            tracing_subscriber::registry()
                .with(EnvFilter::new(log_level))
                .with(fmt::layer().json())
                .with(fmt::layer().json().with_writer(non_blocking))
                .init();
        } else {
            tracing_subscriber::registry()
                .with(EnvFilter::new(log_level))
                .with(fmt::layer().compact())
                .with(fmt::layer().with_writer(non_blocking))
                .init();
        }

        Some(guard)
    } else if use_json {
        tracing_subscriber::fmt().json().with_env_filter(log_level).init();
        None
    } else {
        tracing_subscriber::fmt().with_env_filter(log_level).compact().init();
        None
    }
}

async fn run_server(
    port: Option<u16>,
    data_dir: Option<std::path::PathBuf>,
    log: Option<String>,
    bind_address: Option<String>,
) -> Result<()> {
    info!(version = env!("CARGO_PKG_VERSION"), "groved starting");

    let config = DaemonConfig::new(port, data_dir, log, bind_address);
    info!(
        data_dir = %config.data_dir.display(),
        port = config.port,
        refresh_secs = config.refresh.interval_secs,
        "config loaded"
    );

    std::fs::create_dir_all(&config.data_dir).context("failed to create data directory")?;

    // Coding-agent CLI availability check — tasks fail fast without it, but
    // a missing binary at startup is worth a loud warning.
    let claude_binary = config.runner.claude_command.clone();
    let available = std::process::Command::new(&claude_binary)
        .arg("--version")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .is_ok();
    if available {
        info!(binary = %claude_binary, "coding-agent CLI found");
    } else {
        warn!(
            binary = %claude_binary,
            "coding-agent CLI not found on PATH — task starts will fail"
        );
    }

    let auth_token = match auth::get_or_create_token(&config.data_dir) {
        Ok(t) => t,
        Err(e) => {
            warn!(err = %e, "could not create auth token — running without connection auth");
            String::new()
        }
    };

    let refresh_interval = std::time::Duration::from_secs(config.refresh.interval_secs);
    let cleanup = config.cleanup.clone();
    let ctx = Arc::new(AppContext::new(config, auth_token));

    // ── Background loops ─────────────────────────────────────────────────────
    tokio::spawn(tasks::janitor::run_task_janitor(
        ctx.task_registry.clone(),
        cleanup,
    ));

    let refresh_driver = RefreshDriver::spawn(
        refresh_interval,
        Arc::new(SnapshotPublisher::new(ctx.clone())),
    );

    let result = ipc::run(ctx).await;

    // The IPC loop only returns on shutdown — stop publishing snapshots too.
    refresh_driver.stop().await;
    result
}

async fn run_analyze(repo: &std::path::Path) -> Result<()> {
    let config = DaemonConfig::default();
    let manager = GitWorktreeManager::new(config.git_timeout_secs);
    let analyzer = OverlapAnalyzer::new(config.risk.clone());

    let analysis = analyzer
        .analyze(&manager, repo)
        .await
        .with_context(|| format!("analysis failed for {}", repo.display()))?;

    println!(
        "Overlapping files: {}  (high: {}, medium: {}, low: {})",
        analysis.total_overlaps,
        analysis.risk_assessment.high,
        analysis.risk_assessment.medium,
        analysis.risk_assessment.low
    );

    if !analysis.file_overlaps.is_empty() {
        println!("\n  {:<50} {:>8}  {}", "File", "Risk", "Worktrees");
        println!("  {}", "─".repeat(76));
        for overlap in &analysis.file_overlaps {
            let path = &overlap.file_path;
            let path_short = if path.len() > 50 {
                &path[path.len() - 50..]
            } else {
                path
            };
            let risk = match overlap.conflict_risk {
                ConflictRisk::High => "high",
                ConflictRisk::Medium => "medium",
                ConflictRisk::Low => "low",
            };
            println!(
                "  {:<50} {:>8}  {}",
                path_short,
                risk,
                overlap.worktrees.join(", ")
            );
        }
    }

    if !analysis.recommendations.is_empty() {
        println!();
        for recommendation in &analysis.recommendations {
            println!("  {recommendation}");
        }
    }

    if analysis.risk_assessment.high > 0 {
        std::process::exit(1);
    }
    Ok(())
}
