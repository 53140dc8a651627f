//! Overlap and dependency analysis.
//!
//! The engine turns a point-in-time snapshot of worktree change state into a
//! ranked conflict report. Every analysis run is a full recomputation — no
//! incremental state, no persistence — so two runs over the same snapshot
//! produce identical output.

pub mod dependencies;
pub mod overlap;

pub use dependencies::analyze_dependencies;
pub use overlap::OverlapAnalyzer;

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreResult;
use crate::worktree::ChangedFile;

// ── Snapshot source ──────────────────────────────────────────────────────────

/// Changed files of one worktree at snapshot time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorktreeChanges {
    pub worktree: String,
    pub files: Vec<ChangedFile>,
}

/// Provider of worktree change snapshots.
///
/// The daemon wires in the git worktree manager; tests inject fixed
/// snapshots. A failed snapshot is a transient condition — the engine
/// performs no partial computation over it.
#[async_trait::async_trait]
pub trait ChangeSource: Send + Sync {
    async fn snapshot(&self, repo_path: &Path) -> CoreResult<Vec<WorktreeChanges>>;
}

// ── Analysis results ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictRisk {
    Low,
    Medium,
    High,
}

/// A file modified by two or more worktrees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileOverlap {
    pub file_path: String,
    /// Names of the worktrees touching this file, sorted. Always ≥ 2.
    pub worktrees: Vec<String>,
    pub conflict_risk: ConflictRisk,
    /// Per-worktree last-modification time. BTreeMap keeps serialization
    /// byte-deterministic.
    pub last_modified: BTreeMap<String, DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub low: usize,
    pub medium: usize,
    pub high: usize,
}

/// One analysis run. A value object — never mutated after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlapAnalysis {
    pub total_overlaps: usize,
    /// Sorted by file path.
    pub file_overlaps: Vec<FileOverlap>,
    pub risk_assessment: RiskAssessment,
    pub recommendations: Vec<String>,
}

/// Dependency profile of one file, keyed by its path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyNode {
    /// File path — the node's identity.
    pub path: String,
    /// Display name (basename).
    pub name: String,
    /// Always "file" for now; reserved for finer granularity.
    pub node_type: String,
    pub dependencies: BTreeSet<String>,
    pub dependents: BTreeSet<String>,
    /// Non-negative; grows with fan-in and fan-out.
    pub impact_score: f64,
}
