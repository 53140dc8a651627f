//! Conflict-risk classification over worktree change snapshots.
//!
//! Classification rule, applied per overlapping file:
//!   1. generated/lock-style files are `low` regardless of who touches them
//!      (the override tables below, extendable via `[risk]` config);
//!   2. three or more worktrees → `high`;
//!   3. exactly two worktrees whose modification times fall within the
//!      recency window of each other → `high`;
//!   4. otherwise `medium`.
//!
//! The recency window defaults to 15 minutes (`RiskConfig`).

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;

use super::{
    ChangeSource, ConflictRisk, FileOverlap, OverlapAnalysis, RiskAssessment, WorktreeChanges,
};
use crate::config::RiskConfig;
use crate::error::CoreResult;

/// Exact file names that are regeneratable or trivially mergeable.
static LOW_RISK_FILE_NAMES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "Cargo.lock",
        "package-lock.json",
        "yarn.lock",
        "pnpm-lock.yaml",
        "composer.lock",
        "Gemfile.lock",
    ]
    .into_iter()
    .collect()
});

/// File-name suffixes of generated artifacts.
const LOW_RISK_SUFFIXES: &[&str] = &[".lock", ".min.js", ".min.css", ".map", ".snap"];

pub struct OverlapAnalyzer {
    risk: RiskConfig,
}

impl OverlapAnalyzer {
    pub fn new(risk: RiskConfig) -> Self {
        Self { risk }
    }

    /// Fetch a snapshot from `source` and analyze it.
    ///
    /// Snapshot failure surfaces as-is (transient); no partial analysis is
    /// produced.
    pub async fn analyze(
        &self,
        source: &dyn ChangeSource,
        repo_path: &Path,
    ) -> CoreResult<OverlapAnalysis> {
        let snapshot = source.snapshot(repo_path).await?;
        Ok(self.analyze_snapshot(&snapshot))
    }

    /// Pure analysis of a snapshot. Identical snapshots produce identical
    /// output — ordering is fixed and no clock is consulted.
    pub fn analyze_snapshot(&self, snapshot: &[WorktreeChanges]) -> OverlapAnalysis {
        // Group modification times by file path across worktrees.
        let mut by_file: BTreeMap<&str, BTreeMap<&str, DateTime<Utc>>> = BTreeMap::new();
        for changes in snapshot {
            for file in &changes.files {
                let stamps = by_file.entry(file.path.as_str()).or_default();
                // A worktree reports each path once; if it ever doesn't,
                // keep the most recent stamp.
                let entry = stamps.entry(changes.worktree.as_str()).or_insert(file.modified_at);
                if file.modified_at > *entry {
                    *entry = file.modified_at;
                }
            }
        }

        // Only files touched by at least two distinct worktrees overlap.
        let mut file_overlaps = Vec::new();
        for (path, stamps) in &by_file {
            if stamps.len() < 2 {
                continue;
            }
            let conflict_risk = self.classify(path, stamps);
            file_overlaps.push(FileOverlap {
                file_path: (*path).to_string(),
                worktrees: stamps.keys().map(|w| (*w).to_string()).collect(),
                conflict_risk,
                last_modified: stamps
                    .iter()
                    .map(|(w, t)| ((*w).to_string(), *t))
                    .collect(),
            });
        }

        let mut risk_assessment = RiskAssessment::default();
        for overlap in &file_overlaps {
            match overlap.conflict_risk {
                ConflictRisk::Low => risk_assessment.low += 1,
                ConflictRisk::Medium => risk_assessment.medium += 1,
                ConflictRisk::High => risk_assessment.high += 1,
            }
        }

        let recommendations = build_recommendations(&file_overlaps, &risk_assessment);

        OverlapAnalysis {
            total_overlaps: file_overlaps.len(),
            file_overlaps,
            risk_assessment,
            recommendations,
        }
    }

    fn classify(&self, path: &str, stamps: &BTreeMap<&str, DateTime<Utc>>) -> ConflictRisk {
        if self.is_low_risk_path(path) {
            return ConflictRisk::Low;
        }
        if stamps.len() >= 3 {
            return ConflictRisk::High;
        }
        // Exactly two worktrees: concurrent edits are high risk, stale
        // overlaps only medium.
        let mut times = stamps.values();
        match (times.next(), times.next()) {
            (Some(a), Some(b)) => {
                let gap = if a > b { *a - *b } else { *b - *a };
                if gap <= self.risk.recency_window() {
                    ConflictRisk::High
                } else {
                    ConflictRisk::Medium
                }
            }
            // Callers only classify overlaps with ≥ 2 worktrees.
            _ => ConflictRisk::Medium,
        }
    }

    fn is_low_risk_path(&self, path: &str) -> bool {
        let file_name = Path::new(path)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(path);
        if LOW_RISK_FILE_NAMES.contains(file_name)
            || self.risk.low_risk_files.iter().any(|f| f == file_name)
        {
            return true;
        }
        LOW_RISK_SUFFIXES
            .iter()
            .any(|suffix| file_name.ends_with(suffix))
            || self
                .risk
                .low_risk_suffixes
                .iter()
                .any(|suffix| file_name.ends_with(suffix.as_str()))
    }
}

/// Recommendation text is data; its presence and ordering are behavior.
///
/// Order: per-tier counts (highest tier first), most-problematic-file
/// callout, then coordination suggestions. Empty when nothing overlaps.
fn build_recommendations(
    overlaps: &[FileOverlap],
    assessment: &RiskAssessment,
) -> Vec<String> {
    let mut recommendations = Vec::new();
    if overlaps.is_empty() {
        return recommendations;
    }

    if assessment.high > 0 {
        recommendations.push(format!(
            "{} file(s) have high conflict risk. Consider coordinating changes or merging frequently.",
            assessment.high
        ));
    }
    if assessment.medium > 0 {
        recommendations.push(format!(
            "{} file(s) have medium conflict risk. Review changes before merging.",
            assessment.medium
        ));
    }
    if assessment.low > 0 {
        recommendations.push(format!(
            "{} file(s) have low conflict risk.",
            assessment.low
        ));
    }

    // Most problematic: largest worktree fan-out; overlaps are sorted by
    // path, so the first maximum is the lexicographically smallest tie.
    if let Some(max_count) = overlaps.iter().map(|o| o.worktrees.len()).max() {
        if let Some(worst) = overlaps.iter().find(|o| o.worktrees.len() == max_count) {
            recommendations.push(format!(
                "Most problematic file: {} (modified in {} worktrees)",
                worst.file_path,
                worst.worktrees.len()
            ));
        }
    }

    if overlaps.len() > 5 {
        recommendations.push(
            "Consider splitting work into smaller, more focused branches to reduce overlap."
                .to_string(),
        );
    }
    if overlaps.iter().any(|o| o.worktrees.len() > 3) {
        recommendations.push(
            "Some files are modified in more than 3 worktrees. Consider designating an owner."
                .to_string(),
        );
    }

    recommendations
}
