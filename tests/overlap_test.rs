//! Integration tests for the overlap analysis engine.
//!
//! The engine is exercised through the `ChangeSource` seam with fixed
//! snapshots, so timing is fully controlled and results are reproducible.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use grove::analysis::{
    ChangeSource, ConflictRisk, OverlapAnalyzer, WorktreeChanges,
};
use grove::config::RiskConfig;
use grove::error::{CoreError, CoreResult};
use grove::worktree::ChangedFile;
use proptest::prelude::*;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
}

fn changes(worktree: &str, files: &[(&str, i64)]) -> WorktreeChanges {
    WorktreeChanges {
        worktree: worktree.to_string(),
        files: files
            .iter()
            .map(|(path, mins)| ChangedFile {
                path: (*path).to_string(),
                modified_at: t0() + chrono::Duration::minutes(*mins),
            })
            .collect(),
    }
}

struct FixedSource(Vec<WorktreeChanges>);

#[async_trait]
impl ChangeSource for FixedSource {
    async fn snapshot(&self, _repo_path: &Path) -> CoreResult<Vec<WorktreeChanges>> {
        Ok(self.0.clone())
    }
}

struct BrokenSource;

#[async_trait]
impl ChangeSource for BrokenSource {
    async fn snapshot(&self, _repo_path: &Path) -> CoreResult<Vec<WorktreeChanges>> {
        Err(CoreError::Transient("snapshot unavailable".to_string()))
    }
}

fn analyzer() -> OverlapAnalyzer {
    OverlapAnalyzer::new(RiskConfig::default())
}

#[tokio::test]
async fn two_worktree_scenario_classifies_per_recency() {
    // frontend-feature touches types/index.ts at T+0 and package.json at
    // T+15; backend-api touches types/index.ts at T+5 and package.json at
    // T+45. The 5-minute gap is concurrent work, the 30-minute gap is not.
    let source = FixedSource(vec![
        changes("frontend-feature", &[("types/index.ts", 0), ("package.json", 15)]),
        changes("backend-api", &[("types/index.ts", 5), ("package.json", 45)]),
    ]);

    let analysis = analyzer()
        .analyze(&source, Path::new("/repo"))
        .await
        .expect("analysis");

    assert_eq!(analysis.total_overlaps, 2);

    let by_path = |p: &str| {
        analysis
            .file_overlaps
            .iter()
            .find(|o| o.file_path == p)
            .unwrap_or_else(|| panic!("{p} missing"))
    };
    assert_eq!(by_path("types/index.ts").conflict_risk, ConflictRisk::High);
    assert_eq!(by_path("package.json").conflict_risk, ConflictRisk::Medium);

    assert_eq!(analysis.risk_assessment.low, 0);
    assert_eq!(analysis.risk_assessment.medium, 1);
    assert_eq!(analysis.risk_assessment.high, 1);

    // Both worktrees appear, sorted, with their own timestamps.
    let overlap = by_path("types/index.ts");
    assert_eq!(overlap.worktrees, vec!["backend-api", "frontend-feature"]);
    assert_eq!(overlap.last_modified["frontend-feature"], t0());
    assert_eq!(
        overlap.last_modified["backend-api"],
        t0() + chrono::Duration::minutes(5)
    );
}

#[tokio::test]
async fn empty_worktree_set_yields_empty_analysis() {
    let analysis = analyzer()
        .analyze(&FixedSource(vec![]), Path::new("/repo"))
        .await
        .expect("analysis");
    assert_eq!(analysis.total_overlaps, 0);
    assert!(analysis.file_overlaps.is_empty());
    assert!(analysis.recommendations.is_empty());
    assert_eq!(analysis.risk_assessment, Default::default());
}

#[tokio::test]
async fn disjoint_files_yield_no_overlaps() {
    let source = FixedSource(vec![
        changes("a", &[("src/a.rs", 0)]),
        changes("b", &[("src/b.rs", 0)]),
        changes("c", &[]),
    ]);
    let analysis = analyzer()
        .analyze(&source, Path::new("/repo"))
        .await
        .expect("analysis");
    assert_eq!(analysis.total_overlaps, 0);
    assert!(analysis.recommendations.is_empty());
}

#[tokio::test]
async fn snapshot_failure_is_transient_with_no_partial_result() {
    let err = analyzer()
        .analyze(&BrokenSource, Path::new("/repo"))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Transient(_)), "{err}");
}

#[tokio::test]
async fn identical_snapshots_produce_identical_json() {
    let source = FixedSource(vec![
        changes("a", &[("x.ts", 0), ("y.ts", 2), ("z.ts", 50)]),
        changes("b", &[("x.ts", 1), ("z.ts", 4)]),
        changes("c", &[("x.ts", 90)]),
    ]);

    let one = analyzer().analyze(&source, Path::new("/repo")).await.unwrap();
    let two = analyzer().analyze(&source, Path::new("/repo")).await.unwrap();
    assert_eq!(
        serde_json::to_string(&one).unwrap(),
        serde_json::to_string(&two).unwrap()
    );
}

#[tokio::test]
async fn recommendations_name_the_most_problematic_file() {
    let source = FixedSource(vec![
        changes("a", &[("hot.ts", 0), ("warm.ts", 0)]),
        changes("b", &[("hot.ts", 1), ("warm.ts", 1)]),
        changes("c", &[("hot.ts", 2)]),
    ]);
    let analysis = analyzer().analyze(&source, Path::new("/repo")).await.unwrap();

    let callout = analysis
        .recommendations
        .iter()
        .find(|r| r.starts_with("Most problematic file:"))
        .expect("callout");
    assert!(callout.contains("hot.ts"));
    assert!(callout.contains("3 worktrees"));
}

// ── Properties ───────────────────────────────────────────────────────────────

/// Small synthetic snapshots: up to 4 worktrees, files drawn from a closed
/// set of names so overlaps actually occur.
fn snapshot_strategy() -> impl Strategy<Value = Vec<WorktreeChanges>> {
    let file = (0usize..6, 0i64..120).prop_map(|(n, mins)| (format!("file-{n}.ts"), mins));
    let files = proptest::collection::vec(file, 0..6);
    proptest::collection::vec(files, 0..4).prop_map(|worktrees| {
        worktrees
            .into_iter()
            .enumerate()
            .map(|(i, files)| WorktreeChanges {
                worktree: format!("wt-{i}"),
                files: files
                    .into_iter()
                    .map(|(path, mins)| ChangedFile {
                        path,
                        modified_at: t0() + chrono::Duration::minutes(mins),
                    })
                    .collect(),
            })
            .collect()
    })
}

proptest! {
    #[test]
    fn overlaps_always_have_at_least_two_worktrees(snapshot in snapshot_strategy()) {
        let analysis = analyzer().analyze_snapshot(&snapshot);
        for overlap in &analysis.file_overlaps {
            prop_assert!(overlap.worktrees.len() >= 2);
            prop_assert_eq!(overlap.worktrees.len(), overlap.last_modified.len());
        }
    }

    #[test]
    fn risk_tally_matches_total(snapshot in snapshot_strategy()) {
        let analysis = analyzer().analyze_snapshot(&snapshot);
        let tally = analysis.risk_assessment.low
            + analysis.risk_assessment.medium
            + analysis.risk_assessment.high;
        prop_assert_eq!(tally, analysis.total_overlaps);
        prop_assert_eq!(analysis.file_overlaps.len(), analysis.total_overlaps);
    }

    #[test]
    fn analysis_is_order_independent(snapshot in snapshot_strategy()) {
        let mut reversed = snapshot.clone();
        reversed.reverse();
        let one = analyzer().analyze_snapshot(&snapshot);
        let two = analyzer().analyze_snapshot(&reversed);
        prop_assert_eq!(one, two);
    }
}
