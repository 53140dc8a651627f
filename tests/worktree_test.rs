//! Integration tests for the git worktree manager, against real temporary
//! repositories.

use grove::error::CoreError;
use grove::worktree::{GitWorktreeManager, WorktreeStatus};
use tempfile::TempDir;

/// Create a minimal git repository suitable for worktree tests.
fn init_test_repo(dir: &std::path::Path) -> Result<(), Box<dyn std::error::Error>> {
    let repo = git2::Repository::init(dir)?;

    // Need at least one commit before we can create branches/worktrees.
    let sig = git2::Signature::now("Test", "test@example.com")?;
    let tree_id = {
        let blob = repo.blob(b"initial\n")?;
        let mut tb = repo.treebuilder(None)?;
        tb.insert("README", blob, 0o100644)?;
        tb.write()?
    };
    let tree = repo.find_tree(tree_id)?;
    repo.commit(Some("HEAD"), &sig, &sig, "Initial commit", &tree, &[])?;

    Ok(())
}

fn setup() -> (TempDir, std::path::PathBuf, GitWorktreeManager) {
    let tmp = TempDir::new().expect("tempdir");
    let repo_dir = tmp.path().join("repo");
    std::fs::create_dir_all(&repo_dir).unwrap();
    init_test_repo(&repo_dir).expect("init repo");
    let manager = GitWorktreeManager::new(30);
    (tmp, repo_dir, manager)
}

#[tokio::test]
async fn create_and_list_worktree() {
    let (_tmp, repo_dir, manager) = setup();

    let info = manager
        .create(&repo_dir, "feature-a", "feature/login")
        .await
        .expect("create worktree");

    assert_eq!(info.name, "feature-a");
    assert_eq!(info.branch, "feature/login");
    assert!(info.path.exists(), "worktree directory should exist");
    assert!(!info.id.is_empty());

    let list = manager.list(&repo_dir).await.expect("list");
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].name, "feature-a");
    assert_eq!(list[0].branch, "feature/login");

    // Identity is assigned once — a second observation returns the same id.
    let again = manager.list(&repo_dir).await.expect("list again");
    assert_eq!(list[0].id, again[0].id);
    assert_eq!(list[0].created_at, again[0].created_at);
}

#[tokio::test]
async fn create_validates_input() {
    let (_tmp, repo_dir, manager) = setup();

    let err = manager.create(&repo_dir, "", "branch").await.unwrap_err();
    assert!(matches!(err, CoreError::InvalidRequest(_)), "{err}");

    let err = manager
        .create(std::path::Path::new("/nope/nothing"), "a", "b")
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidRequest(_)), "{err}");
}

#[tokio::test]
async fn status_reflects_uncommitted_changes() {
    let (_tmp, repo_dir, manager) = setup();

    let info = manager
        .create(&repo_dir, "feature-b", "feature/api")
        .await
        .expect("create");

    // Fresh checkout is clean.
    let list = manager.list(&repo_dir).await.unwrap();
    assert_eq!(list[0].status, WorktreeStatus::Idle);
    let files = manager.changed_files(&repo_dir, "feature-b").await.unwrap();
    assert!(files.is_empty());

    // Touch a tracked file and add a new one.
    std::fs::write(info.path.join("README"), "changed\n").unwrap();
    std::fs::write(info.path.join("new.ts"), "export {};\n").unwrap();

    let files = manager.changed_files(&repo_dir, "feature-b").await.unwrap();
    let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
    assert!(paths.contains(&"README"), "modified file listed: {paths:?}");
    assert!(paths.contains(&"new.ts"), "untracked file listed: {paths:?}");

    let list = manager.list(&repo_dir).await.unwrap();
    assert_eq!(list[0].status, WorktreeStatus::Active);
}

#[tokio::test]
async fn last_activity_never_moves_backwards() {
    let (_tmp, repo_dir, manager) = setup();

    let info = manager
        .create(&repo_dir, "feature-c", "feature/cache")
        .await
        .expect("create");

    let before = manager.list(&repo_dir).await.unwrap()[0].last_activity;

    std::fs::write(info.path.join("touched.ts"), "let x = 1;\n").unwrap();
    let after = manager.list(&repo_dir).await.unwrap()[0].last_activity;
    assert!(after >= before);

    // Observing again without new changes must not regress the clock.
    let again = manager.list(&repo_dir).await.unwrap()[0].last_activity;
    assert!(again >= after);
}

#[tokio::test]
async fn delete_removes_worktree_and_directory() {
    let (_tmp, repo_dir, manager) = setup();

    let info = manager
        .create(&repo_dir, "feature-d", "feature/doomed")
        .await
        .expect("create");
    assert!(info.path.exists());

    manager.delete(&repo_dir, "feature-d").await.expect("delete");
    assert!(!info.path.exists(), "directory removed");
    assert!(manager.list(&repo_dir).await.unwrap().is_empty());

    // Deleting again is not-found, not a silent success.
    let err = manager.delete(&repo_dir, "feature-d").await.unwrap_err();
    assert!(matches!(err, CoreError::WorktreeNotFound(_)), "{err}");
}

#[tokio::test]
async fn changed_files_for_unknown_worktree_is_not_found() {
    let (_tmp, repo_dir, manager) = setup();
    let err = manager
        .changed_files(&repo_dir, "never-created")
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::WorktreeNotFound(_)), "{err}");
}

#[tokio::test]
async fn find_by_path_resolves_checkout_directories() {
    let (_tmp, repo_dir, manager) = setup();

    let info = manager
        .create(&repo_dir, "feature-e", "feature/find")
        .await
        .expect("create");

    let found = manager
        .find_by_path(&repo_dir, &info.path)
        .await
        .expect("lookup");
    assert_eq!(found.map(|w| w.name), Some("feature-e".to_string()));

    let missing = manager
        .find_by_path(&repo_dir, std::path::Path::new("/elsewhere"))
        .await
        .expect("lookup");
    assert!(missing.is_none());
}

#[tokio::test]
async fn snapshot_covers_all_worktrees() {
    use grove::analysis::ChangeSource;

    let (_tmp, repo_dir, manager) = setup();

    let a = manager.create(&repo_dir, "wt-a", "branch-a").await.unwrap();
    let b = manager.create(&repo_dir, "wt-b", "branch-b").await.unwrap();

    std::fs::write(a.path.join("shared.ts"), "a\n").unwrap();
    std::fs::write(b.path.join("shared.ts"), "b\n").unwrap();

    let snapshot = manager.snapshot(&repo_dir).await.expect("snapshot");
    assert_eq!(snapshot.len(), 2);
    for changes in &snapshot {
        assert!(
            changes.files.iter().any(|f| f.path == "shared.ts"),
            "each worktree reports its change"
        );
    }
}
