//! Boundary tests: JSON-RPC dispatch, error-code mapping, and wire formats.

use grove::config::DaemonConfig;
use grove::{ipc, AppContext};
use serde_json::Value;
use tempfile::TempDir;

fn test_ctx() -> (TempDir, AppContext) {
    let tmp = TempDir::new().expect("tempdir");
    let mut config = DaemonConfig::new(None, Some(tmp.path().to_path_buf()), None, None);
    // `sleep` stands in for the coding-agent CLI: tasks stay deterministically
    // in `running` until cancelled.
    config.runner.claude_command = "sleep".to_string();
    // Empty token: dispatch-level tests bypass the connection handshake.
    (tmp, AppContext::new(config, String::new()))
}

async fn call(ctx: &AppContext, method: &str, params: Value) -> Value {
    let req = serde_json::json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": method,
        "params": params,
    });
    let raw = ipc::dispatch_text(&req.to_string(), ctx).await;
    serde_json::from_str(&raw).expect("valid response json")
}

fn error_code(response: &Value) -> i64 {
    response["error"]["code"].as_i64().expect("error code")
}

#[tokio::test]
async fn ping_pongs() {
    let (_tmp, ctx) = test_ctx();
    let resp = call(&ctx, "daemon.ping", Value::Null).await;
    assert_eq!(resp["result"]["pong"], true);
}

#[tokio::test]
async fn unknown_method_is_method_not_found() {
    let (_tmp, ctx) = test_ctx();
    let resp = call(&ctx, "no.such.method", Value::Null).await;
    assert_eq!(error_code(&resp), -32601);
}

#[tokio::test]
async fn parse_error_is_reported() {
    let (_tmp, ctx) = test_ctx();
    let raw = ipc::dispatch_text("{not json", &ctx).await;
    let resp: Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(error_code(&resp), -32700);
}

#[tokio::test]
async fn wrong_jsonrpc_version_is_invalid_request() {
    let (_tmp, ctx) = test_ctx();
    let raw = ipc::dispatch_text(
        r#"{"jsonrpc":"1.0","id":1,"method":"daemon.ping"}"#,
        &ctx,
    )
    .await;
    let resp: Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(error_code(&resp), -32600);
}

#[tokio::test]
async fn malformed_params_map_to_invalid_params() {
    let (_tmp, ctx) = test_ctx();
    // Missing every required field.
    let resp = call(&ctx, "start_claude_task", serde_json::json!({})).await;
    assert_eq!(error_code(&resp), -32602);
}

#[tokio::test]
async fn unknown_task_maps_to_task_not_found_code() {
    let (_tmp, ctx) = test_ctx();
    let resp = call(
        &ctx,
        "get_claude_task_status",
        serde_json::json!({ "taskId": "missing" }),
    )
    .await;
    assert_eq!(error_code(&resp), -32001);

    let resp = call(
        &ctx,
        "cancel_claude_task",
        serde_json::json!({ "taskId": "missing" }),
    )
    .await;
    assert_eq!(error_code(&resp), -32001);
}

#[tokio::test]
async fn unknown_repo_maps_to_invalid_params() {
    let (_tmp, ctx) = test_ctx();
    let resp = call(
        &ctx,
        "list_worktrees",
        serde_json::json!({ "repoPath": "/definitely/not/a/repo" }),
    )
    .await;
    assert_eq!(error_code(&resp), -32602);
}

#[tokio::test]
async fn task_roundtrip_uses_iso8601_timestamps() {
    let (_tmp, ctx) = test_ctx();

    // A directory that passes worktree-checkout validation.
    let wt = TempDir::new().unwrap();
    std::fs::create_dir(wt.path().join(".git")).unwrap();

    let resp = call(
        &ctx,
        "start_claude_task",
        serde_json::json!({
            "worktreeName": "feature-a",
            "workingDirectory": wt.path().to_str().unwrap(),
            "taskDescription": "30",
        }),
    )
    .await;
    let task_id = resp["result"].as_str().expect("task id string").to_string();

    let resp = call(
        &ctx,
        "get_claude_task_status",
        serde_json::json!({ "taskId": task_id }),
    )
    .await;
    let task = &resp["result"];
    assert_eq!(task["status"], "running");
    assert_eq!(task["worktree_name"], "feature-a");

    // Timestamps cross the boundary as ISO-8601 strings.
    let started = task["started_at"].as_str().expect("started_at string");
    chrono::DateTime::parse_from_rfc3339(started).expect("parseable ISO-8601");
    assert!(task["completed_at"].is_null());

    let resp = call(&ctx, "list_claude_tasks", Value::Null).await;
    let tasks = resp["result"].as_array().expect("task array");
    assert!(tasks.iter().any(|t| t["id"] == task_id.as_str()));

    let resp = call(&ctx, "cleanup_completed_claude_tasks", Value::Null).await;
    assert_eq!(resp["result"], 0, "running task is not swept");

    // Cancel over the wire: null result, then failed status with an
    // ISO-8601 completion timestamp.
    let resp = call(
        &ctx,
        "cancel_claude_task",
        serde_json::json!({ "taskId": task_id }),
    )
    .await;
    assert!(resp["result"].is_null());

    let resp = call(
        &ctx,
        "get_claude_task_status",
        serde_json::json!({ "taskId": task_id }),
    )
    .await;
    assert_eq!(resp["result"]["status"], "failed");
    let completed = resp["result"]["completed_at"].as_str().expect("completed_at");
    chrono::DateTime::parse_from_rfc3339(completed).expect("parseable ISO-8601");

    // Second cancel pins the strict policy at the boundary: conflict code.
    let resp = call(
        &ctx,
        "cancel_claude_task",
        serde_json::json!({ "taskId": task_id }),
    )
    .await;
    assert_eq!(error_code(&resp), -32002);
}

#[tokio::test]
async fn overlap_analysis_over_a_real_repo() {
    let (_tmp, ctx) = test_ctx();

    let repo_dir = TempDir::new().unwrap();
    let repo = git2::Repository::init(repo_dir.path()).unwrap();
    let sig = git2::Signature::now("Test", "test@example.com").unwrap();
    let tree_id = {
        let blob = repo.blob(b"initial\n").unwrap();
        let mut tb = repo.treebuilder(None).unwrap();
        tb.insert("README", blob, 0o100644).unwrap();
        tb.write().unwrap()
    };
    let tree = repo.find_tree(tree_id).unwrap();
    repo.commit(Some("HEAD"), &sig, &sig, "Initial commit", &tree, &[])
        .unwrap();

    // No worktrees yet: a clean, empty analysis.
    let resp = call(
        &ctx,
        "analyze_worktree_overlaps",
        serde_json::json!({ "repoPath": repo_dir.path().to_str().unwrap() }),
    )
    .await;
    let analysis = &resp["result"];
    assert_eq!(analysis["total_overlaps"], 0);
    assert_eq!(analysis["recommendations"].as_array().unwrap().len(), 0);

    // The repo is now watched for refresh snapshots.
    assert_eq!(ctx.watched_repos.read().await.len(), 1);
}

#[tokio::test]
async fn dependency_analysis_never_drops_inputs() {
    let (_tmp, ctx) = test_ctx();
    let repo = TempDir::new().unwrap();
    std::fs::write(repo.path().join("real.ts"), "import \"./other\";\n").unwrap();

    let resp = call(
        &ctx,
        "analyze_file_dependencies",
        serde_json::json!({
            "repoPath": repo.path().to_str().unwrap(),
            "filePaths": ["real.ts", "ghost.ts"],
        }),
    )
    .await;
    let nodes = resp["result"].as_array().expect("node array");
    assert_eq!(nodes.len(), 2);
    assert_eq!(nodes[0]["path"], "real.ts");
    assert_eq!(nodes[0]["node_type"], "file");
    assert_eq!(nodes[1]["path"], "ghost.ts");
    assert_eq!(nodes[1]["impact_score"], 0.0);
}
