//! CLI integration tests for falcon-recs

use assert_cmd::Command;
use axum::routing::get;
use axum::{Json, Router};
use predicates::prelude::*;
use serde_json::json;
use std::fs;
use tempfile::TempDir;

/// falcon-recs with an isolated config whose history lives in `temp_dir`
fn falcon_recs(temp_dir: &TempDir) -> Command {
    let config_path = temp_dir.path().join("config.toml");
    let history_path = temp_dir.path().join("posted.db");
    fs::write(
        &config_path,
        format!(
            "[recommendations]\ntracker_path = \"{}\"\n",
            history_path.to_string_lossy().replace('\\', "\\\\")
        ),
    )
    .unwrap();

    let mut cmd = Command::cargo_bin("falcon-recs").unwrap();
    for key in [
        "FALCON_DEBUG",
        "FALCON_BLUESKY_HANDLE",
        "FALCON_BLUESKY_APP_PASSWORD",
        "FALCON_DISCORD_WEBHOOK_URL",
        "FALCON_ENDPOINT_URL",
        "FALCON_POLL_INTERVAL",
        "FALCON_VERIFY_SSL",
    ] {
        cmd.env_remove(key);
    }
    cmd.env("FALCON_CONFIG", config_path);
    cmd
}

#[test]
fn test_missing_endpoint_fails() {
    let temp_dir = TempDir::new().unwrap();
    falcon_recs(&temp_dir)
        .arg("--once")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Falcon endpoint not configured"));
}

#[test]
fn test_missing_discord_fails_unless_dry_run() {
    let temp_dir = TempDir::new().unwrap();
    falcon_recs(&temp_dir)
        .args(["--once", "--endpoint", "http://127.0.0.1:9/api/recommendations"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Discord not configured"));
}

#[test]
fn test_empty_history() {
    let temp_dir = TempDir::new().unwrap();
    falcon_recs(&temp_dir)
        .arg("--show-history")
        .assert()
        .success()
        .stdout(predicate::str::contains("No posted tickers in history."));

    falcon_recs(&temp_dir)
        .arg("--clear-history")
        .assert()
        .success()
        .stdout(predicate::str::contains("Cleared 0 tickers from history."));
}

#[test]
fn test_invalid_interval_rejected() {
    let temp_dir = TempDir::new().unwrap();
    falcon_recs(&temp_dir)
        .args(["--interval", "soon"])
        .assert()
        .failure()
        .code(2);
}

async fn spawn_endpoint() -> String {
    let router = Router::new().route(
        "/api/recommendations",
        get(|| async {
            Json(json!({
                "recommendations": [
                    {"ticker": "AAPL", "company": "Apple Inc.", "sector": "Technology"},
                    {"ticker": "AMD", "company": "Advanced Micro Devices"}
                ]
            }))
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}/api/recommendations", addr)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_dry_run_previews_without_discord() {
    let endpoint = spawn_endpoint().await;
    let temp_dir = TempDir::new().unwrap();
    let mut cmd = falcon_recs(&temp_dir);
    cmd.args(["--dry-run", "--no-rvol-check", "--endpoint", &endpoint]);

    let assert = tokio::task::spawn_blocking(move || cmd.assert())
        .await
        .unwrap();
    assert
        .success()
        .stdout(predicate::str::contains("Found 2 recommendations (min RVOL: 2):"))
        .stdout(predicate::str::contains("--- 1/2 [N/A] ---"))
        .stdout(predicate::str::contains("**$AAPL** - Apple Inc."))
        .stdout(predicate::str::contains("--- 2/2 [N/A] ---"));
}
