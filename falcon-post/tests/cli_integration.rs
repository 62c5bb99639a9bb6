//! CLI integration tests for falcon-post

use assert_cmd::Command;
use axum::routing::post;
use axum::{Json, Router};
use predicates::prelude::*;
use serde_json::{json, Value};
use std::fs;
use tempfile::TempDir;

const FALCON_ENV: &[&str] = &[
    "FALCON_HOST",
    "FALCON_PORT",
    "FALCON_DEBUG",
    "FALCON_BLUESKY_HANDLE",
    "FALCON_BLUESKY_APP_PASSWORD",
    "FALCON_DISCORD_WEBHOOK_URL",
    "FALCON_ENDPOINT_URL",
    "FALCON_POLL_INTERVAL",
    "FALCON_VERIFY_SSL",
    "FALCON_LOG_FORMAT",
    "FALCON_LOG_LEVEL",
];

/// falcon-post with an isolated, empty configuration
fn falcon_post(temp_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("falcon-post").unwrap();
    for key in FALCON_ENV {
        cmd.env_remove(key);
    }
    cmd.env("FALCON_CONFIG", temp_dir.path().join("config.toml"));
    cmd
}

#[test]
fn test_help_flag_output() {
    let temp_dir = TempDir::new().unwrap();
    falcon_post(&temp_dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--target"))
        .stdout(predicate::str::contains("--image-url"))
        .stdout(predicate::str::contains("--metadata"))
        .stdout(predicate::str::contains("--format"));
}

#[test]
fn test_nothing_configured_is_invalid_input() {
    let temp_dir = TempDir::new().unwrap();
    falcon_post(&temp_dir)
        .arg("Hello")
        .assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("No valid targets"));
}

#[test]
fn test_unknown_target_rejected() {
    let temp_dir = TempDir::new().unwrap();
    falcon_post(&temp_dir)
        .env("FALCON_DISCORD_WEBHOOK_URL", "http://127.0.0.1:9/webhooks/1/token")
        .args(["-t", "myspace", "Hello"])
        .assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("Unknown target platform: myspace"));
}

#[test]
fn test_empty_message_rejected() {
    let temp_dir = TempDir::new().unwrap();
    falcon_post(&temp_dir)
        .env("FALCON_DISCORD_WEBHOOK_URL", "http://127.0.0.1:9/webhooks/1/token")
        .arg("   ")
        .assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("cannot be empty"));
}

#[test]
fn test_empty_stdin_rejected() {
    let temp_dir = TempDir::new().unwrap();
    falcon_post(&temp_dir)
        .env("FALCON_DISCORD_WEBHOOK_URL", "http://127.0.0.1:9/webhooks/1/token")
        .write_stdin("")
        .assert()
        .failure()
        .code(3);
}

#[test]
fn test_both_image_flags_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let image = temp_dir.path().join("chart.png");
    fs::write(&image, b"\x89PNG\r\n\x1a\n0000").unwrap();

    falcon_post(&temp_dir)
        .env("FALCON_DISCORD_WEBHOOK_URL", "http://127.0.0.1:9/webhooks/1/token")
        .arg("-i")
        .arg(&image)
        .args(["--image-url", "https://example.com/chart.png", "Chart"])
        .assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("Only one of image_url or image_data"));
}

#[test]
fn test_invalid_metadata_json_rejected() {
    let temp_dir = TempDir::new().unwrap();
    falcon_post(&temp_dir)
        .env("FALCON_DISCORD_WEBHOOK_URL", "http://127.0.0.1:9/webhooks/1/token")
        .args(["-m", "{not json", "Hello"])
        .assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("Invalid metadata JSON"));
}

#[test]
fn test_unreachable_target_is_partial_failure() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(
        temp_dir.path().join("config.toml"),
        "[dispatch]\nretry_attempts = 1\nrequest_timeout = 2\n",
    )
    .unwrap();

    falcon_post(&temp_dir)
        .env("FALCON_DISCORD_WEBHOOK_URL", "http://127.0.0.1:9/webhooks/1/token")
        .args(["-f", "json", "Hello"])
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("\"success\": false"))
        .stdout(predicate::str::contains("transport_error"));
}

async fn spawn_webhook() -> String {
    let router = Router::new().route(
        "/webhooks/1/token",
        post(|Json(body): Json<Value>| async move {
            assert!(body["content"].as_str().unwrap().contains("$AAPL"));
            Json(json!({"id": "998877"}))
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}/webhooks/1/token", addr)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_publish_alert_to_discord_stub() {
    let webhook = spawn_webhook().await;
    let temp_dir = TempDir::new().unwrap();
    let mut cmd = falcon_post(&temp_dir);
    cmd.env("FALCON_DISCORD_WEBHOOK_URL", webhook).args([
        "-t",
        "discord",
        "-m",
        r#"{"source":"super-signal","ticker":"AAPL","risk_count":1,"risk_flags":["Low float"]}"#,
        "AAPL alert",
    ]);

    let assert = tokio::task::spawn_blocking(move || cmd.assert())
        .await
        .unwrap();
    assert.success().stdout(predicate::str::contains("discord:998877"));
}
