//! CLI integration tests for falcon-config

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn falcon_config(temp_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("falcon-config").unwrap();
    for key in [
        "FALCON_HOST",
        "FALCON_PORT",
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
    cmd.env("FALCON_CONFIG", temp_dir.path().join("config.toml"));
    cmd
}

#[test]
fn test_check_with_nothing_configured_fails() {
    let temp_dir = TempDir::new().unwrap();
    falcon_config(&temp_dir)
        .arg("--check")
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("Bluesky: Not configured"))
        .stdout(predicate::str::contains("No publishers configured"))
        .stdout(predicate::str::contains("FALCON_DISCORD_WEBHOOK_URL"));
}

#[test]
fn test_check_with_discord_from_env() {
    let temp_dir = TempDir::new().unwrap();
    falcon_config(&temp_dir)
        .env(
            "FALCON_DISCORD_WEBHOOK_URL",
            "https://discord.com/api/webhooks/1/secret-token",
        )
        .arg("--check")
        .assert()
        .success()
        .stdout(predicate::str::contains("Discord: Configured"))
        .stdout(predicate::str::contains("Configured targets: discord"))
        .stdout(predicate::str::contains("secret-token").not());
}

#[test]
fn test_show_reads_config_file() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(
        temp_dir.path().join("config.toml"),
        r#"
[server]
port = 9090

[bluesky]
handle = "falcon.bsky.social"
app_password = "xxxx-xxxx-xxxx-xxxx"

[recommendations]
endpoint_url = "https://falcon.local/api/recommendations"
poll_interval = "5m"
"#,
    )
    .unwrap();

    falcon_config(&temp_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("Port: 9090"))
        .stdout(predicate::str::contains("Configured targets: bluesky"))
        .stdout(predicate::str::contains("URL: https://falcon.local/api/recommendations"))
        .stdout(predicate::str::contains("Poll Interval: 5m"))
        .stdout(predicate::str::contains("xxxx-xxxx").not());
}

#[test]
fn test_invalid_env_override_fails() {
    let temp_dir = TempDir::new().unwrap();
    falcon_config(&temp_dir)
        .env("FALCON_PORT", "eighty")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("FALCON_PORT"));
}
