//! Basic CLI E2E tests.
//!
//! Each test runs the built binary against its own HOME so state never leaks
//! between tests or into the user's data directory.

use std::path::Path;
use std::process::Command;

use chrono::{Days, Local};

fn run_cli(home: &Path, args: &[&str]) -> (i32, String, String) {
    let output = Command::new(env!("CARGO_BIN_EXE_stride"))
        .args(args)
        .env("HOME", home)
        .env_remove("STRIDE_ENV")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (code, stdout, stderr)
}

fn json(stdout: &str) -> serde_json::Value {
    serde_json::from_str(stdout).unwrap_or_else(|e| panic!("invalid JSON ({e}): {stdout}"))
}

fn yesterday() -> String {
    (Local::now().date_naive() - Days::new(1))
        .format("%Y-%m-%d")
        .to_string()
}

#[test]
fn test_log_and_add() {
    let home = tempfile::tempdir().unwrap();
    let (code, stdout, _) = run_cli(home.path(), &["log", "4000"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("4000 / 10000"), "{stdout}");

    let (code, stdout, _) = run_cli(home.path(), &["log", "--add", "2500"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("6500 / 10000"), "{stdout}");
}

#[test]
fn test_log_future_day_rejected() {
    let home = tempfile::tempdir().unwrap();
    let (code, _, stderr) = run_cli(home.path(), &["log", "100", "--day", "2999-01-01"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("future"), "{stderr}");
}

#[test]
fn test_check_credits_yesterday() {
    let home = tempfile::tempdir().unwrap();
    let day = yesterday();
    let (code, _, _) = run_cli(home.path(), &["log", "12000", "--day", &day]);
    assert_eq!(code, 0);

    let (code, stdout, _) = run_cli(home.path(), &["check"]);
    assert_eq!(code, 0);
    let report = json(&stdout);
    assert_eq!(report["outcome"]["kind"], "started");
    assert_eq!(report["streak"], 1);
    assert_eq!(report["balance"], 3);

    let (code, stdout, _) = run_cli(home.path(), &["check"]);
    assert_eq!(code, 0);
    let again = json(&stdout);
    assert_eq!(again["outcome"]["kind"], "already_evaluated");
    assert_eq!(again["streak"], 1);
}

#[test]
fn test_status_fresh_install() {
    let home = tempfile::tempdir().unwrap();
    let (code, stdout, _) = run_cli(home.path(), &["status"]);
    assert_eq!(code, 0);
    let status = json(&stdout);
    assert_eq!(status["streak"], 0);
    assert_eq!(status["goal"], 10000);
    assert_eq!(status["passes"]["balance"], 3);
    assert_eq!(status["today_count"], 0);
}

#[test]
fn test_history_json() {
    let home = tempfile::tempdir().unwrap();
    let day = yesterday();
    run_cli(home.path(), &["log", "10000", "--day", &day]);

    let (code, stdout, _) = run_cli(home.path(), &["history", "--days", "3", "--json"]);
    assert_eq!(code, 0);
    let rows = json(&stdout);
    let rows = rows.as_array().unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[1]["day"], day.as_str());
    assert_eq!(rows[1]["goal_met"], true);
    assert_eq!(rows[0]["count"], serde_json::Value::Null);
}

#[test]
fn test_config_set_get() {
    let home = tempfile::tempdir().unwrap();
    let (code, _, _) = run_cli(home.path(), &["config", "set", "goal.daily_steps", "500"]);
    assert_eq!(code, 0);

    let (code, stdout, _) = run_cli(home.path(), &["config", "get", "goal.daily_steps"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "500");

    let (_, stdout, _) = run_cli(home.path(), &["log", "600"]);
    assert!(stdout.contains("600 / 500"), "{stdout}");
}

#[test]
fn test_config_rejects_invalid() {
    let home = tempfile::tempdir().unwrap();
    let (code, _, _) = run_cli(home.path(), &["config", "set", "goal.daily_steps", "0"]);
    assert_eq!(code, 1);
    let (code, _, _) = run_cli(home.path(), &["config", "get", "no.such.key"]);
    assert_eq!(code, 1);
}

#[test]
fn test_affirm() {
    let home = tempfile::tempdir().unwrap();
    let (code, stdout, _) = run_cli(home.path(), &["affirm"]);
    assert_eq!(code, 0);
    assert!(!stdout.trim().is_empty());
}
