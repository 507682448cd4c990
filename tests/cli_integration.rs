use std::path::PathBuf;
use std::process::{Command, Output};

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("telearc-it-{}-{}", name, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).expect("scratch dir");
    dir
}

fn run_telearc(data_dir: &PathBuf, groups: Option<&str>, args: &[&str]) -> Output {
    let mut command = Command::new(env!("CARGO_BIN_EXE_telearc"));
    command
        .args(args)
        .env("TELEARC_DATA_DIR", data_dir)
        .env_remove("TELEARC_TOKEN")
        .env_remove("TELEARC_GROUPS")
        .env_remove("TELEARC_SECRETS_PATH");
    if let Some(groups) = groups {
        command.env("TELEARC_GROUPS", groups);
    }
    command.output().expect("failed to execute telearc binary")
}

#[test]
fn backfill_without_groups_is_a_fatal_config_error() {
    let dir = scratch_dir("no-groups");
    let output = run_telearc(&dir, None, &["backfill", "--days", "30"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("no groups configured"), "stderr: {stderr}");
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn fetch_without_token_fails_before_any_output() {
    let dir = scratch_dir("no-token");
    let output = run_telearc(&dir, Some("news_channel"), &["fetch"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("telearc auth login"), "stderr: {stderr}");
    // Nothing was written under the data dir.
    assert!(!dir.join("outputs").exists());
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn zero_hour_window_is_rejected() {
    let dir = scratch_dir("zero-window");
    let output = run_telearc(&dir, Some("news_channel"), &["fetch", "--hours", "0"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("window must be positive"), "stderr: {stderr}");
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn nonpositive_backfill_days_are_rejected() {
    let dir = scratch_dir("bad-days");
    let output = run_telearc(&dir, Some("news_channel"), &["backfill", "--days=-1"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("window must be positive"), "stderr: {stderr}");
    let _ = std::fs::remove_dir_all(&dir);
}
