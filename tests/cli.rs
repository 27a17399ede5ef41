#[path = "common/mod.rs"]
mod common;

use common::*;
use std::process::{Command, Output};

fn kvload(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_kvload"))
        .args(args)
        .env_remove("REDIS_HOST")
        .env_remove("REDIS_PORT")
        .env_remove("REDIS_DB")
        .env_remove("REDIS_PASSWORD")
        .output()
        .expect("spawn kvload")
}

#[test]
fn help_exits_zero() {
    let out = kvload(&["-h"]);
    assert_eq!(out.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("--keyfield"));
}

#[test]
fn missing_required_flag_exits_two() {
    let out = kvload(&["-i", "in.csv", "-o", "out.log", "-f", "id"]);
    assert_eq!(out.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&out.stderr).contains("--keyset"));
}

#[test]
fn unknown_flag_exits_two() {
    let out = kvload(&["-i", "in.csv", "-o", "out.log", "-f", "id", "-k", "u", "--bogus"]);
    assert_eq!(out.status.code(), Some(2));
}

/// End to end against the in-memory store: summary on stdout, duplicate in the log.
#[test]
fn dry_run_reports_summary_and_logs_duplicate() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_csv(dir.path(), "users.csv", USERS_CSV);
    let log = dir.path().join("rejects.log");

    let out = kvload(&[
        "-i", input.to_str().unwrap(),
        "-o", log.to_str().unwrap(),
        "-f", "id",
        "-k", "u",
        "--dry-run",
        "--no-progress",
        "--summary-json",
    ]);
    assert_eq!(out.status.code(), Some(0), "stderr: {}", String::from_utf8_lossy(&out.stderr));

    let summary: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(summary["rows_seen"], 3);
    assert_eq!(summary["accepted"], 2);
    assert_eq!(summary["rejected"], 1);

    let lines = read_lines(&log);
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains(" WARNING id field has duplicate value of 1"));
}

#[test]
fn missing_input_file_exits_one() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("rejects.log");
    let out = kvload(&[
        "-i", dir.path().join("absent.csv").to_str().unwrap(),
        "-o", log.to_str().unwrap(),
        "-f", "id",
        "-k", "u",
        "--dry-run",
        "--no-progress",
    ]);
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("absent.csv"));
}

#[test]
fn quote_flag_sets_the_quote_character() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_csv(dir.path(), "notes.csv", "id,note\n1,'a,b'\n1,c\n");
    let log = dir.path().join("rejects.log");

    let out = kvload(&[
        "-i", input.to_str().unwrap(),
        "-o", log.to_str().unwrap(),
        "-f", "id",
        "-k", "n",
        "--quote", "'",
        "--dry-run",
        "--no-progress",
        "--summary-json",
    ]);
    assert_eq!(out.status.code(), Some(0), "stderr: {}", String::from_utf8_lossy(&out.stderr));

    let summary: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(summary["accepted"], 1);
    assert_eq!(summary["rejected"], 1);
}
