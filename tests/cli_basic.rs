//! Integration tests for basic CLI behavior.
//!
//! Tests that the binary exists, accepts standard flags, each subcommand
//! responds to `--help`, and the offline `segment` command produces SRT.

#![allow(deprecated)] // cargo_bin deprecation, replacement not yet stable

use assert_cmd::Command;
use predicates::prelude::*;

/// Helper: get a Command for the `subburn` binary.
fn subburn() -> Command {
    Command::cargo_bin("subburn").expect("binary 'subburn' should be built")
}

// ─── Top-level flags ─────────────────────────────────────────────────────────

#[test]
fn help_flag_shows_usage() {
    subburn()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage: subburn"))
        .stdout(predicate::str::contains("upload"))
        .stdout(predicate::str::contains("transcribe"))
        .stdout(predicate::str::contains("status"))
        .stdout(predicate::str::contains("render"))
        .stdout(predicate::str::contains("segment"))
        .stdout(predicate::str::contains("doctor"));
}

#[test]
fn version_flag_shows_semver() {
    subburn()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"^subburn \d+\.\d+\.\d+\n$").unwrap());
}

#[test]
fn no_args_shows_error_and_usage() {
    subburn()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage: subburn"));
}

#[test]
fn invalid_subcommand_fails() {
    subburn()
        .arg("this-is-not-a-real-command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

// ─── Subcommand help ─────────────────────────────────────────────────────────

#[test]
fn render_help_lists_style_flags() {
    subburn()
        .args(["render", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("<JOB_ID>"))
        .stdout(predicate::str::contains("--font"))
        .stdout(predicate::str::contains("--color"))
        .stdout(predicate::str::contains("--background"))
        .stdout(predicate::str::contains("--position"));
}

#[test]
fn status_help() {
    subburn()
        .args(["status", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("<JOB_ID>"))
        .stdout(predicate::str::contains("--wait"))
        .stdout(predicate::str::contains("--srt"));
}

#[test]
fn segment_help() {
    subburn()
        .args(["segment", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("<WORDS>"))
        .stdout(predicate::str::contains("--max-ms"));
}

// ─── Input validation ────────────────────────────────────────────────────────

#[test]
fn status_rejects_malformed_job_id() {
    subburn()
        .args(["status", "not-a-uuid"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid job id: not-a-uuid"));
}

#[test]
fn render_rejects_unknown_position() {
    subburn()
        .args(["render", "00000000-0000-0000-0000-000000000000", "--position", "left"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown subtitle position"));
}

// ─── Offline segmentation ────────────────────────────────────────────────────

#[test]
fn segment_word_array_to_stdout() {
    let dir = tempfile::tempdir().unwrap();
    let words = dir.path().join("words.json");
    std::fs::write(
        &words,
        r#"[
            {"text": "Hello", "start": 0, "end": 2000},
            {"text": "there", "start": 2000, "end": 4000},
            {"text": "friend", "start": 4000, "end": 6000},
            {"text": "bye", "start": 6500, "end": 7000}
        ]"#,
    )
    .unwrap();

    subburn()
        .arg("segment")
        .arg(&words)
        .assert()
        .success()
        .stdout(
            "1\n00:00:00,000 --> 00:00:06,000\nHello there friend\n\n\
             2\n00:00:06,500 --> 00:00:07,000\nbye\n\n",
        );
}

#[test]
fn segment_provider_transcript_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let words = dir.path().join("transcript.json");
    let out = dir.path().join("out.srt");
    std::fs::write(
        &words,
        r#"{"status": "completed", "words": [{"text": "hi", "start": 0, "end": 100, "confidence": 0.9}]}"#,
    )
    .unwrap();

    subburn()
        .arg("segment")
        .arg(&words)
        .arg("--output")
        .arg(&out)
        .assert()
        .success();

    assert_eq!(
        std::fs::read_to_string(&out).unwrap(),
        "1\n00:00:00,000 --> 00:00:00,100\nhi\n\n"
    );
}

#[test]
fn segment_empty_list_prints_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let words = dir.path().join("empty.json");
    std::fs::write(&words, "[]").unwrap();

    subburn()
        .arg("segment")
        .arg(&words)
        .assert()
        .success()
        .stdout("");
}

#[test]
fn segment_rejects_non_word_json() {
    let dir = tempfile::tempdir().unwrap();
    let words = dir.path().join("bad.json");
    std::fs::write(&words, r#"{"hello": "world"}"#).unwrap();

    subburn()
        .arg("segment")
        .arg(&words)
        .assert()
        .failure()
        .stderr(predicate::str::contains("is not a word list"));
}
