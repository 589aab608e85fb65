use assert_cmd::Command;
use predicates::prelude::*;
use std::fs::write;
use tempfile::{tempdir, NamedTempFile};

fn event_file(contents: &str) -> NamedTempFile {
    let file = NamedTempFile::new().expect("Creating temp event file failed");
    write(file.path(), contents).expect("Writing temp event file failed");
    file
}

#[test]
fn handle_prints_ok_status_for_event_without_records() {
    let event = event_file("{}");
    let staging = tempdir().unwrap();
    let mut cmd = Command::cargo_bin("objtozip").expect("Binary exists");

    cmd.arg("handle")
        .arg("--event")
        .arg(event.path())
        .env("AWS_REGION", "us-east-1")
        .env("OBJTOZIP_STAGING_DIR", staging.path());

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(r#"{"statusCode":200}"#));
}

#[test]
fn handle_prints_ok_status_for_empty_record_list() {
    let event = event_file(r#"{ "Records": [] }"#);
    let mut cmd = Command::cargo_bin("objtozip").expect("Binary exists");

    cmd.arg("handle")
        .arg("--event")
        .arg(event.path())
        .env("AWS_REGION", "us-east-1");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(r#"{"statusCode":200}"#));
}

#[test]
fn handle_fails_when_event_file_is_missing() {
    let mut cmd = Command::cargo_bin("objtozip").expect("Binary exists");

    cmd.arg("handle").arg("--event").arg("no-such-event.json");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read event file"));
}

#[test]
fn handle_fails_when_event_file_is_not_json() {
    let event = event_file("this is not json");
    let mut cmd = Command::cargo_bin("objtozip").expect("Binary exists");

    cmd.arg("handle").arg("--event").arg(event.path());

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("is not valid JSON"));
}

#[tokio::test]
async fn run_reports_unreadable_event_file() {
    use objtozip::cli::{run, Cli, Commands};

    let cli = Cli {
        config: None,
        command: Commands::Handle {
            event: std::path::PathBuf::from("dummy.json"),
        },
    };

    let err = run(cli).await.expect_err("Missing event file should fail");
    assert!(err.to_string().contains("dummy.json"));
}
