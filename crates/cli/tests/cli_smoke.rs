//! CLI smoke tests: argument parsing only, no database required.

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn help_lists_every_subcommand() {
    Command::cargo_bin("trialstore")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("ingest")
                .and(predicate::str::contains("quality"))
                .and(predicate::str::contains("maintain"))
                .and(predicate::str::contains("backup"))
                .and(predicate::str::contains("restore"))
                .and(predicate::str::contains("verify-backup")),
        );
}

#[test]
fn unknown_subcommand_fails() {
    Command::cargo_bin("trialstore")
        .unwrap()
        .arg("frobnicate")
        .assert()
        .failure();
}

#[test]
fn search_rejects_malformed_date_filter() {
    Command::cargo_bin("trialstore")
        .unwrap()
        .args(["search", "diabetes", "--start-from", "not-a-date"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--start-from"));
}
