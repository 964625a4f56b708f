//! Binary-level CLI tests: argument surface and exit behavior only.
//! Anything that would reach the network lives behind the service tests.

#![allow(clippy::expect_used)]

use assert_cmd::Command;
use predicates::prelude::*;

fn swell() -> Command {
    Command::cargo_bin("swell").expect("binary built")
}

#[test]
fn test_help_lists_every_command() {
    swell()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("check"))
        .stdout(predicate::str::contains("expand"))
        .stdout(predicate::str::contains("version"));
}

#[test]
fn test_no_arguments_shows_help_and_fails() {
    swell().assert().failure().stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_version_prints_the_package_version() {
    swell()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_version_json_is_parseable() {
    let output = swell().args(["version", "--json"]).output().expect("run");
    assert!(output.status.success());
    let value: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("valid json on stdout");
    assert_eq!(value["version"], env!("CARGO_PKG_VERSION"));
}

#[test]
fn test_out_of_range_threshold_is_rejected_at_parse_time() {
    swell()
        .args(["check", "--threshold", "150"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("threshold"));
}

#[test]
fn test_out_of_range_increment_is_rejected_at_parse_time() {
    swell()
        .args(["expand", "--increment", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("increment"));
}
