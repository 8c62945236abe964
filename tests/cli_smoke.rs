//! Behavioural smoke tests for the CLI entrypoint.

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

#[test]
fn cli_without_arguments_prints_help_and_fails() {
    let mut cmd = cargo_bin_cmd!("tiller");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn help_lists_the_lifecycle_subcommands() {
    let mut cmd = cargo_bin_cmd!("tiller");
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("plan"))
        .stdout(predicate::str::contains("apply"))
        .stdout(predicate::str::contains("destroy"))
        .stdout(predicate::str::contains("import"));
}

#[test]
fn unknown_resource_types_are_rejected_before_any_io() {
    let mut cmd = cargo_bin_cmd!("tiller");
    cmd.args(["plan", "widget", "w1", "--file", "does-not-exist.json"]);
    cmd.assert()
        .code(1)
        .stderr(predicate::str::contains("unknown resource type"));
}

#[test]
fn missing_manifests_are_reported_with_their_path() {
    let mut cmd = cargo_bin_cmd!("tiller");
    cmd.args(["plan", "dns-policy", "pol1", "--file", "does-not-exist.json"]);
    cmd.assert()
        .code(1)
        .stderr(predicate::str::contains("does-not-exist.json"));
}
