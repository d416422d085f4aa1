//! Behavioural smoke tests for the CLI entrypoint.

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

#[test]
fn help_lists_the_workflows() {
    let mut cmd = cargo_bin_cmd!("skylift");
    cmd.arg("--help");
    cmd.assert().success().stdout(
        predicate::str::contains("set-private")
            .and(predicate::str::contains("resize-volume"))
            .and(predicate::str::contains("inventory")),
    );
}

#[test]
fn running_without_arguments_shows_usage() {
    let mut cmd = cargo_bin_cmd!("skylift");
    cmd.assert().failure().stderr(predicate::str::contains("Usage"));
}

#[test]
fn decommission_refuses_without_confirmation() {
    let mut cmd = cargo_bin_cmd!("skylift");
    cmd.args(["decommission", "i-123"]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("refusing to decommission without --yes"));
}
