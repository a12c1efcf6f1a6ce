use assert_cmd::Command;
use predicates::prelude::*;

fn cmd() -> Command {
    Command::cargo_bin("gerrit-review").unwrap()
}

#[test]
fn help_lists_review_subcommands() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("push"))
        .stdout(predicate::str::contains("score"))
        .stdout(predicate::str::contains("submit"))
        .stdout(predicate::str::contains("abandon"))
        .stdout(predicate::str::contains("download"));
}

#[test]
fn score_out_of_range_is_rejected_at_the_argument_layer() {
    cmd()
        .args(["score", "101", "code-review", "3"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("3"));

    cmd()
        .args(["score", "101", "code-review", "-5"])
        .assert()
        .failure();
}

#[test]
fn fails_cleanly_outside_a_configured_repository() {
    let dir = tempfile::tempdir().unwrap();

    // No remote url is resolvable here, so the context cannot be built; the
    // binary must report that instead of spawning anything.
    cmd()
        .current_dir(dir.path())
        .args(["status"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("remote"));
}

#[test]
fn invalid_ssh_credentials_are_rejected() {
    let dir = tempfile::tempdir().unwrap();

    cmd()
        .current_dir(dir.path())
        .args(["--ssh", "not-user-at-host", "status"])
        .assert()
        .failure();
}
