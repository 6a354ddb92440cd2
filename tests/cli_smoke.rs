//! Smoke tests for the `liftoff` binary surface.

use assert_cmd::Command;
use predicates::prelude::*;

fn liftoff() -> Command {
    let mut command = Command::cargo_bin("liftoff").expect("binary builds");
    // Keep host configuration out of the test environment.
    command
        .env_remove("LIFTOFF_NAME")
        .env_remove("LIFTOFF_REGION")
        .env_remove("LIFTOFF_PORT")
        .env_remove("LIFTOFF_ENVIRONMENT")
        .env_remove("LIFTOFF_CONFIG_PATH");
    command
}

#[test]
fn running_without_a_subcommand_prints_usage() {
    liftoff()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn deploying_without_configuration_lists_every_violation() {
    let dir = tempfile::tempdir().expect("temp dir");

    liftoff()
        .current_dir(dir.path())
        .arg("deploy")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Config error: 'name' must not be empty"))
        .stderr(predicate::str::contains(
            "Config error: 'region' must not be empty",
        ))
        .stderr(predicate::str::contains("Config error: 'port'"));
}

#[test]
fn packaging_without_configuration_fails_before_writing_anything() {
    let dir = tempfile::tempdir().expect("temp dir");

    liftoff()
        .current_dir(dir.path())
        .arg("package")
        .assert()
        .failure();

    let leftover: Vec<_> = std::fs::read_dir(dir.path())
        .expect("read temp dir")
        .collect();
    assert!(leftover.is_empty(), "no artifact may be written: {leftover:?}");
}
