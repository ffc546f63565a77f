//! Shared E2E test helpers for `jgate` binary tests.

#![allow(dead_code)]

use assert_cmd::cargo::cargo_bin_cmd;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

/// Default timeout for CLI tests.
pub const TIMEOUT: Duration = Duration::from_secs(10);

/// Environment variables that would leak the developer's own policy into tests.
const POLICY_ENV_VARS: &[&str] = &["JGATE_POLICY", "JGATE_ORG", "RUST_LOG"];

/// Build a Command for the `jgate` binary with policy env vars removed.
pub fn jgate_cmd() -> assert_cmd::Command {
    let mut cmd: assert_cmd::Command = cargo_bin_cmd!("jgate");
    cmd.timeout(TIMEOUT);
    for var in POLICY_ENV_VARS {
        cmd.env_remove(var);
    }
    cmd
}

/// Writes `yaml` to `policy.yaml` in a fresh temp dir.
///
/// Returns (path, _guard) — keep the guard alive for the test's duration.
pub fn policy_file(yaml: &str) -> (PathBuf, TempDir) {
    let dir = tempfile::tempdir().expect("create temp dir for policy");
    let path = dir.path().join("policy.yaml");
    std::fs::write(&path, yaml).expect("write policy file");
    (path, dir)
}

/// Build a Command pointed at a policy file via `--policy`.
pub fn jgate_with_policy(path: &std::path::Path) -> assert_cmd::Command {
    let mut cmd = jgate_cmd();
    cmd.arg("--policy").arg(path);
    cmd
}
