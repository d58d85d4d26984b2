//! Integration tests for the tickwatch CLI

use assert_cmd::cargo;
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Get a Command for the tickwatch binary, isolated from any local config
fn tickwatch(dir: &TempDir) -> Command {
    let mut cmd = Command::new(cargo::cargo_bin!("tickwatch"));
    cmd.current_dir(dir.path())
        .env_remove("TICKWATCH_CONFIG")
        .env_remove("TICKWATCH_NODE_IPS")
        .env_remove("TICKWATCH_NODE_PORTS")
        .env_remove("TICKWATCH_TICKS_PER_EPOCH")
        .env_remove("TICKWATCH_SEED");
    cmd
}

#[test]
fn test_help() {
    let temp = TempDir::new().unwrap();
    tickwatch(&temp)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("recovers stalled tick progress"));
}

#[test]
fn test_version() {
    let temp = TempDir::new().unwrap();
    tickwatch(&temp)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("0.1.0"));
}

#[test]
fn test_check_prints_snapshot_and_end_tick() {
    let temp = TempDir::new().unwrap();
    let report = temp.path().join("status.txt");
    std::fs::write(&report, "Connected\nTick: 960\nEpoch: 1\nInitial tick: 0\n").unwrap();

    tickwatch(&temp)
        .arg("check")
        .arg(&report)
        .arg("--ticks-per-epoch")
        .arg("1000")
        .arg("--json")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"latest_tick\": 960"))
        .stdout(predicate::str::contains("\"end_tick\": 950"))
        .stdout(predicate::str::contains("\"exceeded\": true"));
}

#[test]
fn test_check_reads_stdin() {
    let temp = TempDir::new().unwrap();
    tickwatch(&temp)
        .arg("check")
        .write_stdin("Tick: 5\nEpoch: 2\nInitial tick: 1\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Epoch:         2"));
}

#[test]
fn test_check_rejects_incomplete_report() {
    let temp = TempDir::new().unwrap();
    tickwatch(&temp)
        .arg("check")
        .write_stdin("Tick: 5\n")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Initial tick"));
}

#[test]
fn test_check_rejects_error_report() {
    let temp = TempDir::new().unwrap();
    tickwatch(&temp)
        .arg("check")
        .write_stdin("Failed to connect to 10.0.0.1:31841\n")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error marker"));
}

#[test]
fn test_config_validate_rejects_mismatched_ports() {
    let temp = TempDir::new().unwrap();
    tickwatch(&temp)
        .args([
            "config",
            "validate",
            "--node-ips",
            "10.0.0.1,10.0.0.2",
            "--node-ports",
            "31841",
            "--ticks-per-epoch",
            "676",
        ])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("must be the same"));
}

#[test]
fn test_config_validate_accepts_flags() {
    let temp = TempDir::new().unwrap();
    tickwatch(&temp)
        .args([
            "config",
            "validate",
            "--node-ips",
            "10.0.0.1,10.0.0.2",
            "--ticks-per-epoch",
            "676",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("2 node(s)"));
}

#[test]
fn test_config_validate_requires_ticks_per_epoch() {
    let temp = TempDir::new().unwrap();
    tickwatch(&temp)
        .args(["config", "validate", "--node-ips", "10.0.0.1"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("ticks-per-epoch"));
}

#[test]
fn test_config_show_reads_file_and_redacts_seed() {
    let temp = TempDir::new().unwrap();
    std::fs::write(
        temp.path().join("tickwatch.toml"),
        "ticks-per-epoch = 676\nseed = \"verysecretseed\"\n\n[[endpoints]]\naddress = \"10.0.0.7\"\n",
    )
    .unwrap();

    tickwatch(&temp)
        .args(["config", "show", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("10.0.0.7"))
        .stdout(predicate::str::contains("verysecretseed").not());
}

#[test]
fn test_run_single_cycle_with_missing_tools() {
    let temp = TempDir::new().unwrap();
    // The status query fails, so the cycle is an error cycle; the reissue
    // actions fail too, and the loop still completes.
    tickwatch(&temp)
        .args([
            "run",
            "--node-ips",
            "127.0.0.1",
            "--ticks-per-epoch",
            "676",
            "--cli-path",
            "/nonexistent/qubic-cli",
            "--broadcaster-path",
            "/nonexistent/broadcast",
            "--max-cycles",
            "1",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 cycles completed"));
}
