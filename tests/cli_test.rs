mod common;

use std::fs;

use assert_cmd::prelude::*;
use common::fanout_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

#[test]
fn no_items_prints_only_final_message() {
    let home = TempDir::new().unwrap();
    fanout_cmd(&home)
        .args(["--latency-ms", "0"])
        .assert()
        .success()
        .stdout("Finished processing everything\n");
}

#[test]
fn processes_every_item() {
    let home = TempDir::new().unwrap();
    let output = fanout_cmd(&home)
        .args(["--latency-ms", "0", "--pool-size", "2", "a", "b", "c"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 7);
    for item in ["a", "b", "c"] {
        assert!(lines.contains(&format!("{} - Sleeping for 0 seconds...", item).as_str()));
        assert!(lines.contains(&format!("{} - Finished processing", item).as_str()));
    }
    assert_eq!(lines.last(), Some(&"Finished processing everything"));
}

#[test]
fn start_line_reports_configured_latency() {
    let home = TempDir::new().unwrap();
    fanout_cmd(&home)
        .args(["--latency-ms", "500", "only"])
        .assert()
        .success()
        .stdout(predicate::str::contains("only - Sleeping for 0.5 seconds..."));
}

#[test]
fn zero_pool_size_fails_before_any_work() {
    let home = TempDir::new().unwrap();
    fanout_cmd(&home)
        .args(["--pool-size", "0", "a", "b"])
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("Invalid pool size 0"));
}

#[test]
fn config_file_values_are_applied() {
    let home = TempDir::new().unwrap();
    let config = home.path().join("custom.toml");
    fs::write(&config, "pool_size = 0\n").unwrap();

    fanout_cmd(&home)
        .arg("--config")
        .arg(&config)
        .arg("a")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid pool size 0"));
}

#[test]
fn cli_flag_overrides_config_file() {
    let home = TempDir::new().unwrap();
    let config = home.path().join("custom.toml");
    fs::write(&config, "pool_size = 0\ntask_latency_ms = 0\n").unwrap();

    fanout_cmd(&home)
        .arg("--config")
        .arg(&config)
        .args(["--pool-size", "1", "only"])
        .assert()
        .success()
        .stdout(predicate::str::contains("only - Finished processing"));
}

#[test]
fn env_overrides_are_read() {
    let home = TempDir::new().unwrap();
    fanout_cmd(&home)
        .env("FANOUT_POOL_SIZE", "0")
        .args(["--latency-ms", "0", "a"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid pool size 0"));
}

#[test]
fn missing_config_file_is_an_error() {
    let home = TempDir::new().unwrap();
    fanout_cmd(&home)
        .args(["--config", "/nonexistent/fanout.toml", "a"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Config file not found"));
}

#[test]
fn debug_flag_enables_debug_logging() {
    let home = TempDir::new().unwrap();
    fanout_cmd(&home)
        .args(["--debug", "--latency-ms", "0", "a"])
        .assert()
        .success()
        .stderr(predicate::str::contains("DEBUG"))
        .stdout(predicate::str::contains("a - Finished processing"));
}

#[test]
fn help_lists_options() {
    let home = TempDir::new().unwrap();
    fanout_cmd(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("--pool-size")
                .and(predicate::str::contains("--debug"))
                .and(predicate::str::contains("--fail-fast")),
        );
}
