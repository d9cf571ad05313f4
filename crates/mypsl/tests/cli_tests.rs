//! CLI integration tests
//!
//! None of these reach a server: they either print help or fail
//! configuration validation before connecting.

use std::process::{Command, Output};

fn mypsl(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_mypsl"))
        .args(args)
        .env_remove("MYPSL_CONFIG")
        .output()
        .expect("Failed to execute command")
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let output = mypsl(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(
        stdout.contains("MySQL process list watcher"),
        "Should show app description"
    );
    for flag in [
        "--host",
        "--port",
        "--user",
        "--pass",
        "--loop",
        "--default",
        "--command",
        "--state",
        "--time",
        "--database",
        "--query",
        "--order-by",
        "--ignore-system-user",
        "--debug",
    ] {
        assert!(stdout.contains(flag), "Should show {} option", flag);
    }
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let output = mypsl(&["--version"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("mypsl"), "Should show binary name");
}

/// Test kill options in help
#[test]
fn test_kill_options() {
    let output = mypsl(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(stdout.contains("--kill"), "Should show kill option");
    assert!(stdout.contains("--kill-threshold"), "Should show threshold option");
    assert!(stdout.contains("--kill-all"), "Should show kill-all option");
    assert!(stdout.contains("--kill-yes"), "Should show kill-yes option");
    assert!(stdout.contains("--kill-log"), "Should show kill-log option");
    assert!(
        stdout.contains("/var/log/killed_queries.log"),
        "Should show default kill log"
    );
}

/// Test connection env vars in help
#[test]
fn test_env_vars() {
    let output = mypsl(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(stdout.contains("MYPSL_HOST"), "Should show host env var");
    assert!(stdout.contains("MYPSL_USER"), "Should show user env var");
}

/// Test format option
#[test]
fn test_format_option() {
    let output = mypsl(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(stdout.contains("--format"), "Should show format option");
    assert!(stdout.contains("table"), "Should show table format");
    assert!(stdout.contains("json"), "Should show json format");
}

/// Kill without any criteria is rejected before connecting
#[test]
fn test_kill_without_criteria() {
    let output = mypsl(&["--kill", "--kill-yes"]);

    assert!(!output.status.success(), "Kill without criteria should fail");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("cannot kill without specifying criteria"),
        "Should explain the missing criteria"
    );
}

/// A zero elapsed time matches everything and is not a criterion
#[test]
fn test_kill_with_zero_time() {
    let output = mypsl(&["--kill", "--kill-yes", "-t", "0"]);

    assert!(!output.status.success(), "Kill with -t 0 should fail");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("cannot kill without specifying criteria"));
}

/// Kill with the defaults profile is rejected
#[test]
fn test_kill_with_defaults() {
    let output = mypsl(&["--kill", "--kill-yes", "--default"]);

    assert!(!output.status.success(), "Kill with defaults should fail");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("cannot kill using defaults"));
}

/// Order-by outside the allow-list is rejected
#[test]
fn test_invalid_order_by() {
    let output = mypsl(&["--order-by", "time; DROP TABLE users"]);

    assert!(!output.status.success(), "Invalid order-by should fail");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("invalid order-by clause"));
}

/// Test invalid argument error handling
#[test]
fn test_invalid_argument() {
    let output = mypsl(&["--no-such-flag"]);

    assert!(!output.status.success(), "Invalid argument should fail");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("error") || stderr.contains("unexpected"),
        "Should show error message"
    );
}
