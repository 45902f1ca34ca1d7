//! Tests for main.rs startup validation (secrets, TTLs, algorithm).

use std::process::{Command, Output, Stdio};
use std::time::Duration;

const JWT_SECRET: &str = "test-jwt-secret-that-is-long-enough!";
const REFRESH_SECRET: &str = "test-refresh-secret-also-long-enough";

fn command() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_moviegate"));
    cmd.env_remove("JWT_SECRET")
        .env_remove("REFRESH_SECRET")
        .env_remove("REDIS_URL")
        .env_remove("ADMIN_PASSWORD")
        .stderr(Stdio::piped())
        .stdout(Stdio::piped());
    cmd
}

/// tracing logs to stdout by default
fn combined(output: &Output) -> String {
    format!(
        "{}{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    )
}

#[test]
fn test_missing_jwt_secret_exits_with_error() {
    let output = command()
        .env("REFRESH_SECRET", REFRESH_SECRET)
        .output()
        .expect("Failed to run binary");

    assert!(!output.status.success());
    let combined = combined(&output);
    assert!(
        combined.contains("JWT_SECRET") && combined.contains("required"),
        "Should mention JWT_SECRET is required, got: {}",
        combined
    );
}

#[test]
fn test_missing_refresh_secret_exits_with_error() {
    let output = command()
        .env("JWT_SECRET", JWT_SECRET)
        .output()
        .expect("Failed to run binary");

    assert!(!output.status.success());
    assert!(combined(&output).contains("REFRESH_SECRET"));
}

#[test]
fn test_short_secret_exits_with_error() {
    let output = command()
        .env("JWT_SECRET", "too-short")
        .env("REFRESH_SECRET", REFRESH_SECRET)
        .output()
        .expect("Failed to run binary");

    assert!(!output.status.success());
    assert!(combined(&output).contains("shorter than 32"));
}

#[test]
fn test_shared_secret_exits_with_error() {
    let output = command()
        .env("JWT_SECRET", JWT_SECRET)
        .env("REFRESH_SECRET", JWT_SECRET)
        .output()
        .expect("Failed to run binary");

    assert!(!output.status.success());
    assert!(combined(&output).contains("must differ"));
}

#[test]
fn test_ttl_order_exits_with_error() {
    let output = command()
        .env("JWT_SECRET", JWT_SECRET)
        .env("REFRESH_SECRET", REFRESH_SECRET)
        .args(["--access-ttl", "600", "--refresh-ttl", "600"])
        .output()
        .expect("Failed to run binary");

    assert!(!output.status.success());
    assert!(combined(&output).contains("access TTL must be shorter"));
}

#[test]
fn test_create_admin_without_password_exits_with_error() {
    let output = command()
        .env("JWT_SECRET", JWT_SECRET)
        .env("REFRESH_SECRET", REFRESH_SECRET)
        .args(["--create-admin", "root"])
        .output()
        .expect("Failed to run binary");

    assert!(!output.status.success());
    assert!(combined(&output).contains("ADMIN_PASSWORD must be set"));
}

#[test]
fn test_valid_configuration_starts() {
    let db_path = std::env::temp_dir().join(format!("moviegate-startup-{}.db", std::process::id()));
    let mut child = command()
        .env("JWT_SECRET", JWT_SECRET)
        .env("REFRESH_SECRET", REFRESH_SECRET)
        .args(["--port", "0", "--database"])
        .arg(&db_path)
        .spawn()
        .expect("Failed to run binary");

    // Give it a moment to start or fail
    std::thread::sleep(Duration::from_millis(500));

    match child.try_wait() {
        Ok(Some(status)) => {
            let output = child.wait_with_output().unwrap();
            panic!(
                "Server exited unexpectedly with status {:?}, output: {}",
                status,
                combined(&output)
            );
        }
        Ok(None) => {
            child.kill().ok();
            child.wait().ok();
        }
        Err(e) => panic!("Error checking process status: {}", e),
    }

    let _ = std::fs::remove_file(&db_path);
}
