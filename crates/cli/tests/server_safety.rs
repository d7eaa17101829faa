use assert_cmd::prelude::*;
use std::process::Command;

#[test]
fn serve_http_refuses_non_loopback_without_public() {
    Command::new(assert_cmd::cargo::cargo_bin!("notelens"))
        .env_remove("NOTELENS_CONFIG")
        .args(["serve-http", "--bind", "0.0.0.0:0"])
        .assert()
        .failure()
        .stderr(predicates::str::contains("Refusing to bind"));
}

#[test]
fn unreadable_config_file_fails_before_serving() {
    Command::new(assert_cmd::cargo::cargo_bin!("notelens"))
        .args(["--config", "/nonexistent/notelens.toml", "serve-http"])
        .assert()
        .failure()
        .stderr(predicates::str::contains("Failed to read"));
}
