/*
[INPUT]:  Binary invocations with generated configuration files
[OUTPUT]: Exit status checks for the CLI
[POS]:    Integration tests - command line
[UPDATE]: When CLI flags or startup validation change
*/

use std::path::PathBuf;
use std::process::{Command, Output};

fn fixture_key() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../nordnet-next-adapter/tests/fixtures/test_public.pem")
}

fn write_config(name: &str, content: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("nordnet-next-feed-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

fn run(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_nordnet-next-feed"))
        .args(args)
        .env("RUST_LOG", "error")
        .env_remove("NORDNET_USERNAME")
        .env_remove("NORDNET_PASSWORD")
        .output()
        .expect("Failed to start nordnet-next-feed binary")
}

#[test]
fn cli_mode_with_config_and_dry_run_works() {
    let config = write_config(
        "feed.yaml",
        &format!(
            "client:\n  public_key:\n    path: {}\nsubscriptions:\n  - type: price\n    args: {{ i: \"101\", m: 11 }}\n",
            fixture_key().display()
        ),
    );

    let output = run(&["--config", config.to_str().unwrap(), "--dry-run", "--log-level", "error"]);

    assert!(
        output.status.success(),
        "Process exited with non-zero status: {}\nStdout: {}\nStderr: {}",
        output.status,
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
}

#[test]
fn cli_mode_rejects_unreadable_public_key() {
    let config = write_config(
        "feed.yaml",
        "client:\n  public_key:\n    path: missing_public.pem\n",
    );

    let output = run(&["--config", config.to_str().unwrap(), "--dry-run"]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("missing_public.pem"));
}

#[test]
fn cli_mode_requires_credentials_outside_dry_run() {
    let config = write_config(
        "feed.yaml",
        &format!("client:\n  public_key:\n    path: {}\n", fixture_key().display()),
    );

    let output = run(&["--config", config.to_str().unwrap()]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("NORDNET_USERNAME"));
}
