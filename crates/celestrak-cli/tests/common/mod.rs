//! Common test utilities for CLI testing.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::Output;

use assert_cmd::Command;
use tempfile::{tempdir, TempDir};

const ENV_VARS: [&str; 8] = [
    "CELESTRAK_CONFIG",
    "CELESTRAK_BASE_URL",
    "CELESTRAK_USER_AGENT",
    "CELESTRAK_MAX_RETRIES",
    "CELESTRAK_RETRY_DELAY_MS",
    "CELESTRAK_MAX_RESPONSE_BYTES",
    "CELESTRAK_LOG_FILE",
    "RUST_LOG",
];

/// Test context with a temporary directory for config and output files.
pub struct TestContext {
    pub temp_dir: TempDir,
    pub config_path: PathBuf,
}

impl TestContext {
    pub fn new() -> Self {
        let temp_dir = tempdir().expect("failed to create temp dir");
        let config_path = temp_dir.path().join("celestrak.toml");
        Self {
            temp_dir,
            config_path,
        }
    }

    pub fn with_config(self, config: &str) -> Self {
        std::fs::write(&self.config_path, config).expect("failed to write config");
        self
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// A `celestrak` command isolated from the caller's environment.
    pub fn command(&self) -> Command {
        let mut cmd = Command::cargo_bin("celestrak").expect("binary not found");
        cmd.current_dir(self.path()).env("NO_COLOR", "1");
        for var in ENV_VARS {
            cmd.env_remove(var);
        }
        cmd
    }
}

/// Run a command off the async runtime so a mock server can answer it.
pub async fn output(mut cmd: Command) -> Output {
    tokio::task::spawn_blocking(move || cmd.output().expect("failed to run command"))
        .await
        .expect("command task panicked")
}
