//! Command-line client for CelesTrak GP element sets.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use celestrak_client::{Client, ClientConfig, ReqwestTransport};
use tracing::debug;

pub mod cli;
pub mod commands;
pub mod error;

pub use cli::Cli;
pub use error::CliError;

/// Application exit codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Exit {
    Success = 0,
    GeneralError = 1,
    ConfigError = 2,
    IoError = 3,
    NetworkError = 4,
    ValidationError = 5,
    Interrupted = 130,
}

impl From<Exit> for ExitCode {
    fn from(exit: Exit) -> Self {
        ExitCode::from(exit as u8)
    }
}

/// Load configuration, build the client, and run the selected command.
pub async fn run(cli: Cli) -> Result<(), CliError> {
    let config = ClientConfig::load(cli.config.as_deref())?;
    let config = cli.client.apply(config)?;
    debug!(
        base_url = %config.base_url,
        max_retries = config.max_retries,
        retry_delay_ms = config.retry_delay.as_millis() as u64,
        "client configuration"
    );

    let transport = ReqwestTransport::new().context("failed to build HTTP client")?;
    let client = Client::builder(Arc::new(transport)).config(config).build()?;

    commands::fetch(
        &client,
        &cli.command,
        cli.client.timeout(),
        cli.client.output.as_deref(),
    )
    .await
}
