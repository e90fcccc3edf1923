//! The `gp`, `first`, `last` and `table` commands.

use std::path::Path;
use std::time::Duration;

use celestrak_client::{Client, FetchContext};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::cli::Command;
use crate::error::CliError;

/// Run one fetch and write the payload to `output`, or stdout.
///
/// Ctrl-C cancels the fetch, including any backoff wait in progress.
pub async fn fetch(
    client: &Client,
    command: &Command,
    timeout: Option<Duration>,
    output: Option<&Path>,
) -> Result<(), CliError> {
    let endpoint = command.endpoint();
    let query = command.query();

    let (ctx, cancel) = FetchContext::new();
    let ctx = match timeout {
        Some(timeout) => ctx.with_timeout(timeout),
        None => ctx,
    };

    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling fetch");
            cancel.cancel();
        }
    });

    debug!(%endpoint, ?timeout, "fetching");
    let result = client.fetch(&ctx, &query, endpoint).await;
    interrupt.abort();

    let data = result?;
    info!(%endpoint, bytes = data.len(), "fetched");

    write_payload(&data, output).await
}

/// Write `data` to `path`, or to stdout when `path` is `None`.
pub async fn write_payload(data: &[u8], path: Option<&Path>) -> Result<(), CliError> {
    match path {
        Some(path) => tokio::fs::write(path, data).await.map_err(|e| {
            CliError::io_with_path(format!("failed to write {}", path.display()), e, path)
        }),
        None => {
            let mut stdout = tokio::io::stdout();
            stdout.write_all(data).await?;
            stdout.flush().await?;
            Ok(())
        }
    }
}
