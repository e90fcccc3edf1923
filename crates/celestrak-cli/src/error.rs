//! CLI error type and its mapping to exit codes.

use std::io;
use std::path::PathBuf;

use celestrak_client::{ConfigError, ContextError, Error as ClientError, ErrorKind};
use thiserror::Error;

use crate::Exit;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("{message}")]
    Config {
        message: String,
        #[source]
        source: ConfigError,
    },

    #[error("{message}")]
    Io {
        message: String,
        #[source]
        source: io::Error,
        path: Option<PathBuf>,
    },

    /// The request could not be completed: transport, server, or timeout.
    #[error(transparent)]
    Network(ClientError),

    /// The query was rejected before anything was sent.
    #[error(transparent)]
    Validation(ClientError),

    #[error("interrupted")]
    Interrupted,

    #[error("{0:#}")]
    Other(#[from] anyhow::Error),
}

impl CliError {
    pub fn exit(&self) -> Exit {
        match self {
            Self::Config { .. } => Exit::ConfigError,
            Self::Io { .. } => Exit::IoError,
            Self::Network(_) => Exit::NetworkError,
            Self::Validation(_) => Exit::ValidationError,
            Self::Interrupted => Exit::Interrupted,
            Self::Other(_) => Exit::GeneralError,
        }
    }

    pub fn io_with_path(
        message: impl Into<String>,
        source: io::Error,
        path: impl Into<PathBuf>,
    ) -> Self {
        Self::Io {
            message: message.into(),
            source,
            path: Some(path.into()),
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        Self::Config {
            message: format!("configuration error: {err}"),
            source: err,
        }
    }
}

impl From<ClientError> for CliError {
    fn from(err: ClientError) -> Self {
        match err.kind() {
            ErrorKind::Query => Self::Validation(err),
            ErrorKind::Context if matches!(err, ClientError::Context(ContextError::Cancelled)) => {
                Self::Interrupted
            }
            _ => Self::Network(err),
        }
    }
}

impl From<io::Error> for CliError {
    fn from(err: io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
            source: err,
            path: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use celestrak_client::{Endpoint, Query};
    use url::Url;

    #[test]
    fn test_query_error_is_validation() {
        let base = Url::parse("https://celestrak.org").unwrap();
        let err = Query::default()
            .build_url(&base, Endpoint::Current)
            .unwrap_err();
        let cli: CliError = ClientError::from(err).into();
        assert!(matches!(cli.exit(), Exit::ValidationError));
    }

    #[test]
    fn test_context_mapping() {
        let cancelled: CliError = ClientError::Context(ContextError::Cancelled).into();
        assert!(matches!(cancelled.exit(), Exit::Interrupted));

        let deadline: CliError = ClientError::Context(ContextError::DeadlineExceeded).into();
        assert!(matches!(deadline.exit(), Exit::NetworkError));
        assert_eq!(deadline.to_string(), "celestrak: context deadline exceeded");
    }

    #[test]
    fn test_config_error_message() {
        let err: CliError = ConfigError::ValidationError {
            message: "max_response_bytes must be greater than 0".to_string(),
        }
        .into();
        assert!(matches!(err.exit(), Exit::ConfigError));
        assert!(err.to_string().starts_with("configuration error: validation error"));
    }
}
