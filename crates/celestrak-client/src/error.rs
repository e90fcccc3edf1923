//! Error types for the CelesTrak client.

use reqwest::StatusCode;
use thiserror::Error;

use crate::classify;
use crate::context::ContextError;
use crate::transport::TransportError;

/// A query could not be turned into a request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("celestrak: query error: {message}")]
pub struct QueryError {
    message: String,
}

impl QueryError {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The validation failure, without the `celestrak:` prefix.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// The server answered, but not with a usable payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("celestrak: {status}: {message}")]
pub struct ErrorResponse {
    status: StatusCode,
    message: String,
}

impl ErrorResponse {
    pub(crate) fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// HTTP status of the response.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Message taken from the body, the status line, or the local check that failed.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// 404 Not Found.
    pub fn is_not_found(&self) -> bool {
        self.status == StatusCode::NOT_FOUND
    }

    /// 429 Too Many Requests.
    pub fn is_rate_limit(&self) -> bool {
        self.status == StatusCode::TOO_MANY_REQUESTS
    }

    /// Any 5xx status.
    pub fn is_server_error(&self) -> bool {
        self.status.is_server_error()
    }

    /// Any 4xx status.
    pub fn is_client_error(&self) -> bool {
        self.status.is_client_error()
    }
}

/// Discriminant of [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Local validation failure.
    Query,
    /// Server-observed failure.
    Response,
    /// Network-level failure.
    Transport,
    /// The fetch context was cancelled or hit its deadline.
    Context,
    /// Every attempt failed with a retryable error.
    RetriesExhausted,
}

/// Every failure a fetch can produce.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Response(#[from] ErrorResponse),

    #[error("celestrak: {0}")]
    Transport(#[from] TransportError),

    #[error("celestrak: {0}")]
    Context(#[from] ContextError),

    #[error("celestrak: max retries ({max_retries}) exceeded: {last}")]
    RetriesExhausted {
        max_retries: u32,
        #[source]
        last: Box<Error>,
    },
}

impl Error {
    /// The kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Query(_) => ErrorKind::Query,
            Error::Response(_) => ErrorKind::Response,
            Error::Transport(_) => ErrorKind::Transport,
            Error::Context(_) => ErrorKind::Context,
            Error::RetriesExhausted { .. } => ErrorKind::RetriesExhausted,
        }
    }

    /// Whether another attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        classify::is_retryable(self)
    }

    pub fn is_query_error(&self) -> bool {
        self.kind() == ErrorKind::Query
    }

    pub fn is_response(&self) -> bool {
        self.kind() == ErrorKind::Response
    }

    pub fn is_transport(&self) -> bool {
        self.kind() == ErrorKind::Transport
    }

    pub fn is_context(&self) -> bool {
        self.kind() == ErrorKind::Context
    }

    pub fn is_retries_exhausted(&self) -> bool {
        self.kind() == ErrorKind::RetriesExhausted
    }

    /// The error of the final attempt; `self` unless retries ran out.
    pub fn last_attempt(&self) -> &Error {
        match self {
            Error::RetriesExhausted { last, .. } => last.last_attempt(),
            other => other,
        }
    }

    /// The server response behind this error, if any.
    pub fn as_response(&self) -> Option<&ErrorResponse> {
        match self.last_attempt() {
            Error::Response(response) => Some(response),
            _ => None,
        }
    }

    /// HTTP status behind this error, if the server answered.
    pub fn status(&self) -> Option<StatusCode> {
        self.as_response().map(ErrorResponse::status)
    }
}

/// Result type alias using the client's [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_error_display() {
        let err = QueryError::new("missing selector");
        assert_eq!(err.to_string(), "celestrak: query error: missing selector");
    }

    #[test]
    fn test_error_response_display() {
        let err = ErrorResponse::new(StatusCode::NOT_FOUND, "No GP data found");
        assert_eq!(err.to_string(), "celestrak: 404 Not Found: No GP data found");
        assert!(err.is_not_found());
        assert!(err.is_client_error());
        assert!(!err.is_server_error());
    }

    #[test]
    fn test_error_response_predicates() {
        assert!(ErrorResponse::new(StatusCode::TOO_MANY_REQUESTS, "slow down").is_rate_limit());
        assert!(ErrorResponse::new(StatusCode::BAD_GATEWAY, "").is_server_error());
        assert!(!ErrorResponse::new(StatusCode::OK, "empty response body").is_client_error());
    }

    #[test]
    fn test_kinds() {
        assert_eq!(Error::from(QueryError::new("x")).kind(), ErrorKind::Query);
        assert_eq!(
            Error::from(ErrorResponse::new(StatusCode::IM_A_TEAPOT, "x")).kind(),
            ErrorKind::Response
        );
        assert_eq!(Error::from(TransportError::Timeout).kind(), ErrorKind::Transport);
        assert_eq!(Error::from(ContextError::Cancelled).kind(), ErrorKind::Context);
    }

    #[test]
    fn test_retries_exhausted_exposes_last_attempt() {
        let err = Error::RetriesExhausted {
            max_retries: 3,
            last: Box::new(ErrorResponse::new(StatusCode::SERVICE_UNAVAILABLE, "busy").into()),
        };

        assert!(err.is_retries_exhausted());
        assert!(err.last_attempt().is_response());
        assert_eq!(err.status(), Some(StatusCode::SERVICE_UNAVAILABLE));
        assert_eq!(
            err.to_string(),
            "celestrak: max retries (3) exceeded: celestrak: 503 Service Unavailable: busy"
        );

        let source = std::error::Error::source(&err).unwrap();
        assert_eq!(source.to_string(), "celestrak: 503 Service Unavailable: busy");
    }

    #[test]
    fn test_context_display() {
        let err = Error::from(ContextError::DeadlineExceeded);
        assert_eq!(err.to_string(), "celestrak: context deadline exceeded");
        assert!(err.as_response().is_none());
    }
}
