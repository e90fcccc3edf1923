//! Failure classification for the fetch pipeline.
//!
//! | Failure                               | Error kind  | Retried |
//! |---------------------------------------|-------------|---------|
//! | connect/DNS/timeout/body read failure | `Transport` | yes     |
//! | context cancelled or past deadline    | `Context`   | no      |
//! | 304 without a cached body             | `Response`  | no      |
//! | 4xx                                   | `Response`  | no      |
//! | 5xx                                   | `Response`  | yes     |
//! | empty or oversize 2xx body            | `Response`  | no      |
//! | invalid query                         | `Query`     | no      |

use reqwest::StatusCode;

use crate::context::FetchContext;
use crate::error::{Error, ErrorResponse};
use crate::transport::{Body, TransportError};

/// Upper bound on the body bytes read to build an error message.
pub const MAX_ERROR_BODY: usize = 8 << 10;

/// Whether `err` is transient and worth another attempt.
pub fn is_retryable(err: &Error) -> bool {
    match err {
        Error::Query(_) => false,
        Error::Context(_) => false,
        Error::Response(response) => response.is_server_error(),
        Error::Transport(_) => true,
        Error::RetriesExhausted { .. } => false,
    }
}

/// Label a transport failure, preferring the context's own error when the
/// context is what ended the request.
pub(crate) fn transport_failure(ctx: &FetchContext, err: TransportError) -> Error {
    match ctx.err() {
        Some(ctx_err) => Error::Context(ctx_err),
        None => Error::Transport(err),
    }
}

/// Build the error for a non-2xx, non-304 response.
///
/// The message is the first [`MAX_ERROR_BODY`] bytes of the body, trimmed,
/// or the status line when that is empty. Read failures only cost the body
/// text.
pub(crate) async fn status_failure(status: StatusCode, body: &mut Body) -> Error {
    let bytes = body.read_limited(MAX_ERROR_BODY).await.unwrap_or_default();
    let text = String::from_utf8_lossy(&bytes);
    let message = match text.trim() {
        "" => status.to_string(),
        trimmed => trimmed.to_string(),
    };
    ErrorResponse::new(status, message).into()
}

/// A 304 arrived but there is nothing cached to serve.
pub(crate) fn not_modified_without_cache() -> Error {
    ErrorResponse::new(
        StatusCode::NOT_MODIFIED,
        "304 Not Modified but no cached body available",
    )
    .into()
}

/// A 2xx body ran past the configured cap.
pub(crate) fn too_large(status: StatusCode, limit: usize) -> Error {
    ErrorResponse::new(status, format!("response too large (exceeds {limit} bytes)")).into()
}

/// A 2xx response carried no payload.
pub(crate) fn empty_body(status: StatusCode) -> Error {
    ErrorResponse::new(status, "empty response body").into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextError;
    use crate::error::QueryError;
    use bytes::Bytes;

    #[test]
    fn test_retry_table() {
        assert!(is_retryable(&TransportError::Timeout.into()));
        assert!(is_retryable(&TransportError::Connect("refused".into()).into()));
        assert!(is_retryable(
            &ErrorResponse::new(StatusCode::INTERNAL_SERVER_ERROR, "boom").into()
        ));
        assert!(is_retryable(
            &ErrorResponse::new(StatusCode::GATEWAY_TIMEOUT, "").into()
        ));

        assert!(!is_retryable(&QueryError::new("missing selector").into()));
        assert!(!is_retryable(&ContextError::Cancelled.into()));
        assert!(!is_retryable(&ContextError::DeadlineExceeded.into()));
        assert!(!is_retryable(&ErrorResponse::new(StatusCode::NOT_FOUND, "").into()));
        assert!(!is_retryable(
            &ErrorResponse::new(StatusCode::TOO_MANY_REQUESTS, "").into()
        ));
        assert!(!is_retryable(&not_modified_without_cache()));
        assert!(!is_retryable(&empty_body(StatusCode::OK)));
        assert!(!is_retryable(&too_large(StatusCode::OK, 10)));
    }

    #[test]
    fn test_exhausted_is_final() {
        let err = Error::RetriesExhausted {
            max_retries: 1,
            last: Box::new(TransportError::Timeout.into()),
        };
        assert!(!is_retryable(&err));
    }

    #[tokio::test]
    async fn test_status_failure_uses_trimmed_body() {
        let mut body = Body::from_bytes(Bytes::from_static(b"  Invalid query: FOO  \n"));
        let err = status_failure(StatusCode::BAD_REQUEST, &mut body).await;
        let response = err.as_response().unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.message(), "Invalid query: FOO");
    }

    #[tokio::test]
    async fn test_status_failure_falls_back_to_status_line() {
        let mut body = Body::empty();
        let err = status_failure(StatusCode::SERVICE_UNAVAILABLE, &mut body).await;
        assert_eq!(err.as_response().unwrap().message(), "503 Service Unavailable");
    }

    #[tokio::test]
    async fn test_status_failure_truncates_message() {
        let mut body = Body::from_bytes(Bytes::from(vec![b'x'; MAX_ERROR_BODY * 2]));
        let err = status_failure(StatusCode::BAD_GATEWAY, &mut body).await;
        assert_eq!(err.as_response().unwrap().message().len(), MAX_ERROR_BODY);
    }

    #[test]
    fn test_transport_failure_prefers_context() {
        let (ctx, cancel) = FetchContext::new();
        assert!(transport_failure(&ctx, TransportError::Timeout).is_transport());

        cancel.cancel();
        let err = transport_failure(&ctx, TransportError::Timeout);
        assert!(matches!(err, Error::Context(ContextError::Cancelled)));
    }
}
