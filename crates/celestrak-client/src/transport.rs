//! HTTP transport port and its reqwest implementation.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures_util::stream::{self, BoxStream, StreamExt, TryStreamExt};
use reqwest::header::HeaderMap;
use reqwest::{Client, ClientBuilder, StatusCode};
use url::Url;

/// HTTP transport configuration.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Whole-request timeout.
    pub request_timeout: Duration,
    /// Maximum idle connections per host.
    pub pool_max_idle_per_host: usize,
    /// Enable gzip decompression.
    pub gzip: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(15),
            pool_max_idle_per_host: 10,
            gzip: true,
        }
    }
}

/// Transport-level failures.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    #[error("request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(#[source] BoxError),

    #[error("failed to read response body: {0}")]
    Body(#[source] BoxError),
}

/// Underlying cause of a [`TransportError`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout
        } else if e.is_connect() {
            TransportError::Connect(Box::new(e))
        } else if e.is_body() || e.is_decode() {
            TransportError::Body(Box::new(e))
        } else {
            TransportError::Request(e)
        }
    }
}

/// A GET request handed to a [`Transport`].
#[derive(Debug, Clone)]
pub struct TransportRequest {
    /// Fully-resolved URL.
    pub url: Url,
    /// Request headers.
    pub headers: HeaderMap,
}

/// The response head plus an unread body.
pub struct TransportResponse {
    /// HTTP status.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Response body.
    pub body: Body,
}

impl fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Chunked response body that can be read up to a bound.
pub struct Body {
    stream: BoxStream<'static, Result<Bytes, TransportError>>,
    pending: Bytes,
}

impl Body {
    /// Wrap a stream of body chunks.
    pub fn from_stream(stream: BoxStream<'static, Result<Bytes, TransportError>>) -> Self {
        Self {
            stream,
            pending: Bytes::new(),
        }
    }

    /// A body made of one chunk.
    pub fn from_bytes(bytes: Bytes) -> Self {
        Self::from_stream(stream::once(async move { Ok::<_, TransportError>(bytes) }).boxed())
    }

    /// A body with no bytes.
    pub fn empty() -> Self {
        Self::from_stream(stream::empty::<Result<Bytes, TransportError>>().boxed())
    }

    /// Next non-empty chunk, or `None` at end of body.
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, TransportError> {
        if !self.pending.is_empty() {
            return Ok(Some(std::mem::take(&mut self.pending)));
        }
        while let Some(chunk) = self.stream.next().await {
            let chunk = chunk?;
            if !chunk.is_empty() {
                return Ok(Some(chunk));
            }
        }
        Ok(None)
    }

    /// Read until end of body or `limit` bytes, whichever comes first.
    ///
    /// Bytes past `limit` stay unread for a later [`Body::has_remaining`].
    pub async fn read_limited(&mut self, limit: usize) -> Result<Bytes, TransportError> {
        let mut buf = BytesMut::new();
        while buf.len() < limit {
            let Some(mut chunk) = self.next_chunk().await? else {
                break;
            };
            let room = limit - buf.len();
            if chunk.len() > room {
                self.pending = chunk.split_off(room);
            }
            buf.extend_from_slice(&chunk);
        }
        Ok(buf.freeze())
    }

    /// Whether at least one more byte can be read.
    pub async fn has_remaining(&mut self) -> Result<bool, TransportError> {
        match self.next_chunk().await? {
            Some(chunk) => {
                self.pending = chunk;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Executes GET requests.
///
/// Implementations must be safe to share between concurrent fetches.
/// Cancellation is by dropping the returned future.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `request` and return the response head with an unread body.
    async fn get(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}

/// Build a configured reqwest client.
pub fn build_client(config: &HttpConfig) -> Result<Client, TransportError> {
    let mut builder = ClientBuilder::new()
        .connect_timeout(config.connect_timeout)
        .timeout(config.request_timeout)
        .pool_max_idle_per_host(config.pool_max_idle_per_host);

    if config.gzip {
        builder = builder.gzip(true);
    }

    builder.build().map_err(TransportError::ClientBuild)
}

/// [`Transport`] backed by a reqwest client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    inner: Client,
}

impl ReqwestTransport {
    /// Create a transport with default config.
    pub fn new() -> Result<Self, TransportError> {
        Self::with_config(&HttpConfig::default())
    }

    /// Create a transport with custom config.
    pub fn with_config(config: &HttpConfig) -> Result<Self, TransportError> {
        let inner = build_client(config)?;
        Ok(Self { inner })
    }

    /// Wrap an existing reqwest client.
    pub fn from_client(inner: Client) -> Self {
        Self { inner }
    }

    /// Get the inner reqwest client.
    pub fn inner(&self) -> &Client {
        &self.inner
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        tracing::trace!(url = %request.url, "sending GET");
        let response = self
            .inner
            .get(request.url)
            .headers(request.headers)
            .send()
            .await?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = Body::from_stream(response.bytes_stream().map_err(TransportError::from).boxed());

        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }
}
