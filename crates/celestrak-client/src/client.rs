//! Fetch engine: one bounded attempt, and the retry loop around it.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, ETAG, IF_NONE_MATCH, USER_AGENT};
use reqwest::StatusCode;
use tracing::{debug, instrument, trace};
use url::Url;

use crate::cache::{Cache, CacheEntry};
use crate::classify;
use crate::config::{ClientConfig, ConfigError};
use crate::context::FetchContext;
use crate::error::{Error, Result};
use crate::query::{Endpoint, Query};
use crate::transport::{Transport, TransportRequest, TransportResponse};

/// Production origin.
pub const DEFAULT_BASE_URL: &str = "https://celestrak.org";

/// Default cap on a response body (100 MiB).
pub const MAX_RESPONSE_SIZE: usize = 100 * 1024 * 1024;

pub use crate::classify::MAX_ERROR_BODY;

/// Builds an immutable [`Client`].
pub struct ClientBuilder {
    transport: Arc<dyn Transport>,
    cache: Option<Arc<dyn Cache>>,
    config: ClientConfig,
}

impl ClientBuilder {
    /// Start from default configuration and no cache.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            cache: None,
            config: ClientConfig::default(),
        }
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the origin endpoint paths resolve against.
    pub fn base_url(mut self, base_url: Url) -> Self {
        self.config.base_url = base_url;
        self
    }

    /// Set the `User-Agent` header.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = Some(user_agent.into());
        self
    }

    /// Send no `User-Agent` header.
    pub fn no_user_agent(mut self) -> Self {
        self.config.user_agent = None;
        self
    }

    /// Retries after the first attempt and the initial backoff.
    pub fn retries(mut self, max_retries: u32, retry_delay: Duration) -> Self {
        self.config.max_retries = max_retries;
        self.config.retry_delay = retry_delay;
        self
    }

    /// Cap on accepted response bodies.
    pub fn max_response_bytes(mut self, max: usize) -> Self {
        self.config.max_response_bytes = max;
        self
    }

    /// Enable ETag-aware caching.
    pub fn cache(mut self, cache: Arc<dyn Cache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Validate the configuration and build the client.
    pub fn build(self) -> std::result::Result<Client, ConfigError> {
        self.config.validate()?;

        let user_agent = match &self.config.user_agent {
            Some(ua) => Some(HeaderValue::from_str(ua).map_err(|e| {
                ConfigError::ValidationError {
                    message: format!("invalid user_agent: {e}"),
                }
            })?),
            None => None,
        };

        Ok(Client {
            inner: Arc::new(ClientInner {
                transport: self.transport,
                cache: self.cache,
                user_agent,
                config: self.config,
            }),
        })
    }
}

struct ClientInner {
    transport: Arc<dyn Transport>,
    cache: Option<Arc<dyn Cache>>,
    user_agent: Option<HeaderValue>,
    config: ClientConfig,
}

/// CelesTrak GP client.
///
/// Cloning is cheap and clones share the transport and cache. Every fetch is
/// independent, so one client can serve concurrent callers.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl Client {
    /// Start building a client around `transport`.
    pub fn builder(transport: Arc<dyn Transport>) -> ClientBuilder {
        ClientBuilder::new(transport)
    }

    /// The configuration the client was built with.
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Current element sets (`gp.php`).
    pub async fn fetch_gp(&self, ctx: &FetchContext, query: &Query) -> Result<Bytes> {
        self.fetch(ctx, query, Endpoint::Current).await
    }

    /// First element set on record (`gp-first.php`).
    pub async fn fetch_gp_first(&self, ctx: &FetchContext, query: &Query) -> Result<Bytes> {
        self.fetch(ctx, query, Endpoint::First).await
    }

    /// Last element set on record (`gp-last.php`).
    pub async fn fetch_gp_last(&self, ctx: &FetchContext, query: &Query) -> Result<Bytes> {
        self.fetch(ctx, query, Endpoint::Last).await
    }

    /// Tabular summary (`table.php`); honors the query's table flags.
    pub async fn fetch_table(&self, ctx: &FetchContext, query: &Query) -> Result<Bytes> {
        self.fetch(ctx, query, Endpoint::Table).await
    }

    /// Fetch `endpoint` with up to `max_retries` retries and exponential backoff.
    ///
    /// Non-retryable failures return immediately. When every attempt fails
    /// with a retryable error the result is [`Error::RetriesExhausted`]
    /// wrapping the last one. Cancellation and deadline expiry of `ctx`
    /// abort both a pending wait and an in-flight attempt.
    #[instrument(skip_all, fields(endpoint = %endpoint))]
    pub async fn fetch(&self, ctx: &FetchContext, query: &Query, endpoint: Endpoint) -> Result<Bytes> {
        let max_retries = self.inner.config.max_retries;
        let mut delay = self.inner.config.retry_delay;
        let mut attempt: u32 = 0;

        loop {
            if let Some(err) = ctx.err() {
                return Err(err.into());
            }

            if attempt > 0 {
                debug!(attempt, delay_ms = delay.as_millis() as u64, "waiting before retry");
                tokio::select! {
                    biased;
                    err = ctx.done() => return Err(err.into()),
                    _ = tokio::time::sleep(delay) => {
                        delay = delay.saturating_mul(2);
                    }
                }
            }

            let err = match self.fetch_once(ctx, query, endpoint).await {
                Ok(data) => {
                    debug!(attempt, bytes = data.len(), "fetch succeeded");
                    return Ok(data);
                }
                Err(err) => err,
            };

            if !err.is_retryable() {
                return Err(err);
            }

            if attempt >= max_retries {
                return Err(Error::RetriesExhausted {
                    max_retries,
                    last: Box::new(err),
                });
            }

            debug!(attempt, error = %err, "attempt failed, will retry");
            attempt += 1;
        }
    }

    /// One attempt: build the URL, consult the cache, send, and read the body.
    async fn fetch_once(&self, ctx: &FetchContext, query: &Query, endpoint: Endpoint) -> Result<Bytes> {
        if let Some(err) = ctx.err() {
            return Err(err.into());
        }

        let url = query.build_url(&self.inner.config.base_url, endpoint)?;

        tokio::select! {
            biased;
            err = ctx.done() => Err(err.into()),
            result = self.exchange(ctx, url) => result,
        }
    }

    async fn exchange(&self, ctx: &FetchContext, url: Url) -> Result<Bytes> {
        let cache_key = url.as_str().to_owned();

        let cached = match &self.inner.cache {
            Some(cache) => cache.get(&cache_key).await,
            None => None,
        };

        let request = self.request(url, cached.as_ref());
        trace!(url = %request.url, headers = ?request.headers, "request");

        let TransportResponse {
            status,
            headers,
            mut body,
        } = self
            .inner
            .transport
            .get(request)
            .await
            .map_err(|e| classify::transport_failure(ctx, e))?;

        if status == StatusCode::NOT_MODIFIED {
            return match cached {
                Some(entry) => {
                    debug!(key = %cache_key, "not modified, serving cached body");
                    Ok(entry.data)
                }
                None => Err(classify::not_modified_without_cache()),
            };
        }

        if !status.is_success() {
            return Err(classify::status_failure(status, &mut body).await);
        }

        let limit = self.inner.config.max_response_bytes;
        let data = body
            .read_limited(limit)
            .await
            .map_err(|e| classify::transport_failure(ctx, e))?;

        if data.len() == limit {
            let more = body
                .has_remaining()
                .await
                .map_err(|e| classify::transport_failure(ctx, e))?;
            if more {
                return Err(classify::too_large(status, limit));
            }
        }

        if data.is_empty() {
            return Err(classify::empty_body(status));
        }

        if let Some(cache) = &self.inner.cache {
            let etag = headers
                .get(ETAG)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .unwrap_or_default()
                .to_string();
            cache
                .put(
                    &cache_key,
                    CacheEntry {
                        data: data.clone(),
                        etag,
                    },
                )
                .await;
        }

        Ok(data)
    }

    fn request(&self, url: Url, cached: Option<&CacheEntry>) -> TransportRequest {
        let mut headers = HeaderMap::new();

        if let Some(user_agent) = &self.inner.user_agent {
            headers.insert(USER_AGENT, user_agent.clone());
        }

        if let Some(entry) = cached.filter(|entry| !entry.etag.is_empty()) {
            if let Ok(etag) = HeaderValue::from_str(&entry.etag) {
                headers.insert(IF_NONE_MATCH, etag);
            }
        }

        TransportRequest { url, headers }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{Body, TransportError};
    use async_trait::async_trait;

    struct Unreachable;

    #[async_trait]
    impl Transport for Unreachable {
        async fn get(&self, _request: TransportRequest) -> std::result::Result<TransportResponse, TransportError> {
            panic!("no request expected");
        }
    }

    struct Static(&'static str);

    #[async_trait]
    impl Transport for Static {
        async fn get(&self, _request: TransportRequest) -> std::result::Result<TransportResponse, TransportError> {
            Ok(TransportResponse {
                status: StatusCode::OK,
                headers: HeaderMap::new(),
                body: Body::from_bytes(Bytes::from_static(self.0.as_bytes())),
            })
        }
    }

    #[test]
    fn test_builder_defaults() {
        let client = Client::builder(Arc::new(Unreachable)).build().unwrap();
        assert_eq!(client.config(), &ClientConfig::default());
    }

    #[test]
    fn test_builder_rejects_zero_cap() {
        let result = Client::builder(Arc::new(Unreachable))
            .max_response_bytes(0)
            .build();
        assert!(matches!(result, Err(ConfigError::ValidationError { .. })));
    }

    #[test]
    fn test_request_headers() {
        let client = Client::builder(Arc::new(Unreachable))
            .user_agent("test-agent/1.0")
            .build()
            .unwrap();
        let url = Url::parse("https://celestrak.org/NORAD/elements/gp.php").unwrap();

        let plain = client.request(url.clone(), None);
        assert_eq!(plain.headers.get(USER_AGENT).unwrap(), "test-agent/1.0");
        assert!(plain.headers.get(IF_NONE_MATCH).is_none());

        let entry = CacheEntry {
            data: Bytes::from_static(b"x"),
            etag: "\"abc\"".to_string(),
        };
        let conditional = client.request(url.clone(), Some(&entry));
        assert_eq!(conditional.headers.get(IF_NONE_MATCH).unwrap(), "\"abc\"");

        let untagged = CacheEntry {
            etag: String::new(),
            ..entry
        };
        assert!(client
            .request(url, Some(&untagged))
            .headers
            .get(IF_NONE_MATCH)
            .is_none());
    }

    #[test]
    fn test_no_user_agent() {
        let client = Client::builder(Arc::new(Unreachable))
            .no_user_agent()
            .build()
            .unwrap();
        let url = Url::parse("https://celestrak.org/").unwrap();
        assert!(client.request(url, None).headers.get(USER_AGENT).is_none());
    }

    #[tokio::test]
    async fn test_invalid_query_makes_no_request() {
        let client = Client::builder(Arc::new(Unreachable)).build().unwrap();
        let err = client
            .fetch_gp(&FetchContext::background(), &Query::default())
            .await
            .unwrap_err();
        assert!(err.is_query_error());
    }

    #[tokio::test]
    async fn test_cancelled_context_makes_no_request() {
        let client = Client::builder(Arc::new(Unreachable)).build().unwrap();
        let (ctx, cancel) = FetchContext::new();
        cancel.cancel();

        let query = Query::by_catnr("25544", crate::Format::Tle);
        let err = client.fetch_table(&ctx, &query).await.unwrap_err();
        assert!(err.is_context());
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let client = Client::builder(Arc::new(Static("ISS (ZARYA)")))
            .build()
            .unwrap();
        let data = client
            .fetch_gp_last(
                &FetchContext::background(),
                &Query::by_name("ISS", crate::Format::Tle),
            )
            .await
            .unwrap();
        assert_eq!(&data[..], b"ISS (ZARYA)");
    }
}
