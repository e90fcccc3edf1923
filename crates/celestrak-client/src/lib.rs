//! Client for the CelesTrak GP element-set endpoints.
//!
//! Build a [`Query`], hand it to a [`Client`] together with a
//! [`FetchContext`], and get the raw payload back as [`bytes::Bytes`].
//! Parsing TLE/JSON/XML/CSV/KVN output is left to the caller.

pub mod cache;
pub mod classify;
pub mod client;
pub mod config;
pub mod context;
pub mod error;
pub mod query;
pub mod transport;

pub use cache::{Cache, CacheEntry, CacheStats, MemoryCache};
pub use client::{Client, ClientBuilder, DEFAULT_BASE_URL, MAX_ERROR_BODY, MAX_RESPONSE_SIZE};
pub use config::{ClientConfig, ConfigError};
pub use context::{CancelHandle, ContextError, FetchContext};
pub use error::{Error, ErrorKind, ErrorResponse, QueryError, Result};
pub use query::{special, Endpoint, Format, Query, TableFlags};
pub use reqwest::header::{HeaderMap, HeaderValue};
pub use reqwest::StatusCode;
pub use transport::{
    Body, BoxError, HttpConfig, ReqwestTransport, Transport, TransportError, TransportRequest,
    TransportResponse,
};
