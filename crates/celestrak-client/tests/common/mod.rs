//! Scripted transport and cache doubles shared by the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use celestrak_client::{
    Body, Cache, CacheEntry, Client, ClientBuilder, HeaderMap, HeaderValue, MemoryCache,
    StatusCode, Transport, TransportError, TransportRequest, TransportResponse,
};
use futures_util::stream::{self, StreamExt};

/// One scripted transport outcome.
#[derive(Debug, Clone)]
pub enum Reply {
    /// A response with the given status, body chunks, and optional ETag.
    Respond {
        status: u16,
        chunks: Vec<Vec<u8>>,
        etag: Option<&'static str>,
    },
    /// The body starts, then the connection drops.
    BrokenBody,
    /// The request never reaches the server.
    ConnectFailure,
    /// The request never completes.
    Hang,
}

impl Reply {
    pub fn ok(body: &[u8]) -> Self {
        Self::status(200, body)
    }

    pub fn status(status: u16, body: &[u8]) -> Self {
        Reply::Respond {
            status,
            chunks: vec![body.to_vec()],
            etag: None,
        }
    }

    pub fn chunks(chunks: &[&[u8]]) -> Self {
        Reply::Respond {
            status: 200,
            chunks: chunks.iter().map(|c| c.to_vec()).collect(),
            etag: None,
        }
    }

    pub fn with_etag(self, tag: &'static str) -> Self {
        match self {
            Reply::Respond { status, chunks, .. } => Reply::Respond {
                status,
                chunks,
                etag: Some(tag),
            },
            other => other,
        }
    }
}

/// Replays a script; the last reply repeats once the script runs out.
pub struct FakeTransport {
    script: Mutex<VecDeque<Reply>>,
    last: Mutex<Option<Reply>>,
    requests: Mutex<Vec<TransportRequest>>,
    calls: AtomicUsize,
}

impl FakeTransport {
    pub fn new(script: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<TransportRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next_reply(&self) -> Reply {
        let next = self.script.lock().unwrap().pop_front();
        let mut last = self.last.lock().unwrap();
        match next {
            Some(reply) => {
                *last = Some(reply.clone());
                reply
            }
            None => last.clone().expect("empty script"),
        }
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn get(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request);

        match self.next_reply() {
            Reply::Respond {
                status,
                chunks,
                etag,
            } => {
                let mut headers = HeaderMap::new();
                if let Some(tag) = etag {
                    headers.insert("etag", HeaderValue::from_static(tag));
                }
                let chunks: Vec<Result<Bytes, TransportError>> =
                    chunks.into_iter().map(|c| Ok(Bytes::from(c))).collect();
                Ok(TransportResponse {
                    status: StatusCode::from_u16(status).unwrap(),
                    headers,
                    body: Body::from_stream(stream::iter(chunks).boxed()),
                })
            }
            Reply::BrokenBody => {
                let chunks: Vec<Result<Bytes, TransportError>> = vec![
                    Ok(Bytes::from_static(b"1 25544U")),
                    Err(TransportError::Body("connection reset by peer".into())),
                ];
                Ok(TransportResponse {
                    status: StatusCode::OK,
                    headers: HeaderMap::new(),
                    body: Body::from_stream(stream::iter(chunks).boxed()),
                })
            }
            Reply::ConnectFailure => Err(TransportError::Connect("connection refused".into())),
            Reply::Hang => {
                std::future::pending::<()>().await;
                unreachable!()
            }
        }
    }
}

/// [`MemoryCache`] that counts writes.
#[derive(Default)]
pub struct CountingCache {
    pub inner: MemoryCache,
    puts: AtomicUsize,
}

impl CountingCache {
    pub fn puts(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Cache for CountingCache {
    async fn get(&self, key: &str) -> Option<CacheEntry> {
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, entry: CacheEntry) {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.inner.put(key, entry).await;
    }
}

/// Builder with the default one-second backoff and no user agent.
pub fn builder(transport: Arc<FakeTransport>) -> ClientBuilder {
    Client::builder(transport).no_user_agent()
}

/// Client with a short backoff for tests that do not measure time.
pub fn quick_client(transport: Arc<FakeTransport>) -> Client {
    builder(transport)
        .retries(3, Duration::from_millis(1))
        .build()
        .unwrap()
}
