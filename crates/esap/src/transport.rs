//! 🔌 Transport: where the bytes actually leave the building.
//!
//! 🚰 The [`RemoteClient`](crate::client::RemoteClient) decides what a failure *means*.
//! A transport only moves one request and hands back one response (or an error
//! when the network had other plans).
//!
//! 🎭 Two backends live here:
//! - [`HttpTransport`]: reqwest, one pooled client, real sockets, real sadness
//! - [`InMemoryTransport`]: a pretend cluster in a `HashMap`, for tests and dry runs 🦆

use std::fmt;

use anyhow::Result;
use async_trait::async_trait;

pub mod http;
pub mod in_mem;

pub use http::HttpTransport;
pub use in_mem::InMemoryTransport;

/// 📡 The three verbs the appender ever speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
        };
        f.write_str(name)
    }
}

/// 📦 One outbound request. `path` is relative to the cluster root and may carry a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreRequest {
    pub method: Method,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl StoreRequest {
    /// 🔍 First header named `name`, case-insensitively. HTTP headers don't care about case and neither do we.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// 📬 What came back. Any status, success or not. Judgement happens upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreResponse {
    pub status: u16,
    pub body: String,
}

/// 🚰 Moves one request to the cluster and one response back.
///
/// # Contract 📜
/// - `Ok` for every response that arrived, whatever its status.
/// - `Err` only for transport-level failures: refused, timed out, DNS said no.
#[async_trait]
pub trait Transport: fmt::Debug + Send + Sync {
    async fn execute(&self, request: StoreRequest) -> Result<StoreResponse>;
}

/// 🎭 The many faces of a transport. Same casting-call pattern as everywhere else.
#[derive(Debug, Clone)]
pub enum TransportBackend {
    Http(HttpTransport),
    InMemory(InMemoryTransport),
}

#[async_trait]
impl Transport for TransportBackend {
    async fn execute(&self, request: StoreRequest) -> Result<StoreResponse> {
        match self {
            TransportBackend::Http(transport) => transport.execute(request).await,
            TransportBackend::InMemory(transport) => transport.execute(request).await,
        }
    }
}

impl From<HttpTransport> for TransportBackend {
    fn from(transport: HttpTransport) -> Self {
        TransportBackend::Http(transport)
    }
}

impl From<InMemoryTransport> for TransportBackend {
    fn from(transport: InMemoryTransport) -> Self {
        TransportBackend::InMemory(transport)
    }
}
