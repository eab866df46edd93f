//! 📦 A cluster that never forgets. Unlike my dad, who forgot my soccer game in 1998.
//!
//! `InMemoryTransport` pretends to be just enough of Elasticsearch for the
//! appender: PUT stores a document at a path, GET reads it back (404 when
//! absent), POST always lands. Every request is recorded so tests can peek.
//! Scripted responses and an "unreachable" switch cover the sad paths.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{Result, bail};
use async_trait::async_trait;

use super::{Method, StoreRequest, StoreResponse, Transport};

#[derive(Debug, Default)]
struct FakeCluster {
    /// 🗄️ path → stored body, filled by PUT
    documents: HashMap<String, String>,
    /// 🎬 (method, path) → canned response, wins over everything else
    scripted: HashMap<(Method, String), StoreResponse>,
    /// 📼 every request, in arrival order
    requests: Vec<StoreRequest>,
    /// 🔌 when set, every call fails like the cable got pulled
    unreachable: bool,
}

/// 📦 Clone-able handle to one shared fake cluster.
///
/// Clone-able because tests need to peek inside after handing a copy to the
/// appender. The `Arc` means everyone sees the same state.
#[derive(Debug, Default, Clone)]
pub struct InMemoryTransport {
    cluster: Arc<Mutex<FakeCluster>>,
}

impl InMemoryTransport {
    /// 🏜️ An empty cluster with no version. GET / is a 404.
    pub fn new() -> Self {
        Self::default()
    }

    /// 🌱 A reachable cluster on `version` with no template and no pipeline yet.
    pub fn cluster(version: &str) -> Self {
        let transport = Self::new();
        transport.insert_document(
            "/",
            format!(r#"{{"name":"node-1","version":{{"number":"{version}"}},"tagline":"You Know, for Search"}}"#),
        );
        transport
    }

    /// 🏡 A reachable cluster on `version` that already has template and pipeline installed.
    pub fn provisioned(version: &str) -> Self {
        let transport = Self::cluster(version);
        transport.insert_document("/_template/log4j", r#"{"log4j":{"order":0}}"#.to_string());
        transport.insert_document(
            "/_ingest/pipeline/log4j",
            r#"{"log4j":{"processors":[]}}"#.to_string(),
        );
        transport
    }

    /// 🔌 Every call from now on fails at the transport level.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.lock().unreachable = unreachable;
    }

    /// 🎬 Answer `method path` with a fixed status and body, forever.
    pub fn script(&self, method: Method, path: impl Into<String>, status: u16, body: impl Into<String>) {
        self.lock().scripted.insert(
            (method, path.into()),
            StoreResponse {
                status,
                body: body.into(),
            },
        );
    }

    pub fn insert_document(&self, path: impl Into<String>, body: String) {
        self.lock().documents.insert(path.into(), body);
    }

    /// 📼 Snapshot of every request seen so far.
    pub fn requests(&self) -> Vec<StoreRequest> {
        self.lock().requests.clone()
    }

    /// 📼 Only the requests with `method`.
    pub fn requests_with(&self, method: Method) -> Vec<StoreRequest> {
        self.lock()
            .requests
            .iter()
            .filter(|r| r.method == method)
            .cloned()
            .collect()
    }

    pub fn clear_requests(&self) {
        self.lock().requests.clear();
    }

    // 🔒 A poisoned lock in a test fake just means another test thread panicked. Keep going.
    fn lock(&self) -> MutexGuard<'_, FakeCluster> {
        self.cluster.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn execute(&self, request: StoreRequest) -> Result<StoreResponse> {
        let mut cluster = self.lock();
        cluster.requests.push(request.clone());

        if cluster.unreachable {
            bail!("💀 connection refused: the in-memory cluster is pretending to be unplugged");
        }

        if let Some(canned) = cluster
            .scripted
            .get(&(request.method, request.path.clone()))
        {
            return Ok(canned.clone());
        }

        let response = match request.method {
            Method::Get => match cluster.documents.get(&request.path) {
                Some(body) => StoreResponse {
                    status: 200,
                    body: body.clone(),
                },
                None => StoreResponse {
                    status: 404,
                    body: r#"{"error":"not found","status":404}"#.to_string(),
                },
            },
            Method::Put => {
                let body = request.body.clone().unwrap_or_default();
                // -- 🎭 like the real thing, named resources come back wrapped in their name
                let stored = match request.path.rsplit_once('/') {
                    Some((prefix, name)) if prefix == "/_template" || prefix == "/_ingest/pipeline" => {
                        format!(r#"{{"{name}":{body}}}"#)
                    }
                    _ => body,
                };
                cluster.documents.insert(request.path.clone(), stored);
                StoreResponse {
                    status: 200,
                    body: r#"{"acknowledged":true}"#.to_string(),
                }
            }
            Method::Post => StoreResponse {
                status: 200,
                body: r#"{"took":1,"errors":false,"items":[]}"#.to_string(),
            },
        };
        Ok(response)
    }
}
