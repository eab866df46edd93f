//! 📡 The reqwest-backed transport. One client, one pool, many requests.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::trace;

use super::{Method, StoreRequest, StoreResponse, Transport};

/// 📡 Real HTTP against a real cluster.
///
/// Holds:
/// - `client`: the HTTP muscle 💪, built once and reused for every call (connection pooling)
/// - `base_url`: cluster root, trailing slash trimmed
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    /// 🚀 Build the client with `timeout` applied to both connect and whole-request.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()
            .context("💀 The HTTP client refused to be born. Probably a missing TLS cert or a cursed system OpenSSL.")?;

        Ok(Self {
            client,
            // -- trim_end_matches('/'): without it, `https://host//_bulk`. One slash of difference.
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url_for(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: StoreRequest) -> Result<StoreResponse> {
        let url = self.url_for(&request.path);
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
        };

        let mut builder = self.client.request(method, &url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .with_context(|| format!("💀 {} {} never made it to the cluster", request.method, url))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .with_context(|| format!("💀 {} {} answered, but the body got lost on the way", request.method, url))?;

        trace!("📬 {} {} -> {}", request.method, url, status);
        Ok(StoreResponse { status, body })
    }
}
