//! 📡 Remote Client: GET / POST / PUT with the manners the cluster expects.
//!
//! Every call gets Basic auth and a JSON content type. Failures never leave
//! this module as errors: GET hands back `None` (and tells an error sink, if
//! you gave it one), POST and PUT hand back `false`. Delivery failures must not
//! climb back up into the code that was just trying to log something.

use anyhow::{Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing::debug;

use crate::transport::{Method, StoreRequest, StoreResponse, Transport, TransportBackend};

/// 🕳️ Somewhere to report a failed GET. Bootstrap uses it, callers that don't care pass `None`.
pub type ErrorSink<'a> = &'a (dyn Fn(&anyhow::Error) + Send + Sync);

/// 📡 Thin, opinionated wrapper over a [`TransportBackend`].
#[derive(Debug, Clone)]
pub struct RemoteClient {
    transport: TransportBackend,
    authorization: String,
    debug: bool,
}

/// 🔐 `Basic base64(username:password)`. The ancient ritual.
pub fn basic_auth_header(username: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{username}:{password}")))
}

impl RemoteClient {
    pub fn new(transport: impl Into<TransportBackend>, username: &str, password: &str, debug: bool) -> Self {
        Self {
            transport: transport.into(),
            authorization: basic_auth_header(username, password),
            debug,
        }
    }

    /// 📥 GET `path`. Body on success, `None` otherwise.
    ///
    /// A status ≥ 400 or a transport error goes to `error_sink` when there is one.
    pub async fn get(&self, path: &str, error_sink: Option<ErrorSink<'_>>) -> Option<String> {
        let outcome = self
            .send(Method::Get, path, None)
            .await
            .and_then(|response| {
                if response.status >= 400 {
                    Err(anyhow!(
                        "GET {path} returned {}: {}",
                        response.status,
                        response.body
                    ))
                } else {
                    Ok(response.body)
                }
            });

        match outcome {
            Ok(body) => Some(body),
            Err(err) => {
                if let Some(sink) = error_sink {
                    sink(&err);
                }
                None
            }
        }
    }

    /// 📤 POST `body` to `path`. `true` when the cluster said something below 400.
    pub async fn post(&self, path: &str, body: String) -> bool {
        self.write(Method::Post, path, body).await
    }

    /// 📤 PUT `body` to `path`. Same rules as [`RemoteClient::post`].
    pub async fn put(&self, path: &str, body: String) -> bool {
        self.write(Method::Put, path, body).await
    }

    async fn write(&self, method: Method, path: &str, body: String) -> bool {
        match self.send(method, path, Some(body)).await {
            Ok(response) if response.status >= 400 => {
                if self.debug {
                    debug!(
                        "💀 [http-{}] {} error {}: {}",
                        method.to_string().to_lowercase(),
                        path,
                        response.status,
                        response.body
                    );
                }
                false
            }
            Ok(_) => true,
            Err(err) => {
                if self.debug {
                    debug!("💀 [http-{}] {} failed: {:#}", method.to_string().to_lowercase(), path, err);
                }
                false
            }
        }
    }

    async fn send(&self, method: Method, path: &str, body: Option<String>) -> Result<StoreResponse> {
        let request = StoreRequest {
            method,
            path: path.to_string(),
            headers: vec![
                ("Content-Type".to_string(), "application/json".to_string()),
                ("Authorization".to_string(), self.authorization.clone()),
            ],
            body,
        };
        self.transport.execute(request).await
    }
}
