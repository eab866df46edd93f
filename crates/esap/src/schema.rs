// ai
//! 🏗️ Schema Bootstrapper: make sure the cluster is ready before the first log line lands.
//!
//! 🎬 Runs exactly once per appender, inline with construction:
//! 1. `GET /` → which major version are we talking to?
//! 2. `GET /_template/log4j` → missing? `PUT` the template for that version.
//! 3. `GET /_ingest/pipeline/log4j` → missing? `PUT` the grok pipeline.
//!
//! The configured pipeline name only picks what `_bulk?pipeline=` points at.
//! Bootstrap always installs under `log4j`.
//!
//! 🧠 Knowledge graph:
//! - Check-before-create keeps this safe to run on every process start. A hand-tuned
//!   template already on the cluster is left alone.
//! - "Present" means the GET body mentions the name. No deep inspection. No diffing.
//! - Undetected version (`-1`) short-circuits both ensures to `false`.
//!
//! 🦆 The duck was bootstrapped once. It has not been re-detected since.

use anyhow::{Context, Result, anyhow};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::client::{ErrorSink, RemoteClient};

pub mod resources;

pub use resources::SchemaResources;

/// 📦 Where the index template lives.
pub const TEMPLATE_PATH: &str = "/_template/log4j";
/// 🔍 What a template GET body must mention to count as "already installed".
pub const TEMPLATE_NAME: &str = "log4j";

/// 🔧 Where the grok pipeline lives.
pub const PIPELINE_PATH: &str = "/_ingest/pipeline/log4j";
/// 🔍 What a pipeline GET body must mention to count as "already installed".
pub const PIPELINE_NAME: &str = "log4j";

/// 📋 The outcome of one bootstrap. Computed once, never recomputed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootstrapReport {
    /// Major version of the cluster, `-1` when it couldn't be detected.
    pub major_version: i32,
    pub template_ready: bool,
    pub pipeline_ready: bool,
}

impl BootstrapReport {
    pub fn connected(&self) -> bool {
        self.major_version > 0
    }

    /// ✅ Version known, template there, pipeline there.
    pub fn is_ready(&self) -> bool {
        self.connected() && self.template_ready && self.pipeline_ready
    }
}

/// 🔍 `{"version":{"number":"7.10.2"}}` → `7`.
///
/// Everything before the first `.` is the major version. No dot, no version.
pub fn parse_major_version(body: &str) -> Result<i32> {
    let root: Value = serde_json::from_str(body).context("💀 root endpoint did not return JSON")?;
    let number = root
        .get("version")
        .and_then(|version| version.get("number"))
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("💀 root endpoint has no version.number"))?;
    let (major, _) = number
        .split_once('.')
        .ok_or_else(|| anyhow!("💀 version number '{number}' has no dot in it"))?;
    major
        .parse::<i32>()
        .with_context(|| format!("💀 major version '{major}' is not a number"))
}

/// 🏗️ Borrows a client and a set of resources, runs the three checks.
#[derive(Debug)]
pub struct SchemaBootstrapper<'a> {
    client: &'a RemoteClient,
    resources: &'a SchemaResources,
    debug: bool,
}

impl<'a> SchemaBootstrapper<'a> {
    pub fn new(
        client: &'a RemoteClient,
        resources: &'a SchemaResources,
        debug: bool,
    ) -> Self {
        Self {
            client,
            resources,
            debug,
        }
    }

    /// 🚀 Version, then template, then pipeline. Never errors, only reports.
    pub async fn run(&self) -> BootstrapReport {
        let major_version = self.detect_version().await;
        let template_ready = self.ensure_template(major_version).await;
        let pipeline_ready = self.ensure_pipeline(major_version).await;
        let report = BootstrapReport {
            major_version,
            template_ready,
            pipeline_ready,
        };
        debug!("📋 bootstrap finished: {:?}", report);
        report
    }

    /// 📡 `GET /` and pull the major version out. `-1` when anything goes sideways.
    pub async fn detect_version(&self) -> i32 {
        let report_failure: ErrorSink<'_> = &|err: &anyhow::Error| {
            warn!("💀 could not reach the cluster root: {:#}", err);
        };
        let Some(body) = self.client.get("/", Some(report_failure)).await else {
            return -1;
        };
        if body.trim().is_empty() {
            return -1;
        }
        match parse_major_version(&body) {
            Ok(major) => {
                info!("📡 connected to cluster, major version {}", major);
                major
            }
            Err(err) => {
                if self.debug {
                    debug!("💀 could not parse cluster version from '{}': {:#}", body, err);
                }
                -1
            }
        }
    }

    /// 📦 Template present? Leave it. Missing? PUT the one for this version.
    pub async fn ensure_template(&self, major_version: i32) -> bool {
        if major_version <= 0 {
            return false;
        }
        self.ensure(
            TEMPLATE_PATH,
            TEMPLATE_NAME,
            self.resources.template_for(major_version),
        )
        .await
    }

    /// 🔧 Pipeline present? Leave it. Missing? PUT the grok pipeline.
    pub async fn ensure_pipeline(&self, major_version: i32) -> bool {
        if major_version <= 0 {
            return false;
        }
        self.ensure(PIPELINE_PATH, PIPELINE_NAME, &self.resources.pipeline)
            .await
    }

    async fn ensure(&self, path: &str, name: &str, definition: &str) -> bool {
        if let Some(existing) = self.client.get(path, None).await {
            if existing.contains(name) {
                debug!("✅ {} already installed, leaving it alone", path);
                return true;
            }
        }
        info!("🏗️ installing {}", path);
        let installed = self.client.put(path, definition.to_string()).await;
        if !installed {
            warn!("💀 failed to install {}", path);
        }
        installed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{InMemoryTransport, Method};

    fn client_for(transport: &InMemoryTransport) -> RemoteClient {
        RemoteClient::new(transport.clone(), "elastic", "changeme", true)
    }

    #[test]
    fn the_one_where_versions_get_chopped_at_the_first_dot() {
        assert_eq!(
            parse_major_version(r#"{"version":{"number":"7.10.2"}}"#).unwrap(),
            7
        );
        assert_eq!(
            parse_major_version(r#"{"version":{"number":"6.8.23"}}"#).unwrap(),
            6
        );
        assert!(parse_major_version(r#"{"version":{"number":"7"}}"#).is_err());
        assert!(parse_major_version(r#"{"version":{}}"#).is_err());
        assert!(parse_major_version("<html>nginx</html>").is_err());
    }

    #[tokio::test]
    async fn the_one_where_a_fresh_seven_gets_everything_installed() {
        let transport = InMemoryTransport::cluster("7.17.0");
        let client = client_for(&transport);
        let resources = SchemaResources::default();

        let report = SchemaBootstrapper::new(&client, &resources, true)
            .run()
            .await;

        assert!(report.is_ready());
        assert_eq!(report.major_version, 7);
        let puts = transport.requests_with(Method::Put);
        assert_eq!(puts.len(), 2);
        assert_eq!(puts[0].path, "/_template/log4j");
        assert_eq!(puts[0].body.as_deref(), Some(resources.template_v7.as_str()));
        assert_eq!(puts[1].path, "/_ingest/pipeline/log4j");
        assert_eq!(puts[1].body.as_deref(), Some(resources.pipeline.as_str()));
    }

    #[tokio::test]
    async fn the_one_where_six_gets_the_typed_template() {
        let transport = InMemoryTransport::cluster("6.8.23");
        let client = client_for(&transport);
        let resources = SchemaResources::default();

        let report = SchemaBootstrapper::new(&client, &resources, false)
            .run()
            .await;

        assert!(report.is_ready());
        let puts = transport.requests_with(Method::Put);
        assert_eq!(puts[0].body.as_deref(), Some(resources.template_v6.as_str()));
    }

    #[tokio::test]
    async fn the_one_where_bootstrapping_twice_puts_nothing_the_second_time() {
        let transport = InMemoryTransport::cluster("7.17.0");
        let client = client_for(&transport);
        let resources = SchemaResources::default();
        let bootstrapper = SchemaBootstrapper::new(&client, &resources, false);

        assert!(bootstrapper.run().await.is_ready());
        transport.clear_requests();
        assert!(bootstrapper.run().await.is_ready());

        assert!(transport.requests_with(Method::Put).is_empty());
        assert_eq!(transport.requests_with(Method::Get).len(), 3);
    }

    #[tokio::test]
    async fn the_one_where_nobody_answers_and_nothing_gets_put() {
        let transport = InMemoryTransport::cluster("7.17.0");
        transport.set_unreachable(true);
        let client = client_for(&transport);
        let resources = SchemaResources::default();

        let report = SchemaBootstrapper::new(&client, &resources, false)
            .run()
            .await;

        assert_eq!(
            report,
            BootstrapReport {
                major_version: -1,
                template_ready: false,
                pipeline_ready: false,
            }
        );
        assert!(!report.is_ready());
        // -- 🔌 only the root GET was attempted, the ensures short-circuit on -1
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn the_one_where_the_template_put_is_rejected() {
        let transport = InMemoryTransport::cluster("7.17.0");
        transport.script(Method::Put, TEMPLATE_PATH, 400, r#"{"error":"mapper_parsing_exception"}"#);
        let client = client_for(&transport);
        let resources = SchemaResources::default();

        let report = SchemaBootstrapper::new(&client, &resources, false)
            .run()
            .await;

        assert!(report.connected());
        assert!(!report.template_ready);
        assert!(report.pipeline_ready);
        assert!(!report.is_ready());
    }

    #[tokio::test]
    async fn the_one_where_only_the_log4j_pipeline_is_ever_looked_at() {
        let transport = InMemoryTransport::cluster("7.17.0");
        transport.insert_document(
            "/_ingest/pipeline/shipping",
            r#"{"shipping":{"processors":[]}}"#.to_string(),
        );
        let client = client_for(&transport);
        let resources = SchemaResources::default();

        let report = SchemaBootstrapper::new(&client, &resources, false).run().await;

        assert!(report.is_ready());
        let paths: Vec<String> = transport.requests().into_iter().map(|r| r.path).collect();
        assert!(paths.iter().any(|p| p == "/_ingest/pipeline/log4j"));
        assert!(!paths.iter().any(|p| p.contains("shipping")));
        let puts = transport.requests_with(Method::Put);
        assert_eq!(puts.len(), 2);
        assert_eq!(puts[1].path, PIPELINE_PATH);
    }
}
