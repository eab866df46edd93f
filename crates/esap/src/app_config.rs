//! 🔧 App Configuration: the sacred TOML-to-struct pipeline.
//!
//! 📡 "Config not found: We looked everywhere. Under the couch. Behind the fridge.
//! In the junk drawer. Nothing." -- every developer at 3am 🦆
//!
//! 🏗️ Powered by Figment, because manually parsing env vars is a form of
//! self-harm that even the borrow checker wouldn't approve of.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::Deserialize;
use tracing::info;

use crate::bulk::RolloverPolicy;
use crate::error::AppenderError;

/// 📡 The managed cluster we talk to when nobody says otherwise.
pub const DEFAULT_HOST: &str = "https://router.nasuyun.com:9200";
/// 🔧 Pipeline the `_bulk?pipeline=` query points at. Bootstrap always installs `log4j`.
pub const DEFAULT_PIPELINE: &str = "log4j";
const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// 📦 Everything one appender needs to know about its destination.
///
/// `username` and `password` have no defaults. Everything else does.
/// Defaults are applied at deserialization time, [`AppenderConfig::validate`]
/// checks the required bits eagerly.
#[derive(Deserialize, Clone)]
#[serde(default)]
pub struct AppenderConfig {
    /// 📡 Base URL of the cluster, scheme and port included.
    pub host: String,
    /// 🔒 Basic-auth username. Required.
    pub username: String,
    /// 🔒 Basic-auth password. Required. "password123" is not a password. It is a confession.
    pub password: String,
    /// ⏳ Per-request timeout. Non-positive means "use 30".
    pub connect_timeout_seconds: i64,
    /// 🔄 Seconds between periodic flushes.
    pub refresh_seconds: u64,
    /// 🔧 Ingest pipeline name.
    pub pipeline: String,
    /// 📅 How often the target index rolls over.
    pub rollover_policy: RolloverPolicy,
    /// 🐛 Gates verbose logging of delivery failures.
    pub debug: bool,
    /// 🔒 Fail construction when bootstrap can't complete.
    pub verify_connection: bool,
    /// 📦 Max records held in memory before new ones get dropped.
    pub buffer_capacity: usize,
    /// 🚰 Buffer length that triggers an out-of-band flush.
    pub flush_high_water: usize,
}

impl Default for AppenderConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            username: String::new(),
            password: String::new(),
            connect_timeout_seconds: DEFAULT_TIMEOUT_SECONDS as i64,
            refresh_seconds: 5,
            pipeline: DEFAULT_PIPELINE.to_string(),
            rollover_policy: RolloverPolicy::Day,
            debug: false,
            verify_connection: true,
            buffer_capacity: 2000,
            flush_high_water: 1000,
        }
    }
}

// 🔒 Hand-rolled so the password never lands in a log line. Ask me how I know.
impl fmt::Debug for AppenderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppenderConfig")
            .field("host", &self.host)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("connect_timeout_seconds", &self.connect_timeout_seconds)
            .field("refresh_seconds", &self.refresh_seconds)
            .field("pipeline", &self.pipeline)
            .field("rollover_policy", &self.rollover_policy)
            .field("debug", &self.debug)
            .field("verify_connection", &self.verify_connection)
            .field("buffer_capacity", &self.buffer_capacity)
            .field("flush_high_water", &self.flush_high_water)
            .finish()
    }
}

impl AppenderConfig {
    /// 🚀 Defaults plus the two things we refuse to guess.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            ..Self::default()
        }
    }

    /// ✅ Eager validation. Run before anything touches the network.
    pub fn validate(&self) -> Result<(), AppenderError> {
        if self.username.is_empty() {
            return Err(AppenderError::Config(
                "No username provided for Elasticsearch Appender".to_string(),
            ));
        }
        if self.password.is_empty() {
            return Err(AppenderError::Config(
                "No password provided for Elasticsearch Appender".to_string(),
            ));
        }
        if self.host.trim().is_empty() {
            return Err(AppenderError::Config("host must not be empty".to_string()));
        }
        if self.pipeline.trim().is_empty() {
            return Err(AppenderError::Config(
                "pipeline must not be empty".to_string(),
            ));
        }
        if self.buffer_capacity == 0 {
            return Err(AppenderError::Config(
                "buffer_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// ⏳ The timeout actually applied to every request. Zero or negative means 30s.
    pub fn request_timeout(&self) -> Duration {
        match u64::try_from(self.connect_timeout_seconds) {
            Ok(secs) if secs > 0 => Duration::from_secs(secs),
            _ => Duration::from_secs(DEFAULT_TIMEOUT_SECONDS),
        }
    }

    /// 🔄 Flush period, floored at one second. A zero-second timer is a busy loop with extra steps.
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_seconds.max(1))
    }

    /// 🚰 High-water mark, never above capacity (a mark the buffer can't reach is no mark at all).
    pub fn effective_high_water(&self) -> usize {
        self.flush_high_water.clamp(1, self.buffer_capacity.max(1))
    }
}

/// 🚀 Load the config from `ESAP_*` env vars and an optional TOML file.
///
/// 📐 If `config_file_name` is None, env vars only. If Some, env + TOML merged, TOML wins.
/// The result is validated before it's handed back.
pub fn load_config(config_file_name: Option<&Path>) -> anyhow::Result<AppenderConfig> {
    info!(
        "🔧 Loading configuration: {:#?}",
        config_file_name.unwrap_or(Path::new(""))
    );

    let config = Figment::new().merge(Env::prefixed("ESAP_"));
    let config = match config_file_name {
        Some(file_name) => config.merge(Toml::file(file_name)),
        None => config,
    };

    let context_msg = match config_file_name {
        Some(path) => format!(
            "💀 Failed to parse configuration from file '{}' and environment variables (ESAP_*).",
            path.display()
        ),
        None => "💀 Failed to parse configuration from environment variables (ESAP_*). \
                 No file was provided, this one's all on the environment."
            .to_string(),
    };

    let app_config: AppenderConfig = config.extract().context(context_msg)?;
    app_config
        .validate()
        .context("💀 Configuration parsed, but it isn't usable")?;
    Ok(app_config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_test_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .expect("💀 Failed to create temp config. The filesystem said 'new phone who dis'.");
        file.write_all(contents.as_bytes())
            .expect("💀 Failed to write temp config.");
        file
    }

    #[test]
    fn the_one_where_only_credentials_are_given_and_defaults_fill_the_rest() {
        let file = write_test_config(
            r#"
            username = "elastic"
            password = "changeme"
            "#,
        );

        let config = load_config(Some(file.path())).expect("💀 minimal config should load");

        assert_eq!(config.host, DEFAULT_HOST);
        assert_eq!(config.connect_timeout_seconds, 30);
        assert_eq!(config.refresh_seconds, 5);
        assert_eq!(config.pipeline, "log4j");
        assert_eq!(config.rollover_policy, RolloverPolicy::Day);
        assert!(!config.debug);
        assert!(config.verify_connection);
        assert_eq!(config.buffer_capacity, 2000);
        assert_eq!(config.flush_high_water, 1000);
    }

    #[test]
    fn the_one_where_every_knob_gets_turned() {
        let file = write_test_config(
            r#"
            host = "http://localhost:9200"
            username = "elastic"
            password = "changeme"
            connect_timeout_seconds = 10
            refresh_seconds = 2
            pipeline = "custom"
            rollover_policy = "MONTH"
            debug = true
            verify_connection = false
            buffer_capacity = 50
            flush_high_water = 20
            "#,
        );

        let config = load_config(Some(file.path())).expect("💀 full config should load");

        assert_eq!(config.host, "http://localhost:9200");
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.refresh_interval(), Duration::from_secs(2));
        assert_eq!(config.pipeline, "custom");
        assert_eq!(config.rollover_policy, RolloverPolicy::Month);
        assert!(config.debug);
        assert!(!config.verify_connection);
        assert_eq!(config.effective_high_water(), 20);
    }

    #[test]
    fn the_one_where_the_username_went_missing() {
        let file = write_test_config(r#"password = "changeme""#);

        let err = load_config(Some(file.path())).expect_err("💀 missing username must fail");
        let rendered = format!("{err:#}");
        assert!(
            rendered.contains("No username provided"),
            "unexpected error: {rendered}"
        );
    }

    #[test]
    fn the_one_where_a_weird_rollover_policy_means_no_rollover() {
        let file = write_test_config(
            r#"
            username = "elastic"
            password = "changeme"
            rollover_policy = "fortnight"
            "#,
        );

        let config = load_config(Some(file.path())).expect("💀 unknown policy is not an error");
        assert_eq!(config.rollover_policy, RolloverPolicy::None);
    }

    #[test]
    fn the_one_where_non_positive_timeouts_fall_back_to_thirty() {
        let mut config = AppenderConfig::new("u", "p");
        config.connect_timeout_seconds = 0;
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        config.connect_timeout_seconds = -7;
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn the_one_where_the_password_stays_out_of_the_logs() {
        let config = AppenderConfig::new("elastic", "hunter2");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn the_one_where_high_water_cannot_outgrow_the_bucket() {
        let mut config = AppenderConfig::new("u", "p");
        config.buffer_capacity = 10;
        config.flush_high_water = 1000;
        assert_eq!(config.effective_high_water(), 10);
    }
}
