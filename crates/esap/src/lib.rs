//! 🚀 esap: an Elasticsearch appender. Log lines go in, `_bulk` requests come out.
//!
//! 🧠 Knowledge graph:
//! - [`appender`]: the facade a logging framework holds (`start` / `append` / `stop`)
//! - [`engine`]: buffer + bulk builder + client, bootstrapped once
//! - [`schema`]: version detection, template and pipeline install
//! - [`layer`] + [`layout`]: the `tracing` front-end and its line format
//! - [`transport`]: reqwest for real, a fake cluster for tests
//!
//! ⚠️ `supervisors` stays private. The flush worker belongs to the appender and nobody else.

pub mod app_config;
pub mod appender;
pub mod buffer;
pub mod bulk;
pub mod client;
pub mod engine;
pub mod error;
pub mod layer;
pub mod layout;
pub mod schema;
pub mod stats;
mod supervisors;
pub mod transport;

pub use app_config::{AppenderConfig, load_config};
pub use appender::{Appender, AppenderBuilder, ErrorHandler, Layout, LifecycleState, TracingErrorHandler};
pub use bulk::RolloverPolicy;
pub use engine::FlushOutcome;
pub use error::AppenderError;
pub use layer::ElasticsearchLayer;
pub use layout::{LogEvent, PatternLayout};
pub use stats::StatsSnapshot;
