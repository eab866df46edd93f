//! 🔌 ElasticsearchLayer: plug the appender into `tracing_subscriber` and every
//! `info!` in the app quietly becomes a document in the cluster.
//!
//! Events from the appender's own plumbing (this crate, the HTTP stack, the
//! runtime) are skipped. Otherwise shipping a batch would log that it's shipping
//! a batch, which would need shipping, which would log... 🐍🔁

use std::fmt;
use std::sync::Arc;

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

use crate::appender::Appender;
use crate::layout::{LogEvent, PatternLayout};

/// 🚫 Targets whose events never get shipped.
const IGNORED_TARGET_PREFIXES: &[&str] = &["esap", "reqwest", "hyper", "h2", "rustls", "tokio", "mio"];

fn is_ignored(target: &str) -> bool {
    IGNORED_TARGET_PREFIXES.iter().any(|prefix| {
        target
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
    })
}

/// 🔌 A `tracing` layer that appends every event to an [`Appender`].
#[derive(Debug, Clone)]
pub struct ElasticsearchLayer {
    appender: Arc<Appender<PatternLayout>>,
    min_level: Level,
}

impl ElasticsearchLayer {
    /// Ships everything, `TRACE` and up.
    pub fn new(appender: Arc<Appender<PatternLayout>>) -> Self {
        Self {
            appender,
            min_level: Level::TRACE,
        }
    }

    /// 🎚️ Only ship events at `level` or more severe.
    pub fn with_min_level(mut self, level: Level) -> Self {
        self.min_level = level;
        self
    }
}

impl<S> Layer<S> for ElasticsearchLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        // -- tracing orders levels by verbosity: TRACE > DEBUG > ... > ERROR
        if *meta.level() > self.min_level || is_ignored(meta.target()) {
            return;
        }

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let mut log_event = LogEvent::new(*meta.level(), meta.target(), visitor.message.unwrap_or_default());
        log_event.fields = visitor.fields;
        self.appender.append(&log_event);
    }
}

/// 🔍 Pulls `message` out on its own, renders everything else as strings.
#[derive(Debug, Default)]
struct FieldVisitor {
    message: Option<String>,
    fields: Vec<(String, String)>,
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.fields.push((field.name().to_string(), value.to_string()));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{value:?}"));
        } else {
            self.fields.push((field.name().to_string(), format!("{value:?}")));
        }
    }
}
