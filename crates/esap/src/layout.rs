//! 🎨 PatternLayout: turns a [`LogEvent`] into the one line shape the ingest pipeline can grok.
//!
//! ```text
//! [2024-03-07T13:45:09.042+0800][web-01][INFO ][a::b::gamma              ] hello
//! ```
//!
//! Timestamp, hostname, level padded to 5, abbreviated target padded to 25, message.
//! Change this shape and the grok pattern stops matching. The pipeline has
//! `ignore_failure` on, so nothing breaks loudly. Your dashboards just go quiet. 🦆

use chrono::{DateTime, FixedOffset, Local};
use tracing::{Level, warn};

use crate::appender::Layout;

/// 🏷️ What the hostname column says when we truly cannot tell.
pub const UNKNOWN_HOST: &str = "unknown_ip";

/// 📝 One log event, framework-agnostic.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEvent {
    pub timestamp: DateTime<FixedOffset>,
    pub level: Level,
    pub target: String,
    pub message: String,
    /// Extra structured fields, rendered as ` key=value` after the message.
    pub fields: Vec<(String, String)>,
}

impl LogEvent {
    /// 🕰️ Stamped with the local wall clock, right now.
    pub fn new(level: Level, target: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now().fixed_offset(),
            level,
            target: target.into(),
            message: message.into(),
            fields: Vec::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((key.into(), value.into()));
        self
    }
}

/// ✂️ `alpha::beta::gamma` → `a::b::gamma`. The last segment always survives intact.
pub fn abbreviate_target(target: &str) -> String {
    let mut segments: Vec<&str> = target.split("::").collect();
    let last = segments.pop().unwrap_or_default();
    let mut abbreviated = String::with_capacity(target.len());
    for segment in segments {
        if let Some(first) = segment.chars().next() {
            abbreviated.push(first);
        }
        abbreviated.push_str("::");
    }
    abbreviated.push_str(last);
    abbreviated
}

/// 🏠 `HOSTNAME` if exported, else whatever the OS calls this machine, else [`UNKNOWN_HOST`].
pub fn resolve_hostname() -> String {
    pick_hostname(std::env::var("HOSTNAME").ok(), system_hostname())
}

fn pick_hostname(from_env: Option<String>, from_os: Option<String>) -> String {
    [from_env, from_os]
        .into_iter()
        .flatten()
        .map(|name| name.trim().to_string())
        .find(|name| !name.is_empty())
        .unwrap_or_else(|| UNKNOWN_HOST.to_string())
}

#[cfg(unix)]
fn system_hostname() -> Option<String> {
    match nix::unistd::gethostname() {
        Ok(name) => name.into_string().ok(),
        Err(err) => {
            warn!("💀 gethostname failed: {}", err);
            None
        }
    }
}

#[cfg(not(unix))]
fn system_hostname() -> Option<String> {
    std::env::var("COMPUTERNAME").ok()
}

/// 🎨 The default layout. Hostname is resolved once, at construction.
#[derive(Debug, Clone)]
pub struct PatternLayout {
    hostname: String,
}

impl Default for PatternLayout {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternLayout {
    pub fn new() -> Self {
        Self::with_hostname(resolve_hostname())
    }

    pub fn with_hostname(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
        }
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// 🖨️ One event, one line, trailing newline included.
    pub fn format(&self, event: &LogEvent) -> String {
        let mut line = format!(
            "[{}][{}][{:<5}][{:<25}] {}",
            event.timestamp.format("%Y-%m-%dT%H:%M:%S%.3f%z"),
            self.hostname,
            event.level.as_str(),
            abbreviate_target(&event.target),
            event.message,
        );
        for (key, value) in &event.fields {
            line.push_str(&format!(" {key}={value}"));
        }
        line.push('\n');
        line
    }
}

impl Layout for PatternLayout {
    type Event = LogEvent;

    fn to_bytes(&self, event: &LogEvent) -> anyhow::Result<Vec<u8>> {
        Ok(self.format(event).into_bytes())
    }
}
