//! 💀 The one error type allowed to stop the show.
//!
//! Everything on the delivery path swallows its failures and moves on (a log line
//! that can't be shipped is not worth crashing the app that produced it).
//! Construction is the exception: bad config or a cluster that won't bootstrap
//! while `verify_connection` is on gets surfaced right here, loudly. 🦆

use thiserror::Error;

/// 💀 Fatal, construction-time failures of the appender.
///
/// Never produced by `append` or by a flush. Those swallow, count, and log.
#[derive(Debug, Error)]
pub enum AppenderError {
    /// 🔧 The configuration is missing something it can't live without.
    #[error("💀 invalid appender configuration: {0}")]
    Config(String),

    /// 📡 Bootstrap didn't finish and `verify_connection` demanded it should.
    /// Each flag says which sub-check passed, so the operator knows where to look.
    #[error(
        "💀 Elasticsearch appender failed to bootstrap: connected[{connected}] template[{template}] pipeline[{pipeline}]. Enable debug for verbose output."
    )]
    Bootstrap {
        connected: bool,
        template: bool,
        pipeline: bool,
    },

    /// 🧵 The plumbing under the appender (HTTP client, runtime) could not be built.
    #[error("💀 appender runtime failure: {0:#}")]
    Runtime(#[from] anyhow::Error),
}
