//! 🎬 *[camera pans across a dimly lit server room]*
//! 🎬 "In a world where log lines pile up endlessly..."
//! 🎬 "One supervisor dared to flush them all."
//! 🎬 *[record scratch]* 🦆
//!
//! 📦 The Supervisor owns the flush worker's life: it spawns it, and when the
//! appender stops, it asks politely, waits a bounded amount of time, and then
//! stops asking politely.
//!
//! ⚠️ DO NOT MAKE THIS PUB EVER
//! 💀 WORKERS ARE SUPERVISORS PRIVATE LITTLE MINIONS WHOM THE WORLD FORGOT ABOUT

mod workers;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::engine::DeliveryEngine;
use workers::{FlushWorker, Worker};

/// 📦 Handle to one running flush worker.
#[derive(Debug)]
pub(crate) struct Supervisor {
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<Result<()>>,
}

impl Supervisor {
    /// 🚀 Spawn the flush worker. Must be called from inside a tokio runtime.
    pub(crate) fn start(engine: Arc<DeliveryEngine>, period: Duration) -> Self {
        let (shutdown, shutdown_rx) = oneshot::channel();
        let handle = FlushWorker::new(engine, period, shutdown_rx).start();
        Self { shutdown, handle }
    }

    /// 🛑 Ask the worker to do its final flush and exit. `true` when it made it within `timeout`.
    pub(crate) async fn shutdown(self, timeout: Duration) -> bool {
        let Self { shutdown, mut handle } = self;
        // -- an Err here means the worker already left, the join below tells us how
        let _ = shutdown.send(());

        match tokio::time::timeout(timeout, &mut handle).await {
            Ok(Ok(Ok(()))) => {
                debug!("🛑 flush worker stopped cleanly");
                true
            }
            Ok(Ok(Err(err))) => {
                warn!("💀 flush worker exited with an error: {:#}", err);
                true
            }
            Ok(Err(join_err)) => {
                warn!("💀 flush worker panicked or was cancelled: {}", join_err);
                false
            }
            Err(_) => {
                warn!(
                    "⏰ flush worker did not stop within {:?}, abandoning the final flush",
                    timeout
                );
                handle.abort();
                false
            }
        }
    }
}
