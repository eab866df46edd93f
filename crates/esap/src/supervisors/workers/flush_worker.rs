// ai
//! 🚽 The Flush Worker: one task, one timer, one job.
//!
//! 🎬 *[tick]* flush. *[tick]* flush. *[a producer screams "HIGH WATER"]* flush.
//! *[the supervisor says "we're closing"]* one last flush, lights off.
//!
//! 🧠 Knowledge graph:
//! - First periodic tick lands one full period after start, not immediately.
//! - Flushes never overlap: the engine's flush guard makes a manual flush wait for this one.
//! - "Flush now" rings are a `Notify` permit. Ten rings while a flush is in
//!   flight collapse into one extra flush. Not ten. One. 🦆
//! - Shutdown wins ties (`biased`), then a final flush drains whatever's left.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, trace};

use super::Worker;
use crate::engine::{DeliveryEngine, FlushOutcome};

#[derive(Debug)]
pub(crate) struct FlushWorker {
    engine: Arc<DeliveryEngine>,
    period: Duration,
    shutdown: oneshot::Receiver<()>,
}

impl FlushWorker {
    pub(crate) fn new(
        engine: Arc<DeliveryEngine>,
        period: Duration,
        shutdown: oneshot::Receiver<()>,
    ) -> Self {
        Self {
            engine,
            period,
            shutdown,
        }
    }
}

impl Worker for FlushWorker {
    fn start(mut self) -> JoinHandle<Result<()>> {
        tokio::spawn(async move {
            debug!("🚀 flush worker up, flushing every {:?}", self.period);
            let mut ticker = interval_at(Instant::now() + self.period, self.period);
            // -- 🐢 a slow flush pushes the next tick back instead of firing a burst to catch up
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = &mut self.shutdown => break,
                    _ = ticker.tick() => {
                        trace!("⏰ periodic flush");
                        self.engine.flush().await;
                    }
                    _ = self.engine.flush_requested() => {
                        trace!("🔔 high-water flush");
                        self.engine.flush().await;
                    }
                }
            }

            match self.engine.flush().await {
                FlushOutcome::Empty => debug!("🛑 flush worker done, nothing left behind"),
                outcome => debug!("🛑 flush worker done, final flush: {:?}", outcome),
            }
            Ok(())
        })
    }
}
