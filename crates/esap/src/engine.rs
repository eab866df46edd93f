// ai
//! 🚚 The Delivery Engine: buffer in, `_bulk` out.
//!
//! 🎬 *[a log line arrives. it is formatted, wrapped, and dropped in a bucket.]*
//! *[five seconds pass. the bucket is tipped into one HTTP POST.]*
//! *[the cluster says 200, or it doesn't. either way, the bucket is emptied.]*
//!
//! 🧠 Knowledge graph:
//! - Built by [`DeliveryEngine::bootstrap`]: version detection + template/pipeline ensure,
//!   inline, exactly once. The report is frozen for the life of the engine.
//! - `add` runs on producer threads: encode, offer, maybe ring the "flush now" bell.
//! - `flush` mostly runs on the flush worker: snapshot, build, POST, discard. At most once.
//!   A failed batch is not retried and not re-queued.
//! - One flush at a time. `flush_guard` covers snapshot → POST → discard, so a manual
//!   flush racing the worker waits its turn instead of re-sending the same snapshot.
//! - The "flush now" bell is a `Notify`: ring it a thousand times, the worker wakes once. 🦆

use chrono::{Local, NaiveDate};
use tokio::sync::{Mutex, Notify};
use tracing::{debug, info, trace, warn};

use crate::app_config::AppenderConfig;
use crate::buffer::{BatchBuffer, Offer, encode_record};
use crate::bulk::{BulkRequestBuilder, INDEX_BASE, RolloverPolicy};
use crate::client::RemoteClient;
use crate::error::AppenderError;
use crate::schema::{BootstrapReport, SchemaBootstrapper, SchemaResources};
use crate::stats::AppenderStats;
use crate::transport::TransportBackend;

/// 📬 What happened to one formatted event on its way into the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Queued,
    /// 🗑️ Buffer full, record dropped.
    Dropped,
    /// 💀 Couldn't be encoded as JSON, record dropped.
    Unencodable,
}

/// 📬 What one flush did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing buffered, nothing sent.
    Empty,
    /// The cluster accepted a batch of this many records.
    Delivered(usize),
    /// A batch of this many records was sent and lost.
    Failed(usize),
}

/// 🚚 Owns the client, the buffer, and the frozen bootstrap report.
#[derive(Debug)]
pub struct DeliveryEngine {
    client: RemoteClient,
    buffer: BatchBuffer,
    bulk: BulkRequestBuilder,
    bulk_path: String,
    rollover: RolloverPolicy,
    high_water: usize,
    flush_now: Notify,
    flush_guard: Mutex<()>,
    stats: AppenderStats,
    report: BootstrapReport,
    debug: bool,
}

impl DeliveryEngine {
    /// 🏗️ Validate, bootstrap the cluster, decide whether we're allowed to live.
    ///
    /// Not ready + `verify_connection` → [`AppenderError::Bootstrap`].
    /// Not ready without it → a warning and a degraded engine that keeps trying to send.
    pub async fn bootstrap(
        config: &AppenderConfig,
        transport: TransportBackend,
        resources: &SchemaResources,
    ) -> Result<Self, AppenderError> {
        config.validate()?;

        let client = RemoteClient::new(transport, &config.username, &config.password, config.debug);
        let report = SchemaBootstrapper::new(&client, resources, config.debug)
            .run()
            .await;

        if report.is_ready() {
            info!(
                "✅ Elasticsearch appender bootstrapped against {} (major version {})",
                config.host, report.major_version
            );
        } else {
            warn!(
                "💀 Elasticsearch appender bootstrap incomplete: connected[{}] template[{}] pipeline[{}]. Enable debug to view verbose output.",
                report.connected(),
                report.template_ready,
                report.pipeline_ready
            );
            if config.verify_connection {
                return Err(AppenderError::Bootstrap {
                    connected: report.connected(),
                    template: report.template_ready,
                    pipeline: report.pipeline_ready,
                });
            }
        }

        Ok(Self {
            client,
            buffer: BatchBuffer::new(config.buffer_capacity),
            bulk: BulkRequestBuilder::new(report.major_version),
            bulk_path: format!("/_bulk?pipeline={}", config.pipeline),
            rollover: config.rollover_policy,
            high_water: config.effective_high_water(),
            flush_now: Notify::new(),
            flush_guard: Mutex::new(()),
            stats: AppenderStats::default(),
            report,
            debug: config.debug,
        })
    }

    /// 📥 Producer side. Encode, offer, maybe ask for an early flush. Never waits on I/O.
    pub fn add(&self, formatted: &[u8]) -> AddOutcome {
        let text = String::from_utf8_lossy(formatted);
        let record = match encode_record(&text) {
            Ok(record) => record,
            Err(err) => {
                self.stats.record_failed();
                if self.debug {
                    debug!("💀 dropping a record that refused to become JSON: {}", err);
                }
                return AddOutcome::Unencodable;
            }
        };

        match self.buffer.offer(record) {
            Offer::Accepted { len } => {
                self.stats.record_accepted();
                if len >= self.high_water {
                    // -- 🔔 ring the bell. the worker collapses repeat rings into one wakeup.
                    self.flush_now.notify_one();
                }
                AddOutcome::Queued
            }
            Offer::Full => {
                self.stats.record_dropped();
                AddOutcome::Dropped
            }
        }
    }

    /// 🚰 Flush against today's index.
    pub async fn flush(&self) -> FlushOutcome {
        self.flush_for(Local::now().date_naive()).await
    }

    /// 🚰 Flush against the index for `date`. Snapshot, one POST, then discard the snapshot.
    /// Concurrent callers queue up behind each other.
    pub async fn flush_for(&self, date: NaiveDate) -> FlushOutcome {
        let _flushing = self.flush_guard.lock().await;
        let records = self.buffer.snapshot();
        if records.is_empty() {
            return FlushOutcome::Empty;
        }

        let index = self.rollover.index_name(INDEX_BASE, date);
        let payload = self.bulk.build(&index, &records);
        trace!("📡 flushing {} records ({} bytes) into {}", records.len(), payload.len(), index);

        let delivered = self.client.post(&self.bulk_path, payload).await;
        // -- 🗑️ at-most-once: gone whether the cluster liked it or not
        self.buffer.discard_front(records.len());
        self.stats.record_batch(records.len(), delivered);

        if delivered {
            FlushOutcome::Delivered(records.len())
        } else {
            if self.debug {
                debug!("💀 bulk request with {} records was lost", records.len());
            }
            FlushOutcome::Failed(records.len())
        }
    }

    /// 🔔 Resolves when a producer crossed the high-water mark.
    pub(crate) async fn flush_requested(&self) {
        self.flush_now.notified().await;
    }

    pub fn report(&self) -> BootstrapReport {
        self.report
    }

    pub fn stats(&self) -> &AppenderStats {
        &self.stats
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }
}
