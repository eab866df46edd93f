// ai
//! 🎬 *[INT. LOGGING FRAMEWORK, NIGHT]*
//! *[an event walks in. a Layout turns it into bytes. the Appender takes the bytes.]*
//! *[nobody blocks. nobody panics. the event is never seen again, and that's fine.]*
//!
//! 📦 The Appender facade: what a logging framework actually holds on to.
//!
//! 🧠 Knowledge graph:
//! - Built through [`AppenderBuilder`]: validate → transport → bootstrap → maybe refuse to exist.
//! - Lifecycle: `Initialized` → `start()` → `Started` → `stop()` → `Stopping` → `Stopped`.
//! - `append` is non-blocking and infallible from the caller's side. Every failure
//!   goes to the [`ErrorHandler`], never back up the call stack.
//! - The flush worker is spawned on `start()` and drained on `stop()`.
//! - `stop()` waits for appends already past the state check, so a line that
//!   made it in always rides the final flush.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

use anyhow::anyhow;
use tracing::{error, info, warn};

use crate::app_config::AppenderConfig;
use crate::engine::{DeliveryEngine, FlushOutcome};
use crate::error::AppenderError;
use crate::schema::{BootstrapReport, SchemaResources};
use crate::stats::StatsSnapshot;
use crate::supervisors::Supervisor;
use crate::transport::{HttpTransport, TransportBackend};

/// 🎨 Turns a framework event into the bytes that get shipped.
pub trait Layout: Send + Sync {
    type Event: ?Sized + fmt::Debug;

    fn to_bytes(&self, event: &Self::Event) -> anyhow::Result<Vec<u8>>;
}

/// 🚨 Where append-path failures go instead of the caller's face.
pub trait ErrorHandler: Send + Sync + fmt::Debug {
    fn error(
        &self,
        appender: &str,
        message: &str,
        event: &dyn fmt::Debug,
        err: Option<&anyhow::Error>,
    );
}

/// 🚨 Default handler: an `error!` event. Our own target, so it never loops back into the cluster.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingErrorHandler;

impl ErrorHandler for TracingErrorHandler {
    fn error(
        &self,
        appender: &str,
        message: &str,
        event: &dyn fmt::Debug,
        err: Option<&anyhow::Error>,
    ) {
        match err {
            Some(err) => error!(appender = appender, "💀 {}: {:#} (event: {:?})", message, err, event),
            None => error!(appender = appender, "💀 {} (event: {:?})", message, event),
        }
    }
}

/// 🔄 Where an appender is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Initialized,
    Started,
    Stopping,
    Stopped,
}

impl LifecycleState {
    fn as_u8(self) -> u8 {
        match self {
            LifecycleState::Initialized => 0,
            LifecycleState::Started => 1,
            LifecycleState::Stopping => 2,
            LifecycleState::Stopped => 3,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => LifecycleState::Initialized,
            1 => LifecycleState::Started,
            2 => LifecycleState::Stopping,
            _ => LifecycleState::Stopped,
        }
    }
}

/// 🏗️ Collects the optional bits, then bootstraps on `build()`.
pub struct AppenderBuilder<L> {
    name: String,
    config: AppenderConfig,
    layout: L,
    transport: Option<TransportBackend>,
    resources: SchemaResources,
    error_handler: Arc<dyn ErrorHandler>,
}

impl<L: Layout> AppenderBuilder<L> {
    /// 🔌 Talk through this transport instead of a fresh HTTP client to `config.host`.
    pub fn transport(mut self, transport: impl Into<TransportBackend>) -> Self {
        self.transport = Some(transport.into());
        self
    }

    /// 📦 Install these template/pipeline definitions instead of the bundled ones.
    pub fn resources(mut self, resources: SchemaResources) -> Self {
        self.resources = resources;
        self
    }

    pub fn error_handler(mut self, handler: impl ErrorHandler + 'static) -> Self {
        self.error_handler = Arc::new(handler);
        self
    }

    /// 🚀 Validate, connect, bootstrap. Fails on bad config, or on an incomplete
    /// bootstrap when `verify_connection` is on.
    pub async fn build(self) -> Result<Appender<L>, AppenderError> {
        self.config.validate()?;

        let transport = match self.transport {
            Some(transport) => transport,
            None => HttpTransport::new(&self.config.host, self.config.request_timeout())?.into(),
        };
        let engine = DeliveryEngine::bootstrap(&self.config, transport, &self.resources).await?;

        Ok(Appender {
            name: self.name,
            layout: self.layout,
            engine: Arc::new(engine),
            error_handler: self.error_handler,
            state: AtomicU8::new(LifecycleState::Initialized.as_u8()),
            in_flight: AtomicUsize::new(0),
            supervisor: Mutex::new(None),
            refresh_interval: self.config.refresh_interval(),
        })
    }
}

/// 📦 The appender. Share it behind an `Arc`; every method takes `&self`.
pub struct Appender<L> {
    name: String,
    layout: L,
    engine: Arc<DeliveryEngine>,
    error_handler: Arc<dyn ErrorHandler>,
    state: AtomicU8,
    /// Appends between their state check and their `add`.
    in_flight: AtomicUsize,
    supervisor: Mutex<Option<Supervisor>>,
    refresh_interval: Duration,
}

/// 🚪 Counts one append in on creation, out on drop.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl<L> fmt::Debug for Appender<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Appender")
            .field("name", &self.name)
            .field("state", &self.state())
            .field("report", &self.engine.report())
            .field("buffered", &self.engine.buffered())
            .finish_non_exhaustive()
    }
}

impl<L: Layout> Appender<L> {
    pub fn builder(name: impl Into<String>, config: AppenderConfig, layout: L) -> AppenderBuilder<L> {
        AppenderBuilder {
            name: name.into(),
            config,
            layout,
            transport: None,
            resources: SchemaResources::default(),
            error_handler: Arc::new(TracingErrorHandler),
        }
    }

    /// 🚀 HTTP transport, bundled resources, tracing error handler.
    pub async fn new(
        name: impl Into<String>,
        config: AppenderConfig,
        layout: L,
    ) -> Result<Self, AppenderError> {
        Self::builder(name, config, layout).build().await
    }

    /// 🧵 Spawn the flush worker. Calling it again while started is a no-op.
    /// Needs a tokio runtime, and a stopped appender stays stopped.
    pub fn start(&self) -> Result<(), AppenderError> {
        let mut supervisor = self.lock_supervisor();
        match self.state() {
            LifecycleState::Started => return Ok(()),
            LifecycleState::Stopping | LifecycleState::Stopped => {
                return Err(AppenderError::Runtime(anyhow!(
                    "appender '{}' was stopped and cannot be restarted",
                    self.name
                )));
            }
            LifecycleState::Initialized => {}
        }
        tokio::runtime::Handle::try_current().map_err(|err| {
            AppenderError::Runtime(anyhow!("appender '{}' needs a tokio runtime to start: {}", self.name, err))
        })?;

        *supervisor = Some(Supervisor::start(Arc::clone(&self.engine), self.refresh_interval));
        self.set_state(LifecycleState::Started);
        info!("🚀 appender '{}' started, flushing every {:?}", self.name, self.refresh_interval);
        Ok(())
    }

    /// 📥 Format and buffer one event. Never blocks on the network, never fails outward.
    pub fn append(&self, event: &L::Event) {
        // -- counted before the state check: stop() flips the state first, then waits for zero
        let _in_flight = InFlight::enter(&self.in_flight);
        if self.state() != LifecycleState::Started {
            self.engine.stats().record_failed();
            self.error_handler.error(
                &self.name,
                "Attempted to append to an appender that is not started",
                &event,
                None,
            );
            return;
        }

        match panic::catch_unwind(AssertUnwindSafe(|| self.layout.to_bytes(event))) {
            Ok(Ok(bytes)) => {
                self.engine.add(&bytes);
            }
            Ok(Err(err)) => {
                self.engine.stats().record_failed();
                self.error_handler
                    .error(&self.name, "Unable to format event", &event, Some(&err));
            }
            Err(_) => {
                self.engine.stats().record_failed();
                self.error_handler
                    .error(&self.name, "Layout panicked while formatting event", &event, None);
            }
        }
    }

    /// 🚰 Flush right now, outside the schedule.
    pub async fn flush(&self) -> FlushOutcome {
        self.engine.flush().await
    }

    /// 🛑 Stop the schedule, flush what's left, all within `timeout`.
    /// `true` when shutdown completed in time.
    pub async fn stop(&self, timeout: Duration) -> bool {
        let supervisor = {
            let mut supervisor = self.lock_supervisor();
            if self.state() == LifecycleState::Stopped {
                return true;
            }
            self.set_state(LifecycleState::Stopping);
            supervisor.take()
        };

        let deadline = Instant::now() + timeout;
        if tokio::time::timeout_at(deadline, self.appends_settled()).await.is_err() {
            warn!(
                "⏳ appender '{}' stopping with {} append(s) still formatting",
                self.name,
                self.in_flight.load(Ordering::SeqCst)
            );
        }
        let remaining = deadline.saturating_duration_since(Instant::now());

        let completed = match supervisor {
            Some(supervisor) => supervisor.shutdown(remaining).await,
            None => tokio::time::timeout(remaining, self.engine.flush()).await.is_ok(),
        };

        self.set_state(LifecycleState::Stopped);
        info!("🛑 appender '{}' stopped (completed in time: {})", self.name, completed);
        completed
    }
}

impl<L> Appender<L> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> LifecycleState {
        LifecycleState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// ✅ Bootstrap fully succeeded.
    pub fn is_ready(&self) -> bool {
        self.engine.report().is_ready()
    }

    pub fn report(&self) -> BootstrapReport {
        self.engine.report()
    }

    pub fn major_version(&self) -> i32 {
        self.engine.report().major_version
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.engine.stats().snapshot()
    }

    pub fn buffered(&self) -> usize {
        self.engine.buffered()
    }

    fn set_state(&self, state: LifecycleState) {
        self.state.store(state.as_u8(), Ordering::SeqCst);
    }

    /// ⏳ Resolves once no append sits between its state check and the buffer.
    async fn appends_settled(&self) {
        while self.in_flight.load(Ordering::SeqCst) > 0 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    fn lock_supervisor(&self) -> MutexGuard<'_, Option<Supervisor>> {
        self.supervisor.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
