//! Background ingestion scheduler.
//!
//! Owns a periodic timer that drives one ingestion cycle per interval: for
//! every configured city, fetch current conditions and write them through the
//! observation store, isolating per-location failures. A manual trigger runs
//! the identical cycle on demand.
//!
//! Concurrency model:
//! - one long-lived worker task runs the periodic loop; `start` executes the
//!   first cycle before returning so data is available without waiting for
//!   the first tick
//! - a single-slot gate (`cycle_gate`) guarantees at most one cycle is
//!   executing at any instant, whether timer-driven or manual; a trigger that
//!   arrives mid-cycle waits for the in-flight cycle instead of overlapping it
//! - shutdown is an explicit `watch` signal, observed between locations, not
//!   a polled flag; `stop` waits (bounded by a grace period) for in-flight
//!   work before returning
//! - `RunState` lives behind an `RwLock` so the status route can read it
//!   concurrently with a running cycle

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use utoipa::ToSchema;

use crate::db::store::ObservationStore;
use crate::errors::AppError;
use crate::services::openweather::WeatherProvider;

/// How long `stop` waits for the worker and any in-flight cycle (seconds).
const STOP_GRACE_SECS: u64 = 5;

/// Scheduler lifecycle and last-cycle snapshot, exposed via the status
/// endpoint.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RunState {
    pub running: bool,
    /// Seconds between scheduled cycles; absent while stopped.
    pub interval_secs: Option<u64>,
    /// When the most recent cycle started.
    pub last_cycle_at: Option<DateTime<Utc>>,
    /// Locations successfully fetched and stored in the most recent cycle.
    pub last_cycle_succeeded: usize,
    /// Locations attempted in the most recent cycle.
    pub last_cycle_total: usize,
}

impl RunState {
    fn new() -> Self {
        Self {
            running: false,
            interval_secs: None,
            last_cycle_at: None,
            last_cycle_succeeded: 0,
            last_cycle_total: 0,
        }
    }
}

/// Result of one ingestion cycle.
#[derive(Debug, Clone, Copy)]
pub struct CycleOutcome {
    pub succeeded: usize,
    pub total: usize,
}

/// Cheaply cloneable handle; all clones share one scheduler.
#[derive(Clone)]
pub struct IngestionScheduler {
    inner: Arc<Inner>,
}

struct Inner {
    provider: Arc<dyn WeatherProvider>,
    store: Arc<dyn ObservationStore>,
    cities: Vec<String>,
    stop_grace: Duration,
    state: RwLock<RunState>,
    /// Single-slot gate enforcing the no-overlap invariant. Held only for
    /// the duration of a cycle; scheduler state access never blocks on it.
    cycle_gate: Mutex<()>,
    shutdown_tx: Mutex<Option<watch::Sender<bool>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl IngestionScheduler {
    pub fn new(
        provider: Arc<dyn WeatherProvider>,
        store: Arc<dyn ObservationStore>,
        cities: Vec<String>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                provider,
                store,
                cities,
                stop_grace: Duration::from_secs(STOP_GRACE_SECS),
                state: RwLock::new(RunState::new()),
                cycle_gate: Mutex::new(()),
                shutdown_tx: Mutex::new(None),
                worker: Mutex::new(None),
            }),
        }
    }

    /// Start periodic ingestion. Runs one cycle before returning, then ticks
    /// every `interval` on a background task. A no-op when already running.
    pub async fn start(&self, interval: Duration) {
        let (tx, rx) = watch::channel(false);
        {
            // The sender is installed under the same lock that flips
            // `running`, so a concurrent stop always finds the signal.
            let mut state = self.inner.state.write().await;
            if state.running {
                tracing::info!("ingestion scheduler already running, ignoring start");
                return;
            }
            state.running = true;
            state.interval_secs = Some(interval.as_secs());
            *self.inner.shutdown_tx.lock().await = Some(tx);
        }

        // First cycle runs synchronously so callers observe ingested data
        // (and a populated status) as soon as start returns.
        self.inner.run_cycle(Some(&rx)).await;

        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move { inner.run_loop(interval, rx).await });
        *self.inner.worker.lock().await = Some(handle);

        tracing::info!(
            interval_secs = interval.as_secs(),
            cities = self.inner.cities.len(),
            "ingestion scheduler started"
        );
    }

    /// Stop periodic ingestion. Cancels the timer and waits, bounded by a
    /// grace period, for the worker and any in-flight cycle to finish.
    /// A no-op when already stopped.
    pub async fn stop(&self) {
        {
            let mut state = self.inner.state.write().await;
            if !state.running {
                tracing::info!("ingestion scheduler already stopped, ignoring stop");
                return;
            }
            state.running = false;
            state.interval_secs = None;
        }

        if let Some(tx) = self.inner.shutdown_tx.lock().await.take() {
            // Receiver may already be gone if the worker died; nothing to do.
            let _ = tx.send(true);
        }

        let handle = self.inner.worker.lock().await.take();
        if let Some(handle) = handle {
            if tokio::time::timeout(self.inner.stop_grace, handle)
                .await
                .is_err()
            {
                tracing::warn!("ingestion worker did not exit within grace period");
            }
        }

        // A manual cycle may still hold the gate; wait for it, bounded.
        if tokio::time::timeout(self.inner.stop_grace, self.inner.cycle_gate.lock())
            .await
            .is_err()
        {
            tracing::warn!("in-flight ingestion cycle still running after grace period");
        }

        tracing::info!("ingestion scheduler stopped");
    }

    /// Run one cycle immediately, independent of whether the scheduler is
    /// running. Waits for any in-flight cycle rather than overlapping it.
    pub async fn manual_refresh(&self) -> CycleOutcome {
        tracing::info!("manual refresh triggered");
        self.inner.run_cycle(None).await
    }

    /// Snapshot of the current run state.
    pub async fn status(&self) -> RunState {
        self.inner.state.read().await.clone()
    }
}

impl Inner {
    async fn run_loop(self: Arc<Self>, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.run_cycle(Some(&shutdown)).await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::debug!("ingestion loop exited");
    }

    /// One ingestion cycle: attempt fetch + save for every configured city,
    /// skipping over per-location failures, then record the outcome.
    async fn run_cycle(&self, shutdown: Option<&watch::Receiver<bool>>) -> CycleOutcome {
        let _slot = self.cycle_gate.lock().await;

        let started = Utc::now();
        let total = self.cities.len();
        let mut succeeded = 0usize;

        for city in &self.cities {
            if shutdown.map(|rx| *rx.borrow()).unwrap_or(false) {
                tracing::info!("shutdown observed, abandoning remaining locations in this cycle");
                break;
            }
            match self.ingest_city(city).await {
                Ok(()) => succeeded += 1,
                Err(e) => tracing::warn!("ingestion failed for {}: {}", city, e),
            }
        }

        {
            let mut state = self.state.write().await;
            state.last_cycle_at = Some(started);
            state.last_cycle_succeeded = succeeded;
            state.last_cycle_total = total;
        }

        tracing::info!(succeeded, total, "ingestion cycle complete");
        CycleOutcome { succeeded, total }
    }

    async fn ingest_city(&self, city: &str) -> Result<(), AppError> {
        let observation = self.provider.fetch_current(city).await?;
        self.store.save(&observation).await?;
        tracing::debug!("stored observation for {}", city);
        Ok(())
    }
}
