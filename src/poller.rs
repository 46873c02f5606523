//! Polling orchestrator.
//!
//! A single timer starts cycles on a fixed cadence. A cycle fetches every
//! farm concurrently (capped by a semaphore, each fetch under its own
//! timeout), substitutes a sentinel for any farm that fails, then replaces the
//! whole snapshot at once and publishes it together with the alert summary.
//!
//! Timer ticks and manual refreshes share one re-entrancy guard, so at most
//! one cycle's fetch set is outstanding at any time. A cycle runs on its own
//! task: disabling auto-refresh, stopping the poller or dropping the caller
//! never cancels a cycle that has already started.
//!
//! The roster and the published update change together under one lock. A
//! cycle's results are projected onto the roster current at publish time, so
//! farms removed mid-cycle are not published again.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::alerts::{aggregate, AlertSummary};
use crate::clock::Clock;
use crate::error::FetchError;
use crate::models::{Farm, FarmReading, FarmSnapshot, SensorReading};
use crate::source::TelemetrySource;

// ---

#[derive(Debug, Clone)]
pub struct PollerConfig {
    // ---
    pub interval: Duration,
    pub fetch_timeout: Duration,
    pub max_concurrent_fetches: usize,
    pub auto_refresh: bool,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            fetch_timeout: Duration::from_secs(3),
            max_concurrent_fetches: 8,
            auto_refresh: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    Init,
    Running,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "cycle", rename_all = "snake_case")]
pub enum CycleOutcome {
    Completed(u64),
    /// Another cycle was still in flight; nothing was started.
    Busy,
    /// The cycle task was cancelled by runtime shutdown before publishing.
    Aborted,
}

/// What subscribers receive after each cycle or roster change.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct PollUpdate {
    pub snapshot: FarmSnapshot,
    pub alerts: AlertSummary,
}

// ---

/// Cheap to clone; all clones drive the same orchestrator.
#[derive(Clone)]
pub struct Poller {
    inner: Arc<Inner>,
}

struct Inner {
    // ---
    source: Arc<dyn TelemetrySource>,
    clock: Arc<dyn Clock>,
    config: PollerConfig,
    /// Held across every publish so roster changes and cycle results never
    /// interleave.
    roster: Mutex<Vec<Farm>>,
    cycle_guard: Arc<tokio::sync::Mutex<()>>,
    busy: AtomicBool,
    cycles: AtomicU64,
    fetch_permits: Semaphore,
    auto_refresh: watch::Sender<bool>,
    updates: watch::Sender<Arc<PollUpdate>>,
    lifecycle: Mutex<Lifecycle>,
    shutdown: CancellationToken,
}

impl Poller {
    // ---
    pub fn new(source: Arc<dyn TelemetrySource>, clock: Arc<dyn Clock>, config: PollerConfig) -> Self {
        // ---
        let (auto_refresh, _) = watch::channel(config.auto_refresh);
        let (updates, _) = watch::channel(Arc::new(PollUpdate::default()));
        let permits = config.max_concurrent_fetches.max(1);

        Self {
            inner: Arc::new(Inner {
                source,
                clock,
                roster: Mutex::new(Vec::new()),
                cycle_guard: Arc::new(tokio::sync::Mutex::new(())),
                busy: AtomicBool::new(false),
                cycles: AtomicU64::new(0),
                fetch_permits: Semaphore::new(permits),
                auto_refresh,
                updates,
                lifecycle: Mutex::new(Lifecycle::Init),
                shutdown: CancellationToken::new(),
                config,
            }),
        }
    }

    pub fn config(&self) -> &PollerConfig {
        &self.inner.config
    }

    pub fn roster(&self) -> Vec<Farm> {
        self.inner
            .roster
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Replace the set of farms polled from the next cycle on. The published
    /// snapshot is re-projected onto the new roster right away: removed farms
    /// disappear, new farms appear without a reading, and retained farms keep
    /// their reading from the last cycle.
    pub fn set_roster(&self, farms: Vec<Farm>) {
        // ---
        let mut roster = self.inner.roster.lock().unwrap_or_else(|e| e.into_inner());
        *roster = farms;

        let current = self.latest();
        self.publish(FarmSnapshot {
            cycle: current.snapshot.cycle,
            taken_at: current.snapshot.taken_at,
            farms: project(&roster, &current.snapshot.farms),
        });
    }

    /// Latest published snapshot and alerts.
    pub fn latest(&self) -> Arc<PollUpdate> {
        self.inner.updates.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<PollUpdate>> {
        self.inner.updates.subscribe()
    }

    /// True while a cycle's fetches are outstanding.
    pub fn is_busy(&self) -> bool {
        self.inner.busy.load(Ordering::SeqCst)
    }

    pub fn auto_refresh_enabled(&self) -> bool {
        *self.inner.auto_refresh.borrow()
    }

    pub fn set_auto_refresh(&self, enabled: bool) {
        let previous = self.inner.auto_refresh.send_replace(enabled);
        if previous != enabled {
            info!(enabled, "auto-refresh changed");
        }
    }

    pub fn lifecycle(&self) -> Lifecycle {
        *self.inner.lifecycle.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Run one cycle now unless one is already in flight.
    ///
    /// The cycle runs on a spawned task that owns the guard and the busy flag,
    /// so it completes and publishes even if this future is dropped.
    pub async fn refresh_now(&self) -> CycleOutcome {
        // ---
        let Ok(guard) = self.inner.cycle_guard.clone().try_lock_owned() else {
            debug!("refresh requested while a cycle is in flight");
            return CycleOutcome::Busy;
        };
        let busy = BusyFlag::raise(self.inner.clone());

        let poller = self.clone();
        let task = tokio::spawn(async move {
            let _guard = guard;
            let _busy = busy;
            poller.run_cycle().await
        });

        match task.await {
            Ok(cycle) => CycleOutcome::Completed(cycle),
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => {
                warn!("refresh cycle aborted: {}", e);
                CycleOutcome::Aborted
            }
        }
    }

    /// Start the timer loop. Returns `None` if the poller was already started
    /// or has been stopped.
    pub fn start(&self) -> Option<JoinHandle<()>> {
        // ---
        {
            let mut lifecycle = self.inner.lifecycle.lock().unwrap_or_else(|e| e.into_inner());
            if *lifecycle != Lifecycle::Init {
                warn!(state = ?*lifecycle, "poller start ignored");
                return None;
            }
            *lifecycle = Lifecycle::Running;
        }

        info!(
            interval_ms = self.inner.config.interval.as_millis() as u64,
            auto_refresh = self.auto_refresh_enabled(),
            "poller started"
        );
        Some(tokio::spawn(self.clone().run()))
    }

    /// Stop scheduling cycles. A cycle already running completes and publishes.
    pub fn stop(&self) {
        self.inner.shutdown.cancel();
        let mut lifecycle = self.inner.lifecycle.lock().unwrap_or_else(|e| e.into_inner());
        if *lifecycle == Lifecycle::Init {
            *lifecycle = Lifecycle::Stopped;
        }
    }

    // ---

    async fn run(self) {
        // ---
        let mut ticker = interval(self.inner.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut auto_refresh = self.inner.auto_refresh.subscribe();
        let shutdown = self.inner.shutdown.clone();

        loop {
            if !*auto_refresh.borrow_and_update() {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = auto_refresh.changed() => {
                        // Re-enabled: poll straight away rather than waiting a full period.
                        ticker.reset_immediately();
                        continue;
                    }
                }
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = auto_refresh.changed() => continue,
                _ = ticker.tick() => {}
            }

            // Outside the select so stopping never interrupts a running cycle.
            if self.refresh_now().await == CycleOutcome::Busy {
                debug!("tick skipped, previous cycle still running");
            }
        }

        *self.inner.lifecycle.lock().unwrap_or_else(|e| e.into_inner()) = Lifecycle::Stopped;
        info!("poller stopped");
    }

    async fn run_cycle(&self) -> u64 {
        // ---
        let farms = self.roster();
        let cycle = self.inner.cycles.fetch_add(1, Ordering::SeqCst) + 1;
        let span = info_span!("poll_cycle", cycle, farms = farms.len());

        async move {
            let readings = join_all(farms.iter().map(|farm| self.fetch_one(farm))).await;

            let failed = readings.iter().filter(|r| !r.is_available()).count();
            let polled: Vec<FarmReading> = farms
                .into_iter()
                .zip(readings)
                .map(|(farm, reading)| FarmReading {
                    farm,
                    reading: Some(reading),
                })
                .collect();

            let alerts = {
                let roster = self.inner.roster.lock().unwrap_or_else(|e| e.into_inner());
                self.publish(FarmSnapshot {
                    cycle,
                    taken_at: Some(self.inner.clock.now()),
                    farms: project(&roster, &polled),
                })
            };

            info!(
                failed,
                warnings = alerts.warnings.len(),
                criticals = alerts.criticals.len(),
                "cycle complete"
            );
            cycle
        }
        .instrument(span)
        .await
    }

    /// One farm's reading; never fails, a failed fetch becomes a sentinel.
    async fn fetch_one(&self, farm: &Farm) -> SensorReading {
        // ---
        // The semaphore is never closed, so acquire cannot fail.
        let _permit = self.inner.fetch_permits.acquire().await.ok();
        let limit = self.inner.config.fetch_timeout;

        let result = match timeout(limit, self.inner.source.fetch_reading(farm)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout {
                farm: farm.name.clone(),
                timeout_ms: limit.as_millis() as u64,
            }),
        };

        let now = self.inner.clock.now();
        match result {
            Ok(metrics) => {
                debug!(farm_id = farm.id, ?metrics, "reading fetched");
                SensorReading::live(metrics, now)
            }
            Err(e) => {
                warn!(farm_id = farm.id, farm = %farm.name, "fetch failed, using sentinel: {}", e);
                SensorReading::sentinel(now)
            }
        }
    }

    /// Callers hold the roster lock.
    fn publish(&self, snapshot: FarmSnapshot) -> AlertSummary {
        let alerts = aggregate(&snapshot.farms);
        self.inner.updates.send_replace(Arc::new(PollUpdate {
            snapshot,
            alerts: alerts.clone(),
        }));
        alerts
    }
}

/// Lay `readings` over `roster`: roster order and farm details win, farms
/// missing from `readings` get no reading, readings for other farms drop.
fn project(roster: &[Farm], readings: &[FarmReading]) -> Vec<FarmReading> {
    // ---
    roster
        .iter()
        .map(|farm| FarmReading {
            farm: farm.clone(),
            reading: readings
                .iter()
                .find(|e| e.farm.id == farm.id)
                .and_then(|e| e.reading.clone()),
        })
        .collect()
}

/// Raises the busy flag for as long as it lives.
struct BusyFlag(Arc<Inner>);

impl BusyFlag {
    fn raise(inner: Arc<Inner>) -> Self {
        inner.busy.store(true, Ordering::SeqCst);
        Self(inner)
    }
}

impl Drop for BusyFlag {
    fn drop(&mut self) {
        self.0.busy.store(false, Ordering::SeqCst);
    }
}
