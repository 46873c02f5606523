//! Facade the presentation layer talks to.
//!
//! Owns the poller and the control store side by side. The two never share
//! state: polling replaces readings, only explicit user calls change controls.

use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::info;

use crate::alerts::{overview, AlertSummary, SystemOverview};
use crate::clock::Clock;
use crate::control::{Actuator, ControlState, ControlStore, ControlUpdate};
use crate::error::{ControlError, FetchError};
use crate::models::{Farm, FarmId};
use crate::poller::{CycleOutcome, Lifecycle, PollUpdate, Poller, PollerConfig};
use crate::source::{CompanyContext, TelemetrySource};

// ---

#[derive(Debug, Clone, Default)]
pub struct MonitorSettings {
    pub poller: PollerConfig,
    /// Frequency the fan starts at when toggled on; `None` keeps the default.
    pub fan_on_hz: Option<f64>,
}

#[derive(Clone)]
pub struct Monitor {
    // ---
    source: Arc<dyn TelemetrySource>,
    company: CompanyContext,
    poller: Poller,
    controls: Arc<ControlStore>,
}

impl Monitor {
    // ---
    pub fn new(
        source: Arc<dyn TelemetrySource>,
        clock: Arc<dyn Clock>,
        company: CompanyContext,
        settings: MonitorSettings,
    ) -> Self {
        // ---
        let mut controls = ControlStore::new(clock.clone());
        if let Some(hz) = settings.fan_on_hz {
            controls = controls.with_fan_on_hz(hz);
        }

        Self {
            poller: Poller::new(source.clone(), clock, settings.poller),
            controls: Arc::new(controls),
            source,
            company,
        }
    }

    /// Fetch the company's farms and make them the active set.
    pub async fn reload_roster(&self) -> Result<usize, FetchError> {
        // ---
        let farms = self.source.fetch_farm_list(&self.company).await?;
        let count = farms.len();
        self.seed_roster(farms);
        Ok(count)
    }

    /// Make `farms` the active set for both polling and control.
    pub fn seed_roster(&self, farms: Vec<Farm>) {
        // ---
        let ids: Vec<FarmId> = farms.iter().map(|f| f.id).collect();
        self.controls.sync_roster(&ids);
        self.poller.set_roster(farms);
        info!(farms = ids.len(), "roster applied");
    }

    pub fn start(&self) -> Option<JoinHandle<()>> {
        self.poller.start()
    }

    pub fn stop(&self) {
        self.poller.stop();
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.poller.lifecycle()
    }

    pub async fn refresh_now(&self) -> CycleOutcome {
        self.poller.refresh_now().await
    }

    pub fn is_refreshing(&self) -> bool {
        self.poller.is_busy()
    }

    pub fn auto_refresh_enabled(&self) -> bool {
        self.poller.auto_refresh_enabled()
    }

    pub fn set_auto_refresh(&self, enabled: bool) {
        self.poller.set_auto_refresh(enabled);
    }

    // --- readings

    /// Every publish carries the farm snapshot and its alerts together.
    pub fn subscribe(&self) -> watch::Receiver<Arc<PollUpdate>> {
        self.poller.subscribe()
    }

    pub fn latest(&self) -> Arc<PollUpdate> {
        self.poller.latest()
    }

    pub fn alerts(&self) -> AlertSummary {
        self.poller.latest().alerts.clone()
    }

    pub fn overview(&self) -> SystemOverview {
        overview(&self.poller.latest().snapshot.farms)
    }

    // --- controls

    pub fn control_state(&self, farm_id: FarmId) -> Result<ControlState, ControlError> {
        self.controls.get(farm_id)
    }

    pub fn toggle(&self, farm_id: FarmId, actuator: Actuator) -> Result<ControlState, ControlError> {
        self.controls.toggle(farm_id, actuator)
    }

    pub fn set_fan_frequency(&self, farm_id: FarmId, hz: f64) -> Result<ControlState, ControlError> {
        self.controls.set_fan_frequency(farm_id, hz)
    }

    pub fn subscribe_controls(&self) -> broadcast::Receiver<ControlUpdate> {
        self.controls.subscribe()
    }
}
