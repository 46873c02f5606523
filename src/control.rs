//! Per-farm actuator state and its constrained mutations.
//!
//! Invariants after every successful call:
//! - `fan_on == (fan_frequency_hz > 0)`
//! - `0 <= fan_frequency_hz <= 50`, inputs outside are clamped
//! - the mutated actuator's `last_changed` entry is the mutation time
//!
//! Each farm's state sits behind its own lock, so calls for one farm are
//! serialized while different farms proceed independently. A call computes the
//! complete new state before storing it; callers never observe half a change.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::error::ControlError;
use crate::models::FarmId;

// ---

pub const MIN_FAN_HZ: f64 = 0.0;
pub const MAX_FAN_HZ: f64 = 50.0;

/// Frequency the fan starts at when switched on without an explicit value.
pub const DEFAULT_FAN_ON_HZ: f64 = 25.0;

const UPDATE_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Actuator {
    #[serde(rename = "fan")]
    Fan,
    #[serde(rename = "feeder")]
    Feeder,
    #[serde(rename = "cooling_pad_1")]
    CoolingPad1,
    #[serde(rename = "cooling_pad_2")]
    CoolingPad2,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ControlState {
    // ---
    pub fan_on: bool,
    pub fan_frequency_hz: f64,
    pub feeder_on: bool,
    pub cooling_pad1_on: bool,
    pub cooling_pad2_on: bool,
    pub last_changed: BTreeMap<Actuator, DateTime<Utc>>,
}

impl ControlState {
    // ---
    pub fn is_on(&self, actuator: Actuator) -> bool {
        match actuator {
            Actuator::Fan => self.fan_on,
            Actuator::Feeder => self.feeder_on,
            Actuator::CoolingPad1 => self.cooling_pad1_on,
            Actuator::CoolingPad2 => self.cooling_pad2_on,
        }
    }

    /// State after flipping `actuator`. Switching the fan on starts it at
    /// `fan_on_hz`; switching it off zeroes the frequency.
    fn toggled(&self, actuator: Actuator, fan_on_hz: f64, now: DateTime<Utc>) -> Self {
        // ---
        let mut next = self.clone();
        match actuator {
            Actuator::Fan => {
                next.fan_on = !self.fan_on;
                next.fan_frequency_hz = if next.fan_on { fan_on_hz } else { 0.0 };
            }
            Actuator::Feeder => next.feeder_on = !self.feeder_on,
            Actuator::CoolingPad1 => next.cooling_pad1_on = !self.cooling_pad1_on,
            Actuator::CoolingPad2 => next.cooling_pad2_on = !self.cooling_pad2_on,
        }
        next.last_changed.insert(actuator, now);
        next
    }

    fn with_fan_frequency(&self, requested_hz: f64, now: DateTime<Utc>) -> Self {
        // ---
        let hz = clamp_frequency(requested_hz);
        let mut next = self.clone();
        next.fan_frequency_hz = hz;
        next.fan_on = hz > 0.0;
        next.last_changed.insert(Actuator::Fan, now);
        next
    }
}

/// Clamp into `[0, 50]`. NaN counts as 0.
pub fn clamp_frequency(requested_hz: f64) -> f64 {
    if requested_hz.is_nan() {
        MIN_FAN_HZ
    } else {
        requested_hz.clamp(MIN_FAN_HZ, MAX_FAN_HZ)
    }
}

/// Published after every successful mutation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControlUpdate {
    pub farm_id: FarmId,
    pub actuator: Actuator,
    pub state: ControlState,
}

// ---

pub struct ControlStore {
    // ---
    clock: Arc<dyn Clock>,
    fan_on_hz: f64,
    farms: RwLock<HashMap<FarmId, Arc<Mutex<ControlState>>>>,
    updates: broadcast::Sender<ControlUpdate>,
}

impl ControlStore {
    // ---
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CAPACITY);
        Self {
            clock,
            fan_on_hz: DEFAULT_FAN_ON_HZ,
            farms: RwLock::new(HashMap::new()),
            updates,
        }
    }

    /// Override the frequency used when the fan is toggled on. Values that
    /// clamp to zero fall back to [`DEFAULT_FAN_ON_HZ`].
    pub fn with_fan_on_hz(mut self, hz: f64) -> Self {
        let hz = clamp_frequency(hz);
        self.fan_on_hz = if hz > 0.0 { hz } else { DEFAULT_FAN_ON_HZ };
        self
    }

    /// Create an all-off state for a farm. Returns `false` if it already exists.
    pub fn register(&self, farm_id: FarmId) -> bool {
        // ---
        let mut farms = self.farms.write().unwrap_or_else(|e| e.into_inner());
        if farms.contains_key(&farm_id) {
            return false;
        }
        farms.insert(farm_id, Arc::new(Mutex::new(ControlState::default())));
        debug!(farm_id, "control state created");
        true
    }

    /// Drop a farm's state. Returns `false` if it was not present.
    pub fn remove(&self, farm_id: FarmId) -> bool {
        let mut farms = self.farms.write().unwrap_or_else(|e| e.into_inner());
        farms.remove(&farm_id).is_some()
    }

    /// Make the store hold exactly `active`: new farms start all-off, farms no
    /// longer active are destroyed, existing state is kept untouched.
    pub fn sync_roster(&self, active: &[FarmId]) {
        // ---
        let mut farms = self.farms.write().unwrap_or_else(|e| e.into_inner());
        let before = farms.len();

        farms.retain(|id, _| active.contains(id));
        let removed = before - farms.len();

        let mut added = 0;
        for &id in active {
            farms.entry(id).or_insert_with(|| {
                added += 1;
                Arc::new(Mutex::new(ControlState::default()))
            });
        }

        info!(added, removed, total = farms.len(), "control roster synced");
    }

    pub fn farm_ids(&self) -> Vec<FarmId> {
        let farms = self.farms.read().unwrap_or_else(|e| e.into_inner());
        let mut ids: Vec<FarmId> = farms.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Read-only snapshot of a farm's state.
    pub fn get(&self, farm_id: FarmId) -> Result<ControlState, ControlError> {
        let slot = self.slot(farm_id)?;
        let state = slot.lock().unwrap_or_else(|e| e.into_inner());
        Ok(state.clone())
    }

    pub fn toggle(&self, farm_id: FarmId, actuator: Actuator) -> Result<ControlState, ControlError> {
        // ---
        let now = self.clock.now();
        let fan_on_hz = self.fan_on_hz;
        self.mutate(farm_id, actuator, |s| s.toggled(actuator, fan_on_hz, now))
    }

    pub fn set_fan_frequency(
        &self,
        farm_id: FarmId,
        requested_hz: f64,
    ) -> Result<ControlState, ControlError> {
        // ---
        let now = self.clock.now();
        self.mutate(farm_id, Actuator::Fan, |s| s.with_fan_frequency(requested_hz, now))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ControlUpdate> {
        self.updates.subscribe()
    }

    // ---

    fn slot(&self, farm_id: FarmId) -> Result<Arc<Mutex<ControlState>>, ControlError> {
        let farms = self.farms.read().unwrap_or_else(|e| e.into_inner());
        farms
            .get(&farm_id)
            .cloned()
            .ok_or(ControlError::UnknownFarm(farm_id))
    }

    fn mutate<F>(&self, farm_id: FarmId, actuator: Actuator, f: F) -> Result<ControlState, ControlError>
    where
        F: FnOnce(&ControlState) -> ControlState,
    {
        // ---
        let slot = self.slot(farm_id)?;
        let next = {
            let mut state = slot.lock().unwrap_or_else(|e| e.into_inner());
            let next = f(&state);
            *state = next.clone();
            next
        };

        debug!(
            farm_id,
            ?actuator,
            fan_on = next.fan_on,
            fan_hz = next.fan_frequency_hz,
            "control state changed"
        );

        // No receivers is not an error.
        let _ = self.updates.send(ControlUpdate {
            farm_id,
            actuator,
            state: next.clone(),
        });

        Ok(next)
    }
}
