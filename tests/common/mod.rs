//! Shared fakes for the integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use farmwatch::{CompanyContext, Farm, FarmId, FetchError, Metrics, TelemetrySource};

#[derive(Debug, Clone, Copy)]
pub enum Behavior {
    Reading(Metrics),
    Fail,
    Hang,
}

/// In-process telemetry source with per-farm scripted behavior.
pub struct FakeSource {
    roster: Mutex<Vec<Farm>>,
    behavior: Mutex<HashMap<FarmId, Behavior>>,
    delay: Duration,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub calls: AtomicUsize,
}

impl FakeSource {
    pub fn new(delay: Duration) -> Self {
        Self {
            roster: Mutex::new(Vec::new()),
            behavior: Mutex::new(HashMap::new()),
            delay,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_farm(self, farm: Farm, behavior: Behavior) -> Self {
        self.set(farm.id, behavior);
        self.roster.lock().unwrap().push(farm);
        self
    }

    pub fn set(&self, id: FarmId, behavior: Behavior) {
        self.behavior.lock().unwrap().insert(id, behavior);
    }

    pub fn set_roster(&self, farms: Vec<Farm>) {
        *self.roster.lock().unwrap() = farms;
    }

    pub fn farms(&self) -> Vec<Farm> {
        self.roster.lock().unwrap().clone()
    }
}

pub fn metrics(temperature: f64, humidity: f64, ammonia: f64) -> Metrics {
    Metrics {
        temperature,
        humidity,
        ammonia,
    }
}

#[async_trait]
impl TelemetrySource for FakeSource {
    async fn fetch_reading(&self, farm: &Farm) -> Result<Metrics, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let behavior = self.behavior.lock().unwrap().get(&farm.id).copied();
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let result = match behavior {
            Some(Behavior::Reading(m)) => Ok(m),
            Some(Behavior::Hang) => std::future::pending().await,
            Some(Behavior::Fail) | None => Err(FetchError::Status {
                url: format!("fake://{}", farm.sensor_key()),
                status: 503,
            }),
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn fetch_farm_list(&self, _company: &CompanyContext) -> Result<Vec<Farm>, FetchError> {
        Ok(self.farms())
    }
}
