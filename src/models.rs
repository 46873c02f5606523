//! Data models for farms, their sensor readings and the published snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::FetchError;
use crate::ranges::Metric;

// ---

pub type FarmId = i64;

/// A monitored enclosure as returned by the company farm list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Farm {
    // ---
    pub id: FarmId,
    pub name: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub fan_count: u32,
    #[serde(default)]
    pub company_id: Option<i64>,
}

impl Farm {
    // ---
    pub fn new(id: FarmId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            location: String::new(),
            fan_count: 0,
            company_id: None,
        }
    }

    /// Path segment the telemetry API uses for this farm ("Kandang 1" -> "Kandang_1").
    pub fn sensor_key(&self) -> String {
        self.name.trim().replace(' ', "_")
    }
}

/// The three numeric metrics a telemetry fetch yields.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Metrics {
    pub temperature: f64,
    pub humidity: f64,
    pub ammonia: f64,
}

/// Whether a reading came from the sensors or stands in for a failed fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadingStatus {
    Live,
    Unavailable,
}

/// One farm's reading for a poll cycle. Replaced wholesale every cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    // ---
    pub temperature: f64,
    pub humidity: f64,
    pub ammonia: f64,
    pub observed_at: DateTime<Utc>,
    pub status: ReadingStatus,
}

impl SensorReading {
    // ---
    pub fn live(metrics: Metrics, observed_at: DateTime<Utc>) -> Self {
        Self {
            temperature: metrics.temperature,
            humidity: metrics.humidity,
            ammonia: metrics.ammonia,
            observed_at,
            status: ReadingStatus::Live,
        }
    }

    /// Zeroed placeholder for a farm whose fetch failed.
    pub fn sentinel(observed_at: DateTime<Utc>) -> Self {
        Self {
            temperature: 0.0,
            humidity: 0.0,
            ammonia: 0.0,
            observed_at,
            status: ReadingStatus::Unavailable,
        }
    }

    pub fn is_available(&self) -> bool {
        self.status == ReadingStatus::Live
    }

    pub fn value(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Temperature => self.temperature,
            Metric::Humidity => self.humidity,
            Metric::Ammonia => self.ammonia,
        }
    }
}

/// A farm paired with its reading from the latest cycle, if one has run since
/// the farm joined the roster.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FarmReading {
    pub farm: Farm,
    pub reading: Option<SensorReading>,
}

/// Every farm's reading from a single cycle.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct FarmSnapshot {
    // ---
    /// Cycle that produced the readings; 0 before the first cycle completes.
    pub cycle: u64,
    pub taken_at: Option<DateTime<Utc>>,
    pub farms: Vec<FarmReading>,
}

// ---

/// Body of `GET /api/kandang/{name}`.
#[derive(Debug, Deserialize)]
pub struct RawKandangResponse {
    // ---
    pub data: Option<RawMetrics>,
}

/// Metric values as the API sends them; any may be absent or null.
#[derive(Debug, Default, Deserialize)]
pub struct RawMetrics {
    // ---
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub humidity: Option<f64>,
    #[serde(default)]
    pub ammonia: Option<f64>,
}

impl RawKandangResponse {
    // ---
    /// Missing or null metrics inside `data` become `0`; a missing `data`
    /// object means the farm produced nothing usable.
    pub fn into_metrics(self, url: &str) -> Result<Metrics, FetchError> {
        // ---
        let data = self.data.ok_or_else(|| FetchError::Malformed {
            url: url.to_string(),
            reason: "response has no 'data' object".to_string(),
        })?;

        Ok(Metrics {
            temperature: data.temperature.unwrap_or(0.0),
            humidity: data.humidity.unwrap_or(0.0),
            ammonia: data.ammonia.unwrap_or(0.0),
        })
    }
}
