//! Safety bands per metric and the classifier that maps a value to a tier.
//!
//! Normal bounds are inclusive and win at their edges; the critical bound is
//! strict (`>`). Ammonia has no warning band: it is either normal or critical.

use serde::{Deserialize, Serialize};

use crate::models::SensorReading;

// ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Temperature,
    Humidity,
    Ammonia,
}

impl Metric {
    /// Evaluation order used by the aggregator.
    pub const ALL: [Metric; 3] = [Metric::Temperature, Metric::Humidity, Metric::Ammonia];

    pub fn label(self) -> &'static str {
        match self {
            Metric::Temperature => "Temperature",
            Metric::Humidity => "Humidity",
            Metric::Ammonia => "Ammonia",
        }
    }

    pub fn band(self) -> &'static Band {
        match self {
            Metric::Temperature => &RANGE_TABLE[0],
            Metric::Humidity => &RANGE_TABLE[1],
            Metric::Ammonia => &RANGE_TABLE[2],
        }
    }

    /// Display form of a value, one decimal place plus unit.
    pub fn format_value(self, value: f64) -> String {
        match self {
            Metric::Temperature => format!("{value:.1}°C"),
            Metric::Humidity => format!("{value:.1}%"),
            Metric::Ammonia => format!("{value:.1} ppm"),
        }
    }
}

/// Severity of a single metric value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Normal,
    Warning,
    Critical,
    /// No trustworthy value: the fetch failed or the value is not finite.
    Unavailable,
}

impl Tier {
    /// Ordering used to pick the worst tier of a farm. A missing value ranks
    /// above Normal but below any real alert.
    fn rank(self) -> u8 {
        match self {
            Tier::Normal => 0,
            Tier::Unavailable => 1,
            Tier::Warning => 2,
            Tier::Critical => 3,
        }
    }

    pub fn worst(self, other: Tier) -> Tier {
        if other.rank() > self.rank() {
            other
        } else {
            self
        }
    }
}

/// Band definition for one metric.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Band {
    // ---
    pub metric: Metric,
    /// Lower normal bound; `None` means anything up to `normal_max` is normal.
    pub normal_min: Option<f64>,
    pub normal_max: f64,
    /// Values strictly above this are critical.
    pub critical_above: f64,
    pub has_warning: bool,
    /// Human description of the normal band, carried onto alerts.
    pub description: &'static str,
}

pub static RANGE_TABLE: [Band; 3] = [
    Band {
        metric: Metric::Temperature,
        normal_min: Some(18.0),
        normal_max: 25.0,
        critical_above: 30.0,
        has_warning: true,
        description: "18-25°C",
    },
    Band {
        metric: Metric::Humidity,
        normal_min: Some(45.0),
        normal_max: 65.0,
        critical_above: 80.0,
        has_warning: true,
        description: "45-65%",
    },
    Band {
        metric: Metric::Ammonia,
        normal_min: None,
        normal_max: 20.0,
        critical_above: 20.0,
        has_warning: false,
        description: "0-20 ppm",
    },
];

impl Band {
    // ---
    pub fn classify(&self, value: f64) -> Tier {
        // ---
        if !value.is_finite() {
            return Tier::Unavailable;
        }

        let above_min = self.normal_min.map_or(true, |min| value >= min);
        if above_min && value <= self.normal_max {
            Tier::Normal
        } else if value > self.critical_above || !self.has_warning {
            Tier::Critical
        } else {
            Tier::Warning
        }
    }
}

/// Classify a single metric value.
pub fn classify(metric: Metric, value: f64) -> Tier {
    metric.band().classify(value)
}

/// Classify all three metrics of a reading, in [`Metric::ALL`] order. A
/// sentinel reading is unavailable across the board rather than a set of
/// zero-valued warnings.
pub fn classify_reading(reading: &SensorReading) -> [(Metric, Tier); 3] {
    // ---
    Metric::ALL.map(|metric| {
        let tier = if reading.is_available() {
            classify(metric, reading.value(metric))
        } else {
            Tier::Unavailable
        };
        (metric, tier)
    })
}

/// Worst tier across a farm's metrics; `Unavailable` if it has no reading yet.
pub fn farm_status(reading: Option<&SensorReading>) -> Tier {
    match reading {
        None => Tier::Unavailable,
        Some(r) => classify_reading(r)
            .iter()
            .fold(Tier::Normal, |acc, (_, tier)| acc.worst(*tier)),
    }
}
