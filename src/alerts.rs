//! Alert aggregation across every farm's current reading.
//!
//! Output order is farm order, then metric order (temperature, humidity,
//! ammonia). Nothing is sorted by severity or magnitude.

use serde::Serialize;

use crate::models::{FarmId, FarmReading};
use crate::ranges::{classify_reading, Metric, Tier};

// ---

/// Display-ready projection of one non-normal classification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertRecord {
    // ---
    pub farm_id: FarmId,
    pub farm_name: String,
    pub metric: Metric,
    /// Display name of the metric, e.g. "Temperature".
    pub sensor: String,
    pub formatted_value: String,
    pub threshold_description: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct AlertSummary {
    // ---
    pub warnings: Vec<AlertRecord>,
    pub criticals: Vec<AlertRecord>,
    /// Farms whose latest reading is a sentinel for a failed fetch.
    pub unavailable: Vec<FarmId>,
}

impl AlertSummary {
    pub fn total(&self) -> usize {
        self.warnings.len() + self.criticals.len()
    }
}

/// Classify every farm's reading and partition the results.
///
/// Farms without a reading are skipped. Pure: the same input always yields
/// the same summary.
pub fn aggregate(farms: &[FarmReading]) -> AlertSummary {
    // ---
    let mut summary = AlertSummary::default();

    for entry in farms {
        let Some(reading) = entry.reading.as_ref() else {
            continue;
        };

        if !reading.is_available() {
            summary.unavailable.push(entry.farm.id);
            continue;
        }

        for (metric, tier) in classify_reading(reading) {
            let bucket = match tier {
                Tier::Warning => &mut summary.warnings,
                Tier::Critical => &mut summary.criticals,
                Tier::Normal | Tier::Unavailable => continue,
            };

            bucket.push(AlertRecord {
                farm_id: entry.farm.id,
                farm_name: entry.farm.name.clone(),
                metric,
                sensor: metric.label().to_string(),
                formatted_value: metric.format_value(reading.value(metric)),
                threshold_description: metric.band().description.to_string(),
            });
        }
    }

    summary
}

// ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemStatus {
    Optimal,
    Warning,
}

/// Dashboard header counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SystemOverview {
    // ---
    pub active_farms: usize,
    pub total_sensors: usize,
    pub normal_readings: usize,
    /// Sensor values that look like a failed fetch rather than a measurement.
    pub suspect_readings: usize,
    pub status: SystemStatus,
}

/// Count sensor values that are missing, unavailable, non-finite, or a zero
/// temperature/humidity. A zero ammonia value is a valid measurement.
pub fn overview(farms: &[FarmReading]) -> SystemOverview {
    // ---
    let total_sensors = farms.len() * Metric::ALL.len();

    let suspect_readings: usize = farms
        .iter()
        .map(|entry| match &entry.reading {
            Some(r) if r.is_available() => Metric::ALL
                .iter()
                .filter(|&&metric| {
                    let v = r.value(metric);
                    !v.is_finite() || (v == 0.0 && metric != Metric::Ammonia)
                })
                .count(),
            _ => Metric::ALL.len(),
        })
        .sum();

    SystemOverview {
        active_farms: farms.len(),
        total_sensors,
        normal_readings: total_sensors - suspect_readings,
        suspect_readings,
        status: if suspect_readings == 0 {
            SystemStatus::Optimal
        } else {
            SystemStatus::Warning
        },
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::models::{Farm, Metrics, SensorReading};
    use chrono::{TimeZone, Utc};

    fn entry(id: FarmId, name: &str, t: f64, h: f64, a: f64) -> FarmReading {
        // ---
        let at = Utc.with_ymd_and_hms(2025, 3, 26, 18, 45, 0).unwrap();
        FarmReading {
            farm: Farm::new(id, name),
            reading: Some(SensorReading::live(
                Metrics {
                    temperature: t,
                    humidity: h,
                    ammonia: a,
                },
                at,
            )),
        }
    }

    fn keys(records: &[AlertRecord]) -> Vec<(FarmId, Metric)> {
        records.iter().map(|r| (r.farm_id, r.metric)).collect()
    }

    #[test]
    fn test_two_farm_scenario() {
        // ---
        let farms = vec![
            entry(1, "Kandang 1", 28.0, 66.2, 4.8),
            entry(2, "Kandang 2", 33.4, 66.2, 25.3),
        ];

        let summary = aggregate(&farms);

        assert_eq!(
            keys(&summary.criticals),
            vec![(2, Metric::Temperature), (2, Metric::Ammonia)]
        );
        // Farm 1's temperature (28) sits in the warning band too.
        assert_eq!(
            keys(&summary.warnings),
            vec![
                (1, Metric::Temperature),
                (1, Metric::Humidity),
                (2, Metric::Humidity)
            ]
        );
        assert!(!keys(&summary.warnings).contains(&(1, Metric::Ammonia)));
        assert!(!keys(&summary.criticals).contains(&(1, Metric::Ammonia)));
        assert!(summary.unavailable.is_empty());
    }

    #[test]
    fn test_record_is_display_ready() {
        // ---
        let summary = aggregate(&[entry(2, "Kandang 2", 33.4, 50.0, 25.3)]);

        assert_eq!(
            summary.criticals[0],
            AlertRecord {
                farm_id: 2,
                farm_name: "Kandang 2".to_string(),
                metric: Metric::Temperature,
                sensor: "Temperature".to_string(),
                formatted_value: "33.4°C".to_string(),
                threshold_description: "18-25°C".to_string(),
            }
        );
        assert_eq!(summary.criticals[1].formatted_value, "25.3 ppm");
        assert_eq!(summary.criticals[1].threshold_description, "0-20 ppm");
    }

    #[test]
    fn test_aggregate_is_idempotent() {
        // ---
        let farms = vec![
            entry(1, "A", 31.0, 90.0, 21.0),
            entry(2, "B", 22.0, 50.0, 3.0),
            entry(3, "C", 10.0, 30.0, 0.0),
        ];

        assert_eq!(aggregate(&farms), aggregate(&farms));
    }

    #[test]
    fn test_order_follows_farms_not_severity() {
        // ---
        let farms = vec![
            entry(5, "low", 30.5, 50.0, 1.0),
            entry(3, "high", 45.0, 50.0, 1.0),
        ];

        let summary = aggregate(&farms);
        assert_eq!(keys(&summary.criticals), vec![(5, Metric::Temperature), (3, Metric::Temperature)]);
    }

    #[test]
    fn test_farm_without_reading_is_skipped() {
        // ---
        let farms = vec![
            FarmReading {
                farm: Farm::new(9, "new"),
                reading: None,
            },
            entry(1, "A", 40.0, 50.0, 1.0),
        ];

        let summary = aggregate(&farms);
        assert_eq!(keys(&summary.criticals), vec![(1, Metric::Temperature)]);
        assert!(summary.unavailable.is_empty());
    }

    #[test]
    fn test_sentinel_reading_reports_unavailable_not_warnings() {
        // ---
        let farms = vec![FarmReading {
            farm: Farm::new(4, "offline"),
            reading: Some(SensorReading::sentinel(Utc::now())),
        }];

        let summary = aggregate(&farms);
        assert_eq!(summary.total(), 0);
        assert_eq!(summary.unavailable, vec![4]);
    }

    #[test]
    fn test_all_normal_yields_empty_summary() {
        // ---
        let summary = aggregate(&[entry(1, "A", 21.0, 55.0, 10.0)]);
        assert_eq!(summary, AlertSummary::default());
    }

    #[test]
    fn test_overview_counts() {
        // ---
        let farms = vec![
            entry(1, "A", 21.0, 55.0, 0.0),
            entry(2, "B", 0.0, 55.0, 3.0),
            FarmReading {
                farm: Farm::new(3, "C"),
                reading: Some(SensorReading::sentinel(Utc::now())),
            },
        ];

        let o = overview(&farms);
        assert_eq!(o.active_farms, 3);
        assert_eq!(o.total_sensors, 9);
        assert_eq!(o.suspect_readings, 4);
        assert_eq!(o.normal_readings, 5);
        assert_eq!(o.status, SystemStatus::Warning);
    }

    #[test]
    fn test_non_finite_value_is_suspect_not_alert() {
        // ---
        let farms = vec![entry(1, "A", f64::INFINITY, 55.0, 3.0)];

        assert_eq!(aggregate(&farms).total(), 0);
        assert_eq!(overview(&farms).suspect_readings, 1);
    }

    #[test]
    fn test_overview_optimal_when_nothing_suspect() {
        // ---
        let o = overview(&[entry(1, "A", 21.0, 55.0, 0.0)]);
        assert_eq!(o.status, SystemStatus::Optimal);
        assert_eq!(o.normal_readings, 3);
    }
}
