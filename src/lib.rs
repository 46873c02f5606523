//! Farm telemetry monitoring core.
//!
//! Turns per-farm sensor readings into severity-tiered alerts, keeps each
//! farm's actuator state under its invariants, and refreshes readings from
//! the remote API on a fixed cadence.
//!
//! The re-exports below are the surface used by the binary and the
//! integration tests.

pub mod alerts;
pub mod clock;
pub mod config;
pub mod control;
pub mod error;
pub mod models;
pub mod monitor;
pub mod poller;
pub mod ranges;
pub mod routes;
pub mod source;

pub use alerts::{aggregate, overview, AlertRecord, AlertSummary, SystemOverview, SystemStatus};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use control::{Actuator, ControlState, ControlStore, ControlUpdate};
pub use error::{ControlError, FetchError};
pub use models::{Farm, FarmId, FarmReading, FarmSnapshot, Metrics, ReadingStatus, SensorReading};
pub use monitor::{Monitor, MonitorSettings};
pub use poller::{CycleOutcome, Lifecycle, PollUpdate, Poller, PollerConfig};
pub use ranges::{classify, Metric, Tier};
pub use source::{CompanyContext, HttpTelemetrySource, TelemetrySource};
