//! Error types surfaced by the monitoring core.
//!
//! Classification and aggregation are total and have no error type. The two
//! fallible boundaries are the telemetry fetch (recovered per farm by the
//! poller) and control mutations against a farm the store does not know.

use crate::models::FarmId;

/// Per-farm telemetry could not be obtained.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("fetch for farm '{farm}' timed out after {timeout_ms} ms")]
    Timeout { farm: String, timeout_ms: u64 },

    #[error("malformed payload from {url}: {reason}")]
    Malformed { url: String, reason: String },
}

/// Rejected control operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ControlError {
    #[error("farm {0} is not in the control store")]
    UnknownFarm(FarmId),
}
