//! Configuration loader for the `farmwatch` service.
//!
//! All runtime settings and their defaults live here, read from environment
//! variables (with optional `.env` support provided by the caller), so no
//! other module calls `env::var` directly.
//!
use std::collections::HashMap;
use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};

use crate::control::{DEFAULT_FAN_ON_HZ, MAX_FAN_HZ};
use crate::poller::PollerConfig;

/// Parse an optional environment variable with a default value.
macro_rules! parse_env {
    ($lookup:expr, $var_name:expr, $ty:ty, $default:expr) => {
        $lookup($var_name)
            .map(|v| v.trim().parse::<$ty>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Parse a required string environment variable.
macro_rules! require_env {
    ($lookup:expr, $var_name:expr) => {
        $lookup($var_name)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| anyhow!("{} must be set in .env or environment", $var_name))?
    };
}

/// Strongly typed application configuration, immutable after loading.
#[derive(Debug, Clone)]
pub struct Config {
    // ---
    /// Base URL of the telemetry and company API.
    pub api_url: String,

    /// Bearer token for the company farm list, if the API requires one.
    pub company_token: Option<String>,

    /// Seconds between automatic refresh cycles.
    pub poll_interval_secs: u32,

    /// Per-farm fetch timeout in milliseconds.
    pub fetch_timeout_ms: u32,

    /// Cap on outbound telemetry requests within one cycle.
    pub max_concurrent_fetches: u32,

    /// Whether auto-refresh starts enabled.
    pub auto_refresh: bool,

    /// Fan frequency applied when the fan is switched on by toggle.
    pub fan_default_hz: f64,

    pub bind_addr: SocketAddr,
}

/// Load configuration from the process environment.
///
/// Required:
/// - `SENSOR_API_URL` – telemetry API base URL
///
/// Optional:
/// - `COMPANY_TOKEN` – bearer token for the farm list (default: none)
/// - `POLL_INTERVAL_SECS` – refresh cadence (default: 5)
/// - `FETCH_TIMEOUT_MS` – per-farm fetch timeout (default: 3000)
/// - `MAX_CONCURRENT_FETCHES` – outbound request cap (default: 8)
/// - `AUTO_REFRESH` – start with auto-refresh on (default: true)
/// - `FAN_DEFAULT_HZ` – fan frequency when toggled on (default: 25)
/// - `BIND_ADDR` – HTTP listen address (default: 0.0.0.0:8080)
pub fn load_from_env() -> Result<Config> {
    load_with(|name| env::var(name).ok())
}

/// Load configuration from an explicit key/value map.
pub fn load_from_map(vars: &HashMap<String, String>) -> Result<Config> {
    load_with(|name| vars.get(name).cloned())
}

fn load_with<F>(lookup: F) -> Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    // ---
    let api_url = require_env!(lookup, "SENSOR_API_URL");
    let company_token = lookup("COMPANY_TOKEN").filter(|t| !t.trim().is_empty());
    let poll_interval_secs = parse_env!(lookup, "POLL_INTERVAL_SECS", u32, 5);
    let fetch_timeout_ms = parse_env!(lookup, "FETCH_TIMEOUT_MS", u32, 3000);
    let max_concurrent_fetches = parse_env!(lookup, "MAX_CONCURRENT_FETCHES", u32, 8);
    let auto_refresh = parse_env!(lookup, "AUTO_REFRESH", bool, true);
    let fan_default_hz = parse_env!(lookup, "FAN_DEFAULT_HZ", f64, DEFAULT_FAN_ON_HZ);
    let bind_addr = parse_env!(lookup, "BIND_ADDR", SocketAddr, SocketAddr::from(([0, 0, 0, 0], 8080)));

    if !api_url.starts_with("http://") && !api_url.starts_with("https://") {
        bail!("SENSOR_API_URL must be an http(s) URL, got '{}'", api_url);
    }
    if poll_interval_secs == 0 {
        bail!("POLL_INTERVAL_SECS must be at least 1");
    }
    if fetch_timeout_ms == 0 {
        bail!("FETCH_TIMEOUT_MS must be at least 1");
    }
    if max_concurrent_fetches == 0 {
        bail!("MAX_CONCURRENT_FETCHES must be at least 1");
    }
    if !(fan_default_hz > 0.0 && fan_default_hz <= MAX_FAN_HZ) {
        bail!("FAN_DEFAULT_HZ must be in (0, {}], got {}", MAX_FAN_HZ, fan_default_hz);
    }

    Ok(Config {
        api_url,
        company_token,
        poll_interval_secs,
        fetch_timeout_ms,
        max_concurrent_fetches,
        auto_refresh,
        fan_default_hz,
        bind_addr,
    })
}

impl Config {
    // ---
    pub fn poller_config(&self) -> PollerConfig {
        PollerConfig {
            interval: Duration::from_secs(u64::from(self.poll_interval_secs)),
            fetch_timeout: Duration::from_millis(u64::from(self.fetch_timeout_ms)),
            max_concurrent_fetches: self.max_concurrent_fetches as usize,
            auto_refresh: self.auto_refresh,
        }
    }

    /// Log the loaded configuration, masking the company token.
    pub fn log_config(&self) {
        // ---
        let masked_token = match &self.company_token {
            Some(t) if t.chars().count() > 4 => {
                let tail: String = t.chars().skip(t.chars().count() - 4).collect();
                format!("****{}", tail)
            }
            Some(_) => "****".to_string(),
            None => "(none)".to_string(),
        };

        tracing::info!("Configuration loaded:");
        tracing::info!("  SENSOR_API_URL         : {}", self.api_url);
        tracing::info!("  COMPANY_TOKEN          : {}", masked_token);
        tracing::info!("  POLL_INTERVAL_SECS     : {}", self.poll_interval_secs);
        tracing::info!("  FETCH_TIMEOUT_MS       : {}", self.fetch_timeout_ms);
        tracing::info!("  MAX_CONCURRENT_FETCHES : {}", self.max_concurrent_fetches);
        tracing::info!("  AUTO_REFRESH           : {}", self.auto_refresh);
        tracing::info!("  FAN_DEFAULT_HZ         : {}", self.fan_default_hz);
        tracing::info!("  BIND_ADDR              : {}", self.bind_addr);
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        // ---
        let cfg = load_from_map(&vars(&[("SENSOR_API_URL", "http://192.168.100.30:8000")])).unwrap();

        assert_eq!(cfg.poll_interval_secs, 5);
        assert_eq!(cfg.fetch_timeout_ms, 3000);
        assert_eq!(cfg.max_concurrent_fetches, 8);
        assert!(cfg.auto_refresh);
        assert_eq!(cfg.fan_default_hz, DEFAULT_FAN_ON_HZ);
        assert_eq!(cfg.company_token, None);
        assert_eq!(cfg.bind_addr.port(), 8080);

        let poller = cfg.poller_config();
        assert_eq!(poller.interval, Duration::from_secs(5));
        assert_eq!(poller.fetch_timeout, Duration::from_millis(3000));
    }

    #[test]
    fn test_overrides() {
        // ---
        let cfg = load_from_map(&vars(&[
            ("SENSOR_API_URL", "https://api.example.com"),
            ("COMPANY_TOKEN", "abc123xyz"),
            ("POLL_INTERVAL_SECS", "10"),
            ("AUTO_REFRESH", "false"),
            ("FAN_DEFAULT_HZ", "35.5"),
            ("BIND_ADDR", "127.0.0.1:9000"),
        ]))
        .unwrap();

        assert_eq!(cfg.company_token.as_deref(), Some("abc123xyz"));
        assert_eq!(cfg.poll_interval_secs, 10);
        assert!(!cfg.auto_refresh);
        assert_eq!(cfg.fan_default_hz, 35.5);
        assert_eq!(cfg.bind_addr, "127.0.0.1:9000".parse::<SocketAddr>().unwrap());
    }

    #[test]
    fn test_missing_api_url() {
        // ---
        let err = load_from_map(&vars(&[])).unwrap_err();
        assert!(err.to_string().contains("SENSOR_API_URL"));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        // ---
        for (key, value) in [
            ("POLL_INTERVAL_SECS", "0"),
            ("POLL_INTERVAL_SECS", "five"),
            ("MAX_CONCURRENT_FETCHES", "0"),
            ("FAN_DEFAULT_HZ", "0"),
            ("FAN_DEFAULT_HZ", "60"),
            ("AUTO_REFRESH", "maybe"),
        ] {
            let result = load_from_map(&vars(&[
                ("SENSOR_API_URL", "http://localhost:8000"),
                (key, value),
            ]));
            assert!(result.is_err(), "{key}={value} should be rejected");
        }

        assert!(load_from_map(&vars(&[("SENSOR_API_URL", "localhost:8000")])).is_err());
    }
}
