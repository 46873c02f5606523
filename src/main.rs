//! Application entry point for the `farmwatch` service.
//!
//! Startup sequence:
//! - Loading configuration from environment variables or `.env`
//! - Initializing structured logging/tracing
//! - Fetching the company's farm roster to seed polling and control state
//! - Starting the polling orchestrator
//! - Mounting all API routes via the `routes` gateway (EMBP pattern)
//! - Binding the Axum HTTP server and serving until Ctrl-C
//!
//! # Environment Variables
//! - `SENSOR_API_URL` (**required**) – telemetry API base URL
//! - `FARMWATCH_LOG_LEVEL` (optional) – log verbosity (default: `debug`)
//! - `FARMWATCH_SPAN_EVENTS` (optional) – span event mode for tracing
//! - see `config.rs` for the polling and control settings
use std::{env, io::IsTerminal, sync::Arc};

use anyhow::Result;
use axum::Router;
use dotenvy::dotenv;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use farmwatch::{config, routes, CompanyContext, HttpTelemetrySource, Monitor, MonitorSettings, SystemClock};

// ---

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    init_tracing();
    dotenv().ok();

    let cfg = config::load_from_env()?;
    cfg.log_config();

    let source = Arc::new(HttpTelemetrySource::new(cfg.api_url.clone()));
    let monitor = Monitor::new(
        source,
        Arc::new(SystemClock),
        CompanyContext {
            token: cfg.company_token.clone(),
        },
        MonitorSettings {
            poller: cfg.poller_config(),
            fan_on_hz: Some(cfg.fan_default_hz),
        },
    );

    // A failed roster fetch leaves the service up with no farms; the
    // dashboard shows an empty set instead of the process exiting.
    match monitor.reload_roster().await {
        Ok(count) => tracing::info!("Loaded {} farms from {}", count, cfg.api_url),
        Err(e) => tracing::error!("Failed to fetch farm roster: {}", e),
    }

    let poller = monitor.start();

    // Build app from routes gateway (EMBP)
    let app: Router = routes::router(monitor.clone());

    tracing::info!("Listening on {}", cfg.bind_addr);
    let listener = tokio::net::TcpListener::bind(cfg.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    monitor.stop();
    if let Some(handle) = poller {
        handle.await?;
    }

    Ok(())
}

async fn shutdown_signal() {
    // ---
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    tracing::info!("Shutdown signal received");
}

// ---

/// Initialize the global tracing subscriber for structured logging.
///
/// - Log target, file, and line number output enabled
/// - Color output controlled by TTY detection and `FORCE_COLOR` env var:
///   - `FORCE_COLOR=1|true|yes`: force colors on
///   - `FORCE_COLOR=0|false|no`: force colors off
///   - unset or other values: auto-detect TTY
/// - Span event emission mode controlled by `FARMWATCH_SPAN_EVENTS`:
///   - `"full"`       : emit ENTER, EXIT, and CLOSE events with timing
///   - `"enter_exit"` : emit ENTER and EXIT only
///   - unset or other values: emit CLOSE events only (default)
/// - Log level from `RUST_LOG`, else `FARMWATCH_LOG_LEVEL`
///
/// Call once at startup before any logging macros are invoked.
fn init_tracing() {
    // ---
    let span_events = match env::var("FARMWATCH_SPAN_EVENTS").as_deref() {
        Ok("full") => FmtSpan::FULL,
        Ok("enter_exit") => FmtSpan::ENTER | FmtSpan::EXIT,
        _ => FmtSpan::CLOSE,
    };

    let use_color = match env::var("FORCE_COLOR").as_deref() {
        Ok("1") | Ok("true") | Ok("yes") => true,
        Ok("0") | Ok("false") | Ok("no") => false,
        _ => std::io::stdout().is_terminal(),
    };

    // Use RUST_LOG if available, otherwise fall back to FARMWATCH_LOG_LEVEL
    let env_filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match env::var("FARMWATCH_LOG_LEVEL").ok().as_deref() {
            Some("trace") => "trace",
            Some("debug") => "debug",
            Some("info") => "info",
            Some("warn") => "warn",
            Some("error") => "error",
            _ => "debug",
        };
        EnvFilter::new(format!("{level},hyper=warn,reqwest=warn"))
    };

    tracing_subscriber::fmt()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(span_events)
        .with_env_filter(env_filter)
        .with_ansi(use_color)
        .compact()
        .init();
}
