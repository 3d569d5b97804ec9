//! Lakewatch - glacial lake flood monitoring.
//!
//! # API Endpoints
//!
//! - `POST /manual_alert/?device_id=N` - Send a flood alert for a device
//! - `GET /monitor/` - Run one sweep and report the first breach
//! - `GET /devices/` - List the device registry
//! - `GET /health` - Health check
//!
//! A continuous sweep over every device starts with the server and stops on
//! Ctrl-C or SIGTERM.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use lakewatch::api::{self, AppState};
use lakewatch::config::MonitorConfig;
use lakewatch::sinks::{
    DisabledTelemetry, FloodAlertClient, TelemetrySink, ThingSpeakClient, http_client,
};
use lakewatch::source::SimulatedSource;
use lakewatch::sweep::{Continuation, DeviceSweepLoop};

/// How long shutdown waits for the background sweep to observe cancellation.
const WORKER_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing with environment filter
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("lakewatch=info".parse()?))
        .init();

    // Load configuration from environment
    let config = Arc::new(MonitorConfig::from_env()?);
    info!(
        port = config.port,
        devices = config.devices.len(),
        alert_endpoint = %config.sinks.alert_endpoint,
        sink_timeout_secs = config.sinks.timeout.as_secs(),
        "Starting Lakewatch"
    );

    // Build sinks and the sensor source
    let client = http_client(config.sinks.timeout)?;
    let telemetry: Arc<dyn TelemetrySink> = match &config.sinks.thingspeak_api_key {
        Some(key) => Arc::new(ThingSpeakClient::new(
            client.clone(),
            &config.sinks.thingspeak_url,
            key,
        )),
        None => {
            warn!("LAKEWATCH_THINGSPEAK_API_KEY not set, telemetry disabled");
            Arc::new(DisabledTelemetry)
        }
    };
    let alerts = Arc::new(FloodAlertClient::new(client, &config.sinks.alert_endpoint));
    let source = Arc::new(SimulatedSource::new(config.ranges.clone()));

    let monitor = Arc::new(DeviceSweepLoop::new(
        Arc::clone(&config),
        source,
        telemetry,
        alerts,
    ));

    // Start the background sweep
    let shutdown = CancellationToken::new();
    let worker = monitor.spawn_background(Continuation::ContinueAll, shutdown.clone());
    info!("Continuous monitoring started");

    // Build router
    let state = AppState {
        monitor,
        shutdown: shutdown.clone(),
    };
    let app = api::router(state).layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()));

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "Lakewatch is listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    // Wait for the background sweep to notice cancellation
    shutdown.cancel();
    if let Some(worker) = worker {
        match tokio::time::timeout(WORKER_SHUTDOWN_TIMEOUT, worker).await {
            Ok(Ok(())) => info!("Background sweep stopped"),
            Ok(Err(e)) => error!(error = %e, "Background sweep task failed"),
            Err(_) => warn!("Background sweep did not stop in time"),
        }
    }
    info!("Shutdown complete");

    Ok(())
}

/// Resolve on Ctrl-C or SIGTERM, cancelling `shutdown`.
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
    shutdown.cancel();
}
