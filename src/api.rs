//! HTTP API handlers for Lakewatch.
//!
//! - **POST /manual_alert/**: alerts for one device without evaluating it.
//! - **GET /monitor/**: runs one stop-at-first sweep and reports the result.
//! - **GET /devices/**: lists the device registry.
//! - **GET /health**: liveness probe.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::error::ApiError;
use crate::model::{
    DevicesResponse, ManualAlertQuery, ManualAlertResponse, MonitorResponse,
};
use crate::sinks::FLOOD_ALERT_MESSAGE;
use crate::sweep::{DeviceSweepLoop, SweepMode};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub monitor: Arc<DeviceSweepLoop>,

    /// Cancelled on shutdown; on-demand sweeps observe it too.
    pub shutdown: CancellationToken,
}

/// All routes, bound to `state`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/manual_alert/", post(manual_alert))
        .route("/monitor/", get(monitor))
        .route("/devices/", get(list_devices))
        .route("/health", get(health_check))
        .with_state(state)
}

/// POST /manual_alert/ - Alert for a device on request.
///
/// # Query Parameters
///
/// - `device_id` (required): id of a registered device
///
/// # Response
///
/// ```json
/// { "latitude": 27.864, "longitude": 88.554 }
/// ```
///
/// Unknown ids return `404` with `{"error": "Device not found"}`. A failed
/// alert delivery is logged; the location is still returned.
#[instrument(skip(state))]
pub async fn manual_alert(
    State(state): State<AppState>,
    Query(query): Query<ManualAlertQuery>,
) -> Result<Json<ManualAlertResponse>, ApiError> {
    let device = *state
        .monitor
        .config()
        .find_device(query.device_id)
        .ok_or_else(|| {
            warn!(device_id = query.device_id, "Manual alert for unknown device");
            ApiError::DeviceNotFound(query.device_id)
        })?;

    info!(device_id = device.id, "Manual alert triggered");
    if let Err(e) = state.monitor.send_alert(&device, FLOOD_ALERT_MESSAGE).await {
        warn!(device_id = device.id, error = %e, "Manual flood alert failed");
    }

    Ok(Json(ManualAlertResponse {
        latitude: device.latitude,
        longitude: device.longitude,
    }))
}

/// GET /monitor/ - Run one sweep, stopping at the first breach.
///
/// # Response
///
/// ```json
/// { "message": "Flood detected", "latitude": 27.864, "longitude": 88.554 }
/// ```
///
/// or `{"message": "No flood detected", "latitude": null, "longitude": null}`.
///
/// A sweep cut short by shutdown before finding a breach has not checked
/// every device and answers 503 `{"error": "Monitoring interrupted"}`.
#[instrument(skip(state))]
pub async fn monitor(State(state): State<AppState>) -> Result<Json<MonitorResponse>, ApiError> {
    let outcome = state
        .monitor
        .run(SweepMode::ON_DEMAND, &state.shutdown)
        .await
        .unwrap_or_default();

    info!(
        breach = outcome.is_breach(),
        devices_visited = outcome.devices_visited,
        interrupted = outcome.interrupted,
        "On-demand sweep finished"
    );

    if outcome.interrupted && !outcome.is_breach() {
        warn!(
            devices_visited = outcome.devices_visited,
            "On-demand sweep interrupted before covering the registry"
        );
        return Err(ApiError::MonitoringInterrupted);
    }

    Ok(Json(MonitorResponse::from(&outcome)))
}

/// GET /devices/ - The device registry.
pub async fn list_devices(State(state): State<AppState>) -> Json<DevicesResponse> {
    Json(DevicesResponse {
        devices: state.monitor.config().devices.clone(),
    })
}

/// GET /health - Simple health check endpoint.
pub async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}
