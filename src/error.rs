//! Error types for Lakewatch.
//!
//! Only [`ConfigError`] is fatal, and only at startup. Source and sink
//! failures are logged by the sweep loop and the sweep moves on.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::model::Channel;

/// Invalid configuration detected while building [`crate::config::MonitorConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("environment variable {name} has invalid value {value:?}")]
    InvalidEnv { name: String, value: String },

    #[error("device registry is empty")]
    EmptyRegistry,

    #[error("device id {0} appears more than once in the registry")]
    DuplicateDevice(u32),

    #[error("device {id} has non-finite coordinates")]
    InvalidLocation { id: u32 },

    #[error("no range configured for channel {0}")]
    MissingRange(Channel),

    #[error("range for channel {channel} is invalid: min {min}, max {max}")]
    InvalidRange { channel: Channel, min: f64, max: f64 },

    #[error("no thresholds configured")]
    NoThresholds,

    #[error("threshold for channel {channel} is not finite: {value}")]
    InvalidThreshold { channel: Channel, value: f64 },
}

/// A sensor source could not provide a usable reading.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("reading is missing channel {0}")]
    MissingChannel(Channel),

    #[error("channel {channel} reported a non-finite value: {value}")]
    NonFinite { channel: Channel, value: f64 },

    #[error("sensor source unavailable for device {device_id}: {reason}")]
    Unavailable { device_id: u32, reason: String },
}

/// A telemetry or alert call failed.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("endpoint returned {status}: {body}")]
    Status { status: u16, body: String },
}

/// Errors surfaced to HTTP callers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Device not found")]
    DeviceNotFound(u32),

    #[error("Monitoring interrupted")]
    MonitoringInterrupted,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::DeviceNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::MonitoringInterrupted => StatusCode::SERVICE_UNAVAILABLE,
        };

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
