//! Outbound sinks invoked by the sweep loop.
//!
//! # Sinks
//!
//! - [`thingspeak`]: pushes normalized readings to a ThingSpeak channel
//! - [`alert`]: posts flood alerts to a notification endpoint
//!
//! Sink failures are reported as [`SinkError`] and never change a sweep's
//! outcome. Callers log them and continue.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::error::SinkError;
use crate::model::NormalizedReading;

pub mod alert;
pub mod thingspeak;

pub use alert::FloodAlertClient;
pub use thingspeak::ThingSpeakClient;

/// Message attached to every flood alert.
pub const FLOOD_ALERT_MESSAGE: &str = "Flood threshold reached";

/// Receives the normalized reading of every evaluated device.
#[async_trait]
pub trait TelemetrySink: Send + Sync {
    async fn push(&self, device_id: u32, reading: &NormalizedReading) -> Result<(), SinkError>;
}

/// Receives one notification per breaching device.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn notify(
        &self,
        device_id: u32,
        latitude: f64,
        longitude: f64,
        message: &str,
    ) -> Result<(), SinkError>;
}

/// Telemetry sink used when no ThingSpeak key is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledTelemetry;

#[async_trait]
impl TelemetrySink for DisabledTelemetry {
    async fn push(&self, device_id: u32, reading: &NormalizedReading) -> Result<(), SinkError> {
        debug!(
            device_id,
            channels = reading.len(),
            "Telemetry disabled, reading not forwarded"
        );
        Ok(())
    }
}

/// Build the HTTP client shared by the sinks.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client, SinkError> {
    let client = reqwest::Client::builder().timeout(timeout).build()?;
    Ok(client)
}

/// Turn a non-2xx response into [`SinkError::Status`], returning the body on success.
pub(crate) async fn check_response(response: reqwest::Response) -> Result<String, SinkError> {
    let status = response.status();
    let body = response.text().await?;

    if status.is_success() {
        Ok(body)
    } else {
        Err(SinkError::Status {
            status: status.as_u16(),
            body,
        })
    }
}
