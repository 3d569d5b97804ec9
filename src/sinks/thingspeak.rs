//! ThingSpeak telemetry client.
//!
//! Each reading becomes one channel update: `GET /update` with the write key
//! and the six normalized values as `field1` .. `field6`.
//!
//! # API Reference
//!
//! See: <https://www.mathworks.com/help/thingspeak/writedata.html>

use async_trait::async_trait;
use tracing::{debug, info};

use super::{TelemetrySink, check_response};
use crate::error::SinkError;
use crate::model::NormalizedReading;

/// Client for ThingSpeak's channel update API.
#[derive(Clone)]
pub struct ThingSpeakClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl ThingSpeakClient {
    /// Create a client writing to the channel owning `api_key`.
    ///
    /// # Arguments
    ///
    /// * `client` - Shared HTTP client (carries the request timeout)
    /// * `base_url` - API base, e.g. `https://api.thingspeak.com`
    /// * `api_key` - Channel write key
    pub fn new(client: reqwest::Client, base_url: &str, api_key: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    /// Query parameters for one update, in field order.
    fn update_params(&self, reading: &NormalizedReading) -> Vec<(String, String)> {
        let mut params = Vec::with_capacity(reading.len() + 1);
        params.push(("api_key".to_string(), self.api_key.clone()));
        for (channel, value) in reading.iter() {
            params.push((format!("field{}", channel.telemetry_field()), value.to_string()));
        }
        params
    }
}

#[async_trait]
impl TelemetrySink for ThingSpeakClient {
    async fn push(&self, device_id: u32, reading: &NormalizedReading) -> Result<(), SinkError> {
        let url = format!("{}/update", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&self.update_params(reading))
            .send()
            .await?;
        let body = check_response(response).await?;

        // ThingSpeak answers with the new entry id, or "0" when rate limited.
        debug!(device_id, entry = %body.trim(), "ThingSpeak update response");
        info!(device_id, "Device sent data");
        Ok(())
    }
}
