//! Flood alert notification client.
//!
//! Posts a JSON body `{device_id, latitude, longitude, message}` to the
//! configured endpoint. Any 2xx response counts as delivered; the response
//! body is only logged.

use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

use super::{AlertSink, check_response};
use crate::error::SinkError;

/// Body of an alert POST.
#[derive(Debug, Clone, Serialize)]
pub struct AlertPayload<'a> {
    pub device_id: u32,
    pub latitude: f64,
    pub longitude: f64,
    pub message: &'a str,
}

/// Client for the flood notification endpoint.
#[derive(Clone)]
pub struct FloodAlertClient {
    client: reqwest::Client,
    endpoint: String,
}

impl FloodAlertClient {
    pub fn new(client: reqwest::Client, endpoint: &str) -> Self {
        Self {
            client,
            endpoint: endpoint.to_string(),
        }
    }
}

#[async_trait]
impl AlertSink for FloodAlertClient {
    async fn notify(
        &self,
        device_id: u32,
        latitude: f64,
        longitude: f64,
        message: &str,
    ) -> Result<(), SinkError> {
        let payload = AlertPayload {
            device_id,
            latitude,
            longitude,
            message,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await?;
        let status = response.status();
        let body = check_response(response).await?;

        info!(
            device_id,
            status = status.as_u16(),
            body = %body,
            "Flood alert delivered"
        );
        Ok(())
    }
}
