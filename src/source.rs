//! Sensor reading sources.
//!
//! The sweep loop pulls one [`RawReading`] per device per tick from a
//! [`SensorSource`]. Stations are simulated: [`SimulatedSource`] draws each
//! channel uniformly from its configured range.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;

use crate::config::ChannelRanges;
use crate::error::SourceError;
use crate::model::RawReading;

/// Supplies raw readings for registered devices.
///
/// Implementations must return a value for every configured channel; a
/// missing channel is reported by the evaluator as a [`SourceError`].
#[async_trait]
pub trait SensorSource: Send + Sync {
    async fn sample(&self, device_id: u32) -> Result<RawReading, SourceError>;
}

/// Uniform random readings inside each channel's range.
#[derive(Debug, Clone)]
pub struct SimulatedSource {
    ranges: Arc<ChannelRanges>,
}

impl SimulatedSource {
    pub fn new(ranges: ChannelRanges) -> Self {
        Self {
            ranges: Arc::new(ranges),
        }
    }

    fn draw(&self) -> RawReading {
        let mut rng = rand::rng();
        let mut reading = RawReading::new(Utc::now());
        for (channel, range) in self.ranges.iter() {
            reading.set(channel, rng.random_range(range.min..=range.max));
        }
        reading
    }
}

#[async_trait]
impl SensorSource for SimulatedSource {
    async fn sample(&self, _device_id: u32) -> Result<RawReading, SourceError> {
        Ok(self.draw())
    }
}
