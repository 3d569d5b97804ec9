//! Data models for Lakewatch.
//!
//! Readings are ephemeral: a [`RawReading`] is produced by a sensor source,
//! turned into a [`NormalizedReading`] and a [`BreachResult`], pushed to the
//! sinks, and dropped. Nothing here is persisted.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SourceError;

/// A monitoring station in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Device {
    /// Stable identifier, unique within the registry.
    pub id: u32,

    /// Latitude in decimal degrees.
    pub latitude: f64,

    /// Longitude in decimal degrees.
    pub longitude: f64,
}

impl Device {
    pub fn location(&self) -> Location {
        Location {
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }
}

/// A geographic point reported back to callers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

/// A sensor channel carried by every station.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Air temperature in °C.
    Temperature,
    /// Ground vibration in Hz.
    Vibration,
    /// Lake water level in meters.
    WaterLevel,
    /// Outflow in m³/s.
    WaterFlow,
    /// Rainfall in mm/h.
    Rainfall,
    /// Water pressure in bar.
    WaterPressure,
}

impl Channel {
    /// Every channel, in telemetry field order.
    pub const ALL: [Channel; 6] = [
        Channel::Temperature,
        Channel::Vibration,
        Channel::WaterLevel,
        Channel::WaterFlow,
        Channel::Rainfall,
        Channel::WaterPressure,
    ];

    /// The snake_case name used in logs and JSON.
    pub fn name(&self) -> &'static str {
        match self {
            Channel::Temperature => "temperature",
            Channel::Vibration => "vibration",
            Channel::WaterLevel => "water_level",
            Channel::WaterFlow => "water_flow",
            Channel::Rainfall => "rainfall",
            Channel::WaterPressure => "water_pressure",
        }
    }

    /// ThingSpeak field number (`field1` .. `field6`).
    pub fn telemetry_field(&self) -> u8 {
        match self {
            Channel::Temperature => 1,
            Channel::Vibration => 2,
            Channel::WaterLevel => 3,
            Channel::WaterFlow => 4,
            Channel::Rainfall => 5,
            Channel::WaterPressure => 6,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Configured `[min, max]` span of a channel.
///
/// `min == max` is a legal degenerate range; it normalizes everything to `0.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelRange {
    pub min: f64,
    pub max: f64,
}

impl ChannelRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn is_degenerate(&self) -> bool {
        self.min == self.max
    }
}

/// One sample set for one device at one sweep tick.
#[derive(Debug, Clone, PartialEq)]
pub struct RawReading {
    /// When the source produced the sample.
    pub sampled_at: DateTime<Utc>,

    values: BTreeMap<Channel, f64>,
}

impl RawReading {
    pub fn new(sampled_at: DateTime<Utc>) -> Self {
        Self {
            sampled_at,
            values: BTreeMap::new(),
        }
    }

    /// Builder-style setter.
    pub fn with(mut self, channel: Channel, value: f64) -> Self {
        self.values.insert(channel, value);
        self
    }

    pub fn set(&mut self, channel: Channel, value: f64) {
        self.values.insert(channel, value);
    }

    /// Raw value of `channel`, or [`SourceError::MissingChannel`].
    pub fn get(&self, channel: Channel) -> Result<f64, SourceError> {
        self.values
            .get(&channel)
            .copied()
            .ok_or(SourceError::MissingChannel(channel))
    }
}

/// A reading mapped into range-relative units.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedReading {
    values: BTreeMap<Channel, f64>,
}

impl NormalizedReading {
    pub fn insert(&mut self, channel: Channel, value: f64) {
        self.values.insert(channel, value);
    }

    pub fn get(&self, channel: Channel) -> Option<f64> {
        self.values.get(&channel).copied()
    }

    /// Channels in field order with their normalized values.
    pub fn iter(&self) -> impl Iterator<Item = (Channel, f64)> + '_ {
        self.values.iter().map(|(c, v)| (*c, *v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Verdict for one evaluated reading.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BreachResult {
    /// True if any thresholded channel breached.
    pub breached: bool,

    /// Per-channel flag for every channel that has a threshold.
    pub channels: BTreeMap<Channel, bool>,
}

impl BreachResult {
    /// Channels whose flag is set.
    pub fn breached_channels(&self) -> impl Iterator<Item = Channel> + '_ {
        self.channels
            .iter()
            .filter(|(_, breached)| **breached)
            .map(|(c, _)| *c)
    }
}

/// A device that breached during a sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceBreach {
    pub device_id: u32,
    pub location: Location,
    pub channels: Vec<Channel>,
}

/// Result of one pass over the registry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SweepOutcome {
    /// Location of the first breaching device in registry order.
    pub location: Option<Location>,

    /// Every breach seen, in registry order. At most one entry under
    /// stop-at-first.
    pub breaches: Vec<DeviceBreach>,

    /// Devices whose step was started (including skipped ones).
    pub devices_visited: usize,

    /// The pass was cut short by cancellation.
    pub interrupted: bool,
}

impl SweepOutcome {
    pub fn is_breach(&self) -> bool {
        self.location.is_some()
    }

    pub(crate) fn record_breach(&mut self, breach: DeviceBreach) {
        if self.location.is_none() {
            self.location = Some(breach.location);
        }
        self.breaches.push(breach);
    }
}

/// Query parameters for POST /manual_alert/.
#[derive(Debug, Deserialize)]
pub struct ManualAlertQuery {
    pub device_id: u32,
}

/// Response for POST /manual_alert/.
#[derive(Debug, Clone, Serialize)]
pub struct ManualAlertResponse {
    pub latitude: f64,
    pub longitude: f64,
}

/// Response for GET /monitor/.
#[derive(Debug, Clone, Serialize)]
pub struct MonitorResponse {
    /// "Flood detected" or "No flood detected".
    pub message: String,

    pub latitude: Option<f64>,

    pub longitude: Option<f64>,
}

impl From<&SweepOutcome> for MonitorResponse {
    fn from(outcome: &SweepOutcome) -> Self {
        match outcome.location {
            Some(location) => Self {
                message: "Flood detected".to_string(),
                latitude: Some(location.latitude),
                longitude: Some(location.longitude),
            },
            None => Self {
                message: "No flood detected".to_string(),
                latitude: None,
                longitude: None,
            },
        }
    }
}

/// Response for GET /devices/.
#[derive(Debug, Clone, Serialize)]
pub struct DevicesResponse {
    pub devices: Vec<Device>,
}
