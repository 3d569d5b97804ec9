//! Monitor configuration.
//!
//! Defaults describe the South Lhonak Lake deployment. Scalar settings can be
//! overridden through `LAKEWATCH_*` environment variables:
//!
//! | Env Var                            | Default                                       |
//! |------------------------------------|-----------------------------------------------|
//! | `LAKEWATCH_PORT`                   | `8000`                                        |
//! | `LAKEWATCH_DEVICE_DELAY_SECS`      | `5`                                           |
//! | `LAKEWATCH_REPEAT_PAUSE_SECS`      | `60`                                          |
//! | `LAKEWATCH_TEMP_THRESHOLD`         | `0.95`                                        |
//! | `LAKEWATCH_WATER_LEVEL_THRESHOLD`  | `0.96`                                        |
//! | `LAKEWATCH_WATER_FLOW_THRESHOLD`   | `0.95`                                        |
//! | `LAKEWATCH_THINGSPEAK_URL`         | `https://api.thingspeak.com`                  |
//! | `LAKEWATCH_THINGSPEAK_API_KEY`     | unset (telemetry disabled)                    |
//! | `LAKEWATCH_ALERT_ENDPOINT`         | `https://jsonplaceholder.typicode.com/posts`  |
//! | `LAKEWATCH_SINK_TIMEOUT_SECS`      | `10`                                          |
//!
//! The configuration is validated once and then shared read-only.

use std::collections::BTreeMap;
use std::collections::HashSet;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::error::ConfigError;
use crate::model::{Channel, ChannelRange, Device};

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_DEVICE_DELAY: Duration = Duration::from_secs(5);
const DEFAULT_REPEAT_PAUSE: Duration = Duration::from_secs(60);
const DEFAULT_SINK_TIMEOUT: Duration = Duration::from_secs(10);

const DEFAULT_THINGSPEAK_URL: &str = "https://api.thingspeak.com";
const DEFAULT_ALERT_ENDPOINT: &str = "https://jsonplaceholder.typicode.com/posts";

/// Stations from the lake outlet (id 1) down to the base station (id 10).
const DEFAULT_DEVICES: [(u32, f64, f64); 10] = [
    (1, 27.865, 88.554),
    (2, 27.864, 88.554),
    (3, 27.863, 88.555),
    (4, 27.862, 88.556),
    (5, 27.861, 88.556),
    (6, 27.860, 88.557),
    (7, 27.859, 88.557),
    (8, 27.858, 88.558),
    (9, 27.857, 88.559),
    (10, 27.856, 88.559),
];

/// Per-channel normalization ranges.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelRanges(BTreeMap<Channel, ChannelRange>);

impl ChannelRanges {
    pub fn new(ranges: impl IntoIterator<Item = (Channel, ChannelRange)>) -> Self {
        Self(ranges.into_iter().collect())
    }

    pub fn get(&self, channel: Channel) -> Option<ChannelRange> {
        self.0.get(&channel).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Channel, ChannelRange)> + '_ {
        self.0.iter().map(|(c, r)| (*c, *r))
    }
}

impl Default for ChannelRanges {
    fn default() -> Self {
        Self::new([
            (Channel::Temperature, ChannelRange::new(10.0, 25.0)),
            (Channel::Vibration, ChannelRange::new(0.5, 5.0)),
            (Channel::WaterLevel, ChannelRange::new(1.0, 5.0)),
            (Channel::WaterFlow, ChannelRange::new(50.0, 200.0)),
            (Channel::Rainfall, ChannelRange::new(0.0, 50.0)),
            (Channel::WaterPressure, ChannelRange::new(1.0, 10.0)),
        ])
    }
}

/// Breach thresholds in normalized space, keyed by channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdConfig(BTreeMap<Channel, f64>);

impl ThresholdConfig {
    pub fn new(thresholds: impl IntoIterator<Item = (Channel, f64)>) -> Self {
        Self(thresholds.into_iter().collect())
    }

    pub fn get(&self, channel: Channel) -> Option<f64> {
        self.0.get(&channel).copied()
    }

    pub fn set(&mut self, channel: Channel, threshold: f64) {
        self.0.insert(channel, threshold);
    }

    pub fn iter(&self) -> impl Iterator<Item = (Channel, f64)> + '_ {
        self.0.iter().map(|(c, t)| (*c, *t))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self::new([
            (Channel::Temperature, 0.95),
            (Channel::WaterLevel, 0.96),
            (Channel::WaterFlow, 0.95),
        ])
    }
}

/// Pacing of the sweep loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepTiming {
    /// Wait after each device step.
    pub device_delay: Duration,

    /// Wait between passes in continuous mode.
    pub repeat_pause: Duration,
}

impl Default for SweepTiming {
    fn default() -> Self {
        Self {
            device_delay: DEFAULT_DEVICE_DELAY,
            repeat_pause: DEFAULT_REPEAT_PAUSE,
        }
    }
}

impl SweepTiming {
    /// No pacing at all.
    pub fn immediate() -> Self {
        Self {
            device_delay: Duration::ZERO,
            repeat_pause: Duration::ZERO,
        }
    }
}

/// Outbound endpoints.
#[derive(Debug, Clone, PartialEq)]
pub struct SinkConfig {
    /// ThingSpeak API base URL.
    pub thingspeak_url: String,

    /// ThingSpeak write key. Telemetry is disabled when absent.
    pub thingspeak_api_key: Option<String>,

    /// URL receiving flood alert POSTs.
    pub alert_endpoint: String,

    /// Timeout applied to every outbound request.
    pub timeout: Duration,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            thingspeak_url: DEFAULT_THINGSPEAK_URL.to_string(),
            thingspeak_api_key: None,
            alert_endpoint: DEFAULT_ALERT_ENDPOINT.to_string(),
            timeout: DEFAULT_SINK_TIMEOUT,
        }
    }
}

/// Everything the evaluator and the sweep loop read.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    /// HTTP listen port.
    pub port: u16,

    /// Ordered device registry.
    pub devices: Vec<Device>,
    pub ranges: ChannelRanges,
    pub thresholds: ThresholdConfig,
    pub timing: SweepTiming,
    pub sinks: SinkConfig,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            devices: DEFAULT_DEVICES
                .iter()
                .map(|&(id, latitude, longitude)| Device {
                    id,
                    latitude,
                    longitude,
                })
                .collect(),
            ranges: ChannelRanges::default(),
            thresholds: ThresholdConfig::default(),
            timing: SweepTiming::default(),
            sinks: SinkConfig::default(),
        }
    }
}

impl MonitorConfig {
    /// Load from the process environment and validate.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load using `lookup` to resolve variable names, then validate.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(port) = parse_var::<u16, _>(&lookup, "LAKEWATCH_PORT")? {
            config.port = port;
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "LAKEWATCH_DEVICE_DELAY_SECS")? {
            config.timing.device_delay = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "LAKEWATCH_REPEAT_PAUSE_SECS")? {
            config.timing.repeat_pause = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "LAKEWATCH_SINK_TIMEOUT_SECS")? {
            config.sinks.timeout = Duration::from_secs(secs);
        }

        for (name, channel) in [
            ("LAKEWATCH_TEMP_THRESHOLD", Channel::Temperature),
            ("LAKEWATCH_WATER_LEVEL_THRESHOLD", Channel::WaterLevel),
            ("LAKEWATCH_WATER_FLOW_THRESHOLD", Channel::WaterFlow),
        ] {
            if let Some(threshold) = parse_var::<f64, _>(&lookup, name)? {
                config.thresholds.set(channel, threshold);
            }
        }

        if let Some(url) = lookup("LAKEWATCH_THINGSPEAK_URL") {
            config.sinks.thingspeak_url = url;
        }
        config.sinks.thingspeak_api_key = lookup("LAKEWATCH_THINGSPEAK_API_KEY")
            .filter(|key| !key.trim().is_empty());
        if let Some(endpoint) = lookup("LAKEWATCH_ALERT_ENDPOINT") {
            config.sinks.alert_endpoint = endpoint;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check the registry, ranges and thresholds.
    ///
    /// A degenerate range (`min == max`) is accepted with a warning; an
    /// inverted or non-finite one is rejected.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.devices.is_empty() {
            return Err(ConfigError::EmptyRegistry);
        }

        let mut seen = HashSet::new();
        for device in &self.devices {
            if !seen.insert(device.id) {
                return Err(ConfigError::DuplicateDevice(device.id));
            }
            if !device.latitude.is_finite() || !device.longitude.is_finite() {
                return Err(ConfigError::InvalidLocation { id: device.id });
            }
        }

        for channel in Channel::ALL {
            let range = self
                .ranges
                .get(channel)
                .ok_or(ConfigError::MissingRange(channel))?;

            if !range.min.is_finite() || !range.max.is_finite() || range.min > range.max {
                return Err(ConfigError::InvalidRange {
                    channel,
                    min: range.min,
                    max: range.max,
                });
            }
            if range.is_degenerate() {
                warn!(
                    channel = %channel,
                    value = range.min,
                    "Degenerate channel range, readings will normalize to 0"
                );
            }
        }

        if self.thresholds.is_empty() {
            return Err(ConfigError::NoThresholds);
        }
        for (channel, value) in self.thresholds.iter() {
            if !value.is_finite() {
                return Err(ConfigError::InvalidThreshold { channel, value });
            }
        }

        Ok(())
    }

    /// Look up a registered device.
    pub fn find_device(&self, id: u32) -> Option<&Device> {
        self.devices.iter().find(|d| d.id == id)
    }
}

fn parse_var<T, F>(lookup: &F, name: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv {
                name: name.to_string(),
                value: raw,
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = MonitorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.devices.len(), 10);
        assert_eq!(config.port, 8000);
        assert_eq!(config.thresholds.get(Channel::WaterLevel), Some(0.96));
        assert_eq!(config.thresholds.get(Channel::Rainfall), None);
    }

    #[test]
    fn test_env_overrides() {
        let config = MonitorConfig::from_lookup(lookup_from(&[
            ("LAKEWATCH_DEVICE_DELAY_SECS", "1"),
            ("LAKEWATCH_REPEAT_PAUSE_SECS", "30"),
            ("LAKEWATCH_TEMP_THRESHOLD", "0.5"),
            ("LAKEWATCH_THINGSPEAK_API_KEY", "abc123"),
        ]))
        .unwrap();

        assert_eq!(config.timing.device_delay, Duration::from_secs(1));
        assert_eq!(config.timing.repeat_pause, Duration::from_secs(30));
        assert_eq!(config.thresholds.get(Channel::Temperature), Some(0.5));
        assert_eq!(config.sinks.thingspeak_api_key.as_deref(), Some("abc123"));
        assert_eq!(config.sinks.timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_port_override_and_rejection() {
        let config =
            MonitorConfig::from_lookup(lookup_from(&[("LAKEWATCH_PORT", "9100")])).unwrap();
        assert_eq!(config.port, 9100);

        let err = MonitorConfig::from_lookup(lookup_from(&[("LAKEWATCH_PORT", "80000")]))
            .unwrap_err();
        match err {
            ConfigError::InvalidEnv { name, value } => {
                assert_eq!(name, "LAKEWATCH_PORT");
                assert_eq!(value, "80000");
            }
            other => panic!("expected invalid env error, got {other:?}"),
        }
    }

    #[test]
    fn test_blank_api_key_disables_telemetry() {
        let config =
            MonitorConfig::from_lookup(lookup_from(&[("LAKEWATCH_THINGSPEAK_API_KEY", "  ")]))
                .unwrap();
        assert!(config.sinks.thingspeak_api_key.is_none());
    }

    #[test]
    fn test_invalid_env_value() {
        let err = MonitorConfig::from_lookup(lookup_from(&[(
            "LAKEWATCH_DEVICE_DELAY_SECS",
            "soon",
        )]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { .. }));
    }

    #[test]
    fn test_non_finite_threshold_rejected() {
        let err =
            MonitorConfig::from_lookup(lookup_from(&[("LAKEWATCH_WATER_FLOW_THRESHOLD", "NaN")]))
                .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidThreshold {
                channel: Channel::WaterFlow,
                ..
            }
        ));
    }

    #[test]
    fn test_inverted_range_rejected() {
        let mut config = MonitorConfig::default();
        config.ranges = ChannelRanges::new(
            ChannelRanges::default()
                .iter()
                .map(|(c, r)| match c {
                    Channel::Rainfall => (c, ChannelRange::new(50.0, 0.0)),
                    _ => (c, r),
                }),
        );
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidRange {
                channel: Channel::Rainfall,
                ..
            })
        ));
    }

    #[test]
    fn test_degenerate_range_accepted() {
        let mut config = MonitorConfig::default();
        config.ranges = ChannelRanges::new(
            ChannelRanges::default()
                .iter()
                .map(|(c, r)| match c {
                    Channel::Vibration => (c, ChannelRange::new(1.0, 1.0)),
                    _ => (c, r),
                }),
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_range_rejected() {
        let mut config = MonitorConfig::default();
        config.ranges = ChannelRanges::new(
            ChannelRanges::default()
                .iter()
                .filter(|(c, _)| *c != Channel::WaterPressure),
        );
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingRange(Channel::WaterPressure))
        ));
    }

    #[test]
    fn test_registry_checks() {
        let mut config = MonitorConfig::default();
        config.devices.clear();
        assert!(matches!(config.validate(), Err(ConfigError::EmptyRegistry)));

        let mut config = MonitorConfig::default();
        let first = config.devices[0];
        config.devices.push(first);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DuplicateDevice(1))
        ));
    }

    #[test]
    fn test_empty_thresholds_rejected() {
        let mut config = MonitorConfig::default();
        config.thresholds = ThresholdConfig::new([]);
        assert!(matches!(config.validate(), Err(ConfigError::NoThresholds)));
    }

    #[test]
    fn test_find_device() {
        let config = MonitorConfig::default();
        assert_eq!(config.find_device(10).unwrap().latitude, 27.856);
        assert!(config.find_device(11).is_none());
    }
}
