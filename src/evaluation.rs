//! Threshold evaluation.
//!
//! Raw readings are mapped into range-relative units with [`normalize`] and
//! compared against the configured thresholds. A reading outside its range
//! normalizes outside `[0, 1]`, which is what trips a threshold.

use tracing::info;

use crate::config::{ChannelRanges, ThresholdConfig};
use crate::error::SourceError;
use crate::model::{BreachResult, NormalizedReading, RawReading};

/// Position of `value` within `[min, max]`.
///
/// Unbounded: values outside the range map below 0 or above 1. A degenerate
/// range (`min == max`) always maps to `0.0`.
pub fn normalize(value: f64, min: f64, max: f64) -> f64 {
    if min == max {
        return 0.0;
    }
    (value - min) / (max - min)
}

/// Normalize every configured channel of `raw`.
///
/// Fails with [`SourceError::MissingChannel`] if the reading lacks a channel
/// that has a range, and with [`SourceError::NonFinite`] if a sensor reported
/// NaN or infinity.
pub fn normalize_reading(
    raw: &RawReading,
    ranges: &ChannelRanges,
) -> Result<NormalizedReading, SourceError> {
    let mut normalized = NormalizedReading::default();
    for (channel, range) in ranges.iter() {
        let value = raw.get(channel)?;
        if !value.is_finite() {
            return Err(SourceError::NonFinite { channel, value });
        }
        normalized.insert(channel, normalize(value, range.min, range.max));
    }
    Ok(normalized)
}

/// Compare a normalized reading against `thresholds`.
///
/// A channel breaches when its value is strictly above its threshold. Only
/// thresholded channels contribute to the verdict.
pub fn check_thresholds(
    normalized: &NormalizedReading,
    thresholds: &ThresholdConfig,
) -> Result<BreachResult, SourceError> {
    let mut result = BreachResult::default();

    for (channel, threshold) in thresholds.iter() {
        let value = normalized
            .get(channel)
            .ok_or(SourceError::MissingChannel(channel))?;

        let breached = value > threshold;
        if breached {
            info!(
                channel = %channel,
                value,
                threshold,
                "Sensor breached threshold"
            );
        }

        result.breached |= breached;
        result.channels.insert(channel, breached);
    }

    Ok(result)
}

/// Normalize `raw` and decide whether it breaches.
pub fn evaluate(
    raw: &RawReading,
    ranges: &ChannelRanges,
    thresholds: &ThresholdConfig,
) -> Result<(NormalizedReading, BreachResult), SourceError> {
    let normalized = normalize_reading(raw, ranges)?;
    let breach = check_thresholds(&normalized, thresholds)?;
    Ok((normalized, breach))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Channel;
    use chrono::Utc;

    /// A reading sitting exactly at the middle of every default range.
    fn midpoint_reading(ranges: &ChannelRanges) -> RawReading {
        let mut reading = RawReading::new(Utc::now());
        for (channel, range) in ranges.iter() {
            reading.set(channel, (range.min + range.max) / 2.0);
        }
        reading
    }

    #[test]
    fn test_normalize_endpoints() {
        assert_eq!(normalize(10.0, 10.0, 25.0), 0.0);
        assert_eq!(normalize(25.0, 10.0, 25.0), 1.0);
        assert_eq!(normalize(17.5, 10.0, 25.0), 0.5);
    }

    #[test]
    fn test_normalize_is_affine() {
        let (min, max) = (50.0, 200.0);
        let a = normalize(80.0, min, max);
        let b = normalize(140.0, min, max);
        let mid = normalize(110.0, min, max);
        assert!((mid - (a + b) / 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_normalize_out_of_range_is_unbounded() {
        assert!(normalize(30.0, 10.0, 25.0) > 1.0);
        assert!(normalize(0.0, 10.0, 25.0) < 0.0);
    }

    #[test]
    fn test_normalize_degenerate_range() {
        for value in [-100.0, 0.0, 3.0, 1e9] {
            assert_eq!(normalize(value, 3.0, 3.0), 0.0);
        }
    }

    #[test]
    fn test_in_range_reading_does_not_breach() {
        let ranges = ChannelRanges::default();
        let thresholds = ThresholdConfig::default();

        let (normalized, result) =
            evaluate(&midpoint_reading(&ranges), &ranges, &thresholds).unwrap();

        assert_eq!(normalized.len(), 6);
        assert!(!result.breached);
        assert_eq!(result.channels.len(), 3);
        assert!(result.channels.values().all(|b| !b));
    }

    #[test]
    fn test_single_channel_above_max_flips_verdict() {
        let ranges = ChannelRanges::default();
        let thresholds = ThresholdConfig::default();

        for channel in [Channel::Temperature, Channel::WaterLevel, Channel::WaterFlow] {
            let range = ranges.get(channel).unwrap();
            let mut reading = midpoint_reading(&ranges);
            reading.set(channel, range.max + 1.0);

            let (_, result) = evaluate(&reading, &ranges, &thresholds).unwrap();

            assert!(result.breached, "{channel} above max should breach");
            assert_eq!(result.breached_channels().collect::<Vec<_>>(), vec![channel]);
        }
    }

    #[test]
    fn test_unthresholded_channels_never_breach() {
        let ranges = ChannelRanges::default();
        let thresholds = ThresholdConfig::default();

        let mut reading = midpoint_reading(&ranges);
        reading.set(Channel::Vibration, 1_000.0);
        reading.set(Channel::Rainfall, 1_000.0);
        reading.set(Channel::WaterPressure, 1_000.0);

        let (normalized, result) = evaluate(&reading, &ranges, &thresholds).unwrap();

        assert!(normalized.get(Channel::Rainfall).unwrap() > 1.0);
        assert!(!result.breached);
        assert!(!result.channels.contains_key(&Channel::Rainfall));
    }

    #[test]
    fn test_threshold_comparison_is_strict() {
        let ranges = ChannelRanges::default();
        let thresholds = ThresholdConfig::new([(Channel::Temperature, 0.5)]);

        let mut reading = midpoint_reading(&ranges);
        reading.set(Channel::Temperature, 17.5);

        let (_, result) = evaluate(&reading, &ranges, &thresholds).unwrap();
        assert!(!result.breached);
    }

    #[test]
    fn test_missing_channel_fails_evaluation() {
        let ranges = ChannelRanges::default();
        let thresholds = ThresholdConfig::default();
        let reading = RawReading::new(Utc::now()).with(Channel::Temperature, 12.0);

        let err = evaluate(&reading, &ranges, &thresholds).unwrap_err();
        assert!(matches!(err, SourceError::MissingChannel(_)));
    }

    #[test]
    fn test_non_finite_value_fails_evaluation() {
        let ranges = ChannelRanges::default();
        let thresholds = ThresholdConfig::default();

        for value in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let mut reading = midpoint_reading(&ranges);
            reading.set(Channel::WaterLevel, value);

            let err = evaluate(&reading, &ranges, &thresholds).unwrap_err();
            assert!(matches!(
                err,
                SourceError::NonFinite {
                    channel: Channel::WaterLevel,
                    ..
                }
            ));
        }
    }

    #[test]
    fn test_non_finite_unthresholded_channel_also_fails() {
        let ranges = ChannelRanges::default();
        let mut reading = midpoint_reading(&ranges);
        reading.set(Channel::Rainfall, f64::NAN);

        assert!(normalize_reading(&reading, &ranges).is_err());
    }
}
