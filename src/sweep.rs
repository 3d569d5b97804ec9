//! Device sweep loop.
//!
//! A sweep visits the registry in order. For each device it samples the
//! source, evaluates the reading, forwards the normalized values to the
//! telemetry sink and, on a breach, notifies the alert sink once.
//!
//! Two independent policies shape a run:
//!
//! - [`Continuation`]: stop at the first breach, or visit every device
//! - [`Repeat`]: return after one pass, or keep sweeping with a pause
//!
//! Source and sink failures are logged and the sweep moves to the next
//! device. Pacing sleeps race a [`CancellationToken`], so a continuous run
//! stops at its next suspension point once the token fires.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::MonitorConfig;
use crate::error::SinkError;
use crate::evaluation::evaluate;
use crate::model::{Device, DeviceBreach, SweepOutcome};
use crate::sinks::{AlertSink, FLOOD_ALERT_MESSAGE, TelemetrySink};
use crate::source::SensorSource;

/// What a sweep does after a breach.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Continuation {
    /// Return as soon as a device breaches.
    StopAtFirst,
    /// Keep going until every device has been visited.
    ContinueAll,
}

/// What a run does after a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Repeat {
    /// Return the outcome of one sweep.
    SingleShot,
    /// Pause and sweep again until cancelled.
    Continuous,
}

/// Continuation and repeat policy of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepMode {
    pub continuation: Continuation,
    pub repeat: Repeat,
}

impl SweepMode {
    /// One pass that reports the first breach. Used by `GET /monitor/`.
    pub const ON_DEMAND: SweepMode = SweepMode {
        continuation: Continuation::StopAtFirst,
        repeat: Repeat::SingleShot,
    };

    /// Full passes forever. Used by the background worker.
    pub const BACKGROUND: SweepMode = SweepMode {
        continuation: Continuation::ContinueAll,
        repeat: Repeat::Continuous,
    };
}

/// Drives sampling, evaluation and sink calls over the device registry.
pub struct DeviceSweepLoop {
    config: Arc<MonitorConfig>,
    source: Arc<dyn SensorSource>,
    telemetry: Arc<dyn TelemetrySink>,
    alerts: Arc<dyn AlertSink>,
    background_started: AtomicBool,
}

impl DeviceSweepLoop {
    pub fn new(
        config: Arc<MonitorConfig>,
        source: Arc<dyn SensorSource>,
        telemetry: Arc<dyn TelemetrySink>,
        alerts: Arc<dyn AlertSink>,
    ) -> Self {
        Self {
            config,
            source,
            telemetry,
            alerts,
            background_started: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Run according to `mode`.
    ///
    /// Single-shot runs return their outcome. Continuous runs only return
    /// once `cancel` fires, and then yield `None`.
    pub async fn run(&self, mode: SweepMode, cancel: &CancellationToken) -> Option<SweepOutcome> {
        match mode.repeat {
            Repeat::SingleShot => Some(self.sweep(mode.continuation, cancel).await),
            Repeat::Continuous => {
                self.run_continuous(mode.continuation, cancel).await;
                None
            }
        }
    }

    /// Spawn the continuous worker on the current runtime.
    ///
    /// Only the first call per loop spawns; later calls return `None`.
    pub fn spawn_background(
        self: &Arc<Self>,
        continuation: Continuation,
        cancel: CancellationToken,
    ) -> Option<JoinHandle<()>> {
        if self.background_started.swap(true, Ordering::SeqCst) {
            warn!("Background monitoring already running, not starting another");
            return None;
        }

        let sweeper = Arc::clone(self);
        let mode = SweepMode {
            continuation,
            repeat: Repeat::Continuous,
        };
        Some(tokio::spawn(async move {
            sweeper.run(mode, &cancel).await;
        }))
    }

    /// One pass over the registry.
    pub async fn sweep(
        &self,
        continuation: Continuation,
        cancel: &CancellationToken,
    ) -> SweepOutcome {
        let mut outcome = SweepOutcome::default();

        for device in &self.config.devices {
            if cancel.is_cancelled() {
                outcome.interrupted = true;
                break;
            }
            outcome.devices_visited += 1;

            if let Some(breach) = self.step(device).await {
                outcome.record_breach(breach);
                if continuation == Continuation::StopAtFirst {
                    return outcome;
                }
            }

            if !pause(self.config.timing.device_delay, cancel).await {
                outcome.interrupted = true;
                break;
            }
        }

        outcome
    }

    /// Send an alert for `device`, bypassing evaluation.
    pub async fn send_alert(&self, device: &Device, message: &str) -> Result<(), SinkError> {
        self.alerts
            .notify(device.id, device.latitude, device.longitude, message)
            .await
    }

    async fn run_continuous(&self, continuation: Continuation, cancel: &CancellationToken) {
        info!(
            devices = self.config.devices.len(),
            device_delay_secs = self.config.timing.device_delay.as_secs_f64(),
            repeat_pause_secs = self.config.timing.repeat_pause.as_secs_f64(),
            "Starting continuous monitoring"
        );

        let mut pass: u64 = 0;
        loop {
            pass += 1;
            let outcome = self.sweep(continuation, cancel).await;
            info!(
                pass,
                devices_visited = outcome.devices_visited,
                breaches = outcome.breaches.len(),
                "Sweep finished"
            );

            if outcome.interrupted || !pause(self.config.timing.repeat_pause, cancel).await {
                break;
            }
        }

        info!(passes = pass, "Continuous monitoring stopped");
    }

    /// Sample, evaluate and report one device. Returns the breach, if any.
    async fn step(&self, device: &Device) -> Option<DeviceBreach> {
        let raw = match self.source.sample(device.id).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(device_id = device.id, error = %e, "Sensor sample failed, skipping device");
                return None;
            }
        };

        let (normalized, result) =
            match evaluate(&raw, &self.config.ranges, &self.config.thresholds) {
                Ok(evaluated) => evaluated,
                Err(e) => {
                    warn!(device_id = device.id, error = %e, "Unusable reading, skipping device");
                    return None;
                }
            };

        if let Err(e) = self.telemetry.push(device.id, &normalized).await {
            warn!(device_id = device.id, error = %e, "Telemetry push failed");
        }

        if !result.breached {
            debug!(device_id = device.id, "Reading within thresholds");
            return None;
        }

        info!(
            device_id = device.id,
            "Threshold breached, calling flood alert"
        );
        if let Err(e) = self.send_alert(device, FLOOD_ALERT_MESSAGE).await {
            warn!(device_id = device.id, error = %e, "Flood alert failed");
        }

        Some(DeviceBreach {
            device_id: device.id,
            location: device.location(),
            channels: result.breached_channels().collect(),
        })
    }
}

/// Sleep for `duration` unless cancelled first. Returns `false` on cancellation.
async fn pause(duration: Duration, cancel: &CancellationToken) -> bool {
    if duration.is_zero() {
        tokio::task::yield_now().await;
        return !cancel.is_cancelled();
    }

    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}
