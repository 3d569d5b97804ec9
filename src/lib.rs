//! Lakewatch - glacial lake flood monitoring.
//!
//! # Overview
//!
//! A fleet of sensor stations below South Lhonak Lake reports temperature,
//! vibration, water level, water flow, rainfall and water pressure. Lakewatch
//! sweeps the stations in order, normalizes each reading against its
//! configured range, forwards the result to ThingSpeak and raises a flood
//! alert whenever a thresholded channel breaches.
//!
//! # Modules
//!
//! - [`model`]: Devices, channels, readings and sweep outcomes
//! - [`config`]: Registry, ranges, thresholds, pacing and sink settings
//! - [`evaluation`]: Normalization and threshold checks
//! - [`source`]: Sensor reading sources
//! - [`sinks`]: Telemetry and alert clients
//! - [`sweep`]: The device sweep loop
//! - [`api`]: HTTP API handlers

pub mod api;
pub mod config;
pub mod error;
pub mod evaluation;
pub mod model;
pub mod sinks;
pub mod source;
pub mod sweep;
