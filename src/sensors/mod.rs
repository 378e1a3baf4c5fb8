//! Derived sensor state.
//!
//! Sensors here read upstream sources through the host, keep their own
//! output, and push changes back to the host through a [`StateNotifier`].
//!
//! All sensors implement the [`Sensor`] trait which provides version tracking
//! for change detection. Sensors that push live updates also implement
//! [`NotifiableSensor`].

pub mod dew_point;
pub mod notifier;
pub mod reading;
pub mod units;

pub use dew_point::DewPointSensor;
pub use notifier::StateNotifier;
pub use reading::{Normalized, Reading};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

/// Trait for sensors with change detection.
///
/// The version number is incremented each time the sensor output changes.
/// Consumers compare versions to decide whether to republish.
pub trait Sensor: Send + Sync {
    /// Get the current version number.
    fn version(&self) -> u32;
}

/// Trait for sensors that push their output to the host when it changes.
pub trait NotifiableSensor: Sensor {
    /// Set the notifier for this sensor.
    ///
    /// Called during host setup to wire the sensor to its state consumers.
    fn set_notifier(&mut self, notifier: StateNotifier);
}

/// Point-in-time view of a sensor as published to the host.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorState {
    pub name: String,
    pub state: Option<f64>,
    pub unit_of_measurement: &'static str,
    pub attributes: Map<String, Value>,
    pub version: u32,
    pub last_updated: DateTime<Utc>,
}
