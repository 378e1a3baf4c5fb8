//! Dew point sensor derived from a temperature and a humidity source.
//!
//! The dew point is estimated with the Magnus approximation. The sensor is
//! purely push-driven: it recomputes whenever one of its sources changes and
//! notifies the host when its output moves.

use super::reading::Reading;
use super::units::{self, TEMP_CELSIUS, UnitSystem};
use super::{NotifiableSensor, Sensor, SensorState, StateNotifier};
use crate::host::StateLookup;
use chrono::Utc;
use log::debug;
use serde_json::Map;

pub const DEFAULT_NAME: &str = "Dew Point";

pub const MAGNUS_K2: f64 = 17.62;
pub const MAGNUS_K3: f64 = 243.12;

/// Reported when humidity is 0%, where the dew point is undefined.
pub const DRY_AIR_DEW_POINT: f64 = -50.0;

/// Dew point in °C for a temperature in °C and a relative humidity in %.
pub fn dew_point(temperature: f64, humidity: f64) -> f64 {
    if humidity == 0.0 {
        return DRY_AIR_DEW_POINT;
    }

    let alpha = MAGNUS_K2 * temperature / (MAGNUS_K3 + temperature);
    let beta = MAGNUS_K2 * MAGNUS_K3 / (MAGNUS_K3 + temperature);
    let ln_rh = (humidity / 100.0).ln();

    MAGNUS_K3 * (alpha + ln_rh) / (beta - ln_rh)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Derived dew point sensor.
///
/// Owns one slot per source. The output is only recomputed when both slots
/// hold a value; otherwise it keeps whatever it last computed.
pub struct DewPointSensor {
    name: String,
    temperature_source: String,
    humidity_source: String,
    unit_system: UnitSystem,
    /// Last valid temperature in °C
    temperature: Option<f64>,
    /// Last valid relative humidity in %
    humidity: Option<f64>,
    /// Unrounded dew point in °C
    state: Option<f64>,
    version: u32,
    notifier: Option<StateNotifier>,
}

impl DewPointSensor {
    /// Create the sensor and seed it from the sources' current states.
    ///
    /// The caller is expected to have subscribed to both sources already so
    /// no change between the lookup and the subscription is lost.
    pub fn new(
        name: impl Into<String>,
        temperature_source: impl Into<String>,
        humidity_source: impl Into<String>,
        unit_system: UnitSystem,
        lookup: &impl StateLookup,
    ) -> Self {
        let mut sensor = Self {
            name: name.into(),
            temperature_source: temperature_source.into(),
            humidity_source: humidity_source.into(),
            unit_system,
            temperature: None,
            humidity: None,
            state: None,
            version: 0,
            notifier: None,
        };

        if let Some(state) = lookup.get(&sensor.temperature_source) {
            sensor.temperature = Self::read_temperature(&state.reading());
        }
        if let Some(state) = lookup.get(&sensor.humidity_source) {
            sensor.humidity = Self::read_humidity(&state.reading());
        }

        sensor.update();
        sensor
    }

    fn read_temperature(reading: &Reading) -> Option<f64> {
        units::normalize_temperature(reading).logged(&reading.entity_id)
    }

    fn read_humidity(reading: &Reading) -> Option<f64> {
        units::normalize_humidity(reading).logged(&reading.entity_id)
    }

    /// Source entity ids this sensor depends on.
    pub fn watched_sources(&self) -> [&str; 2] {
        [
            self.temperature_source.as_str(),
            self.humidity_source.as_str(),
        ]
    }

    /// Recompute the output from the current slots.
    ///
    /// Does nothing while either slot is empty. Returns true if the output
    /// changed.
    pub fn update(&mut self) -> bool {
        let (Some(temperature), Some(humidity)) = (self.temperature, self.humidity) else {
            return false;
        };

        let value = dew_point(temperature, humidity);
        debug!("{}: {:.3} {}", self.name, value, TEMP_CELSIUS);

        // Bitwise so a repeated NaN output does not count as a change
        let changed = self.state.map(f64::to_bits) != Some(value.to_bits());
        self.state = Some(value);
        if changed {
            self.version = self.version.wrapping_add(1);
        }
        changed
    }

    /// Handle a change of one of the watched sources.
    ///
    /// `None` means the source has no state anymore and is ignored. Returns
    /// true if the output changed and the host was notified.
    pub fn on_source_changed(&mut self, entity_id: &str, new_reading: Option<&Reading>) -> bool {
        let Some(reading) = new_reading else {
            return false;
        };

        if entity_id == self.temperature_source {
            self.temperature = Self::read_temperature(reading);
        } else if entity_id == self.humidity_source {
            self.humidity = Self::read_humidity(reading);
        } else {
            debug!(
                "{}: ignoring change of unrelated entity {}",
                self.name, entity_id
            );
            return false;
        }

        if !self.update() {
            return false;
        }

        if let Some(notifier) = &self.notifier {
            debug!("{}: notifying {}", self.name, notifier.entity_id());
            notifier.notify(self.snapshot());
        }
        true
    }

    /// Current dew point in °C rounded to two decimals, `None` until the
    /// first successful computation.
    pub fn state(&self) -> Option<f64> {
        self.state.map(round2)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn unit_of_measurement(&self) -> &'static str {
        TEMP_CELSIUS
    }

    pub fn state_attributes(&self) -> Map<String, serde_json::Value> {
        Map::new()
    }

    /// The host never polls this sensor; it only reacts to source changes.
    pub fn should_poll(&self) -> bool {
        false
    }

    pub fn unit_system(&self) -> UnitSystem {
        self.unit_system
    }

    pub fn temperature(&self) -> Option<f64> {
        self.temperature
    }

    pub fn humidity(&self) -> Option<f64> {
        self.humidity
    }

    pub fn snapshot(&self) -> SensorState {
        SensorState {
            name: self.name.clone(),
            state: self.state(),
            unit_of_measurement: self.unit_of_measurement(),
            attributes: self.state_attributes(),
            version: self.version,
            last_updated: Utc::now(),
        }
    }
}

impl Sensor for DewPointSensor {
    fn version(&self) -> u32 {
        self.version
    }
}

impl NotifiableSensor for DewPointSensor {
    fn set_notifier(&mut self, notifier: StateNotifier) {
        self.notifier = Some(notifier);
    }
}
