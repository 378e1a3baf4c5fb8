//! Unit labels and normalization of raw readings into canonical units.
//!
//! Temperatures are normalized to degrees Celsius, humidity to percent.

use super::reading::{Normalized, Reading};
use crate::error::ReadingError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum::{Display, EnumString};

pub const TEMP_CELSIUS: &str = "°C";
pub const TEMP_FAHRENHEIT: &str = "°F";
pub const PERCENTAGE: &str = "%";

/// Physical quantity a source reports.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Quantity {
    Temperature,
    Humidity,
}

/// Temperature units accepted from source sensors.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Display, EnumString)]
pub enum TemperatureUnit {
    #[strum(serialize = "°C")]
    Celsius,
    #[strum(serialize = "°F")]
    Fahrenheit,
}

impl TemperatureUnit {
    /// Convert a value in this unit to degrees Celsius.
    pub fn to_celsius(self, value: f64) -> f64 {
        match self {
            TemperatureUnit::Celsius => value,
            TemperatureUnit::Fahrenheit => fahrenheit_to_celsius(value),
        }
    }
}

/// Measurement system configured for the host.
///
/// Stored by the sensor; the dew point itself is always reported in Celsius.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum UnitSystem {
    #[default]
    Metric,
    Imperial,
}

impl UnitSystem {
    pub fn is_metric(self) -> bool {
        self == UnitSystem::Metric
    }
}

pub fn fahrenheit_to_celsius(fahrenheit: f64) -> f64 {
    (fahrenheit - 32.0) / 1.8
}

/// Normalize a temperature reading to degrees Celsius.
///
/// Non-numeric values and units other than °C/°F yield an absent value.
pub fn normalize_temperature(reading: &Reading) -> Normalized {
    let value = match reading.numeric(Quantity::Temperature) {
        Ok(value) => value,
        Err(e) => return Normalized::absent(e),
    };

    let unit = reading
        .unit
        .as_deref()
        .and_then(|unit| TemperatureUnit::from_str(unit).ok());

    match unit {
        Some(unit) => Normalized::value(unit.to_celsius(value)),
        None => Normalized::absent(ReadingError::UnsupportedUnit {
            quantity: Quantity::Temperature,
            unit: reading.unit_label().to_string(),
            allowed: "°C, °F",
        }),
    }
}

/// Normalize a humidity reading to percent.
///
/// A unit other than `%` or a value outside 0-100 is reported but the value
/// is still used unchanged.
pub fn normalize_humidity(reading: &Reading) -> Normalized {
    let value = match reading.numeric(Quantity::Humidity) {
        Ok(value) => value,
        Err(e) => return Normalized::absent(e),
    };

    let mut normalized = Normalized::value(value);

    if reading.unit.as_deref() != Some(PERCENTAGE) {
        normalized.issues.push(ReadingError::UnsupportedUnit {
            quantity: Quantity::Humidity,
            unit: reading.unit_label().to_string(),
            allowed: PERCENTAGE,
        });
    }

    if !(0.0..=100.0).contains(&value) {
        normalized.issues.push(ReadingError::OutOfRange { value });
    }

    normalized
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(state: &str, unit: Option<&str>) -> Reading {
        Reading::new("sensor.test", state, unit)
    }

    #[test]
    fn test_fahrenheit_conversion() {
        assert!(fahrenheit_to_celsius(32.0).abs() < 1e-9);
        assert!((fahrenheit_to_celsius(98.6) - 37.0).abs() < 0.01);
        assert!((fahrenheit_to_celsius(-40.0) + 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_temperature_unit_labels() {
        assert_eq!(
            TemperatureUnit::from_str(TEMP_CELSIUS),
            Ok(TemperatureUnit::Celsius)
        );
        assert_eq!(
            TemperatureUnit::from_str(TEMP_FAHRENHEIT),
            Ok(TemperatureUnit::Fahrenheit)
        );
        assert!(TemperatureUnit::from_str("K").is_err());
        assert_eq!(TemperatureUnit::Celsius.to_string(), TEMP_CELSIUS);
    }

    #[test]
    fn test_normalize_celsius_passthrough() {
        let normalized = normalize_temperature(&reading("21.5", Some(TEMP_CELSIUS)));
        assert_eq!(normalized.value, Some(21.5));
        assert!(normalized.issues.is_empty());
    }

    #[test]
    fn test_normalize_fahrenheit() {
        let normalized = normalize_temperature(&reading("32", Some(TEMP_FAHRENHEIT)));
        assert!(normalized.value.unwrap().abs() < 1e-9);

        let normalized = normalize_temperature(&reading("98.6", Some(TEMP_FAHRENHEIT)));
        assert!((normalized.value.unwrap() - 37.0).abs() < 0.01);
    }

    #[test]
    fn test_temperature_unsupported_unit() {
        let normalized = normalize_temperature(&reading("293.15", Some("K")));
        assert_eq!(normalized.value, None);
        assert_eq!(
            normalized.issues,
            vec![ReadingError::UnsupportedUnit {
                quantity: Quantity::Temperature,
                unit: "K".to_string(),
                allowed: "°C, °F",
            }]
        );

        let normalized = normalize_temperature(&reading("20", None));
        assert_eq!(normalized.value, None);
        assert_eq!(normalized.issues.len(), 1);
    }

    #[test]
    fn test_temperature_not_numeric() {
        let normalized = normalize_temperature(&reading("unavailable", Some(TEMP_CELSIUS)));
        assert_eq!(normalized.value, None);
        assert_eq!(
            normalized.issues,
            vec![ReadingError::Parse {
                quantity: Quantity::Temperature,
                value: "unavailable".to_string(),
            }]
        );
    }

    #[test]
    fn test_normalize_humidity() {
        let normalized = normalize_humidity(&reading("45", Some(PERCENTAGE)));
        assert_eq!(normalized.value, Some(45.0));
        assert!(normalized.issues.is_empty());
    }

    #[test]
    fn test_humidity_wrong_unit_still_used() {
        let normalized = normalize_humidity(&reading("45", Some("g/m³")));
        assert_eq!(normalized.value, Some(45.0));
        assert!(matches!(
            normalized.issues.as_slice(),
            [ReadingError::UnsupportedUnit {
                quantity: Quantity::Humidity,
                ..
            }]
        ));
    }

    #[test]
    fn test_humidity_out_of_range_not_clamped() {
        let normalized = normalize_humidity(&reading("150", Some(PERCENTAGE)));
        assert_eq!(normalized.value, Some(150.0));
        assert_eq!(
            normalized.issues,
            vec![ReadingError::OutOfRange { value: 150.0 }]
        );

        let normalized = normalize_humidity(&reading("-3", None));
        assert_eq!(normalized.value, Some(-3.0));
        // Both the unit and the range are reported
        assert_eq!(normalized.issues.len(), 2);
    }

    #[test]
    fn test_humidity_bounds_are_valid() {
        assert!(normalize_humidity(&reading("0", Some(PERCENTAGE))).issues.is_empty());
        assert!(normalize_humidity(&reading("100", Some(PERCENTAGE))).issues.is_empty());
    }

    #[test]
    fn test_humidity_not_numeric() {
        let normalized = normalize_humidity(&reading("unknown", Some(PERCENTAGE)));
        assert_eq!(normalized.value, None);
        assert_eq!(normalized.issues.len(), 1);
    }

    #[test]
    fn test_unit_system_parse() {
        assert_eq!(UnitSystem::from_str("metric"), Ok(UnitSystem::Metric));
        assert_eq!(UnitSystem::from_str("Imperial"), Ok(UnitSystem::Imperial));
        assert!(UnitSystem::default().is_metric());
    }
}
