//! Raw source readings and their normalized form.

use super::units::Quantity;
use crate::error::ReadingError;
use log::error;

/// A single value reported by an upstream source.
///
/// The state is kept as text since sources report values such as
/// `"unavailable"` alongside numbers.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub entity_id: String,
    pub state: String,
    pub unit: Option<String>,
}

impl Reading {
    pub fn new(entity_id: impl Into<String>, state: impl Into<String>, unit: Option<&str>) -> Self {
        Self {
            entity_id: entity_id.into(),
            state: state.into(),
            unit: unit.map(str::to_string),
        }
    }

    /// Parse the state as a number.
    pub fn numeric(&self, quantity: Quantity) -> Result<f64, ReadingError> {
        self.state
            .trim()
            .parse::<f64>()
            .map_err(|_| ReadingError::Parse {
                quantity,
                value: self.state.clone(),
            })
    }

    /// Unit label for log messages.
    pub fn unit_label(&self) -> &str {
        self.unit.as_deref().unwrap_or("none")
    }
}

/// Result of normalizing a [`Reading`] into a canonical unit.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Normalized {
    /// Value in the canonical unit, `None` if the reading was rejected.
    pub value: Option<f64>,
    /// Non-fatal problems found along the way.
    pub issues: Vec<ReadingError>,
}

impl Normalized {
    pub fn value(value: f64) -> Self {
        Self {
            value: Some(value),
            issues: Vec::new(),
        }
    }

    pub fn absent(issue: ReadingError) -> Self {
        Self {
            value: None,
            issues: vec![issue],
        }
    }

    /// Log every issue and hand back the value.
    pub fn logged(self, entity_id: &str) -> Option<f64> {
        for issue in &self.issues {
            error!("{} ({})", issue, entity_id);
        }
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_parse() {
        let reading = Reading::new("sensor.t", " 21.25 ", Some("°C"));
        assert_eq!(reading.numeric(Quantity::Temperature), Ok(21.25));

        let reading = Reading::new("sensor.t", "unavailable", Some("°C"));
        assert_eq!(
            reading.numeric(Quantity::Temperature),
            Err(ReadingError::Parse {
                quantity: Quantity::Temperature,
                value: "unavailable".to_string(),
            })
        );
    }

    #[test]
    fn test_unit_label() {
        assert_eq!(Reading::new("sensor.h", "40", Some("%")).unit_label(), "%");
        assert_eq!(Reading::new("sensor.h", "40", None).unit_label(), "none");
    }

    #[test]
    fn test_logged_returns_value() {
        let normalized = Normalized {
            value: Some(150.0),
            issues: vec![ReadingError::OutOfRange { value: 150.0 }],
        };
        assert_eq!(normalized.logged("sensor.h"), Some(150.0));
        assert_eq!(
            Normalized::absent(ReadingError::OutOfRange { value: 1.0 }).logged("sensor.h"),
            None
        );
    }
}
