use crate::sensors::units::Quantity;
use thiserror::Error as ThisError;

/// Problems found while normalizing a single source reading.
///
/// None of these are fatal: the sensor logs them and either drops the
/// reading (slot becomes absent) or keeps using it.
#[derive(ThisError, Debug, Clone, PartialEq)]
pub enum ReadingError {
    #[error("Unable to parse sensor {quantity}: {value}")]
    Parse { quantity: Quantity, value: String },

    #[error("Unsupported {quantity} sensor unit: {unit} (allowed: {allowed})")]
    UnsupportedUnit {
        quantity: Quantity,
        unit: String,
        allowed: &'static str,
    },

    #[error("Humidity sensor out of range: {value} (allowed: 0-100%)")]
    OutOfRange { value: f64 },
}

#[derive(ThisError, Debug)]
pub enum BridgeError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("MQTT client error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),

    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    SerdeJsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
