use crate::error::{BridgeError, Result};
use crate::sensors::dew_point::DEFAULT_NAME;
use crate::sensors::units::UnitSystem;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Load environment variables from .env file with robust parsing.
/// Handles values with spaces without requiring quotes.
pub fn load_dotenv() {
    let env_path = Path::new(".env");
    if !env_path.exists() {
        return;
    }

    let content = match fs::read_to_string(env_path) {
        Ok(c) => c,
        Err(_) => return,
    };

    for (key, value) in parse_dotenv(&content) {
        // Only set if not already set (env vars take precedence)
        if std::env::var(key).is_err() {
            // SAFETY: We're single-threaded at this point (called before any async runtime)
            unsafe { std::env::set_var(key, value) };
        }
    }
}

fn parse_dotenv(content: &str) -> Vec<(&str, &str)> {
    let mut pairs = Vec::new();

    for line in content.lines() {
        let line = line.trim();

        // Skip empty lines and comments
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some((key, value)) = line.split_once('=') {
            let mut value = value.trim();

            // Remove surrounding quotes if present
            if value.len() >= 2
                && ((value.starts_with('"') && value.ends_with('"'))
                    || (value.starts_with('\'') && value.ends_with('\'')))
            {
                value = &value[1..value.len() - 1];
            }

            pairs.push((key.trim(), value));
        }
    }

    pairs
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub dew_point: DewPointConfig,
    pub mqtt: MqttConfig,
    pub unit_system: UnitSystem,
}

/// Dew point sensor configuration.
///
/// Both source ids are required; the name defaults to "Dew Point".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DewPointConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(rename = "temp_sensor")]
    pub temperature_sensor: String,
    pub humidity_sensor: String,
    /// MQTT topic the dew point is published to. Derived from the name if unset.
    #[serde(default)]
    pub state_topic: Option<String>,
}

fn default_name() -> String {
    DEFAULT_NAME.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttConfig {
    pub broker_host: String,
    pub broker_port: u16,
    pub client_id: String,
    /// zigbee2mqtt base topic devices publish under
    pub base_topic: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl DewPointConfig {
    pub fn new(
        name: impl Into<String>,
        temperature_sensor: impl Into<String>,
        humidity_sensor: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            temperature_sensor: temperature_sensor.into(),
            humidity_sensor: humidity_sensor.into(),
            state_topic: None,
        }
    }

    /// Load the sensor section from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the sensor cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.temperature_sensor.trim().is_empty() {
            return Err(BridgeError::InvalidConfig(
                "temp_sensor must name an entity".to_string(),
            ));
        }
        if self.humidity_sensor.trim().is_empty() {
            return Err(BridgeError::InvalidConfig(
                "humidity_sensor must name an entity".to_string(),
            ));
        }
        if self.name.trim().is_empty() {
            return Err(BridgeError::InvalidConfig(
                "name must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Host entity id of the sensor, e.g. `sensor.dew_point`.
    pub fn entity_id(&self) -> String {
        format!("sensor.{}", slugify(&self.name))
    }

    /// MQTT topic the sensor state is published to.
    pub fn state_topic(&self) -> String {
        self.state_topic
            .clone()
            .unwrap_or_else(|| format!("dew_point/{}/state", slugify(&self.name)))
    }
}

/// Lowercase, with runs of non-alphanumerics collapsed to `_`.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.trim().chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('_') {
            slug.push('_');
        }
    }
    while slug.ends_with('_') {
        slug.pop();
    }
    slug
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dew_point: DewPointConfig {
                name: default_name(),
                temperature_sensor: "Living-Room-Climate.temperature".to_string(),
                humidity_sensor: "Living-Room-Climate.humidity".to_string(),
                state_topic: None,
            },
            mqtt: MqttConfig {
                broker_host: "localhost".to_string(),
                broker_port: 1883,
                client_id: "dew-point-bridge".to_string(),
                base_topic: "zigbee2mqtt".to_string(),
                username: None,
                password: None,
            },
            unit_system: UnitSystem::Metric,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build the configuration from defaults overridden by `var(key)`.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        // Dew point sensor
        if let Some(name) = var("DEW_POINT_NAME") {
            config.dew_point.name = name;
        }
        if let Some(source) = var("DEW_POINT_TEMPERATURE_SOURCE") {
            config.dew_point.temperature_sensor = source;
        }
        if let Some(source) = var("DEW_POINT_HUMIDITY_SOURCE") {
            config.dew_point.humidity_sensor = source;
        }
        if let Some(topic) = var("DEW_POINT_OUTPUT_TOPIC") {
            config.dew_point.state_topic = Some(topic);
        }
        if let Some(system) = var("UNIT_SYSTEM")
            && let Ok(s) = system.parse()
        {
            config.unit_system = s;
        }

        // MQTT configuration
        if let Some(host) = var("MQTT_BROKER_HOST") {
            config.mqtt.broker_host = host;
        }
        if let Some(port) = var("MQTT_BROKER_PORT")
            && let Ok(p) = port.parse()
        {
            config.mqtt.broker_port = p;
        }
        if let Some(client_id) = var("MQTT_CLIENT_ID") {
            config.mqtt.client_id = client_id;
        }
        if let Some(base_topic) = var("MQTT_BASE_TOPIC") {
            config.mqtt.base_topic = base_topic;
        }
        if let Some(username) = var("MQTT_USERNAME") {
            config.mqtt.username = Some(username);
        }
        if let Some(password) = var("MQTT_PASSWORD") {
            config.mqtt.password = Some(password);
        }

        config
    }
}
