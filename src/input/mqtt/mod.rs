//! MQTT input source for zigbee2mqtt device integration.
//!
//! This module provides MQTT client functionality to receive climate sensor
//! readings from zigbee2mqtt and publish derived sensor output.

mod client;
mod integration;

pub use client::{MqttClient, MqttMessage};
pub use integration::{EntityUpdate, MqttIntegration, parse_state_payload, split_source};
