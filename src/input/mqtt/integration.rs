//! MQTT integration between zigbee2mqtt devices and the host state store.
//!
//! Source entities are named `<device>.<field>`, e.g.
//! `Living-Room-Climate.temperature`. Each JSON state message from
//! `<base_topic>/<device>` updates one entity per field. Derived sensor
//! output is published back to the broker as JSON.

use super::client::{MqttClient, MqttMessage, publish_retained};
use crate::config::MqttConfig;
use crate::error::Result;
use crate::host::StateStore;
use crate::sensors::SensorState;
use crate::sensors::units::{PERCENTAGE, TEMP_CELSIUS};
use log::{debug, info, warn};
use rumqttc::{AsyncClient, QoS};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// One entity state extracted from a device payload.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityUpdate {
    pub entity_id: String,
    pub state: String,
    pub unit: Option<&'static str>,
}

/// Split a source entity id into zigbee2mqtt device and payload field.
pub fn split_source(entity_id: &str) -> Option<(&str, &str)> {
    entity_id
        .rsplit_once('.')
        .filter(|(device, field)| !device.is_empty() && !field.is_empty())
}

/// Unit zigbee2mqtt reports a field in.
fn field_unit(field: &str) -> Option<&'static str> {
    if field == "temperature" || field.ends_with("_temperature") {
        Some(TEMP_CELSIUS)
    } else if field == "humidity" || field.ends_with("_humidity") {
        Some(PERCENTAGE)
    } else {
        None
    }
}

/// Turn a device state payload into entity updates.
///
/// Numbers and strings become states as-is, `null` becomes `unavailable`.
/// Nested values and booleans are skipped.
pub fn parse_state_payload(
    device: &str,
    payload: &str,
) -> std::result::Result<Vec<EntityUpdate>, serde_json::Error> {
    let fields: Map<String, Value> = serde_json::from_str(payload)?;

    Ok(fields
        .into_iter()
        .filter_map(|(field, value)| {
            let state = match value {
                Value::Number(n) => n.to_string(),
                Value::String(s) => s,
                Value::Null => "unavailable".to_string(),
                _ => return None,
            };
            Some(EntityUpdate {
                entity_id: format!("{}.{}", device, field),
                unit: field_unit(&field),
                state,
            })
        })
        .collect())
}

/// Derived sensor output to publish.
struct Publisher {
    topic: String,
    updates: mpsc::UnboundedReceiver<SensorState>,
}

/// MQTT Integration orchestrator.
///
/// Manages the MQTT client, device subscriptions and sensor publishing,
/// keeping MQTT internals out of main.rs.
pub struct MqttIntegration {
    config: MqttConfig,
    store: Arc<StateStore>,
    /// Device friendly name -> payload fields requested on startup
    devices: BTreeMap<String, Vec<String>>,
    publishers: Vec<Publisher>,
}

impl MqttIntegration {
    /// Create a new MQTT integration with the given broker config.
    pub fn new(config: MqttConfig, store: Arc<StateStore>) -> Self {
        Self {
            config,
            store,
            devices: BTreeMap::new(),
            publishers: Vec::new(),
        }
    }

    /// Feed the given source entity from its zigbee2mqtt device.
    ///
    /// Ids without a `<device>.<field>` shape are skipped with a warning.
    pub fn with_source(mut self, entity_id: &str) -> Self {
        match split_source(entity_id) {
            Some((device, field)) => {
                let fields = self.devices.entry(device.to_string()).or_default();
                if !fields.iter().any(|f| f == field) {
                    fields.push(field.to_string());
                }
            }
            None => warn!(
                "[MQTT] Source {} is not of the form <device>.<field>, not subscribing",
                entity_id
            ),
        }
        self
    }

    /// Publish sensor state changes to `topic`.
    pub fn with_publisher(
        mut self,
        topic: impl Into<String>,
        updates: mpsc::UnboundedReceiver<SensorState>,
    ) -> Self {
        self.publishers.push(Publisher {
            topic: topic.into(),
            updates,
        });
        self
    }

    /// Device names this integration subscribes to.
    pub fn devices(&self) -> impl Iterator<Item = &str> {
        self.devices.keys().map(String::as_str)
    }

    fn state_topic(&self, device: &str) -> String {
        format!("{}/{}", self.config.base_topic, device)
    }

    /// Apply a broker message to the store. Returns false if the topic does
    /// not belong to a known device.
    pub fn process_message(&self, topic: &str, payload: &str) -> bool {
        let Some(device) = self
            .devices
            .keys()
            .find(|device| self.state_topic(device) == topic)
        else {
            return false;
        };

        match parse_state_payload(device, payload) {
            Ok(updates) => {
                for update in updates {
                    if self
                        .store
                        .set(&update.entity_id, &update.state, update.unit)
                    {
                        debug!("[MQTT] {} = {}", update.entity_id, update.state);
                    }
                }
            }
            Err(e) => {
                warn!("[MQTT] Failed to parse {} state: {}", device, e);
            }
        }
        true
    }

    /// Start the MQTT integration.
    ///
    /// Spawns a background task that connects to the broker, subscribes to
    /// device topics, and routes messages into the store. Returns a
    /// JoinHandle that can be used to abort the task on shutdown.
    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(mut self) {
        info!(
            "[MQTT] Connecting to {}:{}",
            self.config.broker_host, self.config.broker_port
        );

        let mqtt_client = MqttClient::new(&self.config);
        let client = mqtt_client.client();

        let (msg_tx, mut msg_rx) = mpsc::channel::<MqttMessage>(64);
        let (connected_tx, connected_rx) = oneshot::channel();

        // Start MQTT event loop FIRST (so it can establish connection)
        let mqtt_loop = tokio::spawn(async move {
            mqtt_client.run(msg_tx, Some(connected_tx)).await;
        });

        match tokio::time::timeout(Duration::from_secs(10), connected_rx).await {
            Ok(Ok(())) => {
                info!("[MQTT] Connection established, subscribing to topics");
            }
            Ok(Err(_)) => {
                warn!("[MQTT] Connection signal channel dropped");
                return;
            }
            Err(_) => {
                warn!("[MQTT] Connection timeout after 10 seconds");
                mqtt_loop.abort();
                return;
            }
        }

        let publish_tasks: Vec<JoinHandle<()>> = self
            .publishers
            .drain(..)
            .map(|publisher| tokio::spawn(publish_updates(client.clone(), publisher)))
            .collect();

        if let Err(e) = self.subscribe_devices(&client).await {
            warn!("[MQTT] Failed to subscribe to device topics: {}", e);
        }

        info!(
            "[MQTT] Integration started with {} device(s): {}",
            self.devices.len(),
            self.devices().collect::<Vec<_>>().join(", ")
        );

        while let Some(msg) = msg_rx.recv().await {
            self.process_message(&msg.topic, &msg.payload);
        }

        for task in publish_tasks {
            task.abort();
        }
        mqtt_loop.abort();
    }

    async fn subscribe_devices(&self, client: &AsyncClient) -> Result<()> {
        for device in self.devices.keys() {
            client
                .subscribe(self.state_topic(device), QoS::AtMostOnce)
                .await?;
        }

        // Small delay to ensure subscriptions are processed before requesting state
        tokio::time::sleep(Duration::from_millis(100)).await;

        // Battery powered devices sleep; ask for the fields we need explicitly
        for (device, fields) in &self.devices {
            let request: Map<String, Value> = fields
                .iter()
                .map(|field| (field.clone(), Value::String(String::new())))
                .collect();
            let get_topic = format!("{}/get", self.state_topic(device));
            client
                .publish(
                    get_topic,
                    QoS::AtMostOnce,
                    false,
                    serde_json::to_vec(&request)?,
                )
                .await?;
            info!("[MQTT] Requested initial state for {}", device);
        }
        Ok(())
    }
}

async fn publish_updates(client: AsyncClient, mut publisher: Publisher) {
    while let Some(state) = publisher.updates.recv().await {
        let payload = match serde_json::to_string(&state) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("[MQTT] Failed to encode {} state: {}", state.name, e);
                continue;
            }
        };
        if let Err(e) = publish_retained(&client, &publisher.topic, &payload).await {
            warn!("[MQTT] Failed to publish to {}: {:?}", publisher.topic, e);
        }
    }
}
