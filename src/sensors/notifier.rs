//! State change notifier for derived sensors.
//!
//! When a derived sensor's output changes, the new state is pushed to the
//! host so dependent observers (the MQTT publisher, other tasks) see it
//! without polling.

use super::SensorState;
use log::warn;
use tokio::sync::mpsc;

/// Pushes sensor state changes to the host.
///
/// # Usage
/// ```ignore
/// let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
/// sensor.set_notifier(StateNotifier::new("sensor.dew_point", tx));
/// // later, in a host task:
/// while let Some(state) = rx.recv().await { /* publish */ }
/// ```
#[derive(Debug, Clone)]
pub struct StateNotifier {
    tx: mpsc::UnboundedSender<SensorState>,
    entity_id: String,
}

impl StateNotifier {
    /// Create a new notifier for the given entity.
    ///
    /// # Arguments
    /// * `entity_id` - Host entity id of the sensor being notified for
    /// * `tx` - Channel the host reads state changes from
    pub fn new(entity_id: impl Into<String>, tx: mpsc::UnboundedSender<SensorState>) -> Self {
        Self {
            tx,
            entity_id: entity_id.into(),
        }
    }

    /// Get the entity ID this notifier is configured for.
    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    /// Push a state change to the host.
    ///
    /// Non-blocking. A closed channel is logged and otherwise ignored.
    pub fn notify(&self, state: SensorState) {
        if self.tx.send(state).is_err() {
            warn!(
                "State consumer for {} is gone, dropping update",
                self.entity_id
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::Map;

    fn state(value: f64) -> SensorState {
        SensorState {
            name: "Dew Point".to_string(),
            state: Some(value),
            unit_of_measurement: "°C",
            attributes: Map::new(),
            version: 1,
            last_updated: Utc::now(),
        }
    }

    #[test]
    fn test_notify_delivers_state() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let notifier = StateNotifier::new("sensor.dew_point", tx);
        assert_eq!(notifier.entity_id(), "sensor.dew_point");

        notifier.notify(state(7.7));
        let received = rx.try_recv().unwrap();
        assert_eq!(received.state, Some(7.7));
    }

    #[test]
    fn test_notify_after_receiver_dropped() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let notifier = StateNotifier::new("sensor.dew_point", tx);
        // Must not panic
        notifier.notify(state(1.0));
    }
}
