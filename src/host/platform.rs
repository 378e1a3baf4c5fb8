//! Wiring of a dew point sensor into the host.

use super::state::{EntityState, StateChange, StateStore};
use crate::config::DewPointConfig;
use crate::sensors::units::UnitSystem;
use crate::sensors::{DewPointSensor, NotifiableSensor, SensorState, StateNotifier};
use log::{debug, info};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// A running dew point sensor.
pub struct DewPointPlatform {
    /// Host entity id of the sensor
    pub entity_id: String,
    /// Shared sensor, read for the current value
    pub sensor: Arc<RwLock<DewPointSensor>>,
    /// Output changes pushed by the sensor
    pub updates: mpsc::UnboundedReceiver<SensorState>,
    /// Listener feeding source changes into the sensor
    pub listener: JoinHandle<()>,
}

/// Subscribe to the configured sources, create the sensor and start feeding
/// it source changes.
///
/// Must be called from within a tokio runtime.
pub fn setup_dew_point(
    store: &StateStore,
    config: &DewPointConfig,
    unit_system: UnitSystem,
) -> DewPointPlatform {
    // Subscribe before the initial read so nothing in between is missed
    let changes = store.track_state_change(&[
        config.temperature_sensor.as_str(),
        config.humidity_sensor.as_str(),
    ]);

    let mut sensor = DewPointSensor::new(
        config.name.clone(),
        config.temperature_sensor.clone(),
        config.humidity_sensor.clone(),
        unit_system,
        store,
    );

    let entity_id = config.entity_id();
    let (tx, updates) = mpsc::unbounded_channel();
    sensor.set_notifier(StateNotifier::new(entity_id.clone(), tx));

    info!(
        "{} set up as {} (temperature: {}, humidity: {}, initial: {:?})",
        config.name,
        entity_id,
        config.temperature_sensor,
        config.humidity_sensor,
        sensor.state()
    );

    let sensor = Arc::new(RwLock::new(sensor));
    let listener = tokio::spawn(run_listener(sensor.clone(), changes));

    DewPointPlatform {
        entity_id,
        sensor,
        updates,
        listener,
    }
}

/// Deliver source changes to the sensor, one at a time, until the
/// subscription closes.
pub async fn run_listener(
    sensor: Arc<RwLock<DewPointSensor>>,
    mut changes: mpsc::UnboundedReceiver<StateChange>,
) {
    while let Some(change) = changes.recv().await {
        let reading = change.new_state.as_ref().map(EntityState::reading);
        sensor
            .write()
            .on_source_changed(&change.entity_id, reading.as_ref());
    }
    debug!("Source subscription closed, listener stopping");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::Sensor;

    fn config() -> DewPointConfig {
        DewPointConfig::new("Dew Point", "sensor.t", "sensor.h")
    }

    #[test]
    fn test_setup_and_live_updates() {
        tokio_test::block_on(async {
            let store = StateStore::new();
            store.set("sensor.t", "20", Some("°C"));

            let mut platform = setup_dew_point(&store, &config(), UnitSystem::Metric);
            assert_eq!(platform.entity_id, "sensor.dew_point");
            assert_eq!(platform.sensor.read().state(), None);

            store.set("sensor.h", "45", Some("%"));
            let update = platform.updates.recv().await.unwrap();
            assert_eq!(update.state, Some(7.7));
            assert_eq!(platform.sensor.read().state(), Some(7.7));

            platform.listener.abort();
        });
    }

    #[test]
    fn test_listener_applies_changes_in_order() {
        let store = StateStore::new();
        let sensor = Arc::new(RwLock::new(DewPointSensor::new(
            "Dew Point",
            "sensor.t",
            "sensor.h",
            UnitSystem::Metric,
            &store,
        )));

        let changes = store.track_state_change(&["sensor.t", "sensor.h"]);
        store.set("sensor.t", "20", Some("°C"));
        store.set("sensor.h", "45", Some("%"));
        store.set("sensor.h", "unavailable", Some("%"));
        store.remove("sensor.t");
        // Closing the store's side ends the listener
        drop(store);

        tokio_test::block_on(run_listener(sensor.clone(), changes));

        let sensor = sensor.read();
        assert_eq!(sensor.state(), Some(7.7));
        assert_eq!(sensor.temperature(), Some(20.0));
        assert_eq!(sensor.humidity(), None);
        assert_eq!(sensor.version(), 1);
    }
}
