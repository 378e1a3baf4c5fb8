//! In-process entity state store.
//!
//! Holds the latest state of every known entity and delivers change records
//! to subscribers over channels, one record at a time, in the order the
//! changes were applied.

use super::StateLookup;
use crate::sensors::Reading;
use chrono::{DateTime, Utc};
use log::debug;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::mpsc;

/// Latest known state of one entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityState {
    pub entity_id: String,
    pub state: String,
    pub unit_of_measurement: Option<String>,
    pub last_changed: DateTime<Utc>,
}

impl EntityState {
    /// View this state as a sensor reading.
    pub fn reading(&self) -> Reading {
        Reading::new(
            self.entity_id.clone(),
            self.state.clone(),
            self.unit_of_measurement.as_deref(),
        )
    }
}

/// A change of one entity. Either side is `None` when the entity was added
/// or removed.
#[derive(Debug, Clone, PartialEq)]
pub struct StateChange {
    pub entity_id: String,
    pub old_state: Option<EntityState>,
    pub new_state: Option<EntityState>,
}

struct Subscription {
    entity_ids: Vec<String>,
    tx: mpsc::UnboundedSender<StateChange>,
}

/// Thread-safe entity state store with change subscriptions.
///
/// # Example
/// ```ignore
/// let store = StateStore::new();
/// let mut changes = store.track_state_change(&["sensor.temperature"]);
/// store.set("sensor.temperature", "21.5", Some("°C"));
/// let change = changes.recv().await;
/// ```
#[derive(Default)]
pub struct StateStore {
    states: RwLock<HashMap<String, EntityState>>,
    subscriptions: RwLock<Vec<Subscription>>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the state of an entity.
    ///
    /// Returns false (and notifies nobody) if neither the state nor the unit
    /// changed.
    pub fn set(&self, entity_id: &str, state: &str, unit: Option<&str>) -> bool {
        // Held across dispatch so subscribers see changes in apply order
        let mut states = self.states.write();
        let old_state = states.get(entity_id).cloned();

        if let Some(old) = &old_state
            && old.state == state
            && old.unit_of_measurement.as_deref() == unit
        {
            return false;
        }

        let new_state = EntityState {
            entity_id: entity_id.to_string(),
            state: state.to_string(),
            unit_of_measurement: unit.map(str::to_string),
            last_changed: Utc::now(),
        };
        states.insert(entity_id.to_string(), new_state.clone());

        debug!(
            "State of {} set to {} {}",
            entity_id,
            state,
            unit.unwrap_or("")
        );
        self.dispatch(StateChange {
            entity_id: entity_id.to_string(),
            old_state,
            new_state: Some(new_state),
        });
        true
    }

    /// Remove an entity. Subscribers see a change with no new state.
    pub fn remove(&self, entity_id: &str) -> Option<EntityState> {
        let mut states = self.states.write();
        let old_state = states.remove(entity_id)?;

        self.dispatch(StateChange {
            entity_id: entity_id.to_string(),
            old_state: Some(old_state.clone()),
            new_state: None,
        });
        Some(old_state)
    }

    /// Subscribe to changes of the given entities.
    ///
    /// Changes are delivered in the order they were applied to the store.
    pub fn track_state_change(
        &self,
        entity_ids: &[&str],
    ) -> mpsc::UnboundedReceiver<StateChange> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscriptions.write().push(Subscription {
            entity_ids: entity_ids.iter().map(|id| id.to_string()).collect(),
            tx,
        });
        rx
    }

    /// Ids of all entities that currently have a state.
    pub fn entity_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.states.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    fn dispatch(&self, change: StateChange) {
        let mut subscriptions = self.subscriptions.write();
        // Subscribers whose receiver is gone are dropped here
        subscriptions.retain(|sub| {
            if !sub.entity_ids.iter().any(|id| *id == change.entity_id) {
                return !sub.tx.is_closed();
            }
            sub.tx.send(change.clone()).is_ok()
        });
    }
}

impl StateLookup for StateStore {
    fn get(&self, entity_id: &str) -> Option<EntityState> {
        self.states.read().get(entity_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get() {
        let store = StateStore::new();
        assert!(store.get("sensor.t").is_none());

        assert!(store.set("sensor.t", "21.5", Some("°C")));
        let state = store.get("sensor.t").unwrap();
        assert_eq!(state.state, "21.5");
        assert_eq!(state.unit_of_measurement.as_deref(), Some("°C"));

        let reading = state.reading();
        assert_eq!(reading.entity_id, "sensor.t");
        assert_eq!(reading.unit.as_deref(), Some("°C"));
    }

    #[test]
    fn test_unchanged_state_is_not_dispatched() {
        let store = StateStore::new();
        let mut rx = store.track_state_change(&["sensor.t"]);

        assert!(store.set("sensor.t", "21.5", Some("°C")));
        assert!(!store.set("sensor.t", "21.5", Some("°C")));
        // Unit change alone counts
        assert!(store.set("sensor.t", "21.5", Some("°F")));

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_subscription_filters_entities() {
        let store = StateStore::new();
        let mut rx = store.track_state_change(&["sensor.t", "sensor.h"]);

        store.set("sensor.t", "20", Some("°C"));
        store.set("sensor.other", "1", None);
        store.set("sensor.h", "45", Some("%"));

        let first = rx.try_recv().unwrap();
        assert_eq!(first.entity_id, "sensor.t");
        assert!(first.old_state.is_none());

        let second = rx.try_recv().unwrap();
        assert_eq!(second.entity_id, "sensor.h");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_change_carries_old_state() {
        let store = StateStore::new();
        store.set("sensor.t", "20", Some("°C"));
        let mut rx = store.track_state_change(&["sensor.t"]);

        store.set("sensor.t", "21", Some("°C"));
        let change = rx.try_recv().unwrap();
        assert_eq!(change.old_state.unwrap().state, "20");
        assert_eq!(change.new_state.unwrap().state, "21");
    }

    #[test]
    fn test_remove_dispatches_empty_new_state() {
        let store = StateStore::new();
        store.set("sensor.t", "20", Some("°C"));
        let mut rx = store.track_state_change(&["sensor.t"]);

        assert!(store.remove("sensor.t").is_some());
        assert!(store.remove("sensor.t").is_none());

        let change = rx.try_recv().unwrap();
        assert!(change.new_state.is_none());
        assert!(store.get("sensor.t").is_none());
    }

    #[test]
    fn test_closed_subscription_is_dropped() {
        let store = StateStore::new();
        let rx = store.track_state_change(&["sensor.t"]);
        drop(rx);

        store.set("sensor.t", "20", Some("°C"));
        assert!(store.subscriptions.read().is_empty());
        assert_eq!(store.entity_ids(), vec!["sensor.t".to_string()]);
    }
}
