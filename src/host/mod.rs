//! Host side of the bridge.
//!
//! The host owns entity states, delivers change notifications to derived
//! sensors one at a time, and receives their output back.

pub mod platform;
pub mod state;

pub use platform::{DewPointPlatform, run_listener, setup_dew_point};
pub use state::{EntityState, StateChange, StateStore};

/// Point-in-time lookup of entity states.
pub trait StateLookup {
    fn get(&self, entity_id: &str) -> Option<EntityState>;
}
