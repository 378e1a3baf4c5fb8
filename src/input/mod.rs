//! Input sources for the bridge.
//!
//! Input sources feed upstream readings into the host state store.
//!
//! Current input sources:
//! - `mqtt`: zigbee2mqtt climate sensors

pub mod mqtt;
