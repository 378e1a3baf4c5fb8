//! Dew Point Bridge library.
//!
//! This library derives a dew point sensor from a temperature and a humidity
//! source, keeps it up to date as the sources change, and republishes it.

pub mod config;
pub mod error;
pub mod host;
pub mod input;
pub mod sensors;
