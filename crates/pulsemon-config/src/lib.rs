//! pulsemon-config — configuration model for the PulseMon daemon.
//!
//! Parses and persists the three config files (`services.json`,
//! `thresholds.json`, `config.json`) and hands out the shared
//! threshold handle the rest of the system classifies against.

mod error;
mod store;
mod types;

pub use error::{ConfigError, ConfigResult};
pub use store::{validate_services, ConfigStore, SharedThresholds};
pub use types::*;
