//! pulsemon-logstore — per-day rolling log persistence.
//!
//! Subscribes to heartbeat and state-change events and maintains one
//! write-through JSON document per `(service, local day)`, with a
//! running summary and retention-based rotation at local midnight.

mod error;
mod rotate;
mod store;

pub use error::{LogResult, LogStoreError};
pub use rotate::run_rotation;
pub use store::{
    sanitize_service_name, DailyLog, DailySummary, EventEntry, HeartbeatEntry, LogStore,
};
