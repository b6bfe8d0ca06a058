//! pulsemon-events — the event bus and monitor event model.
//!
//! Components communicate exclusively through [`EventBus`]: the probe
//! engine publishes heartbeat outcomes, the state machine republishes
//! derived transitions, and the log store, broadcaster, and alert
//! center observe. Event names are the wire contract; payloads are the
//! typed variants of [`MonitorEvent`].

mod bus;
mod event;

pub use bus::{EventBus, HistoryEntry, SubscriptionId, HISTORY_CAP, HISTORY_DEFAULT_LIMIT};
pub use event::*;
