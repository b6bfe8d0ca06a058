//! pulsemon-state — per-service state machines and alerting.
//!
//! The [`StateRegistry`] consumes heartbeat outcomes and owns every
//! service's authoritative record; the [`AlertCenter`] observes the
//! derived transitions and keeps the bounded alert log.

mod alerts;
mod state;

pub use alerts::{AlertCenter, ALERT_HISTORY_CAP};
pub use state::{ResponseSample, ServiceHealth, ServiceState, StateRegistry};
