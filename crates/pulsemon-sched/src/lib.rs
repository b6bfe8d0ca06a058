//! pulsemon-sched — periodic probe scheduling.
//!
//! One tokio task per declared (service, check) drives the probe
//! engine at the service's cadence, with pause/resume, on-demand
//! triggering, and graceful drain on stop.

mod error;
mod scheduler;

pub use error::{SchedResult, SchedulerError};
pub use scheduler::{JobStatus, Scheduler};
