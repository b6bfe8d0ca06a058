//! pulsemon-probe — probe execution for PulseMon.
//!
//! Three pluggable strategies speak the same contract, the evaluator
//! classifies latencies against the shared thresholds, and the engine
//! wraps each invocation in heartbeat lifecycle events.

mod engine;
mod evaluate;
mod strategy;

pub use engine::ProbeEngine;
pub use evaluate::evaluate;
pub use strategy::{
    AuthenticatedStrategy, BasicStrategy, ProbeStrategy, QueryStrategy, StrategyRegistry,
    DEFAULT_QUERY,
};
