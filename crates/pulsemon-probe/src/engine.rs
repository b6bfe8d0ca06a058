//! Probe engine — orchestrates one probe from dispatch to routing.
//!
//! Emits the heartbeat lifecycle events around each strategy
//! invocation and classifies the outcome. Success routes to
//! `heartbeat_received` only for an HTTP 200; everything else is a
//! `heartbeat_failed`, with `hasResponse` left for the state machine
//! to separate transport loss from upstream error.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, warn};

use pulsemon_config::{CheckSpec, ServiceSpec, SharedThresholds};
use pulsemon_events::{
    EventBus, HeartbeatResult, HeartbeatSent, MonitorEvent, ProbeResult, Pulse, PulseStatus,
};

use crate::evaluate::evaluate;
use crate::strategy::StrategyRegistry;

/// Runs probes and publishes their lifecycle onto the bus.
#[derive(Clone)]
pub struct ProbeEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    registry: StrategyRegistry,
    thresholds: SharedThresholds,
    bus: EventBus,
}

impl ProbeEngine {
    pub fn new(registry: StrategyRegistry, thresholds: SharedThresholds, bus: EventBus) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                registry,
                thresholds,
                bus,
            }),
        }
    }

    /// Execute one probe for `(service, check)` and route the result.
    pub async fn run_probe(&self, service: &ServiceSpec, check: &CheckSpec) -> HeartbeatResult {
        let timestamp = Utc::now();
        self.inner
            .bus
            .publish(MonitorEvent::HeartbeatSent(HeartbeatSent {
                service: service.name.clone(),
                check: check.name.clone(),
                timestamp,
            }));

        let started = Instant::now();

        let Some(strategy) = self.inner.registry.get(check.strategy) else {
            warn!(
                service = %service.name,
                check = %check.name,
                strategy = check.strategy.as_str(),
                "no strategy registered, synthesizing failure"
            );
            let heartbeat = HeartbeatResult {
                service: service.name.clone(),
                check: check.name.clone(),
                timestamp,
                pulse: Pulse {
                    status: PulseStatus::Flatline,
                    latency_ms: 0,
                },
                response_time_ms: 0,
                success: false,
                http_status: 0,
                error: Some(format!("unknown strategy: {}", check.strategy.as_str())),
                has_response: false,
            };
            self.inner
                .bus
                .publish(MonitorEvent::HeartbeatFailed(heartbeat.clone()));
            return heartbeat;
        };

        let result = strategy.probe(service, check).await;
        let latency_ms = started.elapsed().as_millis() as u64;
        let pulse = {
            let thresholds = self.inner.thresholds.read();
            evaluate(latency_ms, &result, &thresholds)
        };

        debug!(
            service = %service.name,
            check = %check.name,
            latency_ms,
            status = pulse.status.as_str(),
            http_status = result.http_status,
            "probe completed"
        );

        let heartbeat = self.assemble(service, check, result, pulse);
        if heartbeat.success && heartbeat.http_status == 200 {
            self.inner
                .bus
                .publish(MonitorEvent::HeartbeatReceived(heartbeat.clone()));
        } else {
            self.inner
                .bus
                .publish(MonitorEvent::HeartbeatFailed(heartbeat.clone()));
        }
        heartbeat
    }

    fn assemble(
        &self,
        service: &ServiceSpec,
        check: &CheckSpec,
        result: ProbeResult,
        pulse: Pulse,
    ) -> HeartbeatResult {
        HeartbeatResult {
            service: service.name.clone(),
            check: check.name.clone(),
            timestamp: Utc::now(),
            pulse,
            response_time_ms: pulse.latency_ms,
            success: result.success,
            http_status: result.http_status,
            error: result.error,
            has_response: result.has_response,
        }
    }
}
