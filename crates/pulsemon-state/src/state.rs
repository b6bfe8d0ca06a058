//! Per-service state machine.
//!
//! Consumes heartbeat outcomes from the bus and maintains the
//! authoritative in-memory record per service: consecutive-failure
//! counters, flatline detection against the tier threshold,
//! sustained-warning hysteresis, and recovery. Derived transitions
//! are republished onto the bus (`pulse_changed`,
//! `flatline_detected`, `service_recovered`).
//!
//! Mutations are serialized per service behind a mutex; derived
//! events are collected under the lock and published after release,
//! so observers never run while a service record is held.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::{info, warn};

use pulsemon_config::{ServiceSpec, SharedThresholds, Tier};
use pulsemon_events::{
    EventBus, EventKind, FlatlineDetected, FlatlineSeverity, HeartbeatResult, MonitorEvent,
    PulseChanged, PulseStatus, ServiceRecovered,
};

/// One entry in a service's bounded response history.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResponseSample {
    pub timestamp: DateTime<Utc>,
    pub latency_ms: u64,
    pub status: PulseStatus,
    pub is_failure: bool,
}

/// Authoritative in-memory record for one service.
#[derive(Debug, Clone)]
pub struct ServiceState {
    pub consecutive_failures: u32,
    pub last_success: Option<DateTime<Utc>>,
    pub last_failure: Option<DateTime<Utc>>,
    pub last_check: Option<DateTime<Utc>>,
    pub current_status: PulseStatus,
    pub is_flatlined: bool,
    pub flatline_start: Option<DateTime<Utc>>,
    pub success_count: u64,
    pub failure_count: u64,
    pub response_history: VecDeque<ResponseSample>,
    pub last_http_status: Option<u16>,
}

impl Default for ServiceState {
    fn default() -> Self {
        Self {
            consecutive_failures: 0,
            last_success: None,
            last_failure: None,
            last_check: None,
            current_status: PulseStatus::Healthy,
            is_flatlined: false,
            flatline_start: None,
            success_count: 0,
            failure_count: 0,
            response_history: VecDeque::new(),
            last_http_status: None,
        }
    }
}

impl ServiceState {
    /// Lifetime success ratio; 100 before any observation.
    pub fn uptime_percent(&self) -> f64 {
        let total = self.success_count + self.failure_count;
        if total == 0 {
            return 100.0;
        }
        let raw = self.success_count as f64 / total as f64 * 100.0;
        (raw * 100.0).round() / 100.0
    }
}

/// Read-model snapshot handed to the API and broadcaster.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceHealth {
    pub status: PulseStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_check: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_success: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_failure: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    pub is_flatlined: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flatline_start: Option<DateTime<Utc>>,
    pub uptime: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    pub success_count: u64,
    pub failure_count: u64,
}

impl ServiceHealth {
    fn from_state(state: &ServiceState) -> Self {
        Self {
            status: state.current_status,
            last_check: state.last_check,
            last_success: state.last_success,
            last_failure: state.last_failure,
            consecutive_failures: state.consecutive_failures,
            is_flatlined: state.is_flatlined,
            flatline_start: state.flatline_start,
            uptime: state.uptime_percent(),
            http_status: state.last_http_status,
            success_count: state.success_count,
            failure_count: state.failure_count,
        }
    }

    /// The pre-observation view of a service.
    pub fn unobserved() -> Self {
        Self::from_state(&ServiceState::default())
    }
}

struct RegistryInner {
    states: RwLock<HashMap<String, Arc<Mutex<ServiceState>>>>,
    tiers: RwLock<HashMap<String, Tier>>,
    thresholds: SharedThresholds,
    bus: EventBus,
}

/// Owns every service's state machine; created lazily per service on
/// the first observed event.
#[derive(Clone)]
pub struct StateRegistry {
    inner: Arc<RegistryInner>,
}

impl StateRegistry {
    pub fn new(bus: EventBus, thresholds: SharedThresholds) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                states: RwLock::new(HashMap::new()),
                tiers: RwLock::new(HashMap::new()),
                thresholds,
                bus,
            }),
        }
    }

    /// Record the tier of each declared service; unknown services
    /// fall back to the standard tier.
    pub fn set_tiers(&self, services: &[ServiceSpec]) {
        let mut tiers = self.inner.tiers.write();
        tiers.clear();
        for spec in services {
            tiers.insert(spec.name.clone(), spec.tier);
        }
    }

    /// Wire the heartbeat handlers onto the bus.
    pub fn attach(&self) {
        let reg = self.clone();
        self.inner
            .bus
            .subscribe(EventKind::HeartbeatFailed, move |ev| {
                if let MonitorEvent::HeartbeatFailed(hb) = ev {
                    reg.on_failure(hb);
                }
            });
        let reg = self.clone();
        self.inner
            .bus
            .subscribe(EventKind::HeartbeatReceived, move |ev| {
                if let MonitorEvent::HeartbeatReceived(hb) = ev {
                    reg.on_success(hb);
                }
            });
    }

    /// Snapshot for one service; the unobserved default when no event
    /// has been seen yet.
    pub fn health(&self, service: &str) -> ServiceHealth {
        let states = self.inner.states.read();
        match states.get(service) {
            Some(entry) => ServiceHealth::from_state(&entry.lock()),
            None => ServiceHealth::unobserved(),
        }
    }

    /// Names with an observed state record.
    pub fn observed_services(&self) -> Vec<String> {
        self.inner.states.read().keys().cloned().collect()
    }

    /// Drop one service's record. Returns false when none existed.
    pub fn reset(&self, service: &str) -> bool {
        self.inner.states.write().remove(service).is_some()
    }

    /// Drop records for services no longer declared (config reload).
    pub fn retain(&self, names: &[String]) {
        let mut states = self.inner.states.write();
        states.retain(|name, _| names.iter().any(|n| n == name));
    }

    fn entry(&self, service: &str) -> Arc<Mutex<ServiceState>> {
        {
            let states = self.inner.states.read();
            if let Some(entry) = states.get(service) {
                return entry.clone();
            }
        }
        self.inner
            .states
            .write()
            .entry(service.to_string())
            .or_default()
            .clone()
    }

    fn tier_of(&self, service: &str) -> Tier {
        self.inner
            .tiers
            .read()
            .get(service)
            .copied()
            .unwrap_or_default()
    }

    // ── Transition logic ────────────────────────────────────────────

    fn on_failure(&self, hb: &HeartbeatResult) {
        let entry = self.entry(&hb.service);
        let tier = self.tier_of(&hb.service);
        let (threshold, sustained) = {
            let t = self.inner.thresholds.read();
            (t.flatline_threshold(tier), t.sustained_count() as usize)
        };

        let mut derived = Vec::new();
        {
            let mut state = entry.lock();
            state.consecutive_failures += 1;
            state.last_failure = Some(hb.timestamp);
            state.last_check = Some(hb.timestamp);
            state.failure_count += 1;
            state.last_http_status = Some(hb.http_status);

            push_sample(
                &mut state,
                ResponseSample {
                    timestamp: hb.timestamp,
                    latency_ms: hb.response_time_ms,
                    status: PulseStatus::Critical,
                    is_failure: true,
                },
                sustained,
            );

            // Only transport loss counts toward flatline; an upstream
            // error with a body is observable sick, not unreachable.
            if !hb.has_response && state.consecutive_failures >= threshold && !state.is_flatlined {
                state.is_flatlined = true;
                state.flatline_start = Some(hb.timestamp);
                let severity = FlatlineSeverity::from_failures(state.consecutive_failures);
                warn!(
                    service = %hb.service,
                    failures = state.consecutive_failures,
                    threshold,
                    "service flatlined"
                );
                derived.push(MonitorEvent::FlatlineDetected(FlatlineDetected {
                    service: hb.service.clone(),
                    consecutive_failures: state.consecutive_failures,
                    last_success: state.last_success,
                    time_since_last_success_ms: state
                        .last_success
                        .map(|t| (hb.timestamp - t).num_milliseconds()),
                    severity,
                    timestamp: hb.timestamp,
                }));
            }

            if state.is_flatlined && state.current_status != PulseStatus::Flatline {
                derived.push(MonitorEvent::PulseChanged(PulseChanged {
                    service: hb.service.clone(),
                    old_status: state.current_status,
                    new_status: PulseStatus::Flatline,
                    response_time_ms: None,
                    timestamp: hb.timestamp,
                }));
                state.current_status = PulseStatus::Flatline;
            }
        }

        for event in derived {
            self.inner.bus.publish(event);
        }
    }

    fn on_success(&self, hb: &HeartbeatResult) {
        let entry = self.entry(&hb.service);
        let sustained = self.inner.thresholds.read().sustained_count() as usize;

        let mut derived = Vec::new();
        {
            let mut state = entry.lock();

            if state.is_flatlined {
                let downtime_ms = state
                    .flatline_start
                    .map(|t| (hb.timestamp - t).num_milliseconds())
                    .unwrap_or(0);
                info!(
                    service = %hb.service,
                    downtime_ms,
                    failures = state.consecutive_failures,
                    "service recovered"
                );
                derived.push(MonitorEvent::ServiceRecovered(ServiceRecovered {
                    service: hb.service.clone(),
                    downtime_ms,
                    failure_count: state.consecutive_failures,
                    timestamp: hb.timestamp,
                }));
                state.is_flatlined = false;
                state.flatline_start = None;
            }

            state.consecutive_failures = 0;
            state.success_count += 1;
            state.last_success = Some(hb.timestamp);
            state.last_check = Some(hb.timestamp);
            state.last_http_status = Some(hb.http_status);

            push_sample(
                &mut state,
                ResponseSample {
                    timestamp: hb.timestamp,
                    latency_ms: hb.response_time_ms,
                    status: hb.pulse.status,
                    is_failure: false,
                },
                sustained,
            );

            let new_status = next_status_on_success(&state, hb.pulse.status, sustained);
            if new_status != state.current_status {
                derived.push(MonitorEvent::PulseChanged(PulseChanged {
                    service: hb.service.clone(),
                    old_status: state.current_status,
                    new_status,
                    response_time_ms: Some(hb.response_time_ms),
                    timestamp: hb.timestamp,
                }));
                state.current_status = new_status;
            }
        }

        for event in derived {
            self.inner.bus.publish(event);
        }
    }
}

/// Append a sample, evicting the oldest beyond `capacity`.
fn push_sample(state: &mut ServiceState, sample: ResponseSample, capacity: usize) {
    state.response_history.push_back(sample);
    while state.response_history.len() > capacity.max(1) {
        state.response_history.pop_front();
    }
}

/// Sustained-hysteresis rule: critical and healthy apply immediately;
/// warning requires the whole window to be warning-range successes.
fn next_status_on_success(
    state: &ServiceState,
    pulse: PulseStatus,
    sustained: usize,
) -> PulseStatus {
    match pulse {
        PulseStatus::Critical | PulseStatus::Flatline => PulseStatus::Critical,
        PulseStatus::Healthy => PulseStatus::Healthy,
        PulseStatus::Warning => {
            let window_full = state.response_history.len() >= sustained.max(1);
            let all_warning = state
                .response_history
                .iter()
                .rev()
                .take(sustained.max(1))
                .all(|s| !s.is_failure && s.status == PulseStatus::Warning);
            if window_full && all_warning {
                PulseStatus::Warning
            } else {
                PulseStatus::Healthy
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use pulsemon_config::Thresholds;
    use pulsemon_events::Pulse;

    fn thresholds() -> SharedThresholds {
        Arc::new(RwLock::new(Thresholds::default()))
    }

    fn registry(bus: &EventBus) -> StateRegistry {
        let reg = StateRegistry::new(bus.clone(), thresholds());
        reg.attach();
        reg
    }

    fn registry_with_tier(bus: &EventBus, tier: Tier) -> StateRegistry {
        let reg = registry(bus);
        reg.inner
            .tiers
            .write()
            .insert("payments".to_string(), tier);
        reg
    }

    fn collect(bus: &EventBus, kind: EventKind) -> Arc<Mutex<Vec<MonitorEvent>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        bus.subscribe(kind, move |ev| sink.lock().push(ev.clone()));
        seen
    }

    fn success_at(ts: DateTime<Utc>, latency: u64, status: PulseStatus) -> MonitorEvent {
        MonitorEvent::HeartbeatReceived(HeartbeatResult {
            service: "payments".into(),
            check: "ping".into(),
            timestamp: ts,
            pulse: Pulse {
                status,
                latency_ms: latency,
            },
            response_time_ms: latency,
            success: true,
            http_status: 200,
            error: None,
            has_response: true,
        })
    }

    fn transport_failure_at(ts: DateTime<Utc>) -> MonitorEvent {
        MonitorEvent::HeartbeatFailed(HeartbeatResult {
            service: "payments".into(),
            check: "ping".into(),
            timestamp: ts,
            pulse: Pulse {
                status: PulseStatus::Critical,
                latency_ms: 0,
            },
            response_time_ms: 0,
            success: false,
            http_status: 0,
            error: Some("connection refused".into()),
            has_response: false,
        })
    }

    fn http_failure_at(ts: DateTime<Utc>, status: u16) -> MonitorEvent {
        MonitorEvent::HeartbeatFailed(HeartbeatResult {
            service: "payments".into(),
            check: "ping".into(),
            timestamp: ts,
            pulse: Pulse {
                status: PulseStatus::Critical,
                latency_ms: 12,
            },
            response_time_ms: 12,
            success: false,
            http_status: status,
            error: Some(format!("HTTP {status}")),
            has_response: true,
        })
    }

    /// Classify a latency the way the evaluator would with default
    /// thresholds (healthy ≤ 200, warning ≤ 500).
    fn classify(latency: u64) -> PulseStatus {
        if latency <= 200 {
            PulseStatus::Healthy
        } else if latency <= 500 {
            PulseStatus::Warning
        } else {
            PulseStatus::Critical
        }
    }

    #[test]
    fn warning_requires_sustention() {
        // Latencies [150, 300, 350, 380, 120] with sustainedCount 3:
        // statuses healthy, healthy, healthy, warning, healthy and
        // exactly two pulse_changed events.
        let bus = EventBus::new();
        let reg = registry(&bus);
        let changes = collect(&bus, EventKind::PulseChanged);

        let t0 = Utc::now();
        let expected = [
            PulseStatus::Healthy,
            PulseStatus::Healthy,
            PulseStatus::Healthy,
            PulseStatus::Warning,
            PulseStatus::Healthy,
        ];
        for (i, latency) in [150u64, 300, 350, 380, 120].iter().enumerate() {
            bus.publish(success_at(
                t0 + Duration::seconds(i as i64),
                *latency,
                classify(*latency),
            ));
            assert_eq!(
                reg.health("payments").status,
                expected[i],
                "after sample {i} ({latency}ms)"
            );
        }

        let changes = changes.lock();
        assert_eq!(changes.len(), 2);
        let MonitorEvent::PulseChanged(first) = &changes[0] else {
            panic!("expected pulse_changed");
        };
        assert_eq!(first.old_status, PulseStatus::Healthy);
        assert_eq!(first.new_status, PulseStatus::Warning);
        let MonitorEvent::PulseChanged(second) = &changes[1] else {
            panic!("expected pulse_changed");
        };
        assert_eq!(second.old_status, PulseStatus::Warning);
        assert_eq!(second.new_status, PulseStatus::Healthy);
    }

    #[test]
    fn flatline_fires_once_at_tier_threshold() {
        // Critical tier flatlines at 2 consecutive transport failures.
        let bus = EventBus::new();
        let reg = registry_with_tier(&bus, Tier::Critical);
        let flatlines = collect(&bus, EventKind::FlatlineDetected);
        let changes = collect(&bus, EventKind::PulseChanged);

        let t0 = Utc::now();
        bus.publish(transport_failure_at(t0));
        assert!(!reg.health("payments").is_flatlined);
        assert!(flatlines.lock().is_empty());
        assert!(changes.lock().is_empty());

        bus.publish(transport_failure_at(t0 + Duration::seconds(1)));
        assert!(reg.health("payments").is_flatlined);
        {
            let flatlines = flatlines.lock();
            assert_eq!(flatlines.len(), 1);
            let MonitorEvent::FlatlineDetected(f) = &flatlines[0] else {
                panic!("expected flatline_detected");
            };
            assert_eq!(f.consecutive_failures, 2);
            assert_eq!(f.severity, FlatlineSeverity::Warning);
        }
        {
            let changes = changes.lock();
            assert_eq!(changes.len(), 1);
            let MonitorEvent::PulseChanged(c) = &changes[0] else {
                panic!("expected pulse_changed");
            };
            assert_eq!(c.old_status, PulseStatus::Healthy);
            assert_eq!(c.new_status, PulseStatus::Flatline);
        }

        // Third failure: single-shot while flatlined.
        bus.publish(transport_failure_at(t0 + Duration::seconds(2)));
        assert_eq!(flatlines.lock().len(), 1);
        assert_eq!(changes.lock().len(), 1);
        assert_eq!(reg.health("payments").consecutive_failures, 3);
    }

    #[test]
    fn recovery_reports_downtime_and_resets() {
        let bus = EventBus::new();
        let reg = registry_with_tier(&bus, Tier::Critical);
        let recoveries = collect(&bus, EventKind::ServiceRecovered);
        let changes = collect(&bus, EventKind::PulseChanged);

        let t0 = Utc::now();
        bus.publish(transport_failure_at(t0));
        bus.publish(transport_failure_at(t0 + Duration::seconds(1)));
        bus.publish(transport_failure_at(t0 + Duration::seconds(2)));

        // Success 30s after flatline start (failure #2).
        let flatline_start = t0 + Duration::seconds(1);
        bus.publish(success_at(
            flatline_start + Duration::seconds(30),
            100,
            PulseStatus::Healthy,
        ));

        {
            let recoveries = recoveries.lock();
            assert_eq!(recoveries.len(), 1);
            let MonitorEvent::ServiceRecovered(r) = &recoveries[0] else {
                panic!("expected service_recovered");
            };
            assert_eq!(r.downtime_ms, 30_000);
            assert_eq!(r.failure_count, 3);
        }

        let health = reg.health("payments");
        assert_eq!(health.consecutive_failures, 0);
        assert!(!health.is_flatlined);
        assert!(health.flatline_start.is_none());
        assert_eq!(health.status, PulseStatus::Healthy);

        // flatline entry, then flatline → healthy.
        let changes = changes.lock();
        assert_eq!(changes.len(), 2);
        let MonitorEvent::PulseChanged(last) = &changes[1] else {
            panic!("expected pulse_changed");
        };
        assert_eq!(last.old_status, PulseStatus::Flatline);
        assert_eq!(last.new_status, PulseStatus::Healthy);
    }

    #[test]
    fn recovery_precedes_pulse_change() {
        let bus = EventBus::new();
        let _reg = registry_with_tier(&bus, Tier::Critical);
        let order = Arc::new(Mutex::new(Vec::new()));
        for kind in [EventKind::ServiceRecovered, EventKind::PulseChanged] {
            let order = order.clone();
            bus.subscribe(kind, move |ev| order.lock().push(ev.kind()));
        }

        let t0 = Utc::now();
        bus.publish(transport_failure_at(t0));
        bus.publish(transport_failure_at(t0 + Duration::seconds(1)));
        bus.publish(success_at(
            t0 + Duration::seconds(5),
            100,
            PulseStatus::Healthy,
        ));

        assert_eq!(
            *order.lock(),
            vec![
                EventKind::PulseChanged,    // healthy → flatline
                EventKind::ServiceRecovered,
                EventKind::PulseChanged,    // flatline → healthy
            ]
        );
    }

    #[test]
    fn http_errors_with_body_never_flatline() {
        // Three 503s with a body: failures accumulate, no flatline.
        let bus = EventBus::new();
        let reg = registry_with_tier(&bus, Tier::Critical);
        let flatlines = collect(&bus, EventKind::FlatlineDetected);

        let t0 = Utc::now();
        for i in 0..3 {
            bus.publish(http_failure_at(t0 + Duration::seconds(i), 503));
            let health = reg.health("payments");
            assert_eq!(health.consecutive_failures, i as u32 + 1);
            assert!(!health.is_flatlined);
        }
        assert!(flatlines.lock().is_empty());
        assert_eq!(reg.health("payments").http_status, Some(503));
    }

    #[test]
    fn flatline_severity_scales_with_failures() {
        // Standard tier (threshold 3) but keep failing to 10: the
        // severity is fixed at detection time.
        let bus = EventBus::new();
        let reg = registry_with_tier(&bus, Tier::Standard);
        let flatlines = collect(&bus, EventKind::FlatlineDetected);

        let t0 = Utc::now();
        for i in 0..10 {
            bus.publish(transport_failure_at(t0 + Duration::seconds(i)));
        }

        let flatlines = flatlines.lock();
        assert_eq!(flatlines.len(), 1);
        let MonitorEvent::FlatlineDetected(f) = &flatlines[0] else {
            panic!("expected flatline_detected");
        };
        assert_eq!(f.consecutive_failures, 3);
        assert_eq!(f.severity, FlatlineSeverity::Warning);
        assert_eq!(reg.health("payments").consecutive_failures, 10);
    }

    #[test]
    fn slow_success_is_critical_immediately() {
        let bus = EventBus::new();
        let reg = registry(&bus);

        bus.publish(success_at(Utc::now(), 900, PulseStatus::Critical));
        assert_eq!(reg.health("payments").status, PulseStatus::Critical);

        // And healthy recovery is immediate too.
        bus.publish(success_at(Utc::now(), 50, PulseStatus::Healthy));
        assert_eq!(reg.health("payments").status, PulseStatus::Healthy);
    }

    #[test]
    fn uptime_tracks_lifetime_counts() {
        let bus = EventBus::new();
        let reg = registry(&bus);

        assert_eq!(reg.health("payments").uptime, 100.0);

        let t0 = Utc::now();
        bus.publish(success_at(t0, 50, PulseStatus::Healthy));
        bus.publish(success_at(t0, 50, PulseStatus::Healthy));
        bus.publish(success_at(t0, 50, PulseStatus::Healthy));
        bus.publish(http_failure_at(t0, 500));

        assert_eq!(reg.health("payments").uptime, 75.0);
    }

    #[test]
    fn response_history_is_bounded_by_sustained_count() {
        let bus = EventBus::new();
        let reg = registry(&bus);

        let t0 = Utc::now();
        for i in 0..10 {
            bus.publish(success_at(
                t0 + Duration::seconds(i),
                50,
                PulseStatus::Healthy,
            ));
        }

        let entry = reg.entry("payments");
        let state = entry.lock();
        assert_eq!(state.response_history.len(), 3);
    }

    #[test]
    fn state_is_created_lazily_and_reset_drops_it() {
        let bus = EventBus::new();
        let reg = registry(&bus);

        assert!(reg.observed_services().is_empty());
        bus.publish(success_at(Utc::now(), 50, PulseStatus::Healthy));
        assert_eq!(reg.observed_services(), vec!["payments".to_string()]);

        assert!(reg.reset("payments"));
        assert!(!reg.reset("payments"));
        assert_eq!(reg.health("payments"), ServiceHealth::unobserved());
    }

    #[test]
    fn retain_drops_undeclared_services() {
        let bus = EventBus::new();
        let reg = registry(&bus);

        bus.publish(success_at(Utc::now(), 50, PulseStatus::Healthy));
        reg.retain(&["orders".to_string()]);
        assert!(reg.observed_services().is_empty());
    }

    #[test]
    fn consecutive_failures_zero_iff_last_event_success() {
        let bus = EventBus::new();
        let reg = registry(&bus);

        let t0 = Utc::now();
        bus.publish(http_failure_at(t0, 500));
        assert!(reg.health("payments").consecutive_failures > 0);
        bus.publish(success_at(t0, 50, PulseStatus::Healthy));
        assert_eq!(reg.health("payments").consecutive_failures, 0);
    }
}
