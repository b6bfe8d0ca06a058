//! Alert center — turns state transitions into operator alerts.
//!
//! Observes the derived events on the bus, builds bounded alert
//! history, honors per-service mutes, and decides whether the client
//! should play a sound. Actual playback is the dashboard's problem.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use tracing::debug;

use pulsemon_events::{
    Alert, AlertKind, AlertSeverity, EventBus, EventKind, FlatlineSeverity, MonitorEvent,
    PulseStatus,
};

/// Most recent alerts retained.
pub const ALERT_HISTORY_CAP: usize = 100;

struct AlertInner {
    bus: EventBus,
    audio_enabled: bool,
    muted: Mutex<HashSet<String>>,
    history: Mutex<VecDeque<Alert>>,
}

/// Bounded alert log with mute control.
#[derive(Clone)]
pub struct AlertCenter {
    inner: Arc<AlertInner>,
}

impl AlertCenter {
    pub fn new(bus: EventBus, audio_enabled: bool) -> Self {
        Self {
            inner: Arc::new(AlertInner {
                bus,
                audio_enabled,
                muted: Mutex::new(HashSet::new()),
                history: Mutex::new(VecDeque::with_capacity(ALERT_HISTORY_CAP)),
            }),
        }
    }

    /// Wire the observers onto the bus.
    pub fn attach(&self) {
        let center = self.clone();
        self.inner
            .bus
            .subscribe(EventKind::PulseChanged, move |ev| {
                if let MonitorEvent::PulseChanged(change) = ev {
                    center.on_pulse_changed(change);
                }
            });
        let center = self.clone();
        self.inner
            .bus
            .subscribe(EventKind::FlatlineDetected, move |ev| {
                if let MonitorEvent::FlatlineDetected(f) = ev {
                    center.on_flatline(f);
                }
            });
        let center = self.clone();
        self.inner
            .bus
            .subscribe(EventKind::ServiceRecovered, move |ev| {
                if let MonitorEvent::ServiceRecovered(r) = ev {
                    center.on_recovered(r);
                }
            });
    }

    pub fn mute(&self, service: &str) {
        self.inner.muted.lock().insert(service.to_string());
    }

    pub fn unmute(&self, service: &str) {
        self.inner.muted.lock().remove(service);
    }

    pub fn is_muted(&self, service: &str) -> bool {
        self.inner.muted.lock().contains(service)
    }

    /// The most recent ≤ `limit` alerts, newest first.
    pub fn recent(&self, limit: usize) -> Vec<Alert> {
        self.inner
            .history
            .lock()
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    // ── Observers ───────────────────────────────────────────────────

    fn on_pulse_changed(&self, change: &pulsemon_events::PulseChanged) {
        // Degradations only; flatline and recovery have richer events
        // of their own.
        let severity = match change.new_status {
            PulseStatus::Warning => AlertSeverity::Low,
            PulseStatus::Critical => AlertSeverity::Medium,
            PulseStatus::Healthy | PulseStatus::Flatline => return,
        };
        self.record(Alert {
            kind: AlertKind::Degraded,
            service: change.service.clone(),
            severity,
            message: format!(
                "{} degraded: {} -> {}",
                change.service,
                change.old_status.as_str(),
                change.new_status.as_str()
            ),
            play_sound: false,
            timestamp: change.timestamp,
        });
    }

    fn on_flatline(&self, f: &pulsemon_events::FlatlineDetected) {
        let severity = match f.severity {
            FlatlineSeverity::Warning => AlertSeverity::High,
            FlatlineSeverity::Critical | FlatlineSeverity::Catastrophic => AlertSeverity::Critical,
        };
        self.record(Alert {
            kind: AlertKind::Flatline,
            service: f.service.clone(),
            severity,
            message: format!(
                "{} flatlined after {} consecutive failures",
                f.service, f.consecutive_failures
            ),
            play_sound: self.inner.audio_enabled,
            timestamp: f.timestamp,
        });
    }

    fn on_recovered(&self, r: &pulsemon_events::ServiceRecovered) {
        self.record(Alert {
            kind: AlertKind::Recovery,
            service: r.service.clone(),
            severity: AlertSeverity::Info,
            message: format!(
                "{} recovered after {}s of downtime",
                r.service,
                r.downtime_ms / 1000
            ),
            play_sound: self.inner.audio_enabled,
            timestamp: r.timestamp,
        });
    }

    fn record(&self, alert: Alert) {
        if self.is_muted(&alert.service) {
            debug!(service = %alert.service, "alert suppressed (muted)");
            return;
        }
        {
            let mut history = self.inner.history.lock();
            if history.len() >= ALERT_HISTORY_CAP {
                history.pop_front();
            }
            history.push_back(alert.clone());
        }
        self.inner.bus.publish(MonitorEvent::AlertTriggered(alert));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use pulsemon_events::{FlatlineDetected, PulseChanged, ServiceRecovered};

    fn degrade(service: &str, to: PulseStatus) -> MonitorEvent {
        MonitorEvent::PulseChanged(PulseChanged {
            service: service.into(),
            old_status: PulseStatus::Healthy,
            new_status: to,
            response_time_ms: Some(400),
            timestamp: Utc::now(),
        })
    }

    fn flatline(service: &str, severity: FlatlineSeverity) -> MonitorEvent {
        MonitorEvent::FlatlineDetected(FlatlineDetected {
            service: service.into(),
            consecutive_failures: 3,
            last_success: None,
            time_since_last_success_ms: None,
            severity,
            timestamp: Utc::now(),
        })
    }

    fn attached(audio: bool) -> (EventBus, AlertCenter) {
        let bus = EventBus::new();
        let center = AlertCenter::new(bus.clone(), audio);
        center.attach();
        (bus, center)
    }

    #[test]
    fn degradation_severity_mapping() {
        let (bus, center) = attached(true);

        bus.publish(degrade("a", PulseStatus::Warning));
        bus.publish(degrade("b", PulseStatus::Critical));

        let recent = center.recent(10);
        assert_eq!(recent.len(), 2);
        // Newest first.
        assert_eq!(recent[0].severity, AlertSeverity::Medium);
        assert_eq!(recent[1].severity, AlertSeverity::Low);
        assert!(recent.iter().all(|a| a.kind == AlertKind::Degraded));
        assert!(recent.iter().all(|a| !a.play_sound));
    }

    #[test]
    fn recovery_to_healthy_is_not_an_alert() {
        let (bus, center) = attached(true);
        bus.publish(MonitorEvent::PulseChanged(PulseChanged {
            service: "a".into(),
            old_status: PulseStatus::Warning,
            new_status: PulseStatus::Healthy,
            response_time_ms: Some(50),
            timestamp: Utc::now(),
        }));
        assert!(center.recent(10).is_empty());
    }

    #[test]
    fn flatline_alert_severity_and_sound() {
        let (bus, center) = attached(true);

        bus.publish(flatline("a", FlatlineSeverity::Warning));
        bus.publish(flatline("b", FlatlineSeverity::Catastrophic));

        let recent = center.recent(10);
        assert_eq!(recent[1].severity, AlertSeverity::High);
        assert_eq!(recent[0].severity, AlertSeverity::Critical);
        assert!(recent.iter().all(|a| a.play_sound));
    }

    #[test]
    fn audio_disabled_never_requests_sound() {
        let (bus, center) = attached(false);
        bus.publish(flatline("a", FlatlineSeverity::Warning));
        assert!(!center.recent(1)[0].play_sound);
    }

    #[test]
    fn recovery_alert_carries_downtime() {
        let (bus, center) = attached(true);
        bus.publish(MonitorEvent::ServiceRecovered(ServiceRecovered {
            service: "a".into(),
            downtime_ms: 45_000,
            failure_count: 4,
            timestamp: Utc::now(),
        }));

        let recent = center.recent(1);
        assert_eq!(recent[0].kind, AlertKind::Recovery);
        assert_eq!(recent[0].severity, AlertSeverity::Info);
        assert!(recent[0].message.contains("45s"));
    }

    #[test]
    fn muted_services_are_suppressed() {
        let (bus, center) = attached(true);
        let triggered = Arc::new(Mutex::new(0usize));
        let count = triggered.clone();
        bus.subscribe(EventKind::AlertTriggered, move |_| {
            *count.lock() += 1;
        });

        center.mute("a");
        bus.publish(flatline("a", FlatlineSeverity::Warning));
        assert!(center.recent(10).is_empty());
        assert_eq!(*triggered.lock(), 0);

        center.unmute("a");
        bus.publish(flatline("a", FlatlineSeverity::Warning));
        assert_eq!(center.recent(10).len(), 1);
        assert_eq!(*triggered.lock(), 1);
    }

    #[test]
    fn mute_unmute_is_idempotent() {
        let (_bus, center) = attached(true);

        center.mute("a");
        center.mute("a");
        assert!(center.is_muted("a"));

        center.unmute("a");
        center.unmute("a");
        assert!(!center.is_muted("a"));

        // Unmuting a never-muted service is a no-op.
        center.unmute("b");
        assert!(!center.is_muted("b"));
    }

    #[test]
    fn history_is_bounded() {
        let (bus, center) = attached(true);
        for i in 0..(ALERT_HISTORY_CAP + 10) {
            bus.publish(degrade(&format!("svc-{i}"), PulseStatus::Warning));
        }
        let recent = center.recent(ALERT_HISTORY_CAP * 2);
        assert_eq!(recent.len(), ALERT_HISTORY_CAP);
        // Newest survives, oldest evicted.
        assert_eq!(recent[0].service, format!("svc-{}", ALERT_HISTORY_CAP + 9));
        assert_eq!(recent.last().unwrap().service, "svc-10");
    }

    #[test]
    fn alert_triggered_is_published_on_the_bus() {
        let (bus, _center) = attached(true);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        bus.subscribe(EventKind::AlertTriggered, move |ev| {
            sink.lock().push(ev.clone());
        });

        bus.publish(degrade("a", PulseStatus::Critical));
        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        let MonitorEvent::AlertTriggered(alert) = &seen[0] else {
            panic!("expected alert_triggered");
        };
        assert_eq!(alert.service, "a");
    }

    #[test]
    fn timestamps_carry_through_from_events() {
        let (bus, center) = attached(true);
        let ts = Utc::now() - Duration::seconds(90);
        bus.publish(MonitorEvent::PulseChanged(PulseChanged {
            service: "a".into(),
            old_status: PulseStatus::Healthy,
            new_status: PulseStatus::Warning,
            response_time_ms: None,
            timestamp: ts,
        }));
        assert_eq!(center.recent(1)[0].timestamp, ts);
    }
}
