//! pulsemon-broadcast — live update fan-out to streaming subscribers.
//!
//! The broadcaster keeps a set of connected subscribers, each behind
//! a bounded frame queue. Bus events translate into wire frames and
//! are delivered best-effort: a subscriber whose queue is full or
//! closed is dropped on the spot, so a slow client can never stall
//! event dispatch. The WebSocket pump itself lives in the API crate.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info};

use pulsemon_events::{AlertSeverity, EventBus, EventKind, MonitorEvent};

/// Outbound frames buffered per subscriber before it is dropped.
pub const SUBSCRIBER_QUEUE: usize = 64;

/// One framed message on the streaming channel.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Frame {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub urgent: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Frame {
    pub fn new(kind: &'static str, data: Value) -> Self {
        Self {
            kind,
            timestamp: Utc::now(),
            urgent: None,
            message: None,
            data: Some(data),
        }
    }

    /// The greeting sent to every new subscriber.
    pub fn connected() -> Self {
        Self {
            kind: "connected",
            timestamp: Utc::now(),
            urgent: None,
            message: Some("subscribed to live updates".to_string()),
            data: None,
        }
    }

    /// Reply to an inbound ping.
    pub fn pong() -> Self {
        Self {
            kind: "pong",
            timestamp: Utc::now(),
            urgent: None,
            message: None,
            data: None,
        }
    }
}

/// Identifies one connected subscriber.
pub type SubscriberId = u64;

struct BroadcasterInner {
    subscribers: Mutex<HashMap<SubscriberId, mpsc::Sender<Frame>>>,
    next_id: AtomicU64,
}

/// Fan-out hub for streaming subscribers.
#[derive(Clone)]
pub struct Broadcaster {
    inner: Arc<BroadcasterInner>,
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl Broadcaster {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BroadcasterInner {
                subscribers: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Wire the event translators onto the bus.
    pub fn attach(&self, bus: &EventBus) {
        let kinds = [
            EventKind::HeartbeatReceived,
            EventKind::HeartbeatFailed,
            EventKind::FlatlineDetected,
            EventKind::PulseChanged,
            EventKind::ServiceRecovered,
            EventKind::AlertTriggered,
            EventKind::ConfigUpdated,
        ];
        for kind in kinds {
            let broadcaster = self.clone();
            bus.subscribe(kind, move |ev| {
                if let Some(frame) = frame_for(ev) {
                    broadcaster.broadcast(frame);
                }
            });
        }
    }

    /// Add a subscriber and hand back its frame queue. The connected
    /// greeting is already enqueued.
    pub fn register(&self) -> (SubscriberId, mpsc::Receiver<Frame>) {
        self.register_with_capacity(SUBSCRIBER_QUEUE)
    }

    fn register_with_capacity(&self, capacity: usize) -> (SubscriberId, mpsc::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel(capacity);
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        // The queue is empty; the greeting always fits.
        let _ = tx.try_send(Frame::connected());
        self.inner.subscribers.lock().insert(id, tx);
        info!(subscriber = id, "streaming subscriber connected");
        (id, rx)
    }

    /// Remove a subscriber (explicit close or pump exit).
    pub fn unregister(&self, id: SubscriberId) {
        if self.inner.subscribers.lock().remove(&id).is_some() {
            info!(subscriber = id, "streaming subscriber disconnected");
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.lock().len()
    }

    /// Enqueue a frame directly for one subscriber (pong replies).
    pub fn send_to(&self, id: SubscriberId, frame: Frame) {
        let tx = self.inner.subscribers.lock().get(&id).cloned();
        if let Some(tx) = tx {
            if tx.try_send(frame).is_err() {
                self.unregister(id);
            }
        }
    }

    /// Deliver a frame to every live subscriber, dropping the ones
    /// that cannot keep up. Sends happen off-lock.
    pub fn broadcast(&self, frame: Frame) {
        let snapshot: Vec<(SubscriberId, mpsc::Sender<Frame>)> = {
            let subscribers = self.inner.subscribers.lock();
            subscribers
                .iter()
                .map(|(id, tx)| (*id, tx.clone()))
                .collect()
        };
        for (id, tx) in snapshot {
            if tx.try_send(frame.clone()).is_err() {
                debug!(subscriber = id, "dropping unresponsive subscriber");
                self.unregister(id);
            }
        }
    }
}

/// Translate one bus event into its wire frame.
fn frame_for(event: &MonitorEvent) -> Option<Frame> {
    let frame = match event {
        MonitorEvent::HeartbeatReceived(_) | MonitorEvent::HeartbeatFailed(_) => {
            Frame::new("heartbeat_update", event.payload_json())
        }
        MonitorEvent::FlatlineDetected(_) => {
            let mut frame = Frame::new("flatline", event.payload_json());
            frame.urgent = Some(true);
            frame
        }
        MonitorEvent::PulseChanged(_) => Frame::new("pulse_changed", event.payload_json()),
        MonitorEvent::ServiceRecovered(_) => Frame::new("service_recovered", event.payload_json()),
        MonitorEvent::AlertTriggered(alert) => {
            let mut frame = Frame::new("alert", event.payload_json());
            if alert.severity >= AlertSeverity::High {
                frame.urgent = Some(true);
            }
            frame
        }
        MonitorEvent::ConfigUpdated(_) => Frame::new("config_updated", event.payload_json()),
        MonitorEvent::HeartbeatSent(_) => return None,
    };
    Some(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulsemon_events::{
        Alert, AlertKind, FlatlineDetected, FlatlineSeverity, HeartbeatResult, HeartbeatSent,
        Pulse, PulseStatus,
    };

    fn received() -> MonitorEvent {
        MonitorEvent::HeartbeatReceived(HeartbeatResult {
            service: "payments".into(),
            check: "ping".into(),
            timestamp: Utc::now(),
            pulse: Pulse {
                status: PulseStatus::Healthy,
                latency_ms: 10,
            },
            response_time_ms: 10,
            success: true,
            http_status: 200,
            error: None,
            has_response: true,
        })
    }

    fn flatline() -> MonitorEvent {
        MonitorEvent::FlatlineDetected(FlatlineDetected {
            service: "payments".into(),
            consecutive_failures: 3,
            last_success: None,
            time_since_last_success_ms: None,
            severity: FlatlineSeverity::Warning,
            timestamp: Utc::now(),
        })
    }

    #[test]
    fn register_enqueues_connected_greeting() {
        let broadcaster = Broadcaster::new();
        let (_id, mut rx) = broadcaster.register();

        let frame = rx.try_recv().unwrap();
        assert_eq!(frame.kind, "connected");
        assert!(frame.message.is_some());
        assert_eq!(broadcaster.subscriber_count(), 1);
    }

    #[test]
    fn broadcast_reaches_every_subscriber() {
        let broadcaster = Broadcaster::new();
        let (_a, mut rx_a) = broadcaster.register();
        let (_b, mut rx_b) = broadcaster.register();
        rx_a.try_recv().unwrap();
        rx_b.try_recv().unwrap();

        broadcaster.broadcast(Frame::pong());
        assert_eq!(rx_a.try_recv().unwrap().kind, "pong");
        assert_eq!(rx_b.try_recv().unwrap().kind, "pong");
    }

    #[test]
    fn slow_subscriber_is_dropped() {
        let broadcaster = Broadcaster::new();
        let (_id, _rx) = broadcaster.register_with_capacity(2);

        // Greeting occupies one slot; two more fill and overflow.
        broadcaster.broadcast(Frame::pong());
        assert_eq!(broadcaster.subscriber_count(), 1);
        broadcaster.broadcast(Frame::pong());
        assert_eq!(broadcaster.subscriber_count(), 0);
    }

    #[test]
    fn closed_subscriber_is_dropped() {
        let broadcaster = Broadcaster::new();
        let (_id, rx) = broadcaster.register();
        drop(rx);

        broadcaster.broadcast(Frame::pong());
        assert_eq!(broadcaster.subscriber_count(), 0);
    }

    #[test]
    fn unregister_is_idempotent() {
        let broadcaster = Broadcaster::new();
        let (id, _rx) = broadcaster.register();
        broadcaster.unregister(id);
        broadcaster.unregister(id);
        assert_eq!(broadcaster.subscriber_count(), 0);
    }

    #[test]
    fn frames_carry_wire_types() {
        let frame = frame_for(&received()).unwrap();
        assert_eq!(frame.kind, "heartbeat_update");
        assert_eq!(frame.urgent, None);
        assert_eq!(frame.data.as_ref().unwrap()["service"], "payments");

        let frame = frame_for(&flatline()).unwrap();
        assert_eq!(frame.kind, "flatline");
        assert_eq!(frame.urgent, Some(true));

        // heartbeat_sent is internal only.
        assert!(frame_for(&MonitorEvent::HeartbeatSent(HeartbeatSent {
            service: "payments".into(),
            check: "ping".into(),
            timestamp: Utc::now(),
        }))
        .is_none());
    }

    #[test]
    fn alert_urgency_follows_severity() {
        let alert = |severity| {
            MonitorEvent::AlertTriggered(Alert {
                kind: AlertKind::Degraded,
                service: "payments".into(),
                severity,
                message: "m".into(),
                play_sound: false,
                timestamp: Utc::now(),
            })
        };
        assert_eq!(frame_for(&alert(AlertSeverity::Low)).unwrap().urgent, None);
        assert_eq!(
            frame_for(&alert(AlertSeverity::High)).unwrap().urgent,
            Some(true)
        );
        assert_eq!(
            frame_for(&alert(AlertSeverity::Critical)).unwrap().urgent,
            Some(true)
        );
    }

    #[test]
    fn attach_translates_bus_events() {
        let bus = EventBus::new();
        let broadcaster = Broadcaster::new();
        broadcaster.attach(&bus);

        let (_id, mut rx) = broadcaster.register();
        rx.try_recv().unwrap(); // greeting

        bus.publish(received());
        assert_eq!(rx.try_recv().unwrap().kind, "heartbeat_update");

        bus.publish(flatline());
        let frame = rx.try_recv().unwrap();
        assert_eq!(frame.kind, "flatline");
        assert_eq!(frame.urgent, Some(true));
    }

    #[test]
    fn frame_serializes_type_and_timestamp() {
        let json = serde_json::to_value(Frame::pong()).unwrap();
        assert_eq!(json["type"], "pong");
        assert!(json.get("timestamp").is_some());
        assert!(json.get("urgent").is_none());
        assert!(json.get("data").is_none());
    }
}
