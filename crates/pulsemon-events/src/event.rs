//! The monitor event model.
//!
//! Every event that crosses the bus is one variant of [`MonitorEvent`];
//! the string names in [`EventKind`] are the wire contract shared with
//! streaming subscribers and the log store. Payload fields serialize
//! camelCase to match the config files and the dashboard.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ── Pulse classification ──────────────────────────────────────────

/// Classification of one probe outcome. The evaluator produces
/// `healthy | warning | critical`; only the state machine emits
/// `flatline`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PulseStatus {
    Healthy,
    Warning,
    Critical,
    Flatline,
}

impl PulseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PulseStatus::Healthy => "healthy",
            PulseStatus::Warning => "warning",
            PulseStatus::Critical => "critical",
            PulseStatus::Flatline => "flatline",
        }
    }
}

/// A pulse with its measured latency attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pulse {
    pub status: PulseStatus,
    pub latency_ms: u64,
}

// ── Probe outcomes ────────────────────────────────────────────────

/// Raw outcome of one strategy invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProbeResult {
    pub success: bool,
    /// True iff a transport-level response was received, regardless
    /// of HTTP status.
    pub has_response: bool,
    /// 0 when no response was received.
    pub http_status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProbeResult {
    /// A transport-level failure (timeout, DNS, refused, reset).
    pub fn transport_failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            has_response: false,
            http_status: 0,
            data: None,
            error: Some(error.into()),
        }
    }
}

/// Fully classified outcome of one probe, as routed onto the bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatResult {
    pub service: String,
    pub check: String,
    pub timestamp: DateTime<Utc>,
    pub pulse: Pulse,
    pub response_time_ms: u64,
    pub success: bool,
    pub http_status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub has_response: bool,
}

// ── Derived events ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatSent {
    pub service: String,
    pub check: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PulseChanged {
    pub service: String,
    pub old_status: PulseStatus,
    pub new_status: PulseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,
    pub timestamp: DateTime<Utc>,
}

/// Flatline severity at the moment of detection; never updated as
/// failures continue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlatlineSeverity {
    Warning,
    Critical,
    Catastrophic,
}

impl FlatlineSeverity {
    /// Severity scale derived from the consecutive-failure count.
    pub fn from_failures(failures: u32) -> Self {
        match failures {
            n if n >= 10 => FlatlineSeverity::Catastrophic,
            n if n >= 5 => FlatlineSeverity::Critical,
            _ => FlatlineSeverity::Warning,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FlatlineDetected {
    pub service: String,
    pub consecutive_failures: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_success: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_since_last_success_ms: Option<i64>,
    pub severity: FlatlineSeverity,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRecovered {
    pub service: String,
    /// Milliseconds between flatline start and this recovery.
    pub downtime_ms: i64,
    /// Consecutive failures accumulated while down.
    pub failure_count: u32,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConfigUpdated {
    pub service: String,
    pub field: String,
    pub value: Value,
    pub timestamp: DateTime<Utc>,
}

// ── Alerts ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    Degraded,
    Recovery,
    Flatline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    #[serde(rename = "type")]
    pub kind: AlertKind,
    pub service: String,
    pub severity: AlertSeverity,
    pub message: String,
    /// Whether the client should play a notification sound.
    pub play_sound: bool,
    pub timestamp: DateTime<Utc>,
}

// ── The tagged union ──────────────────────────────────────────────

/// Names of the events carried on the bus; the strings are the wire
/// contract between core components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    HeartbeatSent,
    HeartbeatReceived,
    HeartbeatFailed,
    PulseChanged,
    FlatlineDetected,
    ServiceRecovered,
    AlertTriggered,
    ConfigUpdated,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::HeartbeatSent => "heartbeat_sent",
            EventKind::HeartbeatReceived => "heartbeat_received",
            EventKind::HeartbeatFailed => "heartbeat_failed",
            EventKind::PulseChanged => "pulse_changed",
            EventKind::FlatlineDetected => "flatline_detected",
            EventKind::ServiceRecovered => "service_recovered",
            EventKind::AlertTriggered => "alert_triggered",
            EventKind::ConfigUpdated => "config_updated",
        }
    }
}

/// One event on the bus: a tagged union of every event name with its
/// statically declared payload shape.
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorEvent {
    HeartbeatSent(HeartbeatSent),
    HeartbeatReceived(HeartbeatResult),
    HeartbeatFailed(HeartbeatResult),
    PulseChanged(PulseChanged),
    FlatlineDetected(FlatlineDetected),
    ServiceRecovered(ServiceRecovered),
    AlertTriggered(Alert),
    ConfigUpdated(ConfigUpdated),
}

impl MonitorEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            MonitorEvent::HeartbeatSent(_) => EventKind::HeartbeatSent,
            MonitorEvent::HeartbeatReceived(_) => EventKind::HeartbeatReceived,
            MonitorEvent::HeartbeatFailed(_) => EventKind::HeartbeatFailed,
            MonitorEvent::PulseChanged(_) => EventKind::PulseChanged,
            MonitorEvent::FlatlineDetected(_) => EventKind::FlatlineDetected,
            MonitorEvent::ServiceRecovered(_) => EventKind::ServiceRecovered,
            MonitorEvent::AlertTriggered(_) => EventKind::AlertTriggered,
            MonitorEvent::ConfigUpdated(_) => EventKind::ConfigUpdated,
        }
    }

    /// The service this event concerns.
    pub fn service(&self) -> &str {
        match self {
            MonitorEvent::HeartbeatSent(e) => &e.service,
            MonitorEvent::HeartbeatReceived(e) => &e.service,
            MonitorEvent::HeartbeatFailed(e) => &e.service,
            MonitorEvent::PulseChanged(e) => &e.service,
            MonitorEvent::FlatlineDetected(e) => &e.service,
            MonitorEvent::ServiceRecovered(e) => &e.service,
            MonitorEvent::AlertTriggered(e) => &e.service,
            MonitorEvent::ConfigUpdated(e) => &e.service,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            MonitorEvent::HeartbeatSent(e) => e.timestamp,
            MonitorEvent::HeartbeatReceived(e) => e.timestamp,
            MonitorEvent::HeartbeatFailed(e) => e.timestamp,
            MonitorEvent::PulseChanged(e) => e.timestamp,
            MonitorEvent::FlatlineDetected(e) => e.timestamp,
            MonitorEvent::ServiceRecovered(e) => e.timestamp,
            MonitorEvent::AlertTriggered(e) => e.timestamp,
            MonitorEvent::ConfigUpdated(e) => e.timestamp,
        }
    }

    /// The payload as loose JSON, for history entries and wire frames.
    pub fn payload_json(&self) -> Value {
        let result = match self {
            MonitorEvent::HeartbeatSent(e) => serde_json::to_value(e),
            MonitorEvent::HeartbeatReceived(e) => serde_json::to_value(e),
            MonitorEvent::HeartbeatFailed(e) => serde_json::to_value(e),
            MonitorEvent::PulseChanged(e) => serde_json::to_value(e),
            MonitorEvent::FlatlineDetected(e) => serde_json::to_value(e),
            MonitorEvent::ServiceRecovered(e) => serde_json::to_value(e),
            MonitorEvent::AlertTriggered(e) => serde_json::to_value(e),
            MonitorEvent::ConfigUpdated(e) => serde_json::to_value(e),
        };
        result.unwrap_or(Value::Null)
    }
}
