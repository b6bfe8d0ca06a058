//! Domain types for the PulseMon configuration files.
//!
//! Three human-edited JSON files drive the monitor: `services.json`
//! (what to probe), `thresholds.json` (how to classify latencies and
//! when to flatline), and `config.json` (server ports, log path,
//! alert audio). All field names on disk are camelCase.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

// ── Services ──────────────────────────────────────────────────────

/// One monitored upstream endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSpec {
    /// Stable unique name; used as the key everywhere.
    pub name: String,
    /// Target URL probes are POSTed to.
    pub url: String,
    /// Priority class; controls the flatline threshold and the
    /// default probe interval.
    #[serde(default)]
    pub tier: Tier,
    /// Probe interval in seconds; tier default when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heartbeat_interval: Option<u64>,
    /// Named probe definitions; each runs on its own schedule.
    pub checks: Vec<CheckSpec>,
    /// Bearer token for the authenticated/query strategies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
}

impl ServiceSpec {
    /// Effective probe interval in seconds.
    pub fn interval_secs(&self) -> u64 {
        self.heartbeat_interval
            .unwrap_or_else(|| self.tier.default_interval_secs())
    }
}

/// Service priority class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Critical,
    #[default]
    Standard,
    Low,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Critical => "critical",
            Tier::Standard => "standard",
            Tier::Low => "low",
        }
    }

    /// Default probe cadence when `heartbeatInterval` is not set.
    pub fn default_interval_secs(&self) -> u64 {
        match self {
            Tier::Critical => 30,
            Tier::Standard => 60,
            Tier::Low => 300,
        }
    }

    /// Built-in consecutive-failure count that triggers flatline,
    /// used when neither the tier nor the default section overrides it.
    pub fn default_flatline_threshold(&self) -> u32 {
        match self {
            Tier::Critical => 2,
            Tier::Standard => 3,
            Tier::Low => 5,
        }
    }
}

/// A named probe definition on a service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CheckSpec {
    /// Display name, unique within the service.
    pub name: String,
    /// Which probe strategy executes this check.
    pub strategy: StrategyKind,
    /// Query payload for the query strategy (basic falls back to a
    /// minimal introspection query).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    /// Variables accompanying `query`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<Value>,
    /// Per-check timeout in milliseconds.
    #[serde(default = "default_check_timeout_ms")]
    pub timeout: u64,
}

pub(crate) fn default_check_timeout_ms() -> u64 {
    10_000
}

/// Built-in probe strategy identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Basic,
    Authenticated,
    Query,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Basic => "basic",
            StrategyKind::Authenticated => "authenticated",
            StrategyKind::Query => "query",
        }
    }
}

/// On-disk shape of `services.json`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ServicesFile {
    pub services: Vec<ServiceSpec>,
}

// ── Thresholds ────────────────────────────────────────────────────

/// On-disk shape of `thresholds.json`.
///
/// Tier overrides resolve before the default section; built-in
/// per-tier values apply when neither says anything.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Thresholds {
    pub default: ThresholdBands,
    #[serde(default)]
    pub tiers: TierOverrides,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThresholdBands {
    pub healthy: LatencyBound,
    pub warning: WarningBound,
    #[serde(default)]
    pub critical: CriticalBound,
}

/// Upper latency bound in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LatencyBound {
    pub max: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WarningBound {
    pub max: u64,
    /// Consecutive warning-range responses required before the state
    /// machine enters warning.
    #[serde(default = "default_sustained_count")]
    pub sustained_count: u32,
}

fn default_sustained_count() -> u32 {
    3
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct CriticalBound {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consecutive_failures: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct TierOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub critical: Option<TierThresholds>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub standard: Option<TierThresholds>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub low: Option<TierThresholds>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct TierThresholds {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub healthy: Option<LatencyBound>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub critical: Option<CriticalBound>,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            default: ThresholdBands {
                healthy: LatencyBound { max: 200 },
                warning: WarningBound {
                    max: 500,
                    sustained_count: default_sustained_count(),
                },
                critical: CriticalBound::default(),
            },
            tiers: TierOverrides::default(),
        }
    }
}

impl Thresholds {
    /// Latency at or below which a successful probe is healthy.
    pub fn healthy_max(&self) -> u64 {
        self.default.healthy.max
    }

    /// Latency at or below which a successful probe is warning.
    pub fn warning_max(&self) -> u64 {
        self.default.warning.max
    }

    pub fn sustained_count(&self) -> u32 {
        self.default.warning.sustained_count
    }

    fn tier_overrides(&self, tier: Tier) -> Option<&TierThresholds> {
        match tier {
            Tier::Critical => self.tiers.critical.as_ref(),
            Tier::Standard => self.tiers.standard.as_ref(),
            Tier::Low => self.tiers.low.as_ref(),
        }
    }

    /// Consecutive transport failures that flatline a service of the
    /// given tier. Resolution: tier override → default section →
    /// built-in per-tier value.
    pub fn flatline_threshold(&self, tier: Tier) -> u32 {
        self.tier_overrides(tier)
            .and_then(|t| t.critical.as_ref())
            .and_then(|c| c.consecutive_failures)
            .or(self.default.critical.consecutive_failures)
            .unwrap_or_else(|| tier.default_flatline_threshold())
    }
}

// ── Daemon config ─────────────────────────────────────────────────

/// On-disk shape of `config.json`.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct MonitorConfig {
    pub server: ServerConfig,
    pub monitoring: MonitoringConfig,
    pub alerts: AlertsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct ServerConfig {
    pub port: u16,
    pub websocket_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            websocket_port: 8081,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct MonitoringConfig {
    /// Directory daily log documents are written to.
    pub log_path: PathBuf,
    /// Log file retention in hours.
    pub history_retention: u64,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            log_path: PathBuf::from("./logs"),
            history_retention: 24,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct AlertsConfig {
    pub audio: AudioConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    /// Whether alerts should request a sound on the client.
    pub enabled: bool,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}
