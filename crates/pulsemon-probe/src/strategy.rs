//! Probe strategies.
//!
//! Every strategy answers the same contract: one POST against the
//! service URL, completed within the check's timeout, mapped to a
//! [`ProbeResult`]. Transport errors never escape as `Err`: they
//! become `{success: false, hasResponse: false}` results so the state
//! machine can distinguish unreachable from sick.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use pulsemon_config::{CheckSpec, ServiceSpec, StrategyKind};
use pulsemon_events::ProbeResult;

/// Query sent when a check does not declare one.
pub const DEFAULT_QUERY: &str = "{ __typename }";

/// The common probe contract. Implementations must return within the
/// check's timeout, cancelling the transport on expiry.
#[async_trait]
pub trait ProbeStrategy: Send + Sync {
    async fn probe(&self, service: &ServiceSpec, check: &CheckSpec) -> ProbeResult;
}

/// Maps strategy identifiers to implementations.
pub struct StrategyRegistry {
    strategies: HashMap<StrategyKind, Arc<dyn ProbeStrategy>>,
}

impl StrategyRegistry {
    /// Registry with the three built-in strategies sharing one client.
    pub fn with_defaults() -> Self {
        let client = Client::new();
        let mut strategies: HashMap<StrategyKind, Arc<dyn ProbeStrategy>> = HashMap::new();
        strategies.insert(
            StrategyKind::Basic,
            Arc::new(BasicStrategy {
                client: client.clone(),
            }),
        );
        strategies.insert(
            StrategyKind::Authenticated,
            Arc::new(AuthenticatedStrategy {
                client: client.clone(),
            }),
        );
        strategies.insert(StrategyKind::Query, Arc::new(QueryStrategy { client }));
        Self { strategies }
    }

    /// An empty registry; used to exercise the unknown-strategy path.
    pub fn empty() -> Self {
        Self {
            strategies: HashMap::new(),
        }
    }

    pub fn insert(&mut self, kind: StrategyKind, strategy: Arc<dyn ProbeStrategy>) {
        self.strategies.insert(kind, strategy);
    }

    pub fn get(&self, kind: StrategyKind) -> Option<Arc<dyn ProbeStrategy>> {
        self.strategies.get(&kind).cloned()
    }
}

// ── Built-in strategies ───────────────────────────────────────────

/// POSTs a minimal query; success is HTTP 200 with a JSON body.
pub struct BasicStrategy {
    client: Client,
}

#[async_trait]
impl ProbeStrategy for BasicStrategy {
    async fn probe(&self, service: &ServiceSpec, check: &CheckSpec) -> ProbeResult {
        let body = json!({
            "query": check.query.as_deref().unwrap_or(DEFAULT_QUERY),
        });
        post_json(&self.client, service, check, body, false).await
    }
}

/// Basic plus a bearer token, and auth-shaped GraphQL errors fail the
/// probe even on HTTP 200.
pub struct AuthenticatedStrategy {
    client: Client,
}

#[async_trait]
impl ProbeStrategy for AuthenticatedStrategy {
    async fn probe(&self, service: &ServiceSpec, check: &CheckSpec) -> ProbeResult {
        let body = json!({
            "query": check.query.as_deref().unwrap_or(DEFAULT_QUERY),
        });
        let mut result = post_json(&self.client, service, check, body, true).await;
        if result.success {
            if let Some(data) = &result.data {
                let auth_error = graphql_error_messages(data).iter().any(|m| {
                    let m = m.to_lowercase();
                    m.contains("auth") || m.contains("unauthorized")
                });
                if auth_error {
                    result.success = false;
                    result.error = Some("Authentication error".to_string());
                }
            }
        }
        result
    }
}

/// Runs the caller-supplied query and variables; any GraphQL error in
/// the response fails the probe.
pub struct QueryStrategy {
    client: Client,
}

#[async_trait]
impl ProbeStrategy for QueryStrategy {
    async fn probe(&self, service: &ServiceSpec, check: &CheckSpec) -> ProbeResult {
        let body = json!({
            "query": check.query.as_deref().unwrap_or(DEFAULT_QUERY),
            "variables": check.variables.clone().unwrap_or_else(|| json!({})),
        });
        let mut result = post_json(&self.client, service, check, body, true).await;
        if result.success {
            if let Some(data) = &result.data {
                let errors = graphql_error_messages(data);
                if let Some(first) = errors.first() {
                    result.success = false;
                    result.error = Some(first.clone());
                }
            }
        }
        result
    }
}

// ── Shared transport ──────────────────────────────────────────────

/// One JSON POST with the check's deadline. The timeout covers the
/// whole exchange; reqwest aborts the connection on expiry.
async fn post_json(
    client: &Client,
    service: &ServiceSpec,
    check: &CheckSpec,
    body: Value,
    bearer: bool,
) -> ProbeResult {
    let timeout = Duration::from_millis(check.timeout);
    let mut request = client.post(&service.url).timeout(timeout).json(&body);
    if bearer {
        if let Some(token) = &service.auth_token {
            request = request.bearer_auth(token);
        }
    }

    let response = match request.send().await {
        Ok(response) => response,
        Err(e) if e.is_timeout() => {
            debug!(service = %service.name, check = %check.name, "probe timed out");
            return ProbeResult::transport_failure("Request timeout");
        }
        Err(e) => {
            debug!(service = %service.name, check = %check.name, error = %e, "probe transport failed");
            return ProbeResult::transport_failure(e.to_string());
        }
    };

    let status = response.status().as_u16();
    let text = match response.text().await {
        Ok(text) => text,
        Err(e) if e.is_timeout() => {
            return ProbeResult::transport_failure("Request timeout");
        }
        Err(e) => {
            return ProbeResult {
                success: false,
                has_response: true,
                http_status: status,
                data: None,
                error: Some(e.to_string()),
            };
        }
    };

    let parsed: Result<Value, _> = serde_json::from_str(&text);

    if status == 200 {
        match parsed {
            Ok(data) => ProbeResult {
                success: true,
                has_response: true,
                http_status: status,
                data: Some(data),
                error: None,
            },
            Err(e) => ProbeResult {
                success: false,
                has_response: true,
                http_status: status,
                data: None,
                error: Some(format!("invalid JSON body: {e}")),
            },
        }
    } else {
        ProbeResult {
            success: false,
            has_response: true,
            http_status: status,
            data: parsed.ok(),
            error: Some(format!("HTTP {status}")),
        }
    }
}

/// Messages from a GraphQL-style `errors[]` array, if present.
fn graphql_error_messages(data: &Value) -> Vec<String> {
    data.get("errors")
        .and_then(Value::as_array)
        .map(|errors| {
            errors
                .iter()
                .filter_map(|e| {
                    e.get("message")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .or_else(|| e.as_str().map(str::to_string))
                })
                .collect()
        })
        .unwrap_or_default()
}
