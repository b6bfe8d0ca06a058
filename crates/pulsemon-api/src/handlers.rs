//! Read API handlers.
//!
//! Handlers join the config view with live registry state and return
//! plain JSON. Validation failures map to 400, unknown services to
//! 404, and internal failures to 500 with `{"error": message}`.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

use pulsemon_config::{ConfigError, ServiceSpec};
use pulsemon_sched::SchedulerError;
use pulsemon_state::ServiceHealth;

use crate::ApiState;

fn error_response(msg: &str, status: StatusCode) -> impl IntoResponse {
    (status, Json(json!({ "error": msg })))
}

/// Joined config + live-state view of one service.
fn service_snapshot(spec: &ServiceSpec, health: &ServiceHealth) -> Value {
    json!({
        "name": spec.name,
        "url": spec.url,
        "tier": spec.tier,
        "probeInterval": spec.interval_secs(),
        "status": health.status,
        "lastCheck": health.last_check,
        "lastSuccess": health.last_success,
        "consecutiveFailures": health.consecutive_failures,
        "isFlatlined": health.is_flatlined,
        "uptime": health.uptime,
        "httpStatus": health.http_status,
    })
}

// ── Health ─────────────────────────────────────────────────────────

/// GET /api/health
pub async fn health(State(state): State<ApiState>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "uptime": state.started_at.elapsed().as_secs(),
        "timestamp": Utc::now(),
    }))
}

// ── Services ───────────────────────────────────────────────────────

/// GET /api/services
pub async fn list_services(State(state): State<ApiState>) -> impl IntoResponse {
    let snapshots: Vec<Value> = state
        .config
        .services()
        .iter()
        .map(|spec| service_snapshot(spec, &state.registry.health(&spec.name)))
        .collect();
    Json(snapshots)
}

/// GET /api/services/:name
pub async fn get_service(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    let Some(spec) = state.config.service(&name) else {
        return error_response("service not found", StatusCode::NOT_FOUND).into_response();
    };
    let mut snapshot = service_snapshot(&spec, &state.registry.health(&name));
    snapshot["checks"] = json!(spec.checks);
    snapshot["summary"] = json!(state.logs.summary(&name));
    Json(snapshot).into_response()
}

/// POST /api/services/:name/check
pub async fn trigger_check(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    match state.scheduler.trigger_check(&name).await {
        Ok(results) => Json(json!({ "service": name, "results": results })).into_response(),
        Err(SchedulerError::ServiceNotFound(_)) => {
            error_response("service not found", StatusCode::NOT_FOUND).into_response()
        }
    }
}

// ── History ────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct HistoryParams {
    hours: Option<u64>,
}

/// GET /api/history/:name?hours=N
pub async fn service_history(
    State(state): State<ApiState>,
    Path(name): Path<String>,
    Query(params): Query<HistoryParams>,
) -> impl IntoResponse {
    if state.config.service(&name).is_none() {
        return error_response("service not found", StatusCode::NOT_FOUND).into_response();
    }
    let hours = params.hours.unwrap_or(24);
    match state.logs.history(&name, hours) {
        Ok(entries) => Json(json!({
            "service": name,
            "hours": hours,
            "entries": entries,
        }))
        .into_response(),
        Err(e) => {
            error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response()
        }
    }
}

// ── Configuration ──────────────────────────────────────────────────

/// GET /api/config
pub async fn get_config(State(state): State<ApiState>) -> impl IntoResponse {
    Json(state.config.config().clone())
}

/// GET /api/config/services
pub async fn get_config_services(State(state): State<ApiState>) -> impl IntoResponse {
    Json(json!({ "services": state.config.services() }))
}

/// POST /api/config/services
pub async fn post_config_services(
    State(state): State<ApiState>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    let Some(services) = body.get("services").filter(|s| s.is_array()) else {
        return error_response("body must contain a services array", StatusCode::BAD_REQUEST)
            .into_response();
    };
    let services: Vec<ServiceSpec> = match serde_json::from_value(services.clone()) {
        Ok(services) => services,
        Err(e) => {
            return error_response(&format!("invalid service spec: {e}"), StatusCode::BAD_REQUEST)
                .into_response();
        }
    };

    match state.config.replace_services(services) {
        Ok(()) => Json(json!({
            "success": true,
            "message": "services updated; restart required to apply scheduling changes",
        }))
        .into_response(),
        Err(e @ ConfigError::Validation(_)) => {
            error_response(&e.to_string(), StatusCode::BAD_REQUEST).into_response()
        }
        Err(e) => {
            error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response()
        }
    }
}

/// GET /api/config/thresholds
pub async fn get_thresholds(State(state): State<ApiState>) -> impl IntoResponse {
    Json(state.config.thresholds_snapshot())
}

/// POST /api/config/thresholds
pub async fn post_thresholds(
    State(state): State<ApiState>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    let bound = |field: &str| body.get(field).and_then(Value::as_u64);
    let (Some(healthy), Some(warning), Some(degraded)) =
        (bound("healthy"), bound("warning"), bound("degraded"))
    else {
        return error_response(
            "healthy, warning and degraded must all be numbers",
            StatusCode::BAD_REQUEST,
        )
        .into_response();
    };

    match state.config.update_thresholds(healthy, warning, degraded) {
        Ok(()) => Json(json!({
            "success": true,
            "thresholds": state.config.thresholds_snapshot(),
        }))
        .into_response(),
        Err(e) => {
            error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response()
        }
    }
}

/// GET /api/config/audio
pub async fn get_audio(State(state): State<ApiState>) -> impl IntoResponse {
    Json(state.config.config().alerts.audio.clone())
}

// ── Alerts ─────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct AlertParams {
    limit: Option<usize>,
}

/// GET /api/alerts?limit=N
pub async fn list_alerts(
    State(state): State<ApiState>,
    Query(params): Query<AlertParams>,
) -> impl IntoResponse {
    let limit = params.limit.unwrap_or(50);
    Json(json!({ "alerts": state.alerts.recent(limit) }))
}

/// POST /api/alerts/mute/:name
pub async fn mute_service(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    state.alerts.mute(&name);
    Json(json!({ "success": true, "muted": name }))
}

/// POST /api/alerts/unmute/:name
pub async fn unmute_service(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    state.alerts.unmute(&name);
    Json(json!({ "success": true, "unmuted": name }))
}

// ── Scheduler ──────────────────────────────────────────────────────

/// GET /api/scheduler
pub async fn scheduler_status(State(state): State<ApiState>) -> impl IntoResponse {
    Json(json!({
        "running": state.scheduler.is_running(),
        "jobs": state.scheduler.statuses().await,
    }))
}
