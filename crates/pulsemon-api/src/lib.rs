//! pulsemon-api — HTTP read API and streaming endpoint.
//!
//! Provides axum route handlers over the live monitor state. Reads
//! are CORS-open (the dashboard is served separately); the WebSocket
//! endpoint lives on its own router so the daemon can bind it to the
//! dedicated streaming port.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/api/health` | Daemon liveness and uptime |
//! | GET | `/api/services` | Snapshot of every monitored service |
//! | GET | `/api/services/:name` | Snapshot + checks + today's summary |
//! | POST | `/api/services/:name/check` | Run all checks once, immediately |
//! | GET | `/api/history/:name?hours=N` | Trailing heartbeat entries |
//! | GET | `/api/config` | Daemon configuration |
//! | GET/POST | `/api/config/services` | Service declarations |
//! | GET/POST | `/api/config/thresholds` | Latency thresholds |
//! | GET | `/api/config/audio` | Alert audio settings |
//! | GET | `/api/alerts?limit=N` | Recent alerts |
//! | POST | `/api/alerts/mute/:name` | Mute a service's alerts |
//! | POST | `/api/alerts/unmute/:name` | Unmute a service's alerts |
//! | GET | `/api/scheduler` | Job keys and next invocations |
//! | GET | `/ws` | Streaming channel (separate router) |

pub mod handlers;
pub mod ws;

use std::sync::Arc;
use std::time::Instant;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

use pulsemon_broadcast::Broadcaster;
use pulsemon_config::ConfigStore;
use pulsemon_logstore::LogStore;
use pulsemon_sched::Scheduler;
use pulsemon_state::{AlertCenter, StateRegistry};

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub config: Arc<ConfigStore>,
    pub registry: StateRegistry,
    pub scheduler: Scheduler,
    pub logs: LogStore,
    pub alerts: AlertCenter,
    pub broadcaster: Broadcaster,
    pub started_at: Instant,
}

/// Build the read API router, CORS-open for any origin.
pub fn build_router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/services", get(handlers::list_services))
        .route("/services/{name}", get(handlers::get_service))
        .route("/services/{name}/check", post(handlers::trigger_check))
        .route("/history/{name}", get(handlers::service_history))
        .route("/config", get(handlers::get_config))
        .route(
            "/config/services",
            get(handlers::get_config_services).post(handlers::post_config_services),
        )
        .route(
            "/config/thresholds",
            get(handlers::get_thresholds).post(handlers::post_thresholds),
        )
        .route("/config/audio", get(handlers::get_audio))
        .route("/alerts", get(handlers::list_alerts))
        .route("/alerts/mute/{name}", post(handlers::mute_service))
        .route("/alerts/unmute/{name}", post(handlers::unmute_service))
        .route("/scheduler", get(handlers::scheduler_status))
        .with_state(state);

    Router::new().nest("/api", api_routes).layer(cors)
}

/// Build the streaming router for the dedicated WebSocket port.
pub fn ws_router(state: ApiState) -> Router {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .with_state(state)
}
