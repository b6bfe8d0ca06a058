//! pulsemond — the PulseMon daemon.
//!
//! Loads the config directory, wires the monitoring pipeline onto the
//! event bus, starts the per-check probe schedules, and serves the
//! read API and the streaming WebSocket on their configured ports.
//!
//! # Usage
//!
//! ```text
//! pulsemond --config-dir ./config
//! pulsemond --config-dir /etc/pulsemon --port 9000 --ws-port 9001
//! ```
//!
//! Exits 0 on a clean shutdown, 1 when startup fails (missing or
//! invalid config, uncreatable log directory, port in use).

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use tokio::sync::watch;
use tracing::info;

use pulsemon_api::ApiState;
use pulsemon_broadcast::Broadcaster;
use pulsemon_config::ConfigStore;
use pulsemon_events::EventBus;
use pulsemon_logstore::LogStore;
use pulsemon_probe::{ProbeEngine, StrategyRegistry};
use pulsemon_sched::Scheduler;
use pulsemon_state::{AlertCenter, StateRegistry};

#[derive(Parser)]
#[command(name = "pulsemond", about = "PulseMon health-monitoring daemon")]
struct Cli {
    /// Directory holding services.json, thresholds.json and config.json.
    #[arg(long, default_value = "./config")]
    config_dir: PathBuf,

    /// Override the API port from config.json.
    #[arg(long)]
    port: Option<u16>,

    /// Override the WebSocket port from config.json.
    #[arg(long)]
    ws_port: Option<u16>,

    /// Override the log directory from config.json.
    #[arg(long)]
    log_path: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,pulsemond=debug,pulsemon=debug".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    run(cli).await
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    info!("PulseMon daemon starting");

    // ── Configuration (fatal on failure) ───────────────────────
    let config = Arc::new(ConfigStore::load(&cli.config_dir)?);
    let services = config.services();
    let api_port = cli.port.unwrap_or(config.config().server.port);
    let ws_port = cli.ws_port.unwrap_or(config.config().server.websocket_port);
    let log_path = cli
        .log_path
        .clone()
        .unwrap_or_else(|| config.config().monitoring.log_path.clone());
    info!(
        services = services.len(),
        api_port, ws_port, "configuration loaded"
    );

    // ── Initialize subsystems ──────────────────────────────────
    let bus = EventBus::new();

    // The log directory must exist before any subscriber is wired.
    let logs = LogStore::open(&log_path, config.config().monitoring.history_retention)?;

    // Subscription order matters: observers of raw heartbeats are
    // wired before the state machine, so every subscriber sees a
    // heartbeat before the transitions it caused.
    logs.attach(&bus);

    let broadcaster = Broadcaster::new();
    broadcaster.attach(&bus);

    let registry = StateRegistry::new(bus.clone(), config.thresholds());
    registry.set_tiers(&services);
    registry.attach();

    let alerts = AlertCenter::new(bus.clone(), config.config().alerts.audio.enabled);
    alerts.attach();
    info!("event pipeline wired");

    let engine = ProbeEngine::new(StrategyRegistry::with_defaults(), config.thresholds(), bus.clone());
    let scheduler = Scheduler::new(engine, bus.clone(), services);
    scheduler.start().await;

    // ── Shutdown signal ────────────────────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Midnight log rotation.
    let rotation_handle = tokio::spawn(pulsemon_logstore::run_rotation(
        logs.clone(),
        shutdown_rx.clone(),
    ));

    {
        let shutdown_tx = shutdown_tx.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutdown signal received");
                let _ = shutdown_tx.send(true);
            }
        });
    }

    // ── Serve ──────────────────────────────────────────────────
    let state = ApiState {
        config,
        registry,
        scheduler: scheduler.clone(),
        logs,
        alerts,
        broadcaster,
        started_at: Instant::now(),
    };

    let api_addr = SocketAddr::from(([0, 0, 0, 0], api_port));
    let api_listener = tokio::net::TcpListener::bind(api_addr).await?;
    info!(%api_addr, "API server listening");

    let ws_addr = SocketAddr::from(([0, 0, 0, 0], ws_port));
    let ws_listener = tokio::net::TcpListener::bind(ws_addr).await?;
    info!(%ws_addr, "streaming server listening");

    let api_server = axum::serve(api_listener, pulsemon_api::build_router(state.clone()))
        .with_graceful_shutdown(wait_for_shutdown(shutdown_rx.clone()));
    let ws_server = axum::serve(ws_listener, pulsemon_api::ws_router(state))
        .with_graceful_shutdown(wait_for_shutdown(shutdown_rx));

    tokio::try_join!(api_server, ws_server)?;

    // ── Drain ──────────────────────────────────────────────────
    scheduler.stop().await;
    let _ = shutdown_tx.send(true);
    let _ = rotation_handle.await;

    info!("PulseMon daemon stopped");
    Ok(())
}

async fn wait_for_shutdown(mut shutdown: watch::Receiver<bool>) {
    let _ = shutdown.changed().await;
}
