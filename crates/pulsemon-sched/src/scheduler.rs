//! Scheduler — periodic probe loops per (service, check).
//!
//! Each declared check gets its own tokio task: a ~1 s startup delay
//! (so a fleet restart does not stampede the upstreams), then a fixed
//! interval at the service's cadence. The probe is awaited inline and
//! missed ticks are skipped, so a run never overlaps itself; services
//! are otherwise fully independent and a slow probe in one never
//! delays another.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use pulsemon_config::{CheckSpec, ServiceSpec};
use pulsemon_events::{ConfigUpdated, EventBus, HeartbeatResult, MonitorEvent};
use pulsemon_probe::ProbeEngine;

use crate::error::{SchedResult, SchedulerError};

/// Delay before the first probe of every job.
const STARTUP_DELAY: Duration = Duration::from_secs(1);

/// One periodic activity as reported by `statuses()`.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    /// `service::check`.
    pub key: String,
    pub next_invocation: DateTime<Utc>,
}

struct JobSlot {
    service: String,
    handle: JoinHandle<()>,
    shutdown_tx: watch::Sender<bool>,
    next_run: Arc<Mutex<DateTime<Utc>>>,
}

struct SchedInner {
    engine: ProbeEngine,
    bus: EventBus,
    services: parking_lot::RwLock<HashMap<String, ServiceSpec>>,
    jobs: RwLock<HashMap<String, JobSlot>>,
    running: AtomicBool,
}

/// Drives the periodic probe loops.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<SchedInner>,
}

impl Scheduler {
    pub fn new(engine: ProbeEngine, bus: EventBus, services: Vec<ServiceSpec>) -> Self {
        let services = services
            .into_iter()
            .map(|spec| (spec.name.clone(), spec))
            .collect();
        Self {
            inner: Arc::new(SchedInner {
                engine,
                bus,
                services: parking_lot::RwLock::new(services),
                jobs: RwLock::new(HashMap::new()),
                running: AtomicBool::new(false),
            }),
        }
    }

    /// Begin periodic execution. Idempotent.
    pub async fn start(&self) {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            debug!("scheduler already running");
            return;
        }

        let specs: Vec<ServiceSpec> = self.inner.services.read().values().cloned().collect();
        for spec in specs {
            self.spawn_service_jobs(&spec).await;
        }

        let jobs = self.inner.jobs.read().await;
        info!(jobs = jobs.len(), "scheduler started");
    }

    /// Cancel all periodic activity and wait until none remains.
    pub async fn stop(&self) {
        self.inner.running.store(false, Ordering::SeqCst);

        let slots: Vec<JobSlot> = {
            let mut jobs = self.inner.jobs.write().await;
            jobs.drain().map(|(_, slot)| slot).collect()
        };
        let count = slots.len();
        for slot in slots {
            let _ = slot.shutdown_tx.send(true);
            let _ = slot.handle.await;
        }
        info!(jobs = count, "scheduler stopped");
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// Replace a service's probe interval and reschedule its jobs.
    pub async fn update_interval(&self, service: &str, seconds: u64) -> SchedResult<()> {
        let spec = {
            let mut services = self.inner.services.write();
            let spec = services
                .get_mut(service)
                .ok_or_else(|| SchedulerError::ServiceNotFound(service.to_string()))?;
            spec.heartbeat_interval = Some(seconds);
            spec.clone()
        };

        if self.is_running() {
            self.remove_service_jobs(service).await;
            self.spawn_service_jobs(&spec).await;
        }

        self.inner
            .bus
            .publish(MonitorEvent::ConfigUpdated(ConfigUpdated {
                service: service.to_string(),
                field: "probeInterval".to_string(),
                value: serde_json::json!(seconds),
                timestamp: Utc::now(),
            }));
        info!(service, seconds, "probe interval updated");
        Ok(())
    }

    /// Remove a service's periodic activity.
    pub async fn pause_service(&self, service: &str) -> SchedResult<()> {
        self.require_service(service)?;
        self.remove_service_jobs(service).await;
        info!(service, "service paused");
        Ok(())
    }

    /// Reinstall a paused service's periodic activity.
    pub async fn resume_service(&self, service: &str) -> SchedResult<()> {
        let spec = self.require_service(service)?;
        if !self.is_running() {
            warn!(service, "resume requested while scheduler is stopped");
            return Ok(());
        }
        self.remove_service_jobs(service).await;
        self.spawn_service_jobs(&spec).await;
        info!(service, "service resumed");
        Ok(())
    }

    /// Run every check of a service once, concurrently, without
    /// disturbing the periodic cadence.
    pub async fn trigger_check(&self, service: &str) -> SchedResult<Vec<HeartbeatResult>> {
        let spec = self.require_service(service)?;
        let probes = spec
            .checks
            .iter()
            .map(|check| self.inner.engine.run_probe(&spec, check));
        Ok(join_all(probes).await)
    }

    /// Every active activity with its next cadence point.
    pub async fn statuses(&self) -> Vec<JobStatus> {
        let jobs = self.inner.jobs.read().await;
        let mut statuses: Vec<JobStatus> = jobs
            .iter()
            .map(|(key, slot)| JobStatus {
                key: key.clone(),
                next_invocation: *slot.next_run.lock(),
            })
            .collect();
        statuses.sort_by(|a, b| a.key.cmp(&b.key));
        statuses
    }

    // ── Internal helpers ────────────────────────────────────────────

    fn require_service(&self, service: &str) -> SchedResult<ServiceSpec> {
        self.inner
            .services
            .read()
            .get(service)
            .cloned()
            .ok_or_else(|| SchedulerError::ServiceNotFound(service.to_string()))
    }

    async fn spawn_service_jobs(&self, spec: &ServiceSpec) {
        let mut jobs = self.inner.jobs.write().await;
        for check in &spec.checks {
            let key = job_key(&spec.name, &check.name);
            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            let next_run = Arc::new(Mutex::new(Utc::now() + chrono::Duration::seconds(1)));

            let handle = tokio::spawn(run_probe_loop(
                self.inner.engine.clone(),
                spec.clone(),
                check.clone(),
                next_run.clone(),
                shutdown_rx,
            ));

            if let Some(old) = jobs.insert(
                key,
                JobSlot {
                    service: spec.name.clone(),
                    handle,
                    shutdown_tx,
                    next_run,
                },
            ) {
                let _ = old.shutdown_tx.send(true);
                old.handle.abort();
            }
        }
    }

    async fn remove_service_jobs(&self, service: &str) {
        let slots: Vec<JobSlot> = {
            let mut jobs = self.inner.jobs.write().await;
            let keys: Vec<String> = jobs
                .iter()
                .filter(|(_, slot)| slot.service == service)
                .map(|(key, _)| key.clone())
                .collect();
            keys.into_iter().filter_map(|key| jobs.remove(&key)).collect()
        };
        for slot in slots {
            let _ = slot.shutdown_tx.send(true);
            let _ = slot.handle.await;
        }
    }
}

fn job_key(service: &str, check: &str) -> String {
    format!("{service}::{check}")
}

/// The periodic loop for one (service, check).
async fn run_probe_loop(
    engine: ProbeEngine,
    service: ServiceSpec,
    check: CheckSpec,
    next_run: Arc<Mutex<DateTime<Utc>>>,
    mut shutdown: watch::Receiver<bool>,
) {
    // Spread the first probes out instead of firing at process start.
    tokio::select! {
        _ = tokio::time::sleep(STARTUP_DELAY) => {}
        _ = shutdown.changed() => return,
    }

    let period = Duration::from_secs(service.interval_secs().max(1));
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    debug!(service = %service.name, check = %check.name, period_secs = period.as_secs(), "probe loop starting");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                *next_run.lock() = Utc::now() + chrono::Duration::from_std(period)
                    .unwrap_or_else(|_| chrono::Duration::seconds(60));
                // Dropping the probe future on shutdown cancels the
                // underlying transport.
                tokio::select! {
                    _ = engine.run_probe(&service, &check) => {}
                    _ = shutdown.changed() => break,
                }
            }
            _ = shutdown.changed() => {
                debug!(service = %service.name, check = %check.name, "probe loop shutting down");
                break;
            }
        }
    }
}
