//! LogStore — per-service per-day log documents.
//!
//! One JSON document per `(service, local date)` holds the day's
//! heartbeat entries, state-change events, and a running summary.
//! Documents are cached in memory and written through on every
//! append: the whole document is re-serialized and overwritten, which
//! keeps the summary consistent with the arrays at all times.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Local, NaiveDate, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info};

use pulsemon_events::{EventBus, EventKind, HeartbeatResult, MonitorEvent, PulseStatus};

use crate::error::{LogResult, LogStoreError};

/// File names replace runs of whitespace in service names.
pub fn sanitize_service_name(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join("_")
}

/// One probe outcome in the daily document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatEntry {
    pub timestamp: DateTime<Utc>,
    pub check: String,
    pub status: PulseStatus,
    pub response_time_ms: u64,
    pub success: bool,
    pub http_status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One state-change event in the daily document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EventEntry {
    pub timestamp: DateTime<Utc>,
    pub event: String,
    pub details: Value,
}

/// Running aggregate over the day's heartbeats.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DailySummary {
    pub check_count: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub avg_response_time: f64,
    pub uptime: f64,
}

impl Default for DailySummary {
    fn default() -> Self {
        Self {
            check_count: 0,
            success_count: 0,
            failure_count: 0,
            avg_response_time: 0.0,
            uptime: 100.0,
        }
    }
}

/// The persisted per-(service, day) document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DailyLog {
    pub service: String,
    pub date: String,
    pub heartbeats: Vec<HeartbeatEntry>,
    pub events: Vec<EventEntry>,
    pub summary: DailySummary,
}

impl DailyLog {
    fn new(service: &str, date: NaiveDate) -> Self {
        Self {
            service: service.to_string(),
            date: date.format("%Y-%m-%d").to_string(),
            heartbeats: Vec::new(),
            events: Vec::new(),
            summary: DailySummary::default(),
        }
    }

    /// Recompute the summary from the heartbeat array. Average
    /// latency covers successful entries with positive latency.
    fn recompute_summary(&mut self) {
        let check_count = self.heartbeats.len() as u64;
        let success_count = self.heartbeats.iter().filter(|h| h.success).count() as u64;
        let failure_count = check_count - success_count;

        let latencies: Vec<u64> = self
            .heartbeats
            .iter()
            .filter(|h| h.success && h.response_time_ms > 0)
            .map(|h| h.response_time_ms)
            .collect();
        let avg_response_time = if latencies.is_empty() {
            0.0
        } else {
            latencies.iter().sum::<u64>() as f64 / latencies.len() as f64
        };

        let uptime = if check_count == 0 {
            100.0
        } else {
            success_count as f64 / check_count as f64 * 100.0
        };

        self.summary = DailySummary {
            check_count,
            success_count,
            failure_count,
            avg_response_time,
            uptime,
        };
    }
}

#[derive(Debug)]
struct StoreInner {
    dir: PathBuf,
    retention_hours: u64,
    cache: Mutex<HashMap<PathBuf, DailyLog>>,
}

/// Write-through store of daily log documents.
#[derive(Clone, Debug)]
pub struct LogStore {
    inner: Arc<StoreInner>,
}

impl LogStore {
    /// Open the store, creating the log directory synchronously.
    /// Callers treat failure as fatal.
    pub fn open(dir: &Path, retention_hours: u64) -> LogResult<Self> {
        std::fs::create_dir_all(dir).map_err(|source| LogStoreError::CreateDir {
            path: dir.to_path_buf(),
            source,
        })?;
        info!(dir = %dir.display(), retention_hours, "log store opened");
        Ok(Self {
            inner: Arc::new(StoreInner {
                dir: dir.to_path_buf(),
                retention_hours,
                cache: Mutex::new(HashMap::new()),
            }),
        })
    }

    /// Wire the store onto the bus. Write failures are logged and the
    /// entry dropped; they never block dispatch.
    pub fn attach(&self, bus: &EventBus) {
        for kind in [EventKind::HeartbeatReceived, EventKind::HeartbeatFailed] {
            let store = self.clone();
            bus.subscribe(kind, move |ev| {
                let hb = match ev {
                    MonitorEvent::HeartbeatReceived(hb) => hb,
                    MonitorEvent::HeartbeatFailed(hb) => hb,
                    _ => return,
                };
                if let Err(e) = store.append_heartbeat(hb) {
                    error!(service = %hb.service, error = %e, "dropping heartbeat log entry");
                }
            });
        }

        for kind in [EventKind::FlatlineDetected, EventKind::ServiceRecovered] {
            let store = self.clone();
            bus.subscribe(kind, move |ev| {
                let result = store.append_event(
                    ev.service(),
                    ev.kind().as_str(),
                    ev.payload_json(),
                    ev.timestamp(),
                );
                if let Err(e) = result {
                    error!(service = %ev.service(), error = %e, "dropping event log entry");
                }
            });
        }
    }

    /// Append one probe outcome and refresh the day's summary.
    pub fn append_heartbeat(&self, hb: &HeartbeatResult) -> LogResult<()> {
        let date = hb.timestamp.with_timezone(&Local).date_naive();
        self.with_doc(&hb.service, date, |doc| {
            doc.heartbeats.push(HeartbeatEntry {
                timestamp: hb.timestamp,
                check: hb.check.clone(),
                status: hb.pulse.status,
                response_time_ms: hb.response_time_ms,
                success: hb.success,
                http_status: hb.http_status,
                error: hb.error.clone(),
            });
            doc.recompute_summary();
        })
    }

    /// Append one state-change event; the summary is untouched.
    pub fn append_event(
        &self,
        service: &str,
        event: &str,
        details: Value,
        timestamp: DateTime<Utc>,
    ) -> LogResult<()> {
        let date = timestamp.with_timezone(&Local).date_naive();
        self.with_doc(service, date, |doc| {
            doc.events.push(EventEntry {
                timestamp,
                event: event.to_string(),
                details,
            });
        })
    }

    /// Heartbeat entries within the trailing `hours`, ascending by
    /// timestamp, gathered from the covering daily documents.
    pub fn history(&self, service: &str, hours: u64) -> LogResult<Vec<HeartbeatEntry>> {
        let cutoff = Utc::now() - chrono::Duration::hours(hours as i64);
        let today = Local::now().date_naive();
        let days_back = hours.div_ceil(24) as i64;

        let mut entries = Vec::new();
        for offset in (0..=days_back).rev() {
            let date = today - chrono::Duration::days(offset);
            let path = self.doc_path(service, date);
            if let Some(doc) = self.read_doc(&path)? {
                entries.extend(
                    doc.heartbeats
                        .into_iter()
                        .filter(|h| h.timestamp >= cutoff),
                );
            }
        }
        entries.sort_by_key(|e| e.timestamp);
        Ok(entries)
    }

    /// Today's summary, or the zero-initialized one when no document
    /// exists yet.
    pub fn summary(&self, service: &str) -> DailySummary {
        let path = self.doc_path(service, Local::now().date_naive());
        match self.read_doc(&path) {
            Ok(Some(doc)) => doc.summary,
            Ok(None) => DailySummary::default(),
            Err(e) => {
                error!(service, error = %e, "failed to read summary");
                DailySummary::default()
            }
        }
    }

    /// Delete log files older than the retention window and evict
    /// their cache entries. Returns the number of files removed.
    pub fn rotate(&self) -> LogResult<usize> {
        let cutoff = SystemTime::now() - Duration::from_secs(self.inner.retention_hours * 3600);
        self.rotate_older_than(cutoff)
    }

    /// Rotation against an explicit cutoff; files with an mtime
    /// before it are removed.
    pub fn rotate_older_than(&self, cutoff: SystemTime) -> LogResult<usize> {
        let entries = std::fs::read_dir(&self.inner.dir).map_err(|source| LogStoreError::Read {
            path: self.inner.dir.clone(),
            source,
        })?;

        let mut removed = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Ok(metadata) = entry.metadata() else {
                continue;
            };
            let Ok(modified) = metadata.modified() else {
                continue;
            };
            if modified < cutoff {
                match std::fs::remove_file(&path) {
                    Ok(()) => {
                        self.inner.cache.lock().remove(&path);
                        debug!(path = %path.display(), "rotated out log file");
                        removed += 1;
                    }
                    Err(e) => {
                        error!(path = %path.display(), error = %e, "failed to remove log file");
                    }
                }
            }
        }

        if removed > 0 {
            info!(removed, "log rotation removed stale files");
        }
        Ok(removed)
    }

    // ── Document plumbing ───────────────────────────────────────────

    fn doc_path(&self, service: &str, date: NaiveDate) -> PathBuf {
        self.inner.dir.join(format!(
            "{}-{}.json",
            sanitize_service_name(service),
            date.format("%Y-%m-%d")
        ))
    }

    /// Load (or create) the document, apply `mutate`, and write the
    /// whole document back. The cache lock is held across the write
    /// so cached and on-disk state never diverge.
    fn with_doc<F>(&self, service: &str, date: NaiveDate, mutate: F) -> LogResult<()>
    where
        F: FnOnce(&mut DailyLog),
    {
        let path = self.doc_path(service, date);
        let mut cache = self.inner.cache.lock();
        let doc = match cache.entry(path.clone()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let loaded = load_from_disk(entry.key())?
                    .unwrap_or_else(|| DailyLog::new(service, date));
                entry.insert(loaded)
            }
        };
        mutate(doc);

        let content =
            serde_json::to_string_pretty(doc).map_err(|e| LogStoreError::Corrupt {
                path: path.clone(),
                message: e.to_string(),
            })?;
        std::fs::write(&path, content).map_err(|source| LogStoreError::Write { path, source })
    }

    /// Read-only document access; never creates a file.
    fn read_doc(&self, path: &Path) -> LogResult<Option<DailyLog>> {
        if let Some(doc) = self.inner.cache.lock().get(path) {
            return Ok(Some(doc.clone()));
        }
        load_from_disk(path)
    }
}

fn load_from_disk(path: &Path) -> LogResult<Option<DailyLog>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path).map_err(|source| LogStoreError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let doc = serde_json::from_str(&content).map_err(|e| LogStoreError::Corrupt {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    Ok(Some(doc))
}
