//! EventBus — process-local publish/subscribe hub.
//!
//! Dispatch is synchronous and in subscription order. Handler
//! registries and the bounded history ring are mutex-protected, but
//! handlers are always invoked off-lock, so a handler may publish
//! further events (the state machine republishes derived events this
//! way). A panicking handler is caught and logged; later handlers and
//! the publisher are unaffected.

use std::collections::{HashMap, VecDeque};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tracing::error;

use crate::event::{EventKind, MonitorEvent};

/// Maximum entries retained in the history ring, across all kinds.
pub const HISTORY_CAP: usize = 100;

/// Default number of entries returned by [`EventBus::history`].
pub const HISTORY_DEFAULT_LIMIT: usize = 50;

type Handler = Arc<dyn Fn(&MonitorEvent) + Send + Sync>;

/// Token returned by `subscribe`; passing it to `unsubscribe` removes
/// exactly that registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

struct Registration {
    id: u64,
    once: bool,
    handler: Handler,
}

/// One recorded publication.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub event: EventKind,
    pub payload: Value,
    pub timestamp: DateTime<Utc>,
}

struct Inner {
    handlers: Mutex<HashMap<EventKind, Vec<Registration>>>,
    history: Mutex<VecDeque<HistoryEntry>>,
    next_id: AtomicU64,
}

/// Process-local publish/subscribe hub with bounded event history.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<Inner>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                handlers: Mutex::new(HashMap::new()),
                history: Mutex::new(VecDeque::with_capacity(HISTORY_CAP)),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Register `handler` for `kind`. Multiple handlers per kind are
    /// allowed; dispatch preserves insertion order.
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&MonitorEvent) + Send + Sync + 'static,
    {
        self.register(kind, Arc::new(handler), false)
    }

    /// Like `subscribe`, but the handler is removed before its first
    /// invocation runs, so it fires at most once even if it panics.
    pub fn subscribe_once<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&MonitorEvent) + Send + Sync + 'static,
    {
        self.register(kind, Arc::new(handler), true)
    }

    fn register(&self, kind: EventKind, handler: Handler, once: bool) -> SubscriptionId {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .handlers
            .lock()
            .entry(kind)
            .or_default()
            .push(Registration { id, once, handler });
        SubscriptionId(id)
    }

    /// Remove one registration. Returns false (no-op) when the id is
    /// not registered under `kind`.
    pub fn unsubscribe(&self, kind: EventKind, id: SubscriptionId) -> bool {
        let mut handlers = self.inner.handlers.lock();
        let Some(list) = handlers.get_mut(&kind) else {
            return false;
        };
        let before = list.len();
        list.retain(|r| r.id != id.0);
        list.len() < before
    }

    /// Deliver `event` to every handler registered for its kind, in
    /// insertion order. Handler panics are contained and logged.
    pub fn publish(&self, event: MonitorEvent) {
        let kind = event.kind();

        {
            let mut history = self.inner.history.lock();
            if history.len() >= HISTORY_CAP {
                history.pop_front();
            }
            history.push_back(HistoryEntry {
                event: kind,
                payload: event.payload_json(),
                timestamp: event.timestamp(),
            });
        }

        // Snapshot under the lock; one-shot handlers are removed here,
        // before they run.
        let snapshot: Vec<Handler> = {
            let mut handlers = self.inner.handlers.lock();
            match handlers.get_mut(&kind) {
                Some(list) => {
                    let snap = list.iter().map(|r| r.handler.clone()).collect();
                    list.retain(|r| !r.once);
                    snap
                }
                None => Vec::new(),
            }
        };

        for handler in snapshot {
            if catch_unwind(AssertUnwindSafe(|| handler(&event))).is_err() {
                error!(event = kind.as_str(), "event handler panicked");
            }
        }
    }

    /// The last ≤ `limit` recorded publications, oldest first,
    /// optionally filtered by kind.
    pub fn history(&self, kind: Option<EventKind>, limit: usize) -> Vec<HistoryEntry> {
        let history = self.inner.history.lock();
        let mut entries: Vec<HistoryEntry> = history
            .iter()
            .rev()
            .filter(|e| kind.map_or(true, |k| e.event == k))
            .take(limit)
            .cloned()
            .collect();
        entries.reverse();
        entries
    }

    /// Number of handlers currently registered for `kind`.
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.inner
            .handlers
            .lock()
            .get(&kind)
            .map_or(0, |list| list.len())
    }

    /// Event kinds that currently have at least one handler.
    pub fn kinds(&self) -> Vec<EventKind> {
        self.inner
            .handlers
            .lock()
            .iter()
            .filter(|(_, list)| !list.is_empty())
            .map(|(kind, _)| *kind)
            .collect()
    }
}
