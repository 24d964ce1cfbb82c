//! Append-only ordered event log shared between the connection task and
//! observers.
//!
//! Entry ids come from a process-wide counter so they stay unique and
//! strictly increasing even across manager instances. Past entries are never
//! mutated or removed except by an explicit [`EventLog::clear`].

use crate::event_handlers::EventHandlers;
use crate::models::{now_ms, EventKind, LogEvent};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Maximum number of entries returned by [`EventLog::recent`]. The log may
/// retain more internally; this only bounds the display view.
pub const RECENT_EVENT_LIMIT: usize = 200;

/// Process-wide event id counter.
static EVENT_ID: AtomicU64 = AtomicU64::new(1);

/// Clonable handle to the ordered event log.
#[derive(Clone, Default)]
pub struct EventLog {
    entries: Arc<Mutex<Vec<LogEvent>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry and notify the `on_log` handler, if any.
    pub(crate) fn push(&self, kind: EventKind, payload: impl Into<String>, handlers: &EventHandlers) {
        let event = LogEvent {
            id: EVENT_ID.fetch_add(1, Ordering::Relaxed),
            timestamp_ms: now_ms(),
            kind,
            payload: payload.into(),
        };
        {
            let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
            entries.push(event.clone());
        }
        handlers.emit_log(&event);
    }

    /// Remove all entries. Idempotent; a no-op on an already-empty log.
    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    /// Every entry, in append order.
    pub fn snapshot(&self) -> Vec<LogEvent> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// The most recent entries, bounded to [`RECENT_EVENT_LIMIT`].
    pub fn recent(&self) -> Vec<LogEvent> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let start = entries.len().saturating_sub(RECENT_EVENT_LIMIT);
        entries[start..].to_vec()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_strictly_increasing() {
        let log = EventLog::new();
        let handlers = EventHandlers::default();
        for i in 0..5 {
            log.push(EventKind::Info, format!("entry {}", i), &handlers);
        }
        let snapshot = log.snapshot();
        assert_eq!(snapshot.len(), 5);
        for pair in snapshot.windows(2) {
            assert!(pair[1].id > pair[0].id);
        }
    }

    #[test]
    fn ids_stay_unique_across_logs() {
        let handlers = EventHandlers::default();
        let a = EventLog::new();
        let b = EventLog::new();
        a.push(EventKind::Info, "a", &handlers);
        b.push(EventKind::Info, "b", &handlers);
        assert_ne!(a.snapshot()[0].id, b.snapshot()[0].id);
    }

    #[test]
    fn clear_is_idempotent() {
        let log = EventLog::new();
        let handlers = EventHandlers::default();
        log.push(EventKind::Sent, "payload", &handlers);
        log.clear();
        assert!(log.is_empty());
        log.clear();
        assert!(log.is_empty());
    }

    #[test]
    fn recent_is_bounded_to_the_display_limit() {
        let log = EventLog::new();
        let handlers = EventHandlers::default();
        for i in 0..(RECENT_EVENT_LIMIT + 25) {
            log.push(EventKind::Received, format!("n{}", i), &handlers);
        }
        let recent = log.recent();
        assert_eq!(recent.len(), RECENT_EVENT_LIMIT);
        // The view keeps the most recent entries, oldest first.
        assert_eq!(recent.last().unwrap().payload, format!("n{}", RECENT_EVENT_LIMIT + 24));
        assert_eq!(log.len(), RECENT_EVENT_LIMIT + 25);
    }

    #[test]
    fn on_log_handler_fires_per_append() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        let handlers = EventHandlers::new().on_log(move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        let log = EventLog::new();
        log.push(EventKind::Info, "one", &handlers);
        log.push(EventKind::Info, "two", &handlers);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }
}
