//! Instrumentation hooks.
//!
//! The coordinator reports one [`IdempotencyEvent`] per processed request to
//! the observer injected at construction. [`NoopObserver`] is the default.

use std::sync::Mutex;

use tracing::info;

use super::Outcome;

// == Event ==
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdempotencyEvent {
    pub method: String,
    pub path: String,
    pub key: String,
    pub outcome: Outcome,
}

// == Observer Trait ==
pub trait IdempotencyObserver: Send + Sync {
    fn on_event(&self, event: &IdempotencyEvent);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl IdempotencyObserver for NoopObserver {
    fn on_event(&self, _event: &IdempotencyEvent) {}
}

/// Logs every event at info level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl IdempotencyObserver for TracingObserver {
    fn on_event(&self, event: &IdempotencyEvent) {
        info!(
            method = %event.method,
            path = %event.path,
            key = %event.key,
            outcome = %event.outcome,
            "idempotent.request"
        );
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<IdempotencyEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<IdempotencyEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl IdempotencyObserver for RecordingObserver {
    fn on_event(&self, event: &IdempotencyEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event() -> IdempotencyEvent {
        IdempotencyEvent {
            method: "POST".to_string(),
            path: "/orders".to_string(),
            key: "abc".to_string(),
            outcome: Outcome::Replayed,
        }
    }

    #[test]
    fn test_recording_observer_keeps_events() {
        let observer = RecordingObserver::new();
        observer.on_event(&event());
        observer.on_event(&event());
        assert_eq!(observer.events(), vec![event(), event()]);
    }

    #[test]
    fn test_noop_and_tracing_observers_accept_events() {
        NoopObserver.on_event(&event());
        TracingObserver.on_event(&event());
    }
}
