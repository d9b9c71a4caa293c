// ABOUTME: Diagnostic sinks that receive per-attempt and final chain events.
// ABOUTME: TracingSink logs through tracing, NullSink drops events, MemorySink keeps them for inspection.

use std::sync::Mutex;

use tracing::{debug, error, info, warn};

use crate::compose::AttemptRecord;
use crate::error::Severity;

/// Receives structured events from a chain execution.
pub trait DiagnosticSink: Send + Sync {
    /// One loader failed (or returned nothing).
    fn attempt(&self, url: &str, record: &AttemptRecord);

    /// A loader produced content and the chain stopped.
    fn success(&self, url: &str, loader: &str) {
        let _ = (url, loader);
    }

    /// Every loader failed.
    fn exhausted(&self, url: &str, attempts: &[AttemptRecord]);
}

/// Emits events as `tracing` records with a level derived from the failure kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn attempt(&self, url: &str, record: &AttemptRecord) {
        let loader = record.loader.as_str();
        let kind = record.kind;
        let detail = record.detail.as_str();
        match kind.severity() {
            Severity::Low => debug!(loader, %kind, detail, url, "loader skipped"),
            Severity::Medium => warn!(loader, %kind, detail, url, "loader failed"),
            Severity::High => error!(loader, %kind, detail, url, "loader failed"),
        }
    }

    fn success(&self, url: &str, loader: &str) {
        info!(loader, url, "loaded url");
    }

    fn exhausted(&self, url: &str, attempts: &[AttemptRecord]) {
        let summary: Vec<String> = attempts.iter().map(|a| a.to_string()).collect();
        error!(
            url,
            attempts = attempts.len(),
            summary = %summary.join("; "),
            "all loaders failed"
        );
    }
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl DiagnosticSink for NullSink {
    fn attempt(&self, _url: &str, _record: &AttemptRecord) {}

    fn exhausted(&self, _url: &str, _attempts: &[AttemptRecord]) {}
}

/// An event captured by [`MemorySink`].
#[derive(Debug, Clone, PartialEq)]
pub enum DiagnosticEvent {
    Attempt { url: String, record: AttemptRecord },
    Success { url: String, loader: String },
    Exhausted { url: String, attempts: usize },
}

/// Keeps events in memory in the order they were reported.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<DiagnosticEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every event seen so far.
    pub fn events(&self) -> Vec<DiagnosticEvent> {
        self.lock().clone()
    }

    /// Attempt records only, in order.
    pub fn attempts(&self) -> Vec<AttemptRecord> {
        self.lock()
            .iter()
            .filter_map(|e| match e {
                DiagnosticEvent::Attempt { record, .. } => Some(record.clone()),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: DiagnosticEvent) {
        self.lock().push(event);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<DiagnosticEvent>> {
        // a panic while holding the lock leaves the vector intact, so keep using it
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl DiagnosticSink for MemorySink {
    fn attempt(&self, url: &str, record: &AttemptRecord) {
        self.push(DiagnosticEvent::Attempt {
            url: url.to_string(),
            record: record.clone(),
        });
    }

    fn success(&self, url: &str, loader: &str) {
        self.push(DiagnosticEvent::Success {
            url: url.to_string(),
            loader: loader.to_string(),
        });
    }

    fn exhausted(&self, url: &str, attempts: &[AttemptRecord]) {
        self.push(DiagnosticEvent::Exhausted {
            url: url.to_string(),
            attempts: attempts.len(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;

    #[test]
    fn memory_sink_keeps_order() {
        let sink = MemorySink::new();
        let a = AttemptRecord::new("a", FailureKind::NotApplicable, "wrong host");
        let b = AttemptRecord::new("b", FailureKind::Timeout, "after 2s");
        sink.attempt("https://example.com", &a);
        sink.attempt("https://example.com", &b);
        sink.exhausted("https://example.com", &[a.clone(), b.clone()]);

        assert_eq!(sink.attempts(), vec![a, b]);
        assert_eq!(
            sink.events().last(),
            Some(&DiagnosticEvent::Exhausted {
                url: "https://example.com".to_string(),
                attempts: 2
            })
        );
    }

    #[test]
    fn tracing_sink_accepts_every_severity() {
        let sink = TracingSink;
        for kind in [
            FailureKind::NotApplicable,
            FailureKind::ContentError,
            FailureKind::Exhausted,
        ] {
            sink.attempt("https://example.com", &AttemptRecord::new("x", kind, "d"));
        }
        sink.success("https://example.com", "x");
        sink.exhausted("https://example.com", &[]);
    }
}
