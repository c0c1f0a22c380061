use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use rill_core::engine::PublishReport;

// ---------------------------------------------------------------------------
// RuntimeMetrics
// ---------------------------------------------------------------------------

/// Shared runtime counters. All updates are lock-free atomics; the engine
/// task is the only writer for everything except reads via `snapshot`.
#[derive(Debug, Default)]
pub struct RuntimeMetrics {
    events_ingested: AtomicU64,
    late_dropped: AtomicU64,
    windows_emitted: AtomicU64,
    coercion_skips: AtomicU64,
}

impl RuntimeMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_publish(&self, report: &PublishReport) {
        self.events_ingested.fetch_add(1, Ordering::Relaxed);
        self.late_dropped
            .fetch_add(report.dropped_late as u64, Ordering::Relaxed);
        self.windows_emitted
            .fetch_add(report.emitted as u64, Ordering::Relaxed);
    }

    pub(crate) fn add_windows_emitted(&self, n: u64) {
        self.windows_emitted.fetch_add(n, Ordering::Relaxed);
    }

    /// Coercion skips are tracked inside the engine; the engine task mirrors
    /// the total here when it observes engine stats.
    pub(crate) fn set_coercion_skips(&self, n: u64) {
        self.coercion_skips.store(n, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            events_ingested: self.events_ingested.load(Ordering::Relaxed),
            late_dropped: self.late_dropped.load(Ordering::Relaxed),
            windows_emitted: self.windows_emitted.load(Ordering::Relaxed),
            coercion_skips: self.coercion_skips.load(Ordering::Relaxed),
        }
    }
}

// ---------------------------------------------------------------------------
// MetricsSnapshot
// ---------------------------------------------------------------------------

/// Point-in-time view of the runtime counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub events_ingested: u64,
    pub late_dropped: u64,
    pub windows_emitted: u64,
    pub coercion_skips: u64,
}

impl fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "events={} late_dropped={} windows_emitted={} coercion_skips={}",
            self.events_ingested, self.late_dropped, self.windows_emitted, self.coercion_skips,
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_reports_accumulate() {
        let metrics = RuntimeMetrics::new();
        metrics.record_publish(&PublishReport {
            delivered: 1,
            dropped_late: 0,
            emitted: 0,
        });
        metrics.record_publish(&PublishReport {
            delivered: 0,
            dropped_late: 1,
            emitted: 2,
        });
        metrics.add_windows_emitted(1);
        metrics.set_coercion_skips(5);

        let snap = metrics.snapshot();
        assert_eq!(snap.events_ingested, 2);
        assert_eq!(snap.late_dropped, 1);
        assert_eq!(snap.windows_emitted, 3);
        assert_eq!(snap.coercion_skips, 5);
    }

    #[test]
    fn snapshot_display_is_compact() {
        let snap = MetricsSnapshot {
            events_ingested: 10,
            late_dropped: 1,
            windows_emitted: 2,
            coercion_skips: 0,
        };
        assert_eq!(
            snap.to_string(),
            "events=10 late_dropped=1 windows_emitted=2 coercion_skips=0",
        );
    }
}
