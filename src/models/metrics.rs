use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    pub reports: ReportMetrics,
    pub uptime_seconds: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportMetrics {
    pub assembled: u64,
    pub rejected: u64,
}

/// Process-local request counters. Nothing is persisted.
#[derive(Clone)]
pub struct ReportCounters {
    assembled: Arc<AtomicU64>,
    rejected: Arc<AtomicU64>,
    started_at: Instant,
}

impl ReportCounters {
    pub fn new() -> Self {
        Self {
            assembled: Arc::new(AtomicU64::new(0)),
            rejected: Arc::new(AtomicU64::new(0)),
            started_at: Instant::now(),
        }
    }

    pub fn record_assembled(&self) {
        self.assembled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> Metrics {
        Metrics {
            reports: ReportMetrics {
                assembled: self.assembled.load(Ordering::Relaxed),
                rejected: self.rejected.load(Ordering::Relaxed),
            },
            uptime_seconds: self.started_at.elapsed().as_secs(),
        }
    }
}

impl Default for ReportCounters {
    fn default() -> Self {
        Self::new()
    }
}
