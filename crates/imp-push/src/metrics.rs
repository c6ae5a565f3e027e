//! Push-pipeline counters.
//!
//! Process-wide atomics; the external metrics sink scrapes these through
//! `snapshot()`.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct PushMetrics {
    online_push_total: AtomicU64,
    offline_push_total: AtomicU64,
    msg_offline_push_failed_total: AtomicU64,
}

impl PushMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_online_push(&self) {
        self.online_push_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_offline_push(&self) {
        self.offline_push_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_offline_push_failure(&self) {
        self.msg_offline_push_failed_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> PushMetricsSnapshot {
        PushMetricsSnapshot {
            online_push_total: self.online_push_total.load(Ordering::Relaxed),
            offline_push_total: self.offline_push_total.load(Ordering::Relaxed),
            msg_offline_push_failed_total: self.msg_offline_push_failed_total.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PushMetricsSnapshot {
    pub online_push_total: u64,
    pub offline_push_total: u64,
    pub msg_offline_push_failed_total: u64,
}
