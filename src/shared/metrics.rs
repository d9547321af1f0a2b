use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

pub const UNSET_TS: u64 = 0;

/// Success/failure tally with the timestamp of the most recent outcome.
#[derive(Debug, Default)]
pub struct OutcomeCounter {
    succeeded: AtomicU64,
    failed: AtomicU64,
    last_success_ms: AtomicU64,
    last_failure_ms: AtomicU64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct OutcomeSnapshot {
    pub succeeded: u64,
    pub failed: u64,
    pub last_success_ms: Option<u64>,
    pub last_failure_ms: Option<u64>,
}

impl OutcomeCounter {
    pub const fn new() -> Self {
        Self {
            succeeded: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            last_success_ms: AtomicU64::new(UNSET_TS),
            last_failure_ms: AtomicU64::new(UNSET_TS),
        }
    }

    pub fn record_success(&self) {
        self.succeeded.fetch_add(1, Ordering::Relaxed);
        self.last_success_ms
            .store(current_unix_ms(), Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        self.last_failure_ms
            .store(current_unix_ms(), Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> OutcomeSnapshot {
        OutcomeSnapshot {
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            last_success_ms: ts_option(self.last_success_ms.load(Ordering::Relaxed)),
            last_failure_ms: ts_option(self.last_failure_ms.load(Ordering::Relaxed)),
        }
    }

    pub fn reset(&self) {
        self.succeeded.store(0, Ordering::Relaxed);
        self.failed.store(0, Ordering::Relaxed);
        self.last_success_ms.store(UNSET_TS, Ordering::Relaxed);
        self.last_failure_ms.store(UNSET_TS, Ordering::Relaxed);
    }
}

/// Counters for the whole engine: load/save outcomes plus scheduler activity.
#[derive(Debug, Default)]
pub struct EngineMetrics {
    pub loads: OutcomeCounter,
    pub saves: OutcomeCounter,
    scheduled: AtomicU64,
    coalesced: AtomicU64,
    superseded: AtomicU64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct MetricsSnapshot {
    pub loads: OutcomeSnapshot,
    pub saves: OutcomeSnapshot,
    pub scheduled_saves: u64,
    pub coalesced_saves: u64,
    pub superseded_saves: u64,
}

impl EngineMetrics {
    pub const fn new() -> Self {
        Self {
            loads: OutcomeCounter::new(),
            saves: OutcomeCounter::new(),
            scheduled: AtomicU64::new(0),
            coalesced: AtomicU64::new(0),
            superseded: AtomicU64::new(0),
        }
    }

    /// A debounce countdown was armed for one field.
    pub fn record_scheduled(&self) {
        self.scheduled.fetch_add(1, Ordering::Relaxed);
    }

    /// An armed countdown was replaced before firing.
    pub fn record_coalesced(&self) {
        self.coalesced.fetch_add(1, Ordering::Relaxed);
    }

    /// An open save task was overtaken by a newer one for the same fields.
    pub fn record_superseded(&self) {
        self.superseded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            loads: self.loads.snapshot(),
            saves: self.saves.snapshot(),
            scheduled_saves: self.scheduled.load(Ordering::Relaxed),
            coalesced_saves: self.coalesced.load(Ordering::Relaxed),
            superseded_saves: self.superseded.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.loads.reset();
        self.saves.reset();
        self.scheduled.store(0, Ordering::Relaxed);
        self.coalesced.store(0, Ordering::Relaxed);
        self.superseded.store(0, Ordering::Relaxed);
    }
}

#[inline]
pub fn current_unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis() as u64)
        .unwrap_or(UNSET_TS)
}

#[inline]
fn ts_option(value: u64) -> Option<u64> {
    if value == UNSET_TS { None } else { Some(value) }
}
