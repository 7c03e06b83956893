//! In-memory delivery counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use pushgate_common::traits::StatsSink;
use pushgate_common::types::Platform;

#[derive(Debug, Default)]
struct PlatformCounters {
    success: AtomicU64,
    failure: AtomicU64,
}

impl PlatformCounters {
    fn snapshot(&self) -> PlatformStats {
        PlatformStats {
            push_success: self.success.load(Ordering::Relaxed),
            push_error: self.failure.load(Ordering::Relaxed),
        }
    }
}

/// Process-local `StatsSink`.
#[derive(Debug, Default)]
pub struct MemoryStats {
    total: AtomicU64,
    ios: PlatformCounters,
    android: PlatformCounters,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlatformStats {
    pub push_success: u64,
    pub push_error: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub total_count: u64,
    pub ios: PlatformStats,
    pub android: PlatformStats,
}

impl MemoryStats {
    pub fn new() -> Self {
        Self::default()
    }

    fn counters(&self, platform: Platform) -> &PlatformCounters {
        match platform {
            Platform::Ios => &self.ios,
            Platform::Android => &self.android,
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total_count: self.total.load(Ordering::Relaxed),
            ios: self.ios.snapshot(),
            android: self.android.snapshot(),
        }
    }
}

impl StatsSink for MemoryStats {
    fn add_total(&self, count: u64) {
        self.total.fetch_add(count, Ordering::Relaxed);
    }

    fn add_success(&self, platform: Platform, count: u64) {
        self.counters(platform)
            .success
            .fetch_add(count, Ordering::Relaxed);
    }

    fn add_failure(&self, platform: Platform, count: u64) {
        self.counters(platform)
            .failure
            .fetch_add(count, Ordering::Relaxed);
    }
}
