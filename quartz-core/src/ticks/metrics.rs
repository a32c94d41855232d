//! Cumulative scheduler counters and timings.
//!
//! Kept apart from [`TickReport`](super::TickReport) so reports stay free of
//! wall-clock data and compare equal across runs.

use std::time::Duration;

use serde::Serialize;

/// Totals since the scheduler was created or reset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerMetrics {
    /// Ticks advanced.
    pub ticks: u64,
    /// Site cycles applied.
    pub sites_processed: u64,
    /// Site visits skipped because the position was inactive.
    pub sites_skipped: u64,
    /// Site visits that ended blocked.
    pub sites_blocked: u64,
    /// Site cycles rolled back after a rejection.
    pub sites_errored: u64,
    /// Effects applied.
    pub effects_applied: u64,
    /// Effects reverted by rollbacks.
    pub effects_rolled_back: u64,
    /// Container reads served from the per-tick cache.
    pub snapshot_hits: u64,
    /// Time spent reconciling placements and removals.
    pub reconcile_time: Duration,
    /// Time spent evaluating sites.
    pub evaluate_time: Duration,
    /// Time spent applying effects.
    pub apply_time: Duration,
    /// Longest single tick.
    pub max_tick_time: Duration,
}

impl SchedulerMetrics {
    /// Total time spent inside `advance_tick`.
    #[must_use]
    pub fn total_time(&self) -> Duration {
        self.reconcile_time + self.evaluate_time + self.apply_time
    }

    /// Mean tick duration, zero before the first tick.
    #[must_use]
    pub fn average_tick_time(&self) -> Duration {
        if self.ticks == 0 {
            return Duration::ZERO;
        }
        self.total_time() / u32::try_from(self.ticks).unwrap_or(u32::MAX)
    }

    pub(crate) fn record_tick(&mut self, elapsed: Duration) {
        self.ticks += 1;
        self.max_tick_time = self.max_tick_time.max(elapsed);
    }
}
