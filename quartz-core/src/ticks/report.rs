//! What happened during one tick.

use quartz_utils::Position;
use serde::Serialize;

use crate::world::{Effect, WorldError};

/// A site whose effects were rejected and rolled back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SiteFailure {
    /// The site.
    pub pos: Position,
    /// The rejection that caused the rollback.
    pub error: WorldError,
}

/// An effect that was applied to the world.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedEffect {
    /// The site that produced it.
    pub site: Position,
    /// The effect.
    pub effect: Effect,
}

/// The outcome of one [`advance_tick`](super::TickScheduler::advance_tick) call.
///
/// Contains no timing data, so two runs over the same inputs produce equal
/// reports. All lists are in site index order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    /// The tick number.
    pub tick: u64,
    /// Sites that ran a cycle and had their effects applied.
    pub processed: Vec<Position>,
    /// Sites skipped because their position was not simulated.
    pub skipped: Vec<Position>,
    /// Sites whose prerequisite failed or whose target was not loaded.
    pub blocked: Vec<Position>,
    /// Sites whose effects were rejected.
    pub errored: Vec<SiteFailure>,
    /// Every applied effect, grouped by site.
    pub applied: Vec<AppliedEffect>,
    /// Sites created during reconcile.
    pub sites_added: usize,
    /// Positions whose site was dropped during reconcile.
    pub removed: Vec<Position>,
    /// Number of sites dropped during reconcile.
    pub sites_removed: usize,
    /// Placements waiting for capacity.
    pub deferred: usize,
    /// Tracked sites after the tick.
    pub active_sites: usize,
}

impl TickReport {
    pub(crate) fn new(tick: u64) -> Self {
        Self {
            tick,
            ..Self::default()
        }
    }

    /// Number of processed sites.
    #[must_use]
    pub fn processed_count(&self) -> usize {
        self.processed.len()
    }

    /// Number of skipped sites.
    #[must_use]
    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    /// Number of blocked sites.
    #[must_use]
    pub fn blocked_count(&self) -> usize {
        self.blocked.len()
    }

    /// Number of errored sites.
    #[must_use]
    pub fn errored_count(&self) -> usize {
        self.errored.len()
    }

    /// Number of applied effects.
    #[must_use]
    pub fn effects_count(&self) -> usize {
        self.applied.len()
    }
}
