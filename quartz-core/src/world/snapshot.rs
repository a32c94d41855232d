//! Per-tick memo of container readouts.
//!
//! Many sites often feed the same output chest. The evaluation phase reads a
//! container at most once per tick and every prerequisite check sees the same
//! numbers, regardless of evaluation order.

use quartz_utils::Position;
use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::inventory::Container;

use super::WorldAccess;

/// Summary of a container's fill state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ContainerReadout {
    /// Total slots.
    pub size: usize,
    /// Slots holding nothing.
    pub empty_slots: usize,
}

impl ContainerReadout {
    /// Reads the summary of `container`.
    #[must_use]
    pub fn of(container: &dyn Container) -> Self {
        Self {
            size: container.size(),
            empty_slots: container.empty_slots(),
        }
    }

    /// Whether at least one slot is empty.
    #[must_use]
    pub fn has_empty_slot(&self) -> bool {
        self.empty_slots > 0
    }
}

/// Container readouts cached for the duration of one evaluation phase.
#[derive(Debug, Default)]
pub struct ContainerSnapshots {
    readouts: FxHashMap<Position, Option<ContainerReadout>>,
    hits: u64,
}

impl ContainerSnapshots {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The readout at `pos`, read from `world` on first access. `None` if there is no container.
    pub fn readout(
        &mut self,
        world: &dyn WorldAccess,
        pos: Position,
    ) -> Option<ContainerReadout> {
        if let Some(cached) = self.readouts.get(&pos) {
            self.hits += 1;
            return *cached;
        }
        let readout = world.container_ref(pos).map(ContainerReadout::of);
        self.readouts.insert(pos, readout);
        readout
    }

    /// Number of reads served from the cache since the last [`clear`](Self::clear).
    #[must_use]
    pub fn hits(&self) -> u64 {
        self.hits
    }

    /// Forgets everything. Called at the start of every tick.
    pub fn clear(&mut self) {
        self.readouts.clear();
        self.hits = 0;
    }
}
