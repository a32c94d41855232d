//! In-memory world for headless runs and tests.
//!
//! Blocks and containers live in hash maps, chunks are simulated unless told
//! otherwise, and every host-style edit is recorded so the scheduler can pick
//! it up through [`WorldAccess::drain_changes`].

use std::collections::{BTreeMap, btree_map::Entry};

use quartz_utils::{ChunkPos, DimensionId, Position};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;

use crate::inventory::{Container, ItemStack, SimpleContainer};

use super::{
    BlockState, BlockTypeId, MutationSpec, RejectReason, SiteChange, WorldAccess, WorldError,
    deliver_into,
};

/// Lowest buildable Y.
pub const MIN_Y: i32 = -64;
/// Build height in blocks.
pub const HEIGHT: i32 = 384;

/// What a position looked like before the first change of the current batch.
#[derive(Debug)]
struct PendingChange {
    before: Option<BlockTypeId>,
    /// A host-style place or remove happened, not just engine mutations.
    replaced: bool,
}

/// Deterministic in-memory [`WorldAccess`] implementation.
#[derive(Debug)]
pub struct StubWorld {
    blocks: FxHashMap<Position, BlockState>,
    containers: FxHashMap<Position, SimpleContainer>,
    /// Chunks whose simulation state differs from `active_by_default`.
    toggled_chunks: FxHashSet<(DimensionId, ChunkPos)>,
    active_by_default: bool,
    rejected: FxHashSet<Position>,
    pending: BTreeMap<Position, PendingChange>,
    min_y: i32,
    height: i32,
}

impl StubWorld {
    /// Creates a world where every chunk is simulated until unloaded.
    #[must_use]
    pub fn empty_world() -> Self {
        Self::with_default_activity(true)
    }

    /// Creates a world where only chunks passed to [`load_chunk`](Self::load_chunk) are simulated.
    #[must_use]
    pub fn preloaded() -> Self {
        Self::with_default_activity(false)
    }

    fn with_default_activity(active_by_default: bool) -> Self {
        Self {
            blocks: FxHashMap::default(),
            containers: FxHashMap::default(),
            toggled_chunks: FxHashSet::default(),
            active_by_default,
            rejected: FxHashSet::default(),
            pending: BTreeMap::new(),
            min_y: MIN_Y,
            height: HEIGHT,
        }
    }

    fn in_bounds(&self, pos: Position) -> bool {
        pos.pos.y >= self.min_y && pos.pos.y < self.min_y + self.height
    }

    fn chunk_active(&self, pos: Position) -> bool {
        let toggled = self.toggled_chunks.contains(&(pos.dimension, pos.chunk()));
        self.active_by_default != toggled
    }

    fn record_change(&mut self, pos: Position, explicit: bool) {
        let change = match self.pending.entry(pos) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(PendingChange {
                before: self.blocks.get(&pos).map(|state| state.block.clone()),
                replaced: false,
            }),
        };
        change.replaced |= explicit;
    }

    /// Host-style placement. Reported as a removal of the old block and a
    /// placement of the new one, even if the type is unchanged.
    pub fn place_block(&mut self, pos: Position, state: BlockState) {
        self.record_change(pos, true);
        self.blocks.insert(pos, state);
    }

    /// Host-style removal. Also drops any container at the position.
    pub fn remove_block(&mut self, pos: Position) {
        self.record_change(pos, true);
        self.blocks.remove(&pos);
        self.containers.remove(&pos);
    }

    /// Marks a chunk as simulated.
    pub fn load_chunk(&mut self, dimension: DimensionId, chunk: ChunkPos) {
        self.set_chunk_active(dimension, chunk, true);
    }

    /// Stops simulating a chunk. Blocks stay in memory and sites stay tracked.
    pub fn unload_chunk(&mut self, dimension: DimensionId, chunk: ChunkPos) {
        self.set_chunk_active(dimension, chunk, false);
    }

    fn set_chunk_active(&mut self, dimension: DimensionId, chunk: ChunkPos, active: bool) {
        if active == self.active_by_default {
            self.toggled_chunks.remove(&(dimension, chunk));
        } else {
            self.toggled_chunks.insert((dimension, chunk));
        }
    }

    /// Puts an empty container with `size` slots at `pos`, replacing any existing one.
    pub fn attach_container(&mut self, pos: Position, size: usize) {
        self.containers.insert(pos, SimpleContainer::new(size));
    }

    /// The container at `pos`, regardless of chunk activity.
    #[must_use]
    pub fn container(&self, pos: Position) -> Option<&SimpleContainer> {
        self.containers.get(&pos)
    }

    /// Makes every mutation and delivery at `pos` fail with [`RejectReason::Refused`].
    pub fn reject_at(&mut self, pos: Position) {
        self.rejected.insert(pos);
    }

    /// Removes all injected rejections.
    pub fn clear_rejections(&mut self) {
        self.rejected.clear();
    }

    /// A sorted, comparable dump of the world contents.
    #[must_use]
    pub fn snapshot(&self) -> StubSnapshot {
        let mut blocks: Vec<BlockEntry> = self
            .blocks
            .iter()
            .map(|(pos, state)| BlockEntry {
                pos: *pos,
                state: state.clone(),
            })
            .collect();
        blocks.sort_by_key(|entry| entry.pos);

        let mut containers: Vec<ContainerEntry> = self
            .containers
            .iter()
            .map(|(pos, container)| ContainerEntry {
                pos: *pos,
                items: container.items().to_vec(),
            })
            .collect();
        containers.sort_by_key(|entry| entry.pos);

        StubSnapshot { blocks, containers }
    }

    fn check_writable(&self, pos: Position) -> Result<(), WorldError> {
        if !self.in_bounds(pos) {
            return Err(WorldError::rejected(pos, RejectReason::OutOfBounds));
        }
        if !self.chunk_active(pos) {
            return Err(WorldError::NotLoaded(pos));
        }
        if self.rejected.contains(&pos) {
            return Err(WorldError::rejected(pos, RejectReason::Refused));
        }
        Ok(())
    }
}

impl Default for StubWorld {
    fn default() -> Self {
        Self::empty_world()
    }
}

impl WorldAccess for StubWorld {
    fn block_state_at(&self, pos: Position) -> Option<BlockState> {
        if !self.is_active(pos) {
            return None;
        }
        self.blocks.get(&pos).cloned()
    }

    fn mutate_block(&mut self, pos: Position, mutation: &MutationSpec) -> Result<(), WorldError> {
        self.check_writable(pos)?;
        match mutation {
            MutationSpec::Replace(state) => {
                self.record_change(pos, false);
                self.blocks.insert(pos, state.clone());
            }
            MutationSpec::SetData(data) => {
                let state = self
                    .blocks
                    .get_mut(&pos)
                    .ok_or(WorldError::rejected(pos, RejectReason::MissingBlock))?;
                state.data = *data;
            }
            MutationSpec::Clear => {
                self.record_change(pos, false);
                self.blocks.remove(&pos);
            }
        }
        Ok(())
    }

    fn container_ref(&self, pos: Position) -> Option<&dyn Container> {
        if !self.is_active(pos) {
            return None;
        }
        self.containers
            .get(&pos)
            .map(|container| container as &dyn Container)
    }

    fn container_at(&mut self, pos: Position) -> Option<&mut dyn Container> {
        if !self.is_active(pos) {
            return None;
        }
        self.containers
            .get_mut(&pos)
            .map(|container| container as &mut dyn Container)
    }

    fn is_active(&self, pos: Position) -> bool {
        self.in_bounds(pos) && self.chunk_active(pos)
    }

    fn drain_changes(&mut self) -> Vec<SiteChange> {
        let pending = std::mem::take(&mut self.pending);
        let mut changes = Vec::with_capacity(pending.len());
        for (pos, change) in pending {
            let now = self.blocks.get(&pos).map(|state| &state.block);
            let differs = change.replaced || change.before.as_ref() != now;
            if !differs {
                continue;
            }
            if change.before.is_some() {
                changes.push(SiteChange::Removed { pos });
            }
            if let Some(block) = now {
                changes.push(SiteChange::Placed {
                    pos,
                    block: block.clone(),
                });
            }
        }
        changes
    }

    fn deliver(&mut self, pos: Position, stack: &ItemStack) -> Result<(), WorldError> {
        self.check_writable(pos)?;
        deliver_into(self, pos, stack)
    }
}

/// A block in a [`StubSnapshot`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockEntry {
    /// Where.
    pub pos: Position,
    /// What.
    pub state: BlockState,
}

/// A container in a [`StubSnapshot`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerEntry {
    /// Where.
    pub pos: Position,
    /// Slot contents in order.
    pub items: Vec<ItemStack>,
}

/// World contents sorted by position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StubSnapshot {
    /// All non-air blocks.
    pub blocks: Vec<BlockEntry>,
    /// All containers.
    pub containers: Vec<ContainerEntry>,
}
