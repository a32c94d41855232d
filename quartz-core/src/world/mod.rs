//! The world capability layer.
//!
//! Everything the engine knows about the world goes through [`WorldAccess`]:
//! block reads, block mutations, container access and simulation activity.
//! The game-side adapter and [`StubWorld`] are the two implementations; the
//! scheduler cannot tell them apart.

pub mod shadow;
pub mod snapshot;
pub mod stub_world;

use std::fmt::{self, Display};

use quartz_utils::{Identifier, Position};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::inventory::{Container, ItemStack};

pub use shadow::ShadowCommit;
pub use snapshot::{ContainerReadout, ContainerSnapshots};
pub use stub_world::{StubSnapshot, StubWorld};

/// Identifies a kind of block, e.g. `fastquartz:quartz_generator`.
pub type BlockTypeId = Identifier;

/// A block type plus a behavior-interpreted data value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockState {
    /// The block type.
    pub block: BlockTypeId,
    /// Free-form state, for example the ore left in a resource node.
    #[serde(default)]
    pub data: u32,
}

impl BlockState {
    /// Creates a state with the given data value.
    #[must_use]
    pub fn new(block: BlockTypeId, data: u32) -> Self {
        Self { block, data }
    }

    /// Creates a state with data 0.
    #[must_use]
    pub fn of(block: BlockTypeId) -> Self {
        Self { block, data: 0 }
    }
}

/// A requested change to a single block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationSpec {
    /// Put `state` at the position, whatever was there before.
    Replace(BlockState),
    /// Keep the block but change its data value.
    SetData(u32),
    /// Turn the position into air.
    Clear,
}

/// Why the world refused a mutation or delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// The host refused the change (protection, permissions, fault injection).
    Refused,
    /// A delivery targeted a position without a container.
    NoContainer,
    /// The container cannot take the whole stack.
    ContainerFull,
    /// The position is outside the build height.
    OutOfBounds,
    /// `SetData` targeted an air block.
    MissingBlock,
}

impl Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Refused => "refused by host",
            Self::NoContainer => "no container",
            Self::ContainerFull => "container full",
            Self::OutOfBounds => "out of bounds",
            Self::MissingBlock => "no block to update",
        })
    }
}

/// A failed capability call. Recovered per site, never fatal to a tick.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorldError {
    /// The position is not currently loaded.
    #[error("position {0} is not loaded")]
    NotLoaded(Position),
    /// The world refused the operation.
    #[error("change at {pos} rejected: {reason}")]
    Rejected {
        /// Where the operation was attempted.
        pos: Position,
        /// Why it failed.
        reason: RejectReason,
    },
}

impl WorldError {
    /// Shorthand for a [`WorldError::Rejected`].
    #[must_use]
    pub fn rejected(pos: Position, reason: RejectReason) -> Self {
        Self::Rejected { pos, reason }
    }
}

/// A placement or removal the scheduler has not seen yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SiteChange {
    /// A block was removed, or its chunk was evicted.
    Removed {
        /// Where.
        pos: Position,
    },
    /// A block was placed or loaded.
    Placed {
        /// Where.
        pos: Position,
        /// What was placed.
        block: BlockTypeId,
    },
}

impl SiteChange {
    /// The position this change is about.
    #[must_use]
    pub fn pos(&self) -> Position {
        match self {
            Self::Removed { pos } | Self::Placed { pos, .. } => *pos,
        }
    }
}

/// An output of one automation cycle, applied through [`WorldAccess`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    /// Change a block.
    Mutate {
        /// Target position.
        pos: Position,
        /// The change.
        mutation: MutationSpec,
    },
    /// Insert a stack into the container at `pos`.
    Deliver {
        /// Container position.
        pos: Position,
        /// The items.
        stack: ItemStack,
    },
}

impl Effect {
    /// The position this effect touches.
    #[must_use]
    pub fn pos(&self) -> Position {
        match self {
            Self::Mutate { pos, .. } | Self::Deliver { pos, .. } => *pos,
        }
    }
}

/// Read and write access to a world, as seen by the engine.
///
/// Calls are synchronous and only valid for the duration of a tick. Container
/// handles are borrows so they cannot be held across ticks.
pub trait WorldAccess {
    /// The block at `pos`, `None` for air, unloaded or out-of-bounds positions.
    fn block_state_at(&self, pos: Position) -> Option<BlockState>;

    /// The block type at `pos`. Never errors.
    fn block_type_at(&self, pos: Position) -> Option<BlockTypeId> {
        self.block_state_at(pos).map(|state| state.block)
    }

    /// Applies a block mutation.
    fn mutate_block(&mut self, pos: Position, mutation: &MutationSpec) -> Result<(), WorldError>;

    /// The container at `pos`, for reading.
    fn container_ref(&self, pos: Position) -> Option<&dyn Container>;

    /// The container at `pos`, for writing.
    fn container_at(&mut self, pos: Position) -> Option<&mut dyn Container>;

    /// Whether `pos` is currently simulated.
    fn is_active(&self, pos: Position) -> bool;

    /// Placements and removals since the last call, ordered by position with
    /// removals before placements at the same position.
    fn drain_changes(&mut self) -> Vec<SiteChange>;

    /// Inserts `stack` into the container at `pos`, all or nothing.
    fn deliver(&mut self, pos: Position, stack: &ItemStack) -> Result<(), WorldError> {
        deliver_into(self, pos, stack)
    }

    /// Takes back up to `count` of `item` from the container at `pos`.
    fn withdraw(
        &mut self,
        pos: Position,
        item: &Identifier,
        count: u32,
    ) -> Result<u32, WorldError> {
        withdraw_from(self, pos, item, count)
    }
}

/// Default delivery through [`WorldAccess::container_at`].
pub fn deliver_into<W: WorldAccess + ?Sized>(
    world: &mut W,
    pos: Position,
    stack: &ItemStack,
) -> Result<(), WorldError> {
    if !world.is_active(pos) {
        return Err(WorldError::NotLoaded(pos));
    }
    let container = world
        .container_at(pos)
        .ok_or(WorldError::rejected(pos, RejectReason::NoContainer))?;
    if container.insert(stack) {
        Ok(())
    } else {
        Err(WorldError::rejected(pos, RejectReason::ContainerFull))
    }
}

/// Default withdrawal through [`WorldAccess::container_at`].
pub fn withdraw_from<W: WorldAccess + ?Sized>(
    world: &mut W,
    pos: Position,
    item: &Identifier,
    count: u32,
) -> Result<u32, WorldError> {
    if !world.is_active(pos) {
        return Err(WorldError::NotLoaded(pos));
    }
    let container = world
        .container_at(pos)
        .ok_or(WorldError::rejected(pos, RejectReason::NoContainer))?;
    Ok(container.extract(item, count))
}
