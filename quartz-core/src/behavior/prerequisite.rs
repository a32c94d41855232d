//! Conditions a site must meet before it may process.

use std::{fmt, sync::Arc};

use quartz_utils::{BlockOffset, Position};

use crate::world::{BlockTypeId, ContainerSnapshots, WorldAccess, WorldError};

/// A user-supplied prerequisite check.
pub type CustomCheck =
    Arc<dyn Fn(Position, &dyn WorldAccess) -> Result<bool, WorldError> + Send + Sync>;

/// When a site is allowed to process.
///
/// Offsets are relative to the site. An unloaded target makes the check fail
/// with [`WorldError::NotLoaded`], which the state machine treats as blocked.
#[derive(Clone, Default)]
pub enum Prerequisite {
    /// No condition.
    #[default]
    Always,
    /// A block of the given type sits at the offset, e.g. a power source.
    BlockAt {
        /// Where to look.
        offset: BlockOffset,
        /// What must be there.
        block: BlockTypeId,
    },
    /// A container at the offset has at least one empty slot.
    ContainerSpace {
        /// Where the container is.
        offset: BlockOffset,
    },
    /// Every condition holds.
    All(Vec<Prerequisite>),
    /// At least one condition holds.
    Any(Vec<Prerequisite>),
    /// Arbitrary check against the world.
    Custom(CustomCheck),
}

impl Prerequisite {
    /// Evaluates the condition for the site at `site`.
    ///
    /// Container reads go through `snapshots` so every site sees the same
    /// container state within a tick.
    pub fn check(
        &self,
        site: Position,
        world: &dyn WorldAccess,
        snapshots: &mut ContainerSnapshots,
    ) -> Result<bool, WorldError> {
        match self {
            Self::Always => Ok(true),
            Self::BlockAt { offset, block } => {
                let target = site.offset(*offset);
                if !world.is_active(target) {
                    return Err(WorldError::NotLoaded(target));
                }
                Ok(world.block_type_at(target).as_ref() == Some(block))
            }
            Self::ContainerSpace { offset } => {
                let target = site.offset(*offset);
                if !world.is_active(target) {
                    return Err(WorldError::NotLoaded(target));
                }
                Ok(snapshots
                    .readout(world, target)
                    .is_some_and(|readout| readout.has_empty_slot()))
            }
            Self::All(conditions) => {
                for condition in conditions {
                    if !condition.check(site, world, snapshots)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Self::Any(conditions) => {
                let mut failure = None;
                for condition in conditions {
                    match condition.check(site, world, snapshots) {
                        Ok(true) => return Ok(true),
                        Ok(false) => {}
                        Err(err) => failure = failure.or(Some(err)),
                    }
                }
                failure.map_or(Ok(false), Err)
            }
            Self::Custom(check) => check(site, world),
        }
    }
}

impl fmt::Debug for Prerequisite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Always => f.write_str("Always"),
            Self::BlockAt { offset, block } => f
                .debug_struct("BlockAt")
                .field("offset", offset)
                .field("block", block)
                .finish(),
            Self::ContainerSpace { offset } => f
                .debug_struct("ContainerSpace")
                .field("offset", offset)
                .finish(),
            Self::All(conditions) => f.debug_tuple("All").field(conditions).finish(),
            Self::Any(conditions) => f.debug_tuple("Any").field(conditions).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use quartz_utils::{DimensionId, Identifier};

    use super::*;
    use crate::{
        inventory::ItemStack,
        world::{BlockState, StubWorld},
    };

    const POWER: Identifier = Identifier::new_static("fastquartz", "power_cell");

    fn site() -> Position {
        Position::overworld(0, 64, 0)
    }

    fn check(prerequisite: &Prerequisite, world: &StubWorld) -> Result<bool, WorldError> {
        prerequisite.check(site(), world, &mut ContainerSnapshots::new())
    }

    #[test]
    fn test_block_at() {
        let mut world = StubWorld::empty_world();
        let powered = Prerequisite::BlockAt {
            offset: BlockOffset::UP,
            block: POWER,
        };
        assert_eq!(check(&powered, &world), Ok(false));

        world.place_block(site().offset(BlockOffset::UP), BlockState::of(POWER));
        assert_eq!(check(&powered, &world), Ok(true));
    }

    #[test]
    fn test_container_space() {
        let mut world = StubWorld::empty_world();
        let chest = site().offset(BlockOffset::DOWN);
        let has_space = Prerequisite::ContainerSpace {
            offset: BlockOffset::DOWN,
        };
        assert_eq!(check(&has_space, &world), Ok(false));

        world.attach_container(chest, 1);
        assert_eq!(check(&has_space, &world), Ok(true));

        world
            .deliver(chest, &ItemStack::new(Identifier::vanilla_static("quartz"), 1))
            .expect("deliver");
        assert_eq!(check(&has_space, &world), Ok(false));
    }

    #[test]
    fn test_unloaded_target_is_error() {
        let mut world = StubWorld::empty_world();
        let far = BlockOffset::new(32, 0, 0);
        world.unload_chunk(DimensionId::OVERWORLD, site().offset(far).chunk());

        let prerequisite = Prerequisite::ContainerSpace { offset: far };
        assert_eq!(
            check(&prerequisite, &world),
            Err(WorldError::NotLoaded(site().offset(far)))
        );
    }

    #[test]
    fn test_combinators() {
        let world = StubWorld::empty_world();
        let never = Prerequisite::Custom(Arc::new(
            |_: Position, _: &dyn WorldAccess| -> Result<bool, WorldError> { Ok(false) },
        ));

        assert_eq!(
            check(&Prerequisite::All(vec![Prerequisite::Always, never.clone()]), &world),
            Ok(false)
        );
        assert_eq!(
            check(&Prerequisite::Any(vec![never.clone(), Prerequisite::Always]), &world),
            Ok(true)
        );
        assert_eq!(check(&Prerequisite::All(Vec::new()), &world), Ok(true));
        assert_eq!(check(&Prerequisite::Any(vec![never]), &world), Ok(false));
    }

    #[test]
    fn test_any_surfaces_error_only_without_success() {
        let world = StubWorld::empty_world();
        let failing = Prerequisite::Custom(Arc::new(
            |pos: Position, _: &dyn WorldAccess| -> Result<bool, WorldError> {
                Err(WorldError::NotLoaded(pos))
            },
        ));

        assert_eq!(
            check(&Prerequisite::Any(vec![failing.clone()]), &world),
            Err(WorldError::NotLoaded(site()))
        );
        assert_eq!(
            check(&Prerequisite::Any(vec![failing, Prerequisite::Always]), &world),
            Ok(true)
        );
    }
}
