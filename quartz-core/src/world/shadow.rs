//! Staged application of one site's effects.
//!
//! Effects are written straight through to the world, but every write records
//! how to undo it. If a later effect of the same site fails, the earlier ones
//! are reverted in reverse order so the site's cycle leaves no trace.

use quartz_utils::Position;
use smallvec::SmallVec;

use crate::inventory::ItemStack;

use super::{BlockState, Effect, MutationSpec, WorldAccess, WorldError};

#[derive(Debug)]
enum Undo {
    /// Put back the block that was at `pos`.
    Restore {
        pos: Position,
        previous: Option<BlockState>,
    },
    /// Take a delivered stack back out.
    Withdraw { pos: Position, stack: ItemStack },
}

/// Applies effects through a [`WorldAccess`] and can revert them.
pub struct ShadowCommit<'w, W: WorldAccess + ?Sized> {
    world: &'w mut W,
    undo: SmallVec<[Undo; 4]>,
}

impl<'w, W: WorldAccess + ?Sized> ShadowCommit<'w, W> {
    /// Starts an empty commit against `world`.
    pub fn new(world: &'w mut W) -> Self {
        Self {
            world,
            undo: SmallVec::new(),
        }
    }

    /// Applies one effect. On error nothing was changed by this effect.
    pub fn apply(&mut self, effect: &Effect) -> Result<(), WorldError> {
        match effect {
            Effect::Mutate { pos, mutation } => {
                let previous = self.world.block_state_at(*pos);
                self.world.mutate_block(*pos, mutation)?;
                self.undo.push(Undo::Restore {
                    pos: *pos,
                    previous,
                });
            }
            Effect::Deliver { pos, stack } => {
                self.world.deliver(*pos, stack)?;
                self.undo.push(Undo::Withdraw {
                    pos: *pos,
                    stack: stack.clone(),
                });
            }
        }
        Ok(())
    }

    /// Keeps everything applied. Returns the number of effects.
    pub fn finish(self) -> usize {
        self.undo.len()
    }

    /// Reverts everything applied, newest first. Returns the number of effects undone.
    pub fn rollback(self) -> usize {
        let Self { world, undo } = self;
        let count = undo.len();
        for step in undo.into_iter().rev() {
            let result = match step {
                Undo::Restore { pos, previous } => {
                    let mutation = match previous {
                        Some(state) => MutationSpec::Replace(state),
                        None => MutationSpec::Clear,
                    };
                    world.mutate_block(pos, &mutation)
                }
                Undo::Withdraw { pos, stack } => world
                    .withdraw(pos, &stack.item, stack.count)
                    .map(|taken| {
                        if taken < stack.count {
                            log::warn!(
                                "Rollback at {pos} recovered {taken} of {} {}",
                                stack.count,
                                stack.item
                            );
                        }
                    }),
            };
            if let Err(err) = result {
                log::warn!("Failed to roll back effect: {err}");
            }
        }
        count
    }
}
