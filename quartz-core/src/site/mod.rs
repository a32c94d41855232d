//! Per-block automation state.
//!
//! An [`AutomationSite`] is created by the scheduler for every tracked block
//! of a registered type and only ever changed by it. [`advance`] moves a site
//! through one tick:
//!
//! ```text
//! Idle ──interval elapsed──▶ Eligible ──prerequisite holds──▶ Processing ──commit──▶ Idle
//!                                 └──────prerequisite fails─▶ Blocked
//! ```
//!
//! `Removed` is terminal and only reached through explicit removal.

use quartz_utils::Position;
use serde::Serialize;
use smallvec::SmallVec;

use crate::{
    behavior::{BehaviorDefinition, Readout, YieldContext},
    world::{BlockTypeId, ContainerSnapshots, Effect, WorldAccess},
};

/// Lifecycle state of a site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SiteState {
    /// Waiting for its interval to elapse.
    Idle,
    /// Interval elapsed, prerequisite not yet checked.
    Eligible,
    /// Produced effects that are waiting to be applied.
    Processing,
    /// Prerequisite failed or the world was not loaded. Retried next tick.
    Blocked,
    /// The block is gone. Terminal.
    Removed,
}

/// Result of one [`advance`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdvanceResult {
    /// The interval has not elapsed.
    NoOp,
    /// The prerequisite did not hold.
    Blocked,
    /// A cycle ran.
    Produced {
        /// Effects staged for application, empty unless the cycle completed.
        effects: SmallVec<[Effect; 4]>,
        /// Progress after the cycle.
        progress: u32,
        /// Whether progress reached the maximum and reset.
        completed: bool,
    },
}

/// What [`AutomationSite::rollback`] restores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Checkpoint {
    progress: u32,
    completed: bool,
}

/// Automation state for one block.
#[derive(Debug, Clone)]
pub struct AutomationSite {
    pos: Position,
    block: BlockTypeId,
    state: SiteState,
    progress: u32,
    last_processed: u64,
    pending: SmallVec<[Effect; 4]>,
    checkpoint: Option<Checkpoint>,
    created_tick: u64,
    blocked_since: Option<u64>,
    blocked_warned: bool,
    completions: u64,
}

impl AutomationSite {
    /// Creates an idle site whose interval counts from `anchor`.
    #[must_use]
    pub fn new(pos: Position, block: BlockTypeId, anchor: u64) -> Self {
        Self {
            pos,
            block,
            state: SiteState::Idle,
            progress: 0,
            last_processed: anchor,
            pending: SmallVec::new(),
            checkpoint: None,
            created_tick: anchor,
            blocked_since: None,
            blocked_warned: false,
            completions: 0,
        }
    }

    /// The site's position.
    #[must_use]
    pub fn pos(&self) -> Position {
        self.pos
    }

    /// The site's block type.
    #[must_use]
    pub fn block(&self) -> &BlockTypeId {
        &self.block
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> SiteState {
        self.state
    }

    /// Current progress towards the next completion.
    #[must_use]
    pub fn progress(&self) -> u32 {
        self.progress
    }

    /// The last tick a cycle ran, or the anchor tick if none has.
    #[must_use]
    pub fn last_processed(&self) -> u64 {
        self.last_processed
    }

    /// Effects staged by the current cycle.
    #[must_use]
    pub fn pending(&self) -> &[Effect] {
        &self.pending
    }

    /// The tick the site was anchored at.
    #[must_use]
    pub fn created_tick(&self) -> u64 {
        self.created_tick
    }

    /// The first tick of the current blocked streak.
    #[must_use]
    pub fn blocked_since(&self) -> Option<u64> {
        self.blocked_since
    }

    /// Number of committed completions.
    #[must_use]
    pub fn completions(&self) -> u64 {
        self.completions
    }

    /// Takes the staged effects for application.
    pub(crate) fn take_pending(&mut self) -> SmallVec<[Effect; 4]> {
        std::mem::take(&mut self.pending)
    }

    /// Accepts the applied cycle.
    pub fn commit(&mut self) {
        if self.checkpoint.take().is_some_and(|c| c.completed) {
            self.completions += 1;
        }
        self.pending.clear();
        self.state = SiteState::Idle;
    }

    /// Discards the current cycle's progress. `blocked` marks the site as
    /// waiting on the world rather than failed.
    pub fn rollback(&mut self, blocked: bool, tick: u64) {
        if let Some(checkpoint) = self.checkpoint.take() {
            self.progress = checkpoint.progress;
        }
        self.pending.clear();
        if blocked {
            self.mark_blocked(tick);
        } else {
            self.state = SiteState::Idle;
        }
    }

    /// Marks the site as removed. No further transitions happen.
    pub fn mark_removed(&mut self) {
        self.pending.clear();
        self.checkpoint = None;
        self.state = SiteState::Removed;
    }

    fn mark_blocked(&mut self, tick: u64) {
        self.state = SiteState::Blocked;
        self.blocked_since.get_or_insert(tick);
    }

    /// Returns the streak start the first time the site has been blocked for
    /// at least `threshold` ticks.
    pub(crate) fn blocked_too_long(&mut self, tick: u64, threshold: u64) -> Option<u64> {
        let since = self.blocked_since?;
        if self.blocked_warned || tick.saturating_sub(since) < threshold {
            return None;
        }
        self.blocked_warned = true;
        Some(since)
    }
}

/// Runs one tick of the state machine for `site`.
///
/// On [`AdvanceResult::Produced`] the effects are also staged on the site and
/// the pre-cycle progress is kept so the scheduler can [`commit`] or
/// [`rollback`] once the effects have been applied.
///
/// [`commit`]: AutomationSite::commit
/// [`rollback`]: AutomationSite::rollback
pub fn advance(
    site: &mut AutomationSite,
    definition: &BehaviorDefinition,
    world: &dyn WorldAccess,
    snapshots: &mut ContainerSnapshots,
    tick: u64,
    max_effects: usize,
) -> AdvanceResult {
    if site.state == SiteState::Removed {
        return AdvanceResult::NoOp;
    }

    let due = site
        .last_processed
        .saturating_add(u64::from(definition.interval().get()));
    if tick < due {
        site.state = SiteState::Idle;
        return AdvanceResult::NoOp;
    }

    site.state = SiteState::Eligible;
    match definition.prerequisite().check(site.pos, world, snapshots) {
        Ok(true) => {}
        Ok(false) => {
            site.mark_blocked(tick);
            return AdvanceResult::Blocked;
        }
        Err(err) => {
            log::trace!("Prerequisite for {} failed: {err}", site.pos);
            site.mark_blocked(tick);
            return AdvanceResult::Blocked;
        }
    }
    site.blocked_since = None;
    site.blocked_warned = false;

    let readout = Readout::capture(world, site.pos, definition.observe());
    let outcome = definition.compute_yield(&YieldContext {
        pos: site.pos,
        block: &site.block,
        progress: site.progress,
        max_progress: definition.max_progress(),
        tick,
        readout: &readout,
    });

    let max = definition.max_progress();
    let reached = outcome.progress.min(max);
    let completed = reached == max;
    let mut effects = SmallVec::new();
    if completed {
        effects = outcome.outputs;
        if effects.len() > max_effects {
            log::warn!(
                "Site {} emitted {} effects, keeping the first {max_effects}",
                site.pos,
                effects.len()
            );
            effects.truncate(max_effects);
        }
    } else if !outcome.outputs.is_empty() {
        log::trace!(
            "Site {} dropped {} outputs, progress {reached} of {max}",
            site.pos,
            outcome.outputs.len()
        );
    }

    site.checkpoint = Some(Checkpoint {
        progress: site.progress,
        completed,
    });
    site.progress = if completed {
        definition.reset_progress()
    } else {
        reached
    };
    site.last_processed = tick;
    site.state = SiteState::Processing;
    site.pending = effects.clone();

    AdvanceResult::Produced {
        effects,
        progress: site.progress,
        completed,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use quartz_utils::{BlockOffset, Identifier};

    use super::*;
    use crate::{
        behavior::{Prerequisite, YieldOutcome},
        inventory::ItemStack,
        world::{BlockState, StubWorld, WorldError},
    };

    const GENERATOR: Identifier = Identifier::new_static("fastquartz", "quartz_generator");
    const POWER: Identifier = Identifier::new_static("fastquartz", "power_cell");

    fn pos() -> Position {
        Position::overworld(0, 64, 0)
    }

    fn deliver_one() -> Effect {
        Effect::Deliver {
            pos: pos().offset(BlockOffset::DOWN),
            stack: ItemStack::new(Identifier::vanilla_static("quartz"), 1),
        }
    }

    fn run(
        site: &mut AutomationSite,
        def: &BehaviorDefinition,
        world: &StubWorld,
        tick: u64,
    ) -> AdvanceResult {
        advance(site, def, world, &mut ContainerSnapshots::new(), tick, 16)
    }

    #[test]
    fn test_interval_gates_processing() {
        let world = StubWorld::empty_world();
        let def = BehaviorDefinition::builder(4, 10).build().expect("valid");
        let mut site = AutomationSite::new(pos(), GENERATOR, 0);

        for tick in 1..4 {
            assert_eq!(run(&mut site, &def, &world, tick), AdvanceResult::NoOp);
            assert_eq!(site.state(), SiteState::Idle);
        }
        assert!(matches!(
            run(&mut site, &def, &world, 4),
            AdvanceResult::Produced { progress: 1, .. }
        ));
        assert_eq!(site.state(), SiteState::Processing);
        assert_eq!(site.last_processed(), 4);
    }

    #[test]
    fn test_completion_emits_and_resets() {
        let world = StubWorld::empty_world();
        let def = BehaviorDefinition::builder(1, 2)
            .reset_progress(1)
            .yields(|ctx| YieldOutcome::with_outputs(ctx.progress + 1, [deliver_one()]))
            .build()
            .expect("valid");
        let mut site = AutomationSite::new(pos(), GENERATOR, 0);

        let first = run(&mut site, &def, &world, 1);
        assert_eq!(
            first,
            AdvanceResult::Produced {
                effects: SmallVec::new(),
                progress: 1,
                completed: false
            }
        );
        site.commit();

        let second = run(&mut site, &def, &world, 2);
        assert!(matches!(
            &second,
            AdvanceResult::Produced { effects, progress: 1, completed: true } if effects.len() == 1
        ));
        assert_eq!(site.pending().len(), 1);
        site.commit();
        assert_eq!(site.completions(), 1);
        assert!(site.pending().is_empty());
        assert_eq!(site.state(), SiteState::Idle);
    }

    #[test]
    fn test_incomplete_cycles_stage_no_outputs() {
        let world = StubWorld::empty_world();
        let def = BehaviorDefinition::builder(1, 3)
            .yields(|ctx| {
                YieldOutcome::with_outputs(ctx.progress + 1, [deliver_one(), deliver_one()])
            })
            .build()
            .expect("valid");
        let mut site = AutomationSite::new(pos(), GENERATOR, 0);

        for tick in 1..=2 {
            assert!(matches!(
                run(&mut site, &def, &world, tick),
                AdvanceResult::Produced { ref effects, completed: false, .. } if effects.is_empty()
            ));
            assert!(site.pending().is_empty());
            site.commit();
        }
        assert!(matches!(
            run(&mut site, &def, &world, 3),
            AdvanceResult::Produced { ref effects, completed: true, .. } if effects.len() == 2
        ));
        assert_eq!(site.pending().len(), 2);
    }

    #[test]
    fn test_overshoot_is_clamped() {
        let world = StubWorld::empty_world();
        let def = BehaviorDefinition::builder(1, 5)
            .yields(|_| YieldOutcome::with_outputs(1000, [deliver_one()]))
            .build()
            .expect("valid");
        let mut site = AutomationSite::new(pos(), GENERATOR, 0);

        assert!(matches!(
            run(&mut site, &def, &world, 1),
            AdvanceResult::Produced { progress: 0, completed: true, .. }
        ));
        assert!(site.progress() <= def.max_progress());
    }

    #[test]
    fn test_blocked_keeps_progress_and_retries() {
        let mut world = StubWorld::empty_world();
        let def = BehaviorDefinition::builder(2, 10)
            .prerequisite(Prerequisite::BlockAt {
                offset: BlockOffset::UP,
                block: POWER,
            })
            .build()
            .expect("valid");
        let mut site = AutomationSite::new(pos(), GENERATOR, 0);

        assert_eq!(run(&mut site, &def, &world, 2), AdvanceResult::Blocked);
        assert_eq!(site.state(), SiteState::Blocked);
        assert_eq!(site.blocked_since(), Some(2));
        assert_eq!(site.last_processed(), 0);

        assert_eq!(run(&mut site, &def, &world, 3), AdvanceResult::Blocked);
        assert_eq!(site.blocked_since(), Some(2));

        world.place_block(pos().offset(BlockOffset::UP), BlockState::of(POWER));
        assert!(matches!(
            run(&mut site, &def, &world, 4),
            AdvanceResult::Produced { progress: 1, .. }
        ));
        assert_eq!(site.blocked_since(), None);
    }

    #[test]
    fn test_prerequisite_error_is_blocked() {
        let world = StubWorld::empty_world();
        let def = BehaviorDefinition::builder(1, 1)
            .prerequisite(Prerequisite::Custom(Arc::new(
                |pos: Position, _: &dyn WorldAccess| -> Result<bool, WorldError> {
                    Err(WorldError::NotLoaded(pos))
                },
            )))
            .build()
            .expect("valid");
        let mut site = AutomationSite::new(pos(), GENERATOR, 0);
        assert_eq!(run(&mut site, &def, &world, 1), AdvanceResult::Blocked);
    }

    #[test]
    fn test_rollback_restores_progress() {
        let world = StubWorld::empty_world();
        let def = BehaviorDefinition::builder(1, 3).build().expect("valid");
        let mut site = AutomationSite::new(pos(), GENERATOR, 0);

        run(&mut site, &def, &world, 1);
        site.commit();
        assert_eq!(site.progress(), 1);

        run(&mut site, &def, &world, 2);
        assert_eq!(site.progress(), 2);
        site.rollback(false, 2);
        assert_eq!(site.progress(), 1);
        assert_eq!(site.state(), SiteState::Idle);
        assert_eq!(site.last_processed(), 2);

        run(&mut site, &def, &world, 3);
        site.rollback(true, 3);
        assert_eq!(site.state(), SiteState::Blocked);
        assert_eq!(site.blocked_since(), Some(3));
    }

    #[test]
    fn test_removed_is_terminal() {
        let world = StubWorld::empty_world();
        let def = BehaviorDefinition::builder(1, 1).build().expect("valid");
        let mut site = AutomationSite::new(pos(), GENERATOR, 0);
        site.mark_removed();
        assert_eq!(run(&mut site, &def, &world, 10), AdvanceResult::NoOp);
        assert_eq!(site.state(), SiteState::Removed);
    }

    #[test]
    fn test_blocked_warning_fires_once() {
        let mut site = AutomationSite::new(pos(), GENERATOR, 0);
        site.mark_blocked(5);
        assert_eq!(site.blocked_too_long(10, 10), None);
        assert_eq!(site.blocked_too_long(15, 10), Some(5));
        assert_eq!(site.blocked_too_long(16, 10), None);
    }
}
