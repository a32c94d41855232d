//! Deterministic tick driver for automation sites.

use std::{
    collections::{BTreeMap, VecDeque},
    num::NonZeroUsize,
    sync::Arc,
    time::Instant,
};

use quartz_utils::Position;
use thiserror::Error;

use crate::{
    behavior::{AutomationRegistry, BehaviorDefinition},
    config::EngineConfig,
    site::{self, AdvanceResult, AutomationSite, SiteState},
    world::{BlockTypeId, ContainerSnapshots, ShadowCommit, SiteChange, WorldAccess, WorldError},
};

use super::{AppliedEffect, SchedulerMetrics, SiteFailure, TickReport};

/// Misuse of the tick API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    /// Ticks must strictly increase.
    #[error("tick {requested} is not after the last processed tick {last}")]
    NonMonotonicTick {
        /// The last tick that was advanced.
        last: u64,
        /// The rejected tick.
        requested: u64,
    },
}

/// A site and the behavior it was created under.
struct TrackedSite {
    site: AutomationSite,
    definition: Arc<BehaviorDefinition>,
}

impl TrackedSite {
    fn is_current(&self, registry: &AutomationRegistry) -> bool {
        registry.is_current(self.site.block(), &self.definition)
    }
}

/// Advances every tracked automation site once per tick.
///
/// Each [`advance_tick`](Self::advance_tick) call runs three phases:
///
/// 1. Reconcile: apply placements and removals reported by the world and drop
///    sites whose behavior was unregistered or replaced.
/// 2. Evaluate: run the state machine of every active site in position order.
///    Nothing is written to the world in this phase, so every prerequisite sees
///    the world as it was when the tick started.
/// 3. Apply: write each site's effects through a [`ShadowCommit`], rolling the
///    site back if any of them is rejected.
pub struct TickScheduler<W: WorldAccess> {
    registry: Arc<AutomationRegistry>,
    world: W,
    config: EngineConfig,
    /// Active-site index. Iteration order is the processing order.
    sites: BTreeMap<Position, TrackedSite>,
    /// Placements waiting for capacity, oldest first.
    deferred: VecDeque<(Position, BlockTypeId)>,
    last_tick: Option<u64>,
    seen_generation: u64,
    snapshots: ContainerSnapshots,
    metrics: SchedulerMetrics,
}

impl<W: WorldAccess> TickScheduler<W> {
    /// Creates a scheduler with the default configuration.
    pub fn new(registry: Arc<AutomationRegistry>, world: W) -> Self {
        Self::with_config(registry, world, EngineConfig::default())
    }

    /// Creates a scheduler with the given configuration.
    pub fn with_config(registry: Arc<AutomationRegistry>, world: W, config: EngineConfig) -> Self {
        let seen_generation = registry.generation();
        Self {
            registry,
            world,
            config,
            sites: BTreeMap::new(),
            deferred: VecDeque::new(),
            last_tick: None,
            seen_generation,
            snapshots: ContainerSnapshots::new(),
            metrics: SchedulerMetrics::default(),
        }
    }

    /// Advances all sites to `tick`.
    ///
    /// Fails without touching any state if `tick` is not strictly greater than
    /// the previous one. World errors never fail the tick; they are recorded
    /// per site in the report.
    pub fn advance_tick(&mut self, tick: u64) -> Result<TickReport, SchedulerError> {
        if let Some(last) = self.last_tick
            && tick <= last
        {
            return Err(SchedulerError::NonMonotonicTick {
                last,
                requested: tick,
            });
        }

        let registry = Arc::clone(&self.registry);
        let _guard = registry.enter_tick();
        let started = Instant::now();

        // New sites count their first interval from the previous tick.
        let anchor = self.last_tick.unwrap_or_else(|| tick.saturating_sub(1));
        self.last_tick = Some(tick);
        let mut report = TickReport::new(tick);

        self.reconcile(&registry, anchor, &mut report);
        let reconciled = Instant::now();
        self.evaluate(tick, &mut report);
        let evaluated = Instant::now();
        self.apply(tick, &mut report);
        let applied = Instant::now();

        report.blocked.sort_unstable();
        report.removed.sort_unstable();
        report.sites_removed = report.removed.len();
        report.active_sites = self.sites.len();
        report.deferred = self.deferred.len();

        self.metrics.reconcile_time += reconciled - started;
        self.metrics.evaluate_time += evaluated - reconciled;
        self.metrics.apply_time += applied - evaluated;
        self.metrics.record_tick(applied - started);

        log::trace!(
            "Tick {tick}: {} processed, {} blocked, {} errored, {} skipped",
            report.processed_count(),
            report.blocked_count(),
            report.errored_count(),
            report.skipped_count()
        );
        Ok(report)
    }

    fn reconcile(&mut self, registry: &AutomationRegistry, anchor: u64, report: &mut TickReport) {
        let generation = registry.generation();
        if generation != self.seen_generation {
            let removed = &mut report.removed;
            self.sites.retain(|pos, tracked| {
                let keep = tracked.is_current(registry);
                if !keep {
                    log::debug!(
                        "Dropping site {pos}, the behavior for {} changed",
                        tracked.site.block()
                    );
                    removed.push(*pos);
                }
                keep
            });
            self.deferred.retain(|(_, block)| registry.contains(block));
            self.seen_generation = generation;
        }

        for change in self.world.drain_changes() {
            match change {
                SiteChange::Removed { pos } => {
                    if self.remove_site(pos) {
                        report.removed.push(pos);
                    }
                }
                SiteChange::Placed { pos, block } => {
                    if self.remove_site(pos) {
                        report.removed.push(pos);
                    }
                    if registry.contains(&block) {
                        self.deferred.push_back((pos, block));
                    }
                }
            }
        }

        let capacity = self
            .config
            .max_active_sites
            .map_or(usize::MAX, NonZeroUsize::get);
        while self.sites.len() < capacity {
            let Some((pos, block)) = self.deferred.pop_front() else {
                break;
            };
            let Some(definition) = registry.lookup(&block) else {
                continue;
            };
            log::debug!("Tracking {block} at {pos}");
            let site = AutomationSite::new(pos, block, anchor);
            self.sites.insert(pos, TrackedSite { site, definition });
            report.sites_added += 1;
        }
        if !self.deferred.is_empty() {
            log::debug!(
                "{} placements deferred, site cap of {capacity} reached",
                self.deferred.len()
            );
        }
    }

    /// Drops the site or queued placement at `pos`. Returns true if a site was tracked there.
    fn remove_site(&mut self, pos: Position) -> bool {
        self.deferred.retain(|(queued, _)| *queued != pos);
        self.sites.remove(&pos).is_some()
    }

    fn evaluate(&mut self, tick: u64, report: &mut TickReport) {
        let max_effects = self.config.max_effects_per_site;
        let warn_after = self.config.blocked_warn_ticks;
        self.snapshots.clear();

        let world: &dyn WorldAccess = &self.world;
        for (pos, TrackedSite { site, definition }) in &mut self.sites {
            if !world.is_active(*pos) {
                report.skipped.push(*pos);
                continue;
            }
            let result = site::advance(
                site,
                definition,
                world,
                &mut self.snapshots,
                tick,
                max_effects,
            );
            if result == AdvanceResult::Blocked {
                report.blocked.push(*pos);
                if let Some(since) = site.blocked_too_long(tick, warn_after) {
                    log::warn!(
                        "Automation site {pos} ({}) has been blocked since tick {since}",
                        site.block()
                    );
                }
            }
        }

        self.metrics.sites_skipped += report.skipped.len() as u64;
        self.metrics.sites_blocked += report.blocked.len() as u64;
        self.metrics.snapshot_hits += self.snapshots.hits();
    }

    fn apply(&mut self, tick: u64, report: &mut TickReport) {
        for (pos, TrackedSite { site, .. }) in &mut self.sites {
            if site.state() != SiteState::Processing {
                continue;
            }
            let effects = site.take_pending();
            let mut commit = ShadowCommit::new(&mut self.world);
            let failure = effects.iter().find_map(|effect| commit.apply(effect).err());

            match failure {
                None => {
                    self.metrics.effects_applied += commit.finish() as u64;
                    self.metrics.sites_processed += 1;
                    site.commit();
                    report.processed.push(*pos);
                    report
                        .applied
                        .extend(effects.into_iter().map(|effect| AppliedEffect {
                            site: *pos,
                            effect,
                        }));
                }
                Some(WorldError::NotLoaded(target)) => {
                    self.metrics.effects_rolled_back += commit.rollback() as u64;
                    self.metrics.sites_blocked += 1;
                    site.rollback(true, tick);
                    report.blocked.push(*pos);
                    log::debug!("Site {pos} blocked, {target} is not loaded");
                }
                Some(error) => {
                    self.metrics.effects_rolled_back += commit.rollback() as u64;
                    self.metrics.sites_errored += 1;
                    site.rollback(false, tick);
                    log::debug!("Site {pos} rolled back: {error}");
                    report.errored.push(SiteFailure { pos: *pos, error });
                }
            }
        }
    }

    /// Drops every site, queued placement and the tick history.
    ///
    /// The world is left as is. Blocks already in it are only tracked again
    /// once the world reports them as placed.
    pub fn reset(&mut self) {
        self.sites.clear();
        self.deferred.clear();
        self.last_tick = None;
        self.seen_generation = self.registry.generation();
        self.snapshots.clear();
        self.metrics = SchedulerMetrics::default();
        log::debug!("Scheduler reset");
    }

    /// Tracked sites in processing order.
    ///
    /// Sites whose behavior was unregistered since the last tick are left out,
    /// even before the next tick drops them.
    pub fn sites(&self) -> impl Iterator<Item = &AutomationSite> {
        self.sites
            .values()
            .filter(move |tracked| tracked.is_current(&self.registry))
            .map(|tracked| &tracked.site)
    }

    /// The site at `pos`.
    #[must_use]
    pub fn site(&self, pos: Position) -> Option<&AutomationSite> {
        self.sites
            .get(&pos)
            .filter(|tracked| tracked.is_current(&self.registry))
            .map(|tracked| &tracked.site)
    }

    /// Number of tracked sites.
    #[must_use]
    pub fn active_site_count(&self) -> usize {
        if self.registry.generation() == self.seen_generation {
            self.sites.len()
        } else {
            self.sites().count()
        }
    }

    /// The last tick advanced, `None` before the first.
    #[must_use]
    pub fn last_tick(&self) -> Option<u64> {
        self.last_tick
    }

    /// The world.
    #[must_use]
    pub fn world(&self) -> &W {
        &self.world
    }

    /// The world, for host-side edits between ticks.
    pub fn world_mut(&mut self) -> &mut W {
        &mut self.world
    }

    /// The shared registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<AutomationRegistry> {
        &self.registry
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Counters and timings since creation or the last reset.
    #[must_use]
    pub fn metrics(&self) -> &SchedulerMetrics {
        &self.metrics
    }
}

#[cfg(test)]
mod tests {
    use quartz_utils::{BlockOffset, DimensionId, Identifier};

    use super::*;
    use crate::{
        behavior::{BehaviorDefinition, Prerequisite, RegistryError, YieldOutcome},
        inventory::{Container, ItemStack},
        world::{BlockState, Effect, MutationSpec, RejectReason, StubWorld},
    };

    const GENERATOR: Identifier = Identifier::new_static("fastquartz", "quartz_generator");
    const POWER: Identifier = Identifier::new_static("fastquartz", "power_cell");
    const QUARTZ: Identifier = Identifier::vanilla_static("quartz");

    fn chest_below(pos: Position) -> Position {
        pos.offset(BlockOffset::DOWN)
    }

    /// Delivers one quartz to the chest below every `interval` ticks.
    fn generator(interval: u32) -> BehaviorDefinition {
        BehaviorDefinition::builder(interval, 1)
            .yields(|ctx| {
                YieldOutcome::with_outputs(
                    ctx.progress + 1,
                    [Effect::Deliver {
                        pos: chest_below(ctx.pos),
                        stack: ItemStack::new(QUARTZ, 1),
                    }],
                )
            })
            .build()
            .expect("valid generator")
    }

    fn scheduler_with(definition: BehaviorDefinition) -> TickScheduler<StubWorld> {
        let registry = Arc::new(AutomationRegistry::new());
        registry
            .register(GENERATOR, definition)
            .expect("register");
        TickScheduler::new(registry, StubWorld::empty_world())
    }

    fn place_generator(scheduler: &mut TickScheduler<StubWorld>, pos: Position) {
        let world = scheduler.world_mut();
        world.place_block(pos, BlockState::of(GENERATOR));
        world.attach_container(chest_below(pos), 1);
    }

    #[test]
    fn test_non_monotonic_tick_is_rejected() {
        let mut scheduler = scheduler_with(generator(1));
        place_generator(&mut scheduler, Position::overworld(0, 64, 0));
        scheduler.advance_tick(5).expect("tick 5");

        assert_eq!(
            scheduler.advance_tick(5),
            Err(SchedulerError::NonMonotonicTick {
                last: 5,
                requested: 5
            })
        );
        assert_eq!(
            scheduler.advance_tick(3),
            Err(SchedulerError::NonMonotonicTick {
                last: 5,
                requested: 3
            })
        );
        assert_eq!(scheduler.last_tick(), Some(5));
        assert_eq!(scheduler.metrics().ticks, 1);
    }

    #[test]
    fn test_first_processing_after_one_interval() {
        let mut scheduler = scheduler_with(generator(4));
        let pos = Position::overworld(0, 64, 0);
        place_generator(&mut scheduler, pos);

        for tick in 1..=3 {
            let report = scheduler.advance_tick(tick).expect("tick");
            assert!(report.processed.is_empty(), "tick {tick}");
        }
        let report = scheduler.advance_tick(4).expect("tick 4");
        assert_eq!(report.processed, vec![pos]);
        assert_eq!(report.effects_count(), 1);
    }

    #[test]
    fn test_rejection_rolls_back() {
        let mut scheduler = scheduler_with(generator(1));
        let pos = Position::overworld(0, 64, 0);
        place_generator(&mut scheduler, pos);
        scheduler.world_mut().reject_at(chest_below(pos));

        let report = scheduler.advance_tick(1).expect("tick");
        assert!(report.processed.is_empty());
        assert_eq!(
            report.errored,
            vec![SiteFailure {
                pos,
                error: WorldError::rejected(chest_below(pos), RejectReason::Refused)
            }]
        );
        let site = scheduler.site(pos).expect("site retained");
        assert_eq!(site.progress(), 0);
        assert_eq!(site.completions(), 0);
        assert_eq!(
            scheduler
                .world()
                .container(chest_below(pos))
                .map(|c| c.count_of(&QUARTZ)),
            Some(0)
        );
    }

    #[test]
    fn test_inactive_site_is_skipped_and_retained() {
        let mut scheduler = scheduler_with(generator(1));
        let pos = Position::overworld(0, 64, 0);
        place_generator(&mut scheduler, pos);
        scheduler.advance_tick(1).expect("tick 1");

        scheduler
            .world_mut()
            .unload_chunk(DimensionId::OVERWORLD, pos.chunk());
        let report = scheduler.advance_tick(2).expect("tick 2");
        assert_eq!(report.skipped, vec![pos]);
        assert_eq!(report.active_sites, 1);
    }

    #[test]
    fn test_unloaded_target_blocks_instead_of_erroring() {
        let mut scheduler = scheduler_with(
            BehaviorDefinition::builder(1, 1)
                .yields(|ctx| {
                    YieldOutcome::with_outputs(
                        1,
                        [Effect::Mutate {
                            pos: ctx.pos.offset(BlockOffset::new(64, 0, 0)),
                            mutation: MutationSpec::Clear,
                        }],
                    )
                })
                .build()
                .expect("valid"),
        );
        let pos = Position::overworld(0, 64, 0);
        place_generator(&mut scheduler, pos);
        let far = pos.offset(BlockOffset::new(64, 0, 0));
        scheduler
            .world_mut()
            .unload_chunk(DimensionId::OVERWORLD, far.chunk());

        let report = scheduler.advance_tick(1).expect("tick");
        assert_eq!(report.blocked, vec![pos]);
        assert!(report.errored.is_empty());
        assert_eq!(
            scheduler.site(pos).map(AutomationSite::state),
            Some(SiteState::Blocked)
        );
    }

    #[test]
    fn test_prerequisite_blocks_until_powered() {
        let mut scheduler = scheduler_with(
            BehaviorDefinition::builder(1, 1)
                .prerequisite(Prerequisite::BlockAt {
                    offset: BlockOffset::UP,
                    block: POWER,
                })
                .build()
                .expect("valid"),
        );
        let pos = Position::overworld(0, 64, 0);
        place_generator(&mut scheduler, pos);

        let report = scheduler.advance_tick(1).expect("tick 1");
        assert_eq!(report.blocked, vec![pos]);

        scheduler
            .world_mut()
            .place_block(pos.offset(BlockOffset::UP), BlockState::of(POWER));
        let report = scheduler.advance_tick(2).expect("tick 2");
        assert_eq!(report.processed, vec![pos]);
    }

    #[test]
    fn test_capacity_defers_placements() {
        let registry = Arc::new(AutomationRegistry::new());
        registry
            .register(GENERATOR, generator(1))
            .expect("register");
        let config = EngineConfig {
            max_active_sites: NonZeroUsize::new(1),
            ..EngineConfig::default()
        };
        let mut scheduler = TickScheduler::with_config(registry, StubWorld::empty_world(), config);
        let a = Position::overworld(0, 64, 0);
        let b = Position::overworld(4, 64, 0);
        place_generator(&mut scheduler, a);
        place_generator(&mut scheduler, b);

        let report = scheduler.advance_tick(1).expect("tick 1");
        assert_eq!(report.active_sites, 1);
        assert_eq!(report.deferred, 1);
        assert_eq!(report.processed, vec![a]);

        scheduler.world_mut().remove_block(a);
        let report = scheduler.advance_tick(2).expect("tick 2");
        assert_eq!(report.sites_removed, 1);
        assert_eq!(report.removed, vec![a]);
        assert_eq!(report.sites_added, 1);
        assert_eq!(report.deferred, 0);
        assert!(scheduler.site(b).is_some());
    }

    #[test]
    fn test_unregister_purges_sites() {
        let mut scheduler = scheduler_with(generator(1));
        let pos = Position::overworld(0, 64, 0);
        place_generator(&mut scheduler, pos);
        scheduler.advance_tick(1).expect("tick 1");

        let registry = Arc::clone(scheduler.registry());
        registry.unregister(&GENERATOR).expect("unregister");
        let report = scheduler.advance_tick(2).expect("tick 2");
        assert_eq!(report.sites_removed, 1);
        assert_eq!(report.active_sites, 0);
        assert!(report.processed.is_empty());
    }

    #[test]
    fn test_reregistration_drops_stale_sites() {
        let mut scheduler =
            scheduler_with(BehaviorDefinition::builder(1, 10).build().expect("valid"));
        let pos = Position::overworld(0, 64, 0);
        place_generator(&mut scheduler, pos);
        for tick in 1..=7 {
            scheduler.advance_tick(tick).expect("tick");
        }
        assert_eq!(scheduler.site(pos).map(AutomationSite::progress), Some(7));

        let registry = Arc::clone(scheduler.registry());
        registry.unregister(&GENERATOR).expect("unregister");
        assert!(scheduler.site(pos).is_none());
        assert_eq!(scheduler.active_site_count(), 0);

        registry
            .register(
                GENERATOR,
                BehaviorDefinition::builder(1, 3).build().expect("valid"),
            )
            .expect("register again");
        assert!(scheduler.site(pos).is_none());

        let report = scheduler.advance_tick(8).expect("tick 8");
        assert_eq!(report.sites_removed, 1);
        assert_eq!(report.removed, vec![pos]);
        assert_eq!(report.active_sites, 0);
        assert!(report.processed.is_empty());
        assert_eq!(scheduler.sites().count(), 0);

        // Placing the block again tracks a fresh site under the new behavior.
        scheduler
            .world_mut()
            .place_block(pos, BlockState::of(GENERATOR));
        scheduler.advance_tick(9).expect("tick 9");
        let site = scheduler.site(pos).expect("tracked again");
        assert_eq!(site.created_tick(), 8);
        assert_eq!(site.progress(), 1);
        for tick in 10..=20 {
            scheduler.advance_tick(tick).expect("tick");
            assert!(scheduler.sites().all(|site| site.progress() <= 3));
        }
    }

    #[test]
    fn test_registry_is_guarded_during_tick() {
        let registry = Arc::new(AutomationRegistry::new());
        let observed = Arc::new(parking_lot::Mutex::new(None));
        let nested_registry = Arc::clone(&registry);
        let nested_result = Arc::clone(&observed);
        let extra_definition = BehaviorDefinition::builder(1, 1).build().expect("valid");
        registry
            .register(
                GENERATOR,
                BehaviorDefinition::builder(1, 1)
                    .prerequisite(Prerequisite::Custom(Arc::new(
                        move |_: Position, _: &dyn WorldAccess| -> Result<bool, WorldError> {
                            let attempt = nested_registry.register(POWER, extra_definition.clone());
                            *nested_result.lock() = Some(attempt);
                            Ok(true)
                        },
                    )))
                    .build()
                    .expect("valid"),
            )
            .expect("register");

        let mut scheduler = TickScheduler::new(Arc::clone(&registry), StubWorld::empty_world());
        place_generator(&mut scheduler, Position::overworld(0, 64, 0));
        scheduler.advance_tick(1).expect("tick");

        assert_eq!(
            *observed.lock(),
            Some(Err(RegistryError::ConcurrentModification))
        );
        assert!(!registry.contains(&POWER));
        assert!(!registry.in_tick());
    }

    #[test]
    fn test_reset_forgets_everything() {
        let mut scheduler = scheduler_with(generator(1));
        place_generator(&mut scheduler, Position::overworld(0, 64, 0));
        scheduler.advance_tick(10).expect("tick");

        scheduler.reset();
        assert_eq!(scheduler.active_site_count(), 0);
        assert_eq!(scheduler.last_tick(), None);
        assert_eq!(scheduler.metrics().ticks, 0);
        scheduler.advance_tick(1).expect("ticks restart");
    }
}
