//! Wall-clock benchmark over a seeded random layout.
//!
//! The criterion benches in `quartz-core` measure a single tick in isolation.
//! This runs a whole session the way a server would and reports throughput.

use std::{sync::Arc, time::Duration};

use quartz_core::{
    AutomationRegistry, EngineConfig, RegistryError, StubWorld, TickScheduler, world::BlockState,
};
use quartz_utils::{
    BlockOffset, Identifier, Position,
    random::{Random, Xoroshiro},
};
use serde::Serialize;

use crate::{presets::BehaviorPreset, scenario::ScenarioError};

const GENERATOR: Identifier = Identifier::new_static("fastquartz", "quartz_generator");
const QUARRY: Identifier = Identifier::new_static("fastquartz", "quartz_quarry");
const QUARTZ_ORE: Identifier = Identifier::vanilla_static("nether_quartz_ore");
const QUARTZ: Identifier = Identifier::vanilla_static("quartz");

/// Units in every generated quartz node.
const NODE_SIZE: u32 = 64;

/// Benchmark parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BenchOptions {
    /// Sites to scatter.
    pub sites: usize,
    /// Ticks to run.
    pub ticks: u64,
    /// Layout seed.
    pub seed: u64,
}

/// Totals from a benchmark run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchSummary {
    /// Sites tracked after the last tick.
    pub sites: usize,
    /// Ticks run.
    pub ticks: u64,
    /// Site cycles applied.
    pub processed: u64,
    /// Site visits that ended blocked.
    pub blocked: u64,
    /// Effects applied.
    pub effects: u64,
    /// Wall time inside the scheduler.
    pub total: Duration,
    /// Mean tick duration.
    pub average_tick: Duration,
    /// Slowest tick.
    pub max_tick: Duration,
    /// Fraction of the tick budget used on average.
    pub budget_used: f64,
}

fn presets() -> [(Identifier, BehaviorPreset); 2] {
    [
        (
            GENERATOR,
            BehaviorPreset::Generator {
                interval: 4,
                max_progress: 2,
                reset_progress: 0,
                output: BlockOffset::DOWN,
                item: QUARTZ,
                count: 1,
                power: None,
            },
        ),
        (
            QUARRY,
            BehaviorPreset::Quarry {
                interval: 10,
                max_progress: 1,
                node: QUARTZ_ORE,
                node_offset: BlockOffset::DOWN,
                output: BlockOffset::UP,
                item: QUARTZ,
                count: 2,
            },
        ),
    ]
}

/// Builds a scheduler with `options.sites` generators and quarries scattered
/// over a 512x512 area.
pub fn populated_scheduler(
    options: &BenchOptions,
    config: EngineConfig,
) -> Result<TickScheduler<StubWorld>, ScenarioError> {
    let registry = Arc::new(AutomationRegistry::new());
    for (block, preset) in presets() {
        preset
            .definition()
            .and_then(|definition| registry.register(block.clone(), definition))
            .map_err(|source: RegistryError| ScenarioError::Registry { block, source })?;
    }

    let mut world = StubWorld::empty_world();
    let mut random = Xoroshiro::from_seed(options.seed);
    for _ in 0..options.sites {
        let pos = Position::overworld(
            random.next_i32_between(-256, 255),
            random.next_i32_between(0, 120),
            random.next_i32_between(-256, 255),
        );
        if random.next_bool() {
            world.place_block(pos, BlockState::of(GENERATOR));
            world.attach_container(pos.offset(BlockOffset::DOWN), 27);
        } else {
            world.place_block(pos, BlockState::of(QUARRY));
            world.place_block(
                pos.offset(BlockOffset::DOWN),
                BlockState::new(QUARTZ_ORE, NODE_SIZE),
            );
            world.attach_container(pos.offset(BlockOffset::UP), 27);
        }
    }
    Ok(TickScheduler::with_config(registry, world, config))
}

/// Runs `options.ticks` ticks over a fresh layout.
pub fn run_bench(
    options: &BenchOptions,
    config: EngineConfig,
) -> Result<BenchSummary, ScenarioError> {
    let budget = config.tick_duration();
    let mut scheduler = populated_scheduler(options, config)?;
    log::info!(
        "Benchmarking {} sites for {} ticks (seed {})",
        options.sites,
        options.ticks,
        options.seed
    );

    for tick in 1..=options.ticks {
        scheduler.advance_tick(tick)?;
    }

    let metrics = scheduler.metrics();
    let average_tick = metrics.average_tick_time();
    Ok(BenchSummary {
        sites: scheduler.active_site_count(),
        ticks: metrics.ticks,
        processed: metrics.sites_processed,
        blocked: metrics.sites_blocked,
        effects: metrics.effects_applied,
        total: metrics.total_time(),
        average_tick,
        max_tick: metrics.max_tick_time,
        budget_used: if budget.is_zero() {
            0.0
        } else {
            average_tick.as_secs_f64() / budget.as_secs_f64()
        },
    })
}
