//! Drives a [`Scenario`] against a [`StubWorld`].

use std::{fmt::Debug, sync::Arc};

use quartz_core::{
    AutomationRegistry, EngineConfig, StubWorld, TickReport, TickScheduler, WorldAccess,
    inventory::Container,
    world::{BlockState, StubSnapshot},
};
use serde::Serialize;

use crate::scenario::{Action, Check, Scenario, ScenarioError};

/// A check that did not hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckFailure {
    /// The tick after which it ran.
    pub tick: u64,
    /// The check.
    pub check: Check,
    /// What was found instead.
    pub message: String,
}

/// Everything a scenario run produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScenarioOutcome {
    /// The scenario name.
    pub name: String,
    /// One report per tick.
    pub reports: Vec<TickReport>,
    /// Failed checks, in tick order.
    pub failures: Vec<CheckFailure>,
    /// The world after the last tick.
    pub final_world: StubSnapshot,
}

impl ScenarioOutcome {
    /// Whether every check held.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Runs `scenario` from tick 1 to its last tick.
///
/// Failed checks are collected, not returned as errors. Errors mean the
/// scenario itself could not be run.
pub fn run_scenario(
    scenario: &Scenario,
    config: &EngineConfig,
) -> Result<ScenarioOutcome, ScenarioError> {
    let span = tracing::info_span!("scenario", name = %scenario.name);
    let _enter = span.enter();

    let registry = Arc::new(AutomationRegistry::new());
    for (block, preset) in &scenario.behaviors {
        preset
            .definition()
            .and_then(|definition| registry.register(block.clone(), definition))
            .map_err(|source| ScenarioError::Registry {
                block: block.clone(),
                source,
            })?;
    }

    let mut scheduler =
        TickScheduler::with_config(registry, StubWorld::empty_world(), config.clone());
    for action in &scenario.setup {
        apply_action(&mut scheduler, action);
    }

    let mut reports = Vec::with_capacity(usize::try_from(scenario.ticks).unwrap_or(0));
    let mut failures = Vec::new();
    for tick in 1..=scenario.ticks {
        if let Some(actions) = scenario.timeline.get(&tick) {
            for action in actions {
                apply_action(&mut scheduler, action);
            }
        }

        let report = scheduler.advance_tick(tick)?;
        if let Some(checks) = scenario.assertions.get(&tick) {
            for check in checks {
                if let Err(message) = evaluate_check(check, &report, &scheduler) {
                    tracing::warn!(tick, %message, "Check failed");
                    failures.push(CheckFailure {
                        tick,
                        check: check.clone(),
                        message,
                    });
                }
            }
        }
        reports.push(report);
    }

    tracing::info!(
        ticks = scenario.ticks,
        failures = failures.len(),
        "Scenario finished"
    );
    Ok(ScenarioOutcome {
        name: scenario.name.clone(),
        reports,
        failures,
        final_world: scheduler.world().snapshot(),
    })
}

fn apply_action(scheduler: &mut TickScheduler<StubWorld>, action: &Action) {
    tracing::debug!(?action, "Applying action");
    let world = scheduler.world_mut();
    match action {
        Action::Place { pos, block, data } => {
            world.place_block(*pos, BlockState::new(block.clone(), *data));
        }
        Action::Remove { pos } => world.remove_block(*pos),
        Action::UnloadChunk { pos } => world.unload_chunk(pos.dimension, pos.chunk()),
        Action::LoadChunk { pos } => world.load_chunk(pos.dimension, pos.chunk()),
        Action::AttachContainer { pos, size } => world.attach_container(*pos, *size),
        Action::Reject { pos } => world.reject_at(*pos),
        Action::ClearRejections => world.clear_rejections(),
        Action::Reset => {
            *world = StubWorld::empty_world();
            scheduler.reset();
        }
    }
}

fn evaluate_check(
    check: &Check,
    report: &TickReport,
    scheduler: &TickScheduler<StubWorld>,
) -> Result<(), String> {
    match check {
        Check::Processed { sites } => expect_eq("processed sites", sites, &report.processed),
        Check::Blocked { sites } => expect_eq("blocked sites", sites, &report.blocked),
        Check::Effects { count } => expect_eq("applied effects", count, &report.effects_count()),
        Check::Errored { count } => expect_eq("errored sites", count, &report.errored_count()),
        Check::ActiveSites { count } => expect_eq("active sites", count, &report.active_sites),
        Check::Block { pos, block, data } => {
            let found = scheduler.world().block_state_at(*pos);
            expect_eq(
                &format!("block at {pos}"),
                block,
                &found.as_ref().map(|state| state.block.clone()),
            )?;
            match (data, found) {
                (Some(data), Some(state)) => {
                    expect_eq(&format!("block data at {pos}"), data, &state.data)
                }
                _ => Ok(()),
            }
        }
        Check::ContainerCount { pos, item, count } => {
            let container = scheduler
                .world()
                .container(*pos)
                .ok_or_else(|| format!("no container at {pos}"))?;
            expect_eq(&format!("{item} at {pos}"), count, &container.count_of(item))
        }
    }
}

fn expect_eq<T: PartialEq + Debug>(
    what: &str,
    expected: &T,
    found: &T,
) -> Result<(), String> {
    if expected == found {
        Ok(())
    } else {
        Err(format!("{what}: expected {expected:?}, found {found:?}"))
    }
}
