//! Scenario files: a world setup, a timeline of host edits and per-tick checks.

use std::{collections::BTreeMap, fs, io, path::Path};

use quartz_core::{RegistryError, SchedulerError};
use quartz_utils::{Identifier, Position};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::presets::BehaviorPreset;

/// Failure to load or prepare a scenario.
#[derive(Debug, Error)]
pub enum ScenarioError {
    /// The file could not be read.
    #[error("failed to read scenario: {0}")]
    Io(#[from] io::Error),
    /// The file is not a valid scenario.
    #[error("failed to parse scenario: {0}")]
    Parse(#[from] serde_json::Error),
    /// The scenario is well formed but inconsistent.
    #[error("invalid scenario: {0}")]
    Invalid(String),
    /// A behavior could not be registered.
    #[error("behavior for {block} rejected: {source}")]
    Registry {
        /// The block type.
        block: Identifier,
        /// Why.
        source: RegistryError,
    },
    /// The scheduler refused a tick.
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}

/// A host edit applied to the stub world.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case", deny_unknown_fields)]
pub enum Action {
    /// Places a block.
    Place {
        /// Where.
        pos: Position,
        /// The block type.
        block: Identifier,
        /// Block data, e.g. the units left in a resource node.
        #[serde(default)]
        data: u32,
    },
    /// Removes a block and any container at its position.
    Remove {
        /// Where.
        pos: Position,
    },
    /// Stops simulating the chunk containing `pos`.
    UnloadChunk {
        /// Any position in the chunk.
        pos: Position,
    },
    /// Resumes simulating the chunk containing `pos`.
    LoadChunk {
        /// Any position in the chunk.
        pos: Position,
    },
    /// Puts an empty container at `pos`.
    AttachContainer {
        /// Where.
        pos: Position,
        /// Slot count.
        size: usize,
    },
    /// Makes every write at `pos` fail.
    Reject {
        /// Where.
        pos: Position,
    },
    /// Removes all injected write failures.
    ClearRejections,
    /// Drops all scheduler state and starts from an empty world.
    Reset,
}

/// An expectation about the tick just run or the world after it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "check", rename_all = "snake_case", deny_unknown_fields)]
pub enum Check {
    /// Exactly these sites were processed, in this order.
    Processed {
        /// Expected positions.
        sites: Vec<Position>,
    },
    /// Exactly these sites were blocked.
    Blocked {
        /// Expected positions.
        sites: Vec<Position>,
    },
    /// This many effects were applied.
    Effects {
        /// Expected count.
        count: usize,
    },
    /// This many sites were rolled back.
    Errored {
        /// Expected count.
        count: usize,
    },
    /// The block at `pos`, or air when `block` is absent.
    Block {
        /// Where.
        pos: Position,
        /// Expected type.
        #[serde(default)]
        block: Option<Identifier>,
        /// Expected data, if given.
        #[serde(default)]
        data: Option<u32>,
    },
    /// The container at `pos` holds `count` of `item` in total.
    ContainerCount {
        /// Where.
        pos: Position,
        /// The item.
        item: Identifier,
        /// Expected total.
        count: u32,
    },
    /// This many sites are tracked.
    ActiveSites {
        /// Expected count.
        count: usize,
    },
}

/// A complete headless run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    /// Display name.
    pub name: String,
    /// Ticks to run, numbered from 1.
    pub ticks: u64,
    /// Behaviors to register before the first tick.
    #[serde(default)]
    pub behaviors: BTreeMap<Identifier, BehaviorPreset>,
    /// Actions applied before the first tick.
    #[serde(default)]
    pub setup: Vec<Action>,
    /// Actions applied right before the given tick.
    #[serde(default)]
    pub timeline: BTreeMap<u64, Vec<Action>>,
    /// Checks run right after the given tick.
    #[serde(default)]
    pub assertions: BTreeMap<u64, Vec<Check>>,
}

impl Scenario {
    /// Reads and validates a scenario file.
    pub fn load(path: &Path) -> Result<Self, ScenarioError> {
        let source = fs::read_to_string(path)?;
        Self::from_json(&source)
    }

    /// Parses and validates a scenario.
    pub fn from_json(source: &str) -> Result<Self, ScenarioError> {
        let scenario: Self = serde_json::from_str(source)?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Checks that every timeline and assertion tick falls inside the run.
    pub fn validate(&self) -> Result<(), ScenarioError> {
        if self.ticks == 0 {
            return Err(ScenarioError::Invalid(format!(
                "{}: must run at least one tick",
                self.name
            )));
        }
        let out_of_range = self
            .timeline
            .keys()
            .chain(self.assertions.keys())
            .find(|tick| **tick == 0 || **tick > self.ticks);
        if let Some(tick) = out_of_range {
            return Err(ScenarioError::Invalid(format!(
                "{}: tick {tick} is outside 1..={}",
                self.name, self.ticks
            )));
        }
        Ok(())
    }
}
