//! Ready-made behaviors for scenario files and benchmarks.
//!
//! These are examples of what a behavior can do, not balanced game content.

use quartz_core::{
    BehaviorDefinition, Prerequisite, RegistryError,
    behavior::YieldOutcome,
    inventory::ItemStack,
    world::{Effect, MutationSpec},
};
use quartz_utils::{BlockOffset, Identifier};
use serde::{Deserialize, Serialize};

fn one() -> u32 {
    1
}

fn below() -> BlockOffset {
    BlockOffset::DOWN
}

fn above() -> BlockOffset {
    BlockOffset::UP
}

/// A behavior described in a scenario file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "preset", rename_all = "snake_case", deny_unknown_fields)]
pub enum BehaviorPreset {
    /// Produces `count` of `item` into a container each completed cycle.
    Generator {
        /// Ticks between cycles.
        interval: u32,
        /// Cycles per completion.
        #[serde(default = "one")]
        max_progress: u32,
        /// Progress kept after a completion.
        #[serde(default)]
        reset_progress: u32,
        /// Where the output container is.
        #[serde(default = "below")]
        output: BlockOffset,
        /// What is produced.
        item: Identifier,
        /// How many per completion.
        #[serde(default = "one")]
        count: u32,
        /// A block that must sit directly above the generator.
        #[serde(default)]
        power: Option<Identifier>,
    },
    /// Mines a resource node one unit per completion and clears it when exhausted.
    ///
    /// The node's block data is the number of units left.
    Quarry {
        /// Ticks between cycles.
        interval: u32,
        /// Cycles per completion.
        #[serde(default = "one")]
        max_progress: u32,
        /// The node block type.
        node: Identifier,
        /// Where the node is.
        #[serde(default = "below")]
        node_offset: BlockOffset,
        /// Where the output container is.
        #[serde(default = "above")]
        output: BlockOffset,
        /// What is produced.
        item: Identifier,
        /// How many per completion.
        #[serde(default = "one")]
        count: u32,
    },
}

impl BehaviorPreset {
    /// Builds the behavior definition.
    pub fn definition(&self) -> Result<BehaviorDefinition, RegistryError> {
        match self.clone() {
            Self::Generator {
                interval,
                max_progress,
                reset_progress,
                output,
                item,
                count,
                power,
            } => {
                let mut prerequisite = vec![Prerequisite::ContainerSpace { offset: output }];
                if let Some(block) = power {
                    prerequisite.push(Prerequisite::BlockAt {
                        offset: BlockOffset::UP,
                        block,
                    });
                }
                BehaviorDefinition::builder(interval, max_progress)
                    .reset_progress(reset_progress)
                    .prerequisite(Prerequisite::All(prerequisite))
                    .yields(move |ctx| {
                        YieldOutcome::with_outputs(
                            ctx.progress.saturating_add(1),
                            [Effect::Deliver {
                                pos: ctx.pos.offset(output),
                                stack: ItemStack::new(item.clone(), count),
                            }],
                        )
                    })
                    .build()
            }
            Self::Quarry {
                interval,
                max_progress,
                node,
                node_offset,
                output,
                item,
                count,
            } => BehaviorDefinition::builder(interval, max_progress)
                .prerequisite(Prerequisite::All(vec![
                    Prerequisite::BlockAt {
                        offset: node_offset,
                        block: node,
                    },
                    Prerequisite::ContainerSpace { offset: output },
                ]))
                .observe(node_offset)
                .yields(move |ctx| {
                    let remaining = ctx
                        .readout
                        .block(node_offset)
                        .map_or(0, |state| state.data);
                    let mutation = if remaining <= 1 {
                        MutationSpec::Clear
                    } else {
                        MutationSpec::SetData(remaining - 1)
                    };
                    YieldOutcome::with_outputs(
                        ctx.progress.saturating_add(1),
                        [
                            Effect::Mutate {
                                pos: ctx.pos.offset(node_offset),
                                mutation,
                            },
                            Effect::Deliver {
                                pos: ctx.pos.offset(output),
                                stack: ItemStack::new(item.clone(), count),
                            },
                        ],
                    )
                })
                .build(),
        }
    }
}
