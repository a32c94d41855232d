//! Immutable behavior configuration for one block type.

use std::{fmt, num::NonZeroU32, sync::Arc};

use quartz_utils::{BlockOffset, Position};
use smallvec::SmallVec;

use crate::world::{BlockState, BlockTypeId, Effect, WorldAccess};

use super::{Prerequisite, registry::RegistryError};

/// Computes a cycle's progress and outputs. Must be pure.
pub type YieldFn = Arc<dyn Fn(&YieldContext<'_>) -> YieldOutcome + Send + Sync>;

/// Block states around a site, captured before its yield runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Readout {
    entries: SmallVec<[(BlockOffset, Option<BlockState>); 4]>,
}

impl Readout {
    /// Reads every offset in `offsets` relative to `site`.
    pub fn capture(
        world: &dyn WorldAccess,
        site: Position,
        offsets: &[BlockOffset],
    ) -> Self {
        Self {
            entries: offsets
                .iter()
                .map(|offset| (*offset, world.block_state_at(site.offset(*offset))))
                .collect(),
        }
    }

    /// The observed state at `offset`, `None` if it was air or not observed.
    #[must_use]
    pub fn block(&self, offset: BlockOffset) -> Option<&BlockState> {
        self.entries
            .iter()
            .find(|(observed, _)| *observed == offset)
            .and_then(|(_, state)| state.as_ref())
    }
}

/// Everything a yield function may look at.
#[derive(Debug)]
pub struct YieldContext<'a> {
    /// The site's position.
    pub pos: Position,
    /// The site's block type.
    pub block: &'a BlockTypeId,
    /// Progress before this cycle.
    pub progress: u32,
    /// Progress at which the cycle completes.
    pub max_progress: u32,
    /// The tick being processed.
    pub tick: u64,
    /// Observed neighbour states.
    pub readout: &'a Readout,
}

/// What a yield function returns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct YieldOutcome {
    /// New progress, clamped to the maximum by the state machine.
    pub progress: u32,
    /// Effects emitted if the cycle completes.
    pub outputs: SmallVec<[Effect; 4]>,
}

impl YieldOutcome {
    /// Progress only.
    #[must_use]
    pub fn progress(progress: u32) -> Self {
        Self {
            progress,
            outputs: SmallVec::new(),
        }
    }

    /// Progress plus outputs for the completing cycle.
    #[must_use]
    pub fn with_outputs(progress: u32, outputs: impl IntoIterator<Item = Effect>) -> Self {
        Self {
            progress,
            outputs: outputs.into_iter().collect(),
        }
    }
}

/// Configuration for one automated block type.
#[derive(Clone)]
pub struct BehaviorDefinition {
    interval: NonZeroU32,
    max_progress: u32,
    reset_progress: u32,
    prerequisite: Prerequisite,
    observe: Vec<BlockOffset>,
    yield_fn: YieldFn,
}

impl BehaviorDefinition {
    /// Starts a builder for a behavior processing every `interval` ticks that
    /// completes at `max_progress`.
    #[must_use]
    pub fn builder(interval: u32, max_progress: u32) -> BehaviorBuilder {
        BehaviorBuilder {
            interval,
            max_progress,
            reset_progress: 0,
            prerequisite: Prerequisite::Always,
            observe: Vec::new(),
            yield_fn: Arc::new(|ctx: &YieldContext<'_>| {
                YieldOutcome::progress(ctx.progress.saturating_add(1))
            }),
        }
    }

    /// Minimum ticks between two processing cycles.
    #[must_use]
    pub fn interval(&self) -> NonZeroU32 {
        self.interval
    }

    /// Progress at which outputs are emitted.
    #[must_use]
    pub fn max_progress(&self) -> u32 {
        self.max_progress
    }

    /// Progress after a completed cycle.
    #[must_use]
    pub fn reset_progress(&self) -> u32 {
        self.reset_progress
    }

    /// The processing condition.
    #[must_use]
    pub fn prerequisite(&self) -> &Prerequisite {
        &self.prerequisite
    }

    /// Offsets captured into the [`Readout`].
    #[must_use]
    pub fn observe(&self) -> &[BlockOffset] {
        &self.observe
    }

    /// Runs the yield function.
    #[must_use]
    pub fn compute_yield(&self, ctx: &YieldContext<'_>) -> YieldOutcome {
        (self.yield_fn)(ctx)
    }
}

impl fmt::Debug for BehaviorDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BehaviorDefinition")
            .field("interval", &self.interval)
            .field("max_progress", &self.max_progress)
            .field("reset_progress", &self.reset_progress)
            .field("prerequisite", &self.prerequisite)
            .field("observe", &self.observe)
            .finish_non_exhaustive()
    }
}

/// Builder for [`BehaviorDefinition`].
pub struct BehaviorBuilder {
    interval: u32,
    max_progress: u32,
    reset_progress: u32,
    prerequisite: Prerequisite,
    observe: Vec<BlockOffset>,
    yield_fn: YieldFn,
}

impl BehaviorBuilder {
    /// Progress after a completed cycle. Defaults to 0.
    #[must_use]
    pub fn reset_progress(mut self, reset_progress: u32) -> Self {
        self.reset_progress = reset_progress;
        self
    }

    /// Processing condition. Defaults to [`Prerequisite::Always`].
    #[must_use]
    pub fn prerequisite(mut self, prerequisite: Prerequisite) -> Self {
        self.prerequisite = prerequisite;
        self
    }

    /// Adds an offset to the readout.
    #[must_use]
    pub fn observe(mut self, offset: BlockOffset) -> Self {
        self.observe.push(offset);
        self
    }

    /// Sets the yield function. Defaults to one progress per cycle with no outputs.
    #[must_use]
    pub fn yields<F>(mut self, yield_fn: F) -> Self
    where
        F: Fn(&YieldContext<'_>) -> YieldOutcome + Send + Sync + 'static,
    {
        self.yield_fn = Arc::new(yield_fn);
        self
    }

    /// Validates and builds the definition.
    pub fn build(self) -> Result<BehaviorDefinition, RegistryError> {
        let interval = NonZeroU32::new(self.interval)
            .ok_or(RegistryError::InvalidDefinition("interval must be at least 1"))?;
        if self.max_progress == 0 {
            return Err(RegistryError::InvalidDefinition(
                "max_progress must be at least 1",
            ));
        }
        if self.reset_progress >= self.max_progress {
            return Err(RegistryError::InvalidDefinition(
                "reset_progress must be below max_progress",
            ));
        }
        Ok(BehaviorDefinition {
            interval,
            max_progress: self.max_progress,
            reset_progress: self.reset_progress,
            prerequisite: self.prerequisite,
            observe: self.observe,
            yield_fn: self.yield_fn,
        })
    }
}
