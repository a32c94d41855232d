//! Automation behaviors and the registry that maps block types to them.
//!
//! A [`BehaviorDefinition`] is immutable configuration: how often a block
//! processes, how much progress a cycle needs, when it may run and what it
//! yields. Behaviors are registered per block type in an
//! [`AutomationRegistry`] shared between the host and the scheduler.

pub mod definition;
pub mod prerequisite;
pub mod registry;

pub use definition::{
    BehaviorBuilder, BehaviorDefinition, Readout, YieldContext, YieldFn, YieldOutcome,
};
pub use prerequisite::{CustomCheck, Prerequisite};
pub use registry::{AutomationRegistry, RegistryError, TickGuard};
