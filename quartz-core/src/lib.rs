//! # Quartz Core
//!
//! A deterministic tick scheduler for block automation. Blocks of a registered
//! type become automation sites; every tick the scheduler advances each site's
//! state machine in position order and applies the resulting world changes
//! through the [`world::WorldAccess`] capability.
//!
//! The same engine runs against the game world (through a host adapter) and
//! against [`world::StubWorld`] in headless runs and tests.

pub mod behavior;
pub mod config;
pub mod inventory;
pub mod site;
pub mod ticks;
pub mod world;

pub use behavior::{AutomationRegistry, BehaviorDefinition, Prerequisite, RegistryError};
pub use config::{ConfigError, EngineConfig};
pub use ticks::{SchedulerError, TickReport, TickScheduler};
pub use world::{StubWorld, WorldAccess, WorldError};
