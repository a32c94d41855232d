//! # Quartz Headless
//!
//! Runs the automation engine without a game: scenario files drive a
//! [`StubWorld`](quartz_core::StubWorld) tick by tick and check the outcome,
//! and the bench driver measures throughput on a seeded random layout.

pub mod bench;
pub mod logging;
pub mod presets;
pub mod runner;
pub mod scenario;

pub use bench::{BenchOptions, BenchSummary, run_bench};
pub use presets::BehaviorPreset;
pub use runner::{CheckFailure, ScenarioOutcome, run_scenario};
pub use scenario::{Action, Check, Scenario, ScenarioError};
