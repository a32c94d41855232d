//! The tick scheduler and what it reports.
//!
//! # Architecture
//!
//! - [`TickScheduler`] - Owns the site index and drives one tick at a time
//! - [`TickReport`] - Deterministic record of a tick's outcome
//! - [`SchedulerMetrics`] - Cumulative counters and timings

pub mod metrics;
mod report;
mod scheduler;

pub use metrics::SchedulerMetrics;
pub use report::{AppliedEffect, SiteFailure, TickReport};
pub use scheduler::{SchedulerError, TickScheduler};
