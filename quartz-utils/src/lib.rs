//! # Quartz Utils
//!
//! Value types shared across the Quartz automation engine.

pub mod random;
pub mod types;

pub use types::{BlockOffset, BlockPos, ChunkPos, DimensionId, Identifier, Position};
