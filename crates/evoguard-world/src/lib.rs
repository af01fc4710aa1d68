//! Resources, obstacles, and environmental factors for the EvoGuard simulation.
//!
//! # Modules
//!
//! - [`environment`] -- The tick-stepped [`Environment`], its published
//!   [`EnvironmentSnapshot`]s, factor ranges and world physics.
//! - [`resource`] -- Regeneration and harvesting logic for resource nodes.

pub mod environment;
pub mod resource;

// Re-export primary types at crate root.
pub use environment::{
    Environment, EnvironmentSnapshot, FactorRange, SnapshotReader, WorldPhysics,
};
pub use resource::Resource;
