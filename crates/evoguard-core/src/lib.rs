//! Configuration, tick transactions, and generation turnover for the EvoGuard
//! simulation.
//!
//! This crate owns the transactional tick cycle: agents act, their actions
//! are checked against safety constraints, and a critical violation rolls the
//! whole tick back through the saga coordinator.
//!
//! # Modules
//!
//! - [`config`] -- Configuration loading from `evoguard-config.yaml` into
//!   strongly-typed structs, resolved into the core's value objects.
//! - [`generation`] -- Scoring, selection and breeding at generation
//!   boundaries.
//! - [`governor`] -- [`RollbackGovernor`], which turns critical violations
//!   into a one-shot rollback demand.
//! - [`metrics`] -- Bounded per-tick metric window for the behavior
//!   detectors.
//! - [`runner`] -- The async run loop with limits and a [`TickCallback`]
//!   hook.
//! - [`tick`] -- [`SimulationState`] and the tick cycle.

pub mod config;
pub mod generation;
pub mod governor;
pub mod metrics;
pub mod runner;
pub mod tick;

pub use config::{ConfigError, ResolvedSettings, SimulationConfig};
pub use generation::{EvolutionSettings, GenerationOutcome, advance_generation};
pub use governor::{RollbackDemand, RollbackGovernor};
pub use metrics::MetricsCollector;
pub use runner::{
    NoOpCallback, RunLimits, RunnerError, SimulationEndReason, SimulationResult, TickCallback,
    log_simulation_end, run_simulation,
};
pub use tick::{SimulationState, TickError, TickSummary, run_tick};
