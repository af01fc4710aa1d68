//! Safety governance for the EvoGuard simulation.
//!
//! Every action an agent attempts is checked against a set of
//! [`SafetyConstraint`]s. Violations are aggregated by the
//! [`SafetyMonitor`], persisted to a [`ViolationStore`] and published as
//! events. Agents that keep breaking rules are flagged as elimination
//! candidates and excluded from selection.
//!
//! # Modules
//!
//! - [`constraint`] -- The constraint trait, built-in rules and [`SafetySettings`]
//! - [`monitor`] -- Concurrent violation aggregate and elimination flags
//! - [`store`] -- Violation persistence boundary

pub mod constraint;
pub mod monitor;
pub mod store;

pub use constraint::{
    BoundaryConstraint, EnergyConstraint, HoardingConstraint, ObstacleConstraint,
    SafetyConstraint, SafetySettings, check_all,
};
pub use monitor::{CriticalViolationHandler, EliminationPolicy, SafetyMonitor};
pub use store::{InMemoryViolationStore, StoreError, ViolationStore};
