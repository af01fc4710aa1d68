//! Shared type definitions for the EvoGuard simulation.
//!
//! This crate is the single source of truth for the identifiers, enums and
//! value records that flow between the world, safety, ledger and observer
//! crates.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for all entity identifiers
//! - [`enums`] -- Severity, transaction status, constraint and strategy enums
//! - [`structs`] -- Positions, violation records and ledger transactions

pub mod enums;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{ConstraintType, SelectionStrategy, Severity, SignalType, TransactionStatus};
pub use ids::{AgentId, TransactionId, ViolationId};
pub use structs::{Position, Transaction, ViolationRecord};
