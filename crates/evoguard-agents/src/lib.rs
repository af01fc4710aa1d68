//! Agents for the EvoGuard simulation: state, behavior, fitness, and
//! survivor selection.
//!
//! # Modules
//!
//! - [`action`] -- Actions an agent can attempt and their energy costs
//! - [`agent`] -- Agent identity with atomic state replacement ([`Agent`])
//! - [`error`] -- Selection errors ([`SelectionError`])
//! - [`fitness`] -- Linear fitness scoring ([`FitnessWeights`])
//! - [`genome`] -- Heritable traits and mutation ([`Genome`])
//! - [`policy`] -- Per-tick decision making ([`ActionPolicy`], [`GenomePolicy`])
//! - [`selection`] -- The four survivor selection strategies
//! - [`state`] -- Immutable per-agent state ([`AgentState`])

pub mod action;
pub mod agent;
pub mod error;
pub mod fitness;
pub mod genome;
pub mod policy;
pub mod selection;
pub mod state;

pub use action::AgentAction;
pub use agent::Agent;
pub use error::SelectionError;
pub use fitness::FitnessWeights;
pub use genome::Genome;
pub use policy::{ActionPolicy, GenomePolicy};
pub use selection::{Candidate, ScoredAgent, SelectionSettings, select};
pub use state::AgentState;
