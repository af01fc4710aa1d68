//! Agent identity and atomic state replacement.
//!
//! An [`Agent`] owns exactly one current [`AgentState`] at all times. The
//! state lives behind an `Arc` inside a lock that is held only long enough
//! to clone or swap the pointer, so concurrent readers always observe a
//! complete old or new snapshot, never a partial one.

use std::sync::Arc;

use parking_lot::RwLock;

use evoguard_types::{AgentId, Position};

use crate::genome::Genome;
use crate::state::AgentState;

/// A simulated agent.
#[derive(Debug)]
pub struct Agent {
    id: AgentId,
    generation: u64,
    parent: Option<AgentId>,
    genome: Genome,
    state: RwLock<Arc<AgentState>>,
}

impl Agent {
    /// Spawn a seed agent (no parent) at `position`.
    pub fn spawn(genome: Genome, position: Position, generation: u64) -> Self {
        Self {
            id: AgentId::new(),
            generation,
            parent: None,
            genome,
            state: RwLock::new(Arc::new(AgentState::spawn(position))),
        }
    }

    /// Spawn the offspring of `parent` with the given (already mutated)
    /// genome. The child starts with fresh spawn state at `position`.
    pub fn offspring(parent: &Self, genome: Genome, position: Position, generation: u64) -> Self {
        Self {
            parent: Some(parent.id),
            ..Self::spawn(genome, position, generation)
        }
    }

    /// The agent's identity.
    pub const fn id(&self) -> AgentId {
        self.id
    }

    /// The generation this agent was born into.
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// The parent this agent was bred from, if any.
    pub const fn parent(&self) -> Option<AgentId> {
        self.parent
    }

    /// The agent's heritable traits.
    pub const fn genome(&self) -> &Genome {
        &self.genome
    }

    /// The current state snapshot.
    pub fn state(&self) -> Arc<AgentState> {
        Arc::clone(&self.state.read())
    }

    /// Swap in a new state, returning the one it replaced.
    pub fn replace_state(&self, next: AgentState) -> Arc<AgentState> {
        self.restore_state(Arc::new(next))
    }

    /// Swap in a previously observed snapshot, returning the one it replaced.
    ///
    /// Used by compensations to put back the exact snapshot that preceded an
    /// action.
    pub fn restore_state(&self, snapshot: Arc<AgentState>) -> Arc<AgentState> {
        let mut guard = self.state.write();
        core::mem::replace(&mut *guard, snapshot)
    }
}
