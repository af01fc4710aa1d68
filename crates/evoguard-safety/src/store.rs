//! Violation persistence boundary.

use dashmap::DashMap;

use evoguard_types::{AgentId, ViolationRecord};

/// Errors a violation store can report.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backing store could not be reached or refused the write.
    #[error("violation store unavailable: {reason}")]
    Unavailable {
        /// What went wrong.
        reason: String,
    },
}

/// Durable record of every violation, queryable per agent.
pub trait ViolationStore: Send + Sync {
    /// Persist one violation.
    fn save(&self, record: &ViolationRecord) -> Result<(), StoreError>;

    /// All violations recorded against `agent`, oldest first.
    fn find_by_agent(&self, agent: AgentId) -> Result<Vec<ViolationRecord>, StoreError>;
}

/// In-memory store backed by a [`DashMap`].
#[derive(Debug, Default)]
pub struct InMemoryViolationStore {
    records: DashMap<AgentId, Vec<ViolationRecord>>,
}

impl InMemoryViolationStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total records held across all agents.
    pub fn len(&self) -> usize {
        self.records.iter().map(|entry| entry.value().len()).sum()
    }

    /// Whether the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ViolationStore for InMemoryViolationStore {
    fn save(&self, record: &ViolationRecord) -> Result<(), StoreError> {
        self.records
            .entry(record.agent_id)
            .or_default()
            .push(record.clone());
        Ok(())
    }

    fn find_by_agent(&self, agent: AgentId) -> Result<Vec<ViolationRecord>, StoreError> {
        Ok(self
            .records
            .get(&agent)
            .map(|entry| entry.value().clone())
            .unwrap_or_default())
    }
}
