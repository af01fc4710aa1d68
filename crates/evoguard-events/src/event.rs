//! Event payloads.

use serde::{Deserialize, Serialize};

use evoguard_types::{TransactionId, ViolationRecord};

/// Topic carrying [`SimulationEvent::ViolationRecorded`].
pub const TOPIC_VIOLATIONS: &str = "evoguard.violations";

/// Topic carrying transaction outcomes.
pub const TOPIC_TRANSACTIONS: &str = "evoguard.transactions";

/// Topic carrying [`SimulationEvent::GenerationCompleted`].
pub const TOPIC_GENERATIONS: &str = "evoguard.generations";

/// Aggregate figures for one finished generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationSummary {
    /// The generation that just ended.
    pub generation: u64,
    /// Agents alive when the generation ended.
    pub population: usize,
    /// Agents excluded from selection as elimination candidates.
    pub eliminated: usize,
    /// Survivors chosen to seed the next generation.
    pub survivors: usize,
    /// Highest fitness among eligible agents.
    pub best_fitness: f64,
    /// Mean fitness among eligible agents.
    pub mean_fitness: f64,
    /// Violations recorded during the generation.
    pub violations: u64,
}

/// Everything the simulation announces to the outside world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SimulationEvent {
    /// A safety violation was recorded against an agent.
    ViolationRecorded {
        /// The recorded violation.
        violation: ViolationRecord,
    },
    /// A transaction committed; its compensations were discarded.
    TransactionCommitted {
        /// The committed transaction.
        transaction_id: TransactionId,
        /// Logical name of the transaction.
        name: String,
        /// Operations recorded before commit.
        operations: usize,
    },
    /// A transaction was rolled back.
    TransactionRolledBack {
        /// The rolled-back transaction.
        transaction_id: TransactionId,
        /// Logical name of the transaction.
        name: String,
        /// Compensations attempted during the unwind.
        compensations_run: usize,
        /// Compensations that returned an error or panicked.
        compensation_failures: usize,
    },
    /// A generation finished and the next one was bred.
    GenerationCompleted {
        /// Aggregate figures for the finished generation.
        summary: GenerationSummary,
    },
}

impl SimulationEvent {
    /// The topic this event is published on.
    pub const fn topic(&self) -> &'static str {
        match self {
            Self::ViolationRecorded { .. } => TOPIC_VIOLATIONS,
            Self::TransactionCommitted { .. } | Self::TransactionRolledBack { .. } => {
                TOPIC_TRANSACTIONS
            }
            Self::GenerationCompleted { .. } => TOPIC_GENERATIONS,
        }
    }

    /// Short machine-readable name, used as a log field.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::ViolationRecorded { .. } => "violation_recorded",
            Self::TransactionCommitted { .. } => "transaction_committed",
            Self::TransactionRolledBack { .. } => "transaction_rolled_back",
            Self::GenerationCompleted { .. } => "generation_completed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transaction_events_share_a_topic() {
        let id = TransactionId::new();
        let committed = SimulationEvent::TransactionCommitted {
            transaction_id: id,
            name: "tick".to_owned(),
            operations: 3,
        };
        let rolled_back = SimulationEvent::TransactionRolledBack {
            transaction_id: id,
            name: "tick".to_owned(),
            compensations_run: 3,
            compensation_failures: 0,
        };
        assert_eq!(committed.topic(), TOPIC_TRANSACTIONS);
        assert_eq!(rolled_back.topic(), TOPIC_TRANSACTIONS);
        assert_ne!(committed.kind(), rolled_back.kind());
    }

    #[test]
    fn serializes_with_type_tag() {
        let event = SimulationEvent::TransactionCommitted {
            transaction_id: TransactionId::new(),
            name: "transfer".to_owned(),
            operations: 2,
        };
        let json = serde_json::to_value(&event).ok();
        let tag = json
            .as_ref()
            .and_then(|v| v.get("type"))
            .and_then(serde_json::Value::as_str);
        assert_eq!(tag, Some("transaction_committed"));
    }
}
