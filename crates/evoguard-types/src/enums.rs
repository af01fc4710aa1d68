//! Enumeration types for the EvoGuard simulation.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Severity
// ---------------------------------------------------------------------------

/// How serious a safety violation is.
///
/// Variants are declared in ascending order so the derived [`Ord`] gives the
/// total order `Info < Warning < Critical`. A [`Severity::Critical`] violation
/// raises a rollback demand for the current tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational: recorded for audit, no consequence.
    Info,
    /// Suspicious behavior that counts toward elimination.
    Warning,
    /// Unsafe behavior; the effects of the current tick are undone.
    Critical,
}

impl Severity {
    /// All severities in ascending order.
    pub const ALL: [Self; 3] = [Self::Info, Self::Warning, Self::Critical];

    /// Dense index of this severity, matching its position in [`Severity::ALL`].
    pub const fn index(self) -> usize {
        match self {
            Self::Info => 0,
            Self::Warning => 1,
            Self::Critical => 2,
        }
    }
}

impl core::fmt::Display for Severity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let label = match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Critical => "CRITICAL",
        };
        f.write_str(label)
    }
}

// ---------------------------------------------------------------------------
// Transaction status
// ---------------------------------------------------------------------------

/// Lifecycle state of a ledger transaction.
///
/// Transitions are monotonic: `Pending -> Committed` or
/// `Pending -> RolledBack`. Both terminal states are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    /// Open: operations and compensations may still be appended.
    Pending,
    /// All effects were kept.
    Committed,
    /// All registered compensations were attempted.
    RolledBack,
}

impl TransactionStatus {
    /// Whether no further transition is possible from this status.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Committed | Self::RolledBack)
    }
}

// ---------------------------------------------------------------------------
// Constraint type
// ---------------------------------------------------------------------------

/// The safety rule a violation was raised against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintType {
    /// Movement outside the world bounds.
    Boundary,
    /// Movement into an obstacle cell.
    Obstacle,
    /// An action that would drain energy below the configured reserve.
    EnergyReserve,
    /// Holding more resources than the configured cap.
    ResourceHoarding,
}

// ---------------------------------------------------------------------------
// Selection strategy
// ---------------------------------------------------------------------------

/// How survivors are chosen at a generation boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionStrategy {
    /// Repeated small contests; the fittest contestant of each wins a slot.
    Tournament,
    /// Fitness-proportional sampling.
    Roulette,
    /// Deterministic top-k by fitness.
    Elitism,
    /// Top-k by fitness penalized by recorded safety violations.
    #[default]
    SafetyAware,
}

// ---------------------------------------------------------------------------
// Behavior signal type
// ---------------------------------------------------------------------------

/// Category of a behavior detector signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalType {
    /// Agents gathered closely together.
    Clustering,
    /// Shrinking shared resources or safety friction.
    Competition,
    /// Several agents earning high rewards at once.
    Cooperation,
    /// At least one node reported as failed.
    NodeFailure,
    /// Average latency above the ceiling.
    HighLatency,
    /// Fitness spread within a generation is abnormally wide.
    FitnessDivergence,
    /// No system anomaly was found.
    SystemHealthy,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_is_totally_ordered() {
        assert!(Severity::Info < Severity::Warning);
        assert!(Severity::Warning < Severity::Critical);
        for (i, severity) in Severity::ALL.iter().enumerate() {
            assert_eq!(severity.index(), i);
        }
    }

    #[test]
    fn only_committed_and_rolled_back_are_terminal() {
        assert!(!TransactionStatus::Pending.is_terminal());
        assert!(TransactionStatus::Committed.is_terminal());
        assert!(TransactionStatus::RolledBack.is_terminal());
    }

    #[test]
    fn strategy_deserializes_from_snake_case() {
        let parsed: Result<SelectionStrategy, _> = serde_json::from_str("\"safety_aware\"");
        assert!(matches!(parsed, Ok(SelectionStrategy::SafetyAware)));
    }
}
