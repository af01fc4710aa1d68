//! Core entity structs for the EvoGuard simulation.
//!
//! These are plain value types. Persistence and transport adapters
//! serialize them through `serde`; nothing here knows about storage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::{ConstraintType, Severity, TransactionStatus};
use crate::ids::{AgentId, TransactionId, ViolationId};

// ---------------------------------------------------------------------------
// Position
// ---------------------------------------------------------------------------

/// A cell in the 3D world grid.
///
/// Integer coordinates make positions usable as map keys for resources and
/// obstacles; distances are still Euclidean.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Position {
    /// X coordinate.
    pub x: i32,
    /// Y coordinate.
    pub y: i32,
    /// Z coordinate.
    pub z: i32,
}

impl Position {
    /// The world origin.
    pub const ORIGIN: Self = Self::new(0, 0, 0);

    /// Create a position from its coordinates.
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Return this position shifted by the given deltas (saturating).
    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self {
            x: self.x.saturating_add(dx),
            y: self.y.saturating_add(dy),
            z: self.z.saturating_add(dz),
        }
    }

    /// Euclidean distance to another position.
    pub fn distance(self, other: Self) -> f64 {
        let dx = f64::from(self.x) - f64::from(other.x);
        let dy = f64::from(self.y) - f64::from(other.y);
        let dz = f64::from(self.z) - f64::from(other.z);
        dz.mul_add(dz, dx.mul_add(dx, dy * dy)).sqrt()
    }
}

impl core::fmt::Display for Position {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

// ---------------------------------------------------------------------------
// Violation record
// ---------------------------------------------------------------------------

/// A failed safety check, as recorded by the safety monitor.
///
/// Never mutated after creation; retained for audit and reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationRecord {
    /// Unique id of this record.
    pub id: ViolationId,
    /// The offending agent.
    pub agent_id: AgentId,
    /// The rule that was broken.
    pub constraint: ConstraintType,
    /// How serious the violation is.
    pub severity: Severity,
    /// Description of the action the agent attempted.
    pub attempted_action: String,
    /// Human-readable explanation.
    pub message: String,
    /// Generation in which the violation happened.
    pub generation: u64,
    /// Tick in which the violation happened.
    pub tick: u64,
    /// Wall-clock creation time.
    pub recorded_at: DateTime<Utc>,
}

impl ViolationRecord {
    /// Create a new violation record stamped with the current time.
    pub fn new(
        agent_id: AgentId,
        constraint: ConstraintType,
        severity: Severity,
        attempted_action: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: ViolationId::new(),
            agent_id,
            constraint,
            severity,
            attempted_action: attempted_action.into(),
            message: message.into(),
            generation: 0,
            tick: 0,
            recorded_at: Utc::now(),
        }
    }

    /// Stamp the generation and tick the violation happened in.
    #[must_use]
    pub fn at(mut self, generation: u64, tick: u64) -> Self {
        self.generation = generation;
        self.tick = tick;
        self
    }

    /// Whether this violation demands a rollback.
    pub fn is_critical(&self) -> bool {
        self.severity == Severity::Critical
    }
}

// ---------------------------------------------------------------------------
// Transaction
// ---------------------------------------------------------------------------

/// A logical transaction: an ordered operation log plus the audit mirror of
/// its compensation stack.
///
/// The executable compensations live in the saga coordinator, keyed by the
/// same id; this record only carries their descriptions. `version` is bumped
/// on every successful write and is used for optimistic concurrency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique id.
    pub id: TransactionId,
    /// Label given at `begin` (e.g. `"tick-42"` or a saga name).
    pub name: String,
    /// Operation descriptions in caller-submission order.
    pub operations: Vec<String>,
    /// Compensation descriptions in registration order.
    pub compensations: Vec<String>,
    /// Current lifecycle state.
    pub status: TransactionStatus,
    /// When the transaction was begun.
    pub created_at: DateTime<Utc>,
    /// When the transaction reached a terminal state.
    pub completed_at: Option<DateTime<Utc>>,
    /// Optimistic concurrency version, starting at 0.
    pub version: u64,
}

impl Transaction {
    /// Create a new pending transaction with empty logs.
    pub fn pending(name: impl Into<String>) -> Self {
        Self {
            id: TransactionId::new(),
            name: name.into(),
            operations: Vec::new(),
            compensations: Vec::new(),
            status: TransactionStatus::Pending,
            created_at: Utc::now(),
            completed_at: None,
            version: 0,
        }
    }

    /// Whether operations may still be appended.
    pub fn is_pending(&self) -> bool {
        self.status == TransactionStatus::Pending
    }
}
