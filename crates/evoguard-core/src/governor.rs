//! Turns critical violations into a rollback demand.
//!
//! The [`SafetyMonitor`](evoguard_safety::SafetyMonitor) pushes every
//! critical violation to the governor as it is recorded. The tick loop asks
//! for the pending demand once per tick; taking it clears it, so one burst of
//! critical violations causes exactly one rollback.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::warn;

use evoguard_safety::CriticalViolationHandler;
use evoguard_types::{AgentId, ViolationRecord};

/// Critical violations that demand the current tick be undone.
#[derive(Debug, Clone, PartialEq)]
pub struct RollbackDemand {
    /// The violations behind the demand, in the order they were recorded.
    pub violations: Vec<ViolationRecord>,
}

impl RollbackDemand {
    /// Agents that committed the violations.
    pub fn agents(&self) -> BTreeSet<AgentId> {
        self.violations.iter().map(|v| v.agent_id).collect()
    }
}

/// Collects critical violations until the tick loop consumes them.
#[derive(Debug, Default)]
pub struct RollbackGovernor {
    pending: Mutex<Vec<ViolationRecord>>,
    raised: AtomicU64,
}

impl RollbackGovernor {
    /// Create a governor with nothing pending.
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the pending demand, leaving nothing behind.
    pub fn take_demand(&self) -> Option<RollbackDemand> {
        let violations = std::mem::take(&mut *self.pending.lock());
        if violations.is_empty() {
            return None;
        }
        self.raised.fetch_add(1, Ordering::AcqRel);
        Some(RollbackDemand { violations })
    }

    /// Whether a demand is waiting.
    pub fn has_pending(&self) -> bool {
        !self.pending.lock().is_empty()
    }

    /// Demands handed out so far.
    pub fn demands_taken(&self) -> u64 {
        self.raised.load(Ordering::Acquire)
    }
}

impl CriticalViolationHandler for RollbackGovernor {
    fn on_critical(&self, violation: &ViolationRecord) {
        warn!(
            agent_id = %violation.agent_id,
            constraint = ?violation.constraint,
            tick = violation.tick,
            "Critical violation, rollback demanded"
        );
        self.pending.lock().push(violation.clone());
    }
}
