//! Concurrent violation tracking.
//!
//! The [`SafetyMonitor`] aggregates violations per agent by severity and by
//! generation. Aggregates live in a [`DashMap`] keyed by agent id; each
//! agent's tally is a set of atomic counters, so concurrent recorders never
//! lose an update and new agents never take a global lock.
//!
//! The monitor does not roll anything back itself. Critical violations are
//! pushed to registered [`CriticalViolationHandler`]s, which decide what to
//! do with them.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::{DashMap, DashSet};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use evoguard_events::{EventSink, SimulationEvent, TracingSink, publish_or_log};
use evoguard_types::{AgentId, Severity, ViolationRecord};

use crate::store::{InMemoryViolationStore, ViolationStore};

/// Receives every critical violation the monitor records.
pub trait CriticalViolationHandler: Send + Sync {
    /// Called once per recorded critical violation.
    fn on_critical(&self, violation: &ViolationRecord);
}

/// Thresholds at which an agent becomes an elimination candidate.
///
/// A zero threshold is disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EliminationPolicy {
    /// Critical violations that trigger elimination.
    pub max_critical: u64,
    /// Violations of any severity that trigger elimination.
    pub max_total: u64,
}

impl Default for EliminationPolicy {
    fn default() -> Self {
        Self {
            max_critical: 3,
            max_total: 10,
        }
    }
}

impl EliminationPolicy {
    fn breached(&self, critical: u64, total: u64) -> bool {
        (self.max_critical > 0 && critical >= self.max_critical)
            || (self.max_total > 0 && total >= self.max_total)
    }
}

#[derive(Debug, Default)]
struct AgentTally {
    severities: [AtomicU64; 3],
    generations: DashMap<u64, AtomicU64>,
}

impl AgentTally {
    fn count(&self, severity: Severity) -> u64 {
        self.severities
            .get(severity.index())
            .map_or(0, |c| c.load(Ordering::Acquire))
    }

    fn total(&self) -> u64 {
        self.severities
            .iter()
            .fold(0_u64, |acc, c| acc.saturating_add(c.load(Ordering::Acquire)))
    }
}

/// Violation aggregate and elimination flags.
pub struct SafetyMonitor {
    tallies: DashMap<AgentId, Arc<AgentTally>>,
    eliminated: DashSet<AgentId>,
    total: AtomicU64,
    critical: AtomicU64,
    sink: Arc<dyn EventSink>,
    store: Arc<dyn ViolationStore>,
    handlers: Vec<Arc<dyn CriticalViolationHandler>>,
}

impl core::fmt::Debug for SafetyMonitor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SafetyMonitor")
            .field("agents", &self.tallies.len())
            .field("eliminated", &self.eliminated.len())
            .field("total", &self.total.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl Default for SafetyMonitor {
    fn default() -> Self {
        Self::new(Arc::new(TracingSink), Arc::new(InMemoryViolationStore::new()))
    }
}

impl SafetyMonitor {
    /// Create a monitor publishing to `sink` and persisting to `store`.
    pub fn new(sink: Arc<dyn EventSink>, store: Arc<dyn ViolationStore>) -> Self {
        Self {
            tallies: DashMap::new(),
            eliminated: DashSet::new(),
            total: AtomicU64::new(0),
            critical: AtomicU64::new(0),
            sink,
            store,
            handlers: Vec::new(),
        }
    }

    /// Register a handler for critical violations.
    #[must_use]
    pub fn with_critical_handler(mut self, handler: Arc<dyn CriticalViolationHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    /// Record a violation against `agent`.
    ///
    /// Does nothing when either argument is absent. Returns whether the
    /// violation was recorded. Store and publish failures are logged and do
    /// not prevent the counters from being updated.
    pub fn record_violation(
        &self,
        agent: Option<AgentId>,
        violation: Option<&ViolationRecord>,
    ) -> bool {
        let (Some(agent), Some(violation)) = (agent, violation) else {
            return false;
        };

        let tally = Arc::clone(&self.tallies.entry(agent).or_default());
        if let Some(counter) = tally.severities.get(violation.severity.index()) {
            counter.fetch_add(1, Ordering::AcqRel);
        }
        tally
            .generations
            .entry(violation.generation)
            .or_default()
            .fetch_add(1, Ordering::AcqRel);
        self.total.fetch_add(1, Ordering::AcqRel);

        debug!(
            agent_id = %agent,
            severity = %violation.severity,
            constraint = ?violation.constraint,
            tick = violation.tick,
            "Violation recorded"
        );

        if let Err(e) = self.store.save(violation) {
            warn!(agent_id = %agent, error = %e, "failed to persist violation");
        }
        publish_or_log(
            self.sink.as_ref(),
            &agent.to_string(),
            &SimulationEvent::ViolationRecorded {
                violation: violation.clone(),
            },
        );

        if violation.is_critical() {
            self.critical.fetch_add(1, Ordering::AcqRel);
            for handler in &self.handlers {
                handler.on_critical(violation);
            }
        }
        true
    }

    /// Per-severity counts for `agent`. Unknown agents yield an empty map.
    pub fn severity_counts(&self, agent: AgentId) -> BTreeMap<Severity, u64> {
        let Some(tally) = self.tally(agent) else {
            return BTreeMap::new();
        };
        Severity::ALL
            .iter()
            .map(|s| (*s, tally.count(*s)))
            .filter(|(_, n)| *n > 0)
            .collect()
    }

    /// Per-generation counts for `agent`. Unknown agents yield an empty map.
    pub fn generation_counts(&self, agent: AgentId) -> BTreeMap<u64, u64> {
        let Some(tally) = self.tally(agent) else {
            return BTreeMap::new();
        };
        tally
            .generations
            .iter()
            .map(|entry| (*entry.key(), entry.value().load(Ordering::Acquire)))
            .collect()
    }

    /// Violations of any severity recorded against `agent`.
    pub fn violation_count(&self, agent: AgentId) -> u64 {
        self.tally(agent).map_or(0, |t| t.total())
    }

    /// Violations recorded across all agents.
    pub fn total_violations(&self) -> u64 {
        self.total.load(Ordering::Acquire)
    }

    /// Critical violations recorded across all agents.
    pub fn critical_violations(&self) -> u64 {
        self.critical.load(Ordering::Acquire)
    }

    /// Flag `agent` as an elimination candidate. Flags are never cleared
    /// for a living agent. Returns `true` if the agent was newly flagged.
    pub fn mark_for_elimination(&self, agent: AgentId) -> bool {
        let newly = self.eliminated.insert(agent);
        if newly {
            info!(agent_id = %agent, "Agent marked for elimination");
        }
        newly
    }

    /// Whether `agent` has been flagged for elimination.
    pub fn is_elimination_candidate(&self, agent: AgentId) -> bool {
        self.eliminated.contains(&agent)
    }

    /// Every flagged agent.
    pub fn elimination_candidates(&self) -> Vec<AgentId> {
        self.eliminated.iter().map(|id| *id).collect()
    }

    /// Flag every agent whose tally breaches `policy`. Returns the agents
    /// flagged by this call.
    pub fn evaluate_elimination(&self, policy: &EliminationPolicy) -> Vec<AgentId> {
        let breaching: Vec<AgentId> = self
            .tallies
            .iter()
            .filter(|entry| {
                let tally = entry.value();
                policy.breached(tally.count(Severity::Critical), tally.total())
            })
            .map(|entry| *entry.key())
            .collect();

        breaching
            .into_iter()
            .filter(|id| self.mark_for_elimination(*id))
            .collect()
    }

    /// Drop tallies and flags of agents not in `alive`.
    pub fn retain_agents(&self, alive: &HashSet<AgentId>) {
        self.tallies.retain(|id, _| alive.contains(id));
        self.eliminated.retain(|id| alive.contains(id));
    }

    /// The store violations are persisted to.
    pub fn store(&self) -> &Arc<dyn ViolationStore> {
        &self.store
    }

    fn tally(&self, agent: AgentId) -> Option<Arc<AgentTally>> {
        self.tallies.get(&agent).map(|t| Arc::clone(t.value()))
    }
}
