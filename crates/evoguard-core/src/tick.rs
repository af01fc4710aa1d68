//! Tick cycle: one transactional step of the EvoGuard simulation.
//!
//! Each tick runs through these phases:
//!
//! 1. **Decide** -- every agent's policy picks an action from the current
//!    environment snapshot.
//!
//! 2. **Check** -- the action is checked against every safety constraint;
//!    violations are stamped with the generation and tick and recorded by the
//!    [`SafetyMonitor`]. Critical ones reach the [`RollbackGovernor`].
//!
//! 3. **Apply** -- the action is applied inside the tick's transaction. Every
//!    harvest and every state replacement registers a compensation with the
//!    [`SagaCoordinator`].
//!
//! 4. **Govern** -- if the governor holds a rollback demand the transaction
//!    is rolled back, undoing the tick's effects newest first; otherwise it
//!    commits.
//!
//! 5. **Advance** -- the environment regenerates resources, drifts its
//!    factors and advances its tick counter.
//!
//! 6. **Measure** -- agent and system metrics for the tick are appended to
//!    the [`MetricsCollector`] window.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rust_decimal::Decimal;
use tracing::{debug, error, warn};

use evoguard_agents::fitness::decimal_to_f64;
use evoguard_agents::{
    ActionPolicy, Agent, AgentAction, AgentState, GenomePolicy, SelectionError, SelectionSettings,
};
use evoguard_events::EventSink;
use evoguard_ledger::{
    CompensatingAction, LedgerError, SagaCoordinator, TransactionLedger, TransactionStore,
};
use evoguard_observer::{AgentMetric, SystemMetric};
use evoguard_safety::{
    CriticalViolationHandler, InMemoryViolationStore, SafetyConstraint, SafetyMonitor,
    SafetySettings, check_all,
};
use evoguard_types::{AgentId, TransactionId};
use evoguard_world::{Environment, EnvironmentSnapshot};

use crate::config::ResolvedSettings;
use crate::generation::EvolutionSettings;
use crate::governor::RollbackGovernor;
use crate::metrics::MetricsCollector;

/// Errors that can occur during tick execution or generation turnover.
#[derive(Debug, thiserror::Error)]
pub enum TickError {
    /// The transaction ledger rejected an operation.
    #[error("ledger error: {source}")]
    Ledger {
        /// The underlying ledger error.
        #[from]
        source: LedgerError,
    },

    /// Survivor selection failed at a generation boundary.
    #[error("selection error: {source}")]
    Selection {
        /// The underlying selection error.
        #[from]
        source: SelectionError,
    },
}

/// Summary of a single tick's execution.
#[derive(Debug, Clone, PartialEq)]
pub struct TickSummary {
    /// The tick number that was executed.
    pub tick: u64,
    /// Generation the tick belongs to.
    pub generation: u64,
    /// The tick's transaction.
    pub transaction_id: TransactionId,
    /// Agents that acted.
    pub agents: usize,
    /// Move actions attempted.
    pub moves: usize,
    /// Harvest actions attempted.
    pub harvests: usize,
    /// Rest actions taken.
    pub rests: usize,
    /// Violations recorded during the tick.
    pub violations: u64,
    /// Critical violations behind the rollback, if any.
    pub critical: usize,
    /// Whether the tick's effects were undone.
    pub rolled_back: bool,
    /// Compensations that failed during the rollback.
    pub compensation_failures: usize,
    /// Resources taken from the world and kept after governance.
    pub harvested: Decimal,
}

/// The mutable simulation state passed through the tick cycle.
pub struct SimulationState {
    /// The world. Compensations lock it to undo harvests.
    pub environment: Arc<Mutex<Environment>>,
    /// Agents of the current generation.
    pub population: Vec<Arc<Agent>>,
    /// Current generation number, starting at 0.
    pub generation: u64,
    /// Ticks run in the current generation.
    pub ticks_in_generation: u64,
    /// Source of agent decisions.
    pub policy: Box<dyn ActionPolicy>,
    /// Rules every action is checked against.
    pub constraints: Vec<Box<dyn SafetyConstraint>>,
    /// Violation aggregate and elimination flags.
    pub monitor: Arc<SafetyMonitor>,
    /// Tick transactions and their compensations.
    pub coordinator: Arc<SagaCoordinator>,
    /// Critical-violation rollback demands.
    pub governor: Arc<RollbackGovernor>,
    /// Where generation events go.
    pub sink: Arc<dyn EventSink>,
    /// Recent per-tick metrics.
    pub metrics: MetricsCollector,
    /// Survivor selection settings.
    pub selection: SelectionSettings,
    /// Turnover settings.
    pub evolution: EvolutionSettings,
    /// Constraint and elimination settings.
    pub safety: SafetySettings,
    /// Randomness for selection and mutation.
    pub rng: StdRng,
}

impl core::fmt::Debug for SimulationState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SimulationState")
            .field("generation", &self.generation)
            .field("ticks_in_generation", &self.ticks_in_generation)
            .field("population", &self.population.len())
            .finish_non_exhaustive()
    }
}

impl SimulationState {
    /// Wire a simulation around `environment` and an initial population.
    ///
    /// The monitor, coordinator and governor share `sink`; the governor is
    /// registered as the monitor's critical-violation handler. Agent
    /// decisions come from a [`GenomePolicy`] seeded from the world seed.
    pub fn new(
        environment: Environment,
        population: Vec<Agent>,
        settings: &ResolvedSettings,
        metrics_window: usize,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        let seed = settings.physics.seed;
        let governor = Arc::new(RollbackGovernor::new());
        let monitor = SafetyMonitor::new(Arc::clone(&sink), Arc::new(InMemoryViolationStore::new()))
            .with_critical_handler(Arc::clone(&governor) as Arc<dyn CriticalViolationHandler>);
        let coordinator = SagaCoordinator::new(TransactionLedger::default(), Arc::clone(&sink));

        Self {
            environment: Arc::new(Mutex::new(environment)),
            population: population.into_iter().map(Arc::new).collect(),
            generation: 0,
            ticks_in_generation: 0,
            policy: Box::new(GenomePolicy::new(seed)),
            constraints: settings.safety.constraints(),
            monitor: Arc::new(monitor),
            coordinator: Arc::new(coordinator),
            governor,
            sink,
            metrics: MetricsCollector::new(metrics_window),
            selection: settings.selection.clone(),
            evolution: settings.evolution,
            safety: settings.safety,
            rng: StdRng::seed_from_u64(seed.wrapping_add(1)),
        }
    }

    /// Replace the decision source.
    #[must_use]
    pub fn with_policy(mut self, policy: Box<dyn ActionPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Persist tick transactions to `store` instead of the in-memory default.
    #[must_use]
    pub fn with_transaction_store(mut self, store: Arc<dyn TransactionStore>) -> Self {
        self.coordinator = Arc::new(SagaCoordinator::new(
            TransactionLedger::new(store),
            Arc::clone(&self.sink),
        ));
        self
    }

    /// Whether the current generation has run its full length.
    pub const fn generation_due(&self) -> bool {
        self.ticks_in_generation >= self.evolution.ticks_per_generation
    }

    /// The latest environment snapshot.
    pub fn snapshot(&self) -> Arc<EnvironmentSnapshot> {
        self.environment.lock().snapshot()
    }
}

/// What one agent did during a tick.
struct AgentOutcome {
    agent_id: AgentId,
    action: AgentAction,
    harvested: Decimal,
    violations: u64,
}

/// Execute one tick.
///
/// Violations stay recorded even when the tick is rolled back. The
/// environment advances whether the tick committed or not. If the ledger
/// fails part-way, the tick is rolled back and its pending rollback demand
/// dropped before the error is returned.
pub fn run_tick(state: &mut SimulationState) -> Result<TickSummary, TickError> {
    let started = Instant::now();
    let world = state.snapshot();
    let tick = world.tick.saturating_add(1);
    let generation = state.generation;
    let transaction_id = state.coordinator.begin(&format!("tick-{tick}"))?;

    // --- Decide, check, apply ---
    let outcomes = match act(state, &world, generation, tick, transaction_id) {
        Ok(outcomes) => outcomes,
        Err(source) => {
            abort_tick(state, tick, transaction_id, &source);
            return Err(source.into());
        }
    };

    let newly_flagged = state.monitor.evaluate_elimination(&state.safety.elimination);
    if !newly_flagged.is_empty() {
        debug!(tick, flagged = newly_flagged.len(), "Elimination thresholds breached");
    }

    // --- Govern ---
    let demand = state.governor.take_demand();
    let (critical, compensation_failures) = match &demand {
        Some(demand) => {
            warn!(
                tick,
                transaction_id = %transaction_id,
                violations = demand.violations.len(),
                agents = demand.agents().len(),
                "Rolling back tick"
            );
            let report = state.coordinator.rollback(transaction_id)?;
            (demand.violations.len(), report.failed.len())
        }
        None => {
            if let Err(source) = state.coordinator.commit(transaction_id) {
                abort_tick(state, tick, transaction_id, &source);
                return Err(source.into());
            }
            (0, 0)
        }
    };
    let rolled_back = demand.is_some();

    // --- Advance ---
    let tick = state.environment.lock().tick();
    state.ticks_in_generation = state.ticks_in_generation.saturating_add(1);

    // --- Measure ---
    let summary = summarize(
        tick,
        generation,
        transaction_id,
        &outcomes,
        critical,
        rolled_back,
        compensation_failures,
    );
    record_metrics(state, &summary, &outcomes, started);

    debug!(
        tick,
        generation,
        agents = summary.agents,
        violations = summary.violations,
        rolled_back,
        "Tick complete"
    );
    Ok(summary)
}

/// Every agent decides, is checked, and acts inside `transaction_id`.
fn act(
    state: &mut SimulationState,
    world: &EnvironmentSnapshot,
    generation: u64,
    tick: u64,
    transaction_id: TransactionId,
) -> Result<Vec<AgentOutcome>, LedgerError> {
    let mut outcomes = Vec::with_capacity(state.population.len());
    for agent in &state.population {
        let before = agent.state();
        let action = state.policy.choose(agent, &before, world);

        let mut violations = 0_u64;
        for violation in check_all(&state.constraints, agent, &before, &action, world) {
            let violation = violation.at(generation, tick);
            if state.monitor.record_violation(Some(agent.id()), Some(&violation)) {
                violations = violations.saturating_add(1);
            }
        }

        let harvested = apply_action(
            &state.environment,
            &state.coordinator,
            transaction_id,
            agent,
            &before,
            &action,
        )?;
        outcomes.push(AgentOutcome {
            agent_id: agent.id(),
            action,
            harvested,
            violations,
        });
    }
    Ok(outcomes)
}

/// Undo a tick the ledger could not finish.
fn abort_tick(
    state: &SimulationState,
    tick: u64,
    transaction_id: TransactionId,
    cause: &LedgerError,
) {
    error!(tick, transaction_id = %transaction_id, error = %cause, "Tick failed, rolling back");
    let rollback = state
        .coordinator
        .compensation_depth(transaction_id)
        .map(|_| state.coordinator.rollback(transaction_id));
    if let Some(Err(e)) = rollback {
        error!(tick, transaction_id = %transaction_id, error = %e, "Tick rollback failed");
    }
    if let Some(demand) = state.governor.take_demand() {
        warn!(
            tick,
            violations = demand.violations.len(),
            "Dropping rollback demand of failed tick"
        );
    }
}

/// Apply `action` for `agent` inside `transaction_id`, registering the
/// compensations that undo it. Returns the resources actually harvested.
///
/// An effect whose compensation the ledger rejects is undone on the spot.
fn apply_action(
    environment: &Arc<Mutex<Environment>>,
    coordinator: &SagaCoordinator,
    transaction_id: TransactionId,
    agent: &Arc<Agent>,
    before: &Arc<AgentState>,
    action: &AgentAction,
) -> Result<Decimal, LedgerError> {
    let agent_id = agent.id();

    let harvested = match *action {
        AgentAction::Harvest { at, amount } => {
            let taken = environment.lock().harvest(at, amount);
            if taken > Decimal::ZERO {
                let world = Arc::clone(environment);
                let logged = coordinator.log_operation(
                    transaction_id,
                    &format!("agent {agent_id} took {taken} at {at}"),
                    Some(CompensatingAction::infallible(
                        format!("return {taken} to {at}"),
                        move || world.lock().deposit(at, taken),
                    )),
                );
                if let Err(e) = logged {
                    environment.lock().deposit(at, taken);
                    return Err(e);
                }
            }
            taken
        }
        AgentAction::Move { .. } | AgentAction::Rest => Decimal::ZERO,
    };

    // Logged before the replacement, so a rejected log leaves the state as is.
    let target = Arc::clone(agent);
    let snapshot = Arc::clone(before);
    coordinator.log_operation(
        transaction_id,
        &format!("agent {agent_id} {}", action.describe()),
        Some(CompensatingAction::infallible(
            format!("restore state of agent {agent_id}"),
            move || {
                let _ = target.restore_state(snapshot);
            },
        )),
    )?;
    let _ = agent.replace_state(action.apply(before, harvested));
    Ok(harvested)
}

fn summarize(
    tick: u64,
    generation: u64,
    transaction_id: TransactionId,
    outcomes: &[AgentOutcome],
    critical: usize,
    rolled_back: bool,
    compensation_failures: usize,
) -> TickSummary {
    let count = |pred: fn(&AgentAction) -> bool| {
        outcomes.iter().filter(|o| pred(&o.action)).count()
    };
    let harvested = if rolled_back {
        Decimal::ZERO
    } else {
        outcomes
            .iter()
            .fold(Decimal::ZERO, |acc, o| acc.saturating_add(o.harvested))
    };
    TickSummary {
        tick,
        generation,
        transaction_id,
        agents: outcomes.len(),
        moves: count(|a| matches!(a, AgentAction::Move { .. })),
        harvests: count(|a| matches!(a, AgentAction::Harvest { .. })),
        rests: count(|a| matches!(a, AgentAction::Rest)),
        violations: outcomes
            .iter()
            .fold(0_u64, |acc, o| acc.saturating_add(o.violations)),
        critical,
        rolled_back,
        compensation_failures,
        harvested,
    }
}

fn record_metrics(
    state: &mut SimulationState,
    summary: &TickSummary,
    outcomes: &[AgentOutcome],
    started: Instant,
) {
    let mut agents = Vec::with_capacity(outcomes.len());
    let mut fitness = Vec::with_capacity(outcomes.len());

    for (agent, outcome) in state.population.iter().zip(outcomes) {
        let current = agent.state();
        let reward = match outcome.action {
            AgentAction::Harvest { amount, .. }
                if !summary.rolled_back && amount > Decimal::ZERO =>
            {
                decimal_to_f64(outcome.harvested) / decimal_to_f64(amount)
            }
            _ => 0.0,
        };
        agents.push(AgentMetric {
            tick: summary.tick,
            agent_id: outcome.agent_id,
            position: current.position(),
            resources: decimal_to_f64(current.resources()),
            reward,
            violations: outcome.violations,
        });
        fitness.push(state.evolution.fitness.score(&current));
    }

    let system = SystemMetric {
        tick: summary.tick,
        generation: summary.generation,
        failed_nodes: u32::try_from(summary.compensation_failures).unwrap_or(u32::MAX),
        avg_latency_ms: started.elapsed().as_secs_f64() * 1000.0,
        fitness,
    };
    state.metrics.record(agents, system);
}
