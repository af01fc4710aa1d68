//! End-to-end tick, violation, rollback and generation cycle.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use evoguard_agents::{ActionPolicy, Agent, AgentAction, AgentState, Genome};
use evoguard_core::{
    NoOpCallback, RunLimits, SimulationConfig, SimulationEndReason, SimulationState, run_simulation,
    run_tick,
};
use evoguard_events::{
    EventSink, MemorySink, SimulationEvent, TOPIC_GENERATIONS, TOPIC_TRANSACTIONS,
    TOPIC_VIOLATIONS,
};
use evoguard_ledger::{CompensatingAction, SagaCoordinator, TransactionLedger};
use evoguard_safety::SafetyMonitor;
use evoguard_types::{
    AgentId, ConstraintType, Position, Severity, TransactionStatus, ViolationRecord,
};
use evoguard_world::{Environment, EnvironmentSnapshot, WorldPhysics};

/// Per-agent fixed actions; everyone else rests.
struct Scripted(HashMap<AgentId, AgentAction>);

impl ActionPolicy for Scripted {
    fn choose(&mut self, agent: &Agent, _: &AgentState, _: &EnvironmentSnapshot) -> AgentAction {
        self.0.get(&agent.id()).copied().unwrap_or(AgentAction::Rest)
    }
}

fn build(
    config: &SimulationConfig,
    agents: usize,
    sink: Arc<MemorySink>,
) -> Option<SimulationState> {
    let settings = config.validate().ok()?;
    let mut env = Environment::new(WorldPhysics {
        volatility_scale: 0.0,
        ..settings.physics
    });
    env.register_resource(Position::ORIGIN, dec!(30), Decimal::ZERO);
    let population = (0..agents)
        .map(|_| Agent::spawn(Genome::default(), Position::ORIGIN, 0))
        .collect();
    Some(SimulationState::new(env, population, &settings, 128, sink))
}

fn ids(state: &SimulationState) -> Vec<AgentId> {
    state.population.iter().map(|a| a.id()).collect()
}

#[test]
fn critical_violation_undoes_harvest_and_moves() {
    let sink = Arc::new(MemorySink::new());
    let Some(state) = build(&SimulationConfig::default(), 2, Arc::clone(&sink)) else {
        return;
    };
    let agents = ids(&state);
    let [harvester, runaway] = agents.as_slice() else {
        return;
    };
    let (harvester, runaway) = (*harvester, *runaway);
    let script = HashMap::from([
        (
            harvester,
            AgentAction::Harvest {
                at: Position::ORIGIN,
                amount: dec!(5),
            },
        ),
        (
            runaway,
            AgentAction::Move {
                to: Position::new(0, 99, 0),
            },
        ),
    ]);
    let mut state = state.with_policy(Box::new(Scripted(script)));

    let summary = run_tick(&mut state);
    assert!(summary.is_ok());
    let Ok(summary) = summary else { return };

    assert!(summary.rolled_back);
    assert_eq!(summary.harvested, Decimal::ZERO);

    // The harvest went back into the world.
    let left = state
        .environment
        .lock()
        .resource(Position::ORIGIN)
        .map(|r| r.quantity);
    assert_eq!(left, Some(dec!(30)));

    // Both agents are back on their pre-tick snapshot.
    for agent in &state.population {
        let current = agent.state();
        assert_eq!(current.position(), Position::ORIGIN);
        assert_eq!(current.resources(), Decimal::ZERO);
        assert_eq!(current.energy(), dec!(100));
    }

    // The record is terminal, stamped, and lists every compensation.
    let record = state.coordinator.find(summary.transaction_id).ok().flatten();
    assert!(matches!(
        record,
        Some(ref t) if t.status == TransactionStatus::RolledBack
            && t.completed_at.is_some()
            && t.compensations.len() == 3
    ));

    // The violation stays on record for audit.
    assert_eq!(state.monitor.critical_violations(), 1);
    let kinds: Vec<&'static str> = sink
        .events_on(TOPIC_VIOLATIONS)
        .iter()
        .map(SimulationEvent::kind)
        .collect();
    assert!(!kinds.is_empty());
    assert!(matches!(
        sink.events_on(TOPIC_TRANSACTIONS).last(),
        Some(SimulationEvent::TransactionRolledBack {
            compensations_run: 3,
            compensation_failures: 0,
            ..
        })
    ));
}

#[test]
fn ticks_after_a_rollback_commit_normally() {
    let sink = Arc::new(MemorySink::new());
    let Some(state) = build(&SimulationConfig::default(), 1, sink) else {
        return;
    };
    let Some(agent) = ids(&state).first().copied() else {
        return;
    };
    let script = HashMap::from([(
        agent,
        AgentAction::Move {
            to: Position::new(-80, 0, 0),
        },
    )]);
    let mut state = state.with_policy(Box::new(Scripted(script)));

    assert!(matches!(run_tick(&mut state), Ok(ref s) if s.rolled_back));

    let mut state = state.with_policy(Box::new(Scripted(HashMap::new())));
    assert!(matches!(run_tick(&mut state), Ok(ref s) if !s.rolled_back && s.tick == 2));
    assert!(!state.governor.has_pending());
}

#[tokio::test]
async fn repeat_offenders_are_bred_out() {
    let mut config = SimulationConfig::default();
    config.population.size = 4;
    config.selection.survivor_count = 2;
    config.selection.elitism_count = 1;
    config.safety.max_critical_violations = 2;
    config.evolution.ticks_per_generation = 3;

    let sink = Arc::new(MemorySink::new());
    let Some(state) = build(&config, 4, Arc::clone(&sink)) else {
        return;
    };
    let Some(offender) = state.population.first().map(|a| a.id()) else {
        return;
    };
    let script = HashMap::from([(
        offender,
        AgentAction::Move {
            to: Position::new(60, 0, 0),
        },
    )]);
    let mut state = state.with_policy(Box::new(Scripted(script)));

    let limits = RunLimits {
        max_generations: 1,
        ..RunLimits::default()
    };
    let result = run_simulation(&mut state, limits, &mut NoOpCallback, None).await;
    assert!(result.is_ok());
    let Ok(result) = result else { return };

    assert_eq!(result.end_reason, SimulationEndReason::MaxGenerationsReached);
    assert_eq!(result.total_ticks, 3);
    assert_eq!(result.rolled_back_ticks, 3);
    assert!(matches!(
        result.generations.first(),
        Some(g) if g.eliminated == 1 && g.population == 4
    ));

    assert_eq!(state.population.len(), 4);
    assert!(state
        .population
        .iter()
        .all(|a| a.parent() != Some(offender)));
    assert_eq!(sink.events_on(TOPIC_GENERATIONS).len(), 1);
}

#[test]
fn concurrent_transactions_and_violations_stay_consistent() {
    let sink: Arc<dyn EventSink> = Arc::new(MemorySink::new());
    let coordinator = SagaCoordinator::new(TransactionLedger::default(), Arc::clone(&sink));
    let monitor = SafetyMonitor::default();
    let undone = Arc::new(AtomicU64::new(0));
    let agent = AgentId::new();

    std::thread::scope(|scope| {
        for worker in 0..8_u64 {
            let coordinator = &coordinator;
            let monitor = &monitor;
            let undone = Arc::clone(&undone);
            scope.spawn(move || {
                for round in 0..25_u64 {
                    let Ok(id) = coordinator.begin(&format!("w{worker}-r{round}")) else {
                        continue;
                    };
                    for step in 0..4 {
                        let counter = Arc::clone(&undone);
                        let _ = coordinator.log_operation(
                            id,
                            &format!("step {step}"),
                            Some(CompensatingAction::infallible(format!("undo {step}"), move || {
                                counter.fetch_add(1, Ordering::SeqCst);
                            })),
                        );
                    }
                    if round % 2 == 0 {
                        let _ = coordinator.rollback(id);
                    } else {
                        let _ = coordinator.commit(id);
                    }

                    let violation = ViolationRecord::new(
                        agent,
                        ConstraintType::EnergyReserve,
                        Severity::Warning,
                        "rest",
                        "low",
                    )
                    .at(worker, round);
                    monitor.record_violation(Some(agent), Some(&violation));
                }
            });
        }
    });

    // 8 workers, 13 rolled-back rounds each, 4 compensations per round.
    assert_eq!(undone.load(Ordering::SeqCst), 416);
    assert_eq!(coordinator.open_transactions(), 0);
    assert_eq!(monitor.violation_count(agent), 200);
    assert_eq!(monitor.generation_counts(agent).len(), 8);
    assert!(monitor
        .generation_counts(agent)
        .values()
        .all(|count| *count == 25));
}
