//! Generation turnover: score, select, breed, report.
//!
//! At the end of a generation the agents that are not elimination candidates
//! are scored and handed to the selection engine. The top `elitism_count`
//! agents are copied into the next generation unmutated; the remaining slots
//! are filled with mutated offspring of the survivors, cycling through them
//! in selection order. Offspring are born where their parent stands, clamped
//! into the world bounds.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use evoguard_agents::{Agent, FitnessWeights, ScoredAgent, SelectionSettings, select};
use evoguard_events::{GenerationSummary, SimulationEvent, publish_or_log};
use evoguard_observer::BehaviorReport;
use evoguard_types::{AgentId, Position, SelectionStrategy};
use evoguard_world::WorldPhysics;

use crate::tick::{SimulationState, TickError};

/// Resolved turnover parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvolutionSettings {
    /// Agents bred into every new generation.
    pub population_size: usize,
    /// Ticks between turnovers.
    pub ticks_per_generation: u64,
    /// Per-trait mutation probability.
    pub mutation_rate: f64,
    /// Largest per-trait mutation delta.
    pub mutation_strength: f64,
    /// Fitness function weights.
    pub fitness: FitnessWeights,
}

impl Default for EvolutionSettings {
    fn default() -> Self {
        Self {
            population_size: 20,
            ticks_per_generation: 50,
            mutation_rate: 0.1,
            mutation_strength: 0.2,
            fitness: FitnessWeights::default(),
        }
    }
}

/// Result of one turnover.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOutcome {
    /// Figures for the generation that ended.
    pub summary: GenerationSummary,
    /// Detector verdicts over the generation's metric window.
    pub report: BehaviorReport,
}

impl GenerationOutcome {
    /// Whether the new generation is empty.
    pub const fn is_extinct(&self) -> bool {
        self.summary.survivors == 0
    }
}

/// Replace the population with the next generation.
///
/// An empty eligible set yields an empty population; the caller decides
/// whether that ends the run.
pub fn advance_generation(state: &mut SimulationState) -> Result<GenerationOutcome, TickError> {
    let finished = state.generation;
    let next_generation = finished.saturating_add(1);
    let weights = state.evolution.fitness;

    let eligible: Vec<ScoredAgent> = state
        .population
        .iter()
        .filter(|a| !state.monitor.is_elimination_candidate(a.id()))
        .map(|a| ScoredAgent {
            agent: Arc::clone(a),
            fitness: weights.score(&a.state()),
            violations: state.monitor.violation_count(a.id()),
        })
        .collect();
    let eliminated = state.population.len().saturating_sub(eligible.len());
    let violations = state
        .population
        .iter()
        .fold(0_u64, |acc, a| acc.saturating_add(state.monitor.violation_count(a.id())));

    let survivors = select(&eligible, &state.selection, &mut state.rng)?;

    let size = state.evolution.population_size;
    let physics = *state.environment.lock().physics();
    let mut next: Vec<Arc<Agent>> = Vec::with_capacity(size);

    if !survivors.is_empty() {
        let elite_count = state.selection.elitism_count.min(size);
        if elite_count > 0 {
            let elite_settings = SelectionSettings {
                strategy: SelectionStrategy::Elitism,
                survivor_count: elite_count,
                ..state.selection.clone()
            };
            for elite in select(&eligible, &elite_settings, &mut state.rng)? {
                next.push(Arc::new(Agent::offspring(
                    &elite.agent,
                    *elite.agent.genome(),
                    birthplace(&elite.agent, &physics),
                    next_generation,
                )));
            }
        }

        let remaining = size.saturating_sub(next.len());
        for parent in survivors.iter().cycle().take(remaining) {
            let genome = parent.agent.genome().mutated(
                &mut state.rng,
                state.evolution.mutation_rate,
                state.evolution.mutation_strength,
            );
            next.push(Arc::new(Agent::offspring(
                &parent.agent,
                genome,
                birthplace(&parent.agent, &physics),
                next_generation,
            )));
        }
    }

    let summary = GenerationSummary {
        generation: finished,
        population: state.population.len(),
        eliminated,
        survivors: survivors.len(),
        best_fitness: eligible
            .iter()
            .map(|s| s.fitness)
            .reduce(f64::max)
            .unwrap_or(0.0),
        mean_fitness: mean_fitness(&eligible),
        violations,
    };

    let (agent_metrics, system_metrics) = state.metrics.drain();
    let report = BehaviorReport::analyze(finished, &agent_metrics, &system_metrics);
    report.log();

    if next.is_empty() {
        warn!(generation = finished, eliminated, "No eligible agents, population extinct");
    } else {
        info!(
            generation = finished,
            population = summary.population,
            eliminated,
            survivors = summary.survivors,
            best_fitness = summary.best_fitness,
            mean_fitness = summary.mean_fitness,
            next_population = next.len(),
            "Generation complete"
        );
    }
    publish_or_log(
        state.sink.as_ref(),
        &finished.to_string(),
        &SimulationEvent::GenerationCompleted {
            summary: summary.clone(),
        },
    );

    let alive: HashSet<AgentId> = next.iter().map(|a| a.id()).collect();
    state.monitor.retain_agents(&alive);
    state.population = next;
    state.generation = next_generation;
    state.ticks_in_generation = 0;

    Ok(GenerationOutcome { summary, report })
}

#[allow(clippy::cast_precision_loss)]
fn mean_fitness(scored: &[ScoredAgent]) -> f64 {
    if scored.is_empty() {
        return 0.0;
    }
    scored.iter().map(|s| s.fitness).sum::<f64>() / scored.len() as f64
}

fn birthplace(parent: &Agent, physics: &WorldPhysics) -> Position {
    let at = parent.state().position();
    let (lo, hi) = (physics.min_bound, physics.max_bound);
    Position::new(
        at.x.clamp(lo.x, hi.x),
        at.y.clamp(lo.y, hi.y),
        at.z.clamp(lo.z, hi.z),
    )
}
