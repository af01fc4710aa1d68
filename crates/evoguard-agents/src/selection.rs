//! Survivor selection.
//!
//! Turns a fitness-scored population into a survivor set using one of four
//! [`SelectionStrategy`] variants. Selection borrows the population and
//! returns references into it; the input is never reordered or mutated.
//! Tournament and Roulette sample with replacement, so the result may hold
//! the same candidate more than once.

use std::sync::Arc;

use rand::Rng;
use serde::{Deserialize, Serialize};

use evoguard_types::{AgentId, SelectionStrategy};

use crate::agent::Agent;
use crate::error::SelectionError;

/// Added to every shifted roulette weight so all weights are strictly
/// positive.
pub const ROULETTE_EPSILON: f64 = 1e-6;

/// Anything the selection engine can rank.
pub trait Candidate {
    /// Fitness score; higher is better.
    fn fitness(&self) -> f64;
    /// Safety violations recorded against this candidate.
    fn violation_count(&self) -> u64;
}

/// An agent paired with the score it was ranked by.
#[derive(Debug, Clone)]
pub struct ScoredAgent {
    /// The scored agent.
    pub agent: Arc<Agent>,
    /// Fitness at scoring time.
    pub fitness: f64,
    /// Violations recorded against the agent.
    pub violations: u64,
}

impl ScoredAgent {
    /// The scored agent's id.
    pub fn id(&self) -> AgentId {
        self.agent.id()
    }
}

impl Candidate for ScoredAgent {
    fn fitness(&self) -> f64 {
        self.fitness
    }

    fn violation_count(&self) -> u64 {
        self.violations
    }
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Resolved selection parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionSettings {
    /// Which algorithm picks survivors.
    pub strategy: SelectionStrategy,
    /// Number of survivor slots to fill.
    pub survivor_count: usize,
    /// Tournament sample size. A sample covering the population makes every
    /// slot the population maximum.
    pub tournament_size: usize,
    /// Top agents copied unchanged into the next generation.
    pub elitism_count: usize,
    /// Fitness deducted per violation under `SafetyAware`.
    pub safety_penalty: f64,
}

impl Default for SelectionSettings {
    fn default() -> Self {
        Self {
            strategy: SelectionStrategy::SafetyAware,
            survivor_count: 10,
            tournament_size: 3,
            elitism_count: 2,
            safety_penalty: 10.0,
        }
    }
}

impl SelectionSettings {
    /// Reject settings that cannot produce a survivor set.
    pub fn validate(&self) -> Result<(), SelectionError> {
        if self.survivor_count == 0 {
            return Err(SelectionError::InvalidConfiguration {
                reason: "survivor_count must be positive".to_owned(),
            });
        }
        if self.tournament_size == 0 {
            return Err(SelectionError::InvalidConfiguration {
                reason: "tournament_size must be positive".to_owned(),
            });
        }
        if !self.safety_penalty.is_finite() || self.safety_penalty < 0.0 {
            return Err(SelectionError::InvalidConfiguration {
                reason: format!(
                    "safety_penalty must be finite and non-negative, got {}",
                    self.safety_penalty
                ),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Pick survivors from `population` according to `settings`.
///
/// An empty population yields an empty survivor set.
pub fn select<'a, C, R>(
    population: &'a [C],
    settings: &SelectionSettings,
    rng: &mut R,
) -> Result<Vec<&'a C>, SelectionError>
where
    C: Candidate,
    R: Rng + ?Sized,
{
    settings.validate()?;
    if population.is_empty() {
        return Ok(Vec::new());
    }

    let survivors = match settings.strategy {
        SelectionStrategy::Tournament => {
            tournament(population, settings.survivor_count, settings.tournament_size, rng)
        }
        SelectionStrategy::Roulette => roulette(population, settings.survivor_count, rng),
        SelectionStrategy::Elitism => ranked(population, settings.survivor_count, rank_key),
        SelectionStrategy::SafetyAware => {
            let penalty = settings.safety_penalty;
            ranked(population, settings.survivor_count, |c| {
                rank_key(c) - penalty * violations_f64(c.violation_count())
            })
        }
    };

    tracing::debug!(
        strategy = ?settings.strategy,
        population = population.len(),
        survivors = survivors.len(),
        "Selection complete"
    );
    Ok(survivors)
}

/// NaN fitness ranks below everything else.
fn rank_key<C: Candidate>(candidate: &C) -> f64 {
    let fitness = candidate.fitness();
    if fitness.is_nan() {
        f64::NEG_INFINITY
    } else {
        fitness
    }
}

#[allow(clippy::cast_precision_loss)]
fn violations_f64(count: u64) -> f64 {
    count as f64
}

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

fn tournament<'a, C, R>(
    population: &'a [C],
    slots: usize,
    tournament_size: usize,
    rng: &mut R,
) -> Vec<&'a C>
where
    C: Candidate,
    R: Rng + ?Sized,
{
    let sample_size = tournament_size.max(1);

    // The sample covers the population: hold the tournament over everyone.
    if sample_size >= population.len() {
        let champion = strongest(population.iter());
        return champion.map(|c| vec![c; slots]).unwrap_or_default();
    }

    (0..slots)
        .filter_map(|_| {
            let entrants = (0..sample_size)
                .filter_map(|_| population.get(rng.random_range(0..population.len())));
            strongest(entrants)
        })
        .collect()
}

/// First candidate with the strictly greatest fitness.
fn strongest<'a, C, I>(entrants: I) -> Option<&'a C>
where
    C: Candidate + 'a,
    I: Iterator<Item = &'a C>,
{
    entrants.fold(None, |best: Option<&'a C>, entrant| match best {
        Some(current) if rank_key(entrant) <= rank_key(current) => Some(current),
        _ => Some(entrant),
    })
}

fn roulette<'a, C, R>(population: &'a [C], slots: usize, rng: &mut R) -> Vec<&'a C>
where
    C: Candidate,
    R: Rng + ?Sized,
{
    let min_fitness = population
        .iter()
        .map(Candidate::fitness)
        .filter(|f| f.is_finite())
        .fold(f64::INFINITY, f64::min);
    let shift = if min_fitness.is_finite() {
        (-min_fitness).max(0.0)
    } else {
        0.0
    };

    let weights: Vec<f64> = population
        .iter()
        .map(|c| {
            let fitness = c.fitness();
            if fitness.is_finite() {
                fitness + shift + ROULETTE_EPSILON
            } else {
                ROULETTE_EPSILON
            }
        })
        .collect();
    let total: f64 = weights.iter().sum();

    if !(total.is_finite() && total > 0.0) {
        tracing::warn!(total, "Roulette weights unusable, sampling uniformly");
        return (0..slots)
            .filter_map(|_| population.get(rng.random_range(0..population.len())))
            .collect();
    }

    (0..slots)
        .filter_map(|_| {
            let draw = rng.random_range(0.0..total);
            let mut running = 0.0;
            let index = weights
                .iter()
                .position(|w| {
                    running += w;
                    running >= draw
                })
                .unwrap_or(population.len().saturating_sub(1));
            population.get(index)
        })
        .collect()
}

/// Stable descending sort by `key`, then take the top `slots`.
fn ranked<C, F>(population: &[C], slots: usize, key: F) -> Vec<&C>
where
    F: Fn(&C) -> f64,
{
    let mut order: Vec<(&C, f64)> = population.iter().map(|c| (c, key(c))).collect();
    order.sort_by(|a, b| b.1.total_cmp(&a.1));
    order.into_iter().take(slots).map(|(c, _)| c).collect()
}
