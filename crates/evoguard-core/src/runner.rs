//! Simulation loop runner.
//!
//! [`run_simulation`] drives the tick loop and generation turnover with
//! support for:
//!
//! - **Bounded simulation**: stop after `max_ticks` ticks or
//!   `max_generations` completed generations
//! - **Tick pacing**: optional real-time sleep between ticks
//! - **Extinction**: stop when a turnover leaves no agents
//! - **Shutdown**: stop cleanly when the shutdown channel flips to `true`

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{info, warn};

use evoguard_events::GenerationSummary;
use evoguard_observer::BehaviorReport;

use crate::config::SimulationBoundsConfig;
use crate::generation::{self, GenerationOutcome};
use crate::tick::{self, SimulationState, TickError, TickSummary};

/// Errors that can occur during the simulation run.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// A tick or turnover failed.
    #[error("tick error: {source}")]
    Tick {
        /// The underlying tick error.
        #[from]
        source: TickError,
    },
}

/// Why the run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimulationEndReason {
    /// The tick limit was reached.
    MaxTicksReached,
    /// The generation limit was reached.
    MaxGenerationsReached,
    /// No agent was left to act.
    Extinction,
    /// A shutdown was requested.
    Shutdown,
}

/// Limits and pacing for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunLimits {
    /// Stop after this many ticks. 0 means no tick limit.
    pub max_ticks: u64,
    /// Stop after this many completed generations. 0 means no limit.
    pub max_generations: u64,
    /// Real-time milliseconds to sleep between ticks.
    pub tick_interval_ms: u64,
}

impl From<&SimulationBoundsConfig> for RunLimits {
    fn from(bounds: &SimulationBoundsConfig) -> Self {
        Self {
            max_ticks: bounds.max_ticks,
            max_generations: bounds.max_generations,
            tick_interval_ms: bounds.tick_interval_ms,
        }
    }
}

impl RunLimits {
    const fn ticks_reached(&self, ticks: u64) -> bool {
        self.max_ticks > 0 && ticks >= self.max_ticks
    }

    const fn generations_reached(&self, generations: u64) -> bool {
        self.max_generations > 0 && generations >= self.max_generations
    }
}

/// Result of the simulation run.
#[derive(Debug)]
pub struct SimulationResult {
    /// The reason the simulation ended.
    pub end_reason: SimulationEndReason,
    /// The last tick summary, if any tick completed.
    pub final_summary: Option<TickSummary>,
    /// Total number of ticks executed.
    pub total_ticks: u64,
    /// Ticks whose effects were rolled back.
    pub rolled_back_ticks: u64,
    /// One summary per completed generation, oldest first.
    pub generations: Vec<GenerationSummary>,
    /// Behavior report of the last completed generation.
    pub last_report: Option<BehaviorReport>,
}

/// Hooks invoked by the runner.
///
/// Implementations can use this to forward summaries to dashboards, record
/// them in tests, etc.
pub trait TickCallback: Send {
    /// Called after a tick completes successfully.
    fn on_tick(&mut self, summary: &TickSummary, state: &SimulationState);

    /// Called after a generation turnover.
    fn on_generation(&mut self, _outcome: &GenerationOutcome, _state: &SimulationState) {}
}

/// A no-op tick callback for testing.
pub struct NoOpCallback;

impl TickCallback for NoOpCallback {
    fn on_tick(&mut self, _summary: &TickSummary, _state: &SimulationState) {}
}

/// Run the simulation loop until a termination condition is met.
///
/// Generation turnover happens after the tick that completes a generation,
/// before the limits are checked, so a run bounded by `max_ticks` that lands
/// on a generation boundary still reports that generation.
///
/// `shutdown` is polled before every tick; a `true` value stops the run.
pub async fn run_simulation(
    state: &mut SimulationState,
    limits: RunLimits,
    callback: &mut dyn TickCallback,
    shutdown: Option<watch::Receiver<bool>>,
) -> Result<SimulationResult, RunnerError> {
    let mut result = SimulationResult {
        end_reason: SimulationEndReason::Extinction,
        final_summary: None,
        total_ticks: 0,
        rolled_back_ticks: 0,
        generations: Vec::new(),
        last_report: None,
    };

    info!(
        max_ticks = limits.max_ticks,
        max_generations = limits.max_generations,
        tick_interval_ms = limits.tick_interval_ms,
        population = state.population.len(),
        "Simulation starting"
    );

    loop {
        // --- Check shutdown (before tick) ---
        if shutdown.as_ref().is_some_and(|rx| *rx.borrow()) {
            info!("Shutdown requested");
            result.end_reason = SimulationEndReason::Shutdown;
            return Ok(result);
        }

        // --- Check extinction (before tick) ---
        if state.population.is_empty() {
            info!(generation = state.generation, "No agents left -- extinction");
            result.end_reason = SimulationEndReason::Extinction;
            return Ok(result);
        }

        // --- Execute tick ---
        let summary = tick::run_tick(state)?;
        result.total_ticks = result.total_ticks.saturating_add(1);
        if summary.rolled_back {
            result.rolled_back_ticks = result.rolled_back_ticks.saturating_add(1);
        }
        callback.on_tick(&summary, state);
        result.final_summary = Some(summary);

        // --- Generation turnover ---
        if state.generation_due() {
            let outcome = generation::advance_generation(state)?;
            callback.on_generation(&outcome, state);
            result.generations.push(outcome.summary);
            result.last_report = Some(outcome.report);

            if limits.generations_reached(state.generation) {
                info!(
                    generations = state.generation,
                    max_generations = limits.max_generations,
                    "Generation limit reached"
                );
                result.end_reason = SimulationEndReason::MaxGenerationsReached;
                return Ok(result);
            }
        }

        // --- Check tick limit (after tick) ---
        if limits.ticks_reached(result.total_ticks) {
            info!(
                total_ticks = result.total_ticks,
                max_ticks = limits.max_ticks,
                "Tick limit reached"
            );
            result.end_reason = SimulationEndReason::MaxTicksReached;
            return Ok(result);
        }

        // --- Sleep for tick interval ---
        if limits.tick_interval_ms > 0 {
            tokio::time::sleep(tokio::time::Duration::from_millis(limits.tick_interval_ms)).await;
        }
    }
}

/// Log the simulation end sequence.
pub fn log_simulation_end(result: &SimulationResult) {
    info!(
        reason = ?result.end_reason,
        total_ticks = result.total_ticks,
        rolled_back_ticks = result.rolled_back_ticks,
        generations = result.generations.len(),
        final_tick = result.final_summary.as_ref().map(|s| s.tick),
        "Simulation ended"
    );

    if let Some(last) = result.generations.last() {
        info!(
            generation = last.generation,
            population = last.population,
            eliminated = last.eliminated,
            best_fitness = last.best_fitness,
            mean_fitness = last.mean_fitness,
            "Final generation summary"
        );
    } else {
        warn!("Simulation ended before any generation completed");
    }

    if let Some(report) = &result.last_report {
        report.log();
    }
}
