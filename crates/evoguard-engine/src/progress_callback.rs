//! Tick callback that reports run progress through `tracing`.
//!
//! Rolled-back ticks are logged as they happen, a progress line is emitted
//! every `log_every` ticks, and every generation turnover gets one line with
//! its fitness figures and detected behaviors.

use evoguard_core::{GenerationOutcome, SimulationState, TickCallback, TickSummary};
use evoguard_types::SignalType;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

/// Callback that logs tick and generation progress.
pub struct ProgressCallback {
    log_every: u64,
    rolled_back: u64,
    compensation_failures: usize,
    harvested: Decimal,
}

impl ProgressCallback {
    /// Create a callback that logs a progress line every `log_every` ticks.
    /// Zero disables the periodic line.
    pub const fn new(log_every: u64) -> Self {
        Self {
            log_every,
            rolled_back: 0,
            compensation_failures: 0,
            harvested: Decimal::ZERO,
        }
    }

    /// Ticks rolled back so far.
    pub const fn rolled_back(&self) -> u64 {
        self.rolled_back
    }

    /// Resources kept by agents across all committed ticks.
    pub const fn harvested(&self) -> Decimal {
        self.harvested
    }
}

impl TickCallback for ProgressCallback {
    fn on_tick(&mut self, summary: &TickSummary, sim: &SimulationState) {
        self.harvested = self.harvested.saturating_add(summary.harvested);

        if summary.rolled_back {
            self.rolled_back = self.rolled_back.saturating_add(1);
            self.compensation_failures = self
                .compensation_failures
                .saturating_add(summary.compensation_failures);
            warn!(
                tick = summary.tick,
                generation = summary.generation,
                transaction_id = %summary.transaction_id,
                critical = summary.critical,
                compensation_failures = summary.compensation_failures,
                "Tick rolled back"
            );
        } else {
            debug!(
                tick = summary.tick,
                moves = summary.moves,
                harvests = summary.harvests,
                rests = summary.rests,
                violations = summary.violations,
                "Tick committed"
            );
        }

        if self.log_every > 0 && summary.tick % self.log_every == 0 {
            info!(
                tick = summary.tick,
                generation = summary.generation,
                population = sim.population.len(),
                rolled_back = self.rolled_back,
                compensation_failures = self.compensation_failures,
                harvested = %self.harvested,
                total_violations = sim.monitor.total_violations(),
                "Simulation progress"
            );
        }
    }

    fn on_generation(&mut self, outcome: &GenerationOutcome, sim: &SimulationState) {
        let detected: Vec<SignalType> = outcome
            .report
            .detected()
            .map(|s| s.signal_type)
            .collect();
        if outcome.is_extinct() {
            warn!(
                generation = outcome.summary.generation,
                eliminated = outcome.summary.eliminated,
                "Generation left no offspring"
            );
        } else {
            info!(
                finished = outcome.summary.generation,
                next = sim.generation,
                survivors = outcome.summary.survivors,
                eliminated = outcome.summary.eliminated,
                best_fitness = outcome.summary.best_fitness,
                detected = ?detected,
                "Generation turnover"
            );
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use evoguard_core::SimulationConfig;
    use evoguard_events::MemorySink;
    use evoguard_types::TransactionId;
    use evoguard_world::Environment;
    use rust_decimal_macros::dec;

    use super::*;

    fn summary(tick: u64, rolled_back: bool, harvested: Decimal) -> TickSummary {
        TickSummary {
            tick,
            generation: 0,
            transaction_id: TransactionId::new(),
            agents: 2,
            moves: 1,
            harvests: 1,
            rests: 0,
            violations: u64::from(rolled_back),
            critical: usize::from(rolled_back),
            rolled_back,
            compensation_failures: 0,
            harvested,
        }
    }

    #[test]
    fn tallies_rollbacks_and_harvests() {
        let settings = SimulationConfig::default().validate().unwrap();
        let state = SimulationState::new(
            Environment::new(settings.physics),
            Vec::new(),
            &settings,
            8,
            Arc::new(MemorySink::new()),
        );
        let mut callback = ProgressCallback::new(2);

        callback.on_tick(&summary(1, false, dec!(3)), &state);
        callback.on_tick(&summary(2, true, Decimal::ZERO), &state);
        callback.on_tick(&summary(3, false, dec!(1.5)), &state);

        assert_eq!(callback.rolled_back(), 1);
        assert_eq!(callback.harvested(), dec!(4.5));
    }
}
