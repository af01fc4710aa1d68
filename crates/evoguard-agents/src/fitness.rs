//! Fitness scoring.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::state::AgentState;

/// Weights of the linear fitness function.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitnessWeights {
    /// Weight applied to remaining energy.
    pub energy: f64,
    /// Weight applied to carried resources.
    pub resources: f64,
}

impl Default for FitnessWeights {
    fn default() -> Self {
        Self {
            energy: 1.0,
            resources: 2.0,
        }
    }
}

impl FitnessWeights {
    /// `energy_weight * energy + resource_weight * resources`.
    ///
    /// Values that do not fit an `f64` count as zero.
    pub fn score(&self, state: &AgentState) -> f64 {
        let energy = state.energy().to_f64().unwrap_or(0.0);
        let resources = state.resources().to_f64().unwrap_or(0.0);
        self.energy.mul_add(energy, self.resources * resources)
    }
}

/// Lossy conversion for metric batches; out-of-range values become zero.
pub fn decimal_to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use evoguard_types::Position;

    use super::*;

    #[test]
    fn default_weights_favor_resources() {
        let state = AgentState::spawn(Position::ORIGIN)
            .with_energy(dec!(50))
            .with_resources(dec!(10));
        let score = FitnessWeights::default().score(&state);
        assert!((score - 70.0).abs() < f64::EPSILON);
    }

    #[test]
    fn zero_weights_score_zero() {
        let weights = FitnessWeights {
            energy: 0.0,
            resources: 0.0,
        };
        assert!(weights.score(&AgentState::spawn(Position::ORIGIN)).abs() < f64::EPSILON);
    }

    #[test]
    fn decimal_conversion() {
        assert!((decimal_to_f64(dec!(2.5)) - 2.5).abs() < f64::EPSILON);
    }
}
