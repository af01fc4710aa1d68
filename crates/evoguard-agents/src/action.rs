//! Actions an agent can attempt in one tick, with their energy costs.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use evoguard_types::Position;

use crate::state::AgentState;

/// Energy spent per unit of distance moved.
pub const MOVE_COST_PER_UNIT: Decimal = Decimal::ONE;

/// Energy spent on a harvest attempt.
pub const HARVEST_COST: Decimal = Decimal::TWO;

/// Energy regained by resting.
pub const REST_GAIN: Decimal = Decimal::from_parts(5, 0, 0, false, 0);

/// Resources requested by a single harvest.
pub const HARVEST_AMOUNT: Decimal = Decimal::from_parts(5, 0, 0, false, 0);

/// An action chosen by an agent's policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AgentAction {
    /// Move from the current cell to `to`.
    Move {
        /// Destination cell.
        to: Position,
    },
    /// Harvest up to `amount` units at `at`.
    Harvest {
        /// Cell holding the resource.
        at: Position,
        /// Units requested.
        amount: Decimal,
    },
    /// Stay put and regain energy.
    Rest,
}

impl AgentAction {
    /// Energy this action costs when taken from `state`. Resting costs
    /// nothing.
    pub fn energy_cost(&self, state: &AgentState) -> Decimal {
        match self {
            Self::Move { to } => {
                let distance = Decimal::try_from(state.position().distance(*to))
                    .unwrap_or(Decimal::ZERO)
                    .round_dp(2);
                distance.saturating_mul(MOVE_COST_PER_UNIT)
            }
            Self::Harvest { .. } => HARVEST_COST,
            Self::Rest => Decimal::ZERO,
        }
    }

    /// Human-readable description used in operation logs and violations.
    pub fn describe(&self) -> String {
        match self {
            Self::Move { to } => format!("move to {to}"),
            Self::Harvest { at, amount } => format!("harvest {amount} at {at}"),
            Self::Rest => "rest".to_owned(),
        }
    }

    /// Return the state after this action, given the resources actually
    /// `harvested` from the world (ignored for non-harvest actions).
    #[must_use]
    pub fn apply(&self, state: &AgentState, harvested: Decimal) -> AgentState {
        match self {
            Self::Move { to } => state.spend_energy(self.energy_cost(state)).with_position(*to),
            Self::Harvest { .. } => state
                .spend_energy(HARVEST_COST)
                .add_resources(harvested),
            Self::Rest => state.gain_energy(REST_GAIN),
        }
    }
}
