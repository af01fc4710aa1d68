//! Position-bound resource nodes with fixed-rate regeneration.
//!
//! Each [`Resource`] holds a current `quantity` and a `regeneration_rate`,
//! both non-negative [`Decimal`] values. Regeneration is additive and exact:
//! after `n` ticks a node has grown by exactly `n * regeneration_rate`.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A harvestable resource node in the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    /// Units currently available. Never negative.
    pub quantity: Decimal,
    /// Units added per tick. Never negative.
    pub regeneration_rate: Decimal,
}

impl Resource {
    /// Create a resource node, clamping both values to be non-negative.
    pub fn new(quantity: Decimal, regeneration_rate: Decimal) -> Self {
        Self {
            quantity: quantity.max(Decimal::ZERO),
            regeneration_rate: regeneration_rate.max(Decimal::ZERO),
        }
    }

    /// Return the node after one tick of regeneration.
    #[must_use]
    pub fn regenerated(self) -> Self {
        Self {
            quantity: self.quantity.saturating_add(self.regeneration_rate),
            ..self
        }
    }

    /// Take up to `requested` units, returning the node afterwards and the
    /// amount actually taken.
    ///
    /// Negative requests take nothing.
    #[must_use]
    pub fn harvest(self, requested: Decimal) -> (Self, Decimal) {
        let taken = requested.max(Decimal::ZERO).min(self.quantity);
        let remaining = self.quantity.saturating_sub(taken).max(Decimal::ZERO);
        (
            Self {
                quantity: remaining,
                ..self
            },
            taken,
        )
    }

    /// Return the node with `amount` units added back (negative amounts are
    /// ignored).
    #[must_use]
    pub fn deposited(self, amount: Decimal) -> Self {
        Self {
            quantity: self.quantity.saturating_add(amount.max(Decimal::ZERO)),
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn negative_inputs_are_clamped() {
        let node = Resource::new(dec!(-5), dec!(-1));
        assert_eq!(node.quantity, Decimal::ZERO);
        assert_eq!(node.regeneration_rate, Decimal::ZERO);
    }

    #[test]
    fn regeneration_is_exact() {
        let mut node = Resource::new(dec!(10), dec!(0.1));
        for _ in 0..30 {
            node = node.regenerated();
        }
        assert_eq!(node.quantity, dec!(13.0));
    }

    #[test]
    fn harvest_takes_at_most_available() {
        let node = Resource::new(dec!(4), dec!(1));
        let (after, taken) = node.harvest(dec!(10));
        assert_eq!(taken, dec!(4));
        assert_eq!(after.quantity, Decimal::ZERO);

        let (after, taken) = node.harvest(dec!(1.5));
        assert_eq!(taken, dec!(1.5));
        assert_eq!(after.quantity, dec!(2.5));
    }

    #[test]
    fn harvest_then_deposit_restores_quantity() {
        let node = Resource::new(dec!(8), dec!(1));
        let (after, taken) = node.harvest(dec!(3));
        assert_eq!(after.deposited(taken), node);
    }
}
