//! The immutable per-agent state value.
//!
//! An [`AgentState`] is never edited in place. Every mutator consumes or
//! borrows the current value and returns a new one; the owning [`Agent`]
//! swaps the new value in atomically.
//!
//! [`Agent`]: crate::agent::Agent

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use evoguard_types::Position;

/// Energy every agent is spawned with.
pub const SPAWN_ENERGY: Decimal = Decimal::ONE_HUNDRED;

/// Snapshot of an agent's physical and internal condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    position: Position,
    energy: Decimal,
    resources: Decimal,
    sensors: BTreeMap<String, f64>,
    internal: BTreeMap<String, f64>,
}

impl AgentState {
    /// State of a freshly spawned agent: full energy, no resources.
    pub const fn spawn(position: Position) -> Self {
        Self {
            position,
            energy: SPAWN_ENERGY,
            resources: Decimal::ZERO,
            sensors: BTreeMap::new(),
            internal: BTreeMap::new(),
        }
    }

    /// Current grid position.
    pub const fn position(&self) -> Position {
        self.position
    }

    /// Current energy (never negative).
    pub const fn energy(&self) -> Decimal {
        self.energy
    }

    /// Resources carried (never negative).
    pub const fn resources(&self) -> Decimal {
        self.resources
    }

    /// Latest sensor readings.
    pub const fn sensors(&self) -> &BTreeMap<String, f64> {
        &self.sensors
    }

    /// Internal-state scalars.
    pub const fn internal(&self) -> &BTreeMap<String, f64> {
        &self.internal
    }

    /// Read one sensor.
    pub fn sensor(&self, key: &str) -> Option<f64> {
        self.sensors.get(key).copied()
    }

    /// Read one internal scalar.
    pub fn internal_value(&self, key: &str) -> Option<f64> {
        self.internal.get(key).copied()
    }

    /// Return the state moved to `position`.
    #[must_use]
    pub fn with_position(&self, position: Position) -> Self {
        Self {
            position,
            ..self.clone()
        }
    }

    /// Return the state with energy set (clamped to be non-negative).
    #[must_use]
    pub fn with_energy(&self, energy: Decimal) -> Self {
        Self {
            energy: energy.max(Decimal::ZERO),
            ..self.clone()
        }
    }

    /// Return the state with carried resources set (clamped to be
    /// non-negative).
    #[must_use]
    pub fn with_resources(&self, resources: Decimal) -> Self {
        Self {
            resources: resources.max(Decimal::ZERO),
            ..self.clone()
        }
    }

    /// Return the state with `amount` energy removed, floored at zero.
    #[must_use]
    pub fn spend_energy(&self, amount: Decimal) -> Self {
        self.with_energy(self.energy.saturating_sub(amount))
    }

    /// Return the state with `amount` energy added.
    #[must_use]
    pub fn gain_energy(&self, amount: Decimal) -> Self {
        self.with_energy(self.energy.saturating_add(amount))
    }

    /// Return the state carrying `amount` more resources.
    #[must_use]
    pub fn add_resources(&self, amount: Decimal) -> Self {
        self.with_resources(self.resources.saturating_add(amount))
    }

    /// Return the state with one sensor reading replaced. Blank keys leave
    /// the state unchanged.
    #[must_use]
    pub fn with_sensor(&self, key: &str, value: f64) -> Self {
        let mut next = self.clone();
        let key = key.trim();
        if !key.is_empty() {
            next.sensors.insert(key.to_owned(), value);
        }
        next
    }

    /// Return the state with one internal scalar replaced. Blank keys leave
    /// the state unchanged.
    #[must_use]
    pub fn with_internal(&self, key: &str, value: f64) -> Self {
        let mut next = self.clone();
        let key = key.trim();
        if !key.is_empty() {
            next.internal.insert(key.to_owned(), value);
        }
        next
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn spawn_defaults() {
        let state = AgentState::spawn(Position::new(1, 2, 3));
        assert_eq!(state.energy(), dec!(100));
        assert_eq!(state.resources(), Decimal::ZERO);
        assert_eq!(state.position(), Position::new(1, 2, 3));
        assert!(state.sensors().is_empty());
    }

    #[test]
    fn mutators_return_new_values() {
        let original = AgentState::spawn(Position::ORIGIN);
        let moved = original.with_position(Position::new(1, 0, 0));
        assert_eq!(original.position(), Position::ORIGIN);
        assert_eq!(moved.position(), Position::new(1, 0, 0));
    }

    #[test]
    fn energy_and_resources_never_go_negative() {
        let state = AgentState::spawn(Position::ORIGIN)
            .spend_energy(dec!(250))
            .with_resources(dec!(-3));
        assert_eq!(state.energy(), Decimal::ZERO);
        assert_eq!(state.resources(), Decimal::ZERO);
    }

    #[test]
    fn blank_sensor_keys_are_ignored() {
        let state = AgentState::spawn(Position::ORIGIN)
            .with_sensor("", 1.0)
            .with_sensor("light", 0.25)
            .with_internal(" ", 9.0)
            .with_internal("hunger", 0.5);
        assert_eq!(state.sensors().len(), 1);
        assert_eq!(state.sensor("light"), Some(0.25));
        assert_eq!(state.internal().len(), 1);
        assert_eq!(state.internal_value("hunger"), Some(0.5));
    }
}
