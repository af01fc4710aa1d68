//! Safety constraints checked against every attempted action.
//!
//! A constraint inspects the action an agent is about to take, the state it
//! takes it from and the world snapshot of the tick. It returns a
//! [`ViolationRecord`] when the action breaks the rule. The caller stamps
//! the generation and tick and hands the record to the
//! [`SafetyMonitor`](crate::SafetyMonitor).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use evoguard_agents::{Agent, AgentAction, AgentState};
use evoguard_types::{ConstraintType, Severity, ViolationRecord};
use evoguard_world::EnvironmentSnapshot;

/// A rule every attempted action is checked against.
pub trait SafetyConstraint: Send + Sync {
    /// Which rule this is.
    fn constraint_type(&self) -> ConstraintType;

    /// Check `action`, returning a violation if it breaks the rule.
    fn check(
        &self,
        agent: &Agent,
        state: &AgentState,
        action: &AgentAction,
        world: &EnvironmentSnapshot,
    ) -> Option<ViolationRecord>;
}

/// Run every constraint and collect the violations, in constraint order.
pub fn check_all(
    constraints: &[Box<dyn SafetyConstraint>],
    agent: &Agent,
    state: &AgentState,
    action: &AgentAction,
    world: &EnvironmentSnapshot,
) -> Vec<ViolationRecord> {
    constraints
        .iter()
        .filter_map(|c| c.check(agent, state, action, world))
        .collect()
}

// ---------------------------------------------------------------------------
// Built-in constraints
// ---------------------------------------------------------------------------

/// Moving outside the world bounds is critical.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoundaryConstraint;

impl SafetyConstraint for BoundaryConstraint {
    fn constraint_type(&self) -> ConstraintType {
        ConstraintType::Boundary
    }

    fn check(
        &self,
        agent: &Agent,
        _state: &AgentState,
        action: &AgentAction,
        world: &EnvironmentSnapshot,
    ) -> Option<ViolationRecord> {
        let AgentAction::Move { to } = action else {
            return None;
        };
        if world.physics.contains(*to) {
            return None;
        }
        Some(ViolationRecord::new(
            agent.id(),
            self.constraint_type(),
            Severity::Critical,
            action.describe(),
            format!(
                "{to} is outside the world bounds {} .. {}",
                world.physics.min_bound, world.physics.max_bound
            ),
        ))
    }
}

/// Moving into an obstacle is critical.
#[derive(Debug, Clone, Copy, Default)]
pub struct ObstacleConstraint;

impl SafetyConstraint for ObstacleConstraint {
    fn constraint_type(&self) -> ConstraintType {
        ConstraintType::Obstacle
    }

    fn check(
        &self,
        agent: &Agent,
        _state: &AgentState,
        action: &AgentAction,
        world: &EnvironmentSnapshot,
    ) -> Option<ViolationRecord> {
        match action {
            AgentAction::Move { to } if world.is_obstacle(*to) => Some(ViolationRecord::new(
                agent.id(),
                self.constraint_type(),
                Severity::Critical,
                action.describe(),
                format!("{to} is blocked by an obstacle"),
            )),
            _ => None,
        }
    }
}

/// Spending energy below the reserve is a warning.
#[derive(Debug, Clone, Copy)]
pub struct EnergyConstraint {
    /// Energy an agent must keep after acting.
    pub reserve: Decimal,
}

impl SafetyConstraint for EnergyConstraint {
    fn constraint_type(&self) -> ConstraintType {
        ConstraintType::EnergyReserve
    }

    fn check(
        &self,
        agent: &Agent,
        state: &AgentState,
        action: &AgentAction,
        _world: &EnvironmentSnapshot,
    ) -> Option<ViolationRecord> {
        let cost = action.energy_cost(state);
        if cost <= Decimal::ZERO {
            return None;
        }
        let remaining = state.energy().saturating_sub(cost);
        (remaining < self.reserve).then(|| {
            ViolationRecord::new(
                agent.id(),
                self.constraint_type(),
                Severity::Warning,
                action.describe(),
                format!("energy would drop to {remaining}, below reserve {}", self.reserve),
            )
        })
    }
}

/// Harvesting beyond the carry cap.
///
/// Crossing the cap is informational; harvesting while already at or above
/// it is a warning.
#[derive(Debug, Clone, Copy)]
pub struct HoardingConstraint {
    /// Resources an agent may carry.
    pub cap: Decimal,
}

impl SafetyConstraint for HoardingConstraint {
    fn constraint_type(&self) -> ConstraintType {
        ConstraintType::ResourceHoarding
    }

    fn check(
        &self,
        agent: &Agent,
        state: &AgentState,
        action: &AgentAction,
        _world: &EnvironmentSnapshot,
    ) -> Option<ViolationRecord> {
        let AgentAction::Harvest { amount, .. } = action else {
            return None;
        };
        let held = state.resources();
        let severity = if held >= self.cap {
            Severity::Warning
        } else if held.saturating_add(*amount) > self.cap {
            Severity::Info
        } else {
            return None;
        };
        Some(ViolationRecord::new(
            agent.id(),
            self.constraint_type(),
            severity,
            action.describe(),
            format!("holding {held} against a cap of {}", self.cap),
        ))
    }
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Resolved safety parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SafetySettings {
    /// Energy reserve enforced by [`EnergyConstraint`].
    pub energy_reserve: Decimal,
    /// Carry cap enforced by [`HoardingConstraint`].
    pub hoarding_cap: Decimal,
    /// When agents become elimination candidates.
    pub elimination: crate::monitor::EliminationPolicy,
}

impl Default for SafetySettings {
    fn default() -> Self {
        Self {
            energy_reserve: Decimal::TEN,
            hoarding_cap: Decimal::ONE_HUNDRED,
            elimination: crate::monitor::EliminationPolicy::default(),
        }
    }
}

impl SafetySettings {
    /// The built-in constraint set configured by these settings.
    pub fn constraints(&self) -> Vec<Box<dyn SafetyConstraint>> {
        vec![
            Box::new(BoundaryConstraint),
            Box::new(ObstacleConstraint),
            Box::new(EnergyConstraint {
                reserve: self.energy_reserve,
            }),
            Box::new(HoardingConstraint {
                cap: self.hoarding_cap,
            }),
        ]
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use evoguard_agents::Genome;
    use evoguard_types::Position;
    use evoguard_world::{Environment, WorldPhysics};

    use super::*;

    fn setup() -> (Agent, Environment) {
        let mut env = Environment::new(WorldPhysics::default());
        env.add_obstacle(Position::new(1, 0, 0));
        (Agent::spawn(Genome::default(), Position::ORIGIN, 0), env)
    }

    #[test]
    fn out_of_bounds_move_is_critical() {
        let (agent, env) = setup();
        let action = AgentAction::Move {
            to: Position::new(51, 0, 0),
        };
        let v = BoundaryConstraint.check(&agent, &agent.state(), &action, &env.snapshot());
        assert!(matches!(v, Some(ref r) if r.is_critical() && r.constraint == ConstraintType::Boundary));
    }

    #[test]
    fn in_bounds_move_passes_boundary() {
        let (agent, env) = setup();
        let action = AgentAction::Move {
            to: Position::new(2, 2, 0),
        };
        assert!(BoundaryConstraint
            .check(&agent, &agent.state(), &action, &env.snapshot())
            .is_none());
    }

    #[test]
    fn obstacle_move_is_critical() {
        let (agent, env) = setup();
        let action = AgentAction::Move {
            to: Position::new(1, 0, 0),
        };
        let v = ObstacleConstraint.check(&agent, &agent.state(), &action, &env.snapshot());
        assert!(matches!(v, Some(ref r) if r.severity == Severity::Critical));
    }

    #[test]
    fn energy_reserve_warns() {
        let (agent, env) = setup();
        let state = agent.state().with_energy(dec!(12));
        let action = AgentAction::Move {
            to: Position::new(0, 3, 0),
        };
        let rule = EnergyConstraint { reserve: dec!(10) };
        let v = rule.check(&agent, &state, &action, &env.snapshot());
        assert!(matches!(v, Some(ref r) if r.severity == Severity::Warning));
        assert!(rule
            .check(&agent, &state, &AgentAction::Rest, &env.snapshot())
            .is_none());
    }

    #[test]
    fn hoarding_escalates_with_holdings() {
        let (agent, env) = setup();
        let rule = HoardingConstraint { cap: dec!(10) };
        let harvest = AgentAction::Harvest {
            at: Position::ORIGIN,
            amount: dec!(5),
        };
        let snapshot = env.snapshot();
        let under = agent.state().with_resources(dec!(2));
        let crossing = agent.state().with_resources(dec!(8));
        let over = agent.state().with_resources(dec!(10));
        assert!(rule.check(&agent, &under, &harvest, &snapshot).is_none());
        assert!(matches!(
            rule.check(&agent, &crossing, &harvest, &snapshot),
            Some(ref r) if r.severity == Severity::Info
        ));
        assert!(matches!(
            rule.check(&agent, &over, &harvest, &snapshot),
            Some(ref r) if r.severity == Severity::Warning
        ));
    }

    #[test]
    fn default_set_reports_every_broken_rule() {
        let mut env = Environment::new(WorldPhysics::default());
        env.add_obstacle(Position::new(60, 0, 0));
        let agent = Agent::spawn(Genome::default(), Position::ORIGIN, 0);
        let action = AgentAction::Move {
            to: Position::new(60, 0, 0),
        };
        let constraints = SafetySettings::default().constraints();
        let found = check_all(&constraints, &agent, &agent.state(), &action, &env.snapshot());
        let kinds: Vec<ConstraintType> = found.iter().map(|v| v.constraint).collect();
        assert_eq!(kinds, vec![ConstraintType::Boundary, ConstraintType::Obstacle]);
    }
}
