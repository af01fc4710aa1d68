//! Action policies: how an agent picks its action for a tick.
//!
//! The [`ActionPolicy`] trait abstracts the decision mechanism. The default
//! [`GenomePolicy`] is a seeded, genome-driven heuristic:
//!
//! 1. Standing on a non-empty resource: harvest with probability
//!    `harvest_drive`.
//! 2. Energy below the rest threshold: rest.
//! 3. Otherwise move: a random step with probability `exploration`, else a
//!    step towards the target position (or the nearest resource).
//! 4. A cautious agent (probability `caution`) rests instead of moving into
//!    an obstacle or out of bounds. Incautious agents attempt the move and
//!    are caught by the safety constraints.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;

use evoguard_types::Position;
use evoguard_world::EnvironmentSnapshot;

use crate::action::{AgentAction, HARVEST_AMOUNT};
use crate::agent::Agent;
use crate::state::AgentState;

/// Below this energy an agent prefers to rest.
pub const REST_THRESHOLD: Decimal = Decimal::from_parts(20, 0, 0, false, 0);

/// A source of per-tick agent decisions.
pub trait ActionPolicy: Send {
    /// Choose the action `agent` attempts from `state` given the world.
    fn choose(
        &mut self,
        agent: &Agent,
        state: &AgentState,
        world: &EnvironmentSnapshot,
    ) -> AgentAction;
}

/// Seeded genome-driven policy.
#[derive(Debug, Clone)]
pub struct GenomePolicy {
    rng: StdRng,
}

impl GenomePolicy {
    /// Create a policy with a deterministic seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn goal(state: &AgentState, world: &EnvironmentSnapshot) -> Option<Position> {
        world.target_position.or_else(|| {
            world
                .resources
                .iter()
                .filter(|(_, r)| r.quantity > Decimal::ZERO)
                .map(|(p, _)| *p)
                .min_by(|a, b| {
                    state
                        .position()
                        .distance(*a)
                        .total_cmp(&state.position().distance(*b))
                })
        })
    }

    fn random_step(&mut self, from: Position, step: i32) -> Position {
        let low = step.saturating_neg();
        let dx = self.rng.random_range(low..=step);
        let dy = self.rng.random_range(low..=step);
        from.offset(dx, dy, 0)
    }
}

fn step_towards(from: Position, to: Position, step: i32) -> Position {
    let axis = |a: i32, b: i32| b.saturating_sub(a).clamp(step.saturating_neg(), step);
    from.offset(axis(from.x, to.x), axis(from.y, to.y), axis(from.z, to.z))
}

impl ActionPolicy for GenomePolicy {
    fn choose(
        &mut self,
        agent: &Agent,
        state: &AgentState,
        world: &EnvironmentSnapshot,
    ) -> AgentAction {
        let genome = agent.genome();
        let here = state.position();

        let standing_on_resource = world
            .resources
            .get(&here)
            .is_some_and(|r| r.quantity > Decimal::ZERO);
        if standing_on_resource && self.rng.random_bool(genome.harvest_drive.clamp(0.0, 1.0)) {
            return AgentAction::Harvest {
                at: here,
                amount: HARVEST_AMOUNT,
            };
        }

        if state.energy() < REST_THRESHOLD {
            return AgentAction::Rest;
        }

        let step = genome.step_size.max(1);
        let explore = self.rng.random_bool(genome.exploration.clamp(0.0, 1.0));
        let destination = match Self::goal(state, world) {
            Some(goal) if !explore => step_towards(here, goal, step),
            _ => self.random_step(here, step),
        };

        if destination == here {
            return AgentAction::Rest;
        }

        let unsafe_move =
            !world.physics.contains(destination) || world.is_obstacle(destination);
        if unsafe_move && self.rng.random_bool(genome.caution.clamp(0.0, 1.0)) {
            return AgentAction::Rest;
        }

        AgentAction::Move { to: destination }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use evoguard_world::{Environment, WorldPhysics};

    use super::*;
    use crate::genome::Genome;

    fn agent_with(genome: Genome) -> Agent {
        Agent::spawn(genome, Position::ORIGIN, 0)
    }

    #[test]
    fn greedy_harvester_harvests_on_resource() {
        let mut env = Environment::new(WorldPhysics::default());
        env.register_resource(Position::ORIGIN, dec!(10), dec!(1));
        let agent = agent_with(Genome {
            harvest_drive: 1.0,
            ..Genome::default()
        });
        let mut policy = GenomePolicy::new(1);
        let action = policy.choose(&agent, &agent.state(), &env.snapshot());
        assert!(matches!(action, AgentAction::Harvest { at, .. } if at == Position::ORIGIN));
    }

    #[test]
    fn tired_agent_rests() {
        let env = Environment::new(WorldPhysics::default());
        let agent = agent_with(Genome::default());
        let tired = agent.state().with_energy(dec!(5));
        let mut policy = GenomePolicy::new(1);
        assert_eq!(policy.choose(&agent, &tired, &env.snapshot()), AgentAction::Rest);
    }

    #[test]
    fn focused_agent_steps_towards_target() {
        let mut env = Environment::new(WorldPhysics::default());
        env.set_target_position(Some(Position::new(10, -10, 0)));
        let agent = agent_with(Genome {
            exploration: 0.0,
            step_size: 2,
            ..Genome::default()
        });
        let mut policy = GenomePolicy::new(1);
        let action = policy.choose(&agent, &agent.state(), &env.snapshot());
        assert_eq!(
            action,
            AgentAction::Move {
                to: Position::new(2, -2, 0)
            }
        );
    }

    #[test]
    fn fully_cautious_agent_never_walks_into_obstacles() {
        let mut env = Environment::new(WorldPhysics::default());
        env.set_target_position(Some(Position::new(5, 0, 0)));
        env.add_obstacle(Position::new(1, 0, 0));
        let agent = agent_with(Genome {
            exploration: 0.0,
            caution: 1.0,
            ..Genome::default()
        });
        let mut policy = GenomePolicy::new(1);
        assert_eq!(policy.choose(&agent, &agent.state(), &env.snapshot()), AgentAction::Rest);
    }

    #[test]
    fn reckless_agent_attempts_unsafe_move() {
        let mut env = Environment::new(WorldPhysics::default());
        env.set_target_position(Some(Position::new(5, 0, 0)));
        env.add_obstacle(Position::new(1, 0, 0));
        let agent = agent_with(Genome {
            exploration: 0.0,
            caution: 0.0,
            ..Genome::default()
        });
        let mut policy = GenomePolicy::new(1);
        assert_eq!(
            policy.choose(&agent, &agent.state(), &env.snapshot()),
            AgentAction::Move {
                to: Position::new(1, 0, 0)
            }
        );
    }

    #[test]
    fn step_towards_clamps_per_axis() {
        let next = step_towards(Position::ORIGIN, Position::new(1, -7, 0), 3);
        assert_eq!(next, Position::new(1, -3, 0));
    }
}
