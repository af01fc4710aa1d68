//! Builds the starting environment from the `world` config section.
//!
//! Resource nodes, obstacles, the optional target cell and the initial
//! environmental factors are registered in config order, then the first
//! snapshot is published so policies never observe an empty world.

use evoguard_core::config::WorldConfig;
use evoguard_world::{Environment, WorldPhysics};
use tracing::info;

/// Create an environment populated from `config`.
pub fn build_environment(config: &WorldConfig, physics: WorldPhysics) -> Environment {
    let mut env = Environment::new(physics);

    for node in &config.resources {
        env.register_resource(node.position, node.quantity, node.regeneration_rate);
    }
    for obstacle in &config.obstacles {
        env.add_obstacle(*obstacle);
    }
    env.set_target_position(config.target);
    for (name, value) in &config.factors {
        env.set_environmental_factor(name, *value);
    }
    env.publish();

    let snapshot = env.snapshot();
    info!(
        seed = physics.seed,
        resource_nodes = config.resources.len(),
        obstacles = config.obstacles.len(),
        total_resources = %snapshot.total_resources(),
        target = ?config.target,
        "Starting world created"
    );
    env
}

#[cfg(test)]
mod tests {
    use evoguard_core::config::ResourceConfig;
    use evoguard_types::Position;
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn registers_every_configured_feature() {
        let config = WorldConfig {
            resources: vec![ResourceConfig {
                position: Position::new(2, 3, 0),
                quantity: dec!(40),
                regeneration_rate: dec!(2),
            }],
            obstacles: vec![Position::new(1, 1, 0)],
            target: Some(Position::new(5, 5, 0)),
            ..WorldConfig::default()
        };
        let env = build_environment(&config, WorldPhysics::default());

        assert_eq!(
            env.resource(Position::new(2, 3, 0)).map(|r| r.quantity),
            Some(dec!(40))
        );
        let published = env.reader().latest();
        assert!(published.is_obstacle(Position::new(1, 1, 0)));
        assert_eq!(published.total_resources(), dec!(40));
        assert_eq!(published.target_position, Some(Position::new(5, 5, 0)));
        assert!(published.factor("temperature").is_some());
    }
}
