//! Agent spawner for seeding the simulation with its first generation.
//!
//! Every seed agent gets a uniformly random genome and a random free cell
//! within `spawn_radius` of the world origin. Cells outside the world bounds
//! and obstacle cells are never used. The draw is seeded from the world seed
//! so a config reproduces the same starting population.

use evoguard_agents::{Agent, Genome};
use evoguard_core::config::PopulationConfig;
use evoguard_types::Position;
use evoguard_world::WorldPhysics;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

use crate::error::EngineError;

/// Offset of the spawner's RNG stream from the world seed.
const SPAWN_SEED_OFFSET: u64 = 2;

/// Spawn `config.size` generation-zero agents.
pub fn spawn_population(
    config: &PopulationConfig,
    physics: &WorldPhysics,
    obstacles: &[Position],
) -> Result<Vec<Agent>, EngineError> {
    if config.spawn_radius < 0 {
        return Err(EngineError::Spawner {
            message: format!("spawn_radius must be non-negative, got {}", config.spawn_radius),
        });
    }

    let cells = spawn_cells(config.spawn_radius, physics, obstacles);
    if cells.is_empty() && config.size > 0 {
        return Err(EngineError::Spawner {
            message: format!(
                "no free cell within radius {} of the origin",
                config.spawn_radius
            ),
        });
    }

    let mut rng = StdRng::seed_from_u64(physics.seed.wrapping_add(SPAWN_SEED_OFFSET));
    let agents: Vec<Agent> = (0..config.size)
        .map(|_| {
            let position = cells
                .get(rng.random_range(0..cells.len()))
                .copied()
                .unwrap_or(Position::ORIGIN);
            Agent::spawn(Genome::random(&mut rng), position, 0)
        })
        .collect();

    info!(
        agents = agents.len(),
        spawn_radius = config.spawn_radius,
        free_cells = cells.len(),
        "Seed agents spawned"
    );
    Ok(agents)
}

/// Free in-bounds cells within `radius` of the origin, row by row.
fn spawn_cells(radius: i32, physics: &WorldPhysics, obstacles: &[Position]) -> Vec<Position> {
    let z = 0_i32.clamp(physics.min_bound.z, physics.max_bound.z);
    let low = radius.saturating_neg();
    let mut cells = Vec::new();
    for x in low..=radius {
        for y in low..=radius {
            let cell = Position::new(x, y, z);
            if physics.contains(cell) && !obstacles.contains(&cell) {
                cells.push(cell);
            }
        }
    }
    cells
}
