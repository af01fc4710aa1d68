//! Simulation binary for EvoGuard.
//!
//! Wires together the configuration, the starting world, the seed
//! population, the event bus and the transactional tick loop, then runs
//! the simulation until a limit is reached, the population dies out, or
//! the operator presses Ctrl-C.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `evoguard-config.yaml` (or `EVOGUARD_CONFIG`)
//! 2. Initialize structured logging (tracing)
//! 3. Validate the configuration into resolved settings
//! 4. Create the starting world
//! 5. Spawn the seed population
//! 6. Start the event logger on the broadcast bus
//! 7. Install the Ctrl-C shutdown handler
//! 8. Run the simulation loop
//! 9. Log the result and drain the event logger

mod error;
mod event_log;
mod progress_callback;
mod spawner;
mod world;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use evoguard_core::config::LogFormat;
use evoguard_core::runner::{self, RunLimits};
use evoguard_core::{SimulationConfig, SimulationState};
use evoguard_events::BroadcastSink;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;
use crate::progress_callback::ProgressCallback;

/// Environment variable naming the config file.
const CONFIG_ENV: &str = "EVOGUARD_CONFIG";

/// Config file used when `EVOGUARD_CONFIG` is unset.
const DEFAULT_CONFIG_PATH: &str = "evoguard-config.yaml";

/// Ticks between progress lines.
const PROGRESS_EVERY: u64 = 100;

/// Application entry point.
///
/// # Errors
///
/// Returns an error if any initialization step or the simulation itself fails.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Load configuration.
    let config_path = std::env::var_os(CONFIG_ENV)
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
    let (config, loaded_from_file) = load_config(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    // 2. Initialize structured logging.
    init_tracing(&config.logging.level, config.logging.format);
    if loaded_from_file {
        info!(path = %config_path.display(), "Configuration loaded");
    } else {
        warn!(
            path = %config_path.display(),
            "Config file not found, using defaults"
        );
    }

    // 3. Validate.
    let settings = config
        .validate()
        .map_err(EngineError::from)
        .context("validating configuration")?;
    info!(
        seed = settings.physics.seed,
        population = config.population.size,
        strategy = ?settings.selection.strategy,
        ticks_per_generation = settings.evolution.ticks_per_generation,
        max_generations = config.simulation.max_generations,
        max_ticks = config.simulation.max_ticks,
        "Configuration validated"
    );

    // 4. Starting world.
    let environment = world::build_environment(&config.world, settings.physics);

    // 5. Seed population.
    let population =
        spawner::spawn_population(&config.population, &settings.physics, &config.world.obstacles)
            .context("spawning seed population")?;

    // 6. Event bus and logger.
    let bus = BroadcastSink::new();
    let event_logger = event_log::spawn_event_logger(&bus);

    let mut state = SimulationState::new(
        environment,
        population,
        &settings,
        config.simulation.metrics_window,
        Arc::new(bus),
    );

    // 7. Ctrl-C flips the shutdown channel; the loop checks it before every tick.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received, stopping after the current tick");
            let _ = shutdown_tx.send(true);
        }
    });

    // 8. Run.
    let mut callback = ProgressCallback::new(PROGRESS_EVERY);
    let result = runner::run_simulation(
        &mut state,
        RunLimits::from(&config.simulation),
        &mut callback,
        Some(shutdown_rx),
    )
    .await
    .map_err(EngineError::from)
    .context("running simulation")?;

    // 9. Report.
    runner::log_simulation_end(&result);
    info!(
        harvested = %callback.harvested(),
        rolled_back = callback.rolled_back(),
        total_violations = state.monitor.total_violations(),
        critical_violations = state.monitor.critical_violations(),
        "Run totals"
    );

    // Dropping the state drops the last sender, which ends the logger task.
    drop(state);
    match event_logger.await {
        Ok(tally) => info!(events = ?tally, "Event totals"),
        Err(e) => warn!(error = %e, "Event logger task failed"),
    }

    Ok(())
}

/// Load the config file, or fall back to defaults when it does not exist.
///
/// Returns the config and whether it came from the file.
fn load_config(path: &Path) -> Result<(SimulationConfig, bool), EngineError> {
    if path.exists() {
        Ok((SimulationConfig::from_file(path)?, true))
    } else {
        Ok((SimulationConfig::default(), false))
    }
}

/// Install the global subscriber. `RUST_LOG` overrides the configured level.
fn init_tracing(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .json()
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_falls_back_to_defaults() {
        let loaded = load_config(Path::new("does-not-exist.yaml"));
        assert!(matches!(loaded, Ok((ref c, false)) if *c == SimulationConfig::default()));
    }
}
