//! Configuration loading and typed config structures for the EvoGuard
//! simulation.
//!
//! The canonical configuration lives in `evoguard-config.yaml` at the project
//! root. The structs here mirror the YAML layout; [`SimulationConfig::validate`]
//! resolves them into the value objects the simulation core consumes.

use std::collections::BTreeMap;
use std::path::Path;

use rust_decimal::Decimal;
use serde::Deserialize;

use evoguard_agents::{FitnessWeights, SelectionError, SelectionSettings};
use evoguard_safety::{EliminationPolicy, SafetySettings};
use evoguard_types::{Position, SelectionStrategy};
use evoguard_world::WorldPhysics;

use crate::generation::EvolutionSettings;

/// Environment variable overriding `world.seed`.
pub const SEED_ENV: &str = "EVOGUARD_SEED";

/// Errors that can occur when loading or resolving configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The selection section cannot produce a survivor set.
    #[error("invalid selection settings: {source}")]
    Selection {
        /// The underlying selection error.
        #[from]
        source: SelectionError,
    },

    /// A value is outside its allowed range.
    #[error("invalid value for {field}: {reason}")]
    Invalid {
        /// Dotted path of the offending key.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level simulation configuration.
///
/// Mirrors the structure of `evoguard-config.yaml`. Every section may be
/// omitted and falls back to its defaults.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SimulationConfig {
    /// World bounds, seed, resources and obstacles.
    #[serde(default)]
    pub world: WorldConfig,

    /// Population parameters.
    #[serde(default)]
    pub population: PopulationConfig,

    /// Survivor selection at generation boundaries.
    #[serde(default)]
    pub selection: SelectionConfig,

    /// Safety constraints and elimination thresholds.
    #[serde(default)]
    pub safety: SafetyConfig,

    /// Generation length, mutation and fitness weights.
    #[serde(default)]
    pub evolution: EvolutionConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Simulation boundary parameters.
    #[serde(default)]
    pub simulation: SimulationBoundsConfig,
}

/// The value objects handed to the simulation core.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSettings {
    /// World bounds and drift seed.
    pub physics: WorldPhysics,
    /// Survivor selection.
    pub selection: SelectionSettings,
    /// Turnover parameters.
    pub evolution: EvolutionSettings,
    /// Constraint parameters and elimination thresholds.
    pub safety: SafetySettings,
}

impl SimulationConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// `EVOGUARD_SEED` overrides `world.seed` when it parses as a `u64`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.world.apply_env_overrides();
        Ok(config)
    }

    /// Check every section and resolve the core's value objects.
    pub fn validate(&self) -> Result<ResolvedSettings, ConfigError> {
        let physics = self.world.physics()?;

        if self.population.size == 0 {
            return Err(ConfigError::Invalid {
                field: "population.size",
                reason: "must be positive".to_owned(),
            });
        }

        let selection = self.selection.settings();
        selection.validate()?;

        let evolution = self.evolution.settings(self.population.size)?;

        if self.safety.energy_reserve < Decimal::ZERO || self.safety.hoarding_cap < Decimal::ZERO {
            return Err(ConfigError::Invalid {
                field: "safety",
                reason: "energy_reserve and hoarding_cap must be non-negative".to_owned(),
            });
        }

        if self.simulation.metrics_window == 0 {
            return Err(ConfigError::Invalid {
                field: "simulation.metrics_window",
                reason: "must be positive".to_owned(),
            });
        }

        Ok(ResolvedSettings {
            physics,
            selection,
            evolution,
            safety: self.safety.settings(),
        })
    }
}

/// A resource node placed at startup.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ResourceConfig {
    /// Where the node sits.
    pub position: Position,
    /// Starting quantity.
    pub quantity: Decimal,
    /// Units regenerated per tick.
    #[serde(default = "default_regeneration_rate")]
    pub regeneration_rate: Decimal,
}

/// World-level configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WorldConfig {
    /// Random seed for factor drift, genomes and agent decisions.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Inclusive lower corner of the world.
    #[serde(default = "default_min_bound")]
    pub min_bound: Position,

    /// Inclusive upper corner of the world.
    #[serde(default = "default_max_bound")]
    pub max_bound: Position,

    /// Multiplier on every factor's volatility; 0 freezes the weather.
    #[serde(default = "default_volatility_scale")]
    pub volatility_scale: f64,

    /// Resource nodes present at tick 0.
    #[serde(default = "default_resources")]
    pub resources: Vec<ResourceConfig>,

    /// Impassable cells.
    #[serde(default)]
    pub obstacles: Vec<Position>,

    /// Goal agents are drawn towards; when absent they seek resources.
    #[serde(default)]
    pub target: Option<Position>,

    /// Initial environmental factor values.
    #[serde(default = "default_factors")]
    pub factors: BTreeMap<String, f64>,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            min_bound: default_min_bound(),
            max_bound: default_max_bound(),
            volatility_scale: default_volatility_scale(),
            resources: default_resources(),
            obstacles: Vec::new(),
            target: None,
            factors: default_factors(),
        }
    }
}

impl WorldConfig {
    /// Apply environment variable overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Some(seed) = std::env::var(SEED_ENV)
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
        {
            self.seed = seed;
        }
    }

    fn physics(&self) -> Result<WorldPhysics, ConfigError> {
        let (lo, hi) = (self.min_bound, self.max_bound);
        if lo.x > hi.x || lo.y > hi.y || lo.z > hi.z {
            return Err(ConfigError::Invalid {
                field: "world.min_bound",
                reason: format!("{lo} is not below {hi} on every axis"),
            });
        }
        if !self.volatility_scale.is_finite() || self.volatility_scale < 0.0 {
            return Err(ConfigError::Invalid {
                field: "world.volatility_scale",
                reason: format!("must be finite and non-negative, got {}", self.volatility_scale),
            });
        }
        Ok(WorldPhysics {
            min_bound: lo,
            max_bound: hi,
            volatility_scale: self.volatility_scale,
            seed: self.seed,
        })
    }
}

/// Population parameters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PopulationConfig {
    /// Agents alive at the start of every generation.
    #[serde(default = "default_population_size")]
    pub size: usize,

    /// Half-width of the square around the origin agents spawn in.
    #[serde(default = "default_spawn_radius")]
    pub spawn_radius: i32,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            size: default_population_size(),
            spawn_radius: default_spawn_radius(),
        }
    }
}

/// Selection configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SelectionConfig {
    /// Strategy name: `tournament`, `roulette`, `elitism` or `safety_aware`.
    #[serde(default)]
    pub strategy: SelectionStrategy,

    /// Survivor slots filled per generation.
    #[serde(default = "default_survivor_count")]
    pub survivor_count: usize,

    /// Tournament sample size.
    #[serde(default = "default_tournament_size")]
    pub tournament_size: usize,

    /// Top agents copied unmutated into the next generation.
    #[serde(default = "default_elitism_count")]
    pub elitism_count: usize,

    /// Fitness deducted per recorded violation under `safety_aware`.
    #[serde(default = "default_safety_penalty")]
    pub safety_penalty: f64,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            strategy: SelectionStrategy::default(),
            survivor_count: default_survivor_count(),
            tournament_size: default_tournament_size(),
            elitism_count: default_elitism_count(),
            safety_penalty: default_safety_penalty(),
        }
    }
}

impl SelectionConfig {
    fn settings(&self) -> SelectionSettings {
        SelectionSettings {
            strategy: self.strategy,
            survivor_count: self.survivor_count,
            tournament_size: self.tournament_size,
            elitism_count: self.elitism_count,
            safety_penalty: self.safety_penalty,
        }
    }
}

/// Safety configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SafetyConfig {
    /// Energy an agent must keep after acting.
    #[serde(default = "default_energy_reserve")]
    pub energy_reserve: Decimal,

    /// Resources an agent may carry before harvesting is flagged.
    #[serde(default = "default_hoarding_cap")]
    pub hoarding_cap: Decimal,

    /// Critical violations that make an agent an elimination candidate.
    #[serde(default = "default_max_critical")]
    pub max_critical_violations: u64,

    /// Violations of any severity that make an agent a candidate.
    #[serde(default = "default_max_total")]
    pub max_total_violations: u64,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            energy_reserve: default_energy_reserve(),
            hoarding_cap: default_hoarding_cap(),
            max_critical_violations: default_max_critical(),
            max_total_violations: default_max_total(),
        }
    }
}

impl SafetyConfig {
    const fn settings(&self) -> SafetySettings {
        SafetySettings {
            energy_reserve: self.energy_reserve,
            hoarding_cap: self.hoarding_cap,
            elimination: EliminationPolicy {
                max_critical: self.max_critical_violations,
                max_total: self.max_total_violations,
            },
        }
    }
}

/// Evolution configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EvolutionConfig {
    /// Ticks between generation turnovers.
    #[serde(default = "default_ticks_per_generation")]
    pub ticks_per_generation: u64,

    /// Per-trait mutation probability.
    #[serde(default = "default_mutation_rate")]
    pub mutation_rate: f64,

    /// Largest per-trait mutation delta.
    #[serde(default = "default_mutation_strength")]
    pub mutation_strength: f64,

    /// Fitness weight of remaining energy.
    #[serde(default = "default_energy_weight")]
    pub energy_weight: f64,

    /// Fitness weight of carried resources.
    #[serde(default = "default_resource_weight")]
    pub resource_weight: f64,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            ticks_per_generation: default_ticks_per_generation(),
            mutation_rate: default_mutation_rate(),
            mutation_strength: default_mutation_strength(),
            energy_weight: default_energy_weight(),
            resource_weight: default_resource_weight(),
        }
    }
}

impl EvolutionConfig {
    fn settings(&self, population_size: usize) -> Result<EvolutionSettings, ConfigError> {
        if self.ticks_per_generation == 0 {
            return Err(ConfigError::Invalid {
                field: "evolution.ticks_per_generation",
                reason: "must be positive".to_owned(),
            });
        }
        if !(0.0..=1.0).contains(&self.mutation_rate) {
            return Err(ConfigError::Invalid {
                field: "evolution.mutation_rate",
                reason: format!("must lie in [0, 1], got {}", self.mutation_rate),
            });
        }
        if !self.mutation_strength.is_finite() || self.mutation_strength < 0.0 {
            return Err(ConfigError::Invalid {
                field: "evolution.mutation_strength",
                reason: format!("must be finite and non-negative, got {}", self.mutation_strength),
            });
        }
        if !self.energy_weight.is_finite() || !self.resource_weight.is_finite() {
            return Err(ConfigError::Invalid {
                field: "evolution.energy_weight",
                reason: "fitness weights must be finite".to_owned(),
            });
        }
        Ok(EvolutionSettings {
            population_size,
            ticks_per_generation: self.ticks_per_generation,
            mutation_rate: self.mutation_rate,
            mutation_strength: self.mutation_strength,
            fitness: FitnessWeights {
                energy: self.energy_weight,
                resources: self.resource_weight,
            },
        })
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins when set.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Simulation boundary parameters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SimulationBoundsConfig {
    /// Stop after this many ticks. 0 means no tick limit.
    #[serde(default)]
    pub max_ticks: u64,

    /// Stop after this many completed generations. 0 means no limit.
    #[serde(default = "default_max_generations")]
    pub max_generations: u64,

    /// Real-time milliseconds to sleep between ticks.
    #[serde(default)]
    pub tick_interval_ms: u64,

    /// Ticks of metrics kept for behavior detection.
    #[serde(default = "default_metrics_window")]
    pub metrics_window: usize,
}

impl Default for SimulationBoundsConfig {
    fn default() -> Self {
        Self {
            max_ticks: 0,
            max_generations: default_max_generations(),
            tick_interval_ms: 0,
            metrics_window: default_metrics_window(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions for serde
// ---------------------------------------------------------------------------

const fn default_seed() -> u64 {
    42
}

const fn default_min_bound() -> Position {
    Position::new(-50, -50, 0)
}

const fn default_max_bound() -> Position {
    Position::new(50, 50, 0)
}

const fn default_volatility_scale() -> f64 {
    1.0
}

const fn default_regeneration_rate() -> Decimal {
    Decimal::ONE
}

fn default_resources() -> Vec<ResourceConfig> {
    [(10, 10), (-10, 10), (10, -10), (-10, -10), (0, 0)]
        .into_iter()
        .map(|(x, y)| ResourceConfig {
            position: Position::new(x, y, 0),
            quantity: Decimal::ONE_HUNDRED,
            regeneration_rate: default_regeneration_rate(),
        })
        .collect()
}

fn default_factors() -> BTreeMap<String, f64> {
    BTreeMap::from([
        (evoguard_world::environment::TEMPERATURE.to_owned(), 20.0),
        (evoguard_world::environment::WEATHER_SEVERITY.to_owned(), 0.2),
        (evoguard_world::environment::HUMIDITY.to_owned(), 0.5),
    ])
}

const fn default_population_size() -> usize {
    20
}

const fn default_spawn_radius() -> i32 {
    5
}

const fn default_survivor_count() -> usize {
    10
}

const fn default_tournament_size() -> usize {
    3
}

const fn default_elitism_count() -> usize {
    2
}

const fn default_safety_penalty() -> f64 {
    10.0
}

const fn default_energy_reserve() -> Decimal {
    Decimal::TEN
}

const fn default_hoarding_cap() -> Decimal {
    Decimal::ONE_HUNDRED
}

const fn default_max_critical() -> u64 {
    3
}

const fn default_max_total() -> u64 {
    10
}

const fn default_ticks_per_generation() -> u64 {
    50
}

const fn default_mutation_rate() -> f64 {
    0.1
}

const fn default_mutation_strength() -> f64 {
    0.2
}

const fn default_energy_weight() -> f64 {
    1.0
}

const fn default_resource_weight() -> f64 {
    2.0
}

fn default_log_level() -> String {
    String::from("info")
}

const fn default_max_generations() -> u64 {
    10
}

const fn default_metrics_window() -> usize {
    500
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = SimulationConfig::default();
        assert_eq!(config.world.seed, 42);
        assert_eq!(config.population.size, 20);
        assert_eq!(config.world.resources.len(), 5);
        assert_eq!(config.selection.strategy, SelectionStrategy::SafetyAware);

        let resolved = config.validate();
        assert!(resolved.is_ok());
        let Ok(resolved) = resolved else { return };
        assert_eq!(resolved.selection, SelectionSettings::default());
        assert_eq!(resolved.safety, SafetySettings::default());
        assert_eq!(resolved.evolution.population_size, 20);
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r#"
world:
  seed: 123
  min_bound: { x: -10, y: -10, z: 0 }
  max_bound: { x: 10, y: 10, z: 0 }
  volatility_scale: 0.5
  resources:
    - position: { x: 3, y: 3, z: 0 }
      quantity: 40
      regeneration_rate: 2
  obstacles:
    - { x: 1, y: 0, z: 0 }
  target: { x: 5, y: 5, z: 0 }
  factors:
    temperature: 15.0

population:
  size: 8
  spawn_radius: 2

selection:
  strategy: tournament
  survivor_count: 4
  tournament_size: 2
  elitism_count: 1
  safety_penalty: 5.0

safety:
  energy_reserve: 15
  hoarding_cap: 60
  max_critical_violations: 1
  max_total_violations: 0

evolution:
  ticks_per_generation: 20
  mutation_rate: 0.3
  mutation_strength: 0.1
  energy_weight: 0.5
  resource_weight: 3.0

logging:
  level: "debug"
  format: json

simulation:
  max_ticks: 200
  max_generations: 5
  tick_interval_ms: 10
  metrics_window: 100
"#;

        let config = SimulationConfig::parse(yaml);
        assert!(config.is_ok(), "{config:?}");
        let config = config.ok().unwrap_or_else(SimulationConfig::default);

        assert_eq!(config.world.max_bound, Position::new(10, 10, 0));
        assert_eq!(config.world.obstacles, vec![Position::new(1, 0, 0)]);
        assert_eq!(config.world.target, Some(Position::new(5, 5, 0)));
        assert_eq!(
            config.world.resources.first().map(|r| r.regeneration_rate),
            Some(dec!(2))
        );
        assert_eq!(config.population.size, 8);
        assert_eq!(config.selection.strategy, SelectionStrategy::Tournament);
        assert_eq!(config.safety.hoarding_cap, dec!(60));
        assert_eq!(config.evolution.ticks_per_generation, 20);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.simulation.max_ticks, 200);

        let resolved = config.validate();
        assert!(matches!(
            resolved,
            Ok(ref r) if r.physics.volatility_scale > 0.4
                && r.safety.elimination.max_critical == 1
                && r.evolution.ticks_per_generation == 20
        ));
    }

    #[test]
    fn parse_minimal_yaml() {
        let yaml = "population:\n  size: 7\n";
        let config = SimulationConfig::parse(yaml);
        assert!(config.is_ok());
        let config = config.ok().unwrap_or_else(SimulationConfig::default);

        assert_eq!(config.population.size, 7);
        assert_eq!(config.evolution.ticks_per_generation, 50);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn parse_empty_yaml() {
        let config = SimulationConfig::parse("");
        assert!(config.is_ok());
    }

    #[test]
    fn unknown_strategy_is_a_yaml_error() {
        let config = SimulationConfig::parse("selection:\n  strategy: lottery\n");
        assert!(matches!(config, Err(ConfigError::Yaml { .. })));
    }

    #[test]
    fn zero_survivors_fail_as_selection_error() {
        let mut config = SimulationConfig::default();
        config.selection.survivor_count = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Selection { .. })));
    }

    #[test]
    fn negative_penalty_fails_as_selection_error() {
        let mut config = SimulationConfig::default();
        config.selection.safety_penalty = -1.0;
        assert!(matches!(config.validate(), Err(ConfigError::Selection { .. })));
    }

    #[test]
    fn inverted_bounds_are_rejected() {
        let mut config = SimulationConfig::default();
        config.world.min_bound = Position::new(5, 0, 0);
        config.world.max_bound = Position::new(0, 0, 0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "world.min_bound", .. })
        ));
    }

    #[test]
    fn zero_generation_length_is_rejected() {
        let mut config = SimulationConfig::default();
        config.evolution.ticks_per_generation = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn load_project_config_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("evoguard-config.yaml");
        if path.exists() {
            let config = SimulationConfig::from_file(&path);
            assert!(config.is_ok(), "Failed to load project config: {config:?}");
            let resolved = config.map(|c| c.validate().is_ok());
            assert!(matches!(resolved, Ok(true)));
        }
    }
}
