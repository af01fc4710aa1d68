//! The tick-stepped world: resources, obstacles and environmental factors.
//!
//! # Tick
//!
//! [`Environment::tick`] advances the world by exactly one step:
//!
//! 1. Every resource grows by its fixed regeneration rate.
//! 2. Every environmental factor drifts by a random delta drawn from
//!    `[-volatility, volatility]` and is clamped to its [`FactorRange`].
//! 3. The tick counter increments by one.
//! 4. A fresh [`EnvironmentSnapshot`] is published.
//!
//! `tick` takes `&mut self`, so at most one tick can be in flight per
//! environment. The owner decides how to share the environment between
//! writers (the simulation wraps it in a mutex).
//!
//! # Snapshots
//!
//! Readers never need the environment itself. [`Environment::reader`] hands
//! out a cloneable [`SnapshotReader`] whose [`latest`] call returns the most
//! recently published point-in-time copy. Publishing swaps an `Arc`, so a
//! reader only ever waits for a pointer copy, never for a tick.
//!
//! # Determinism
//!
//! Factor drift uses a [`StdRng`] seeded from [`WorldPhysics::seed`]. The
//! same seed and the same call sequence produce the same factor values.
//!
//! [`latest`]: SnapshotReader::latest

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use parking_lot::RwLock;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use evoguard_types::Position;

use crate::resource::Resource;

// ---------------------------------------------------------------------------
// Factor ranges
// ---------------------------------------------------------------------------

/// Name of the temperature factor (degrees Celsius).
pub const TEMPERATURE: &str = "temperature";

/// Name of the weather severity factor (0 = calm, 1 = extreme).
pub const WEATHER_SEVERITY: &str = "weather_severity";

/// Name of the humidity factor (relative, 0 to 1).
pub const HUMIDITY: &str = "humidity";

/// Name of the radiation factor (arbitrary units, 0 to 10).
pub const RADIATION: &str = "radiation";

/// Valid range and per-tick drift of a named environmental factor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FactorRange {
    /// Lowest allowed value.
    pub min: f64,
    /// Highest allowed value.
    pub max: f64,
    /// Largest absolute change applied in one tick.
    pub volatility: f64,
}

impl FactorRange {
    /// Range used for factors with no known domain.
    pub const DEFAULT: Self = Self {
        min: -1000.0,
        max: 1000.0,
        volatility: 1.0,
    };

    /// Create a range. Bounds are swapped if given in the wrong order and a
    /// negative volatility is treated as zero.
    pub const fn new(min: f64, max: f64, volatility: f64) -> Self {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        Self {
            min,
            max,
            volatility: if volatility > 0.0 { volatility } else { 0.0 },
        }
    }

    /// Return the known range for a factor name, or [`FactorRange::DEFAULT`].
    pub fn for_factor(name: &str) -> Self {
        match name {
            TEMPERATURE => Self::new(-50.0, 60.0, 0.5),
            WEATHER_SEVERITY | HUMIDITY => Self::new(0.0, 1.0, 0.05),
            RADIATION => Self::new(0.0, 10.0, 0.1),
            _ => Self::DEFAULT,
        }
    }

    /// Clamp a value into this range. `NaN` becomes the lower bound.
    pub fn clamp(&self, value: f64) -> f64 {
        if value.is_nan() {
            return self.min;
        }
        value.clamp(self.min, self.max)
    }
}

// ---------------------------------------------------------------------------
// Physics
// ---------------------------------------------------------------------------

/// Resolved world physics parameters handed to the environment at
/// construction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorldPhysics {
    /// Inclusive lower corner of the world.
    pub min_bound: Position,
    /// Inclusive upper corner of the world.
    pub max_bound: Position,
    /// Multiplier applied to every factor's volatility (0 freezes factors).
    pub volatility_scale: f64,
    /// Seed for factor drift.
    pub seed: u64,
}

impl WorldPhysics {
    /// Whether a position lies inside the world bounds.
    pub const fn contains(&self, position: Position) -> bool {
        position.x >= self.min_bound.x
            && position.x <= self.max_bound.x
            && position.y >= self.min_bound.y
            && position.y <= self.max_bound.y
            && position.z >= self.min_bound.z
            && position.z <= self.max_bound.z
    }
}

impl Default for WorldPhysics {
    fn default() -> Self {
        Self {
            min_bound: Position::new(-50, -50, 0),
            max_bound: Position::new(50, 50, 0),
            volatility_scale: 1.0,
            seed: 42,
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Immutable point-in-time view of the environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentSnapshot {
    /// Tick counter at the time of the snapshot.
    pub tick: u64,
    /// Resource nodes keyed by position.
    pub resources: BTreeMap<Position, Resource>,
    /// Impassable cells.
    pub obstacles: BTreeSet<Position>,
    /// Environmental factor values keyed by name.
    pub factors: BTreeMap<String, f64>,
    /// Goal position agents are drawn towards, if any.
    pub target_position: Option<Position>,
    /// The world physics the environment was built with.
    pub physics: WorldPhysics,
}

impl EnvironmentSnapshot {
    /// Sum of all resource quantities.
    pub fn total_resources(&self) -> Decimal {
        self.resources
            .values()
            .fold(Decimal::ZERO, |acc, r| acc.saturating_add(r.quantity))
    }

    /// Value of a factor, if set.
    pub fn factor(&self, name: &str) -> Option<f64> {
        self.factors.get(name).copied()
    }

    /// Whether a position is blocked by an obstacle.
    pub fn is_obstacle(&self, position: Position) -> bool {
        self.obstacles.contains(&position)
    }
}

/// Cloneable handle to the most recently published snapshot.
#[derive(Debug, Clone)]
pub struct SnapshotReader {
    slot: Arc<RwLock<Arc<EnvironmentSnapshot>>>,
}

impl SnapshotReader {
    /// Return the latest published snapshot.
    pub fn latest(&self) -> Arc<EnvironmentSnapshot> {
        Arc::clone(&self.slot.read())
    }
}

// ---------------------------------------------------------------------------
// Environment
// ---------------------------------------------------------------------------

/// The mutable world.
#[derive(Debug)]
pub struct Environment {
    physics: WorldPhysics,
    tick: u64,
    resources: BTreeMap<Position, Resource>,
    obstacles: BTreeSet<Position>,
    factors: BTreeMap<String, f64>,
    ranges: BTreeMap<String, FactorRange>,
    target_position: Option<Position>,
    rng: StdRng,
    published: Arc<RwLock<Arc<EnvironmentSnapshot>>>,
}

impl Environment {
    /// Create an empty environment at tick 0 and publish its first snapshot.
    pub fn new(physics: WorldPhysics) -> Self {
        let initial = EnvironmentSnapshot {
            tick: 0,
            resources: BTreeMap::new(),
            obstacles: BTreeSet::new(),
            factors: BTreeMap::new(),
            target_position: None,
            physics,
        };
        Self {
            physics,
            tick: 0,
            resources: BTreeMap::new(),
            obstacles: BTreeSet::new(),
            factors: BTreeMap::new(),
            ranges: BTreeMap::new(),
            target_position: None,
            rng: StdRng::seed_from_u64(physics.seed),
            published: Arc::new(RwLock::new(Arc::new(initial))),
        }
    }

    /// Current tick counter.
    pub const fn tick_count(&self) -> u64 {
        self.tick
    }

    /// The physics parameters this environment was built with.
    pub const fn physics(&self) -> &WorldPhysics {
        &self.physics
    }

    /// Look up the resource node at a position.
    pub fn resource(&self, position: Position) -> Option<&Resource> {
        self.resources.get(&position)
    }

    /// Look up a factor value.
    pub fn factor(&self, name: &str) -> Option<f64> {
        self.factors.get(name).copied()
    }

    // --- Configuration-time mutators ---

    /// Register (or replace) a resource node at a position.
    ///
    /// Quantity and rate are clamped to be non-negative.
    pub fn register_resource(&mut self, position: Position, quantity: Decimal, rate: Decimal) {
        self.resources
            .insert(position, Resource::new(quantity, rate));
    }

    /// Mark a cell as impassable.
    pub fn add_obstacle(&mut self, position: Position) {
        self.obstacles.insert(position);
    }

    /// Set the goal position agents are drawn towards. `None` is ignored.
    pub fn set_target_position(&mut self, position: Option<Position>) {
        if let Some(position) = position {
            self.target_position = Some(position);
        }
    }

    /// Set a factor, clamped to its range. Blank names are ignored.
    pub fn set_environmental_factor(&mut self, name: &str, value: f64) {
        let name = name.trim();
        if name.is_empty() {
            return;
        }
        let range = self.range_of(name);
        self.factors.insert(name.to_owned(), range.clamp(value));
    }

    /// Override the range of a factor and re-clamp its current value.
    /// Blank names are ignored.
    pub fn set_factor_range(&mut self, name: &str, range: FactorRange) {
        let name = name.trim();
        if name.is_empty() {
            return;
        }
        self.ranges.insert(name.to_owned(), range);
        if let Some(value) = self.factors.get_mut(name) {
            *value = range.clamp(*value);
        }
    }

    fn range_of(&self, name: &str) -> FactorRange {
        self.ranges
            .get(name)
            .copied()
            .unwrap_or_else(|| FactorRange::for_factor(name))
    }

    // --- Runtime mutators ---

    /// Take up to `requested` units from the resource at `position`.
    ///
    /// Returns the amount actually taken (zero if there is no node).
    pub fn harvest(&mut self, position: Position, requested: Decimal) -> Decimal {
        let Some(node) = self.resources.get_mut(&position) else {
            return Decimal::ZERO;
        };
        let (after, taken) = node.harvest(requested);
        *node = after;
        taken
    }

    /// Put `amount` units back into the resource at `position`.
    ///
    /// Used to compensate a harvest. Does nothing if no node exists there.
    pub fn deposit(&mut self, position: Position, amount: Decimal) {
        if let Some(node) = self.resources.get_mut(&position) {
            *node = node.deposited(amount);
        }
    }

    /// Advance the world by one tick and publish the resulting snapshot.
    ///
    /// Returns the new tick number.
    pub fn tick(&mut self) -> u64 {
        for node in self.resources.values_mut() {
            *node = node.regenerated();
        }

        let scale = self.physics.volatility_scale.max(0.0);
        let names: Vec<String> = self.factors.keys().cloned().collect();
        for name in names {
            let range = self.range_of(&name);
            let spread = range.volatility * scale;
            let delta = if spread > 0.0 {
                self.rng.random_range(-spread..=spread)
            } else {
                0.0
            };
            if let Some(value) = self.factors.get_mut(&name) {
                *value = range.clamp(*value + delta);
            }
        }

        self.tick = self.tick.saturating_add(1);
        self.publish();
        debug!(tick = self.tick, resources = self.resources.len(), "Environment ticked");
        self.tick
    }

    // --- Snapshots ---

    /// Build a fresh point-in-time copy of the environment.
    pub fn snapshot(&self) -> Arc<EnvironmentSnapshot> {
        Arc::new(EnvironmentSnapshot {
            tick: self.tick,
            resources: self.resources.clone(),
            obstacles: self.obstacles.clone(),
            factors: self.factors.clone(),
            target_position: self.target_position,
            physics: self.physics,
        })
    }

    /// Publish the current state to every [`SnapshotReader`].
    ///
    /// [`tick`](Self::tick) publishes automatically; call this after
    /// configuration-time or runtime mutations that readers should see
    /// before the next tick.
    pub fn publish(&self) {
        let snapshot = self.snapshot();
        *self.published.write() = snapshot;
    }

    /// Return a reader of published snapshots.
    pub fn reader(&self) -> SnapshotReader {
        SnapshotReader {
            slot: Arc::clone(&self.published),
        }
    }
}
