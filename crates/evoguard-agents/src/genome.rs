//! Heritable behavior traits and their mutation.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Largest step an agent can take along one axis.
pub const MAX_STEP_SIZE: i32 = 3;

/// Heritable traits that steer an agent's [`GenomePolicy`].
///
/// The three ratio traits are kept in `[0, 1]`; `step_size` is kept in
/// `1..=MAX_STEP_SIZE`.
///
/// [`GenomePolicy`]: crate::policy::GenomePolicy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Genome {
    /// Chance of wandering randomly instead of heading for a goal.
    pub exploration: f64,
    /// Chance of harvesting when standing on a resource.
    pub harvest_drive: f64,
    /// Chance of refusing a move that would break a safety rule.
    pub caution: f64,
    /// Cells moved per axis per step.
    pub step_size: i32,
}

impl Default for Genome {
    fn default() -> Self {
        Self {
            exploration: 0.3,
            harvest_drive: 0.7,
            caution: 0.5,
            step_size: 1,
        }
    }
}

impl Genome {
    /// Draw a uniformly random genome.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            exploration: rng.random_range(0.0..=1.0),
            harvest_drive: rng.random_range(0.0..=1.0),
            caution: rng.random_range(0.0..=1.0),
            step_size: rng.random_range(1..=MAX_STEP_SIZE),
        }
    }

    /// Return a mutated copy.
    ///
    /// Each ratio trait mutates with probability `rate` by a uniform delta in
    /// `[-strength, strength]`, then is clamped back into `[0, 1]`. The step
    /// size mutates with the same probability by one cell. A non-finite
    /// `rate` or `strength` leaves the genome unchanged.
    #[must_use]
    pub fn mutated<R: Rng + ?Sized>(&self, rng: &mut R, rate: f64, strength: f64) -> Self {
        if !rate.is_finite() || !strength.is_finite() {
            return *self;
        }
        let rate = rate.clamp(0.0, 1.0);
        let strength = strength.abs();
        let mut mutate = |value: f64| {
            if strength > 0.0 && rng.random_bool(rate) {
                (value + rng.random_range(-strength..=strength)).clamp(0.0, 1.0)
            } else {
                value
            }
        };
        let exploration = mutate(self.exploration);
        let harvest_drive = mutate(self.harvest_drive);
        let caution = mutate(self.caution);

        let step_size = if rng.random_bool(rate) {
            let delta = if rng.random_bool(0.5) { 1 } else { -1 };
            self.step_size.saturating_add(delta).clamp(1, MAX_STEP_SIZE)
        } else {
            self.step_size
        };

        Self {
            exploration,
            harvest_drive,
            caution,
            step_size,
        }
    }
}
