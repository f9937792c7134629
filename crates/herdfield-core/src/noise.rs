//! Synthetic observation noise for driving cycles without field telemetry.

use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

use crate::grid::Point;

/// Largest useful per-axis offset: output is clamped to the unit square anyway.
pub const MAX_OBSERVATION_JITTER: f64 = 1.0;

/// Uniform per-axis jitter applied to an ideal path to fake an observed one.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ObservationNoise {
    /// Maximum absolute offset per axis, in normalized units.
    pub amplitude: f64,
}

impl Default for ObservationNoise {
    fn default() -> Self {
        Self { amplitude: 0.02 }
    }
}

impl ObservationNoise {
    #[must_use]
    pub const fn new(amplitude: f64) -> Self {
        Self { amplitude }
    }

    /// Perturb every point of `ideal`, keeping results inside the unit square.
    ///
    /// The amplitude is capped at [`MAX_OBSERVATION_JITTER`]; non-finite values disable jitter.
    pub fn observe(&self, ideal: &[Point], rng: &mut dyn RngCore) -> Vec<Point> {
        let amplitude = if self.amplitude.is_finite() {
            self.amplitude.abs().min(MAX_OBSERVATION_JITTER)
        } else {
            0.0
        };
        ideal
            .iter()
            .map(|point| {
                Point::new(
                    point.x + rng.random_range(-amplitude..=amplitude),
                    point.y + rng.random_range(-amplitude..=amplitude),
                )
                .clamped()
            })
            .collect()
    }
}
