//! Tunable model weights shared by field generation, analysis and calibration.

use serde::{Deserialize, Serialize};

/// Lower/upper bounds enforced on `safety` after every calibration step.
pub const SAFETY_BOUNDS: (f64, f64) = (0.5, 3.5);
/// Lower/upper bounds enforced on `resource` after every calibration step.
pub const RESOURCE_BOUNDS: (f64, f64) = (0.1, 1.0);

/// The four scalars the engine tunes between cycles.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Weights {
    /// Pull strength of environmental suitability.
    pub resource: f64,
    /// Repulsion strength of hazards.
    pub safety: f64,
    /// Converts squared normalized displacement into kinetic cost.
    pub effort: f64,
    /// Information-gap cost; carried in the state but not consumed yet.
    pub uncertainty: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            resource: 0.6,
            safety: 1.5,
            effort: 2_000.0,
            uncertainty: 0.3,
        }
    }
}

impl Weights {
    /// Apply the calibration bounds to `safety` and `resource`.
    #[must_use]
    pub fn clamped(mut self) -> Self {
        self.safety = clamp_finite(self.safety, SAFETY_BOUNDS);
        self.resource = clamp_finite(self.resource, RESOURCE_BOUNDS);
        self
    }

    /// True when every weight is finite and non-negative.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        [self.resource, self.safety, self.effort, self.uncertainty]
            .iter()
            .all(|w| w.is_finite() && *w >= 0.0)
    }
}

fn clamp_finite(value: f64, (lo, hi): (f64, f64)) -> f64 {
    if value.is_nan() {
        return lo;
    }
    value.clamp(lo, hi)
}
