//! Single-step online weight calibration from observed-vs-predicted drift.
//!
//! This is a heuristic nudge, not a convergent optimizer: repeated calls can
//! oscillate around the drift threshold and there is no loss being minimized.

use serde::{Deserialize, Serialize};

use crate::grid::Point;
use crate::weights::Weights;

/// Mean drift above which deviation is blamed on underestimated hazard avoidance.
pub const DRIFT_THRESHOLD: f64 = 0.1;
/// Learning rate used when the caller does not supply one.
pub const DEFAULT_LEARNING_RATE: f64 = 0.05;

/// Which weight a calibration step reinforced.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Adjustment {
    /// Drift exceeded the threshold: safety up, resource down.
    Safety,
    /// Prediction was close: resource reinforced.
    Resource,
}

/// Outcome of one applied calibration step.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CalibrationStep {
    pub drift: f64,
    pub adjustment: Adjustment,
    pub before: Weights,
    pub after: Weights,
}

/// Mean per-index distance between `observed` and `predicted`.
///
/// Indices past the end of `predicted` reuse its last point. Returns `None`
/// when either trajectory is empty.
#[must_use]
pub fn drift(observed: &[Point], predicted: &[Point]) -> Option<f64> {
    let last = *predicted.last()?;
    if observed.is_empty() {
        return None;
    }
    let total: f64 = observed
        .iter()
        .enumerate()
        .map(|(idx, point)| point.distance(predicted.get(idx).copied().unwrap_or(last)))
        .sum();
    Some(total / observed.len() as f64)
}

/// Which weight a given drift pushes on.
#[must_use]
pub fn adjustment_for(drift: f64) -> Adjustment {
    if drift > DRIFT_THRESHOLD {
        Adjustment::Safety
    } else {
        Adjustment::Resource
    }
}

/// Pure update rule: returns the weights after one step at `learning_rate`.
#[must_use]
pub fn calibrated(weights: Weights, drift: f64, learning_rate: f64) -> Weights {
    let mut next = weights;
    match adjustment_for(drift) {
        Adjustment::Safety => {
            next.safety += learning_rate * drift;
            next.resource -= learning_rate * drift / 2.0;
        }
        Adjustment::Resource => {
            next.resource += learning_rate * (1.0 - drift);
        }
    }
    next.clamped()
}

/// Measure drift and, when defined, apply one calibration step to `weights`.
pub fn calibrate(
    weights: &mut Weights,
    observed: &[Point],
    predicted: &[Point],
    learning_rate: f64,
) -> Option<CalibrationStep> {
    let drift = drift(observed, predicted)?;
    let before = *weights;
    *weights = calibrated(before, drift, learning_rate);
    Some(CalibrationStep {
        drift,
        adjustment: adjustment_for(drift),
        before,
        after: *weights,
    })
}
