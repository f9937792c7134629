//! Kinetic/potential/Lagrangian diagnostics for a trajectory over the current field.

use serde::{Deserialize, Serialize};

use crate::grid::{FieldStore, Point};
use crate::weights::Weights;

/// Bearing changes at or below this many radians count as smooth motion.
pub const TURN_THRESHOLD: f64 = 0.5;

/// Per-step energy series and the scalar scores derived from them.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TrajectoryMetrics {
    pub kinetic: Vec<f64>,
    pub potential: Vec<f64>,
    pub lagrangian: Vec<f64>,
    /// Sum of the Lagrangian series.
    pub action: f64,
    /// Average anomalous turning per step.
    pub entropy_score: f64,
    /// Bounded `[0, 100]` plausibility score.
    pub naturalness: f64,
    /// Named proxy; always equal to `entropy_score`.
    pub predictive_error: f64,
}

impl TrajectoryMetrics {
    #[must_use]
    pub fn len(&self) -> usize {
        self.kinetic.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.kinetic.is_empty()
    }
}

/// `max(0, 100 - 50·entropy - |action|/100)`.
#[must_use]
pub fn naturalness(entropy_score: f64, action: f64) -> f64 {
    (100.0 - 50.0 * entropy_score - action.abs() / 100.0).max(0.0)
}

/// Analyze `trajectory` against the potential layer of `store`.
///
/// The first point uses itself as its predecessor, so single-point input
/// yields one zero-kinetic sample. Empty input yields empty series with
/// zero action and entropy.
#[must_use]
pub fn analyze(store: &FieldStore, weights: &Weights, trajectory: &[Point]) -> TrajectoryMetrics {
    let len = trajectory.len();
    let mut kinetic = Vec::with_capacity(len);
    let mut potential = Vec::with_capacity(len);
    let mut lagrangian = Vec::with_capacity(len);
    let mut action = 0.0;
    let mut turn_complexity = 0.0;

    for (idx, &point) in trajectory.iter().enumerate() {
        let previous = trajectory[idx.saturating_sub(1)];
        let ke = 0.5 * weights.effort * point.distance_sq(previous);
        let cell = store.cell_of(point);
        let pe = store.cost_at(cell.row, cell.col);
        let l = ke - pe;

        kinetic.push(ke);
        potential.push(pe);
        lagrangian.push(l);
        action += l;

        if idx >= 2 {
            let before = trajectory[idx - 2];
            let turn = (point.bearing_from(previous) - previous.bearing_from(before)).abs();
            if turn > TURN_THRESHOLD {
                turn_complexity += turn;
            }
        }
    }

    let entropy_score = if len == 0 {
        0.0
    } else {
        turn_complexity / len as f64
    };

    TrajectoryMetrics {
        kinetic,
        potential,
        lagrangian,
        action,
        entropy_score,
        naturalness: naturalness(entropy_score, action),
        predictive_error: entropy_score,
    }
}
