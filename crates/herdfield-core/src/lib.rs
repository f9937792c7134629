//! Core engine for potential-field herd movement modelling.
//!
//! A landscape is discretized into a grid and turned into an energy raster
//! (suitability pull, seasonal water attraction, hazard repulsion). Observed
//! trajectories are scored against that raster with kinetic/potential
//! diagnostics, ideal trajectories are found by least-action grid search, and
//! a small weight set is nudged toward whatever the herds actually did.
//!
//! One [`HerdEngine`] owns all mutable state. It does no locking; hosts that
//! share an engine must finish one cycle before starting the next.

pub mod calibrate;
pub mod field;
pub mod grid;
pub mod noise;
pub mod path;
pub mod physics;
pub mod weights;

use std::collections::VecDeque;
use std::fmt;

use rand::{SeedableRng, rngs::SmallRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace};

pub use calibrate::{Adjustment, CalibrationStep, DEFAULT_LEARNING_RATE};
pub use field::{FieldInputs, NEUTRAL_SUITABILITY, POTENTIAL_BOUNDS, WATER_SOURCE};
pub use grid::{Cell, FieldStore, GridDims, Point, Raster};
pub use noise::{MAX_OBSERVATION_JITTER, ObservationNoise};
pub use path::SolvedPath;
pub use physics::TrajectoryMetrics;
pub use weights::{RESOURCE_BOUNDS, SAFETY_BOUNDS, Weights};

/// Errors that can occur when constructing an engine.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    /// Indicates an invalid configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}

/// Static configuration for a [`HerdEngine`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Number of grid columns (x axis).
    pub columns: u32,
    /// Number of grid rows (y axis).
    pub rows: u32,
    /// Initial weight set.
    pub weights: Weights,
    /// Learning rate used by cycle-driven calibration.
    pub learning_rate: f64,
    /// Optional RNG seed for reproducible observation noise.
    pub rng_seed: Option<u64>,
    /// Per-axis amplitude of simulated observation noise.
    pub observation_jitter: f64,
    /// Maximum number of recent cycle summaries retained in-memory.
    pub history_capacity: usize,
    /// Whether [`HerdEngine::run_cycle`] calibrates weights after analysis.
    pub calibrate_each_cycle: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            columns: 64,
            rows: 48,
            weights: Weights::default(),
            learning_rate: DEFAULT_LEARNING_RATE,
            rng_seed: None,
            observation_jitter: 0.02,
            history_capacity: 256,
            calibrate_each_cycle: true,
        }
    }
}

impl EngineConfig {
    /// Validates the configuration, returning the grid dimensions.
    pub fn validate(&self) -> Result<GridDims, EngineError> {
        let dims = GridDims::new(self.columns, self.rows)?;
        if !self.weights.is_valid() {
            return Err(EngineError::InvalidConfig(
                "weights must be finite and non-negative",
            ));
        }
        if !self.learning_rate.is_finite() || self.learning_rate < 0.0 {
            return Err(EngineError::InvalidConfig(
                "learning_rate must be finite and non-negative",
            ));
        }
        if !(0.0..=MAX_OBSERVATION_JITTER).contains(&self.observation_jitter) {
            return Err(EngineError::InvalidConfig(
                "observation_jitter must be finite and within [0, 1]",
            ));
        }
        if self.history_capacity == 0 {
            return Err(EngineError::InvalidConfig(
                "history_capacity must be positive",
            ));
        }
        Ok(dims)
    }

    /// Returns the configured RNG seed, generating one from entropy if absent.
    fn seeded_rng(&self) -> SmallRng {
        match self.rng_seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => {
                let seed: u64 = rand::random();
                SmallRng::seed_from_u64(seed)
            }
        }
    }
}

/// Monotonic simulation cycle counter.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct Cycle(pub u64);

impl Cycle {
    /// Returns the next sequential cycle.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Resets the cycle counter back to zero.
    #[must_use]
    pub const fn zero() -> Self {
        Self(0)
    }
}

/// Inputs supplied by the host for one simulation cycle.
#[derive(Debug, Clone, Copy)]
pub struct CycleInputs<'a> {
    /// Vegetation suitability raster; neutral everywhere when absent.
    pub suitability: Option<&'a Raster>,
    /// Calendar month (1-12) driving the seasonal term.
    pub month: u32,
    /// Known hazard locations, normalized.
    pub hazards: &'a [Point],
    /// Normalized origin of the movement.
    pub start: Point,
    /// Normalized destination of the movement.
    pub end: Point,
    /// Sensed trajectory; when absent one is simulated from the ideal path.
    pub observed: Option<&'a [Point]>,
}

/// Everything one cycle produced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CycleReport {
    /// Cycle number this report belongs to.
    pub cycle: Cycle,
    /// Least-action path through the freshly generated field.
    pub ideal: SolvedPath,
    /// Sensed or simulated trajectory compared against the ideal.
    pub observed: Vec<Point>,
    pub ideal_metrics: TrajectoryMetrics,
    pub observed_metrics: TrajectoryMetrics,
    /// Weight adjustment applied this cycle, if calibration ran.
    pub calibration: Option<CalibrationStep>,
    /// Weights in effect after the cycle.
    pub weights: Weights,
}

/// Compact record retained in the engine's history ring.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CycleSummary {
    /// Cycle number the summary was recorded for.
    pub cycle: Cycle,
    /// Month the field was generated for.
    pub month: u32,
    /// Accumulated traversal cost of the ideal path.
    pub path_cost: f64,
    /// Number of points in the ideal path.
    pub path_steps: usize,
    /// Whether the solver reached the destination.
    pub reached: bool,
    /// Mean observed-vs-predicted drift, when calibration ran.
    pub drift: Option<f64>,
    /// Action of the observed trajectory.
    pub observed_action: f64,
    /// Heading-change entropy score of the observed trajectory.
    pub observed_entropy: f64,
    /// Naturalness score of the observed trajectory.
    pub observed_naturalness: f64,
    /// Weights in effect after the cycle.
    pub weights: Weights,
}

impl CycleSummary {
    fn from_report(report: &CycleReport, month: u32) -> Self {
        Self {
            cycle: report.cycle,
            month,
            path_cost: report.ideal.cost,
            path_steps: report.ideal.points.len(),
            reached: report.ideal.reached,
            drift: report.calibration.map(|step| step.drift),
            observed_action: report.observed_metrics.action,
            observed_entropy: report.observed_metrics.entropy_score,
            observed_naturalness: report.observed_metrics.naturalness,
            weights: report.weights,
        }
    }
}

/// Potential-field engine: landscape rasters, weight state and the four operations over them.
pub struct HerdEngine {
    config: EngineConfig,
    store: FieldStore,
    weights: Weights,
    noise: ObservationNoise,
    rng: SmallRng,
    cycle: Cycle,
    history: VecDeque<CycleSummary>,
}

impl fmt::Debug for HerdEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HerdEngine")
            .field("config", &self.config)
            .field("dims", &self.store.dims())
            .field("weights", &self.weights)
            .field("cycle", &self.cycle)
            .finish()
    }
}

impl HerdEngine {
    /// Instantiate an engine with neutral rasters and the configured weights.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        let dims = config.validate()?;
        let rng = config.seeded_rng();
        let history_capacity = config.history_capacity;
        Ok(Self {
            store: FieldStore::new(dims),
            weights: config.weights,
            noise: ObservationNoise::new(config.observation_jitter),
            rng,
            cycle: Cycle::zero(),
            history: VecDeque::with_capacity(history_capacity),
            config,
        })
    }

    /// Shorthand for an engine of the given size with every other setting at its default.
    pub fn with_dims(columns: u32, rows: u32) -> Result<Self, EngineError> {
        Self::new(EngineConfig {
            columns,
            rows,
            ..EngineConfig::default()
        })
    }

    /// Recompute and store the potential field.
    pub fn generate_field(
        &mut self,
        suitability: Option<&Raster>,
        month: u32,
        hazards: &[Point],
    ) -> &Raster {
        let inputs = FieldInputs {
            suitability,
            month,
            hazards,
        };
        field::generate(&mut self.store, &self.weights, &inputs)
    }

    /// One calibration step from an (observed, predicted) pair.
    ///
    /// Returns `None`, leaving weights untouched, when either trajectory is empty.
    pub fn calibrate(
        &mut self,
        observed: &[Point],
        predicted: &[Point],
        learning_rate: f64,
    ) -> Option<CalibrationStep> {
        let step = calibrate::calibrate(&mut self.weights, observed, predicted, learning_rate);
        match &step {
            Some(step) => debug!(
                drift = step.drift,
                adjustment = ?step.adjustment,
                safety = step.after.safety,
                resource = step.after.resource,
                "weights calibrated"
            ),
            None => debug!(
                observed = observed.len(),
                predicted = predicted.len(),
                "calibration skipped; empty trajectory"
            ),
        }
        step
    }

    /// [`Self::calibrate`] at the configured learning rate.
    pub fn calibrate_default(
        &mut self,
        observed: &[Point],
        predicted: &[Point],
    ) -> Option<CalibrationStep> {
        self.calibrate(observed, predicted, self.config.learning_rate)
    }

    /// Physics diagnostics for `trajectory` against the current field.
    #[must_use]
    pub fn analyze(&self, trajectory: &[Point]) -> TrajectoryMetrics {
        physics::analyze(&self.store, &self.weights, trajectory)
    }

    /// Least-action path from `start` to `end`.
    #[must_use]
    pub fn solve_path(&self, start: Point, end: Point) -> Vec<Point> {
        self.solve_path_report(start, end).points
    }

    /// Least-action path with search diagnostics.
    #[must_use]
    pub fn solve_path_report(&self, start: Point, end: Point) -> SolvedPath {
        path::solve(&self.store, start, end)
    }

    /// Jitter `ideal` with the engine's seeded noise source.
    pub fn simulate_observation(&mut self, ideal: &[Point]) -> Vec<Point> {
        self.noise.observe(ideal, &mut self.rng)
    }

    /// Run one full cycle: field, ideal path, observation, analysis, optional calibration.
    pub fn run_cycle(&mut self, inputs: &CycleInputs<'_>) -> CycleReport {
        self.generate_field(inputs.suitability, inputs.month, inputs.hazards);
        let ideal = self.solve_path_report(inputs.start, inputs.end);
        let observed = match inputs.observed {
            Some(observed) => observed.to_vec(),
            None => self.simulate_observation(&ideal.points),
        };
        let ideal_metrics = self.analyze(&ideal.points);
        let observed_metrics = self.analyze(&observed);
        let calibration = if self.config.calibrate_each_cycle {
            self.calibrate_default(&observed, &ideal.points)
        } else {
            None
        };

        self.cycle = self.cycle.next();
        let report = CycleReport {
            cycle: self.cycle,
            ideal,
            observed,
            ideal_metrics,
            observed_metrics,
            calibration,
            weights: self.weights,
        };
        self.record(CycleSummary::from_report(&report, inputs.month));
        trace!(
            cycle = report.cycle.0,
            naturalness = report.observed_metrics.naturalness,
            entropy = report.observed_metrics.entropy_score,
            "cycle complete"
        );
        report
    }

    fn record(&mut self, summary: CycleSummary) {
        if self.history.len() >= self.config.history_capacity {
            self.history.pop_front();
        }
        self.history.push_back(summary);
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn dims(&self) -> GridDims {
        self.store.dims()
    }

    #[must_use]
    pub fn weights(&self) -> Weights {
        self.weights
    }

    /// Replace the weight set; `safety` and `resource` are clamped to their calibration bounds.
    pub fn set_weights(&mut self, weights: Weights) {
        self.weights = weights.clamped();
    }

    #[must_use]
    pub fn store(&self) -> &FieldStore {
        &self.store
    }

    /// Current potential-field raster.
    #[must_use]
    pub fn potential(&self) -> &Raster {
        self.store.potential()
    }

    #[must_use]
    pub fn bias(&self) -> &Raster {
        self.store.bias()
    }

    /// Write access to the bias layer for external learning hooks.
    pub fn bias_mut(&mut self) -> &mut Raster {
        self.store.bias_mut()
    }

    /// Set one bias cell; returns false when the cell is outside the grid.
    pub fn set_bias_cell(&mut self, row: u32, col: u32, value: f64) -> bool {
        self.store.set_bias(row, col, value)
    }

    #[must_use]
    pub const fn cycle(&self) -> Cycle {
        self.cycle
    }

    /// Iterate over retained cycle summaries, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &CycleSummary> {
        self.history.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_config() -> EngineConfig {
        EngineConfig {
            columns: 12,
            rows: 10,
            rng_seed: Some(0xDEAD_BEEF),
            history_capacity: 3,
            ..EngineConfig::default()
        }
    }

    #[test]
    fn config_validation_rejects_bad_values() {
        let bad_dims = EngineConfig {
            columns: 1,
            ..EngineConfig::default()
        };
        assert!(HerdEngine::new(bad_dims).is_err());

        let bad_rate = EngineConfig {
            learning_rate: f64::NAN,
            ..EngineConfig::default()
        };
        assert_eq!(
            bad_rate.validate(),
            Err(EngineError::InvalidConfig(
                "learning_rate must be finite and non-negative"
            ))
        );

        let bad_weights = EngineConfig {
            weights: Weights {
                effort: -1.0,
                ..Weights::default()
            },
            ..EngineConfig::default()
        };
        assert!(bad_weights.validate().is_err());

        let huge_jitter = EngineConfig {
            observation_jitter: 1e308,
            ..EngineConfig::default()
        };
        assert_eq!(
            huge_jitter.validate(),
            Err(EngineError::InvalidConfig(
                "observation_jitter must be finite and within [0, 1]"
            ))
        );
        let full_jitter = EngineConfig {
            observation_jitter: MAX_OBSERVATION_JITTER,
            ..EngineConfig::default()
        };
        assert!(full_jitter.validate().is_ok());

        let no_history = EngineConfig {
            history_capacity: 0,
            ..EngineConfig::default()
        };
        assert!(no_history.validate().is_err());
    }

    #[test]
    fn partial_config_json_fills_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{ "columns": 10, "rows": 5, "weights": { "resource": 0.4, "safety": 2.0, "effort": 1500.0, "uncertainty": 0.0 } }"#)
                .expect("config json");
        assert_eq!(config.columns, 10);
        assert_eq!(config.rows, 5);
        assert_eq!(config.weights.safety, 2.0);
        assert_eq!(config.learning_rate, DEFAULT_LEARNING_RATE);
        assert_eq!(config.history_capacity, EngineConfig::default().history_capacity);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn engine_starts_with_defaults() {
        let engine = HerdEngine::with_dims(8, 6).expect("engine");
        assert_eq!(engine.dims().columns(), 8);
        assert_eq!(engine.dims().rows(), 6);
        assert_eq!(engine.weights(), Weights::default());
        assert_eq!(engine.cycle(), Cycle::zero());
        assert!(engine.bias().cells().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn seeded_cycles_are_reproducible() {
        let hazards = [Point::new(0.4, 0.6)];
        let inputs = CycleInputs {
            suitability: None,
            month: 3,
            hazards: &hazards,
            start: Point::new(0.05, 0.9),
            end: Point::new(0.85, 0.2),
            observed: None,
        };

        let mut a = HerdEngine::new(seeded_config()).expect("engine a");
        let mut b = HerdEngine::new(seeded_config()).expect("engine b");
        for _ in 0..4 {
            let report_a = a.run_cycle(&inputs);
            let report_b = b.run_cycle(&inputs);
            assert_eq!(report_a, report_b);
        }
        assert_eq!(a.cycle(), Cycle(4));
        assert_eq!(a.history().count(), 3);
        assert_eq!(a.history().next().map(|s| s.cycle), Some(Cycle(2)));
    }

    #[test]
    fn cycle_without_calibration_keeps_weights() {
        let config = EngineConfig {
            calibrate_each_cycle: false,
            ..seeded_config()
        };
        let mut engine = HerdEngine::new(config).expect("engine");
        let report = engine.run_cycle(&CycleInputs {
            suitability: None,
            month: 9,
            hazards: &[],
            start: Point::new(0.1, 0.1),
            end: Point::new(0.9, 0.9),
            observed: None,
        });
        assert!(report.calibration.is_none());
        assert_eq!(engine.weights(), Weights::default());
        assert!(report.ideal.reached);
        assert_eq!(report.observed.len(), report.ideal.points.len());
    }

    #[test]
    fn set_weights_clamps_calibrated_fields() {
        let mut engine = HerdEngine::with_dims(4, 4).expect("engine");
        engine.set_weights(Weights {
            safety: 10.0,
            resource: 0.0,
            ..Weights::default()
        });
        assert_eq!(engine.weights().safety, SAFETY_BOUNDS.1);
        assert_eq!(engine.weights().resource, RESOURCE_BOUNDS.0);
    }
}
