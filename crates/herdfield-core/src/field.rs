//! Potential-field generation: suitability pull, seasonal water attraction and hazard repulsion.
//!
//! Energy per cell is `v = 1 - p + r`, where `p` sums the desirability terms and
//! `r` the hazard barriers. High desirability carves valleys; hazards raise walls.

use std::f64::consts::TAU;

use tracing::debug;

use crate::grid::{Cell, FieldStore, Point, Raster};
use crate::weights::Weights;

/// Permanent water source every herd gravitates toward in the dry/wet extremes.
pub const WATER_SOURCE: Point = Point::new(0.8, 0.2);
/// Peak strength of the water attraction term.
pub const WATER_STRENGTH: f64 = 0.8;
/// Exponential decay of water attraction with normalized distance.
pub const WATER_DECAY: f64 = 6.0;
/// Exponential decay of hazard repulsion; steeper than water so hazards stay local.
pub const HAZARD_DECAY: f64 = 25.0;
/// Suitability assumed when no raster is supplied or a sample is unusable.
pub const NEUTRAL_SUITABILITY: f64 = 0.5;
/// Every potential value is clamped into this range.
pub const POTENTIAL_BOUNDS: (f64, f64) = (0.01, 3.0);

/// Everything a field generation call reads besides the engine state.
#[derive(Debug, Clone, Copy)]
pub struct FieldInputs<'a> {
    /// External suitability layer; sampled nearest-cell when its size differs from the grid.
    pub suitability: Option<&'a Raster>,
    /// Month index, nominally 1..=12.
    pub month: u32,
    /// Conflict/hazard locations in normalized coordinates.
    pub hazards: &'a [Point],
}

/// Symmetric wet/dry cycle: `|sin(2π·month/12)|`, peaking at months 3 and 9.
#[must_use]
pub fn season_impact(month: u32) -> f64 {
    (TAU * f64::from(month) / 12.0).sin().abs()
}

/// Summed repulsion of all hazards at `position`.
#[must_use]
pub fn hazard_repulsion(position: Point, hazards: &[Point], safety: f64) -> f64 {
    hazards
        .iter()
        .map(|hazard| safety * (-HAZARD_DECAY * position.distance(*hazard)).exp())
        .sum()
}

/// Water attraction at `position` for the given seasonal strength.
#[must_use]
pub fn water_attraction(position: Point, season: f64) -> f64 {
    WATER_STRENGTH * (-WATER_DECAY * position.distance(WATER_SOURCE)).exp() * season
}

/// Energy of a single cell before clamping.
fn cell_energy(
    position: Point,
    suitability: f64,
    bias: f64,
    season: f64,
    hazards: &[Point],
    weights: &Weights,
) -> f64 {
    let desirability = weights.resource * suitability + water_attraction(position, season) + bias;
    1.0 - desirability + hazard_repulsion(position, hazards, weights.safety)
}

fn clamp_potential(value: f64) -> f64 {
    if value.is_nan() {
        return POTENTIAL_BOUNDS.1;
    }
    value.clamp(POTENTIAL_BOUNDS.0, POTENTIAL_BOUNDS.1)
}

/// Recompute the whole potential layer of `store` in place and return it.
pub fn generate<'s>(
    store: &'s mut FieldStore,
    weights: &Weights,
    inputs: &FieldInputs<'_>,
) -> &'s Raster {
    if !(1..=12).contains(&inputs.month) {
        debug!(month = inputs.month, "month outside 1..=12; seasonal term wraps");
    }
    let season = season_impact(inputs.month);
    let dims = store.dims();
    let columns = dims.columns();

    let mut next = Vec::with_capacity(dims.cell_count());
    for (idx, &bias) in store.bias().cells().iter().enumerate() {
        let cell = Cell::new((idx / columns as usize) as u32, (idx % columns as usize) as u32);
        let position = dims.cell_center(cell);
        let suitability = inputs
            .suitability
            .map(|raster| raster.sample(position))
            .filter(|value| value.is_finite())
            .unwrap_or(NEUTRAL_SUITABILITY);
        let energy = cell_energy(position, suitability, bias, season, inputs.hazards, weights);
        next.push(clamp_potential(energy));
    }

    let potential = store.potential_mut();
    potential.cells_mut().copy_from_slice(&next);
    debug!(
        month = inputs.month,
        season,
        hazards = inputs.hazards.len(),
        external_suitability = inputs.suitability.is_some(),
        "potential field regenerated"
    );
    store.potential()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::GridDims;

    fn store(columns: u32, rows: u32) -> FieldStore {
        FieldStore::new(GridDims::new(columns, rows).expect("dims"))
    }

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() <= epsilon
    }

    #[test]
    fn season_peaks_at_months_three_and_nine() {
        assert!(approx_eq(season_impact(3), 1.0, 1e-12));
        assert!(approx_eq(season_impact(9), 1.0, 1e-12));
        assert!(season_impact(6) < 1e-12);
        assert!(season_impact(12) < 1e-12);
        assert!(approx_eq(season_impact(1), 0.5, 1e-12));
    }

    #[test]
    fn neutral_field_without_season_or_hazards_is_flat() {
        let mut store = store(6, 4);
        let weights = Weights::default();
        let raster = generate(
            &mut store,
            &weights,
            &FieldInputs {
                suitability: None,
                month: 6,
                hazards: &[],
            },
        );
        let expected = 1.0 - weights.resource * NEUTRAL_SUITABILITY;
        for &value in raster.cells() {
            assert!(approx_eq(value, expected, 1e-9), "value {value}");
        }
    }

    #[test]
    fn bias_lowers_energy_of_its_cell() {
        let mut store = store(4, 4);
        store.set_bias(2, 1, 0.3);
        let inputs = FieldInputs {
            suitability: None,
            month: 12,
            hazards: &[],
        };
        let raster = generate(&mut store, &Weights::default(), &inputs).clone();
        let biased = raster.get(2, 1).expect("cell");
        let plain = raster.get(2, 2).expect("cell");
        assert!(approx_eq(plain - biased, 0.3, 1e-9));
    }

    #[test]
    fn mismatched_suitability_is_resampled() {
        let mut store = store(8, 8);
        let suitability =
            Raster::from_rows(&[vec![1.0, 0.0], vec![1.0, 0.0]], NEUTRAL_SUITABILITY)
                .expect("suitability");
        let raster = generate(
            &mut store,
            &Weights::default(),
            &FieldInputs {
                suitability: Some(&suitability),
                month: 6,
                hazards: &[],
            },
        );
        // Left half is fully suitable, right half barren.
        let left = raster.get(4, 0).expect("left");
        let right = raster.get(4, 7).expect("right");
        assert!(left < right);
    }

    #[test]
    fn hazard_raises_energy_and_stays_clamped() {
        let mut store = store(10, 10);
        let hazard = Point::new(0.55, 0.55);
        let weights = Weights {
            safety: 50.0,
            ..Weights::default()
        };
        let raster = generate(
            &mut store,
            &weights,
            &FieldInputs {
                suitability: None,
                month: 6,
                hazards: &[hazard],
            },
        );
        assert_eq!(raster.get(5, 5), Some(POTENTIAL_BOUNDS.1));
        assert!(
            raster
                .cells()
                .iter()
                .all(|v| (POTENTIAL_BOUNDS.0..=POTENTIAL_BOUNDS.1).contains(v))
        );
    }
}
