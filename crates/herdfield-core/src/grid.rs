//! Grid geometry and raster storage shared by every engine component.

use serde::{Deserialize, Serialize};

use crate::EngineError;

/// Position inside the landscape, nominally normalized to `[0, 1]` on both axes.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    #[must_use]
    pub fn distance_sq(self, other: Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    #[must_use]
    pub fn distance(self, other: Point) -> f64 {
        self.distance_sq(other).sqrt()
    }

    /// Heading of the displacement `from -> self`, in radians.
    #[must_use]
    pub fn bearing_from(self, from: Point) -> f64 {
        (self.y - from.y).atan2(self.x - from.x)
    }

    /// Clamp both coordinates into the unit square.
    #[must_use]
    pub fn clamped(self) -> Self {
        Self {
            x: clamp_unit(self.x),
            y: clamp_unit(self.y),
        }
    }
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}

/// Discrete grid coordinate.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Cell {
    pub row: u32,
    pub col: u32,
}

impl Cell {
    #[must_use]
    pub const fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    /// Straight-line distance measured in cells.
    #[must_use]
    pub fn distance(self, other: Cell) -> f64 {
        let dr = f64::from(self.row) - f64::from(other.row);
        let dc = f64::from(self.col) - f64::from(other.col);
        (dr * dr + dc * dc).sqrt()
    }
}

/// Immutable `(columns, rows)` pair shared by every raster of an engine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(try_from = "RawGridDims")]
pub struct GridDims {
    columns: u32,
    rows: u32,
}

#[derive(Deserialize)]
struct RawGridDims {
    columns: u32,
    rows: u32,
}

impl TryFrom<RawGridDims> for GridDims {
    type Error = EngineError;

    fn try_from(raw: RawGridDims) -> Result<Self, Self::Error> {
        GridDims::new(raw.columns, raw.rows)
    }
}

impl GridDims {
    /// Both dimensions must be at least 2 so cell-to-point conversion is defined.
    pub fn new(columns: u32, rows: u32) -> Result<Self, EngineError> {
        if columns < 2 || rows < 2 {
            return Err(EngineError::InvalidConfig(
                "grid columns and rows must both be at least 2",
            ));
        }
        Ok(Self { columns, rows })
    }

    #[must_use]
    pub const fn columns(&self) -> u32 {
        self.columns
    }

    #[must_use]
    pub const fn rows(&self) -> u32 {
        self.rows
    }

    #[must_use]
    pub const fn cell_count(&self) -> usize {
        (self.columns as usize) * (self.rows as usize)
    }

    /// Map a normalized point to its containing cell, clamping anything outside the grid.
    #[must_use]
    pub fn cell_of(&self, point: Point) -> Cell {
        Cell {
            row: axis_index(point.y, self.rows),
            col: axis_index(point.x, self.columns),
        }
    }

    /// Normalized position of a cell as used for solver output: `(col/(cols-1), row/(rows-1))`.
    #[must_use]
    pub fn point_of(&self, cell: Cell) -> Point {
        Point {
            x: f64::from(cell.col.min(self.columns - 1)) / f64::from(self.columns - 1),
            y: f64::from(cell.row.min(self.rows - 1)) / f64::from(self.rows - 1),
        }
    }

    /// Normalized centre of a cell.
    #[must_use]
    pub fn cell_center(&self, cell: Cell) -> Point {
        Point {
            x: (f64::from(cell.col) + 0.5) / f64::from(self.columns),
            y: (f64::from(cell.row) + 0.5) / f64::from(self.rows),
        }
    }

    /// Visit the up-to-eight neighbours of `cell` that lie inside the grid.
    pub fn neighbors(&self, cell: Cell, mut visit: impl FnMut(Cell)) {
        for dr in -1_i64..=1 {
            for dc in -1_i64..=1 {
                if dr == 0 && dc == 0 {
                    continue;
                }
                let row = i64::from(cell.row) + dr;
                let col = i64::from(cell.col) + dc;
                if row < 0 || col < 0 || row >= i64::from(self.rows) || col >= i64::from(self.columns)
                {
                    continue;
                }
                visit(Cell::new(row as u32, col as u32));
            }
        }
    }

    /// Returns the flat row-major index for `cell` without bounds checks.
    #[inline]
    pub(crate) fn offset(&self, cell: Cell) -> usize {
        (cell.row as usize) * (self.columns as usize) + (cell.col as usize)
    }
}

// Float-to-int `as` casts saturate (NaN -> 0, negatives -> 0), so only the upper bound needs clamping.
fn axis_index(coord: f64, extent: u32) -> u32 {
    let scaled = (coord * f64::from(extent)).floor();
    (scaled as u32).min(extent - 1)
}

/// Row-major 2D grid of scalar values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(try_from = "RawRaster")]
pub struct Raster {
    dims: GridDims,
    cells: Vec<f64>,
}

#[derive(Deserialize)]
struct RawRaster {
    dims: GridDims,
    cells: Vec<f64>,
}

impl TryFrom<RawRaster> for Raster {
    type Error = EngineError;

    fn try_from(raw: RawRaster) -> Result<Self, Self::Error> {
        if raw.cells.len() != raw.dims.cell_count() {
            return Err(EngineError::InvalidConfig(
                "raster cell count must equal columns * rows",
            ));
        }
        Ok(Self {
            dims: raw.dims,
            cells: raw.cells,
        })
    }
}

impl Raster {
    /// Construct a raster with every cell initialised to `initial`.
    #[must_use]
    pub fn new(dims: GridDims, initial: f64) -> Self {
        Self {
            dims,
            cells: vec![initial; dims.cell_count()],
        }
    }

    /// Build a raster from nested rows (outer = rows, inner = columns).
    ///
    /// Short rows are padded with `fill`; non-finite entries are replaced with `fill`.
    pub fn from_rows(rows: &[Vec<f64>], fill: f64) -> Result<Self, EngineError> {
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        let dims = GridDims::new(
            u32::try_from(width).unwrap_or(u32::MAX),
            u32::try_from(rows.len()).unwrap_or(u32::MAX),
        )?;
        let mut cells = Vec::with_capacity(dims.cell_count());
        for row in rows {
            cells.extend((0..width).map(|col| match row.get(col) {
                Some(value) if value.is_finite() => *value,
                _ => fill,
            }));
        }
        Ok(Self { dims, cells })
    }

    #[must_use]
    pub const fn dims(&self) -> GridDims {
        self.dims
    }

    #[must_use]
    pub const fn width(&self) -> u32 {
        self.dims.columns
    }

    #[must_use]
    pub const fn height(&self) -> u32 {
        self.dims.rows
    }

    #[must_use]
    pub fn cells(&self) -> &[f64] {
        &self.cells
    }

    #[must_use]
    pub fn cells_mut(&mut self) -> &mut [f64] {
        &mut self.cells
    }

    /// Immutable access to a specific cell.
    pub fn get(&self, row: u32, col: u32) -> Option<f64> {
        if row < self.dims.rows && col < self.dims.columns {
            Some(self.cells[self.dims.offset(Cell::new(row, col))])
        } else {
            None
        }
    }

    /// Mutable access to a specific cell.
    pub fn get_mut(&mut self, row: u32, col: u32) -> Option<&mut f64> {
        if row < self.dims.rows && col < self.dims.columns {
            let idx = self.dims.offset(Cell::new(row, col));
            Some(&mut self.cells[idx])
        } else {
            None
        }
    }

    /// Value at `cell`, clamping the coordinate onto the grid.
    #[must_use]
    pub fn at(&self, cell: Cell) -> f64 {
        let clamped = Cell::new(
            cell.row.min(self.dims.rows - 1),
            cell.col.min(self.dims.columns - 1),
        );
        self.cells[self.dims.offset(clamped)]
    }

    /// Nearest-cell lookup through normalized coordinates; works across resolutions.
    #[must_use]
    pub fn sample(&self, point: Point) -> f64 {
        self.at(self.dims.cell_of(point))
    }

    /// Fills the raster with the provided scalar value.
    pub fn fill(&mut self, value: f64) {
        self.cells.fill(value);
    }

    /// Iterate rows as slices, top to bottom.
    pub fn rows(&self) -> impl Iterator<Item = &[f64]> + '_ {
        self.cells.chunks(self.dims.columns as usize)
    }
}

/// Value the potential layer holds before the first field generation.
pub const NEUTRAL_POTENTIAL: f64 = 0.5;

/// Discretized landscape: the potential-field layer plus the learned bias layer.
#[derive(Debug, Clone, Serialize)]
pub struct FieldStore {
    dims: GridDims,
    potential: Raster,
    bias: Raster,
}

impl FieldStore {
    #[must_use]
    pub fn new(dims: GridDims) -> Self {
        Self {
            dims,
            potential: Raster::new(dims, NEUTRAL_POTENTIAL),
            bias: Raster::new(dims, 0.0),
        }
    }

    #[must_use]
    pub const fn dims(&self) -> GridDims {
        self.dims
    }

    #[must_use]
    pub fn cell_of(&self, point: Point) -> Cell {
        self.dims.cell_of(point)
    }

    /// Traversal cost of a cell; out-of-range indices are clamped.
    #[must_use]
    pub fn cost_at(&self, row: u32, col: u32) -> f64 {
        self.potential.at(Cell::new(row, col))
    }

    #[must_use]
    pub fn potential(&self) -> &Raster {
        &self.potential
    }

    pub(crate) fn potential_mut(&mut self) -> &mut Raster {
        &mut self.potential
    }

    #[must_use]
    pub fn bias(&self) -> &Raster {
        &self.bias
    }

    /// Write access for external learning hooks; values must stay finite.
    pub fn bias_mut(&mut self) -> &mut Raster {
        &mut self.bias
    }

    /// Set a single bias cell, sanitizing non-finite values to zero.
    pub fn set_bias(&mut self, row: u32, col: u32, value: f64) -> bool {
        match self.bias.get_mut(row, col) {
            Some(cell) => {
                *cell = if value.is_finite() { value } else { 0.0 };
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dims(columns: u32, rows: u32) -> GridDims {
        GridDims::new(columns, rows).expect("valid dims")
    }

    #[test]
    fn rejects_degenerate_dimensions() {
        assert!(GridDims::new(1, 4).is_err());
        assert!(GridDims::new(4, 0).is_err());
        assert!(GridDims::new(2, 2).is_ok());
    }

    #[test]
    fn cell_of_clamps_out_of_range_points() {
        let grid = dims(4, 3);
        assert_eq!(grid.cell_of(Point::new(0.0, 0.0)), Cell::new(0, 0));
        assert_eq!(grid.cell_of(Point::new(1.0, 1.0)), Cell::new(2, 3));
        assert_eq!(grid.cell_of(Point::new(-3.0, 7.5)), Cell::new(2, 0));
        assert_eq!(grid.cell_of(Point::new(f64::NAN, f64::INFINITY)), Cell::new(2, 0));
        assert_eq!(grid.cell_of(Point::new(0.5, 0.5)), Cell::new(1, 2));
    }

    #[test]
    fn point_of_maps_back_to_same_cell() {
        let grid = dims(5, 7);
        for row in 0..7 {
            for col in 0..5 {
                let cell = Cell::new(row, col);
                assert_eq!(grid.cell_of(grid.point_of(cell)), cell);
            }
        }
        assert_eq!(grid.point_of(Cell::new(6, 4)), Point::new(1.0, 1.0));
    }

    #[test]
    fn corner_cell_has_three_neighbors() {
        let grid = dims(4, 4);
        let mut corner = Vec::new();
        grid.neighbors(Cell::new(0, 0), |cell| corner.push(cell));
        assert_eq!(corner.len(), 3);
        let mut inner = 0;
        grid.neighbors(Cell::new(1, 1), |_| inner += 1);
        assert_eq!(inner, 8);
    }

    #[test]
    fn from_rows_pads_ragged_input() {
        let raster = Raster::from_rows(&[vec![0.1, 0.2, 0.3], vec![0.4, f64::NAN]], 0.5)
            .expect("raster");
        assert_eq!(raster.width(), 3);
        assert_eq!(raster.height(), 2);
        assert_eq!(raster.get(1, 1), Some(0.5));
        assert_eq!(raster.get(1, 2), Some(0.5));
        assert_eq!(raster.get(0, 2), Some(0.3));
        assert!(raster.get(2, 0).is_none());
    }

    #[test]
    fn deserialization_rejects_inconsistent_rasters() {
        let degenerate = serde_json::from_str::<Raster>(r#"{"dims":{"columns":0,"rows":0},"cells":[]}"#);
        assert!(degenerate.is_err());
        let short = serde_json::from_str::<Raster>(r#"{"dims":{"columns":4,"rows":4},"cells":[0.5]}"#);
        assert!(short.is_err());
        assert!(serde_json::from_str::<GridDims>(r#"{"columns":1,"rows":9}"#).is_err());

        let raster: Raster =
            serde_json::from_str(r#"{"dims":{"columns":2,"rows":2},"cells":[0.1,0.2,0.3,0.4]}"#)
                .expect("valid raster");
        assert_eq!(raster.dims(), dims(2, 2));
        assert_eq!(raster.get(1, 0), Some(0.3));
        let echoed: Raster =
            serde_json::from_str(&serde_json::to_string(&raster).expect("serialize")).expect("reparse");
        assert_eq!(echoed, raster);
    }

    #[test]
    fn store_starts_neutral_and_sanitizes_bias() {
        let mut store = FieldStore::new(dims(3, 3));
        assert!(store.potential().cells().iter().all(|&v| v == NEUTRAL_POTENTIAL));
        assert!(store.bias().cells().iter().all(|&v| v == 0.0));
        assert!(store.set_bias(1, 1, f64::INFINITY));
        assert_eq!(store.bias().get(1, 1), Some(0.0));
        assert!(store.set_bias(2, 0, 0.25));
        assert_eq!(store.bias().get(2, 0), Some(0.25));
        assert!(!store.set_bias(3, 0, 0.25));
        assert_eq!(store.cost_at(99, 99), NEUTRAL_POTENTIAL);
    }
}
