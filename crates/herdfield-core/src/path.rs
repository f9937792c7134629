//! Least-action path search over the potential field.
//!
//! Best-first search on `f = g + h`: `g` accumulates the potential of every
//! entered cell, `h` is a deliberately light Euclidean pull toward the goal.
//! A cell is closed the first time it is popped and is never reopened, even if
//! a cheaper route to it turns up later. With step costs as low as 0.01 the
//! heuristic can overestimate, so the result is near-optimal, not guaranteed optimal.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::grid::{Cell, FieldStore, Point};

/// Weight applied to the straight-line cell distance heuristic.
pub const HEURISTIC_WEIGHT: f64 = 0.1;

/// Solver output with search diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SolvedPath {
    /// Path in normalized coordinates, start first.
    pub points: Vec<Point>,
    /// Accumulated potential along the path (0 for the fallback).
    pub cost: f64,
    /// Number of cells closed during the search.
    pub expanded: usize,
    /// False when the search exhausted the grid and returned `[start, end]`.
    pub reached: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FrontierEntry {
    f: OrderedFloat<f64>,
    seq: u64,
    cell: Cell,
}

// Reversed so `BinaryHeap` pops the lowest f first; equal f pops in insertion order.
impl Ord for FrontierEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .f
            .cmp(&self.f)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for FrontierEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Typed open set keyed by f-score.
#[derive(Debug, Default)]
struct Frontier {
    heap: BinaryHeap<FrontierEntry>,
    next_seq: u64,
}

impl Frontier {
    fn push(&mut self, cell: Cell, f: f64) {
        self.heap.push(FrontierEntry {
            f: OrderedFloat(f),
            seq: self.next_seq,
            cell,
        });
        self.next_seq += 1;
    }

    fn pop(&mut self) -> Option<Cell> {
        self.heap.pop().map(|entry| entry.cell)
    }
}

/// Find the minimum-action path from `start` to `end` over `store`'s potential layer.
#[must_use]
pub fn solve(store: &FieldStore, start: Point, end: Point) -> SolvedPath {
    let dims = store.dims();
    let start_cell = dims.cell_of(start);
    let goal_cell = dims.cell_of(end);
    let heuristic = |cell: Cell| HEURISTIC_WEIGHT * cell.distance(goal_cell);

    let count = dims.cell_count();
    let mut best_g = vec![f64::INFINITY; count];
    let mut parent: Vec<Option<Cell>> = vec![None; count];
    let mut closed = vec![false; count];
    let mut frontier = Frontier::default();
    let mut expanded = 0_usize;

    best_g[dims.offset(start_cell)] = 0.0;
    frontier.push(start_cell, heuristic(start_cell));

    while let Some(current) = frontier.pop() {
        let current_idx = dims.offset(current);
        if closed[current_idx] {
            continue;
        }
        closed[current_idx] = true;
        expanded += 1;

        if current == goal_cell {
            let points = reconstruct(&parent, current, |cell| dims.offset(cell))
                .into_iter()
                .map(|cell| dims.point_of(cell))
                .collect::<Vec<_>>();
            debug!(
                expanded,
                steps = points.len(),
                cost = best_g[current_idx],
                "least-action path found"
            );
            return SolvedPath {
                points,
                cost: best_g[current_idx],
                expanded,
                reached: true,
            };
        }

        let base = best_g[current_idx];
        dims.neighbors(current, |next| {
            let next_idx = dims.offset(next);
            if closed[next_idx] {
                return;
            }
            let tentative = base + store.cost_at(next.row, next.col);
            if tentative < best_g[next_idx] {
                best_g[next_idx] = tentative;
                parent[next_idx] = Some(current);
                frontier.push(next, tentative + heuristic(next));
            }
        });
    }

    warn!(
        expanded,
        ?start_cell,
        ?goal_cell,
        "search space exhausted; falling back to direct path"
    );
    SolvedPath {
        points: vec![start, end],
        cost: 0.0,
        expanded,
        reached: false,
    }
}

fn reconstruct(
    parent: &[Option<Cell>],
    goal: Cell,
    offset: impl Fn(Cell) -> usize,
) -> Vec<Cell> {
    let mut cells = vec![goal];
    let mut cursor = goal;
    while let Some(previous) = parent[offset(cursor)] {
        cells.push(previous);
        cursor = previous;
    }
    cells.reverse();
    cells
}
