#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Deterministic shortest-path search over navigable raster cells.
//!
//! Requests are resolved by a fixed policy: trivial requests are answered
//! without searching, axis-aligned requests take a straight-line shortcut,
//! and everything else runs a best-first grid search. The functions here
//! never fail; an empty [`Path`] signals either "already there" or "no route"
//! and the caller decides which one applies.

use std::{
    cmp::Reverse,
    collections::{BinaryHeap, HashMap, HashSet},
};

use courier_core::{Cell, Direction, NavigableSet, Path};
use serde::{Deserialize, Serialize};

/// Fixed neighbour expansion order; ties between equal-cost entries follow it.
const SEARCH_ORDER: [Direction; 4] = [
    Direction::East,
    Direction::South,
    Direction::West,
    Direction::North,
];

/// Tunables for the path search policy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathfinderConfig {
    /// Requires every rasterized shortcut cell to be navigable before the
    /// shortcut is taken. When disabled, axis-aligned requests are answered
    /// with the raw segment even if it crosses non-road pixels.
    pub verify_shortcut: bool,
}

/// Path search configured with a [`PathfinderConfig`].
#[derive(Clone, Copy, Debug, Default)]
pub struct Pathfinder {
    config: PathfinderConfig,
}

impl Pathfinder {
    /// Creates a pathfinder with the provided configuration.
    #[must_use]
    pub const fn new(config: PathfinderConfig) -> Self {
        Self { config }
    }

    /// Configuration used by the pathfinder.
    #[must_use]
    pub const fn config(&self) -> PathfinderConfig {
        self.config
    }

    /// Computes a route from `start` to `goal` over the navigable cells.
    ///
    /// Resolution order:
    /// 1. identical endpoints yield an empty path;
    /// 2. adjacent endpoints yield `[goal]` without consulting `navigable`;
    /// 3. a non-navigable endpoint yields an empty path;
    /// 4. endpoints sharing a row or column yield the rasterized segment;
    /// 5. otherwise a best-first grid search runs.
    #[must_use]
    pub fn find_path(&self, start: Cell, goal: Cell, navigable: &NavigableSet) -> Path {
        if start == goal {
            return Path::empty();
        }

        if start.is_adjacent(goal) {
            return Path::new(vec![goal]);
        }

        if !navigable.contains(start) || !navigable.contains(goal) {
            return Path::empty();
        }

        if start.row() == goal.row() || start.column() == goal.column() {
            let segment = rasterize_segment(start, goal);
            if !self.config.verify_shortcut || segment.iter().all(|cell| navigable.contains(*cell))
            {
                return Path::new(segment);
            }
        }

        grid_search(start, goal, navigable)
    }
}

/// Computes a route using the default configuration.
#[must_use]
pub fn find_path(start: Cell, goal: Cell, navigable: &NavigableSet) -> Path {
    Pathfinder::default().find_path(start, goal, navigable)
}

/// Rasterizes the segment between two cells using Bresenham's algorithm.
///
/// The returned cells start with the first step after `from` and end with `to`.
#[must_use]
pub fn rasterize_segment(from: Cell, to: Cell) -> Vec<Cell> {
    let (mut x, mut y) = (i64::from(from.column()), i64::from(from.row()));
    let (target_x, target_y) = (i64::from(to.column()), i64::from(to.row()));

    let dx = (target_x - x).abs();
    let dy = -(target_y - y).abs();
    let step_x = if x < target_x { 1 } else { -1 };
    let step_y = if y < target_y { 1 } else { -1 };
    let mut error = dx + dy;

    let capacity = usize::try_from(dx.max(-dy)).unwrap_or(0);
    let mut cells = Vec::with_capacity(capacity);
    while x != target_x || y != target_y {
        let doubled = 2 * error;
        if doubled >= dy {
            error += dy;
            x += step_x;
        }
        if doubled <= dx {
            error += dx;
            y += step_y;
        }
        // Both coordinates stay between the endpoints, so they fit in u32.
        cells.push(Cell::new(y as u32, x as u32));
    }
    cells
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct FrontierEntry {
    estimate: u32,
    sequence: u64,
    cell: Cell,
}

/// Best-first search ordered by `g + h` with orthogonal unit steps.
///
/// The heuristic is the Chebyshev distance. Moves are strictly orthogonal, so
/// the true remaining cost is the Manhattan distance; Chebyshev never exceeds
/// it and stays admissible and consistent, but it is loose on diagonal offsets
/// and expands more cells than a Manhattan estimate would.
fn grid_search(start: Cell, goal: Cell, navigable: &NavigableSet) -> Path {
    let bounds = navigable.bounds();
    let mut frontier = BinaryHeap::new();
    let mut expanded: HashSet<Cell> = HashSet::new();
    let mut came_from: HashMap<Cell, Cell> = HashMap::new();
    let mut cost_so_far: HashMap<Cell, u32> = HashMap::new();
    let mut sequence = 0_u64;

    let _ = cost_so_far.insert(start, 0);
    frontier.push(Reverse(FrontierEntry {
        estimate: start.chebyshev_distance(goal),
        sequence,
        cell: start,
    }));

    while let Some(Reverse(entry)) = frontier.pop() {
        let current = entry.cell;
        if !expanded.insert(current) {
            continue;
        }

        if current == goal {
            return reconstruct(&came_from, start, goal);
        }

        let cost = cost_so_far.get(&current).copied().unwrap_or(u32::MAX);
        let next_cost = cost.saturating_add(1);

        for direction in SEARCH_ORDER {
            let Some(neighbor) = current.step(direction, bounds) else {
                continue;
            };
            if !navigable.contains(neighbor) || expanded.contains(&neighbor) {
                continue;
            }

            // The cost table doubles as the frontier membership guard: a cell is
            // pushed again only when its cost strictly improves, and the
            // superseded entry is skipped once the cell has been expanded.
            let improves = cost_so_far
                .get(&neighbor)
                .map_or(true, |&known| next_cost < known);
            if !improves {
                continue;
            }

            let _ = came_from.insert(neighbor, current);
            let _ = cost_so_far.insert(neighbor, next_cost);
            sequence += 1;
            frontier.push(Reverse(FrontierEntry {
                estimate: next_cost.saturating_add(neighbor.chebyshev_distance(goal)),
                sequence,
                cell: neighbor,
            }));
        }
    }

    Path::empty()
}

fn reconstruct(came_from: &HashMap<Cell, Cell>, start: Cell, goal: Cell) -> Path {
    let mut cells = vec![goal];
    let mut current = goal;
    while let Some(&previous) = came_from.get(&current) {
        if previous == start {
            break;
        }
        cells.push(previous);
        current = previous;
    }
    cells.reverse();
    Path::new(cells)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rasterize_horizontal_segment_excludes_origin() {
        let cells = rasterize_segment(Cell::new(2, 5), Cell::new(2, 2));
        assert_eq!(cells, vec![Cell::new(2, 4), Cell::new(2, 3), Cell::new(2, 2)]);
    }

    #[test]
    fn rasterize_vertical_segment_walks_rows() {
        let cells = rasterize_segment(Cell::new(0, 3), Cell::new(3, 3));
        assert_eq!(cells, vec![Cell::new(1, 3), Cell::new(2, 3), Cell::new(3, 3)]);
    }

    #[test]
    fn rasterize_diagonal_segment_ends_at_target() {
        let cells = rasterize_segment(Cell::new(0, 0), Cell::new(2, 4));
        assert_eq!(cells.len(), 4);
        assert_eq!(cells.last(), Some(&Cell::new(2, 4)));
    }

    #[test]
    fn reconstruct_omits_start_and_keeps_order() {
        let start = Cell::new(0, 0);
        let mut came_from = HashMap::new();
        let _ = came_from.insert(Cell::new(0, 1), start);
        let _ = came_from.insert(Cell::new(1, 1), Cell::new(0, 1));
        let path = reconstruct(&came_from, start, Cell::new(1, 1));
        assert_eq!(path.cells(), &[Cell::new(0, 1), Cell::new(1, 1)]);
    }

    #[test]
    fn equal_cost_ties_prefer_eastward_expansion() {
        let navigable = NavigableSet::from_cells((0..3).flat_map(|row| {
            (0..3).map(move |column| Cell::new(row, column))
        }));
        let path = grid_search(Cell::new(0, 0), Cell::new(2, 2), &navigable);
        assert_eq!(path.len(), 4);
        assert_eq!(path.get(0), Some(Cell::new(0, 1)));
    }
}
