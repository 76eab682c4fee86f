//! Property-based tests for the path search policy.

use std::collections::{HashMap, VecDeque};

use courier_core::{Cell, GridBounds, NavigableSet};
use courier_system_pathfinding::{find_path, Pathfinder, PathfinderConfig};
use proptest::prelude::*;

const SIDE: u32 = 8;

fn arb_navigable() -> impl Strategy<Value = NavigableSet> {
    prop::collection::vec(prop::bool::weighted(0.7), (SIDE * SIDE) as usize).prop_map(|mask| {
        let cells = mask
            .into_iter()
            .enumerate()
            .filter(|(_, road)| *road)
            .map(|(index, _)| Cell::new(index as u32 / SIDE, index as u32 % SIDE));
        NavigableSet::new(GridBounds::new(SIDE, SIDE), cells)
    })
}

fn arb_cell() -> impl Strategy<Value = Cell> {
    (0..SIDE, 0..SIDE).prop_map(|(row, column)| Cell::new(row, column))
}

fn breadth_first_distance(start: Cell, goal: Cell, navigable: &NavigableSet) -> Option<usize> {
    let mut distances = HashMap::from([(start, 0_usize)]);
    let mut queue = VecDeque::from([start]);
    while let Some(cell) = queue.pop_front() {
        let distance = distances[&cell];
        if cell == goal {
            return Some(distance);
        }
        for direction in [
            courier_core::Direction::East,
            courier_core::Direction::South,
            courier_core::Direction::West,
            courier_core::Direction::North,
        ] {
            if let Some(next) = cell.step(direction, navigable.bounds()) {
                if navigable.contains(next) && !distances.contains_key(&next) {
                    distances.insert(next, distance + 1);
                    queue.push_back(next);
                }
            }
        }
    }
    None
}

proptest! {
    #[test]
    fn identical_endpoints_always_yield_empty(navigable in arb_navigable(), cell in arb_cell()) {
        prop_assert!(find_path(cell, cell, &navigable).is_empty());
    }

    #[test]
    fn non_navigable_goal_yields_empty(
        navigable in arb_navigable(),
        start in arb_cell(),
        goal in arb_cell(),
    ) {
        prop_assume!(!navigable.contains(goal));
        prop_assume!(start != goal && !start.is_adjacent(goal));
        prop_assert!(find_path(start, goal, &navigable).is_empty());
    }

    #[test]
    fn verified_paths_are_valid_and_shortest(
        navigable in arb_navigable(),
        start in arb_cell(),
        goal in arb_cell(),
    ) {
        prop_assume!(start != goal);
        prop_assume!(navigable.contains(start) && navigable.contains(goal));

        let pathfinder = Pathfinder::new(PathfinderConfig { verify_shortcut: true });
        let path = pathfinder.find_path(start, goal, &navigable);
        let expected = breadth_first_distance(start, goal, &navigable);

        match expected {
            None => prop_assert!(path.is_empty()),
            Some(distance) => {
                prop_assert_eq!(path.len(), distance);
                prop_assert_eq!(path.last(), Some(goal));
                prop_assert!(start.is_adjacent(path.cells()[0]));
                for pair in path.cells().windows(2) {
                    prop_assert!(pair[0].is_adjacent(pair[1]));
                }
                prop_assert!(path.cells().iter().all(|cell| navigable.contains(*cell)));
            }
        }
    }
}
