#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Randomized placement of the courier, the pickup flag and the drop-off flag.

use courier_core::{Cell, NavigableSet, Placement};
use courier_system_pathfinding::Pathfinder;
use rand::{seq::SliceRandom, Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of sampled triples tried before a placement search gives up.
pub const DEFAULT_ATTEMPTS: u32 = 10;

/// Tunables for the placement search.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementConfig {
    /// Maximum number of sampled triples.
    pub attempts: u32,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_ATTEMPTS,
        }
    }
}

/// Reasons a placement search may fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum PlacementError {
    /// Fewer than three road cells exist, so three distinct cells cannot be drawn.
    #[error("placement needs three road cells but only {available} exist")]
    NotEnoughCells {
        /// Number of navigable cells available.
        available: usize,
    },
    /// Every sampled triple lacked a connecting route.
    #[error("no connected placement found after {attempts} attempts")]
    Unreachable {
        /// Number of triples that were tried.
        attempts: u32,
    },
}

/// Successful placement together with the number of attempts it took.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlacementReport {
    /// Cells chosen for the courier and both flags.
    pub placement: Placement,
    /// One-based index of the attempt that succeeded.
    pub attempts: u32,
}

/// Bounded search for a connected courier/source/destination triple.
#[derive(Clone, Copy, Debug, Default)]
pub struct PlacementSearch {
    config: PlacementConfig,
    pathfinder: Pathfinder,
}

impl PlacementSearch {
    /// Creates a search with the provided retry budget and path policy.
    #[must_use]
    pub const fn new(config: PlacementConfig, pathfinder: Pathfinder) -> Self {
        Self { config, pathfinder }
    }

    /// Runs the search with a deterministic generator derived from `seed`.
    pub fn run_seeded(
        &self,
        navigable: &NavigableSet,
        seed: u64,
    ) -> Result<PlacementReport, PlacementError> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        self.run(navigable, &mut rng)
    }

    /// Samples up to the configured number of distinct triples and returns the first whose
    /// courier→source and source→destination routes both exist.
    pub fn run<R>(
        &self,
        navigable: &NavigableSet,
        rng: &mut R,
    ) -> Result<PlacementReport, PlacementError>
    where
        R: Rng + ?Sized,
    {
        if navigable.len() < 3 {
            return Err(PlacementError::NotEnoughCells {
                available: navigable.len(),
            });
        }

        for attempt in 1..=self.config.attempts {
            let sampled: Vec<Cell> = navigable
                .cells()
                .choose_multiple(rng, 3)
                .copied()
                .collect();
            let [agent, source, destination] = sampled[..] else {
                continue;
            };

            if self.connected(agent, source, navigable)
                && self.connected(source, destination, navigable)
            {
                return Ok(PlacementReport {
                    placement: Placement::new(agent, source, destination),
                    attempts: attempt,
                });
            }
        }

        Err(PlacementError::Unreachable {
            attempts: self.config.attempts,
        })
    }

    fn connected(&self, from: Cell, to: Cell, navigable: &NavigableSet) -> bool {
        from == to || !self.pathfinder.find_path(from, to, navigable).is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn too_few_cells_fail_without_sampling() {
        let navigable = NavigableSet::from_cells([Cell::new(0, 0), Cell::new(0, 1)]);

        let error = PlacementSearch::default()
            .run_seeded(&navigable, 7)
            .expect_err("two cells cannot host three placements");

        assert_eq!(error, PlacementError::NotEnoughCells { available: 2 });
    }

    #[test]
    fn zero_attempt_budget_fails_immediately() {
        let navigable =
            NavigableSet::from_cells((0..5).map(|column| Cell::new(0, column)));
        let search = PlacementSearch::new(PlacementConfig { attempts: 0 }, Pathfinder::default());

        assert_eq!(
            search.run_seeded(&navigable, 1),
            Err(PlacementError::Unreachable { attempts: 0 })
        );
    }
}
