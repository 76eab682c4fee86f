#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Pure system that classifies raster pixels into road and non-road cells.

use courier_core::{NavigableSet, RgbRaster};
use serde::{Deserialize, Serialize};

/// Lowest channel value accepted as road by default.
pub const DEFAULT_LOW: u8 = 90;
/// Highest channel value accepted as road by default.
pub const DEFAULT_HIGH: u8 = 150;
/// Number of road cells below which a map is considered unusable.
pub const USABLE_ROAD_FLOOR: usize = 10;

/// Inclusive per-channel color range that identifies road pixels.
///
/// A pixel is road only when all three channels independently fall inside
/// `low..=high`; gray asphalt passes while saturated colors and white
/// background fail even when their average brightness would match.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "RoadMaskTable")]
pub struct RoadMask {
    low: u8,
    high: u8,
}

/// Serialized form of [`RoadMask`]; converted through [`RoadMask::new`] so
/// reversed bounds are normalized on load.
#[derive(Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RoadMaskTable {
    low: u8,
    high: u8,
}

impl Default for RoadMaskTable {
    fn default() -> Self {
        Self {
            low: DEFAULT_LOW,
            high: DEFAULT_HIGH,
        }
    }
}

impl From<RoadMaskTable> for RoadMask {
    fn from(table: RoadMaskTable) -> Self {
        Self::new(table.low, table.high)
    }
}

impl Default for RoadMask {
    fn default() -> Self {
        Self {
            low: DEFAULT_LOW,
            high: DEFAULT_HIGH,
        }
    }
}

impl RoadMask {
    /// Creates a mask accepting channels inside `low..=high`, swapping the bounds if reversed.
    #[must_use]
    pub const fn new(low: u8, high: u8) -> Self {
        if low <= high {
            Self { low, high }
        } else {
            Self {
                low: high,
                high: low,
            }
        }
    }

    /// Lowest accepted channel value.
    #[must_use]
    pub const fn low(&self) -> u8 {
        self.low
    }

    /// Highest accepted channel value.
    #[must_use]
    pub const fn high(&self) -> u8 {
        self.high
    }

    /// Reports whether a single pixel is road.
    #[must_use]
    pub fn is_road(&self, rgb: [u8; 3]) -> bool {
        rgb.iter()
            .all(|channel| (self.low..=self.high).contains(channel))
    }

    /// Derives the navigable cell set from the provided raster.
    ///
    /// An empty raster yields an empty set; callers decide whether the result
    /// is large enough to be useful via [`is_usable`].
    #[must_use]
    pub fn build(&self, raster: &RgbRaster) -> NavigableSet {
        NavigableSet::new(
            raster.bounds(),
            raster
                .pixels()
                .filter(|(_, rgb)| self.is_road(*rgb))
                .map(|(cell, _)| cell),
        )
    }
}

/// Reports whether a navigable set reaches the usability floor.
#[must_use]
pub fn is_usable(navigable: &NavigableSet) -> bool {
    navigable.len() >= USABLE_ROAD_FLOOR
}
