#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Map image decoding, size validation and road analysis.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use courier_core::{Cell, MapAnalysis, MapSource, RgbRaster};
use courier_system_road_mask::RoadMask;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Width of the synthesized fallback map.
pub const DEFAULT_MAP_WIDTH: u32 = 1200;
/// Height of the synthesized fallback map.
pub const DEFAULT_MAP_HEIGHT: u32 = 800;
/// Distance between the fallback map border and its road rectangle.
const DEFAULT_MAP_INSET: u32 = 100;
const DEFAULT_MAP_BACKGROUND: [u8; 3] = [255, 255, 255];
const DEFAULT_MAP_ROAD: [u8; 3] = [120, 120, 120];

/// Accepted raster dimensions, inclusive on both ends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapBounds {
    /// Narrowest accepted width in pixels.
    pub min_width: u32,
    /// Widest accepted width in pixels.
    pub max_width: u32,
    /// Shortest accepted height in pixels.
    pub min_height: u32,
    /// Tallest accepted height in pixels.
    pub max_height: u32,
}

impl MapBounds {
    /// Reports whether the provided dimensions fall inside the accepted range.
    #[must_use]
    pub const fn accepts(&self, width: u32, height: u32) -> bool {
        width >= self.min_width
            && width <= self.max_width
            && height >= self.min_height
            && height <= self.max_height
    }
}

impl Default for MapBounds {
    fn default() -> Self {
        Self {
            min_width: 1000,
            max_width: 1500,
            min_height: 700,
            max_height: 1000,
        }
    }
}

/// Errors raised while turning a map source into a raster.
#[derive(Debug, Error)]
pub enum MapLoadError {
    /// The file could not be opened or decoded as an image.
    #[error("failed to decode map image {path}")]
    Decode {
        /// File that failed to decode.
        path: PathBuf,
        /// Underlying decoder failure.
        #[source]
        source: image::ImageError,
    },
    /// In-memory bytes could not be decoded as an image.
    #[error("failed to decode map image bytes")]
    DecodeBytes(#[source] image::ImageError),
    /// The decoded raster lies outside the accepted dimensions.
    #[error(
        "map is {width}x{height} px but must be {}-{} px wide and {}-{} px tall",
        bounds.min_width,
        bounds.max_width,
        bounds.min_height,
        bounds.max_height
    )]
    Size {
        /// Width of the rejected raster.
        width: u32,
        /// Height of the rejected raster.
        height: u32,
        /// Range the raster was checked against.
        bounds: MapBounds,
    },
}

/// Checks that an already decoded raster fits the accepted dimensions.
pub fn validate(raster: &RgbRaster, bounds: MapBounds) -> Result<(), MapLoadError> {
    let (width, height) = (raster.width(), raster.height());
    if bounds.accepts(width, height) {
        Ok(())
    } else {
        Err(MapLoadError::Size {
            width,
            height,
            bounds,
        })
    }
}

/// Decodes the image at `path` into an RGB raster and validates its size.
pub fn load_raster(path: &Path, bounds: MapBounds) -> Result<RgbRaster, MapLoadError> {
    let image = image::open(path).map_err(|source| MapLoadError::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    let raster = from_image(image);
    validate(&raster, bounds)?;
    debug!(
        path = %path.display(),
        width = raster.width(),
        height = raster.height(),
        "map decoded"
    );
    Ok(raster)
}

/// Decodes encoded image bytes (PNG, JPEG or BMP) into an RGB raster and validates its size.
pub fn decode_raster(bytes: &[u8], bounds: MapBounds) -> Result<RgbRaster, MapLoadError> {
    let image = image::load_from_memory(bytes).map_err(MapLoadError::DecodeBytes)?;
    let raster = from_image(image);
    validate(&raster, bounds)?;
    Ok(raster)
}

fn from_image(image: image::DynamicImage) -> RgbRaster {
    let rgb = image.to_rgb8();
    let (width, height) = rgb.dimensions();
    RgbRaster::from_fn(width, height, |cell| {
        rgb.get_pixel(cell.column(), cell.row()).0
    })
}

/// White canvas with a gray road rectangle inset from every border.
#[must_use]
pub fn default_map() -> RgbRaster {
    let right = DEFAULT_MAP_WIDTH - DEFAULT_MAP_INSET;
    let bottom = DEFAULT_MAP_HEIGHT - DEFAULT_MAP_INSET;
    RgbRaster::from_fn(DEFAULT_MAP_WIDTH, DEFAULT_MAP_HEIGHT, |cell: Cell| {
        let column_inside = (DEFAULT_MAP_INSET..right).contains(&cell.column());
        let row_inside = (DEFAULT_MAP_INSET..bottom).contains(&cell.row());
        if column_inside && row_inside {
            DEFAULT_MAP_ROAD
        } else {
            DEFAULT_MAP_BACKGROUND
        }
    })
}

/// Turns a map source into a validated raster plus its road cells.
#[derive(Clone, Copy, Debug, Default)]
pub struct MapAnalyzer {
    bounds: MapBounds,
    mask: RoadMask,
}

impl MapAnalyzer {
    /// Creates an analyzer with the provided size limits and road color range.
    #[must_use]
    pub const fn new(bounds: MapBounds, mask: RoadMask) -> Self {
        Self { bounds, mask }
    }

    /// Accepted raster dimensions.
    #[must_use]
    pub const fn bounds(&self) -> MapBounds {
        self.bounds
    }

    /// Decodes (when needed), validates and classifies the provided source.
    pub fn analyze(&self, source: &MapSource) -> Result<MapAnalysis, MapLoadError> {
        let raster = match source {
            MapSource::File(path) => Arc::new(load_raster(path, self.bounds)?),
            MapSource::Raster(raster) => {
                validate(raster, self.bounds)?;
                Arc::clone(raster)
            }
        };

        let navigable = self.mask.build(&raster);
        if navigable.is_empty() {
            warn!("map contains no road-colored pixels");
        }

        Ok(MapAnalysis {
            raster,
            navigable: Arc::new(navigable),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_bounds_cover_documented_range() {
        let bounds = MapBounds::default();
        assert!(bounds.accepts(1000, 700));
        assert!(bounds.accepts(1500, 1000));
        assert!(!bounds.accepts(999, 800));
        assert!(!bounds.accepts(1200, 1001));
    }

    #[test]
    fn default_map_is_accepted_and_drawn_as_inset_rectangle() {
        let raster = default_map();
        assert!(validate(&raster, MapBounds::default()).is_ok());
        assert_eq!(raster.pixel(Cell::new(0, 0)), Some(DEFAULT_MAP_BACKGROUND));
        assert_eq!(raster.pixel(Cell::new(99, 99)), Some(DEFAULT_MAP_BACKGROUND));
        assert_eq!(raster.pixel(Cell::new(100, 100)), Some(DEFAULT_MAP_ROAD));
        assert_eq!(raster.pixel(Cell::new(699, 1099)), Some(DEFAULT_MAP_ROAD));
        assert_eq!(raster.pixel(Cell::new(700, 1099)), Some(DEFAULT_MAP_BACKGROUND));
    }

    #[test]
    fn size_error_mentions_dimensions() {
        let raster = RgbRaster::filled(10, 10, [0, 0, 0]);
        let error = validate(&raster, MapBounds::default()).expect_err("too small");
        assert!(error.to_string().contains("10x10"));
    }
}
