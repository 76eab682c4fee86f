//! TOML configuration for the Smart Courier binary.

use std::{fs, path::Path, path::PathBuf};

use anyhow::{Context, Result};
use courier_core::Speed;
use courier_raster::{MapAnalyzer, MapBounds};
use courier_system_pathfinding::{Pathfinder, PathfinderConfig};
use courier_system_placement::{PlacementConfig, PlacementSearch};
use courier_system_road_mask::RoadMask;
use courier_workers::{Engines, WorkerConfig};
use serde::{Deserialize, Serialize};

/// Settings read from the configuration file and refined by command-line flags.
///
/// Every table is optional; missing keys keep their defaults. A worker count of zero runs
/// background tasks on the render thread between frames.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct Config {
    /// Map image loaded at startup; the built-in map is used when absent.
    pub(crate) map: Option<PathBuf>,
    /// Seed for the placement seed stream; drawn from entropy when absent.
    pub(crate) seed: Option<u64>,
    /// Default `tracing` filter used when `RUST_LOG` is unset.
    pub(crate) log_level: String,
    /// Initial animation speed, clamped into the supported range.
    pub(crate) speed: u32,
    pub(crate) road_mask: RoadMask,
    pub(crate) pathfinder: PathfinderConfig,
    pub(crate) placement: PlacementConfig,
    pub(crate) map_bounds: MapBounds,
    pub(crate) workers: WorkerConfig,
    pub(crate) render: RenderConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            map: None,
            seed: None,
            log_level: "info".to_owned(),
            speed: Speed::default().get(),
            road_mask: RoadMask::default(),
            pathfinder: PathfinderConfig::default(),
            placement: PlacementConfig::default(),
            map_bounds: MapBounds::default(),
            workers: WorkerConfig::default(),
            render: RenderConfig::default(),
        }
    }
}

/// Window behaviour.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct RenderConfig {
    pub(crate) vsync: bool,
    pub(crate) show_fps: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            vsync: true,
            show_fps: false,
        }
    }
}

/// Values supplied on the command line; each one that is set wins over the file.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct Overrides {
    pub(crate) map: Option<PathBuf>,
    pub(crate) seed: Option<u64>,
    pub(crate) log_level: Option<String>,
    pub(crate) speed: Option<u32>,
    pub(crate) workers: Option<usize>,
    pub(crate) verify_shortcut: bool,
    pub(crate) no_vsync: bool,
    pub(crate) show_fps: bool,
}

impl Config {
    /// Reads a configuration file.
    pub(crate) fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    /// Parses configuration from TOML text.
    pub(crate) fn from_toml(content: &str) -> Result<Self> {
        let config = toml::from_str(content)?;
        Ok(config)
    }

    /// Applies command-line overrides.
    #[must_use]
    pub(crate) fn with_overrides(mut self, overrides: Overrides) -> Self {
        let Overrides {
            map,
            seed,
            log_level,
            speed,
            workers,
            verify_shortcut,
            no_vsync,
            show_fps,
        } = overrides;

        if map.is_some() {
            self.map = map;
        }
        if seed.is_some() {
            self.seed = seed;
        }
        if let Some(log_level) = log_level {
            self.log_level = log_level;
        }
        if let Some(speed) = speed {
            self.speed = speed;
        }
        if let Some(threads) = workers {
            self.workers.threads = threads;
        }
        self.pathfinder.verify_shortcut |= verify_shortcut;
        self.render.vsync &= !no_vsync;
        self.render.show_fps |= show_fps;
        self
    }

    /// Initial speed setting.
    #[must_use]
    pub(crate) fn initial_speed(&self) -> Speed {
        Speed::new(self.speed)
    }

    /// Engines configured from the road mask, path, placement and bounds tables.
    #[must_use]
    pub(crate) fn engines(&self) -> Engines {
        let pathfinder = Pathfinder::new(self.pathfinder);
        Engines {
            analyzer: MapAnalyzer::new(self.map_bounds, self.road_mask),
            pathfinder,
            placement: PlacementSearch::new(self.placement, pathfinder),
        }
    }
}
