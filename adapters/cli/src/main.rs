#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that boots the Smart Courier window.

mod config;
mod simulation;

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use courier_core::{MapSource, WINDOW_TITLE};
use courier_raster::default_map;
use courier_rendering::{palette, Presentation, RenderingBackend};
use courier_rendering_macroquad::MacroquadBackend;
use courier_workers::{Dispatcher, InlineDispatcher, WorkerPool};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::{
    config::{Config, Overrides},
    simulation::Simulation,
};

/// Command-line arguments for the Smart Courier binary.
#[derive(Debug, Parser)]
#[command(name = "smart-courier", about = "Animated courier delivering packages across a road map")]
struct CliArgs {
    /// Map image to load at startup.
    #[arg(long, value_name = "PATH")]
    map: Option<PathBuf>,

    /// TOML configuration file.
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Initial speed setting between 1 and 30.
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=30))]
    speed: Option<u32>,

    /// Seed for reproducible placements.
    #[arg(long)]
    seed: Option<u64>,

    /// Number of background worker threads; 0 runs tasks between frames.
    #[arg(long)]
    workers: Option<usize>,

    /// Only accept straight-line shortcuts whose cells are all road.
    #[arg(long)]
    verify_shortcut: bool,

    /// Disables vertical sync.
    #[arg(long)]
    no_vsync: bool,

    /// Shows the frame rate in the window title.
    #[arg(long)]
    show_fps: bool,

    /// Log filter used when `RUST_LOG` is unset.
    #[arg(long, value_name = "FILTER")]
    log_level: Option<String>,
}

impl CliArgs {
    fn into_overrides(self) -> (Option<PathBuf>, Overrides) {
        let overrides = Overrides {
            map: self.map,
            seed: self.seed,
            log_level: self.log_level,
            speed: self.speed,
            workers: self.workers,
            verify_shortcut: self.verify_shortcut,
            no_vsync: self.no_vsync,
            show_fps: self.show_fps,
        };
        (self.config, overrides)
    }
}

/// Entry point for the Smart Courier command-line interface.
fn main() -> Result<()> {
    let (config_path, overrides) = CliArgs::parse().into_overrides();
    let config = match config_path {
        Some(path) => Config::from_file(&path)?,
        None => Config::default(),
    }
    .with_overrides(overrides);

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str())),
        )
        .init();

    let seed = config.seed.unwrap_or_else(rand::random);
    info!(seed, threads = config.workers.threads, "starting smart courier");

    let engines = config.engines();
    if config.workers.threads == 0 {
        run(&config, InlineDispatcher::new(engines), seed)
    } else {
        let pool =
            WorkerPool::spawn(config.workers, engines).context("failed to start worker pool")?;
        run(&config, pool, seed)
    }
}

fn run<D>(config: &Config, dispatcher: D, seed: u64) -> Result<()>
where
    D: Dispatcher + 'static,
{
    let fallback = Arc::new(default_map());
    let mut simulation = Simulation::new(dispatcher, config.initial_speed(), seed)
        .with_fallback_map(Arc::clone(&fallback));

    let mut backend = MacroquadBackend::new()
        .with_vsync(config.render.vsync)
        .with_show_fps(config.render.show_fps);
    match &config.map {
        Some(path) => {
            backend = backend.with_map_path(path.display().to_string());
            simulation.load_map(MapSource::File(path.clone()));
        }
        None => simulation.load_map(MapSource::Raster(fallback)),
    }

    let presentation = Presentation::new(WINDOW_TITLE, palette::BACKGROUND, simulation.scene());
    backend.run(presentation, move |dt, input, scene| {
        *scene = simulation.frame(dt, input);
    })
}
