//! Per-frame glue between the control panel, the background workers and the world.

use std::{collections::VecDeque, mem, sync::Arc, time::Duration};

use courier_core::{Command, Event, MapSource, RgbRaster, Speed};
use courier_rendering::{rejection_message, FrameInput, Scene};
use courier_workers::{Dispatcher, Task, WorkerError};
use courier_world::{self as world, query, World};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, warn};

/// Owns the world and routes its background requests through a [`Dispatcher`].
#[derive(Debug)]
pub(crate) struct Simulation<D> {
    world: World,
    dispatcher: D,
    seeds: ChaCha8Rng,
    fallback_map: Option<Arc<RgbRaster>>,
    notice: Option<String>,
    events: Vec<Event>,
}

impl<D: Dispatcher> Simulation<D> {
    /// Creates a simulation with no map installed.
    pub(crate) fn new(dispatcher: D, speed: Speed, seed: u64) -> Self {
        Self {
            world: World::with_speed(speed),
            dispatcher,
            seeds: ChaCha8Rng::seed_from_u64(seed),
            fallback_map: None,
            notice: None,
            events: Vec::new(),
        }
    }

    /// Installs `raster` instead when a file load fails while no map is active.
    #[must_use]
    pub(crate) fn with_fallback_map(mut self, raster: Arc<RgbRaster>) -> Self {
        self.fallback_map = Some(raster);
        self
    }

    /// Requests that a map be loaded.
    pub(crate) fn load_map(&mut self, source: MapSource) {
        self.execute(Command::LoadMap { source });
    }

    /// Runs one frame: applies finished background work, then user controls, then animation.
    pub(crate) fn frame(&mut self, dt: Duration, input: FrameInput) -> Scene {
        for result in self.dispatcher.drain() {
            self.execute(result.into_command());
        }
        self.handle_input(input);
        self.execute(Command::Tick { dt });
        self.scene()
    }

    /// Scene reflecting the current world state.
    #[must_use]
    pub(crate) fn scene(&self) -> Scene {
        let mut scene = Scene::from_snapshot(&query::snapshot(&self.world));
        scene.status.notice = self.notice.clone();
        scene
    }

    fn handle_input(&mut self, input: FrameInput) {
        if input.is_idle() {
            return;
        }
        self.notice = None;

        let FrameInput {
            randomize,
            start,
            stop,
            load_map,
            speed,
        } = input;

        if let Some(path) = load_map {
            info!(path = %path.display(), "loading map");
            self.execute(Command::LoadMap {
                source: MapSource::File(path),
            });
        }
        if let Some(speed) = speed {
            self.execute(Command::SetSpeed { speed });
        }
        if stop {
            self.execute(Command::StopDelivery);
        }
        if randomize {
            let seed = self.seeds.gen();
            self.execute(Command::RandomizePlacement { seed });
        }
        if start {
            self.execute(Command::StartDelivery);
        }
    }

    fn execute(&mut self, command: Command) {
        let mut queue = VecDeque::from([command]);
        let mut events = mem::take(&mut self.events);

        while let Some(command) = queue.pop_front() {
            world::apply(&mut self.world, command, &mut events);
            for event in events.drain(..) {
                if let Some(follow_up) = self.observe(&event) {
                    queue.push_back(follow_up);
                }
                let Some(task) = Task::from_event(&event) else {
                    continue;
                };
                if let Err(error) = self.dispatcher.submit(task.clone()) {
                    warn!(%error, generation = task.generation().get(), "background task refused");
                    self.notice = Some(format!("Background work refused: {error}"));
                    queue.push_back(refusal(task, &error));
                }
            }
        }

        self.events = events;
    }

    fn observe(&mut self, event: &Event) -> Option<Command> {
        match event {
            Event::MapInstalled {
                bounds,
                navigable_cells,
            } => {
                info!(
                    rows = bounds.rows(),
                    columns = bounds.columns(),
                    navigable_cells,
                    "map installed"
                );
                self.notice = None;
            }
            Event::InsufficientRoadArea { navigable_cells } => {
                self.notice = Some(format!("Map has only {navigable_cells} road cells"));
            }
            Event::MapLoadFailed { reason } => {
                self.notice = Some(format!("Map load failed: {reason}"));
                if query::map_view(&self.world).is_none() {
                    if let Some(raster) = self.fallback_map.take() {
                        info!("falling back to the built-in map");
                        return Some(Command::LoadMap {
                            source: MapSource::Raster(raster),
                        });
                    }
                }
            }
            Event::OperationRejected { reason } => {
                debug!(?reason, "control rejected");
                self.notice = Some(rejection_message(*reason).to_owned());
            }
            Event::StaleResultDiscarded { generation } => {
                debug!(generation = generation.get(), "stale result discarded");
            }
            Event::Outcome { outcome } => {
                info!(?outcome, "delivery outcome");
            }
            _ => {}
        }
        None
    }
}

fn refusal(task: Task, error: &WorkerError) -> Command {
    match task {
        Task::AnalyzeMap { generation, .. } => Command::RejectMapAnalysis {
            generation,
            reason: error.to_string(),
        },
        Task::Place { generation, .. } => Command::RejectPlacement {
            generation,
            attempts: 0,
        },
        Task::ComputePath { .. } => Command::StopDelivery,
    }
}
