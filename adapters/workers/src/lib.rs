#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Bounded background worker pool for map analysis, placement search and path computation.
//!
//! The render thread submits [`Task`]s with [`WorkerPool::submit`], which never blocks: a full
//! queue is reported as [`WorkerError::QueueFull`]. Workers push one [`TaskResult`] per task onto
//! a single completion channel that the render thread drains once per frame with
//! [`WorkerPool::drain`]. Results carry the generation of the request that produced them and are
//! turned back into world commands with [`TaskResult::into_command`].

use std::{
    io,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
    thread::{self, JoinHandle},
    time::Duration,
};

use courier_core::{
    Cell, Command, DeliveryLeg, Event, Generation, MapAnalysis, MapSource, NavigableSet, Path,
    Placement,
};
use courier_raster::MapAnalyzer;
use courier_system_pathfinding::Pathfinder;
use courier_system_placement::{PlacementError, PlacementSearch};
use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Sizing of the worker pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Number of worker threads.
    pub threads: usize,
    /// Number of tasks that may wait in the queue before submissions are refused.
    pub queue_capacity: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            threads: 2,
            queue_capacity: 32,
        }
    }
}

/// Errors surfaced by the worker pool.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// A worker thread could not be started.
    #[error("failed to spawn worker thread")]
    Spawn(#[source] io::Error),
    /// The task queue is at capacity.
    #[error("worker queue is full")]
    QueueFull,
    /// All workers have exited.
    #[error("worker pool has shut down")]
    Disconnected,
}

/// Unit of background work.
#[derive(Clone, Debug, PartialEq)]
pub enum Task {
    /// Decode, validate and classify a map.
    AnalyzeMap {
        /// Generation of the originating request.
        generation: Generation,
        /// Map to analyse.
        source: MapSource,
    },
    /// Search for a connected courier/source/destination triple.
    Place {
        /// Generation of the originating request.
        generation: Generation,
        /// Seed for the placement search.
        seed: u64,
        /// Road cells to sample from.
        navigable: Arc<NavigableSet>,
    },
    /// Compute the route for one delivery leg.
    ComputePath {
        /// Generation of the originating request.
        generation: Generation,
        /// Leg the route belongs to.
        leg: DeliveryLeg,
        /// Start cell.
        from: Cell,
        /// Goal cell.
        to: Cell,
        /// Road cells to search over.
        navigable: Arc<NavigableSet>,
    },
}

impl Task {
    /// Extracts the background task requested by a world event, if any.
    #[must_use]
    pub fn from_event(event: &Event) -> Option<Self> {
        match event {
            Event::MapAnalysisRequested { generation, source } => Some(Self::AnalyzeMap {
                generation: *generation,
                source: source.clone(),
            }),
            Event::PlacementRequested {
                generation,
                seed,
                navigable,
            } => Some(Self::Place {
                generation: *generation,
                seed: *seed,
                navigable: Arc::clone(navigable),
            }),
            Event::PathRequested {
                generation,
                leg,
                from,
                to,
                navigable,
            } => Some(Self::ComputePath {
                generation: *generation,
                leg: *leg,
                from: *from,
                to: *to,
                navigable: Arc::clone(navigable),
            }),
            _ => None,
        }
    }

    /// Generation of the request that produced the task.
    #[must_use]
    pub fn generation(&self) -> Generation {
        match self {
            Self::AnalyzeMap { generation, .. }
            | Self::Place { generation, .. }
            | Self::ComputePath { generation, .. } => *generation,
        }
    }
}

/// Typed outcome of a background task.
#[derive(Clone, Debug, PartialEq)]
pub enum TaskResult {
    /// The map was decoded and classified.
    MapAnalyzed {
        /// Generation of the originating request.
        generation: Generation,
        /// Decoded raster and road cells.
        analysis: MapAnalysis,
    },
    /// The map could not be loaded.
    MapFailed {
        /// Generation of the originating request.
        generation: Generation,
        /// Human-readable failure description.
        reason: String,
    },
    /// A connected placement was found.
    Placed {
        /// Generation of the originating request.
        generation: Generation,
        /// Cells chosen for the courier and both flags.
        placement: Placement,
    },
    /// The placement search gave up.
    PlacementFailed {
        /// Generation of the originating request.
        generation: Generation,
        /// Number of triples that were tried.
        attempts: u32,
    },
    /// A route was computed; empty when none exists.
    PathComputed {
        /// Generation of the originating request.
        generation: Generation,
        /// Leg the route belongs to.
        leg: DeliveryLeg,
        /// Computed route.
        path: Path,
    },
}

impl TaskResult {
    /// Converts the result into the world command that applies it.
    #[must_use]
    pub fn into_command(self) -> Command {
        match self {
            Self::MapAnalyzed {
                generation,
                analysis,
            } => Command::ApplyMapAnalysis {
                generation,
                analysis,
            },
            Self::MapFailed { generation, reason } => {
                Command::RejectMapAnalysis { generation, reason }
            }
            Self::Placed {
                generation,
                placement,
            } => Command::ApplyPlacement {
                generation,
                placement,
            },
            Self::PlacementFailed {
                generation,
                attempts,
            } => Command::RejectPlacement {
                generation,
                attempts,
            },
            Self::PathComputed {
                generation,
                leg,
                path,
            } => Command::ApplyPath {
                generation,
                leg,
                path,
            },
        }
    }
}

/// Pure engines executed by the workers.
#[derive(Clone, Copy, Debug, Default)]
pub struct Engines {
    /// Map decoding and road classification.
    pub analyzer: MapAnalyzer,
    /// Route computation.
    pub pathfinder: Pathfinder,
    /// Randomized placement search.
    pub placement: PlacementSearch,
}

impl Engines {
    /// Runs the task to completion on the calling thread.
    #[must_use]
    pub fn execute(&self, task: Task) -> TaskResult {
        match task {
            Task::AnalyzeMap { generation, source } => match self.analyzer.analyze(&source) {
                Ok(analysis) => TaskResult::MapAnalyzed {
                    generation,
                    analysis,
                },
                Err(error) => {
                    warn!(%error, "map analysis failed");
                    TaskResult::MapFailed {
                        generation,
                        reason: error_chain(&error),
                    }
                }
            },
            Task::Place {
                generation,
                seed,
                navigable,
            } => match self.placement.run_seeded(&navigable, seed) {
                Ok(report) => {
                    debug!(attempts = report.attempts, "placement found");
                    TaskResult::Placed {
                        generation,
                        placement: report.placement,
                    }
                }
                Err(error) => {
                    warn!(%error, "placement search failed");
                    let attempts = match error {
                        PlacementError::Unreachable { attempts } => attempts,
                        PlacementError::NotEnoughCells { .. } => 0,
                    };
                    TaskResult::PlacementFailed {
                        generation,
                        attempts,
                    }
                }
            },
            Task::ComputePath {
                generation,
                leg,
                from,
                to,
                navigable,
            } => {
                let path = self.pathfinder.find_path(from, to, &navigable);
                debug!(?leg, %from, %to, length = path.len(), "path computed");
                TaskResult::PathComputed {
                    generation,
                    leg,
                    path,
                }
            }
        }
    }
}

/// Runs `execute` for `task`, reporting a panic as the task's failure result.
fn run_guarded(task: Task, execute: impl FnOnce(Task) -> TaskResult) -> TaskResult {
    let generation = task.generation();
    let failure = panic_result(&task);
    match panic::catch_unwind(AssertUnwindSafe(move || execute(task))) {
        Ok(result) => result,
        Err(_) => {
            warn!(generation = generation.get(), "task panicked");
            failure
        }
    }
}

fn panic_result(task: &Task) -> TaskResult {
    match task {
        Task::AnalyzeMap { generation, .. } => TaskResult::MapFailed {
            generation: *generation,
            reason: "map analysis panicked".to_owned(),
        },
        Task::Place { generation, .. } => TaskResult::PlacementFailed {
            generation: *generation,
            attempts: 0,
        },
        Task::ComputePath { generation, leg, .. } => TaskResult::PathComputed {
            generation: *generation,
            leg: *leg,
            path: Path::empty(),
        },
    }
}

fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Fixed set of worker threads fed by a bounded task queue.
#[derive(Debug)]
pub struct WorkerPool {
    tasks: Option<Sender<Task>>,
    results: Receiver<TaskResult>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Starts `config.threads` workers (at least one) sharing the provided engines.
    pub fn spawn(config: WorkerConfig, engines: Engines) -> Result<Self, WorkerError> {
        let (task_sender, task_receiver) = bounded::<Task>(config.queue_capacity.max(1));
        let (result_sender, result_receiver) = unbounded::<TaskResult>();

        let mut workers = Vec::with_capacity(config.threads.max(1));
        for index in 0..config.threads.max(1) {
            let tasks = task_receiver.clone();
            let results = result_sender.clone();
            let handle = thread::Builder::new()
                .name(format!("courier-worker-{index}"))
                .spawn(move || work(index, &engines, &tasks, &results))
                .map_err(WorkerError::Spawn)?;
            workers.push(handle);
        }
        debug!(threads = workers.len(), "worker pool started");

        Ok(Self {
            tasks: Some(task_sender),
            results: result_receiver,
            workers,
        })
    }

    /// Queues a task without blocking.
    pub fn submit(&self, task: Task) -> Result<(), WorkerError> {
        let Some(tasks) = self.tasks.as_ref() else {
            return Err(WorkerError::Disconnected);
        };
        match tasks.try_send(task) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(task)) => {
                warn!(generation = task.generation().get(), "worker queue full");
                Err(WorkerError::QueueFull)
            }
            Err(TrySendError::Disconnected(_)) => Err(WorkerError::Disconnected),
        }
    }

    /// Collects every result that is ready without waiting.
    #[must_use]
    pub fn drain(&self) -> Vec<TaskResult> {
        self.results.try_iter().collect()
    }

    /// Waits up to `timeout` for the next result.
    #[must_use]
    pub fn wait(&self, timeout: Duration) -> Option<TaskResult> {
        match self.results.recv_timeout(timeout) {
            Ok(result) => Some(result),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Number of worker threads.
    #[must_use]
    pub fn threads(&self) -> usize {
        self.workers.len()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        drop(self.tasks.take());
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                warn!("worker thread panicked");
            }
        }
        debug!("worker pool stopped");
    }
}

/// Destination for background tasks and source of their results.
///
/// Implemented by [`WorkerPool`] for threaded execution and by [`InlineDispatcher`], which runs
/// each task on the submitting thread and holds the result until the next drain.
pub trait Dispatcher {
    /// Accepts a task for execution.
    fn submit(&mut self, task: Task) -> Result<(), WorkerError>;

    /// Collects every finished result.
    fn drain(&mut self) -> Vec<TaskResult>;
}

impl Dispatcher for WorkerPool {
    fn submit(&mut self, task: Task) -> Result<(), WorkerError> {
        WorkerPool::submit(self, task)
    }

    fn drain(&mut self) -> Vec<TaskResult> {
        WorkerPool::drain(self)
    }
}

/// Runs tasks synchronously on the calling thread.
#[derive(Debug, Default)]
pub struct InlineDispatcher {
    engines: Engines,
    ready: Vec<TaskResult>,
}

impl InlineDispatcher {
    /// Creates a dispatcher that executes tasks with the provided engines.
    #[must_use]
    pub fn new(engines: Engines) -> Self {
        Self {
            engines,
            ready: Vec::new(),
        }
    }
}

impl Dispatcher for InlineDispatcher {
    fn submit(&mut self, task: Task) -> Result<(), WorkerError> {
        let engines = self.engines;
        self.ready
            .push(run_guarded(task, |task| engines.execute(task)));
        Ok(())
    }

    fn drain(&mut self) -> Vec<TaskResult> {
        std::mem::take(&mut self.ready)
    }
}

fn work(index: usize, engines: &Engines, tasks: &Receiver<Task>, results: &Sender<TaskResult>) {
    for task in tasks.iter() {
        let result = run_guarded(task, |task| engines.execute(task));
        if results.send(result).is_err() {
            break;
        }
    }
    debug!(index, "worker exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt;

    #[derive(Debug)]
    struct Outer(Inner);

    #[derive(Debug)]
    struct Inner;

    impl fmt::Display for Outer {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("outer")
        }
    }

    impl fmt::Display for Inner {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("inner")
        }
    }

    impl std::error::Error for Inner {}

    impl std::error::Error for Outer {
        fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
            Some(&self.0)
        }
    }

    #[test]
    fn error_chain_joins_sources() {
        assert_eq!(error_chain(&Outer(Inner)), "outer: inner");
    }

    #[test]
    fn only_request_events_become_tasks() {
        assert!(Task::from_event(&Event::MapLoadFailed {
            reason: String::new()
        })
        .is_none());

        let task = Task::from_event(&Event::PlacementRequested {
            generation: Generation::new(4),
            seed: 1,
            navigable: Arc::new(NavigableSet::from_cells([Cell::new(0, 0)])),
        })
        .expect("placement task");
        assert_eq!(task.generation(), Generation::new(4));
    }

    #[test]
    fn results_map_onto_commands() {
        let command = TaskResult::PlacementFailed {
            generation: Generation::new(2),
            attempts: 10,
        }
        .into_command();

        assert_eq!(
            command,
            Command::RejectPlacement {
                generation: Generation::new(2),
                attempts: 10
            }
        );
    }

    #[test]
    fn panicking_task_reports_its_failure() {
        let navigable = Arc::new(NavigableSet::from_cells([Cell::new(0, 0)]));
        let path_task = Task::ComputePath {
            generation: Generation::new(5),
            leg: DeliveryLeg::ToDestination,
            from: Cell::new(0, 0),
            to: Cell::new(0, 3),
            navigable: Arc::clone(&navigable),
        };
        let place_task = Task::Place {
            generation: Generation::new(6),
            seed: 0,
            navigable,
        };

        let path = run_guarded(path_task, |_| panic!("search blew up"));
        let placement = run_guarded(place_task, |_| panic!("search blew up"));

        assert_eq!(
            path,
            TaskResult::PathComputed {
                generation: Generation::new(5),
                leg: DeliveryLeg::ToDestination,
                path: Path::empty(),
            }
        );
        assert_eq!(
            placement,
            TaskResult::PlacementFailed {
                generation: Generation::new(6),
                attempts: 0,
            }
        );
    }

    #[test]
    fn map_panic_becomes_load_failure() {
        let task = Task::AnalyzeMap {
            generation: Generation::new(8),
            source: MapSource::File("city.png".into()),
        };

        match run_guarded(task, |_| panic!("decoder blew up")) {
            TaskResult::MapFailed { generation, reason } => {
                assert_eq!(generation, Generation::new(8));
                assert!(reason.contains("panicked"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn inline_dispatcher_holds_results_until_drained() {
        let mut dispatcher = InlineDispatcher::new(Engines::default());
        let corridor = Arc::new(NavigableSet::from_cells(
            (0..4).map(|column| Cell::new(0, column)),
        ));

        dispatcher
            .submit(Task::ComputePath {
                generation: Generation::new(1),
                leg: DeliveryLeg::ToSource,
                from: Cell::new(0, 0),
                to: Cell::new(0, 3),
                navigable: corridor,
            })
            .expect("inline submit");

        let results = dispatcher.drain();
        assert_eq!(results.len(), 1);
        assert!(matches!(
            &results[0],
            TaskResult::PathComputed { path, .. } if path.last() == Some(Cell::new(0, 3))
        ));
        assert!(dispatcher.drain().is_empty());
    }
}
