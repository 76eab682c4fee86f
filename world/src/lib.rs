#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative delivery state for Smart Courier.
//!
//! The world owns the installed map, the placement, the courier and the active route. Adapters
//! mutate it exclusively through [`apply`] and read it through [`query`]. Expensive work (map
//! analysis, placement search and path computation) is never performed here: the world emits a
//! request event tagged with a [`Generation`] and later accepts the matching result command,
//! discarding any result whose generation is no longer pending.

use std::{sync::Arc, time::Duration};

use courier_core::{
    AgentState, Cell, Command, DeliveryLeg, DeliveryOutcome, DeliveryPhase, Event, Generation,
    MapAnalysis, MapSource, NavigableSet, Path, Placement, RejectionReason, RgbRaster, Speed,
};
use courier_system_motion::{MotionController, MotionStatus};
use courier_system_road_mask::is_usable;
use tracing::{debug, warn};

/// Upper bound on motion ticks resolved by a single `Tick` command.
const MAX_TICKS_PER_UPDATE: u32 = 16;

/// Shortest accepted interval between motion ticks.
const MIN_TICK_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug)]
struct InstalledMap {
    generation: Generation,
    raster: Arc<RgbRaster>,
    navigable: Arc<NavigableSet>,
}

#[derive(Clone, Copy, Debug)]
struct PendingPath {
    generation: Generation,
    leg: DeliveryLeg,
}

/// Represents the authoritative delivery context.
#[derive(Debug)]
pub struct World {
    map: Option<InstalledMap>,
    placement: Option<Placement>,
    agent: Option<AgentState>,
    path: Path,
    phase: DeliveryPhase,
    motion: MotionController,
    accumulator: Duration,
    last_generation: Generation,
    pending_map: Option<Generation>,
    pending_placement: Option<Generation>,
    pending_path: Option<PendingPath>,
    last_outcome: Option<DeliveryOutcome>,
}

impl World {
    /// Creates an empty world with the default speed setting.
    #[must_use]
    pub fn new() -> Self {
        Self::with_speed(Speed::default())
    }

    /// Creates an empty world animating at the provided speed.
    #[must_use]
    pub fn with_speed(speed: Speed) -> Self {
        Self {
            map: None,
            placement: None,
            agent: None,
            path: Path::empty(),
            phase: DeliveryPhase::Idle,
            motion: MotionController::new(speed),
            accumulator: Duration::ZERO,
            last_generation: Generation::new(0),
            pending_map: None,
            pending_placement: None,
            pending_path: None,
            last_outcome: None,
        }
    }

    fn issue_generation(&mut self) -> Generation {
        self.last_generation = self.last_generation.next();
        self.last_generation
    }

    fn set_phase(&mut self, phase: DeliveryPhase, out_events: &mut Vec<Event>) {
        if self.phase == phase {
            return;
        }

        let from = self.phase;
        self.phase = phase;
        if let Some(agent) = self.agent.as_mut() {
            agent.phase = phase;
        }
        debug!(?from, to = ?phase, "delivery phase changed");
        out_events.push(Event::PhaseChanged { from, to: phase });
    }

    fn report(&mut self, outcome: DeliveryOutcome, out_events: &mut Vec<Event>) {
        debug!(?outcome, "delivery outcome");
        self.last_outcome = Some(outcome);
        out_events.push(Event::Outcome { outcome });
    }

    fn goal_for(&self, leg: DeliveryLeg) -> Option<Cell> {
        let placement = self.placement?;
        Some(match leg {
            DeliveryLeg::ToSource => placement.source,
            DeliveryLeg::ToDestination => placement.destination,
        })
    }

    fn request_path(&mut self, leg: DeliveryLeg, out_events: &mut Vec<Event>) {
        let Some(goal) = self.goal_for(leg) else {
            return;
        };
        let Some(navigable) = self.map.as_ref().map(|map| Arc::clone(&map.navigable)) else {
            return;
        };
        let Some(agent) = self.agent.as_mut() else {
            return;
        };

        agent.step = 0;
        let from = agent.cell;
        self.path = Path::empty();
        self.accumulator = Duration::ZERO;

        let generation = self.issue_generation();
        self.pending_path = Some(PendingPath { generation, leg });
        self.set_phase(leg.phase(), out_events);
        debug!(?leg, %from, to = %goal, generation = generation.get(), "path requested");
        out_events.push(Event::PathRequested {
            generation,
            leg,
            from,
            to: goal,
            navigable,
        });
    }

    fn install_map(
        &mut self,
        generation: Generation,
        analysis: MapAnalysis,
        out_events: &mut Vec<Event>,
    ) {
        let MapAnalysis { raster, navigable } = analysis;
        let bounds = raster.bounds();
        let navigable_cells = navigable.len();
        let usable = is_usable(&navigable);

        self.map = Some(InstalledMap {
            generation,
            raster,
            navigable,
        });
        self.placement = None;
        self.agent = None;
        self.path = Path::empty();
        self.accumulator = Duration::ZERO;
        self.pending_placement = None;
        self.pending_path = None;
        self.last_outcome = None;
        self.set_phase(DeliveryPhase::Idle, out_events);

        debug!(
            rows = bounds.rows(),
            columns = bounds.columns(),
            navigable_cells,
            "map installed"
        );
        out_events.push(Event::MapInstalled {
            bounds,
            navigable_cells,
        });
        if !usable {
            warn!(navigable_cells, "map contains too few road cells");
            out_events.push(Event::InsufficientRoadArea { navigable_cells });
        }
    }

    fn install_path(&mut self, leg: DeliveryLeg, path: Path, out_events: &mut Vec<Event>) {
        let (Some(agent), Some(goal)) = (self.agent, self.goal_for(leg)) else {
            return;
        };

        if path.is_empty() && agent.cell != goal {
            let outcome = match leg {
                DeliveryLeg::ToSource => DeliveryOutcome::NoPathToSource,
                DeliveryLeg::ToDestination => DeliveryOutcome::NoPathToDestination,
            };
            self.path = Path::empty();
            self.report(outcome, out_events);
            self.set_phase(DeliveryPhase::Idle, out_events);
            return;
        }

        let length = path.len();
        self.path = path;
        self.accumulator = Duration::ZERO;
        out_events.push(Event::PathAssigned { leg, length });

        if length == 0 {
            self.complete_leg(leg, out_events);
        }
    }

    fn complete_leg(&mut self, leg: DeliveryLeg, out_events: &mut Vec<Event>) {
        let Some(agent) = self.agent.as_mut() else {
            return;
        };

        agent.position = agent.cell.position();
        agent.angle = agent.target_angle;
        self.accumulator = Duration::ZERO;

        match leg {
            DeliveryLeg::ToSource => {
                agent.carrying = true;
                self.report(DeliveryOutcome::PickedUp, out_events);
                self.request_path(DeliveryLeg::ToDestination, out_events);
            }
            DeliveryLeg::ToDestination => {
                agent.carrying = false;
                self.report(DeliveryOutcome::Delivered, out_events);
                self.set_phase(DeliveryPhase::Completed, out_events);
            }
        }
    }

    fn advance_motion(&mut self, dt: Duration, out_events: &mut Vec<Event>) {
        let leg = match self.phase {
            DeliveryPhase::ToSource => DeliveryLeg::ToSource,
            DeliveryPhase::ToDestination => DeliveryLeg::ToDestination,
            _ => return,
        };
        if self.pending_path.is_some() {
            return;
        }

        let interval = self.motion.tick_interval().max(MIN_TICK_INTERVAL);
        self.accumulator = self.accumulator.saturating_add(dt);

        let mut ticks = 0;
        while self.accumulator >= interval {
            if ticks == MAX_TICKS_PER_UPDATE {
                self.accumulator = Duration::ZERO;
                break;
            }
            ticks += 1;
            self.accumulator -= interval;

            let Some(agent) = self.agent.as_mut() else {
                return;
            };
            let from = agent.cell;
            let status = self.motion.advance(agent, &self.path);
            if agent.cell != from {
                out_events.push(Event::AgentAdvanced {
                    from,
                    to: agent.cell,
                });
            }

            if status == MotionStatus::Arrived {
                self.complete_leg(leg, out_events);
                break;
            }
        }
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

/// Applies the provided command to the world, mutating state deterministically.
pub fn apply(world: &mut World, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::LoadMap { source } => {
            let generation = world.issue_generation();
            world.pending_map = Some(generation);
            match &source {
                MapSource::File(path) => {
                    debug!(path = %path.display(), generation = generation.get(), "map load requested");
                }
                MapSource::Raster(raster) => {
                    debug!(
                        width = raster.width(),
                        height = raster.height(),
                        generation = generation.get(),
                        "in-memory map requested"
                    );
                }
            }
            out_events.push(Event::MapAnalysisRequested { generation, source });
        }
        Command::ApplyMapAnalysis {
            generation,
            analysis,
        } => {
            if world.pending_map != Some(generation) {
                discard(generation, out_events);
                return;
            }
            world.pending_map = None;
            world.install_map(generation, analysis, out_events);
        }
        Command::RejectMapAnalysis { generation, reason } => {
            if world.pending_map != Some(generation) {
                discard(generation, out_events);
                return;
            }
            world.pending_map = None;
            warn!(%reason, "map load failed; keeping previous map");
            out_events.push(Event::MapLoadFailed { reason });
        }
        Command::RandomizePlacement { seed } => {
            let Some(navigable) = world.map.as_ref().map(|map| Arc::clone(&map.navigable)) else {
                reject(RejectionReason::MapMissing, out_events);
                return;
            };
            if world.phase.is_travelling() {
                reject(RejectionReason::DeliveryInProgress, out_events);
                return;
            }
            if world.pending_placement.is_some() {
                reject(RejectionReason::PlacementInProgress, out_events);
                return;
            }

            let generation = world.issue_generation();
            world.pending_placement = Some(generation);
            debug!(seed, generation = generation.get(), "placement requested");
            out_events.push(Event::PlacementRequested {
                generation,
                seed,
                navigable,
            });
        }
        Command::ApplyPlacement {
            generation,
            placement,
        } => {
            if world.pending_placement != Some(generation) {
                discard(generation, out_events);
                return;
            }
            world.pending_placement = None;
            world.placement = Some(placement);
            world.agent = Some(AgentState::at(placement.agent));
            world.path = Path::empty();
            world.accumulator = Duration::ZERO;
            world.last_outcome = None;
            world.set_phase(DeliveryPhase::Idle, out_events);
            debug!(
                agent = %placement.agent,
                source = %placement.source,
                destination = %placement.destination,
                "placement applied"
            );
            out_events.push(Event::PlacementApplied { placement });
        }
        Command::RejectPlacement {
            generation,
            attempts,
        } => {
            if world.pending_placement != Some(generation) {
                discard(generation, out_events);
                return;
            }
            world.pending_placement = None;
            warn!(attempts, "placement search exhausted its attempts");
            world.report(DeliveryOutcome::PlacementUnreachable, out_events);
        }
        Command::StartDelivery => {
            if world.map.is_none() {
                reject(RejectionReason::MapMissing, out_events);
                return;
            }
            let Some(agent) = world.agent else {
                reject(RejectionReason::PlacementMissing, out_events);
                return;
            };
            if world.phase.is_travelling() {
                reject(RejectionReason::DeliveryInProgress, out_events);
                return;
            }
            if world.pending_placement.is_some() {
                reject(RejectionReason::PlacementInProgress, out_events);
                return;
            }

            let leg = if agent.carrying {
                DeliveryLeg::ToDestination
            } else {
                DeliveryLeg::ToSource
            };
            world.request_path(leg, out_events);
        }
        Command::ApplyPath {
            generation,
            leg,
            path,
        } => {
            let matches = world
                .pending_path
                .is_some_and(|pending| pending.generation == generation && pending.leg == leg);
            if !matches {
                discard(generation, out_events);
                return;
            }
            world.pending_path = None;
            world.install_path(leg, path, out_events);
        }
        Command::StopDelivery => {
            if !world.phase.is_travelling() {
                reject(RejectionReason::NothingToStop, out_events);
                return;
            }
            world.pending_path = None;
            world.accumulator = Duration::ZERO;
            world.report(DeliveryOutcome::Stopped, out_events);
            world.set_phase(DeliveryPhase::Stopped, out_events);
        }
        Command::SetSpeed { speed } => {
            world.motion.set_speed(speed);
            debug!(speed = speed.get(), "speed changed");
            out_events.push(Event::SpeedChanged { speed });
        }
        Command::Tick { dt } => world.advance_motion(dt, out_events),
    }
}

fn reject(reason: RejectionReason, out_events: &mut Vec<Event>) {
    debug!(?reason, "command rejected");
    out_events.push(Event::OperationRejected { reason });
}

fn discard(generation: Generation, out_events: &mut Vec<Event>) {
    debug!(generation = generation.get(), "stale result discarded");
    out_events.push(Event::StaleResultDiscarded { generation });
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use std::sync::Arc;

    use super::World;
    use courier_core::{
        AgentState, Cell, DeliveryPhase, DeliverySnapshot, MapView, NavigableSet, Path, Placement,
        Speed,
    };

    /// Captures an immutable copy of everything the presentation layer draws.
    #[must_use]
    pub fn snapshot(world: &World) -> DeliverySnapshot {
        DeliverySnapshot {
            map: map_view(world),
            placement: world.placement,
            agent: world.agent,
            remaining_path: remaining_path(world).to_vec(),
            phase: world.phase,
            speed: world.motion.speed(),
            last_outcome: world.last_outcome,
            map_pending: world.pending_map.is_some(),
            placement_pending: world.pending_placement.is_some(),
            path_pending: world.pending_path.is_some(),
        }
    }

    /// Describes the installed map, if any.
    #[must_use]
    pub fn map_view(world: &World) -> Option<MapView> {
        world.map.as_ref().map(|map| MapView {
            generation: map.generation,
            raster: Arc::clone(&map.raster),
            navigable_cells: map.navigable.len(),
        })
    }

    /// Road cells of the installed map.
    #[must_use]
    pub fn navigable(world: &World) -> Option<&Arc<NavigableSet>> {
        world.map.as_ref().map(|map| &map.navigable)
    }

    /// Current placement.
    #[must_use]
    pub fn placement(world: &World) -> Option<Placement> {
        world.placement
    }

    /// Courier state.
    #[must_use]
    pub fn agent(world: &World) -> Option<&AgentState> {
        world.agent.as_ref()
    }

    /// Active route, including cells already consumed.
    #[must_use]
    pub fn active_path(world: &World) -> &Path {
        &world.path
    }

    /// Cells of the active route the courier has not consumed yet.
    #[must_use]
    pub fn remaining_path(world: &World) -> &[Cell] {
        let step = world.agent.map_or(0, |agent| agent.step);
        world.path.cells().get(step..).unwrap_or(&[])
    }

    /// Current delivery phase.
    #[must_use]
    pub fn phase(world: &World) -> DeliveryPhase {
        world.phase
    }

    /// Active speed setting.
    #[must_use]
    pub fn speed(world: &World) -> Speed {
        world.motion.speed()
    }
}
