use std::{sync::Arc, time::Duration};

use courier_core::{
    Cell, Command, DeliveryLeg, DeliveryOutcome, DeliveryPhase, Event, MapAnalysis, MapSource,
    NavigableSet, Path, Placement, RejectionReason, RgbRaster, Speed,
};
use courier_system_pathfinding::find_path;
use courier_system_placement::PlacementSearch;
use courier_world::{apply, query, World};

const FRAME: Duration = Duration::from_millis(16);

/// Synchronous stand-in for the worker pool: answers every request event
/// immediately on the calling thread.
struct Harness {
    world: World,
    analysis: MapAnalysis,
    events: Vec<Event>,
}

impl Harness {
    fn new(analysis: MapAnalysis) -> Self {
        let mut harness = Self {
            world: World::new(),
            analysis,
            events: Vec::new(),
        };
        let source = MapSource::Raster(Arc::clone(&harness.analysis.raster));
        harness.run(Command::LoadMap { source });
        harness
    }

    fn run(&mut self, command: Command) {
        let mut queue = vec![command];
        while let Some(command) = queue.pop() {
            let mut emitted = Vec::new();
            apply(&mut self.world, command, &mut emitted);
            for event in &emitted {
                if let Some(follow_up) = self.service(event) {
                    queue.push(follow_up);
                }
            }
            self.events.extend(emitted);
        }
    }

    fn service(&self, event: &Event) -> Option<Command> {
        match event {
            Event::MapAnalysisRequested { generation, .. } => Some(Command::ApplyMapAnalysis {
                generation: *generation,
                analysis: self.analysis.clone(),
            }),
            Event::PlacementRequested {
                generation,
                seed,
                navigable,
            } => Some(
                match PlacementSearch::default().run_seeded(navigable, *seed) {
                    Ok(report) => Command::ApplyPlacement {
                        generation: *generation,
                        placement: report.placement,
                    },
                    Err(_) => Command::RejectPlacement {
                        generation: *generation,
                        attempts: 10,
                    },
                },
            ),
            Event::PathRequested {
                generation,
                leg,
                from,
                to,
                navigable,
            } => Some(Command::ApplyPath {
                generation: *generation,
                leg: *leg,
                path: find_path(*from, *to, navigable),
            }),
            _ => None,
        }
    }

    /// Issues a placement request and answers it with a fixed placement
    /// instead of running the randomized search.
    fn place(&mut self, placement: Placement) {
        let mut emitted = Vec::new();
        apply(
            &mut self.world,
            Command::RandomizePlacement { seed: 1 },
            &mut emitted,
        );
        let generation = emitted
            .iter()
            .find_map(|event| match event {
                Event::PlacementRequested { generation, .. } => Some(*generation),
                _ => None,
            })
            .expect("placement request");
        self.run(Command::ApplyPlacement {
            generation,
            placement,
        });
    }

    fn tick_until_settled(&mut self, max_frames: usize) -> usize {
        for frame in 0..max_frames {
            if !query::phase(&self.world).is_travelling() {
                return frame;
            }
            self.run(Command::Tick { dt: FRAME });
        }
        max_frames
    }

    fn outcomes(&self) -> Vec<DeliveryOutcome> {
        self.events
            .iter()
            .filter_map(|event| match event {
                Event::Outcome { outcome } => Some(*outcome),
                _ => None,
            })
            .collect()
    }

    fn rejections(&self) -> Vec<RejectionReason> {
        self.events
            .iter()
            .filter_map(|event| match event {
                Event::OperationRejected { reason } => Some(*reason),
                _ => None,
            })
            .collect()
    }
}

fn analysis_from(rows: u32, columns: u32, cells: impl IntoIterator<Item = Cell>) -> MapAnalysis {
    let raster = RgbRaster::filled(columns, rows, [255, 255, 255]);
    let navigable = NavigableSet::new(raster.bounds(), cells);
    MapAnalysis {
        raster: Arc::new(raster),
        navigable: Arc::new(navigable),
    }
}

fn open_field() -> MapAnalysis {
    analysis_from(
        10,
        10,
        (0..10).flat_map(|row| (0..10).map(move |column| Cell::new(row, column))),
    )
}

/// Two horizontal corridors that never meet.
fn split_corridors() -> MapAnalysis {
    analysis_from(
        6,
        10,
        (0..10).flat_map(|column| [Cell::new(0, column), Cell::new(5, column)]),
    )
}

#[test]
fn full_delivery_visits_source_then_destination() {
    let mut harness = Harness::new(open_field());
    let placement = Placement::new(Cell::new(0, 0), Cell::new(3, 4), Cell::new(8, 2));
    harness.place(placement);

    harness.run(Command::StartDelivery);
    assert_eq!(query::phase(&harness.world), DeliveryPhase::ToSource);

    let frames = harness.tick_until_settled(500);
    assert!(frames < 500, "delivery never settled");

    assert_eq!(query::phase(&harness.world), DeliveryPhase::Completed);
    assert_eq!(
        harness.outcomes(),
        vec![DeliveryOutcome::PickedUp, DeliveryOutcome::Delivered]
    );

    let agent = query::agent(&harness.world).expect("courier");
    assert_eq!(agent.cell, placement.destination);
    assert!(!agent.carrying);
    assert_eq!(agent.position, placement.destination.position());
    assert!(query::remaining_path(&harness.world).is_empty());
}

#[test]
fn phases_follow_the_delivery_order() {
    let mut harness = Harness::new(open_field());
    harness.place(Placement::new(
        Cell::new(1, 1),
        Cell::new(1, 6),
        Cell::new(6, 6),
    ));
    harness.events.clear();

    harness.run(Command::StartDelivery);
    let _ = harness.tick_until_settled(500);

    let transitions: Vec<(DeliveryPhase, DeliveryPhase)> = harness
        .events
        .iter()
        .filter_map(|event| match event {
            Event::PhaseChanged { from, to } => Some((*from, *to)),
            _ => None,
        })
        .collect();
    assert_eq!(
        transitions,
        vec![
            (DeliveryPhase::Idle, DeliveryPhase::ToSource),
            (DeliveryPhase::ToSource, DeliveryPhase::ToDestination),
            (DeliveryPhase::ToDestination, DeliveryPhase::Completed),
        ]
    );
}

#[test]
fn unreachable_source_reports_and_returns_to_idle() {
    let mut harness = Harness::new(split_corridors());
    harness.place(Placement::new(
        Cell::new(0, 1),
        Cell::new(5, 8),
        Cell::new(5, 9),
    ));

    harness.run(Command::StartDelivery);

    assert_eq!(query::phase(&harness.world), DeliveryPhase::Idle);
    assert_eq!(harness.outcomes(), vec![DeliveryOutcome::NoPathToSource]);
    assert!(!query::agent(&harness.world).expect("courier").carrying);
}

#[test]
fn unreachable_destination_keeps_the_package() {
    let mut harness = Harness::new(split_corridors());
    harness.place(Placement::new(
        Cell::new(0, 1),
        Cell::new(0, 4),
        Cell::new(5, 8),
    ));

    harness.run(Command::StartDelivery);
    let _ = harness.tick_until_settled(200);

    assert_eq!(query::phase(&harness.world), DeliveryPhase::Idle);
    assert_eq!(
        harness.outcomes(),
        vec![
            DeliveryOutcome::PickedUp,
            DeliveryOutcome::NoPathToDestination
        ]
    );
    let agent = query::agent(&harness.world).expect("courier");
    assert!(agent.carrying);
    assert_eq!(agent.cell, Cell::new(0, 4));
}

#[test]
fn stop_preserves_progress_and_start_resumes_with_destination_leg() {
    let mut harness = Harness::new(open_field());
    let placement = Placement::new(Cell::new(0, 0), Cell::new(0, 1), Cell::new(9, 9));
    harness.place(placement);

    harness.run(Command::StartDelivery);
    // Adjacent source: a single motion tick collects the package.
    harness.run(Command::Tick { dt: FRAME });
    assert_eq!(query::phase(&harness.world), DeliveryPhase::ToDestination);

    harness.run(Command::StopDelivery);
    assert_eq!(query::phase(&harness.world), DeliveryPhase::Stopped);
    let stopped_at = query::agent(&harness.world).expect("courier").cell;
    assert!(query::agent(&harness.world).expect("courier").carrying);

    harness.run(Command::Tick {
        dt: Duration::from_secs(1),
    });
    assert_eq!(
        query::agent(&harness.world).expect("courier").cell,
        stopped_at
    );

    harness.events.clear();
    harness.run(Command::StartDelivery);
    assert!(harness.events.iter().any(|event| matches!(
        event,
        Event::PathRequested {
            leg: DeliveryLeg::ToDestination,
            ..
        }
    )));

    let _ = harness.tick_until_settled(500);
    assert_eq!(query::phase(&harness.world), DeliveryPhase::Completed);
    assert_eq!(harness.outcomes(), vec![DeliveryOutcome::Delivered]);
}

#[test]
fn stop_discards_in_flight_path() {
    let mut harness = Harness::new(open_field());
    harness.place(Placement::new(
        Cell::new(0, 0),
        Cell::new(5, 5),
        Cell::new(9, 9),
    ));

    let mut emitted = Vec::new();
    apply(&mut harness.world, Command::StartDelivery, &mut emitted);
    let (generation, leg) = emitted
        .iter()
        .find_map(|event| match event {
            Event::PathRequested {
                generation, leg, ..
            } => Some((*generation, *leg)),
            _ => None,
        })
        .expect("path request");

    harness.run(Command::StopDelivery);
    harness.events.clear();
    harness.run(Command::ApplyPath {
        generation,
        leg,
        path: Path::new(vec![Cell::new(0, 1)]),
    });

    assert_eq!(
        harness.events,
        vec![Event::StaleResultDiscarded { generation }]
    );
    assert!(query::active_path(&harness.world).is_empty());
}

#[test]
fn placement_is_rejected_while_travelling() {
    let mut harness = Harness::new(open_field());
    harness.place(Placement::new(
        Cell::new(0, 0),
        Cell::new(9, 9),
        Cell::new(0, 9),
    ));
    harness.run(Command::StartDelivery);
    harness.events.clear();

    harness.run(Command::RandomizePlacement { seed: 5 });
    harness.run(Command::StartDelivery);

    assert_eq!(
        harness.rejections(),
        vec![
            RejectionReason::DeliveryInProgress,
            RejectionReason::DeliveryInProgress
        ]
    );
}

#[test]
fn start_waits_for_running_placement() {
    let mut harness = Harness::new(open_field());
    harness.place(Placement::new(
        Cell::new(0, 0),
        Cell::new(9, 9),
        Cell::new(0, 9),
    ));

    let mut emitted = Vec::new();
    apply(
        &mut harness.world,
        Command::RandomizePlacement { seed: 3 },
        &mut emitted,
    );
    harness.events.clear();
    harness.run(Command::StartDelivery);

    assert_eq!(
        harness.rejections(),
        vec![RejectionReason::PlacementInProgress]
    );
    assert_eq!(query::phase(&harness.world), DeliveryPhase::Idle);
}

#[test]
fn stop_without_delivery_is_rejected() {
    let mut harness = Harness::new(open_field());
    harness.events.clear();

    harness.run(Command::StopDelivery);

    assert_eq!(harness.rejections(), vec![RejectionReason::NothingToStop]);
}

#[test]
fn exhausted_placement_keeps_previous_placement() {
    let mut harness = Harness::new(open_field());
    let placement = Placement::new(Cell::new(0, 0), Cell::new(2, 2), Cell::new(4, 4));
    harness.place(placement);

    let mut emitted = Vec::new();
    apply(
        &mut harness.world,
        Command::RandomizePlacement { seed: 9 },
        &mut emitted,
    );
    let generation = emitted
        .iter()
        .find_map(|event| match event {
            Event::PlacementRequested { generation, .. } => Some(*generation),
            _ => None,
        })
        .expect("placement request");
    harness.events.clear();
    harness.run(Command::RejectPlacement {
        generation,
        attempts: 10,
    });

    assert_eq!(query::placement(&harness.world), Some(placement));
    assert_eq!(
        harness.outcomes(),
        vec![DeliveryOutcome::PlacementUnreachable]
    );
    assert_eq!(
        query::snapshot(&harness.world).last_outcome,
        Some(DeliveryOutcome::PlacementUnreachable)
    );
}

#[test]
fn failed_map_load_keeps_installed_map() {
    let mut harness = Harness::new(open_field());
    let before = query::map_view(&harness.world).expect("map");

    let mut emitted = Vec::new();
    apply(
        &mut harness.world,
        Command::LoadMap {
            source: MapSource::File("missing.png".into()),
        },
        &mut emitted,
    );
    let generation = emitted
        .iter()
        .find_map(|event| match event {
            Event::MapAnalysisRequested { generation, .. } => Some(*generation),
            _ => None,
        })
        .expect("map request");
    harness.events.clear();
    harness.run(Command::RejectMapAnalysis {
        generation,
        reason: "decode failed".to_owned(),
    });

    assert_eq!(query::map_view(&harness.world), Some(before));
    assert_eq!(
        harness.events,
        vec![Event::MapLoadFailed {
            reason: "decode failed".to_owned()
        }]
    );
}

#[test]
fn new_map_clears_placement_and_delivery() {
    let mut harness = Harness::new(open_field());
    harness.place(Placement::new(
        Cell::new(0, 0),
        Cell::new(9, 9),
        Cell::new(0, 9),
    ));
    harness.run(Command::StartDelivery);
    harness.run(Command::Tick { dt: FRAME });

    let source = MapSource::Raster(Arc::clone(&harness.analysis.raster));
    harness.run(Command::LoadMap { source });

    let snapshot = query::snapshot(&harness.world);
    assert!(snapshot.placement.is_none());
    assert!(snapshot.agent.is_none());
    assert_eq!(
        query::navigable(&harness.world).map(|navigable| navigable.len()),
        Some(harness.analysis.navigable.len())
    );
    assert_eq!(snapshot.phase, DeliveryPhase::Idle);
    assert!(snapshot.remaining_path.is_empty());
}

#[test]
fn faster_speed_settles_in_fewer_frames() {
    let placement = Placement::new(Cell::new(0, 0), Cell::new(0, 9), Cell::new(9, 9));

    let mut slow = Harness::new(open_field());
    slow.run(Command::SetSpeed {
        speed: Speed::new(1),
    });
    slow.place(placement);
    slow.run(Command::StartDelivery);
    let slow_frames = slow.tick_until_settled(1_000);

    let mut fast = Harness::new(open_field());
    fast.run(Command::SetSpeed { speed: Speed::MAX });
    fast.place(placement);
    fast.run(Command::StartDelivery);
    let fast_frames = fast.tick_until_settled(1_000);

    assert!(fast_frames < slow_frames);
    assert_eq!(query::phase(&fast.world), DeliveryPhase::Completed);
    assert_eq!(query::phase(&slow.world), DeliveryPhase::Completed);
}
