#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Shared rendering contracts for Smart Courier adapters.

use anyhow::Result as AnyResult;
use courier_core::{
    Direction, DeliveryOutcome, DeliveryPhase, DeliverySnapshot, Generation, RejectionReason,
    RgbRaster, Speed,
};
use glam::Vec2;
use std::{path::PathBuf, sync::Arc, time::Duration};

/// Distance from the courier centre to the tip of its triangle.
pub const COURIER_TIP_LENGTH: f32 = 20.0;
/// Distance from the courier centre to each base corner of its triangle.
pub const COURIER_BASE_LENGTH: f32 = 10.0;
/// Angular offset of the base corners from the heading.
pub const COURIER_BASE_SPREAD_DEGREES: f32 = 120.0;

/// RGBA color used when presenting frames.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Color {
    /// Red channel intensity in the range 0.0..=1.0.
    pub red: f32,
    /// Green channel intensity in the range 0.0..=1.0.
    pub green: f32,
    /// Blue channel intensity in the range 0.0..=1.0.
    pub blue: f32,
    /// Alpha channel intensity in the range 0.0..=1.0.
    pub alpha: f32,
}

impl Color {
    /// Creates a new color from floating point channels.
    #[must_use]
    pub const fn new(red: f32, green: f32, blue: f32, alpha: f32) -> Self {
        Self {
            red,
            green,
            blue,
            alpha,
        }
    }

    /// Creates an opaque color from byte RGB values.
    #[must_use]
    pub const fn from_rgb_u8(red: u8, green: u8, blue: u8) -> Self {
        Self {
            red: red as f32 / 255.0,
            green: green as f32 / 255.0,
            blue: blue as f32 / 255.0,
            alpha: 1.0,
        }
    }
}

/// Palette shared by backends.
pub mod palette {
    use super::Color;

    /// Window background.
    pub const BACKGROUND: Color = Color::from_rgb_u8(30, 30, 30);
    /// Courier without the package.
    pub const COURIER: Color = Color::from_rgb_u8(30, 144, 255);
    /// Courier carrying the package.
    pub const COURIER_LOADED: Color = Color::from_rgb_u8(50, 205, 50);
    /// Pickup flag.
    pub const SOURCE_FLAG: Color = Color::from_rgb_u8(255, 215, 0);
    /// Drop-off flag.
    pub const DESTINATION_FLAG: Color = Color::from_rgb_u8(220, 20, 60);
    /// Remaining route overlay.
    pub const PATH: Color = Color::new(0.0, 0.75, 1.0, 0.8);
}

/// Input snapshot gathered by adapters before updating the scene.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct FrameInput {
    /// Request to place the courier and both flags at random.
    pub randomize: bool,
    /// Request to start or resume the delivery.
    pub start: bool,
    /// Request to halt the delivery.
    pub stop: bool,
    /// Map file the user asked to load on this frame.
    pub load_map: Option<PathBuf>,
    /// Speed chosen on this frame, if it changed.
    pub speed: Option<Speed>,
}

impl FrameInput {
    /// Reports whether the frame carries any user request.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        !self.randomize
            && !self.start
            && !self.stop
            && self.load_map.is_none()
            && self.speed.is_none()
    }
}

/// Installed map drawn as the scene background.
#[derive(Clone, Debug, PartialEq)]
pub struct MapLayer {
    /// Changes whenever a different map is installed; backends cache textures by it.
    pub generation: Generation,
    /// Decoded raster.
    pub raster: Arc<RgbRaster>,
}

impl MapLayer {
    /// Raster size in pixels.
    #[must_use]
    pub fn size(&self) -> Vec2 {
        Vec2::new(self.raster.width() as f32, self.raster.height() as f32)
    }
}

/// Which end of the delivery a flag marks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlagKind {
    /// Pickup location.
    Source,
    /// Drop-off location.
    Destination,
}

/// Flag planted on a cell.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FlagPresentation {
    /// Which end of the delivery the flag marks.
    pub kind: FlagKind,
    /// Raster position of the flag pole base.
    pub position: Vec2,
    /// Fill color.
    pub color: Color,
}

impl FlagPresentation {
    /// Creates a flag colored for its kind.
    #[must_use]
    pub const fn new(kind: FlagKind, position: Vec2) -> Self {
        let color = match kind {
            FlagKind::Source => palette::SOURCE_FLAG,
            FlagKind::Destination => palette::DESTINATION_FLAG,
        };
        Self {
            kind,
            position,
            color,
        }
    }
}

/// Courier drawn as a triangle pointing along its heading.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CourierPresentation {
    /// Smoothed raster position of the courier centre.
    pub position: Vec2,
    /// Display angle in degrees, counter-clockwise from east.
    pub angle_degrees: f32,
    /// Whether the courier carries the package.
    pub carrying: bool,
}

impl CourierPresentation {
    /// Fill color reflecting whether the package is carried.
    #[must_use]
    pub const fn color(&self) -> Color {
        if self.carrying {
            palette::COURIER_LOADED
        } else {
            palette::COURIER
        }
    }

    /// Triangle vertices in raster space: tip first, then both base corners.
    #[must_use]
    pub fn triangle(&self) -> [Vec2; 3] {
        [
            self.position + heading_vector(self.angle_degrees) * COURIER_TIP_LENGTH,
            self.position
                + heading_vector(self.angle_degrees + COURIER_BASE_SPREAD_DEGREES)
                    * COURIER_BASE_LENGTH,
            self.position
                + heading_vector(self.angle_degrees - COURIER_BASE_SPREAD_DEGREES)
                    * COURIER_BASE_LENGTH,
        ]
    }

    /// Nearest canonical direction, used for the status read-out.
    #[must_use]
    pub fn direction(&self) -> Direction {
        Direction::from_angle(self.angle_degrees)
    }
}

/// Unit vector in raster space (rows grow downwards) for a counter-clockwise angle.
fn heading_vector(degrees: f32) -> Vec2 {
    let radians = degrees.to_radians();
    Vec2::new(radians.cos(), -radians.sin())
}

/// Status read-out shown in the control panel.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StatusLine {
    /// Current delivery phase.
    pub phase: DeliveryPhase,
    /// Active speed setting.
    pub speed: Speed,
    /// Most recent delivery signal.
    pub outcome: Option<DeliveryOutcome>,
    /// Transient adapter message, such as a map load failure.
    pub notice: Option<String>,
    /// Whether background work is outstanding.
    pub busy: bool,
}

impl StatusLine {
    /// Formats the status for display.
    #[must_use]
    pub fn text(&self) -> String {
        let mut text = format!(
            "{} | speed {}",
            phase_label(self.phase),
            self.speed.get()
        );
        if let Some(outcome) = self.outcome {
            text.push_str(" | ");
            text.push_str(outcome_message(outcome));
        }
        if self.busy {
            text.push_str(" | working...");
        }
        if let Some(notice) = &self.notice {
            text.push_str(" | ");
            text.push_str(notice);
        }
        text
    }
}

/// Short label for a delivery phase.
#[must_use]
pub const fn phase_label(phase: DeliveryPhase) -> &'static str {
    match phase {
        DeliveryPhase::Idle => "Idle",
        DeliveryPhase::ToSource => "Heading to pickup",
        DeliveryPhase::ToDestination => "Delivering",
        DeliveryPhase::Completed => "Completed",
        DeliveryPhase::Stopped => "Stopped",
    }
}

/// Human-readable message for a delivery signal.
#[must_use]
pub const fn outcome_message(outcome: DeliveryOutcome) -> &'static str {
    match outcome {
        DeliveryOutcome::PickedUp => "Package picked up",
        DeliveryOutcome::Delivered => "Package delivered",
        DeliveryOutcome::NoPathToSource => "No path to pickup",
        DeliveryOutcome::NoPathToDestination => "No path to drop-off",
        DeliveryOutcome::PlacementUnreachable => "Could not find a connected placement",
        DeliveryOutcome::Stopped => "Delivery stopped",
    }
}

/// Human-readable explanation for a refused control.
#[must_use]
pub const fn rejection_message(reason: RejectionReason) -> &'static str {
    match reason {
        RejectionReason::MapMissing => "Load a map first",
        RejectionReason::PlacementMissing => "Randomize a placement first",
        RejectionReason::DeliveryInProgress => "Delivery already running",
        RejectionReason::PlacementInProgress => "Placement search still running",
        RejectionReason::NothingToStop => "Nothing to stop",
    }
}

/// Scene description combining the map, flags, route and courier.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Scene {
    /// Installed map, if any.
    pub map: Option<MapLayer>,
    /// Pickup and drop-off flags.
    pub flags: Vec<FlagPresentation>,
    /// Remaining route as a polyline in raster space, starting at the courier.
    pub path: Vec<Vec2>,
    /// Courier, present once placed.
    pub courier: Option<CourierPresentation>,
    /// Control panel read-out.
    pub status: StatusLine,
}

impl Scene {
    /// Builds a scene from a coordinator snapshot.
    #[must_use]
    pub fn from_snapshot(snapshot: &DeliverySnapshot) -> Self {
        let map = snapshot.map.as_ref().map(|view| MapLayer {
            generation: view.generation,
            raster: Arc::clone(&view.raster),
        });

        let flags = snapshot
            .placement
            .map(|placement| {
                vec![
                    FlagPresentation::new(FlagKind::Source, placement.source.position()),
                    FlagPresentation::new(FlagKind::Destination, placement.destination.position()),
                ]
            })
            .unwrap_or_default();

        let courier = snapshot.agent.map(|agent| CourierPresentation {
            position: agent.position,
            angle_degrees: agent.angle,
            carrying: agent.carrying,
        });

        let path = if snapshot.remaining_path.is_empty() {
            Vec::new()
        } else {
            courier
                .map(|courier| courier.position)
                .into_iter()
                .chain(snapshot.remaining_path.iter().map(|cell| cell.position()))
                .collect()
        };

        Self {
            map,
            flags,
            path,
            courier,
            status: StatusLine {
                phase: snapshot.phase,
                speed: snapshot.speed,
                outcome: snapshot.last_outcome,
                notice: None,
                busy: snapshot.map_pending || snapshot.placement_pending || snapshot.path_pending,
            },
        }
    }

    /// Size of the drawable area in pixels; zero when no map is installed.
    #[must_use]
    pub fn canvas_size(&self) -> Vec2 {
        self.map.as_ref().map_or(Vec2::ZERO, MapLayer::size)
    }
}

/// Presentation descriptor consumed by rendering backends.
#[derive(Clone, Debug, PartialEq)]
pub struct Presentation {
    /// Title used by the created window.
    pub window_title: String,
    /// Solid color used to clear each frame.
    pub clear_color: Color,
    /// Scene content that should be displayed.
    pub scene: Scene,
}

impl Presentation {
    /// Constructs a new presentation descriptor.
    #[must_use]
    pub fn new<T>(window_title: T, clear_color: Color, scene: Scene) -> Self
    where
        T: Into<String>,
    {
        Self {
            window_title: window_title.into(),
            clear_color,
            scene,
        }
    }
}

/// Rendering backend capable of presenting Smart Courier scenes.
pub trait RenderingBackend {
    /// Runs the rendering backend until it is requested to exit.
    ///
    /// The provided `update_scene` closure receives the frame delta and the
    /// per-frame input captured by the adapter, and replaces the scene before
    /// it is rendered.
    fn run<F>(self, presentation: Presentation, update_scene: F) -> AnyResult<()>
    where
        F: FnMut(Duration, FrameInput, &mut Scene) + 'static;
}
