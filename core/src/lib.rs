#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Smart Courier engine.
//!
//! This crate defines the message surface that connects adapters, the
//! authoritative delivery coordinator, and pure systems. Adapters submit
//! [`Command`] values describing desired mutations, the coordinator executes
//! those commands via its `apply` entry point, and then broadcasts [`Event`]
//! values that adapters react to, for example by scheduling background path
//! computations whose results come back as further commands.

use std::{collections::HashSet, fmt, path::PathBuf, sync::Arc, time::Duration};

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Title shown by presentation adapters.
pub const WINDOW_TITLE: &str = "Smart Courier";

/// Location of a single raster cell expressed as row and column coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cell {
    row: u32,
    column: u32,
}

impl Cell {
    /// Creates a new cell coordinate.
    #[must_use]
    pub const fn new(row: u32, column: u32) -> Self {
        Self { row, column }
    }

    /// Zero-based row index of the cell. Rows grow downwards.
    #[must_use]
    pub const fn row(&self) -> u32 {
        self.row
    }

    /// Zero-based column index of the cell.
    #[must_use]
    pub const fn column(&self) -> u32 {
        self.column
    }

    /// Reports whether the two cells differ by one unit along exactly one axis.
    #[must_use]
    pub fn is_adjacent(self, other: Cell) -> bool {
        self.manhattan_distance(other) == 1
    }

    /// Computes the Manhattan distance between two cells.
    #[must_use]
    pub fn manhattan_distance(self, other: Cell) -> u32 {
        self.row.abs_diff(other.row) + self.column.abs_diff(other.column)
    }

    /// Computes the Chebyshev distance between two cells.
    #[must_use]
    pub fn chebyshev_distance(self, other: Cell) -> u32 {
        self.row
            .abs_diff(other.row)
            .max(self.column.abs_diff(other.column))
    }

    /// Returns the neighbouring cell in the provided direction, if it lies within `bounds`.
    #[must_use]
    pub fn step(self, direction: Direction, bounds: GridBounds) -> Option<Cell> {
        let next = match direction {
            Direction::East => Cell::new(self.row, self.column.checked_add(1)?),
            Direction::South => Cell::new(self.row.checked_add(1)?, self.column),
            Direction::West => Cell::new(self.row, self.column.checked_sub(1)?),
            Direction::North => Cell::new(self.row.checked_sub(1)?, self.column),
        };
        bounds.contains(next).then_some(next)
    }

    /// Continuous position of the cell in raster space, `x` along columns and `y` along rows.
    #[must_use]
    pub fn position(self) -> Vec2 {
        Vec2::new(self.column as f32, self.row as f32)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.column)
    }
}

/// Dimensions of a cell grid.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridBounds {
    rows: u32,
    columns: u32,
}

impl GridBounds {
    /// Creates a new bounds descriptor.
    #[must_use]
    pub const fn new(rows: u32, columns: u32) -> Self {
        Self { rows, columns }
    }

    /// Number of rows contained in the grid.
    #[must_use]
    pub const fn rows(&self) -> u32 {
        self.rows
    }

    /// Number of columns contained in the grid.
    #[must_use]
    pub const fn columns(&self) -> u32 {
        self.columns
    }

    /// Reports whether the cell lies inside the grid.
    #[must_use]
    pub const fn contains(&self, cell: Cell) -> bool {
        cell.row < self.rows && cell.column < self.columns
    }

    /// Smallest bounds that contain every provided cell.
    #[must_use]
    pub fn enclosing<'a>(cells: impl IntoIterator<Item = &'a Cell>) -> Self {
        cells.into_iter().fold(Self::default(), |bounds, cell| Self {
            rows: bounds.rows.max(cell.row.saturating_add(1)),
            columns: bounds.columns.max(cell.column.saturating_add(1)),
        })
    }
}

/// Canonical facing directions used for discrete display and debugging.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Facing towards increasing column indices (0°).
    East,
    /// Facing towards decreasing row indices (90°).
    North,
    /// Facing towards decreasing column indices (180°).
    West,
    /// Facing towards increasing row indices (270°).
    South,
}

impl Direction {
    /// Facing angle in degrees, counter-clockwise from east.
    #[must_use]
    pub const fn angle_degrees(self) -> f32 {
        match self {
            Self::East => 0.0,
            Self::North => 90.0,
            Self::West => 180.0,
            Self::South => 270.0,
        }
    }

    /// Snaps a continuous angle in degrees to the nearest canonical direction.
    #[must_use]
    pub fn from_angle(degrees: f32) -> Self {
        let normalised = degrees.rem_euclid(360.0);
        let quadrant = ((normalised + 45.0) / 90.0).floor() as u32 % 4;
        match quadrant {
            0 => Self::East,
            1 => Self::North,
            2 => Self::West,
            _ => Self::South,
        }
    }
}

/// Decoded RGB raster used as the map source.
#[derive(Clone, PartialEq, Eq)]
pub struct RgbRaster {
    width: u32,
    height: u32,
    pixels: Vec<[u8; 3]>,
}

impl RgbRaster {
    /// Wraps row-major pixels, returning `None` when the pixel count does not match the size.
    #[must_use]
    pub fn new(width: u32, height: u32, pixels: Vec<[u8; 3]>) -> Option<Self> {
        let expected = usize::try_from(u64::from(width) * u64::from(height)).ok()?;
        (pixels.len() == expected).then_some(Self {
            width,
            height,
            pixels,
        })
    }

    /// Creates a raster where every pixel carries the same color.
    #[must_use]
    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        Self::from_fn(width, height, |_| rgb)
    }

    /// Creates a raster by evaluating `color_at` for every cell in row-major order.
    #[must_use]
    pub fn from_fn(width: u32, height: u32, mut color_at: impl FnMut(Cell) -> [u8; 3]) -> Self {
        let capacity = usize::try_from(u64::from(width) * u64::from(height)).unwrap_or(0);
        let mut pixels = Vec::with_capacity(capacity);
        for row in 0..height {
            for column in 0..width {
                pixels.push(color_at(Cell::new(row, column)));
            }
        }
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Width of the raster in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height of the raster in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Grid bounds spanned by the raster.
    #[must_use]
    pub const fn bounds(&self) -> GridBounds {
        GridBounds::new(self.height, self.width)
    }

    /// Color of the pixel stored at the provided cell.
    #[must_use]
    pub fn pixel(&self, cell: Cell) -> Option<[u8; 3]> {
        if !self.bounds().contains(cell) {
            return None;
        }
        let row = usize::try_from(cell.row()).ok()?;
        let column = usize::try_from(cell.column()).ok()?;
        let width = usize::try_from(self.width).ok()?;
        self.pixels.get(row * width + column).copied()
    }

    /// Iterates over every pixel paired with its cell in row-major order.
    pub fn pixels(&self) -> impl Iterator<Item = (Cell, [u8; 3])> + '_ {
        let width = self.width.max(1);
        self.pixels.iter().enumerate().map(move |(index, rgb)| {
            let index = index as u64;
            let row = (index / u64::from(width)) as u32;
            let column = (index % u64::from(width)) as u32;
            (Cell::new(row, column), *rgb)
        })
    }

    /// Expands the raster into opaque RGBA bytes suitable for texture uploads.
    #[must_use]
    pub fn to_rgba8(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.pixels.len() * 4);
        for [red, green, blue] in &self.pixels {
            bytes.extend_from_slice(&[*red, *green, *blue, u8::MAX]);
        }
        bytes
    }
}

impl fmt::Debug for RgbRaster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RgbRaster")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

/// Set of cells classified as road, with constant-time membership tests.
///
/// Members are additionally kept in row-major order so that seeded sampling
/// is reproducible regardless of hash iteration order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NavigableSet {
    bounds: GridBounds,
    ordered: Vec<Cell>,
    lookup: HashSet<Cell>,
}

impl NavigableSet {
    /// Builds a set from the provided cells, discarding cells outside `bounds` and duplicates.
    #[must_use]
    pub fn new(bounds: GridBounds, cells: impl IntoIterator<Item = Cell>) -> Self {
        let mut lookup = HashSet::new();
        let mut ordered: Vec<Cell> = cells
            .into_iter()
            .filter(|cell| bounds.contains(*cell))
            .filter(|cell| lookup.insert(*cell))
            .collect();
        ordered.sort_unstable();
        Self {
            bounds,
            ordered,
            lookup,
        }
    }

    /// Builds a set whose bounds tightly enclose the provided cells.
    #[must_use]
    pub fn from_cells(cells: impl IntoIterator<Item = Cell>) -> Self {
        let cells: Vec<Cell> = cells.into_iter().collect();
        Self::new(GridBounds::enclosing(&cells), cells)
    }

    /// Grid bounds of the raster the set was derived from.
    #[must_use]
    pub const fn bounds(&self) -> GridBounds {
        self.bounds
    }

    /// Reports whether the cell is navigable.
    #[must_use]
    pub fn contains(&self, cell: Cell) -> bool {
        self.lookup.contains(&cell)
    }

    /// Number of navigable cells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    /// Reports whether no cell is navigable.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    /// Navigable cells in row-major order.
    #[must_use]
    pub fn cells(&self) -> &[Cell] {
        &self.ordered
    }
}

/// Ordered route of cells. The start cell is never stored; the last cell is the goal.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Path {
    cells: Vec<Cell>,
}

impl Path {
    /// Wraps the provided cells.
    #[must_use]
    pub fn new(cells: Vec<Cell>) -> Self {
        Self { cells }
    }

    /// Path that carries no cells, signalling either "already there" or "unreachable".
    #[must_use]
    pub const fn empty() -> Self {
        Self { cells: Vec::new() }
    }

    /// Cells composing the route.
    #[must_use]
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Number of cells in the route.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Reports whether the route contains no cells.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Cell stored at the provided index.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<Cell> {
        self.cells.get(index).copied()
    }

    /// Final cell of the route.
    #[must_use]
    pub fn last(&self) -> Option<Cell> {
        self.cells.last().copied()
    }
}

impl From<Vec<Cell>> for Path {
    fn from(cells: Vec<Cell>) -> Self {
        Self::new(cells)
    }
}

/// Animation speed setting that scales both stride and tick frequency.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Speed(u32);

impl Speed {
    /// Slowest supported setting.
    pub const MIN: Speed = Speed(1);
    /// Fastest supported setting.
    pub const MAX: Speed = Speed(30);

    /// Creates a speed setting clamped into `MIN..=MAX`.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        if value < Self::MIN.0 {
            Self::MIN
        } else if value > Self::MAX.0 {
            Self::MAX
        } else {
            Self(value)
        }
    }

    /// Retrieves the numeric setting.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

impl Default for Speed {
    fn default() -> Self {
        Self(10)
    }
}

/// Monotonic tag attached to background requests so stale results can be discarded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Generation(u64);

impl Generation {
    /// Creates a generation tag with the provided numeric value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the tag.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }

    /// Returns the tag issued after this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

/// Phase of the two-leg delivery state machine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeliveryPhase {
    /// No delivery is running.
    #[default]
    Idle,
    /// The courier travels to the pickup flag.
    ToSource,
    /// The courier carries the package to the drop-off flag.
    ToDestination,
    /// The package was delivered.
    Completed,
    /// The delivery was halted by an explicit stop request.
    Stopped,
}

impl DeliveryPhase {
    /// Reports whether the courier is travelling along a leg.
    #[must_use]
    pub const fn is_travelling(self) -> bool {
        matches!(self, Self::ToSource | Self::ToDestination)
    }
}

/// Leg of a delivery for which a path is requested.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeliveryLeg {
    /// From the courier's cell to the pickup flag.
    ToSource,
    /// From the courier's cell to the drop-off flag.
    ToDestination,
}

impl DeliveryLeg {
    /// Phase the coordinator occupies while travelling this leg.
    #[must_use]
    pub const fn phase(self) -> DeliveryPhase {
        match self {
            Self::ToSource => DeliveryPhase::ToSource,
            Self::ToDestination => DeliveryPhase::ToDestination,
        }
    }
}

/// Discrete delivery signals surfaced to the presentation layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeliveryOutcome {
    /// The courier reached the pickup flag and collected the package.
    PickedUp,
    /// The courier reached the drop-off flag with the package.
    Delivered,
    /// No route connects the courier with the pickup flag.
    NoPathToSource,
    /// No route connects the pickup flag with the drop-off flag.
    NoPathToDestination,
    /// Placement retries were exhausted without finding a connected triple.
    PlacementUnreachable,
    /// The delivery was halted on request.
    Stopped,
}

/// Cells assigned to the courier and both flags by a placement operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Placement {
    /// Starting cell of the courier.
    pub agent: Cell,
    /// Pickup flag cell.
    pub source: Cell,
    /// Drop-off flag cell.
    pub destination: Cell,
}

impl Placement {
    /// Creates a new placement descriptor.
    #[must_use]
    pub const fn new(agent: Cell, source: Cell, destination: Cell) -> Self {
        Self {
            agent,
            source,
            destination,
        }
    }
}

/// Courier state advanced by the motion system and owned by the coordinator.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AgentState {
    /// Authoritative logical cell.
    pub cell: Cell,
    /// Smoothed display position in raster space.
    pub position: Vec2,
    /// Displayed facing angle in degrees within `[0, 360)`.
    pub angle: f32,
    /// Facing angle the display angle converges towards.
    pub target_angle: f32,
    /// Whether the courier carries the package.
    pub carrying: bool,
    /// Number of cells of the active path consumed so far.
    pub step: usize,
    /// Current delivery phase.
    pub phase: DeliveryPhase,
}

impl AgentState {
    /// Creates an idle courier resting on the provided cell and facing east.
    #[must_use]
    pub fn at(cell: Cell) -> Self {
        Self {
            cell,
            position: cell.position(),
            angle: 0.0,
            target_angle: 0.0,
            carrying: false,
            step: 0,
            phase: DeliveryPhase::Idle,
        }
    }
}

/// Origin of a map analysis request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MapSource {
    /// Image file that must be decoded and validated.
    File(PathBuf),
    /// Raster that was already decoded in memory.
    Raster(Arc<RgbRaster>),
}

/// Result of analysing a map: the raster and the road cells derived from it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MapAnalysis {
    /// Decoded raster used for presentation.
    pub raster: Arc<RgbRaster>,
    /// Cells classified as road.
    pub navigable: Arc<NavigableSet>,
}

/// Reasons a command may be rejected before any work begins.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RejectionReason {
    /// No map has been installed yet.
    MapMissing,
    /// No placement has been applied yet.
    PlacementMissing,
    /// A delivery leg is running or awaiting its path.
    DeliveryInProgress,
    /// A placement search is already running.
    PlacementInProgress,
    /// There is no running delivery to stop.
    NothingToStop,
}

/// Commands that express all permissible coordinator mutations.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Requests that a map be decoded and analysed in the background.
    LoadMap {
        /// Where the map comes from.
        source: MapSource,
    },
    /// Delivers the result of a background map analysis.
    ApplyMapAnalysis {
        /// Generation the analysis was issued for.
        generation: Generation,
        /// Decoded raster and derived road cells.
        analysis: MapAnalysis,
    },
    /// Reports that a background map analysis failed.
    RejectMapAnalysis {
        /// Generation the analysis was issued for.
        generation: Generation,
        /// Human-readable failure description.
        reason: String,
    },
    /// Requests a randomized placement of the courier and both flags.
    RandomizePlacement {
        /// Seed used by the placement search.
        seed: u64,
    },
    /// Delivers a successful background placement.
    ApplyPlacement {
        /// Generation the placement was issued for.
        generation: Generation,
        /// Cells chosen for the courier and both flags.
        placement: Placement,
    },
    /// Reports that the placement search exhausted its retries.
    RejectPlacement {
        /// Generation the placement was issued for.
        generation: Generation,
        /// Number of attempts performed before giving up.
        attempts: u32,
    },
    /// Starts or resumes a delivery.
    StartDelivery,
    /// Delivers a path computed in the background.
    ApplyPath {
        /// Generation the path was issued for.
        generation: Generation,
        /// Leg the path belongs to.
        leg: DeliveryLeg,
        /// Computed route, empty when no route exists.
        path: Path,
    },
    /// Halts the running delivery, preserving courier and package state.
    StopDelivery,
    /// Changes the animation speed setting.
    SetSpeed {
        /// Requested setting, clamped into the supported range.
        speed: Speed,
    },
    /// Advances the simulation clock by the provided delta time.
    Tick {
        /// Duration of time that elapsed since the previous tick.
        dt: Duration,
    },
}

/// Events broadcast by the coordinator after processing commands.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Asks adapters to analyse a map in the background.
    MapAnalysisRequested {
        /// Generation the result must carry.
        generation: Generation,
        /// Where the map comes from.
        source: MapSource,
    },
    /// Confirms that a new map replaced the previous one.
    MapInstalled {
        /// Grid bounds of the installed raster.
        bounds: GridBounds,
        /// Number of cells classified as road.
        navigable_cells: usize,
    },
    /// Warns that the installed map has too few road cells to be useful.
    InsufficientRoadArea {
        /// Number of cells classified as road.
        navigable_cells: usize,
    },
    /// Reports that a map could not be loaded; the previous map stays active.
    MapLoadFailed {
        /// Human-readable failure description.
        reason: String,
    },
    /// Asks adapters to run a placement search in the background.
    PlacementRequested {
        /// Generation the result must carry.
        generation: Generation,
        /// Seed for the placement search.
        seed: u64,
        /// Road cells to sample from.
        navigable: Arc<NavigableSet>,
    },
    /// Confirms that the courier and both flags were placed.
    PlacementApplied {
        /// Cells chosen for the courier and both flags.
        placement: Placement,
    },
    /// Asks adapters to compute a path in the background.
    PathRequested {
        /// Generation the result must carry.
        generation: Generation,
        /// Leg the path belongs to.
        leg: DeliveryLeg,
        /// Start cell of the search.
        from: Cell,
        /// Goal cell of the search.
        to: Cell,
        /// Road cells to search over.
        navigable: Arc<NavigableSet>,
    },
    /// Confirms that a computed path became the active route.
    PathAssigned {
        /// Leg the path belongs to.
        leg: DeliveryLeg,
        /// Number of cells in the path.
        length: usize,
    },
    /// Announces that the delivery state machine changed phase.
    PhaseChanged {
        /// Phase before the transition.
        from: DeliveryPhase,
        /// Phase after the transition.
        to: DeliveryPhase,
    },
    /// Confirms that the courier moved between two cells during a tick.
    AgentAdvanced {
        /// Cell occupied before the tick.
        from: Cell,
        /// Cell occupied after the tick.
        to: Cell,
    },
    /// Discrete delivery signal for status display.
    Outcome {
        /// Signal that occurred.
        outcome: DeliveryOutcome,
    },
    /// Confirms a new speed setting.
    SpeedChanged {
        /// Active speed setting.
        speed: Speed,
    },
    /// Reports that a command was rejected before any work began.
    OperationRejected {
        /// Specific reason the command failed.
        reason: RejectionReason,
    },
    /// Reports that a background result arrived for a request that is no longer pending.
    StaleResultDiscarded {
        /// Generation carried by the discarded result.
        generation: Generation,
    },
}

/// Read-only view of the installed map handed to presentation adapters.
#[derive(Clone, Debug, PartialEq)]
pub struct MapView {
    /// Generation under which the map was installed; changes whenever the map changes.
    pub generation: Generation,
    /// Decoded raster.
    pub raster: Arc<RgbRaster>,
    /// Number of cells classified as road.
    pub navigable_cells: usize,
}

/// Immutable copy of the delivery context taken once per frame for rendering.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DeliverySnapshot {
    /// Installed map, if any.
    pub map: Option<MapView>,
    /// Current placement, if any.
    pub placement: Option<Placement>,
    /// Courier state, present once a placement was applied.
    pub agent: Option<AgentState>,
    /// Cells of the active path that the courier has not consumed yet.
    pub remaining_path: Vec<Cell>,
    /// Current delivery phase.
    pub phase: DeliveryPhase,
    /// Active speed setting.
    pub speed: Speed,
    /// Most recent delivery signal.
    pub last_outcome: Option<DeliveryOutcome>,
    /// Whether a map analysis is running in the background.
    pub map_pending: bool,
    /// Whether a placement search is running in the background.
    pub placement_pending: bool,
    /// Whether a path computation is running in the background.
    pub path_pending: bool,
}

#[cfg(test)]
mod tests {
    use super::{Cell, DeliveryOutcome, Direction, GridBounds, NavigableSet, Path, RgbRaster, Speed};
    use serde::{de::DeserializeOwned, Serialize};

    #[test]
    fn adjacency_requires_single_orthogonal_step() {
        let origin = Cell::new(4, 4);
        assert!(origin.is_adjacent(Cell::new(4, 5)));
        assert!(origin.is_adjacent(Cell::new(3, 4)));
        assert!(!origin.is_adjacent(Cell::new(5, 5)));
        assert!(!origin.is_adjacent(origin));
    }

    #[test]
    fn distances_match_expectation() {
        let origin = Cell::new(1, 1);
        let destination = Cell::new(4, 3);
        assert_eq!(origin.manhattan_distance(destination), 5);
        assert_eq!(origin.chebyshev_distance(destination), 3);
    }

    #[test]
    fn step_respects_bounds() {
        let bounds = GridBounds::new(2, 2);
        let corner = Cell::new(0, 0);
        assert_eq!(corner.step(Direction::North, bounds), None);
        assert_eq!(corner.step(Direction::West, bounds), None);
        assert_eq!(corner.step(Direction::East, bounds), Some(Cell::new(0, 1)));
        assert_eq!(corner.step(Direction::South, bounds), Some(Cell::new(1, 0)));
        assert_eq!(Cell::new(1, 1).step(Direction::East, bounds), None);
    }

    #[test]
    fn direction_snaps_to_nearest_canonical_angle() {
        assert_eq!(Direction::from_angle(10.0), Direction::East);
        assert_eq!(Direction::from_angle(350.0), Direction::East);
        assert_eq!(Direction::from_angle(100.0), Direction::North);
        assert_eq!(Direction::from_angle(-90.0), Direction::South);
        assert_eq!(Direction::from_angle(181.0), Direction::West);
        assert!((Direction::South.angle_degrees() - 270.0).abs() < f32::EPSILON);
    }

    #[test]
    fn navigable_set_orders_and_deduplicates() {
        let set = NavigableSet::from_cells([
            Cell::new(2, 0),
            Cell::new(0, 3),
            Cell::new(0, 1),
            Cell::new(0, 3),
        ]);
        assert_eq!(set.len(), 3);
        assert_eq!(
            set.cells(),
            &[Cell::new(0, 1), Cell::new(0, 3), Cell::new(2, 0)]
        );
        assert_eq!(set.bounds(), GridBounds::new(3, 4));
        assert!(set.contains(Cell::new(2, 0)));
        assert!(!set.contains(Cell::new(1, 1)));
    }

    #[test]
    fn navigable_set_discards_cells_outside_bounds() {
        let set = NavigableSet::new(GridBounds::new(2, 2), [Cell::new(1, 1), Cell::new(2, 0)]);
        assert_eq!(set.cells(), &[Cell::new(1, 1)]);
    }

    #[test]
    fn raster_rejects_mismatched_pixel_count() {
        assert!(RgbRaster::new(2, 2, vec![[0, 0, 0]; 3]).is_none());
        let raster = RgbRaster::new(2, 1, vec![[1, 2, 3], [4, 5, 6]]).expect("valid raster");
        assert_eq!(raster.pixel(Cell::new(0, 1)), Some([4, 5, 6]));
        assert_eq!(raster.pixel(Cell::new(1, 0)), None);
        assert_eq!(raster.to_rgba8(), vec![1, 2, 3, 255, 4, 5, 6, 255]);
    }

    #[test]
    fn speed_is_clamped_into_supported_range() {
        assert_eq!(Speed::new(0), Speed::MIN);
        assert_eq!(Speed::new(99), Speed::MAX);
        assert_eq!(Speed::new(12).get(), 12);
    }

    fn assert_round_trip<T>(value: &T)
    where
        T: Serialize + DeserializeOwned + PartialEq + std::fmt::Debug,
    {
        let bytes = bincode::serialize(value).expect("serialize");
        let restored: T = bincode::deserialize(&bytes).expect("deserialize");
        assert_eq!(&restored, value);
    }

    #[test]
    fn path_round_trips_through_bincode() {
        assert_round_trip(&Path::new(vec![Cell::new(1, 2), Cell::new(1, 3)]));
    }

    #[test]
    fn delivery_outcome_round_trips_through_bincode() {
        assert_round_trip(&DeliveryOutcome::NoPathToDestination);
    }
}
