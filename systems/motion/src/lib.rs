#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Time-stepped motion system that advances the courier along a path.
//!
//! Each tick consumes a speed-dependent number of path cells, re-aims the
//! courier at a look-ahead cell further down the path, and eases the
//! displayed pose towards the logical one so that discrete jumps render as
//! smooth motion.

use std::time::Duration;

use courier_core::{AgentState, Cell, Path, Speed};

/// Number of cells ahead of the courier used to derive its facing angle.
pub const LOOK_AHEAD: usize = 5;
/// Fraction of the remaining angular difference closed per tick.
pub const ANGLE_EASING: f32 = 0.2;
/// Fraction of the remaining positional difference closed per tick.
pub const POSITION_EASING: f32 = 0.3;

const BASE_TICK_MILLIS: f64 = 30.0;
const TICK_EXPONENT: f64 = 0.7;

/// Progress reported after advancing the courier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MotionStatus {
    /// Cells of the path remain to be consumed.
    InTransit,
    /// The courier rests on the final cell of the path.
    Arrived,
}

impl MotionStatus {
    /// Reports whether the path has been fully consumed.
    #[must_use]
    pub const fn is_done(self) -> bool {
        matches!(self, Self::Arrived)
    }
}

/// Speed-parameterized controller that advances an [`AgentState`] along a [`Path`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MotionController {
    speed: Speed,
}

impl MotionController {
    /// Creates a controller running at the provided speed.
    #[must_use]
    pub const fn new(speed: Speed) -> Self {
        Self { speed }
    }

    /// Active speed setting.
    #[must_use]
    pub const fn speed(&self) -> Speed {
        self.speed
    }

    /// Replaces the speed setting.
    pub fn set_speed(&mut self, speed: Speed) {
        self.speed = speed;
    }

    /// Maximum number of path cells consumed per tick.
    #[must_use]
    pub fn step_size(&self) -> usize {
        step_size(self.speed)
    }

    /// Time that must elapse between two ticks.
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        tick_interval(self.speed)
    }

    /// Advances the courier by one tick.
    ///
    /// The courier's `step` counts consumed path cells. Once it reaches the
    /// path length the courier rests on the final cell and further calls
    /// leave the state untouched. An empty path reports arrival immediately.
    pub fn advance(&self, state: &mut AgentState, path: &Path) -> MotionStatus {
        let total = path.len();
        if state.step >= total {
            return MotionStatus::Arrived;
        }

        let stride = self.step_size().min(total - state.step);
        let departed = state.cell;
        state.step += stride;

        let reached = state.step - 1;
        if let Some(cell) = path.get(reached) {
            state.cell = cell;
        }

        let ahead_index = (reached + LOOK_AHEAD).min(total - 1);
        if let Some(heading) = path
            .get(ahead_index)
            .and_then(|ahead| heading_degrees(departed, ahead))
        {
            state.target_angle = heading;
        }

        ease(state);

        if state.step == total {
            MotionStatus::Arrived
        } else {
            MotionStatus::InTransit
        }
    }
}

/// Number of path cells consumed per tick at the provided speed.
#[must_use]
pub fn step_size(speed: Speed) -> usize {
    1 + (speed.get() / 5) as usize
}

/// Interval between ticks at the provided speed, `floor(30 / speed^0.7)` milliseconds.
#[must_use]
pub fn tick_interval(speed: Speed) -> Duration {
    let millis = (BASE_TICK_MILLIS / f64::from(speed.get()).powf(TICK_EXPONENT))
        .floor()
        .max(0.0);
    Duration::from_millis(millis as u64)
}

/// Facing angle from `from` towards `to` in degrees within `[0, 360)`.
///
/// Rows grow downwards while angles grow counter-clockwise, so the row delta
/// is negated. Returns `None` when both cells coincide.
#[must_use]
pub fn heading_degrees(from: Cell, to: Cell) -> Option<f32> {
    if from == to {
        return None;
    }
    let delta_row = to.row() as f32 - from.row() as f32;
    let delta_column = to.column() as f32 - from.column() as f32;
    Some(normalise_degrees((-delta_row).atan2(delta_column).to_degrees()))
}

/// Wraps an angle into `[0, 360)`.
#[must_use]
pub fn normalise_degrees(degrees: f32) -> f32 {
    let wrapped = degrees.rem_euclid(360.0);
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// Shortest signed rotation from `from` to `to`, within `[-180, 180]`.
#[must_use]
pub fn shortest_rotation(from: f32, to: f32) -> f32 {
    let delta = (to - from).rem_euclid(360.0);
    if delta > 180.0 {
        delta - 360.0
    } else {
        delta
    }
}

fn ease(state: &mut AgentState) {
    let rotation = shortest_rotation(state.angle, state.target_angle);
    state.angle = normalise_degrees(state.angle + rotation * ANGLE_EASING);

    let target = state.cell.position();
    state.position += (target - state.position) * POSITION_EASING;
}
