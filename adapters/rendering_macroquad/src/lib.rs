#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Macroquad-backed rendering adapter for Smart Courier.
//!
//! Macroquad's optional audio stack depends on native ALSA development
//! libraries, so the crate depends on macroquad without its default `audio`
//! feature.
//!
//! All uses of Macroquad's immediate-mode UI live inside the local `ui` module
//! so the renderer itself only deals with shapes and textures.

mod ui;

use self::ui::{draw_control_panel_ui, ControlPanelUiContext, ControlPanelUiResult};
use anyhow::Result;
use courier_core::{Generation, Speed};
use courier_rendering::{
    Color, CourierPresentation, FlagPresentation, FrameInput, MapLayer, Presentation,
    RenderingBackend, Scene,
};
use glam::Vec2;
use macroquad::{
    color::WHITE,
    input::{is_key_pressed, KeyCode},
    math::Vec2 as MacroquadVec2,
    texture::{draw_texture_ex, DrawTextureParams, FilterMode, Texture2D},
};
use std::{
    collections::VecDeque,
    path::PathBuf,
    time::{Duration, Instant},
};
use tracing::{info, warn};

/// Width of the control panel docked on the right edge of the window.
const CONTROL_PANEL_WIDTH: f32 = 280.0;
const CONTROL_PANEL_BACKGROUND: Color = Color::from_rgb_u8(45, 45, 48);
const PATH_THICKNESS: f32 = 2.0;
const FLAG_POLE_HEIGHT: f32 = 24.0;
const FLAG_WIDTH: f32 = 14.0;
const FLAG_HEIGHT: f32 = 9.0;

/// Tracks UI-sourced interactions so they can be merged with physical input on the next frame.
#[doc(hidden)]
#[derive(Clone, Debug, Default)]
pub struct ControlPanelInputState {
    randomize_latched: bool,
    start_latched: bool,
    stop_latched: bool,
    load_map_latched: Option<PathBuf>,
    speed_latched: Option<Speed>,
}

impl ControlPanelInputState {
    /// Records that the randomize button was pressed this frame.
    pub fn register_randomize(&mut self) {
        self.randomize_latched = true;
    }

    /// Records that the start button was pressed this frame.
    pub fn register_start(&mut self) {
        self.start_latched = true;
    }

    /// Records that the stop button was pressed this frame.
    pub fn register_stop(&mut self) {
        self.stop_latched = true;
    }

    /// Records a map file the user asked to load.
    pub fn register_load_map(&mut self, path: PathBuf) {
        self.load_map_latched = Some(path);
    }

    /// Records a speed chosen with the slider.
    pub fn register_speed(&mut self, speed: Speed) {
        self.speed_latched = Some(speed);
    }

    /// Returns every latched request as frame input and clears the latches so each fires once.
    pub fn take_frame_input(&mut self) -> FrameInput {
        FrameInput {
            randomize: std::mem::take(&mut self.randomize_latched),
            start: std::mem::take(&mut self.start_latched),
            stop: std::mem::take(&mut self.stop_latched),
            load_map: self.load_map_latched.take(),
            speed: self.speed_latched.take(),
        }
    }
}

/// Snapshot of edge-triggered keyboard shortcuts observed during a single frame.
#[derive(Clone, Copy, Debug, Default)]
struct KeyboardShortcuts {
    /// `Q` or `Escape` to quit the render loop.
    quit_requested: bool,
    /// `R` randomizes the placement.
    randomize: bool,
    /// `Space` starts or resumes the delivery.
    start: bool,
    /// `X` stops the delivery.
    stop: bool,
}

impl KeyboardShortcuts {
    fn poll() -> Self {
        Self {
            quit_requested: is_key_pressed(KeyCode::Escape) || is_key_pressed(KeyCode::Q),
            randomize: is_key_pressed(KeyCode::R),
            start: is_key_pressed(KeyCode::Space),
            stop: is_key_pressed(KeyCode::X),
        }
    }

    fn merge_into(self, input: &mut FrameInput) {
        input.randomize |= self.randomize;
        input.start |= self.start;
        input.stop |= self.stop;
    }
}

/// Rendering backend implemented on top of macroquad.
#[derive(Debug, Default)]
pub struct MacroquadBackend {
    swap_interval: Option<i32>,
    show_fps: bool,
    initial_map_path: String,
}

impl MacroquadBackend {
    /// Returns a backend that requests the platform's default swap interval.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the backend to request a specific swap interval from the platform.
    #[must_use]
    pub fn with_swap_interval(mut self, swap_interval: Option<i32>) -> Self {
        self.swap_interval = swap_interval;
        self
    }

    /// Configures the backend to either synchronise presentation with the display refresh rate
    /// or render as fast as possible.
    #[must_use]
    pub fn with_vsync(self, enabled: bool) -> Self {
        let swap_interval = if enabled { Some(1) } else { Some(0) };
        self.with_swap_interval(swap_interval)
    }

    /// Configures whether the backend logs frame timing metrics once per second.
    #[must_use]
    pub fn with_show_fps(mut self, show: bool) -> Self {
        self.show_fps = show;
        self
    }

    /// Prefills the map path field of the control panel.
    #[must_use]
    pub fn with_map_path<T: Into<String>>(mut self, path: T) -> Self {
        self.initial_map_path = path.into();
        self
    }
}

#[derive(Clone, Copy, Debug, Default)]
struct FrameBreakdown {
    frame: Duration,
    update: Duration,
    render: Duration,
}

#[derive(Debug, Default)]
struct FpsCounter {
    elapsed: Duration,
    frames: u32,
    frame_times: VecDeque<Duration>,
    window_duration: Duration,
    update_accum: Duration,
    render_accum: Duration,
}

#[derive(Clone, Copy, Debug)]
struct FpsMetrics {
    per_second: f32,
    trailing_ten_seconds: f32,
    avg_update: Duration,
    avg_render: Duration,
}

impl FpsCounter {
    /// Records a rendered frame and returns the per-second and trailing ten-second averages once
    /// one second has elapsed.
    fn record_frame(&mut self, breakdown: FrameBreakdown) -> Option<FpsMetrics> {
        self.elapsed += breakdown.frame;
        self.frames = self.frames.saturating_add(1);
        self.update_accum += breakdown.update;
        self.render_accum += breakdown.render;

        self.frame_times.push_back(breakdown.frame);
        self.window_duration += breakdown.frame;

        let trailing_window = Duration::from_secs(10);
        while self.window_duration > trailing_window {
            let Some(removed) = self.frame_times.pop_front() else {
                break;
            };
            self.window_duration = self.window_duration.saturating_sub(removed);
        }

        if self.elapsed < Duration::from_secs(1) {
            return None;
        }

        let seconds = self.elapsed.as_secs_f32();
        let frames = self.frames.max(1);
        let per_second = self.frames as f32 / seconds;
        let window_seconds = self.window_duration.as_secs_f32();
        let trailing_ten_seconds = if window_seconds <= f32::EPSILON {
            per_second
        } else {
            self.frame_times.len() as f32 / window_seconds
        };
        let metrics = FpsMetrics {
            per_second,
            trailing_ten_seconds,
            avg_update: self.update_accum / frames,
            avg_render: self.render_accum / frames,
        };

        self.elapsed = Duration::ZERO;
        self.frames = 0;
        self.update_accum = Duration::ZERO;
        self.render_accum = Duration::ZERO;
        Some(metrics)
    }
}

/// GPU copy of the installed map, rebuilt whenever the map generation changes.
#[derive(Default)]
struct MapTextureCache {
    generation: Option<Generation>,
    texture: Option<Texture2D>,
}

impl MapTextureCache {
    fn refresh(&mut self, map: Option<&MapLayer>) -> Option<Texture2D> {
        let Some(map) = map else {
            self.generation = None;
            self.texture = None;
            return None;
        };
        if self.generation == Some(map.generation) {
            return self.texture;
        }

        self.generation = Some(map.generation);
        self.texture = match (
            u16::try_from(map.raster.width()),
            u16::try_from(map.raster.height()),
        ) {
            (Ok(width), Ok(height)) => {
                let texture = Texture2D::from_rgba8(width, height, &map.raster.to_rgba8());
                texture.set_filter(FilterMode::Nearest);
                Some(texture)
            }
            _ => {
                warn!(
                    width = map.raster.width(),
                    height = map.raster.height(),
                    "map too large for a texture"
                );
                None
            }
        };
        self.texture
    }
}

impl RenderingBackend for MacroquadBackend {
    fn run<F>(self, presentation: Presentation, mut update_scene: F) -> Result<()>
    where
        F: FnMut(Duration, FrameInput, &mut Scene) + 'static,
    {
        let Self {
            swap_interval,
            show_fps,
            initial_map_path,
        } = self;

        let Presentation {
            window_title,
            clear_color,
            scene,
        } = presentation;

        let mut config = macroquad::window::Conf {
            window_title,
            window_width: 1200 + CONTROL_PANEL_WIDTH as i32,
            window_height: 800,
            window_resizable: true,
            ..macroquad::window::Conf::default()
        };
        if let Some(swap_interval) = swap_interval {
            config.platform.swap_interval = Some(swap_interval);
        }

        macroquad::Window::from_config(config, async move {
            let mut scene = scene;
            let background = to_macroquad_color(clear_color);
            let mut fps_counter = FpsCounter::default();
            let mut control_panel_input = ControlPanelInputState::default();
            let mut map_path = initial_map_path;
            let mut speed_slider = scene.status.speed.get() as f32;
            let mut textures = MapTextureCache::default();

            loop {
                let keyboard = KeyboardShortcuts::poll();
                if keyboard.quit_requested {
                    break;
                }

                macroquad::window::clear_background(background);

                let screen_width = macroquad::window::screen_width();
                let screen_height = macroquad::window::screen_height();

                let dt_seconds = macroquad::time::get_frame_time();
                let frame_dt = Duration::from_secs_f32(dt_seconds.max(0.0));
                let mut frame_input = control_panel_input.take_frame_input();
                keyboard.merge_into(&mut frame_input);

                let update_start = Instant::now();
                update_scene(frame_dt, frame_input, &mut scene);
                let update_duration = update_start.elapsed();

                let render_start = Instant::now();
                let metrics = SceneMetrics::from_scene(&scene, screen_width, screen_height);
                if let Some(texture) = textures.refresh(scene.map.as_ref()) {
                    draw_map(texture, &metrics);
                }
                draw_path(&scene.path, &metrics);
                for flag in &scene.flags {
                    draw_flag(flag, &metrics);
                }
                if let Some(courier) = &scene.courier {
                    draw_courier(courier, &metrics);
                }

                let panel_left = (screen_width - CONTROL_PANEL_WIDTH).max(0.0);
                let panel_background = to_macroquad_color(CONTROL_PANEL_BACKGROUND);
                macroquad::shapes::draw_rectangle(
                    panel_left,
                    0.0,
                    CONTROL_PANEL_WIDTH,
                    screen_height,
                    panel_background,
                );
                let ControlPanelUiResult {
                    randomize,
                    start,
                    stop,
                    load_map,
                    speed,
                } = draw_control_panel_ui(
                    &mut macroquad::ui::root_ui(),
                    ControlPanelUiContext {
                        origin: MacroquadVec2::new(panel_left, 0.0),
                        size: MacroquadVec2::new(CONTROL_PANEL_WIDTH, screen_height),
                        background: panel_background,
                        status: scene.status.text(),
                    },
                    &mut map_path,
                    &mut speed_slider,
                );
                if randomize {
                    control_panel_input.register_randomize();
                }
                if start {
                    control_panel_input.register_start();
                }
                if stop {
                    control_panel_input.register_stop();
                }
                if load_map {
                    if let Some(path) = map_path_request(&map_path) {
                        control_panel_input.register_load_map(path);
                    }
                }
                if let Some(speed) = speed {
                    control_panel_input.register_speed(speed);
                }

                let fps_metrics = fps_counter.record_frame(FrameBreakdown {
                    frame: frame_dt,
                    update: update_duration,
                    render: render_start.elapsed(),
                });
                if show_fps {
                    if let Some(FpsMetrics {
                        per_second,
                        trailing_ten_seconds,
                        avg_update,
                        avg_render,
                    }) = fps_metrics
                    {
                        info!(
                            fps = per_second,
                            fps_10s = trailing_ten_seconds,
                            update_ms = avg_update.as_secs_f64() * 1_000.0,
                            render_ms = avg_render.as_secs_f64() * 1_000.0,
                            heading = ?scene.courier.as_ref().map(CourierPresentation::direction),
                            "frame timing"
                        );
                    }
                }

                macroquad::window::next_frame().await;
            }
        });

        Ok(())
    }
}

/// Trims the text field and turns it into a load request when non-empty.
fn map_path_request(text: &str) -> Option<PathBuf> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(PathBuf::from(trimmed))
    }
}

/// Uniform scale and offset that fit the map canvas left of the control panel.
#[derive(Clone, Copy, Debug, PartialEq)]
struct SceneMetrics {
    scale: f32,
    offset: Vec2,
}

impl SceneMetrics {
    fn from_scene(scene: &Scene, screen_width: f32, screen_height: f32) -> Self {
        let canvas = scene.canvas_size();
        let available_width = (screen_width - CONTROL_PANEL_WIDTH).max(0.0);
        if canvas.x <= f32::EPSILON || canvas.y <= f32::EPSILON {
            return Self {
                scale: 1.0,
                offset: Vec2::ZERO,
            };
        }

        let scale = (available_width / canvas.x).min(screen_height / canvas.y);
        let scaled = canvas * scale;
        let offset = Vec2::new(
            ((available_width - scaled.x) * 0.5).max(0.0),
            ((screen_height - scaled.y) * 0.5).max(0.0),
        );
        Self { scale, offset }
    }

    fn to_screen(&self, position: Vec2) -> MacroquadVec2 {
        let screen = self.offset + position * self.scale;
        MacroquadVec2::new(screen.x, screen.y)
    }
}

fn draw_map(texture: Texture2D, metrics: &SceneMetrics) {
    let size = MacroquadVec2::new(texture.width(), texture.height()) * metrics.scale;
    draw_texture_ex(
        texture,
        metrics.offset.x,
        metrics.offset.y,
        WHITE,
        DrawTextureParams {
            dest_size: Some(size),
            ..DrawTextureParams::default()
        },
    );
}

fn draw_path(points: &[Vec2], metrics: &SceneMetrics) {
    let color = to_macroquad_color(courier_rendering::palette::PATH);
    for segment in points.windows(2) {
        let from = metrics.to_screen(segment[0]);
        let to = metrics.to_screen(segment[1]);
        macroquad::shapes::draw_line(from.x, from.y, to.x, to.y, PATH_THICKNESS, color);
    }
}

fn draw_flag(flag: &FlagPresentation, metrics: &SceneMetrics) {
    let base = metrics.to_screen(flag.position);
    let top = MacroquadVec2::new(base.x, base.y - FLAG_POLE_HEIGHT);
    let color = to_macroquad_color(flag.color);

    macroquad::shapes::draw_line(base.x, base.y, top.x, top.y, 2.0, macroquad::color::BLACK);
    macroquad::shapes::draw_triangle(
        top,
        MacroquadVec2::new(top.x + FLAG_WIDTH, top.y + FLAG_HEIGHT * 0.5),
        MacroquadVec2::new(top.x, top.y + FLAG_HEIGHT),
        color,
    );
    macroquad::shapes::draw_circle(base.x, base.y, 3.0, color);
}

fn draw_courier(courier: &CourierPresentation, metrics: &SceneMetrics) {
    let centre = metrics.to_screen(courier.position);
    let [tip, left, right] = courier
        .triangle()
        .map(|vertex| centre + to_macroquad_vec(vertex - courier.position));
    let color = to_macroquad_color(courier.color());

    macroquad::shapes::draw_triangle(tip, left, right, color);
    macroquad::shapes::draw_triangle_lines(tip, left, right, 1.5, macroquad::color::BLACK);
}

fn to_macroquad_vec(vector: Vec2) -> MacroquadVec2 {
    MacroquadVec2::new(vector.x, vector.y)
}

fn to_macroquad_color(color: Color) -> macroquad::color::Color {
    macroquad::color::Color::new(color.red, color.green, color.blue, color.alpha)
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::RgbRaster;
    use std::sync::Arc;

    fn scene_with_canvas(width: u32, height: u32) -> Scene {
        Scene {
            map: Some(MapLayer {
                generation: Generation::new(1),
                raster: Arc::new(RgbRaster::filled(width, height, [255, 255, 255])),
            }),
            ..Scene::default()
        }
    }

    #[test]
    fn metrics_fit_canvas_left_of_panel() {
        let scene = scene_with_canvas(1200, 800);
        let metrics =
            SceneMetrics::from_scene(&scene, 600.0 + CONTROL_PANEL_WIDTH, 800.0);

        assert!((metrics.scale - 0.5).abs() < 1e-6);
        assert_eq!(metrics.offset, Vec2::new(0.0, 200.0));
        let corner = metrics.to_screen(Vec2::new(1200.0, 800.0));
        assert!((corner.x - 600.0).abs() < 1e-4);
        assert!((corner.y - 600.0).abs() < 1e-4);
    }

    #[test]
    fn metrics_default_to_identity_without_map() {
        let metrics = SceneMetrics::from_scene(&Scene::default(), 800.0, 600.0);
        assert_eq!(
            metrics,
            SceneMetrics {
                scale: 1.0,
                offset: Vec2::ZERO
            }
        );
    }

    #[test]
    fn map_path_request_ignores_blank_text() {
        assert_eq!(map_path_request("   "), None);
        assert_eq!(
            map_path_request(" maps/city.png "),
            Some(PathBuf::from("maps/city.png"))
        );
    }

    #[test]
    fn fps_counter_reports_average_frames_per_second() {
        let mut counter = FpsCounter::default();
        let frame = |millis| FrameBreakdown {
            frame: Duration::from_millis(millis),
            ..FrameBreakdown::default()
        };
        assert!(counter.record_frame(frame(250)).is_none());
        assert!(counter.record_frame(frame(250)).is_none());
        assert!(counter.record_frame(frame(250)).is_none());

        let metrics = counter
            .record_frame(frame(250))
            .expect("should report FPS after one second of samples");
        assert!((metrics.per_second - 4.0).abs() <= 1e-3);
        assert!((metrics.trailing_ten_seconds - 4.0).abs() <= 1e-3);
        assert!(counter.record_frame(frame(250)).is_none());
    }

    #[test]
    fn fps_counter_averages_update_and_render_time() {
        let mut counter = FpsCounter::default();
        let frame = FrameBreakdown {
            frame: Duration::from_millis(500),
            update: Duration::from_millis(4),
            render: Duration::from_millis(2),
        };

        assert!(counter.record_frame(frame).is_none());
        let metrics = counter.record_frame(frame).expect("one second elapsed");

        assert_eq!(metrics.avg_update, Duration::from_millis(4));
        assert_eq!(metrics.avg_render, Duration::from_millis(2));
    }
}
