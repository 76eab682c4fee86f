//! Immediate-mode UI helpers for the Macroquad rendering backend.
//!
//! This module hosts all uses of `macroquad::ui` so the rest of the adapter can
//! remain agnostic of Macroquad's UI types.

use courier_core::Speed;
use macroquad::{
    color::{Color, WHITE},
    math::{RectOffset, Vec2},
    ui::{hash, Ui},
};

/// Outcome of rendering the control panel UI during the current frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct ControlPanelUiResult {
    /// Whether the randomize button was pressed.
    pub(crate) randomize: bool,
    /// Whether the start button was pressed.
    pub(crate) start: bool,
    /// Whether the stop button was pressed.
    pub(crate) stop: bool,
    /// Whether the load button was pressed.
    pub(crate) load_map: bool,
    /// Speed selected with the slider when it differs from the applied setting.
    pub(crate) speed: Option<Speed>,
}

/// Snapshot of the control panel's layout and data for the current frame.
#[derive(Clone, Debug)]
pub(crate) struct ControlPanelUiContext {
    /// Top-left corner of the panel in screen coordinates.
    pub(crate) origin: Vec2,
    /// Panel dimensions in screen space.
    pub(crate) size: Vec2,
    /// Background colour applied to the window skin so the UI matches the
    /// adapter's solid rectangle.
    pub(crate) background: Color,
    /// Status read-out rendered below the buttons.
    pub(crate) status: String,
}

/// Converts the slider position into a speed setting.
pub(crate) fn slider_speed(value: f32) -> Speed {
    Speed::new(value.round().max(0.0) as u32)
}

/// Renders the control panel's interactive elements for the current frame.
pub(crate) fn draw_control_panel_ui(
    ui: &mut Ui,
    context: ControlPanelUiContext,
    map_path: &mut String,
    speed_slider: &mut f32,
) -> ControlPanelUiResult {
    let mut skin = ui.default_skin();
    skin.margin = 0.0;

    let window_style = ui
        .style_builder()
        .color(context.background)
        .color_hovered(context.background)
        .color_clicked(context.background)
        .color_selected(context.background)
        .color_selected_hovered(context.background)
        .color_inactive(context.background)
        .text_color(WHITE)
        .text_color_hovered(WHITE)
        .text_color_clicked(WHITE)
        .margin(RectOffset::new(16.0, 16.0, 16.0, 16.0))
        .build();
    skin.window_style = window_style;

    let label_style = ui
        .style_builder()
        .text_color(WHITE)
        .text_color_hovered(WHITE)
        .text_color_clicked(WHITE)
        .margin(RectOffset::new(0.0, 0.0, 4.0, 4.0))
        .build();
    skin.label_style = label_style;

    let button_style = ui
        .style_builder()
        .text_color(WHITE)
        .text_color_hovered(WHITE)
        .text_color_clicked(WHITE)
        .color(Color::from_rgba(70, 70, 70, 255))
        .color_hovered(Color::from_rgba(96, 96, 96, 255))
        .color_clicked(Color::from_rgba(56, 56, 56, 255))
        .color_selected(Color::from_rgba(70, 70, 70, 255))
        .color_selected_hovered(Color::from_rgba(96, 96, 96, 255))
        .color_inactive(Color::from_rgba(56, 56, 56, 200))
        .margin(RectOffset::new(0.0, 0.0, 8.0, 8.0))
        .build();
    skin.button_style = button_style;

    ui.push_skin(&skin);

    let applied_speed = slider_speed(*speed_slider);
    let mut result = ControlPanelUiResult::default();
    let _ = ui.window(hash!("control_panel"), context.origin, context.size, |ui| {
        ui.label(None, "Map image");
        ui.input_text(hash!("map_path"), "", map_path);
        result.load_map = ui.button(None, "Load Map");
        ui.separator();

        result.randomize = ui.button(None, "Randomize");
        result.start = ui.button(None, "Start");
        result.stop = ui.button(None, "Stop");
        ui.separator();

        ui.slider(
            hash!("speed"),
            "Speed",
            Speed::MIN.get() as f32..Speed::MAX.get() as f32,
            speed_slider,
        );
        ui.separator();

        ui.label(None, context.status.as_str());
        ui.label(None, "R randomize, Space start, X stop, Q quit");
    });

    ui.pop_skin();

    let selected_speed = slider_speed(*speed_slider);
    if selected_speed != applied_speed {
        result.speed = Some(selected_speed);
    }
    result
}
