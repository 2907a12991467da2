use egui::{Color32, Context, RichText, ScrollArea, TextEdit, Ui};

use crate::gesture::{ModelState, TrackerStatus};
use crate::math::FORMULA_EXAMPLES;
use crate::ui::state::UiState;
use crate::ui::theme::*;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct UiActions {
    pub rebuild: bool,
    pub set_hand_control: Option<bool>,
    pub reset_view: bool,
    pub set_vsync: Option<bool>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct FrameStats {
    pub fps: f32,
    pub vertices: usize,
    pub generation: u64,
    pub camera_distance: f32,
}

pub fn draw_side_panel(
    ctx: &Context,
    state: &mut UiState,
    status: &TrackerStatus,
    last_error: Option<&str>,
    stats: &FrameStats,
) -> UiActions {
    let mut actions = UiActions::default();

    egui::SidePanel::left("control_panel")
        .min_width(300.0)
        .max_width(420.0)
        .default_width(340.0)
        .frame(egui::Frame::default().fill(BG_PANEL).inner_margin(16.0))
        .show(ctx, |ui| {
            ScrollArea::vertical().show(ui, |ui| {
                ui.heading(RichText::new("Hand Plot").strong());
                ui.add_space(4.0);
                ui.label(RichText::new("y = f(x, z)").color(TEXT_MUTED).size(11.0));
                ui.add_space(16.0);

                section_header(ui, "PRESET");
                let selected_name = state
                    .selected_example
                    .and_then(|i| FORMULA_EXAMPLES.get(i))
                    .map_or("Custom", |ex| ex.name);
                egui::ComboBox::from_id_salt("formula_examples")
                    .selected_text(selected_name)
                    .width(ui.available_width())
                    .show_ui(ui, |ui| {
                        for (i, ex) in FORMULA_EXAMPLES.iter().enumerate() {
                            let selected = state.selected_example == Some(i);
                            if ui.selectable_label(selected, ex.name).clicked() && !selected {
                                state.select_example(i);
                                actions.rebuild = true;
                            }
                        }
                    });
                if let Some(ex) = state.selected_example.and_then(|i| FORMULA_EXAMPLES.get(i)) {
                    ui.add_space(4.0);
                    ui.label(RichText::new(ex.description).color(TEXT_MUTED).size(11.0).italics());
                }
                ui.add_space(16.0);

                section_header(ui, "EQUATION");
                if formula_editor(ui, &mut state.formula, last_error) {
                    state.formula_edited();
                    actions.rebuild = true;
                }
                ui.add_space(16.0);

                section_header(ui, "APPEARANCE");
                ui.horizontal(|ui| {
                    ui.label("Graph Color:");
                    if ui.color_edit_button_srgb(&mut state.base_color).changed() {
                        actions.rebuild = true;
                    }
                    ui.label(RichText::new(state.color_hex()).color(TEXT_MUTED).monospace());
                });
                if ui.checkbox(&mut state.wireframe, "Wireframe Mode").changed() {
                    actions.rebuild = true;
                }
                ui.add_space(16.0);

                ui.separator();
                ui.add_space(12.0);

                section_header(ui, "CONTROLS");
                let hand_text = if state.hand_control {
                    "Disable Hand Controls"
                } else {
                    "Enable Hand Controls"
                };
                if ui
                    .add(
                        egui::Button::new(RichText::new(hand_text).color(TEXT_PRIMARY))
                            .fill(ACCENT_BLUE)
                            .min_size(egui::vec2(ui.available_width(), 32.0)),
                    )
                    .clicked()
                {
                    actions.set_hand_control = Some(!state.hand_control);
                }
                let full_width = egui::vec2(ui.available_width(), 32.0);
                if ui
                    .add(egui::Button::new("Reset View").min_size(full_width))
                    .clicked()
                {
                    actions.reset_view = true;
                }
                ui.add_space(8.0);
                hand_status(ui, status);
                ui.add_space(16.0);

                section_header(ui, "PERFORMANCE");
                ui.horizontal(|ui| {
                    if ui.checkbox(&mut state.vsync, "VSync").changed() {
                        actions.set_vsync = Some(state.vsync);
                    }
                    ui.checkbox(&mut state.show_stats, "Stats");
                });

                if state.show_stats {
                    ui.add_space(12.0);
                    stats_panel(ui, stats);
                }
            });
        });

    actions
}

fn section_header(ui: &mut Ui, text: &str) {
    ui.label(RichText::new(text).color(TEXT_MUTED).size(11.0).strong());
    ui.add_space(4.0);
}

/// Returns true when the text changed this frame.
fn formula_editor(ui: &mut Ui, formula: &mut String, error: Option<&str>) -> bool {
    let stroke_color = if error.is_some() { STATUS_ERROR } else { BORDER };
    let frame = egui::Frame::default()
        .fill(BG_FIELD)
        .stroke(egui::Stroke::new(1.0, stroke_color))
        .rounding(4.0)
        .inner_margin(8.0);

    let changed = frame
        .show(ui, |ui| {
            ui.add(
                TextEdit::singleline(formula)
                    .font(egui::FontId::new(14.0, egui::FontFamily::Monospace))
                    .desired_width(f32::INFINITY)
                    .frame(false)
                    .hint_text("sin(x) * cos(z)")
                    .text_color(TEXT_PRIMARY),
            )
            .changed()
        })
        .inner;

    if let Some(err) = error {
        ui.add_space(6.0);
        egui::Frame::default()
            .fill(Color32::from_rgb(50, 18, 22))
            .stroke(egui::Stroke::new(1.0, STATUS_ERROR))
            .rounding(4.0)
            .inner_margin(8.0)
            .show(ui, |ui| {
                ui.label(RichText::new(err).color(STATUS_ERROR).size(11.0));
            });
    }

    changed
}

fn status_color(status: &TrackerStatus) -> Color32 {
    match (&status.model, status.camera_enabled, status.hand_detected) {
        (ModelState::Idle | ModelState::Loading, _, _) => STATUS_LOADING,
        (ModelState::Unavailable(_), _, _) => STATUS_ERROR,
        (ModelState::Ready, false, _) => TEXT_MUTED,
        (ModelState::Ready, true, true) => STATUS_OK,
        (ModelState::Ready, true, false) => STATUS_WARN,
    }
}

fn hand_status(ui: &mut Ui, status: &TrackerStatus) {
    ui.label(RichText::new(status.label()).color(status_color(status)));

    if let ModelState::Unavailable(reason) = &status.model {
        ui.label(RichText::new(reason).color(TEXT_MUTED).size(11.0));
    }
    if let Some(err) = &status.last_error {
        ui.label(RichText::new(err).color(STATUS_ERROR).size(11.0));
    }
}

fn stats_panel(ui: &mut Ui, stats: &FrameStats) {
    egui::Frame::default()
        .fill(BG_CANVAS)
        .stroke(egui::Stroke::new(1.0, BORDER))
        .rounding(6.0)
        .inner_margin(12.0)
        .show(ui, |ui| {
            ui.style_mut().override_font_id = Some(mono_font());

            let fps_color = if stats.fps >= 55.0 {
                STATUS_OK
            } else if stats.fps >= 30.0 {
                STATUS_WARN
            } else {
                STATUS_ERROR
            };

            egui::Grid::new("stats").num_columns(2).spacing([20.0, 4.0]).show(ui, |ui| {
                ui.label(RichText::new("FPS").color(TEXT_MUTED));
                ui.label(RichText::new(format!("{:.0}", stats.fps)).color(fps_color));
                ui.end_row();

                ui.label(RichText::new("Vertices").color(TEXT_MUTED));
                ui.label(RichText::new(fmt_num(stats.vertices)).color(TEXT_PRIMARY));
                ui.end_row();

                ui.label(RichText::new("Mesh").color(TEXT_MUTED));
                ui.label(RichText::new(format!("#{}", stats.generation)).color(TEXT_PRIMARY));
                ui.end_row();

                ui.label(RichText::new("Distance").color(TEXT_MUTED));
                let distance = format!("{:.2}", stats.camera_distance);
                ui.label(RichText::new(distance).color(TEXT_PRIMARY));
                ui.end_row();
            });
        });
}

const MOUSE_HELP: &str = "LMB+Drag - Rotate | RMB+Drag - Pan | Scroll - Zoom";
const HAND_HELP: &str = "Move palm - Rotate | Pinch - Zoom in | Spread - Zoom out";

fn mono_font() -> egui::FontId {
    egui::FontId::new(11.0, egui::FontFamily::Monospace)
}

pub fn draw_help_overlay(ctx: &Context, hand_control: bool) {
    egui::Area::new(egui::Id::new("help_overlay"))
        .anchor(egui::Align2::RIGHT_BOTTOM, egui::vec2(-12.0, -12.0))
        .show(ctx, |ui| {
            egui::Frame::default()
                .fill(Color32::from_black_alpha(180))
                .rounding(6.0)
                .inner_margin(10.0)
                .show(ui, |ui| {
                    ui.style_mut().override_font_id = Some(mono_font());
                    ui.label(RichText::new(MOUSE_HELP).color(TEXT_MUTED));
                    if hand_control {
                        ui.label(RichText::new(HAND_HELP).color(TEXT_MUTED));
                    }
                });
        });
}

fn fmt_num(n: usize) -> String {
    if n >= 1_000_000 {
        format!("{:.2}M", n as f64 / 1_000_000.0)
    } else if n >= 1_000 {
        format!("{:.1}K", n as f64 / 1_000.0)
    } else {
        format!("{}", n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(999, "999")]
    #[case(10_201, "10.2K")]
    #[case(2_500_000, "2.50M")]
    fn test_fmt_num(#[case] n: usize, #[case] expected: &str) {
        assert_eq!(fmt_num(n), expected);
    }

    #[test]
    fn test_status_colours() {
        let mut status = TrackerStatus::default();
        assert_eq!(status_color(&status), STATUS_LOADING);

        status.model = ModelState::Ready;
        assert_eq!(status_color(&status), TEXT_MUTED);

        status.camera_enabled = true;
        assert_eq!(status_color(&status), STATUS_WARN);

        status.hand_detected = true;
        assert_eq!(status_color(&status), STATUS_OK);

        status.model = ModelState::Unavailable("no model".into());
        assert_eq!(status_color(&status), STATUS_ERROR);
    }
}
