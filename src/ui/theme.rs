use egui::{Color32, FontFamily, FontId, Rounding, Stroke, Style, TextStyle, Visuals};

pub const BG_CANVAS: Color32 = Color32::from_rgb(0x11, 0x18, 0x27);
pub const BG_PANEL: Color32 = Color32::from_rgba_premultiplied(28, 37, 50, 230);
pub const BG_FIELD: Color32 = Color32::from_rgb(0x37, 0x41, 0x51);
pub const BG_BUTTON: Color32 = Color32::from_rgb(0x4b, 0x55, 0x63);
pub const BG_BUTTON_HOVER: Color32 = Color32::from_rgb(0x37, 0x41, 0x51);

pub const TEXT_PRIMARY: Color32 = Color32::WHITE;
pub const TEXT_MUTED: Color32 = Color32::from_rgb(0x9c, 0xa3, 0xaf);

pub const ACCENT_BLUE: Color32 = Color32::from_rgb(0x25, 0x63, 0xeb);
pub const ACCENT_FOCUS: Color32 = Color32::from_rgb(0x3b, 0x82, 0xf6);
pub const STATUS_LOADING: Color32 = Color32::from_rgb(0x60, 0xa5, 0xfa);
pub const STATUS_OK: Color32 = Color32::from_rgb(0x4a, 0xde, 0x80);
pub const STATUS_WARN: Color32 = Color32::from_rgb(0xfa, 0xcc, 0x15);
pub const STATUS_ERROR: Color32 = Color32::from_rgb(0xef, 0x44, 0x44);

pub const BORDER: Color32 = Color32::from_rgb(0x4b, 0x55, 0x63);

fn widget(bg: Color32, border: Color32, fg: Color32, expansion: f32) -> egui::style::WidgetVisuals {
    egui::style::WidgetVisuals {
        bg_fill: bg,
        weak_bg_fill: bg,
        bg_stroke: Stroke::new(1.0, border),
        rounding: Rounding::same(4.0),
        fg_stroke: Stroke::new(1.0, fg),
        expansion,
    }
}

pub fn apply_theme(ctx: &egui::Context) {
    let mut style = Style::default();

    let mut visuals = Visuals::dark();
    visuals.override_text_color = Some(TEXT_PRIMARY);
    visuals.widgets = egui::style::Widgets {
        noninteractive: widget(BG_PANEL, BORDER, TEXT_MUTED, 0.0),
        inactive: widget(BG_FIELD, BORDER, TEXT_PRIMARY, 0.0),
        hovered: widget(BG_BUTTON_HOVER, ACCENT_FOCUS, TEXT_PRIMARY, 1.0),
        active: widget(BG_BUTTON, ACCENT_FOCUS, TEXT_PRIMARY, 1.0),
        open: widget(BG_FIELD, ACCENT_FOCUS, TEXT_PRIMARY, 0.0),
    };
    visuals.selection = egui::style::Selection {
        bg_fill: ACCENT_FOCUS.gamma_multiply(0.4),
        stroke: Stroke::new(1.0, ACCENT_FOCUS),
    };
    visuals.extreme_bg_color = BG_FIELD;
    visuals.faint_bg_color = BG_PANEL;
    visuals.panel_fill = BG_PANEL;
    visuals.window_fill = BG_PANEL;
    visuals.window_rounding = Rounding::same(8.0);
    visuals.window_stroke = Stroke::NONE;
    visuals.window_shadow = egui::epaint::Shadow {
        offset: egui::vec2(0.0, 8.0),
        blur: 24.0,
        spread: 0.0,
        color: Color32::from_black_alpha(140),
    };
    visuals.warn_fg_color = STATUS_WARN;
    visuals.error_fg_color = STATUS_ERROR;
    visuals.text_cursor = egui::style::TextCursorStyle {
        stroke: Stroke::new(2.0, ACCENT_FOCUS),
        ..Default::default()
    };
    style.visuals = visuals;

    style.spacing.item_spacing = egui::vec2(8.0, 8.0);
    style.spacing.window_margin = egui::Margin::same(24.0);
    style.spacing.button_padding = egui::vec2(16.0, 8.0);
    style.spacing.interact_size.y = 28.0;

    style.text_styles = [
        (TextStyle::Small, FontId::new(12.0, FontFamily::Proportional)),
        (TextStyle::Body, FontId::new(14.0, FontFamily::Proportional)),
        (TextStyle::Button, FontId::new(14.0, FontFamily::Proportional)),
        (TextStyle::Heading, FontId::new(18.0, FontFamily::Proportional)),
        (TextStyle::Monospace, FontId::new(14.0, FontFamily::Monospace)),
    ]
    .into();

    ctx.set_style(style);
}
