use crate::config::AppConfig;
use crate::math::color::{format_hex_color, parse_hex_color};
use crate::math::examples::{FORMULA_EXAMPLES, find_example};
use crate::math::mesh::Appearance;

pub struct UiState {
    pub formula: String,
    pub selected_example: Option<usize>,
    pub base_color: [u8; 3],
    pub wireframe: bool,

    /// Mirrors the tracker; flipped back when enabling fails.
    pub hand_control: bool,

    pub show_stats: bool,
    pub vsync: bool,
}

impl Default for UiState {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

impl UiState {
    pub fn from_config(config: &AppConfig) -> Self {
        let plot = &config.plot;
        let base_color = parse_hex_color(&plot.color).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "falling back to the default surface colour");
            Appearance::default().base_color
        });

        Self {
            formula: plot.formula.clone(),
            selected_example: find_example(&plot.formula),
            base_color,
            wireframe: plot.wireframe,
            hand_control: false,
            show_stats: true,
            vsync: config.window.vsync,
        }
    }

    pub fn appearance(&self) -> Appearance {
        Appearance {
            base_color: self.base_color,
            wireframe: self.wireframe,
        }
    }

    pub fn color_hex(&self) -> String {
        format_hex_color(self.base_color)
    }

    pub fn select_example(&mut self, index: usize) {
        if let Some(example) = FORMULA_EXAMPLES.get(index) {
            self.selected_example = Some(index);
            self.formula = example.formula.to_string();
        }
    }

    /// Hand edits drop the preset selection unless the text still matches one.
    pub fn formula_edited(&mut self) {
        self.selected_example = find_example(&self.formula);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlotConfig;

    #[test]
    fn test_defaults_follow_config() {
        let state = UiState::default();
        assert_eq!(state.formula, "sin(x) * cos(z)");
        assert_eq!(state.selected_example, Some(0));
        assert_eq!(state.color_hex(), "#4287f5");
        assert!(!state.hand_control);
    }

    #[test]
    fn test_bad_colour_falls_back() {
        let mut config = AppConfig::default();
        config.plot = PlotConfig {
            color: "blue".into(),
            ..PlotConfig::default()
        };
        assert_eq!(UiState::from_config(&config).base_color, [0x42, 0x87, 0xf5]);
    }

    #[test]
    fn test_example_selection_and_edit() {
        let mut state = UiState::default();
        state.select_example(3);
        assert_eq!(state.formula, FORMULA_EXAMPLES[3].formula);

        state.formula.push_str(" + 1");
        state.formula_edited();
        assert_eq!(state.selected_example, None);
    }

    #[test]
    fn test_appearance_reflects_toggles() {
        let mut state = UiState::default();
        state.wireframe = true;
        state.base_color = [1, 2, 3];
        assert_eq!(
            state.appearance(),
            Appearance {
                base_color: [1, 2, 3],
                wireframe: true
            }
        );
    }
}
