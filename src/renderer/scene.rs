use glam::Vec3;

use crate::math::color::srgb_to_linear;
use crate::math::{PlotResult, SurfaceMesh};

pub const BACKGROUND: [u8; 3] = [0x11, 0x18, 0x27];

pub const GRID_SIZE: f32 = 10.0;
pub const GRID_DIVISIONS: u32 = 20;
pub const GRID_HEIGHT: f32 = -2.0;
pub const GRID_CENTER_COLOR: [u8; 3] = [0x44, 0x44, 0x44];
pub const GRID_LINE_COLOR: [u8; 3] = [0x22, 0x22, 0x22];
pub const AXES_LENGTH: f32 = 5.0;

pub const SURFACE_OPACITY: f32 = 0.9;
pub const SURFACE_METALNESS: f32 = 0.5;
pub const SURFACE_ROUGHNESS: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Light {
    pub color: [u8; 3],
    pub intensity: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLight {
    pub light: Light,
    pub position: Vec3,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lighting {
    pub ambient: Light,
    pub directional: Light,
    /// The directional light shines from here towards the origin.
    pub directional_position: Vec3,
    pub points: [PointLight; 2],
}

impl Default for Lighting {
    fn default() -> Self {
        Self {
            ambient: Light {
                color: [0xff; 3],
                intensity: 0.4,
            },
            directional: Light {
                color: [0xff; 3],
                intensity: 0.8,
            },
            directional_position: Vec3::new(5.0, 10.0, 5.0),
            points: [
                PointLight {
                    light: Light {
                        color: [0x42, 0x87, 0xf5],
                        intensity: 0.5,
                    },
                    position: Vec3::new(-5.0, 5.0, -5.0),
                },
                PointLight {
                    light: Light {
                        color: [0xff, 0x00, 0x00],
                        intensity: 0.5,
                    },
                    position: Vec3::new(5.0, -5.0, 5.0),
                },
            ],
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LineVertex {
    pub position: [f32; 3],
    pub color: [f32; 3],
}

fn line(out: &mut Vec<LineVertex>, from: [f32; 3], to: [f32; 3], color: [f32; 3]) {
    out.push(LineVertex {
        position: from,
        color,
    });
    out.push(LineVertex { position: to, color });
}

/// Square floor grid; the centre lines get their own colour.
pub fn grid_helper_vertices(
    size: f32,
    divisions: u32,
    height: f32,
    center_color: [u8; 3],
    line_color: [u8; 3],
) -> Vec<LineVertex> {
    let center_color = srgb_to_linear(center_color);
    let line_color = srgb_to_linear(line_color);
    let half = size / 2.0;
    let step = size / divisions as f32;
    let center = divisions / 2;

    let mut vertices = Vec::with_capacity((divisions as usize + 1) * 4);
    for i in 0..=divisions {
        let k = -half + i as f32 * step;
        let color = if i == center { center_color } else { line_color };
        line(&mut vertices, [-half, height, k], [half, height, k], color);
        line(&mut vertices, [k, height, -half], [k, height, half], color);
    }
    vertices
}

/// X, Y and Z axes from the origin, each fading slightly towards its tip.
pub fn axes_helper_vertices(length: f32) -> Vec<LineVertex> {
    let mut vertices = Vec::with_capacity(6);
    let axes = [
        ([length, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 0.6, 0.0]),
        ([0.0, length, 0.0], [0.0, 1.0, 0.0], [0.6, 1.0, 0.0]),
        ([0.0, 0.0, length], [0.0, 0.0, 1.0], [0.0, 0.6, 1.0]),
    ];
    for (tip, base_color, tip_color) in axes {
        vertices.push(LineVertex {
            position: [0.0; 3],
            color: base_color,
        });
        vertices.push(LineVertex {
            position: tip,
            color: tip_color,
        });
    }
    vertices
}

/// What the render loop draws. Holds at most one surface at a time.
pub struct Scene {
    surface: Option<SurfaceMesh>,
    generation: u64,
    error: Option<String>,
    pub lighting: Lighting,
    pub helpers: Vec<LineVertex>,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    pub fn new() -> Self {
        let mut helpers = grid_helper_vertices(
            GRID_SIZE,
            GRID_DIVISIONS,
            GRID_HEIGHT,
            GRID_CENTER_COLOR,
            GRID_LINE_COLOR,
        );
        helpers.extend(axes_helper_vertices(AXES_LENGTH));

        Self {
            surface: None,
            generation: 0,
            error: None,
            lighting: Lighting::default(),
            helpers,
        }
    }

    pub fn surface(&self) -> Option<&SurfaceMesh> {
        self.surface.as_ref()
    }

    /// Bumped every time the surface is swapped, so uploads can be skipped when unchanged.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Detaches the old surface and attaches `mesh` in one step.
    pub fn replace_surface(&mut self, mesh: SurfaceMesh) {
        self.surface = Some(mesh);
        self.generation += 1;
        self.error = None;
    }

    /// The current surface stays attached; only the message changes.
    pub fn report_error(&mut self, message: String) {
        self.error = Some(message);
    }

    /// Returns true when the surface was replaced.
    pub fn apply(&mut self, result: PlotResult) -> bool {
        match result {
            PlotResult::Surface(mesh) => {
                self.replace_surface(mesh);
                true
            }
            PlotResult::Error(message) => {
                self.report_error(message);
                false
            }
        }
    }

    pub fn clear_color(&self) -> wgpu::Color {
        let [r, g, b] = srgb_to_linear(BACKGROUND);
        wgpu::Color {
            r: r as f64,
            g: g as f64,
            b: b as f64,
            a: 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::color::{ColorParams, HuePolicy};
    use crate::math::{Appearance, build, compile};

    fn mesh(formula: &str) -> SurfaceMesh {
        let expr = compile(formula).unwrap();
        let colors = ColorParams::for_size(5.0, HuePolicy::Wrap);
        build(&expr, 4, 5.0, &colors, Appearance::default()).unwrap()
    }

    #[test]
    fn test_grid_helper_shape() {
        let vertices = grid_helper_vertices(10.0, 20, -2.0, [0x44; 3], [0x22; 3]);
        assert_eq!(vertices.len(), 21 * 4);
        assert!(vertices.iter().all(|v| v.position[1] == -2.0));
        assert!(
            vertices
                .iter()
                .all(|v| v.position[0].abs() <= 5.0 && v.position[2].abs() <= 5.0)
        );

        let center = srgb_to_linear([0x44; 3]);
        let centre_lines = vertices.iter().filter(|v| v.color == center).count();
        assert_eq!(centre_lines, 4);
    }

    #[test]
    fn test_axes_point_along_positive_axes() {
        let vertices = axes_helper_vertices(5.0);
        assert_eq!(vertices.len(), 6);
        assert_eq!(vertices[1].position, [5.0, 0.0, 0.0]);
        assert_eq!(vertices[3].position, [0.0, 5.0, 0.0]);
        assert_eq!(vertices[5].position, [0.0, 0.0, 5.0]);
    }

    #[test]
    fn test_error_keeps_previous_surface() {
        let mut scene = Scene::new();
        assert!(scene.apply(PlotResult::Surface(mesh("x"))));
        let generation = scene.generation();

        assert!(!scene.apply(PlotResult::Error("Invalid equation: boom".into())));
        assert_eq!(scene.generation(), generation);
        assert_eq!(scene.error(), Some("Invalid equation: boom"));
        assert_eq!(scene.surface().map(|m| m.y_max), Some(5.0));
    }

    #[test]
    fn test_replacement_clears_error_and_swaps_surface() {
        let mut scene = Scene::new();
        scene.apply(PlotResult::Surface(mesh("x")));
        scene.report_error("Invalid equation: oops".into());
        scene.apply(PlotResult::Surface(mesh("0")));

        assert_eq!(scene.error(), None);
        assert_eq!(scene.generation(), 2);
        assert_eq!(scene.surface().map(|m| m.y_max), Some(0.0));
    }

    #[test]
    fn test_default_lights() {
        let lighting = Lighting::default();
        assert_eq!(lighting.ambient.intensity, 0.4);
        assert_eq!(lighting.directional.intensity, 0.8);
        assert_eq!(lighting.points[0].position, Vec3::new(-5.0, 5.0, -5.0));
        assert_eq!(lighting.points[1].light.color, [0xff, 0, 0]);
    }
}
