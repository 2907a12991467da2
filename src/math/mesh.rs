use glam::Vec3;
use thiserror::Error;

use crate::math::color::ColorParams;
use crate::math::expr::{EvalError, Expression};

pub const DEFAULT_RESOLUTION: usize = 100;
pub const DEFAULT_SIZE: f64 = 5.0;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BuildError {
    #[error("grid resolution must be at least 2, got {0}")]
    Resolution(usize),
    #[error(transparent)]
    Eval(#[from] EvalError),
}

/// Material options carried with the mesh they were built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Appearance {
    pub base_color: [u8; 3],
    pub wireframe: bool,
}

impl Default for Appearance {
    fn default() -> Self {
        Self {
            base_color: [0x42, 0x87, 0xf5],
            wireframe: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceMesh {
    pub resolution: usize,
    pub positions: Vec<f32>,
    pub colors: Vec<f32>,
    pub normals: Vec<f32>,
    pub indices: Vec<u32>,
    pub wire_indices: Vec<u32>,
    pub y_min: f32,
    pub y_max: f32,
    pub appearance: Appearance,
}

impl SurfaceMesh {
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    pub fn position(&self, index: usize) -> [f32; 3] {
        let p = &self.positions[index * 3..index * 3 + 3];
        [p[0], p[1], p[2]]
    }

    pub fn normal(&self, index: usize) -> [f32; 3] {
        let n = &self.normals[index * 3..index * 3 + 3];
        [n[0], n[1], n[2]]
    }

    pub fn color(&self, index: usize) -> [f32; 3] {
        let c = &self.colors[index * 3..index * 3 + 3];
        [c[0], c[1], c[2]]
    }
}

/// Coordinate of sample `i` on an axis spanning `[-size, size]`.
#[inline]
pub fn grid_coordinate(i: usize, resolution: usize, size: f64) -> f64 {
    (i as f64 / (resolution - 1) as f64) * size * 2.0 - size
}

/// Samples `expr` on a `resolution`² lattice and builds the surface mesh.
///
/// The pass is all-or-nothing: the first point that fails to evaluate aborts
/// the build and nothing sampled so far is returned.
pub fn build(
    expr: &Expression,
    resolution: usize,
    size: f64,
    colors: &ColorParams,
    appearance: Appearance,
) -> Result<SurfaceMesh, BuildError> {
    if resolution < 2 {
        return Err(BuildError::Resolution(resolution));
    }

    let vertex_count = resolution * resolution;
    let mut positions = Vec::with_capacity(vertex_count * 3);
    let mut vertex_colors = Vec::with_capacity(vertex_count * 3);
    let mut y_min = f32::MAX;
    let mut y_max = f32::MIN;

    for i in 0..resolution {
        for j in 0..resolution {
            let x = grid_coordinate(i, resolution, size);
            let z = grid_coordinate(j, resolution, size);
            let y = expr.evaluate(x, z)?;
            // finite in f64 is not enough once the height is narrowed for the GPU
            let height = y as f32;
            if !height.is_finite() {
                return Err(EvalError::NonFinite { x, z, value: y }.into());
            }

            positions.extend_from_slice(&[x as f32, height, z as f32]);
            vertex_colors.extend_from_slice(&colors.color_for_height(y));

            y_min = y_min.min(height);
            y_max = y_max.max(height);
        }
    }

    let indices = triangle_indices(resolution);
    let normals = vertex_normals(&positions, &indices);
    let wire_indices = wire_indices(resolution);

    Ok(SurfaceMesh {
        resolution,
        positions,
        colors: vertex_colors,
        normals,
        indices,
        wire_indices,
        y_min,
        y_max,
        appearance,
    })
}

/// Two triangles per cell, `(a, b, c)` and `(b, d, c)`.
pub fn triangle_indices(resolution: usize) -> Vec<u32> {
    let cells = resolution - 1;
    let mut indices = Vec::with_capacity(cells * cells * 6);

    for i in 0..cells {
        for j in 0..cells {
            let a = (i * resolution + j) as u32;
            let b = a + 1;
            let c = ((i + 1) * resolution + j) as u32;
            let d = c + 1;

            indices.extend_from_slice(&[a, b, c]);
            indices.extend_from_slice(&[b, d, c]);
        }
    }

    indices
}

/// Line-list of every unique edge of the triangulation, each exactly once.
pub fn wire_indices(resolution: usize) -> Vec<u32> {
    let cells = resolution - 1;
    let edge_count = 2 * resolution * cells + cells * cells;
    let mut lines = Vec::with_capacity(edge_count * 2);

    for i in 0..resolution {
        for j in 0..resolution {
            let a = (i * resolution + j) as u32;
            let b = a + 1;
            let c = ((i + 1) * resolution + j) as u32;

            if j < cells {
                lines.extend_from_slice(&[a, b]);
            }
            if i < cells {
                lines.extend_from_slice(&[a, c]);
            }
            if i < cells && j < cells {
                lines.extend_from_slice(&[b, c]);
            }
        }
    }

    lines
}

/// Smooth normals: area-weighted face normals summed per vertex, then normalised.
pub fn vertex_normals(positions: &[f32], indices: &[u32]) -> Vec<f32> {
    let vertex = |i: u32| {
        let i = i as usize * 3;
        Vec3::new(positions[i], positions[i + 1], positions[i + 2])
    };

    let mut accumulated = vec![Vec3::ZERO; positions.len() / 3];
    for tri in indices.chunks_exact(3) {
        let (pa, pb, pc) = (vertex(tri[0]), vertex(tri[1]), vertex(tri[2]));
        let face = (pc - pb).cross(pa - pb);
        for &index in tri {
            accumulated[index as usize] += face;
        }
    }

    accumulated
        .into_iter()
        .flat_map(|n| n.normalize_or_zero().to_array())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::color::HuePolicy;
    use crate::math::expr::compile;
    use rstest::rstest;

    fn build_formula(formula: &str, resolution: usize) -> Result<SurfaceMesh, BuildError> {
        let expr = compile(formula).unwrap();
        let colors = ColorParams::for_size(DEFAULT_SIZE, HuePolicy::Wrap);
        build(&expr, resolution, DEFAULT_SIZE, &colors, Appearance::default())
    }

    #[rstest]
    #[case(2)]
    #[case(3)]
    #[case(17)]
    #[case(DEFAULT_RESOLUTION)]
    fn test_buffer_sizes(#[case] resolution: usize) {
        let mesh = build_formula("sin(x) * cos(z)", resolution).unwrap();
        let cells = resolution - 1;

        assert_eq!(mesh.vertex_count(), resolution * resolution);
        assert_eq!(mesh.colors.len(), mesh.positions.len());
        assert_eq!(mesh.normals.len(), mesh.positions.len());
        assert_eq!(mesh.indices.len(), 6 * cells * cells);
        assert_eq!(
            mesh.wire_indices.len(),
            2 * (2 * resolution * cells + cells * cells)
        );
    }

    #[test]
    fn test_rejects_degenerate_resolution() {
        assert_eq!(
            build_formula("x", 1).unwrap_err(),
            BuildError::Resolution(1)
        );
    }

    #[test]
    fn test_grid_spans_the_full_range() {
        let mesh = build_formula("0", 11).unwrap();
        assert_eq!(mesh.position(0), [-5.0, 0.0, -5.0]);
        assert_eq!(mesh.position(10), [-5.0, 0.0, 5.0]);
        assert_eq!(mesh.position(120), [5.0, 0.0, 5.0]);
    }

    #[test]
    fn test_index_layout_of_first_cell() {
        let indices = triangle_indices(3);
        assert_eq!(&indices[..6], &[0, 1, 3, 1, 4, 3]);
    }

    #[test]
    fn test_flat_plane_normals_are_unit_y() {
        let mesh = build_formula("1", 5).unwrap();
        for i in 0..mesh.vertex_count() {
            let [nx, ny, nz] = mesh.normal(i);
            assert!(nx.abs() < 1e-6 && nz.abs() < 1e-6);
            assert!((ny.abs() - 1.0).abs() < 1e-6);
        }
        // every vertex of the plane agrees on the side the normal points to
        let first = mesh.normal(0)[1];
        assert!((0..mesh.vertex_count()).all(|i| mesh.normal(i)[1] == first));
    }

    #[test]
    fn test_sloped_plane_normal_direction() {
        // y = x rises along +x, so a normal perpendicular to it has opposite x and y signs
        let mesh = build_formula("x", 4).unwrap();
        let [nx, ny, nz] = mesh.normal(5);
        assert!(nz.abs() < 1e-6);
        assert!((nx + ny).abs() < 1e-6);
        assert!((nx * nx + ny * ny - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_height_range_is_tracked() {
        let mesh = build_formula("x", 3).unwrap();
        assert_eq!(mesh.y_min, -5.0);
        assert_eq!(mesh.y_max, 5.0);
    }

    #[test]
    fn test_failing_point_aborts_the_pass() {
        let err = build_formula("log(x)", 10).unwrap_err();
        assert!(matches!(err, BuildError::Eval(EvalError::NonFinite { .. })));
    }

    #[rstest]
    #[case("exp(x * 100)")]
    #[case("1e300 * x")]
    fn test_height_beyond_f32_range_aborts_the_pass(#[case] formula: &str) {
        // finite as f64 but infinite once narrowed
        assert!(compile(formula).unwrap().evaluate(5.0, 0.0).is_ok());
        let err = build_formula(formula, 10).unwrap_err();
        assert!(matches!(err, BuildError::Eval(EvalError::NonFinite { .. })));
    }

    #[test]
    fn test_same_inputs_build_identical_meshes() {
        let first = build_formula("sin(x) * cos(z) + x % 2", 23).unwrap();
        let second = build_formula("sin(x) * cos(z) + x % 2", 23).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_every_height_is_the_formula_at_its_lattice_point() {
        let resolution = 19;
        let expr = compile("x * x - z * sin(x)").unwrap();
        let mesh = build_formula("x * x - z * sin(x)", resolution).unwrap();

        for i in 0..resolution {
            for j in 0..resolution {
                let x = grid_coordinate(i, resolution, DEFAULT_SIZE);
                let z = grid_coordinate(j, resolution, DEFAULT_SIZE);
                let expected = expr.evaluate(x, z).unwrap() as f32;
                let [px, py, pz] = mesh.position(i * resolution + j);
                assert_eq!((px, pz), (x as f32, z as f32));
                assert_eq!(py.to_bits(), expected.to_bits(), "height at ({i}, {j})");
            }
        }
    }

    #[test]
    fn test_wire_edges_are_unique() {
        let lines = wire_indices(6);
        let mut edges: Vec<(u32, u32)> = lines
            .chunks_exact(2)
            .map(|e| (e[0].min(e[1]), e[0].max(e[1])))
            .collect();
        let total = edges.len();
        edges.sort_unstable();
        edges.dedup();
        assert_eq!(edges.len(), total);
    }
}
