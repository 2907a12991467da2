use std::f32::consts::{PI, TAU};
use std::sync::Arc;

use glam::{Vec2, Vec3};
use parking_lot::Mutex;

use crate::renderer::camera::PerspectiveCamera;

pub const DEFAULT_DAMPING: f32 = 0.05;
pub const DEFAULT_ROTATE_SPEED: f32 = 0.5;
pub const DEFAULT_ZOOM_SPEED: f32 = 0.5;
pub const DEFAULT_MIN_DISTANCE: f32 = 0.5;
pub const DEFAULT_MAX_DISTANCE: f32 = 200.0;

const POLAR_EPSILON: f32 = 1e-6;

/// The camera operations shared by mouse input and the gesture policy.
pub trait CameraControl {
    fn rotate_left(&mut self, angle: f32);
    fn rotate_up(&mut self, angle: f32);
    fn dolly_in(&mut self, factor: f32);
    fn dolly_out(&mut self, factor: f32);
    fn update(&mut self);
    fn reset(&mut self);
}

/// Controls are read by the render loop and written by the gesture consumer.
pub type SharedControls = Arc<Mutex<OrbitControls>>;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Spherical {
    radius: f32,
    phi: f32,
    theta: f32,
}

impl Spherical {
    fn from_offset(offset: Vec3) -> Self {
        let radius = offset.length();
        if radius == 0.0 {
            return Self {
                radius,
                phi: 0.0,
                theta: 0.0,
            };
        }
        Self {
            radius,
            theta: offset.x.atan2(offset.z),
            phi: (offset.y / radius).clamp(-1.0, 1.0).acos(),
        }
    }

    fn to_offset(self) -> Vec3 {
        let ring = self.phi.sin() * self.radius;
        Vec3::new(
            ring * self.theta.sin(),
            self.phi.cos() * self.radius,
            ring * self.theta.cos(),
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct SphericalDelta {
    phi: f32,
    theta: f32,
}

/// Orbit camera around a target with exponentially damped rotation.
#[derive(Debug, Clone)]
pub struct OrbitControls {
    camera: PerspectiveCamera,

    pub damping_factor: f32,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub min_distance: f32,
    pub max_distance: f32,

    delta: SphericalDelta,
    scale: f32,
    pan_offset: Vec3,

    saved_position: Vec3,
    saved_target: Vec3,
}

impl Default for OrbitControls {
    fn default() -> Self {
        Self::new(PerspectiveCamera::default())
    }
}

impl OrbitControls {
    pub fn new(camera: PerspectiveCamera) -> Self {
        Self {
            saved_position: camera.position,
            saved_target: camera.target,
            camera,

            damping_factor: DEFAULT_DAMPING,
            rotate_speed: DEFAULT_ROTATE_SPEED,
            zoom_speed: DEFAULT_ZOOM_SPEED,
            min_distance: DEFAULT_MIN_DISTANCE,
            max_distance: DEFAULT_MAX_DISTANCE,

            delta: SphericalDelta::default(),
            scale: 1.0,
            pan_offset: Vec3::ZERO,
        }
    }

    pub fn into_shared(self) -> SharedControls {
        Arc::new(Mutex::new(self))
    }

    pub fn camera(&self) -> &PerspectiveCamera {
        &self.camera
    }

    pub fn position(&self) -> Vec3 {
        self.camera.position
    }

    pub fn target(&self) -> Vec3 {
        self.camera.target
    }

    pub fn distance(&self) -> f32 {
        self.camera.position.distance(self.camera.target)
    }

    pub fn set_aspect(&mut self, width: f32, height: f32) {
        self.camera.set_aspect(width, height);
    }

    /// Left-drag: a full viewport height of travel is one turn at speed 1.
    pub fn rotate_by_pixels(&mut self, delta: Vec2, viewport_height: f32) {
        if viewport_height <= 0.0 {
            return;
        }
        self.rotate_left(TAU * delta.x / viewport_height * self.rotate_speed);
        self.rotate_up(TAU * delta.y / viewport_height * self.rotate_speed);
    }

    /// Right-drag: moves the target so the surface follows the cursor.
    pub fn pan_by_pixels(&mut self, delta: Vec2, viewport_height: f32) {
        if viewport_height <= 0.0 {
            return;
        }
        let visible = self.distance() * (self.camera.fov / 2.0).tan();
        let forward = (self.camera.target - self.camera.position).normalize_or_zero();
        let right = forward.cross(self.camera.up).normalize_or_zero();
        let up = right.cross(forward);

        self.pan_offset -= right * (2.0 * delta.x * visible / viewport_height);
        self.pan_offset += up * (2.0 * delta.y * visible / viewport_height);
    }

    /// Positive notches zoom towards the target.
    pub fn scroll(&mut self, notches: f32) {
        if notches == 0.0 {
            return;
        }
        let factor = self.zoom_scale().powf(notches.abs());
        if notches > 0.0 {
            self.dolly_in(factor);
        } else {
            self.dolly_out(factor);
        }
    }

    fn zoom_scale(&self) -> f32 {
        1.0 / 0.95_f32.powf(self.zoom_speed)
    }
}

impl CameraControl for OrbitControls {
    fn rotate_left(&mut self, angle: f32) {
        self.delta.theta -= angle;
    }

    fn rotate_up(&mut self, angle: f32) {
        self.delta.phi -= angle;
    }

    fn dolly_in(&mut self, factor: f32) {
        if factor > 0.0 {
            self.scale /= factor;
        }
    }

    fn dolly_out(&mut self, factor: f32) {
        if factor > 0.0 {
            self.scale *= factor;
        }
    }

    fn update(&mut self) {
        let offset = self.camera.position - self.camera.target;
        let mut spherical = Spherical::from_offset(offset);

        spherical.theta += self.delta.theta * self.damping_factor;
        spherical.phi += self.delta.phi * self.damping_factor;
        spherical.phi = spherical.phi.clamp(POLAR_EPSILON, PI - POLAR_EPSILON);

        spherical.radius =
            (spherical.radius * self.scale).clamp(self.min_distance, self.max_distance);

        self.camera.target += self.pan_offset;
        self.camera.position = self.camera.target + spherical.to_offset();

        self.delta.theta *= 1.0 - self.damping_factor;
        self.delta.phi *= 1.0 - self.damping_factor;
        self.scale = 1.0;
        self.pan_offset = Vec3::ZERO;
    }

    fn reset(&mut self) {
        self.camera.position = self.saved_position;
        self.camera.target = self.saved_target;
        self.delta = SphericalDelta::default();
        self.scale = 1.0;
        self.pan_offset = Vec3::ZERO;
    }
}
