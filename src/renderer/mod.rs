pub mod camera;
pub mod controls;
pub mod gpu;
pub mod scene;

pub use camera::PerspectiveCamera;
pub use controls::{CameraControl, OrbitControls, SharedControls};
pub use gpu::{GpuError, GpuState};
pub use scene::Scene;
