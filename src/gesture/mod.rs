pub mod backend;
pub mod landmarks;
pub mod media;
pub mod model;
pub mod policy;
pub mod replay;
pub mod tracker;
#[cfg(feature = "webcam")]
pub mod webcam;

pub use landmarks::{GestureSignal, HandPose, HandPrediction, Landmark, LandmarkModel};
pub use backend::gesture_backend;
pub use media::{MediaAccessError, MediaDevices, MediaStream, NoCameraDevices, VideoConstraints};
pub use model::HandModelSettings;
pub use policy::{ControlsSink, GesturePolicy};
pub use replay::{Recording, ReplayDevices, ReplayLandmarker};
pub use tracker::{GestureSink, GestureTracker, ModelLoader, ModelState, TrackerStatus};
