//! Picks the camera and landmark model the tracker runs against.
//!
//! A configured recording replaces both. Otherwise the live camera and the
//! ONNX model are used when the crate was built with `webcam` and `onnx`.

use std::sync::Arc;

use crate::config::GestureConfig;
use crate::gesture::landmarks::{LandmarkModel, ModelLoadError};
use crate::gesture::media::{MediaDevices, NoCameraDevices};
use crate::gesture::model::HandModelSettings;
use crate::gesture::replay::{Recording, ReplayDevices};
use crate::gesture::tracker::ModelLoader;

pub fn gesture_backend(config: &GestureConfig) -> (Box<dyn MediaDevices>, ModelLoader) {
    let Some(path) = &config.replay_path else {
        return (live_devices(), model_loader(config.model.clone()));
    };

    match Recording::load(path) {
        Ok(recording) => {
            let devices = ReplayDevices::new(Arc::new(recording), config.replay_loop);
            let model = devices.landmarker();
            let loader: ModelLoader =
                Box::new(move || Ok(Box::new(model) as Box<dyn LandmarkModel>));
            (Box::new(devices), loader)
        }
        Err(e) => {
            tracing::warn!(error = %e, "hand recording could not be loaded");
            let reason = e.to_string();
            let loader: ModelLoader = Box::new(move || Err(ModelLoadError::Unavailable(reason)));
            (Box::new(NoCameraDevices), loader)
        }
    }
}

#[cfg(feature = "webcam")]
fn live_devices() -> Box<dyn MediaDevices> {
    Box::new(crate::gesture::webcam::WebcamDevices)
}

#[cfg(not(feature = "webcam"))]
fn live_devices() -> Box<dyn MediaDevices> {
    Box::new(NoCameraDevices)
}

fn model_loader(settings: HandModelSettings) -> ModelLoader {
    let Some(path) = settings.path.clone() else {
        return Box::new(|| {
            Err(ModelLoadError::Unavailable(
                "no landmark model configured".into(),
            ))
        });
    };
    onnx_loader(path, settings)
}

#[cfg(feature = "onnx")]
fn onnx_loader(path: std::path::PathBuf, settings: HandModelSettings) -> ModelLoader {
    use crate::gesture::model::OnnxHandModel;

    Box::new(move || {
        let model = OnnxHandModel::load(&path, settings)?;
        Ok(Box::new(model) as Box<dyn LandmarkModel>)
    })
}

#[cfg(not(feature = "onnx"))]
fn onnx_loader(path: std::path::PathBuf, _: HandModelSettings) -> ModelLoader {
    Box::new(move || {
        Err(ModelLoadError::Unavailable(format!(
            "{} needs a build with the `onnx` feature",
            path.display()
        )))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gesture::media::{MediaAccessError, VideoConstraints};

    fn unavailable_reason(loader: ModelLoader) -> String {
        match loader() {
            Err(ModelLoadError::Unavailable(reason)) => reason,
            Err(e) => panic!("unexpected load error {e}"),
            Ok(_) => panic!("model loaded"),
        }
    }

    #[test]
    fn test_no_model_configured() {
        let (_, loader) = gesture_backend(&GestureConfig::default());
        assert_eq!(unavailable_reason(loader), "no landmark model configured");
    }

    #[cfg(not(feature = "webcam"))]
    #[test]
    fn test_without_webcam_support_there_is_no_camera() {
        let (devices, _) = gesture_backend(&GestureConfig::default());
        let result = devices.open(&VideoConstraints::default());
        assert!(matches!(result, Err(MediaAccessError::NotFound)));
    }

    #[cfg(not(feature = "onnx"))]
    #[test]
    fn test_model_path_without_onnx_support_names_the_feature() {
        let mut config = GestureConfig::default();
        config.model.path = Some("hand_landmark.onnx".into());
        let (_, loader) = gesture_backend(&config);
        assert!(unavailable_reason(loader).contains("`onnx` feature"));
    }

    #[test]
    fn test_missing_recording_leaves_gestures_unavailable() {
        let config = GestureConfig {
            replay_path: Some("/nonexistent/handplot/session.jsonl".into()),
            ..GestureConfig::default()
        };
        let (devices, loader) = gesture_backend(&config);
        assert!(unavailable_reason(loader).contains("session.jsonl"));
        assert!(devices.open(&VideoConstraints::default()).is_err());
    }

    #[test]
    fn test_recording_replaces_camera_and_model() {
        let path = std::env::temp_dir().join(format!("handplot-{}.jsonl", std::process::id()));
        std::fs::write(&path, "[]\n[]\n").unwrap();
        let config = GestureConfig {
            replay_path: Some(path.clone()),
            ..GestureConfig::default()
        };

        let (devices, loader) = gesture_backend(&config);
        let mut stream = devices.open(&VideoConstraints::default()).unwrap();
        let frame = stream.capture_frame().unwrap();
        let hands = loader().unwrap().estimate_hands(&frame).unwrap();
        assert!(hands.is_empty());

        std::fs::remove_file(path).unwrap();
    }
}
