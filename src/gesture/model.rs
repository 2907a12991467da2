//! Single-hand landmark regression over a whole camera frame.
//!
//! The frame is squashed to a square `input_size` RGB tensor in `[0, 1]`
//! (NHWC). The first model output holds 21 `(x, y, z)` triples in input pixel
//! space, the optional second a hand presence score.

use std::path::PathBuf;

use image::imageops::{self, FilterType};
use image::{ImageBuffer, Rgb};
use serde::{Deserialize, Serialize};

use crate::gesture::landmarks::{DetectionError, HandPrediction, LANDMARK_COUNT, Landmark};
use crate::gesture::media::VideoFrame;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandModelSettings {
    /// ONNX hand landmark model; hand control is unavailable when unset.
    pub path: Option<PathBuf>,
    pub input_size: u32,
    pub presence_threshold: f32,
}

impl Default for HandModelSettings {
    fn default() -> Self {
        Self {
            path: None,
            input_size: 224,
            presence_threshold: 0.5,
        }
    }
}

/// Resizes `frame` to the model input and scales channels to `[0, 1]`.
pub fn frame_tensor(frame: &VideoFrame, input_size: u32) -> Result<Vec<f32>, DetectionError> {
    let image = ImageBuffer::<Rgb<u8>, &[u8]>::from_raw(
        frame.width,
        frame.height,
        frame.pixels.as_slice(),
    )
    .ok_or_else(|| {
        DetectionError::Failed(format!(
            "frame {} holds {} bytes, not {}x{} RGB",
            frame.index,
            frame.pixels.len(),
            frame.width,
            frame.height
        ))
    })?;

    let resized = imageops::resize(&image, input_size, input_size, FilterType::Triangle);
    Ok(resized
        .into_raw()
        .into_iter()
        .map(|v| f32::from(v) / 255.0)
        .collect())
}

/// Maps raw model output back to frame pixels. A presence score below the
/// threshold means no hand.
pub fn decode_hand(
    raw: &[f32],
    presence: Option<f32>,
    settings: &HandModelSettings,
    frame: &VideoFrame,
) -> Result<Vec<HandPrediction>, DetectionError> {
    if raw.len() < LANDMARK_COUNT * 3 {
        return Err(DetectionError::Failed(format!(
            "model returned {} landmark values, expected {}",
            raw.len(),
            LANDMARK_COUNT * 3
        )));
    }

    let confidence = presence.unwrap_or(1.0);
    if confidence < settings.presence_threshold {
        return Ok(Vec::new());
    }

    let input = settings.input_size as f32;
    let (width, height) = (frame.width as f32, frame.height as f32);
    let landmarks = raw
        .chunks_exact(3)
        .take(LANDMARK_COUNT)
        .map(|p| Landmark::new(p[0] * width / input, p[1] * height / input, p[2]))
        .collect();

    Ok(vec![HandPrediction {
        hand_in_view_confidence: confidence,
        landmarks,
    }])
}

#[cfg(feature = "onnx")]
pub use onnx::OnnxHandModel;

#[cfg(feature = "onnx")]
mod onnx {
    use std::path::Path;

    use tract_onnx::prelude::*;

    use super::{HandModelSettings, decode_hand, frame_tensor};
    use crate::gesture::landmarks::{DetectionError, HandPrediction, LandmarkModel, ModelLoadError};
    use crate::gesture::media::VideoFrame;

    pub struct OnnxHandModel {
        plan: TypedRunnableModel<TypedModel>,
        settings: HandModelSettings,
    }

    impl OnnxHandModel {
        pub fn load(path: &Path, settings: HandModelSettings) -> Result<Self, ModelLoadError> {
            let size = settings.input_size as usize;
            let plan = tract_onnx::onnx()
                .model_for_path(path)
                .and_then(|model| model.with_input_fact(0, f32::fact([1, size, size, 3]).into()))
                .and_then(|model| model.into_optimized())
                .and_then(|model| model.into_runnable())
                .map_err(|e| ModelLoadError::Model {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                })?;

            tracing::info!(
                path = %path.display(),
                input_size = size,
                "hand landmark model loaded"
            );
            Ok(Self { plan, settings })
        }
    }

    fn failed(e: impl std::fmt::Display) -> DetectionError {
        DetectionError::Failed(e.to_string())
    }

    impl LandmarkModel for OnnxHandModel {
        fn estimate_hands(
            &mut self,
            frame: &VideoFrame,
        ) -> Result<Vec<HandPrediction>, DetectionError> {
            let size = self.settings.input_size as usize;
            let data = frame_tensor(frame, self.settings.input_size)?;
            let input = tract_ndarray::Array4::from_shape_vec((1, size, size, 3), data)
                .map_err(failed)?;

            let outputs = self
                .plan
                .run(tvec!(Tensor::from(input).into()))
                .map_err(failed)?;
            let landmarks: Vec<f32> = outputs
                .first()
                .ok_or_else(|| failed("model produced no outputs"))?
                .to_array_view::<f32>()
                .map_err(failed)?
                .iter()
                .copied()
                .collect();
            let presence = outputs
                .get(1)
                .and_then(|t| t.to_array_view::<f32>().ok())
                .and_then(|v| v.iter().next().copied());

            decode_hand(&landmarks, presence, &self.settings, frame)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gesture::landmarks::{INDEX_TIP, PALM_BASE};

    fn frame(width: u32, height: u32, rgb: [u8; 3]) -> VideoFrame {
        VideoFrame {
            index: 7,
            width,
            height,
            pixels: rgb.repeat((width * height) as usize),
        }
    }

    #[test]
    fn test_tensor_has_model_shape_and_unit_range() {
        let data = frame_tensor(&frame(64, 48, [255, 0, 51]), 16).unwrap();
        assert_eq!(data.len(), 16 * 16 * 3);
        for px in data.chunks_exact(3) {
            assert!((px[0] - 1.0).abs() < 1e-6);
            assert_eq!(px[1], 0.0);
            assert!((px[2] - 0.2).abs() < 1e-6);
        }
    }

    #[test]
    fn test_frame_without_pixels_is_rejected() {
        let mut empty = frame(640, 480, [0, 0, 0]);
        empty.pixels.clear();
        let err = frame_tensor(&empty, 224).unwrap_err();
        assert!(matches!(err, DetectionError::Failed(_)));
    }

    #[test]
    fn test_landmarks_are_scaled_to_frame_pixels() {
        let settings = HandModelSettings::default();
        let mut raw = vec![0.0; LANDMARK_COUNT * 3];
        raw[PALM_BASE * 3..PALM_BASE * 3 + 3].copy_from_slice(&[112.0, 56.0, -0.5]);
        raw[INDEX_TIP * 3..INDEX_TIP * 3 + 3].copy_from_slice(&[224.0, 224.0, 0.0]);

        let hands = decode_hand(&raw, Some(0.9), &settings, &frame(640, 480, [0; 3])).unwrap();
        assert_eq!(hands.len(), 1);
        assert_eq!(hands[0].hand_in_view_confidence, 0.9);
        assert_eq!(hands[0].palm_base(), Some(Landmark::new(320.0, 120.0, -0.5)));
        assert_eq!(hands[0].index_tip(), Some(Landmark::new(640.0, 480.0, 0.0)));
    }

    #[test]
    fn test_low_presence_is_no_hand() {
        let settings = HandModelSettings::default();
        let raw = vec![1.0; LANDMARK_COUNT * 3];
        let hands = decode_hand(&raw, Some(0.2), &settings, &frame(4, 4, [0; 3])).unwrap();
        assert!(hands.is_empty());
    }

    #[test]
    fn test_short_output_is_an_error() {
        let settings = HandModelSettings::default();
        let result = decode_hand(&[0.0; 12], None, &settings, &frame(4, 4, [0; 3]));
        assert!(result.is_err());
    }
}
