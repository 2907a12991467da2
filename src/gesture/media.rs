use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacingMode {
    /// The camera facing the person at the screen.
    #[default]
    User,
    Environment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoConstraints {
    pub width: u32,
    pub height: u32,
    pub facing_mode: FacingMode,
}

impl Default for VideoConstraints {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            facing_mode: FacingMode::User,
        }
    }
}

/// One captured frame. `index` counts frames since the stream was opened.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoFrame {
    pub index: u64,
    pub width: u32,
    pub height: u32,
    /// Packed RGB8; empty for sources that carry no pixels.
    pub pixels: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum MediaAccessError {
    #[error("camera permission denied")]
    PermissionDenied,
    #[error("no camera found")]
    NotFound,
    #[error("camera not supported: {0}")]
    Unsupported(String),
    #[error("camera I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    #[error("video stream ended")]
    Ended,
    #[error("frame capture failed: {0}")]
    Failed(String),
}

/// A live video stream; owned by whoever polls it.
pub trait MediaStream: Send {
    fn capture_frame(&mut self) -> Result<VideoFrame, CaptureError>;

    /// Releases the device. Further captures report `Ended`.
    fn stop_tracks(&mut self);

    fn active_tracks(&self) -> usize;
}

pub trait MediaDevices {
    fn open(
        &self,
        constraints: &VideoConstraints,
    ) -> Result<Box<dyn MediaStream>, MediaAccessError>;
}

/// Used when no camera backend is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCameraDevices;

impl MediaDevices for NoCameraDevices {
    fn open(&self, _: &VideoConstraints) -> Result<Box<dyn MediaStream>, MediaAccessError> {
        Err(MediaAccessError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_constraints() {
        let c = VideoConstraints::default();
        assert_eq!((c.width, c.height), (640, 480));
        assert_eq!(c.facing_mode, FacingMode::User);
    }

    #[test]
    fn test_no_camera_reports_not_found() {
        let result = NoCameraDevices.open(&VideoConstraints::default());
        assert!(matches!(result, Err(MediaAccessError::NotFound)));
    }
}
