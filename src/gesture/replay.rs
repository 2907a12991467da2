//! Plays back a recorded landmark session in place of a live camera.
//!
//! A recording is JSON lines: one line per video frame, each a JSON array of
//! hand predictions (empty when no hand was seen). Blank lines are skipped.

use std::path::Path;
use std::sync::Arc;

use crate::gesture::landmarks::{DetectionError, HandPrediction, LandmarkModel, ModelLoadError};
use crate::gesture::media::{
    CaptureError, MediaAccessError, MediaDevices, MediaStream, VideoConstraints, VideoFrame,
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Recording {
    frames: Vec<Vec<HandPrediction>>,
}

impl Recording {
    pub fn new(frames: Vec<Vec<HandPrediction>>) -> Self {
        Self { frames }
    }

    pub fn parse(text: &str) -> Result<Self, ModelLoadError> {
        let mut frames = Vec::new();
        for (i, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let hands: Vec<HandPrediction> = serde_json::from_str(line)
                .map_err(|source| ModelLoadError::Parse { line: i + 1, source })?;
            frames.push(hands);
        }
        Ok(Self { frames })
    }

    pub fn load(path: &Path) -> Result<Self, ModelLoadError> {
        let text = std::fs::read_to_string(path).map_err(|source| ModelLoadError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let recording = Self::parse(&text)?;
        tracing::info!(
            path = %path.display(),
            frames = recording.len(),
            "landmark recording loaded"
        );
        Ok(recording)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frame(&self, index: u64) -> Option<&[HandPrediction]> {
        self.frames.get(index as usize).map(Vec::as_slice)
    }
}

/// Camera backend whose streams step through a recording one frame per capture.
#[derive(Debug, Clone)]
pub struct ReplayDevices {
    recording: Arc<Recording>,
    looping: bool,
}

impl ReplayDevices {
    pub fn new(recording: Arc<Recording>, looping: bool) -> Self {
        Self { recording, looping }
    }

    pub fn landmarker(&self) -> ReplayLandmarker {
        ReplayLandmarker {
            recording: Arc::clone(&self.recording),
        }
    }
}

impl MediaDevices for ReplayDevices {
    fn open(
        &self,
        constraints: &VideoConstraints,
    ) -> Result<Box<dyn MediaStream>, MediaAccessError> {
        if self.recording.is_empty() {
            return Err(MediaAccessError::Unsupported("recording has no frames".into()));
        }
        Ok(Box::new(ReplayStream {
            recording: Arc::clone(&self.recording),
            looping: self.looping,
            constraints: *constraints,
            next: 0,
            stopped: false,
        }))
    }
}

struct ReplayStream {
    recording: Arc<Recording>,
    looping: bool,
    constraints: VideoConstraints,
    next: u64,
    stopped: bool,
}

impl MediaStream for ReplayStream {
    fn capture_frame(&mut self) -> Result<VideoFrame, CaptureError> {
        if self.stopped {
            return Err(CaptureError::Ended);
        }
        if self.next as usize >= self.recording.len() {
            if !self.looping {
                return Err(CaptureError::Ended);
            }
            self.next = 0;
        }

        let frame = VideoFrame {
            index: self.next,
            width: self.constraints.width,
            height: self.constraints.height,
            pixels: Vec::new(),
        };
        self.next += 1;
        Ok(frame)
    }

    fn stop_tracks(&mut self) {
        self.stopped = true;
    }

    fn active_tracks(&self) -> usize {
        usize::from(!self.stopped)
    }
}

/// Answers detections by looking the frame up in the recording.
#[derive(Debug, Clone)]
pub struct ReplayLandmarker {
    recording: Arc<Recording>,
}

impl LandmarkModel for ReplayLandmarker {
    fn estimate_hands(
        &mut self,
        frame: &VideoFrame,
    ) -> Result<Vec<HandPrediction>, DetectionError> {
        self.recording
            .frame(frame.index)
            .map(<[HandPrediction]>::to_vec)
            .ok_or(DetectionError::MissingFrame(frame.index))
    }
}
