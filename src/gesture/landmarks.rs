use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::gesture::media::VideoFrame;

// Indices follow the 21-point hand skeleton used by common hand pose models.
pub const PALM_BASE: usize = 0;
pub const THUMB_TIP: usize = 4;
pub const INDEX_TIP: usize = 8;
pub const LANDMARK_COUNT: usize = 21;

/// One keypoint in video pixel coordinates; `z` is relative depth.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 3]", into = "[f32; 3]")]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl From<[f32; 3]> for Landmark {
    fn from([x, y, z]: [f32; 3]) -> Self {
        Self { x, y, z }
    }
}

impl From<Landmark> for [f32; 3] {
    fn from(l: Landmark) -> Self {
        [l.x, l.y, l.z]
    }
}

impl Landmark {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn xy(&self) -> [f32; 2] {
        [self.x, self.y]
    }

    /// Distance in the image plane; depth is ignored.
    pub fn distance_2d(&self, other: &Landmark) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandPrediction {
    #[serde(default = "full_confidence")]
    pub hand_in_view_confidence: f32,
    pub landmarks: Vec<Landmark>,
}

fn full_confidence() -> f32 {
    1.0
}

impl HandPrediction {
    pub fn new(landmarks: Vec<Landmark>) -> Self {
        Self {
            hand_in_view_confidence: 1.0,
            landmarks,
        }
    }

    pub fn landmark(&self, index: usize) -> Option<Landmark> {
        self.landmarks.get(index).copied()
    }

    pub fn palm_base(&self) -> Option<Landmark> {
        self.landmark(PALM_BASE)
    }

    pub fn thumb_tip(&self) -> Option<Landmark> {
        self.landmark(THUMB_TIP)
    }

    pub fn index_tip(&self) -> Option<Landmark> {
        self.landmark(INDEX_TIP)
    }
}

/// Snapshot of the tracked hand, replaced whole on every detection tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HandPose {
    pub palm: Landmark,
    pub thumb_tip: Landmark,
    pub index_tip: Landmark,
    pub previous_palm: [f32; 2],
    pub hand_detected: bool,
}

/// What one detection tick reports to the consumer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureSignal {
    pub delta_x: f32,
    pub delta_y: f32,
    pub pinch_distance: f32,
    pub hand_detected: bool,
}

impl GestureSignal {
    pub fn no_hand() -> Self {
        Self {
            delta_x: 0.0,
            delta_y: 0.0,
            pinch_distance: 0.0,
            hand_detected: false,
        }
    }
}

/// Turns the first detected hand into a signal and a new pose.
///
/// `previous_palm` is read for the deltas and then moved to the new palm
/// position. Hands missing one of the three tracked keypoints count as no hand.
pub fn read_hands(
    hands: &[HandPrediction],
    previous_palm: &mut [f32; 2],
) -> (GestureSignal, Option<HandPose>) {
    let Some(hand) = hands.first() else {
        return (GestureSignal::no_hand(), None);
    };
    let (Some(palm), Some(thumb_tip), Some(index_tip)) =
        (hand.palm_base(), hand.thumb_tip(), hand.index_tip())
    else {
        return (GestureSignal::no_hand(), None);
    };

    let [px, py] = *previous_palm;
    let signal = GestureSignal {
        delta_x: palm.x - px,
        delta_y: palm.y - py,
        pinch_distance: thumb_tip.distance_2d(&index_tip),
        hand_detected: true,
    };
    let pose = HandPose {
        palm,
        thumb_tip,
        index_tip,
        previous_palm: [px, py],
        hand_detected: true,
    };

    *previous_palm = palm.xy();
    (signal, Some(pose))
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DetectionError {
    #[error("frame {0} has no landmark data")]
    MissingFrame(u64),
    #[error("hand detection failed: {0}")]
    Failed(String),
}

#[derive(Debug, Error)]
pub enum ModelLoadError {
    #[error("failed to read model data from {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid model data at line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to load hand landmark model {path}: {reason}")]
    Model { path: String, reason: String },
    #[error("hand detection model unavailable: {0}")]
    Unavailable(String),
}

/// A loaded hand landmark estimator.
pub trait LandmarkModel: Send {
    fn estimate_hands(
        &mut self,
        frame: &VideoFrame,
    ) -> Result<Vec<HandPrediction>, DetectionError>;
}
