use image::{ImageBuffer, Rgb};
use serde::{Deserialize, Serialize};

/// Features per frame: 33 pose points * 4 + 2 hands * 21 points * 3
pub const NUM_KEYPOINTS: usize = 258;

/// Frames per classified sequence
pub const MAX_FRAMES: usize = 30;

pub const POSE_LANDMARKS: usize = 33;
pub const HAND_LANDMARKS: usize = 21;

pub const POSE_STRIDE: usize = 4;
pub const HAND_STRIDE: usize = 3;

/// Slot boundaries inside a FeatureVector
pub const POSE_OFFSET: usize = 0;
pub const LEFT_HAND_OFFSET: usize = POSE_LANDMARKS * POSE_STRIDE; // 132
pub const RIGHT_HAND_OFFSET: usize = LEFT_HAND_OFFSET + HAND_LANDMARKS * HAND_STRIDE; // 195

pub type RgbFrame = ImageBuffer<Rgb<u8>, Vec<u8>>;

/// One camera frame with its monotonic capture time
#[derive(Debug, Clone)]
pub struct Frame {
    pub image: RgbFrame,
    pub timestamp_ms: u64,
}

impl Frame {
    pub fn new(image: RgbFrame, timestamp_ms: u64) -> Self {
        Self { image, timestamp_ms }
    }
}

/// A single normalized landmark as emitted by a landmark model.
/// Coordinates are in image space `[0, 1]`; `z` is relative depth.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub visibility: Option<f32>,
    pub presence: Option<f32>,
}

impl Landmark {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self {
            x,
            y,
            z,
            visibility: None,
            presence: None,
        }
    }

    pub fn with_visibility(mut self, visibility: f32) -> Self {
        self.visibility = Some(visibility);
        self
    }
}

/// Scored label, e.g. a handedness category
#[derive(Debug, Clone, PartialEq)]
pub struct Category {
    pub label: String,
    pub score: f32,
}

impl Category {
    pub fn new(label: impl Into<String>, score: f32) -> Self {
        Self {
            label: label.into(),
            score,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandSide {
    Left,
    Right,
    Unknown,
}

impl HandSide {
    pub fn from_label(label: &str) -> Self {
        match label {
            "Left" => HandSide::Left,
            "Right" => HandSide::Right,
            _ => HandSide::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HandSide::Left => "Left",
            HandSide::Right => "Right",
            HandSide::Unknown => "Unknown",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectedHand {
    pub landmarks: Vec<Landmark>,
    /// Handedness candidates, best first. Empty when unresolved.
    pub handedness: Vec<Category>,
}

impl DetectedHand {
    pub fn new(landmarks: Vec<Landmark>, handedness: Vec<Category>) -> Self {
        Self {
            landmarks,
            handedness,
        }
    }

    /// Side of the best handedness candidate, `None` when there is no candidate.
    pub fn side(&self) -> Option<HandSide> {
        self.handedness
            .first()
            .map(|c| HandSide::from_label(&c.label))
    }
}

/// Hand landmarker output for one frame
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HandDetection {
    pub hands: Vec<DetectedHand>,
}

impl HandDetection {
    pub fn new(hands: Vec<DetectedHand>) -> Self {
        Self { hands }
    }

    pub fn is_empty(&self) -> bool {
        self.hands.is_empty()
    }
}

/// Pose landmarker output for one frame. Only the first body is used.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PoseDetection {
    pub bodies: Vec<Vec<Landmark>>,
}

impl PoseDetection {
    pub fn single(landmarks: Vec<Landmark>) -> Self {
        Self {
            bodies: vec![landmarks],
        }
    }

    pub fn first(&self) -> Option<&[Landmark]> {
        self.bodies.first().map(|b| b.as_slice())
    }
}

/// Fixed-layout keypoint encoding of one frame.
///
/// `[0, 132)` pose (x, y, z, visibility), `[132, 195)` left hand (x, y, z),
/// `[195, 258)` right hand (x, y, z). Absent entities stay zero.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector(Box<[f32; NUM_KEYPOINTS]>);

impl FeatureVector {
    pub fn zeroed() -> Self {
        Self(Box::new([0.0; NUM_KEYPOINTS]))
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0[..]
    }

    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.0[..]
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|&v| v == 0.0)
    }
}

impl Default for FeatureVector {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl From<[f32; NUM_KEYPOINTS]> for FeatureVector {
    fn from(values: [f32; NUM_KEYPOINTS]) -> Self {
        Self(Box::new(values))
    }
}

/// Frames in capture order
pub type FrameSequence = Vec<FeatureVector>;

/// Exactly `MAX_FRAMES` feature vectors. Only the normalizer builds these.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedSequence {
    frames: Vec<FeatureVector>,
}

impl NormalizedSequence {
    pub(crate) fn from_exact(frames: Vec<FeatureVector>) -> Self {
        debug_assert_eq!(frames.len(), MAX_FRAMES);
        Self { frames }
    }

    pub fn frames(&self) -> &[FeatureVector] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn into_frames(self) -> Vec<FeatureVector> {
        self.frames
    }
}

/// Classifier verdict for one recording
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub label: String,
    pub class_index: usize,
    /// Confidence of the reported label
    pub confidence: f32,
    /// Raw per-class confidences, in model output order
    pub scores: Vec<f32>,
    /// The top class fell below the decision threshold
    pub uncertain: bool,
}

impl ClassificationResult {
    pub fn percent(&self) -> u32 {
        (self.confidence * 100.0) as u32
    }
}
