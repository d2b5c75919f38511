use std::path::Path;

use anyhow::{anyhow, Context, Result};
use ort::session::Session;
use ort::value::Tensor;
use tracing::debug;

use crate::engine::{open_session, sigmoid, to_nchw, Backend};
use crate::error::GestureError;
use crate::types::{
    Category, DetectedHand, Frame, HandDetection, Landmark, PoseDetection, HAND_LANDMARKS,
    POSE_LANDMARKS,
};

/// Cheap per-frame hand landmarker.
///
/// `Ok(None)` means nothing was found; `Err` is an engine failure on this frame.
pub trait HandDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Option<HandDetection>>;
}

/// Expensive body landmarker, only run on frames that already contain a hand.
pub trait PoseDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Option<PoseDetection>>;
}

/// Video-mode engines reject frames that go back in time.
#[derive(Debug, Default)]
struct TimestampGuard {
    last_ms: Option<u64>,
}

impl TimestampGuard {
    fn check(&mut self, timestamp_ms: u64) -> Result<()> {
        if let Some(last) = self.last_ms {
            if timestamp_ms < last {
                return Err(anyhow!(
                    "frame timestamp {}ms precedes last processed {}ms",
                    timestamp_ms,
                    last
                ));
            }
        }
        self.last_ms = Some(timestamp_ms);
        Ok(())
    }
}

const HAND_INPUT: u32 = 224;
const POSE_INPUT: u32 = 256;
/// Pose model emits 39 points of (x, y, z, visibility, presence); the first 33 are the body
const POSE_VALUES_PER_POINT: usize = 5;

/// Full-frame hand landmark model.
///
/// Outputs, in order: N x 21 x (x, y, z) in input pixels, N hand scores, N
/// handedness values (0 = left, 1 = right). Single-hand models are N = 1.
pub struct OnnxHandLandmarker {
    session: Session,
    backend: Backend,
    min_confidence: f32,
    timestamps: TimestampGuard,
}

impl OnnxHandLandmarker {
    pub fn new(model_path: &Path, backend: Backend, min_confidence: f32) -> Result<Self, GestureError> {
        let (session, backend) = open_session(model_path, backend, "hand")?;
        Ok(Self {
            session,
            backend,
            min_confidence,
            timestamps: TimestampGuard::default(),
        })
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }
}

impl HandDetector for OnnxHandLandmarker {
    fn detect(&mut self, frame: &Frame) -> Result<Option<HandDetection>> {
        self.timestamps.check(frame.timestamp_ms)?;

        let input = to_nchw(&frame.image, HAND_INPUT);
        let input_tensor = Tensor::from_array((vec![1, 3, HAND_INPUT as _, HAND_INPUT as _], input))?;
        let outputs = self.session.run(ort::inputs![input_tensor])?;

        let (_, coords) = outputs[0].try_extract_tensor::<f32>()?;
        let (_, scores) = outputs[1].try_extract_tensor::<f32>()?;
        let (_, sides) = outputs[2].try_extract_tensor::<f32>()?;

        let hands = decode_hands(coords, scores, sides, self.min_confidence, HAND_INPUT as f32)?;
        if hands.is_empty() {
            return Ok(None);
        }
        Ok(Some(HandDetection::new(hands)))
    }
}

const HAND_VALUES: usize = HAND_LANDMARKS * 3;

/// Turns raw hand landmark outputs into detected hands, dropping those below
/// `min_confidence`. Coordinates are divided by `scale`.
fn decode_hands(
    coords: &[f32],
    scores: &[f32],
    sides: &[f32],
    min_confidence: f32,
    scale: f32,
) -> Result<Vec<DetectedHand>> {
    if scores.is_empty() {
        return Err(anyhow!("empty hand score output"));
    }

    let mut hands = Vec::new();
    for (i, &score) in scores.iter().enumerate() {
        if score < min_confidence {
            continue;
        }
        let points = coords
            .get(i * HAND_VALUES..(i + 1) * HAND_VALUES)
            .with_context(|| {
                format!(
                    "hand landmark output has {} values, expected at least {}",
                    coords.len(),
                    (i + 1) * HAND_VALUES
                )
            })?;
        let landmarks = points
            .chunks_exact(3)
            .map(|p| Landmark::new(p[0] / scale, p[1] / scale, p[2] / scale))
            .collect();

        let right = sides.get(i).copied().unwrap_or(0.5);
        let handedness = if right >= 0.5 {
            Category::new("Right", right)
        } else {
            Category::new("Left", 1.0 - right)
        };
        debug!(hand = i, score, handedness = %handedness.label, "hand found");
        hands.push(DetectedHand::new(landmarks, vec![handedness]));
    }
    Ok(hands)
}

/// Full-frame body landmark model.
///
/// Outputs, in order: 39 x (x, y, z, visibility, presence) in input pixels with
/// visibility and presence as logits, pose presence score.
pub struct OnnxPoseLandmarker {
    session: Session,
    backend: Backend,
    min_confidence: f32,
    timestamps: TimestampGuard,
}

impl OnnxPoseLandmarker {
    pub fn new(model_path: &Path, backend: Backend, min_confidence: f32) -> Result<Self, GestureError> {
        let (session, backend) = open_session(model_path, backend, "pose")?;
        Ok(Self {
            session,
            backend,
            min_confidence,
            timestamps: TimestampGuard::default(),
        })
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }
}

impl PoseDetector for OnnxPoseLandmarker {
    fn detect(&mut self, frame: &Frame) -> Result<Option<PoseDetection>> {
        self.timestamps.check(frame.timestamp_ms)?;

        let input = to_nchw(&frame.image, POSE_INPUT);
        let input_tensor = Tensor::from_array((vec![1, 3, POSE_INPUT as _, POSE_INPUT as _], input))?;
        let outputs = self.session.run(ort::inputs![input_tensor])?;

        let (_, values) = outputs[0].try_extract_tensor::<f32>()?;
        let (_, flag) = outputs[1].try_extract_tensor::<f32>()?;

        let flag = *flag.first().context("empty pose flag output")?;
        if flag < self.min_confidence {
            return Ok(None);
        }

        let scale = POSE_INPUT as f32;
        let landmarks: Vec<Landmark> = values
            .chunks_exact(POSE_VALUES_PER_POINT)
            .take(POSE_LANDMARKS)
            .map(|p| Landmark {
                x: p[0] / scale,
                y: p[1] / scale,
                z: p[2] / scale,
                visibility: Some(sigmoid(p[3])),
                presence: Some(sigmoid(p[4])),
            })
            .collect();

        if landmarks.is_empty() {
            return Err(anyhow!("pose landmark output is empty"));
        }
        Ok(Some(PoseDetection::single(landmarks)))
    }
}
