//! Per-frame detection gate.
//!
//! The hand landmarker runs on every frame. The pose landmarker only runs
//! while recording and only when a hand was found; that frame is then
//! vectorized and appended to the recording.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::detector::{HandDetector, PoseDetector};
use crate::error::GestureError;
use crate::recording::Recorder;
use crate::types::{FeatureVector, Frame};
use crate::vectorizer::Vectorizer;

/// Handling of handless frames in the middle of a recording
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GapPolicy {
    /// Leave the frame out; gaps compress away
    #[default]
    Skip,
    /// Record an all-zero frame so the gap keeps its length
    ZeroFill,
}

/// What happened to one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Not recording; only the hand landmarker ran
    Idle { hands: usize },
    /// Frame vectorized and appended
    Recorded { hands: usize, pose: bool },
    /// Recording, but no hand was visible
    Skipped,
    /// Zero frame appended for a handless frame
    GapFilled,
    /// A landmarker failed; the frame was dropped
    Failed,
}

pub struct DetectionGate {
    hands: Box<dyn HandDetector>,
    pose: Box<dyn PoseDetector>,
    vectorizer: Vectorizer,
    gap_policy: GapPolicy,
    max_hands: usize,
    recorder: Recorder,
}

impl DetectionGate {
    pub fn new(
        hands: Box<dyn HandDetector>,
        pose: Box<dyn PoseDetector>,
        vectorizer: Vectorizer,
        gap_policy: GapPolicy,
        recorder: Recorder,
    ) -> Self {
        Self {
            hands,
            pose,
            vectorizer,
            gap_policy,
            max_hands: 2,
            recorder,
        }
    }

    /// Hands beyond this count are ignored, in detector order
    pub fn with_max_hands(mut self, max_hands: usize) -> Self {
        self.max_hands = max_hands;
        self
    }

    pub fn process(&mut self, frame: &Frame) -> FrameOutcome {
        let start = Instant::now();
        let outcome = self.run(frame);
        debug!(
            timestamp_ms = frame.timestamp_ms,
            elapsed_ms = start.elapsed().as_millis() as u64,
            ?outcome,
            "frame processed"
        );
        outcome
    }

    fn run(&mut self, frame: &Frame) -> FrameOutcome {
        let hands = match self.hands.detect(frame) {
            Ok(hands) => hands
                .map(|mut h| {
                    h.hands.truncate(self.max_hands);
                    h
                })
                .filter(|h| !h.is_empty()),
            Err(e) => {
                warn!("{}", GestureError::detector_runtime("hand", e));
                return FrameOutcome::Failed;
            }
        };
        let hand_count = hands.as_ref().map_or(0, |h| h.hands.len());

        // Frames are tied to the session seen here; a later session never receives them.
        let Some(session) = self.recorder.active_session() else {
            return FrameOutcome::Idle { hands: hand_count };
        };

        let Some(hands) = hands else {
            return match self.gap_policy {
                GapPolicy::Skip => FrameOutcome::Skipped,
                GapPolicy::ZeroFill => {
                    if self.recorder.append_to(session, FeatureVector::zeroed()) {
                        FrameOutcome::GapFilled
                    } else {
                        FrameOutcome::Idle { hands: 0 }
                    }
                }
            };
        };

        let pose = match self.pose.detect(frame) {
            Ok(pose) => pose,
            Err(e) => {
                warn!("{}", GestureError::detector_runtime("pose", e));
                return FrameOutcome::Failed;
            }
        };

        let features = self.vectorizer.vectorize(pose.as_ref(), Some(&hands));
        // The session may have ended while the pose landmarker ran; the frame is then dropped.
        if self.recorder.append_to(session, features) {
            FrameOutcome::Recorded {
                hands: hand_count,
                pose: pose.is_some(),
            }
        } else {
            FrameOutcome::Idle { hands: hand_count }
        }
    }
}
