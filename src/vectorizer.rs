//! Fuses one frame's pose and hand landmarks into a fixed-length FeatureVector.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::types::{
    FeatureVector, HandDetection, HandSide, Landmark, PoseDetection, HAND_LANDMARKS, HAND_STRIDE,
    LEFT_HAND_OFFSET, POSE_LANDMARKS, POSE_OFFSET, POSE_STRIDE, RIGHT_HAND_OFFSET,
};

/// What to do with a hand whose handedness label is neither `Left` nor `Right`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UnknownHandedness {
    /// Leave the hand out of the vector
    #[default]
    Drop,
    /// Write it into the right hand slot
    Right,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Vectorizer {
    pub unknown_handedness: UnknownHandedness,
}

impl Vectorizer {
    pub fn new(unknown_handedness: UnknownHandedness) -> Self {
        Self { unknown_handedness }
    }

    pub fn vectorize(
        &self,
        pose: Option<&PoseDetection>,
        hands: Option<&HandDetection>,
    ) -> FeatureVector {
        let mut features = FeatureVector::zeroed();
        let out = features.as_mut_slice();

        if let Some(body) = pose.and_then(|p| p.first()) {
            write_pose(out, body);
        }

        if let Some(hands) = hands {
            for (i, hand) in hands.hands.iter().enumerate() {
                let offset = match hand.side() {
                    None => {
                        trace!(hand = i, "hand without handedness skipped");
                        continue;
                    }
                    Some(HandSide::Left) => LEFT_HAND_OFFSET,
                    Some(HandSide::Right) => RIGHT_HAND_OFFSET,
                    Some(HandSide::Unknown) => match self.unknown_handedness {
                        UnknownHandedness::Right => RIGHT_HAND_OFFSET,
                        UnknownHandedness::Drop => {
                            trace!(hand = i, "hand with unrecognized handedness dropped");
                            continue;
                        }
                    },
                };
                write_hand(out, offset, &hand.landmarks);
            }
        }

        features
    }
}

/// Shorthand for the default policy
pub fn vectorize(pose: Option<&PoseDetection>, hands: Option<&HandDetection>) -> FeatureVector {
    Vectorizer::default().vectorize(pose, hands)
}

fn write_pose(out: &mut [f32], body: &[Landmark]) {
    for (i, lm) in body.iter().take(POSE_LANDMARKS).enumerate() {
        let base = POSE_OFFSET + i * POSE_STRIDE;
        out[base] = lm.x;
        out[base + 1] = lm.y;
        out[base + 2] = lm.z;
        out[base + 3] = lm.visibility.unwrap_or(0.0);
    }
}

fn write_hand(out: &mut [f32], offset: usize, landmarks: &[Landmark]) {
    // Bounded to the slot so a malformed hand never bleeds into its neighbour.
    for (i, lm) in landmarks.iter().take(HAND_LANDMARKS).enumerate() {
        let base = offset + i * HAND_STRIDE;
        out[base] = lm.x;
        out[base + 1] = lm.y;
        out[base + 2] = lm.z;
    }
}
