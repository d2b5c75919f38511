//! Live gesture capture and classification.
//!
//! A cheap hand landmarker gates an expensive pose landmarker; hand-bearing
//! frames recorded during a bounded window are vectorized, resampled to a
//! fixed frame count, packed into a tensor and classified.

pub mod classifier;
pub mod config;
pub mod detector;
pub mod engine;
pub mod error;
pub mod gate;
pub mod normalizer;
pub mod pipeline;
pub mod recording;
pub mod tensor;
pub mod types;
pub mod vectorizer;

pub use classifier::{ClassifierAdapter, InferenceEngine, OnnxInferenceEngine};
pub use config::AppConfig;
pub use detector::{HandDetector, OnnxHandLandmarker, OnnxPoseLandmarker, PoseDetector};
pub use engine::Backend;
pub use error::{ErrorKind, GestureError};
pub use gate::{DetectionGate, FrameOutcome, GapPolicy};
pub use normalizer::normalize;
pub use pipeline::{classify_capture, describe, GesturePipeline, PipelineEvent, PipelineOptions};
pub use recording::{Capture, Recorder, RecordingBuffer, RecordingState, StopReason};
pub use tensor::{decode, encode, InputTensor};
pub use types::*;
pub use vectorizer::{vectorize, UnknownHandedness, Vectorizer};
