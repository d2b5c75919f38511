//! Sequence classifier: runs the inference engine on an encoded sequence and
//! turns its per-class output into a labelled, thresholded result.

use std::path::Path;

use anyhow::Result;
use ort::session::Session;
use ort::value::Tensor;
use tracing::{error, info};

use crate::engine::{open_session, Backend};
use crate::error::GestureError;
use crate::tensor::{InputTensor, INPUT_SHAPE, TENSOR_BYTES};
use crate::types::ClassificationResult;

/// Single-shot model call: flat input tensor in, per-class scores out
pub trait InferenceEngine: Send {
    fn run(&mut self, input: &InputTensor) -> Result<Vec<f32>>;
}

pub struct OnnxInferenceEngine {
    session: Session,
}

impl OnnxInferenceEngine {
    /// Load failures are reported as `ModelLoad`, never as a landmarker failure.
    pub fn open(model_path: &Path, backend: Backend) -> Result<Self, GestureError> {
        let (session, _) = open_session(model_path, backend, "classifier").map_err(|e| match e {
            GestureError::DetectorInit {
                backend, message, ..
            } => GestureError::ModelLoad { backend, message },
            other => other,
        })?;
        Ok(Self { session })
    }
}

impl InferenceEngine for OnnxInferenceEngine {
    fn run(&mut self, input: &InputTensor) -> Result<Vec<f32>> {
        let tensor = Tensor::from_array((INPUT_SHAPE.to_vec(), input.values().to_vec()))?;
        let outputs = self.session.run(ort::inputs![tensor])?;
        let (_shape, scores) = outputs[0].try_extract_tensor::<f32>()?;
        Ok(scores.to_vec())
    }
}

pub struct ClassifierAdapter {
    engine: Option<Box<dyn InferenceEngine>>,
    labels: Vec<String>,
    threshold: f32,
    fallback_index: usize,
}

impl ClassifierAdapter {
    /// `engine` is `None` when the model failed to load; every call then fails
    /// with `ModelUnavailable`.
    pub fn new(
        engine: Option<Box<dyn InferenceEngine>>,
        labels: Vec<String>,
        threshold: f32,
        fallback_index: usize,
    ) -> Self {
        let fallback_index = fallback_index.min(labels.len().saturating_sub(1));
        Self {
            engine,
            labels,
            threshold,
            fallback_index,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.engine.is_some()
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn set_threshold(&mut self, threshold: f32) {
        self.threshold = threshold;
    }

    pub fn classify(&mut self, tensor: &InputTensor) -> Result<ClassificationResult, GestureError> {
        let engine = self.engine.as_mut().ok_or(GestureError::ModelUnavailable)?;
        let tensor_bytes = tensor.byte_len();

        let scores = engine.run(tensor).map_err(|e| {
            error!(tensor_bytes, "inference call failed: {:#}", e);
            GestureError::Inference {
                tensor_bytes,
                message: format!("{:#}", e),
            }
        })?;

        self.apply_policy(scores, tensor_bytes).map_err(|err| {
            error!(tensor_bytes, "{}", err);
            err
        })
    }

    /// Decision policy over raw model scores.
    ///
    /// The highest score wins; a top score below the threshold, or a tie for the
    /// top, reports the fallback class and marks the result uncertain.
    pub fn decide(&self, scores: Vec<f32>) -> Result<ClassificationResult, GestureError> {
        self.apply_policy(scores, TENSOR_BYTES)
    }

    fn apply_policy(
        &self,
        scores: Vec<f32>,
        tensor_bytes: usize,
    ) -> Result<ClassificationResult, GestureError> {
        if scores.is_empty() || scores.len() != self.labels.len() {
            return Err(GestureError::Inference {
                tensor_bytes,
                message: format!(
                    "model returned {} scores for {} classes",
                    scores.len(),
                    self.labels.len()
                ),
            });
        }
        if scores.iter().any(|s| !s.is_finite()) {
            return Err(GestureError::Inference {
                tensor_bytes,
                message: format!("model returned non-finite scores {:?}", scores),
            });
        }

        let mut top = 0;
        for (i, &s) in scores.iter().enumerate() {
            if s > scores[top] {
                top = i;
            }
        }
        let tied = scores
            .iter()
            .enumerate()
            .any(|(i, &s)| i != top && s == scores[top]);
        let uncertain = tied || scores[top] < self.threshold;

        let class_index = if uncertain { self.fallback_index } else { top };
        Ok(ClassificationResult {
            label: self.labels[class_index].clone(),
            class_index,
            confidence: scores[class_index],
            scores,
            uncertain,
        })
    }

    /// Runs one all-zero sequence through the engine and checks the output shape.
    pub fn self_test(&mut self) -> bool {
        let Some(engine) = self.engine.as_mut() else {
            return false;
        };
        let probe = crate::tensor::encode(&crate::normalizer::normalize(Vec::new()));
        match engine.run(&probe) {
            Ok(scores) if scores.len() == self.labels.len() => {
                info!(?scores, "classifier self-test passed");
                true
            }
            Ok(scores) => {
                error!(
                    "classifier self-test returned {} scores, expected {}",
                    scores.len(),
                    self.labels.len()
                );
                false
            }
            Err(e) => {
                error!(tensor_bytes = probe.byte_len(), "classifier self-test failed: {:#}", e);
                false
            }
        }
    }
}
