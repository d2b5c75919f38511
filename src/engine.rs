//! ONNX Runtime session setup shared by the landmarkers and the classifier.

use std::path::Path;

use ort::execution_providers::{CPUExecutionProvider, CUDAExecutionProvider};
use ort::session::{builder::GraphOptimizationLevel, Session};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::GestureError;
use crate::types::RgbFrame;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Gpu,
    Cpu,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Gpu => "gpu",
            Backend::Cpu => "cpu",
        }
    }
}

fn build_session(model_path: &Path, backend: Backend) -> anyhow::Result<Session> {
    let builder = Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_intra_threads(4)?;

    let builder = match backend {
        // registration failure is an error here, never a silent CPU run
        Backend::Gpu => builder.with_execution_providers([CUDAExecutionProvider::default()
            .build()
            .error_on_failure()])?,
        Backend::Cpu => {
            builder.with_execution_providers([CPUExecutionProvider::default().build()])?
        }
    };

    Ok(builder.commit_from_file(model_path)?)
}

/// Opens `model_path` on the preferred backend. A GPU failure is retried once
/// on CPU; there is no retry after that.
pub fn open_session(
    model_path: &Path,
    preferred: Backend,
    engine: &'static str,
) -> Result<(Session, Backend), GestureError> {
    if !model_path.exists() {
        return Err(GestureError::DetectorInit {
            engine,
            backend: preferred.as_str(),
            message: format!("model file not found: {}", model_path.display()),
        });
    }

    if preferred == Backend::Gpu {
        match build_session(model_path, Backend::Gpu) {
            Ok(session) => {
                info!(engine, backend = "gpu", "loaded {}", model_path.display());
                return Ok((session, Backend::Gpu));
            }
            Err(e) => {
                let err = GestureError::DetectorInit {
                    engine,
                    backend: "gpu",
                    message: format!("{:#}", e),
                };
                warn!("{}. Falling back to CPU.", err);
            }
        }
    }

    let session = build_session(model_path, Backend::Cpu).map_err(|e| GestureError::DetectorInit {
        engine,
        backend: "cpu",
        message: format!("{:#}", e),
    })?;
    info!(engine, backend = "cpu", "loaded {}", model_path.display());
    Ok((session, Backend::Cpu))
}

/// Resize to `size x size` and lay out as NCHW `[1, 3, size, size]` in `[0, 1]`
pub fn to_nchw(frame: &RgbFrame, size: u32) -> Vec<f32> {
    let resized = image::imageops::resize(frame, size, size, image::imageops::FilterType::Triangle);
    let plane = (size * size) as usize;
    let mut data = vec![0.0f32; 3 * plane];

    for (x, y, pixel) in resized.enumerate_pixels() {
        let offset = (y * size + x) as usize;
        for c in 0..3 {
            data[c * plane + offset] = pixel[c] as f32 / 255.0;
        }
    }
    data
}

pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}
