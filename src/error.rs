use std::fmt;

/// Error class reported alongside an error message on the event channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    DetectorInit,
    DetectorRuntime,
    ModelUnavailable,
    Inference,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::DetectorInit => "detector-init",
            ErrorKind::DetectorRuntime => "detector-runtime",
            ErrorKind::ModelUnavailable => "model-unavailable",
            ErrorKind::Inference => "inference",
        }
    }
}

/// Failures of the capture and classification path.
///
/// An empty recording is not represented here; it is a regular outcome.
#[derive(Debug)]
pub enum GestureError {
    /// A landmark engine could not be loaded on the given backend
    DetectorInit {
        engine: &'static str,
        backend: &'static str,
        message: String,
    },
    /// A landmark engine failed on a single frame
    DetectorRuntime {
        engine: &'static str,
        message: String,
    },
    /// The classifier model file could not be opened on any backend
    ModelLoad {
        backend: &'static str,
        message: String,
    },
    /// The classifier model was never loaded
    ModelUnavailable,
    /// The classifier ran but failed or returned a malformed output
    Inference { tensor_bytes: usize, message: String },
}

impl GestureError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GestureError::DetectorInit { .. } => ErrorKind::DetectorInit,
            GestureError::DetectorRuntime { .. } => ErrorKind::DetectorRuntime,
            GestureError::ModelLoad { .. } | GestureError::ModelUnavailable => {
                ErrorKind::ModelUnavailable
            }
            GestureError::Inference { .. } => ErrorKind::Inference,
        }
    }

    pub fn detector_runtime(engine: &'static str, err: impl fmt::Display) -> Self {
        GestureError::DetectorRuntime {
            engine,
            message: err.to_string(),
        }
    }
}

impl fmt::Display for GestureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GestureError::DetectorInit {
                engine,
                backend,
                message,
            } => write!(f, "{} model failed to initialize on {}: {}", engine, backend, message),
            GestureError::DetectorRuntime { engine, message } => {
                write!(f, "{} landmarker failed on frame: {}", engine, message)
            }
            GestureError::ModelLoad { backend, message } => {
                write!(f, "classifier model failed to load on {}: {}", backend, message)
            }
            GestureError::ModelUnavailable => write!(f, "classifier model is not loaded"),
            GestureError::Inference {
                tensor_bytes,
                message,
            } => write!(f, "inference failed (input {} bytes): {}", tensor_bytes, message),
        }
    }
}

impl std::error::Error for GestureError {}
