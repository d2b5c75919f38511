//! Threaded capture pipeline.
//!
//! Frames go through a one-slot channel to the frame worker, which owns the
//! detection gate. Finished recordings are handed to the classification worker,
//! which owns the classifier and publishes one `PipelineEvent` per session.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::classifier::ClassifierAdapter;
use crate::config::AppConfig;
use crate::detector::{HandDetector, PoseDetector};
use crate::error::ErrorKind;
use crate::gate::{DetectionGate, GapPolicy};
use crate::normalizer::normalize;
use crate::recording::{Capture, Recorder};
use crate::tensor::encode;
use crate::types::{ClassificationResult, Frame};
use crate::vectorizer::{UnknownHandedness, Vectorizer};

/// Outcome of one recording session, delivered to the UI side
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    Result {
        session: u64,
        /// Frames captured before normalization
        frames: usize,
        result: ClassificationResult,
    },
    /// The recording ended without a single usable frame
    NoGesture { session: u64 },
    Error {
        session: u64,
        message: String,
        kind: ErrorKind,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct PipelineOptions {
    pub recording_duration: Duration,
    pub gap_policy: GapPolicy,
    pub unknown_handedness: UnknownHandedness,
    pub max_hands: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            recording_duration: Duration::from_millis(3000),
            gap_policy: GapPolicy::Skip,
            unknown_handedness: UnknownHandedness::Drop,
            max_hands: 2,
        }
    }
}

impl From<&AppConfig> for PipelineOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            recording_duration: config.recording.duration(),
            gap_policy: config.recording.gap_policy,
            unknown_handedness: config.detector.unknown_handedness,
            max_hands: config.detector.num_hands,
        }
    }
}

/// Normalizes, encodes and classifies one finished recording.
pub fn classify_capture(classifier: &mut ClassifierAdapter, capture: Capture) -> PipelineEvent {
    let session = capture.session;
    let frames = capture.frames.len();

    if frames == 0 {
        info!(session, reason = capture.reason.as_str(), "no hands detected during recording");
        return PipelineEvent::NoGesture { session };
    }

    debug!(session, frames, "collected frames");
    let tensor = encode(&normalize(capture.frames));

    match classifier.classify(&tensor) {
        Ok(result) => {
            info!(
                session,
                label = %result.label,
                confidence = result.confidence,
                uncertain = result.uncertain,
                "prediction"
            );
            PipelineEvent::Result {
                session,
                frames,
                result,
            }
        }
        Err(e) => PipelineEvent::Error {
            session,
            message: e.to_string(),
            kind: e.kind(),
        },
    }
}

pub struct GesturePipeline {
    frames: Option<SyncSender<Frame>>,
    recorder: Option<Recorder>,
    events: Receiver<PipelineEvent>,
    frame_worker: Option<JoinHandle<()>>,
    classify_worker: Option<JoinHandle<()>>,
    dropped: Arc<AtomicU64>,
}

impl GesturePipeline {
    /// Moves the engines onto their worker threads. They are released when the
    /// pipeline shuts down.
    pub fn spawn(
        hands: Box<dyn HandDetector>,
        pose: Box<dyn PoseDetector>,
        mut classifier: ClassifierAdapter,
        options: PipelineOptions,
    ) -> Result<Self> {
        let (handoff_tx, handoff_rx) = mpsc::channel::<Capture>();
        let (event_tx, event_rx) = mpsc::channel::<PipelineEvent>();
        // One slot: a frame arriving while the worker is busy is dropped.
        let (frame_tx, frame_rx) = mpsc::sync_channel::<Frame>(1);

        let recorder = Recorder::new(options.recording_duration, handoff_tx);

        let mut gate = DetectionGate::new(
            hands,
            pose,
            Vectorizer::new(options.unknown_handedness),
            options.gap_policy,
            recorder.clone(),
        )
        .with_max_hands(options.max_hands);

        let frame_worker = thread::Builder::new()
            .name("gesture-frames".into())
            .spawn(move || {
                while let Ok(frame) = frame_rx.recv() {
                    gate.process(&frame);
                }
                debug!("frame worker stopped");
            })
            .context("spawning frame worker")?;

        let classify_worker = thread::Builder::new()
            .name("gesture-classifier".into())
            .spawn(move || {
                while let Ok(capture) = handoff_rx.recv() {
                    let event = classify_capture(&mut classifier, capture);
                    if event_tx.send(event).is_err() {
                        break;
                    }
                }
                debug!("classification worker stopped");
            })
            .context("spawning classification worker")?;

        Ok(Self {
            frames: Some(frame_tx),
            recorder: Some(recorder),
            events: event_rx,
            frame_worker: Some(frame_worker),
            classify_worker: Some(classify_worker),
            dropped: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Offers a frame to the worker. Returns `false` if it was dropped because
    /// the previous frame is still being processed.
    pub fn submit(&self, frame: Frame) -> bool {
        let Some(frames) = &self.frames else {
            return false;
        };
        match frames.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    pub fn dropped_frames(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn start_recording(&self) -> Option<u64> {
        self.recorder.as_ref().and_then(|r| r.start())
    }

    /// Ends the running session early. The outcome arrives as an event.
    pub fn stop_recording(&self) -> bool {
        self.recorder.as_ref().is_some_and(|r| r.stop())
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.as_ref().is_some_and(|r| r.is_recording())
    }

    /// Frames buffered so far in the running session
    pub fn recorded_frames(&self) -> usize {
        self.recorder.as_ref().map_or(0, |r| r.frame_count())
    }

    pub fn events(&self) -> &Receiver<PipelineEvent> {
        &self.events
    }

    pub fn try_event(&self) -> Option<PipelineEvent> {
        self.events.try_recv().ok()
    }

    pub fn wait_event(&self, timeout: Duration) -> Option<PipelineEvent> {
        self.events.recv_timeout(timeout).ok()
    }

    /// Stops both workers and releases the engines they own. A recording in
    /// progress is discarded.
    pub fn shutdown(&mut self) {
        self.frames = None;
        if let Some(worker) = self.frame_worker.take() {
            let _ = worker.join();
        }
        // Last strong handle to the recorder; its hand-off sender closes with it.
        self.recorder = None;
        if let Some(worker) = self.classify_worker.take() {
            let _ = worker.join();
        }
        info!(dropped_frames = self.dropped_frames(), "pipeline shut down");
    }
}

impl Drop for GesturePipeline {
    fn drop(&mut self) {
        if self.frame_worker.is_some() || self.classify_worker.is_some() {
            self.shutdown();
        }
    }
}

/// Human-readable line for an event, in the form shown to the operator
pub fn describe(event: &PipelineEvent) -> String {
    match event {
        PipelineEvent::Result { result, .. } => {
            format!("Sign: {} ({}%)", result.label, result.percent())
        }
        PipelineEvent::NoGesture { .. } => "No hands detected.".to_string(),
        PipelineEvent::Error { .. } => "Prediction failed".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::InferenceEngine;
    use crate::recording::StopReason;
    use crate::tensor::InputTensor;
    use crate::types::{FeatureVector, NUM_KEYPOINTS};

    struct Echo;

    impl InferenceEngine for Echo {
        fn run(&mut self, _input: &InputTensor) -> Result<Vec<f32>> {
            Ok(vec![0.9, 0.1])
        }
    }

    fn classifier(engine: Option<Box<dyn InferenceEngine>>) -> ClassifierAdapter {
        ClassifierAdapter::new(engine, vec!["Obrigado".into(), "Nada".into()], 0.7, 1)
    }

    fn capture(frames: usize) -> Capture {
        Capture {
            session: 7,
            frames: (0..frames).map(|_| FeatureVector::from([0.1; NUM_KEYPOINTS])).collect(),
            reason: StopReason::Manual,
        }
    }

    #[test]
    fn test_empty_capture_short_circuits() {
        // no engine: reaching the classifier would be an error
        let mut c = classifier(None);
        assert_eq!(
            classify_capture(&mut c, capture(0)),
            PipelineEvent::NoGesture { session: 7 }
        );
    }

    #[test]
    fn test_capture_classified() {
        let mut c = classifier(Some(Box::new(Echo)));
        match classify_capture(&mut c, capture(12)) {
            PipelineEvent::Result { session, frames, result } => {
                assert_eq!(session, 7);
                assert_eq!(frames, 12);
                assert_eq!(result.label, "Obrigado");
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_classifier_failure_becomes_error_event() {
        let mut c = classifier(None);
        let event = classify_capture(&mut c, capture(3));
        assert!(matches!(
            event,
            PipelineEvent::Error {
                kind: ErrorKind::ModelUnavailable,
                ..
            }
        ));
        assert_eq!(describe(&event), "Prediction failed");
    }
}
