use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use gesture_capture::{
    decode, Category, ClassifierAdapter, DetectedHand, ErrorKind, Frame, GesturePipeline,
    HandDetection, HandDetector, InferenceEngine, InputTensor, Landmark, PipelineEvent,
    PipelineOptions, PoseDetection, PoseDetector, RgbFrame, MAX_FRAMES, NUM_KEYPOINTS,
    RIGHT_HAND_OFFSET,
};

/// Right hand at the origin on every frame, except a marked landmark on one frame
struct MarkedHands {
    marked_frame: u64,
    visible: bool,
    delay: Duration,
    released: Arc<AtomicBool>,
}

impl HandDetector for MarkedHands {
    fn detect(&mut self, frame: &Frame) -> Result<Option<HandDetection>> {
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        if !self.visible {
            return Ok(None);
        }
        let mut landmarks = vec![Landmark::new(0.0, 0.0, 0.0); 21];
        if frame.timestamp_ms == self.marked_frame {
            landmarks[0] = Landmark::new(0.9, 0.1, 0.0);
        }
        Ok(Some(HandDetection::new(vec![DetectedHand::new(
            landmarks,
            vec![Category::new("Right", 0.97)],
        )])))
    }
}

impl Drop for MarkedHands {
    fn drop(&mut self) {
        self.released.store(true, Ordering::SeqCst);
    }
}

struct NoPose;

impl PoseDetector for NoPose {
    fn detect(&mut self, _frame: &Frame) -> Result<Option<PoseDetection>> {
        Ok(None)
    }
}

/// Returns fixed scores and keeps the last input it saw
struct RecordingEngine {
    scores: Vec<f32>,
    calls: Arc<AtomicUsize>,
    last_input: Arc<Mutex<Option<InputTensor>>>,
}

impl InferenceEngine for RecordingEngine {
    fn run(&mut self, input: &InputTensor) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_input.lock().unwrap() = Some(input.clone());
        Ok(self.scores.clone())
    }
}

struct Harness {
    pipeline: GesturePipeline,
    calls: Arc<AtomicUsize>,
    last_input: Arc<Mutex<Option<InputTensor>>>,
    released: Arc<AtomicBool>,
}

fn harness(scores: Vec<f32>, hands_visible: bool, window: Duration, delay: Duration) -> Harness {
    let calls = Arc::new(AtomicUsize::new(0));
    let last_input = Arc::new(Mutex::new(None));
    let released = Arc::new(AtomicBool::new(false));

    let engine = RecordingEngine {
        scores,
        calls: calls.clone(),
        last_input: last_input.clone(),
    };
    let classifier = ClassifierAdapter::new(
        Some(Box::new(engine)),
        vec!["Obrigado".to_string(), "Nada".to_string()],
        0.7,
        1,
    );
    let hands = MarkedHands {
        marked_frame: 5,
        visible: hands_visible,
        delay,
        released: released.clone(),
    };
    let options = PipelineOptions {
        recording_duration: window,
        ..PipelineOptions::default()
    };
    let pipeline = GesturePipeline::spawn(Box::new(hands), Box::new(NoPose), classifier, options)
        .expect("pipeline starts");

    Harness {
        pipeline,
        calls,
        last_input,
        released,
    }
}

fn frame(index: u64) -> Frame {
    Frame::new(RgbFrame::new(8, 8), index)
}

/// Feeds frames one at a time, waiting for each to be recorded
fn feed(pipeline: &GesturePipeline, count: u64) {
    for i in 0..count {
        let deadline = Instant::now() + Duration::from_secs(2);
        while !pipeline.submit(frame(i)) {
            assert!(Instant::now() < deadline, "frame {} never accepted", i);
            thread::sleep(Duration::from_millis(1));
        }
        while pipeline.recorded_frames() < (i + 1) as usize {
            assert!(Instant::now() < deadline, "frame {} never recorded", i);
            thread::sleep(Duration::from_millis(1));
        }
    }
}

#[test]
fn sparse_capture_is_padded_and_encoded() {
    let h = harness(vec![0.85, 0.15], true, Duration::from_secs(30), Duration::ZERO);
    h.pipeline.start_recording().expect("session starts");
    feed(&h.pipeline, 20);
    assert!(h.pipeline.stop_recording());

    let event = h.pipeline.wait_event(Duration::from_secs(2)).expect("event");
    assert!(matches!(event, PipelineEvent::Result { frames: 20, .. }));

    let tensor = h.last_input.lock().unwrap().clone().expect("engine saw input");
    assert_eq!(tensor.byte_len(), 30960);

    let grid = decode(tensor.as_bytes()).expect("full grid");
    assert_eq!(grid.len(), MAX_FRAMES);
    for (i, row) in grid.iter().enumerate() {
        assert_eq!(row.len(), NUM_KEYPOINTS);
        if i == 5 {
            assert_eq!(&row[RIGHT_HAND_OFFSET..RIGHT_HAND_OFFSET + 3], &[0.9, 0.1, 0.0]);
            assert!(row[RIGHT_HAND_OFFSET + 3..].iter().all(|&v| v == 0.0));
        } else {
            assert!(row.iter().all(|&v| v == 0.0), "frame {} not zero", i);
        }
    }
}

#[test]
fn expired_window_without_hands_skips_classifier() {
    let h = harness(vec![0.85, 0.15], false, Duration::from_millis(60), Duration::ZERO);
    h.pipeline.start_recording().expect("session starts");
    for i in 0..5 {
        h.pipeline.submit(frame(i));
        thread::sleep(Duration::from_millis(5));
    }

    let event = h.pipeline.wait_event(Duration::from_secs(2)).expect("event");
    assert_eq!(event, PipelineEvent::NoGesture { session: 1 });
    assert!(!h.pipeline.is_recording());
    assert_eq!(h.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn confident_and_uncertain_predictions() {
    let h = harness(vec![0.85, 0.15], true, Duration::from_secs(30), Duration::ZERO);
    h.pipeline.start_recording();
    feed(&h.pipeline, 3);
    h.pipeline.stop_recording();
    match h.pipeline.wait_event(Duration::from_secs(2)) {
        Some(PipelineEvent::Result { result, .. }) => {
            assert_eq!(result.class_index, 0);
            assert_eq!(result.label, "Obrigado");
            assert_eq!(result.confidence, 0.85);
        }
        other => panic!("unexpected {:?}", other),
    }

    let h = harness(vec![0.55, 0.45], true, Duration::from_secs(30), Duration::ZERO);
    h.pipeline.start_recording();
    feed(&h.pipeline, 3);
    h.pipeline.stop_recording();
    match h.pipeline.wait_event(Duration::from_secs(2)) {
        Some(PipelineEvent::Result { result, .. }) => {
            assert_eq!(result.class_index, 1);
            assert_eq!(result.label, "Nada");
            assert!(result.uncertain);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn manual_stop_beats_deadline_once() {
    let h = harness(vec![0.85, 0.15], true, Duration::from_millis(150), Duration::ZERO);
    h.pipeline.start_recording();
    feed(&h.pipeline, 2);
    assert!(h.pipeline.stop_recording());
    assert!(!h.pipeline.stop_recording());

    assert!(h.pipeline.wait_event(Duration::from_secs(2)).is_some());
    // the cancelled deadline must not produce a second outcome
    assert!(h.pipeline.wait_event(Duration::from_millis(300)).is_none());
    assert_eq!(h.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn busy_worker_drops_frames() {
    let h = harness(vec![0.85, 0.15], true, Duration::from_secs(30), Duration::from_millis(40));
    let mut accepted = 0;
    for i in 0..20 {
        if h.pipeline.submit(frame(i)) {
            accepted += 1;
        }
    }
    assert!(accepted < 20);
    assert_eq!(h.pipeline.dropped_frames(), 20 - accepted);
}

#[test]
fn missing_model_reports_error_event() {
    let released = Arc::new(AtomicBool::new(false));
    let hands = MarkedHands {
        marked_frame: 0,
        visible: true,
        delay: Duration::ZERO,
        released: released.clone(),
    };
    let classifier = ClassifierAdapter::new(None, vec!["Obrigado".into(), "Nada".into()], 0.7, 1);
    let pipeline = GesturePipeline::spawn(
        Box::new(hands),
        Box::new(NoPose),
        classifier,
        PipelineOptions::default(),
    )
    .unwrap();

    pipeline.start_recording();
    feed(&pipeline, 1);
    pipeline.stop_recording();
    match pipeline.wait_event(Duration::from_secs(2)) {
        Some(PipelineEvent::Error { kind, .. }) => assert_eq!(kind, ErrorKind::ModelUnavailable),
        other => panic!("unexpected {:?}", other),
    }
    // a failed prediction still leaves the recorder ready for the next attempt
    assert!(!pipeline.is_recording());
    assert_eq!(pipeline.start_recording(), Some(2));
}

#[test]
fn shutdown_releases_engines() {
    let mut h = harness(vec![0.85, 0.15], true, Duration::from_secs(30), Duration::ZERO);
    h.pipeline.start_recording();
    feed(&h.pipeline, 1);
    h.pipeline.shutdown();
    assert!(h.released.load(Ordering::SeqCst));
    assert!(!h.pipeline.submit(frame(1)));
    assert!(!h.pipeline.is_recording());
}
