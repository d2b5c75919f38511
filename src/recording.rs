//! Bounded recording window.
//!
//! `RecordingBuffer` is the plain Idle/Recording state machine. `Recorder` shares
//! it between the frame worker and the control side and arms the deadline
//! that ends a session on its own.

use std::sync::{mpsc, Arc, Mutex, MutexGuard, Weak};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::types::{FeatureVector, FrameSequence};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingState {
    Idle,
    Recording,
}

#[derive(Debug)]
pub struct RecordingBuffer {
    state: RecordingState,
    frames: FrameSequence,
    session: u64,
    started_at: Option<Instant>,
}

impl RecordingBuffer {
    pub fn new() -> Self {
        Self {
            state: RecordingState::Idle,
            frames: Vec::new(),
            session: 0,
            started_at: None,
        }
    }

    pub fn state(&self) -> RecordingState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state == RecordingState::Recording
    }

    /// Id of the current (or last) session
    pub fn session(&self) -> u64 {
        self.session
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Idle -> Recording. Returns the new session id, or `None` when a session
    /// is already running.
    pub fn start(&mut self) -> Option<u64> {
        if self.is_recording() {
            return None;
        }
        self.frames.clear();
        self.session += 1;
        self.state = RecordingState::Recording;
        self.started_at = Some(Instant::now());
        Some(self.session)
    }

    /// Appends while recording, ignored while idle.
    pub fn append(&mut self, vector: FeatureVector) -> bool {
        if !self.is_recording() {
            return false;
        }
        self.frames.push(vector);
        true
    }

    /// Recording -> Idle, handing over the captured frames. Idle yields an
    /// empty sequence, so a second stop never delivers the same frames twice.
    pub fn stop(&mut self) -> FrameSequence {
        if !self.is_recording() {
            return Vec::new();
        }
        self.state = RecordingState::Idle;
        if let Some(started) = self.started_at.take() {
            debug!(
                session = self.session,
                frames = self.frames.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "recording stopped"
            );
        }
        std::mem::take(&mut self.frames)
    }

    /// Id of the running session, `None` while idle
    pub fn active_session(&self) -> Option<u64> {
        self.is_recording().then_some(self.session)
    }

    /// Appends only if `session` is still the running one.
    pub fn append_to(&mut self, session: u64, vector: FeatureVector) -> bool {
        if self.active_session() != Some(session) {
            return false;
        }
        self.frames.push(vector);
        true
    }

    /// Stops only if `session` is still the running one.
    pub fn stop_session(&mut self, session: u64) -> Option<FrameSequence> {
        if self.is_recording() && self.session == session {
            Some(self.stop())
        } else {
            None
        }
    }
}

impl Default for RecordingBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Manual,
    Deadline,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::Manual => "manual",
            StopReason::Deadline => "deadline",
        }
    }
}

/// Frames of one finished session, handed to the classification side
#[derive(Debug)]
pub struct Capture {
    pub session: u64,
    pub frames: FrameSequence,
    pub reason: StopReason,
}

struct Shared {
    buffer: RecordingBuffer,
    /// Dropping this sender cancels the armed deadline
    cancel: Option<mpsc::Sender<()>>,
    handoff: mpsc::Sender<Capture>,
}

impl Shared {
    /// Ends `session` without a hand-off.
    fn abort(&mut self, session: u64) -> bool {
        if self.buffer.stop_session(session).is_none() {
            return false;
        }
        self.cancel = None;
        true
    }

    fn finish(&mut self, session: u64, reason: StopReason) -> bool {
        let Some(frames) = self.buffer.stop_session(session) else {
            return false;
        };
        self.cancel = None;
        info!(session, frames = frames.len(), ?reason, "recording finished");
        // Sent under the lock so captures leave in session order.
        let _ = self.handoff.send(Capture {
            session,
            frames,
            reason,
        });
        true
    }
}

/// Thread-safe handle to the recording buffer.
///
/// Every completed session is delivered exactly once on the hand-off channel,
/// whether it ended by `stop()` or by the deadline.
#[derive(Clone)]
pub struct Recorder {
    shared: Arc<Mutex<Shared>>,
    duration: Duration,
}

impl Recorder {
    pub fn new(duration: Duration, handoff: mpsc::Sender<Capture>) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared {
                buffer: RecordingBuffer::new(),
                cancel: None,
                handoff,
            })),
            duration,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn is_recording(&self) -> bool {
        self.lock().buffer.is_recording()
    }

    pub fn frame_count(&self) -> usize {
        self.lock().buffer.len()
    }

    pub fn start(&self) -> Option<u64> {
        let mut shared = self.lock();
        let session = shared.buffer.start()?;

        let (cancel_tx, cancel_rx) = mpsc::channel::<()>();
        shared.cancel = Some(cancel_tx);
        drop(shared);

        let weak = Arc::downgrade(&self.shared);
        let duration = self.duration;
        let spawned = thread::Builder::new()
            .name(format!("recording-deadline-{}", session))
            .spawn(move || deadline(weak, cancel_rx, session, duration));
        if let Err(e) = spawned {
            // every session is bounded by its deadline
            warn!(session, "failed to arm recording deadline, not recording: {}", e);
            self.lock().abort(session);
            return None;
        }

        info!(session, duration_ms = duration.as_millis() as u64, "recording started");
        Some(session)
    }

    pub fn append(&self, vector: FeatureVector) -> bool {
        self.lock().buffer.append(vector)
    }

    pub fn active_session(&self) -> Option<u64> {
        self.lock().buffer.active_session()
    }

    /// Appends to `session` only; a frame that outlived its session is dropped.
    pub fn append_to(&self, session: u64, vector: FeatureVector) -> bool {
        self.lock().buffer.append_to(session, vector)
    }

    /// Ends the running session. Returns `false` when there was nothing to stop,
    /// including when the deadline already won.
    pub fn stop(&self) -> bool {
        let mut shared = self.lock();
        let session = shared.buffer.session();
        shared.finish(session, StopReason::Manual)
    }
}

fn deadline(shared: Weak<Mutex<Shared>>, cancel: mpsc::Receiver<()>, session: u64, duration: Duration) {
    match cancel.recv_timeout(duration) {
        Err(mpsc::RecvTimeoutError::Timeout) => {
            let Some(shared) = shared.upgrade() else {
                return;
            };
            let mut guard = shared.lock().unwrap_or_else(|e| e.into_inner());
            if guard.finish(session, StopReason::Deadline) {
                debug!(session, "recording window expired");
            }
        }
        // cancelled by stop() or the recorder went away
        _ => {}
    }
}
