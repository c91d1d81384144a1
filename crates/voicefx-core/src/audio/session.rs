//! Recording session state machine.
//!
//! ```text
//! Idle -> AwaitingPermission -> Recording -> Finalizing -> Idle
//! ```
//!
//! One session owns at most one capture at a time. The explicit stop and
//! the auto-stop timer both go through the same stop path, and the capture
//! device emits a single stop event, so each recording is delivered once.

use crate::{
    AudioError, CaptureDevice, CaptureEvent, ColorAllocator, CoreResult, Recording, RecordingId,
};

use std::{
    panic::Location,
    sync::{Arc, Mutex, MutexGuard, Weak},
    time::Duration,
};

use error_location::ErrorLocation;
use tokio::{
    sync::{mpsc, oneshot},
    task::AbortHandle,
    time::Instant,
};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Recording length after which capture stops on its own.
pub const DEFAULT_MAX_DURATION: Duration = Duration::from_millis(15_000);

/// Where a session is in its recording cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Ready to record.
    Idle,
    /// Waiting for the platform to grant microphone access.
    AwaitingPermission {
        /// Attempt being started.
        session_id: Uuid,
    },
    /// Capturing audio.
    Recording {
        /// Attempt in progress.
        session_id: Uuid,
        /// When capture began.
        started_at: Instant,
    },
    /// Stop requested, waiting for the device's stop event.
    Finalizing {
        /// Attempt being finalized.
        session_id: Uuid,
        /// When capture began.
        started_at: Instant,
    },
}

impl SessionPhase {
    /// Attempt id for every phase except [`SessionPhase::Idle`].
    pub fn session_id(&self) -> Option<Uuid> {
        match self {
            SessionPhase::Idle => None,
            SessionPhase::AwaitingPermission { session_id }
            | SessionPhase::Recording { session_id, .. }
            | SessionPhase::Finalizing { session_id, .. } => Some(*session_id),
        }
    }
}

/// Completion of a started recording; resolves exactly once.
#[derive(Debug)]
pub struct PendingRecording {
    session_id: Uuid,
    rx: oneshot::Receiver<Recording>,
}

impl PendingRecording {
    /// Attempt id, matches [`Recording::session_id`].
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Waits for the finished recording.
    ///
    /// # Errors
    ///
    /// Returns [`AudioError::RecordingAborted`] if the capture ended without
    /// producing a recording.
    pub async fn recv(self) -> CoreResult<Recording> {
        self.rx.await.map_err(|_| AudioError::RecordingAborted {
            location: ErrorLocation::from(Location::caller()),
        })
    }
}

/// Owns the microphone stream and the recording state machine.
pub struct RecordingSession<D: CaptureDevice> {
    device: Arc<D>,
    state: Arc<Mutex<SessionState<D>>>,
}

struct SessionState<D: CaptureDevice> {
    phase: SessionPhase,
    stream: Option<D::Stream>,
    capture: Option<D::Capture>,
    pending_chunks: Vec<Vec<u8>>,
    auto_stop: Option<AbortHandle>,
    on_complete: Option<oneshot::Sender<Recording>>,
    colors: ColorAllocator,
    last_id: u64,
}

impl<D: CaptureDevice> RecordingSession<D> {
    /// Creates an idle session with no stream.
    pub fn new(device: Arc<D>) -> Self {
        Self {
            device,
            state: Arc::new(Mutex::new(SessionState {
                phase: SessionPhase::Idle,
                stream: None,
                capture: None,
                pending_chunks: Vec::new(),
                auto_stop: None,
                on_complete: None,
                colors: ColorAllocator::new(),
                last_id: 0,
            })),
        }
    }

    /// Acquires the input stream and keeps it for later recordings.
    ///
    /// # Errors
    ///
    /// Returns the device's permission or availability error. The session
    /// state is left untouched so the call can be retried.
    #[instrument(skip(self))]
    pub async fn request_permission(&self) -> CoreResult<()> {
        match self.device.acquire_stream().await {
            Ok(stream) => {
                lock(&self.state).stream = Some(stream);
                info!("Microphone permission granted");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Microphone permission denied");
                Err(e)
            }
        }
    }

    /// Starts recording, acquiring the stream first if none is held.
    ///
    /// Capture stops automatically after `max_duration`.
    ///
    /// # Errors
    ///
    /// Returns [`AudioError::AlreadyRecording`] when the session is not idle,
    /// [`AudioError::InvalidDuration`] for a zero duration, or the
    /// permission error. Every failure leaves the session idle.
    #[instrument(skip(self))]
    pub async fn start_recording(&self, max_duration: Duration) -> CoreResult<PendingRecording> {
        if max_duration.is_zero() {
            return Err(AudioError::InvalidDuration {
                duration_ms: max_duration.as_millis(),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let session_id = Uuid::new_v4();

        let needs_stream = {
            let mut state = lock(&self.state);
            if state.phase != SessionPhase::Idle {
                warn!(phase = ?state.phase, "Recording already in progress");
                return Err(AudioError::AlreadyRecording {
                    location: ErrorLocation::from(Location::caller()),
                });
            }
            let needs_stream = state.stream.is_none();
            if needs_stream {
                // Reserve the session so a start during the prompt is rejected.
                state.phase = SessionPhase::AwaitingPermission { session_id };
            }
            needs_stream
        };

        if needs_stream && let Err(e) = self.request_permission().await {
            let mut state = lock(&self.state);
            if state.phase.session_id() == Some(session_id) {
                state.phase = SessionPhase::Idle;
            }
            return Err(e);
        }

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (complete_tx, complete_rx) = oneshot::channel();

        let mut state = lock(&self.state);
        match state.phase {
            SessionPhase::Idle => {}
            SessionPhase::AwaitingPermission { session_id: id } if id == session_id => {}
            _ => {
                return Err(AudioError::AlreadyRecording {
                    location: ErrorLocation::from(Location::caller()),
                });
            }
        }

        let Some(stream) = state.stream.clone() else {
            state.phase = SessionPhase::Idle;
            return Err(AudioError::DeviceUnavailable {
                reason: "Input stream released before capture".to_string(),
                location: ErrorLocation::from(Location::caller()),
            });
        };

        let capture = match self.device.begin_capture(&stream, events_tx) {
            Ok(capture) => capture,
            Err(e) => {
                state.phase = SessionPhase::Idle;
                error!(session_id = %session_id, error = %e, "Failed to begin capture");
                return Err(e);
            }
        };

        let started_at = Instant::now();
        state.pending_chunks.clear();
        state.capture = Some(capture);
        state.on_complete = Some(complete_tx);
        state.phase = SessionPhase::Recording {
            session_id,
            started_at,
        };

        tokio::spawn(collect_events(
            Arc::clone(&self.state),
            events_rx,
            session_id,
            self.device.media_type(),
        ));

        let timer = tokio::spawn(auto_stop(
            Arc::clone(&self.device),
            Arc::downgrade(&self.state),
            session_id,
            max_duration,
        ));
        state.auto_stop = Some(timer.abort_handle());
        drop(state);

        info!(
            session_id = %session_id,
            max_duration_ms = max_duration.as_millis(),
            "Recording started"
        );

        Ok(PendingRecording {
            session_id,
            rx: complete_rx,
        })
    }

    /// Stops the active recording. No-op when not recording.
    #[instrument(skip(self))]
    pub fn stop_recording(&self) {
        if stop_session(&*self.device, &self.state, None) {
            info!("Recording stop requested");
        }
    }

    /// Whether a capture is in progress.
    pub fn is_recording(&self) -> bool {
        matches!(lock(&self.state).phase, SessionPhase::Recording { .. })
    }

    /// Current phase of the recording cycle.
    pub fn phase(&self) -> SessionPhase {
        lock(&self.state).phase
    }

    /// Whether an input stream is held.
    pub fn has_stream(&self) -> bool {
        lock(&self.state).stream.is_some()
    }

    /// The held input stream, if any.
    pub fn stream(&self) -> Option<D::Stream> {
        lock(&self.state).stream.clone()
    }

    /// The capture device backing this session.
    pub fn device(&self) -> &D {
        &self.device
    }
}

impl<D: CaptureDevice> Drop for RecordingSession<D> {
    fn drop(&mut self) {
        if stop_session(&*self.device, &self.state, None) {
            debug!("Active capture ended on session drop");
        }
    }
}

/// Shared stop path for explicit stops, the timer and teardown.
///
/// With `only` set, the stop applies solely to that attempt. Returns whether
/// a capture was ended.
fn stop_session<D: CaptureDevice>(
    device: &D,
    state: &Mutex<SessionState<D>>,
    only: Option<Uuid>,
) -> bool {
    let capture = {
        let mut state = lock(state);

        if only.is_some() && state.phase.session_id() != only {
            return false;
        }

        if let Some(timer) = state.auto_stop.take() {
            timer.abort();
        }

        match state.phase {
            SessionPhase::Recording {
                session_id,
                started_at,
            } => {
                state.phase = SessionPhase::Finalizing {
                    session_id,
                    started_at,
                };
                state.capture.take()
            }
            _ => None,
        }
    };

    match capture {
        Some(capture) => {
            device.end_capture(capture);
            true
        }
        None => false,
    }
}

async fn auto_stop<D: CaptureDevice>(
    device: Arc<D>,
    state: Weak<Mutex<SessionState<D>>>,
    session_id: Uuid,
    after: Duration,
) {
    tokio::time::sleep(after).await;

    if let Some(state) = state.upgrade()
        && stop_session(&*device, &state, Some(session_id))
    {
        info!(
            session_id = %session_id,
            max_duration_ms = after.as_millis(),
            "Maximum duration reached, recording stopped"
        );
    }
}

/// Appends chunks in arrival order, then finalizes on the stop event.
///
/// A channel closed without a stop event counts as a stop.
async fn collect_events<D: CaptureDevice>(
    state: Arc<Mutex<SessionState<D>>>,
    mut events: mpsc::UnboundedReceiver<CaptureEvent>,
    session_id: Uuid,
    media_type: &'static str,
) {
    while let Some(event) = events.recv().await {
        match event {
            CaptureEvent::Chunk(chunk) if chunk.is_empty() => {}
            CaptureEvent::Chunk(chunk) => {
                lock(&state).pending_chunks.push(chunk);
            }
            CaptureEvent::Stopped => break,
        }
    }

    finalize(&state, session_id, media_type);
}

fn finalize<D: CaptureDevice>(
    state: &Mutex<SessionState<D>>,
    session_id: Uuid,
    media_type: &'static str,
) {
    let (recording, on_complete) = {
        let mut state = lock(state);

        let started_at = match state.phase {
            SessionPhase::Recording {
                session_id: id,
                started_at,
            }
            | SessionPhase::Finalizing {
                session_id: id,
                started_at,
            } if id == session_id => started_at,
            _ => {
                debug!(session_id = %session_id, "Ignoring stop event for inactive session");
                return;
            }
        };

        if let Some(timer) = state.auto_stop.take() {
            timer.abort();
        }
        state.capture = None;

        let chunks = std::mem::take(&mut state.pending_chunks);
        let audio = chunks.concat();

        state.last_id += 1;
        let id = RecordingId(state.last_id);
        let color = state.colors.next_color();
        state.phase = SessionPhase::Idle;

        let recording = Recording::new(
            id,
            session_id,
            audio,
            media_type,
            color,
            started_at.elapsed(),
        );
        (recording, state.on_complete.take())
    };

    if recording.audio_data().is_empty() {
        warn!(session_id = %session_id, "Recording finished with no audio data");
    }

    info!(
        session_id = %session_id,
        recording_id = %recording.id(),
        bytes = recording.audio_data().len(),
        color = %recording.color(),
        duration_ms = recording.duration().as_millis(),
        "Recording finalized"
    );

    match on_complete {
        Some(tx) => {
            if tx.send(recording).is_err() {
                debug!(session_id = %session_id, "Recording receiver dropped");
            }
        }
        None => warn!(session_id = %session_id, "No completion receiver for recording"),
    }
}

fn lock<D: CaptureDevice>(state: &Mutex<SessionState<D>>) -> MutexGuard<'_, SessionState<D>> {
    state.lock().unwrap_or_else(|e| {
        error!("Session state lock poisoned, recovering: {}", e);
        e.into_inner()
    })
}
