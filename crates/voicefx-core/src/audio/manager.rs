use crate::{
    Analyser, CoreResult, Recording,
    audio::{
        CaptureDevice, DEFAULT_FFT_SIZE, DEFAULT_MAX_DURATION, Effect, PendingRecording,
        PlaybackController, RecordingSession, SessionPhase, SignalEngine,
    },
};

use std::{sync::Arc, time::Duration};

use tracing::{debug, info, instrument};

/// Consumer-facing entry point: one recording session plus one playback
/// controller.
///
/// # Thread Safety
///
/// Recording operations take `&self` and may be called while a capture is
/// running in the background. Playback operations take `&mut self`; wrap the
/// manager in a mutex to share it between tasks.
pub struct AudioManager<D: CaptureDevice, E: SignalEngine> {
    session: RecordingSession<D>,
    playback: PlaybackController<E>,
}

impl<D: CaptureDevice, E: SignalEngine> AudioManager<D, E> {
    /// Creates an idle manager. No device is opened yet.
    pub fn new(device: D, engine: E) -> Self {
        info!("AudioManager initialized");
        Self {
            session: RecordingSession::new(Arc::new(device)),
            playback: PlaybackController::new(Arc::new(engine)),
        }
    }

    /// Acquires the microphone stream.
    ///
    /// # Errors
    ///
    /// Returns a recoverable permission or device error; retrying is safe.
    pub async fn request_permission(&self) -> CoreResult<()> {
        self.session.request_permission().await
    }

    /// Starts a recording that stops itself after `max_duration`
    /// (default [`DEFAULT_MAX_DURATION`]).
    ///
    /// # Errors
    ///
    /// Returns error if a recording is already active, the duration is zero,
    /// or the microphone cannot be opened.
    pub async fn start_recording(
        &self,
        max_duration: Option<Duration>,
    ) -> CoreResult<PendingRecording> {
        self.session
            .start_recording(max_duration.unwrap_or(DEFAULT_MAX_DURATION))
            .await
    }

    /// Stops the active recording; no-op otherwise.
    pub fn stop_recording(&self) {
        self.session.stop_recording();
    }

    /// Plays `recording` with `effect`, replacing any current playback.
    ///
    /// # Errors
    ///
    /// Returns error if the audio cannot be decoded or the engine fails.
    pub async fn play_with_effect(&mut self, recording: &Recording, effect: Effect) -> CoreResult<()> {
        self.playback.play_with_effect(recording, effect).await
    }

    /// Stops the current playback; no-op otherwise.
    pub fn stop_playback(&mut self) {
        self.playback.stop_playback();
    }

    /// Analysis tap of the current playback.
    pub fn get_analyser(&self) -> Option<Analyser> {
        self.playback.get_analyser()
    }

    /// Whether a capture is in progress.
    pub fn is_recording(&self) -> bool {
        self.session.is_recording()
    }

    /// Whether playback is producing audio.
    pub fn is_playing(&self) -> bool {
        self.playback.is_playing()
    }

    /// Current recording phase.
    pub fn recording_phase(&self) -> SessionPhase {
        self.session.phase()
    }

    /// Effect of the current playback.
    pub fn current_effect(&self) -> Option<Effect> {
        self.playback.current_effect()
    }

    /// Creates a tap on the raw microphone stream.
    ///
    /// Returns `Ok(None)` when no stream is held. The tap is not tracked;
    /// dropping it detaches it.
    ///
    /// # Errors
    ///
    /// Returns error if the device cannot attach the tap.
    #[instrument(skip(self))]
    pub fn create_recording_analyser(&self) -> CoreResult<Option<Analyser>> {
        let Some(stream) = self.session.stream() else {
            debug!("No input stream held, no recording analyser");
            return Ok(None);
        };

        let analyser = Analyser::new(DEFAULT_FFT_SIZE)?;
        self.session.device().attach_analyser(&stream, &analyser)?;
        Ok(Some(analyser))
    }
}
