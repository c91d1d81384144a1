mod analyser;
mod capture;
pub(crate) mod cpal_capture;
mod effect;
mod engine;
mod manager;
mod playback;
pub(crate) mod render;
pub(crate) mod resampler;
mod session;

pub(crate) use analyser::WeakAnalyser;

pub use {
    analyser::{Analyser, DEFAULT_FFT_SIZE},
    capture::{CaptureDevice, CaptureEvent},
    cpal_capture::{CpalCapture, CpalCaptureDevice, LiveInput, WAV_MEDIA_TYPE},
    effect::{DEFAULT_BPM, Effect, Endpoint, ParseEffectError, Topology, eighth_note_secs},
    engine::{NodeId, NodeSpec, PlayerState, SignalEngine},
    manager::AudioManager,
    playback::PlaybackController,
    render::{DEFAULT_SAMPLE_RATE, DecodedBuffer, RenderEngine, RenderGraph},
    session::{DEFAULT_MAX_DURATION, PendingRecording, RecordingSession, SessionPhase},
};
