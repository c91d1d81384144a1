//! VoiceFx Core Library
//!
//! Records short voice clips from the microphone and plays them back
//! through a small set of effects (chipmunk, monster, echo), exposing an
//! analysis tap for live visualization.
//!
//! The microphone and the audio graph engine are collaborators behind the
//! [`CaptureDevice`] and [`SignalEngine`] traits; [`CpalCaptureDevice`] and
//! [`RenderEngine`] are the bundled implementations.
//!
//! # Example
//!
//! ```no_run
//! use voicefx_core::{AudioManager, CoreResult, CpalCaptureDevice, Effect, RenderEngine};
//!
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> CoreResult<()> {
//!     let mut manager = AudioManager::new(CpalCaptureDevice::new(), RenderEngine::new());
//!
//!     let pending = manager.start_recording(Some(Duration::from_secs(3))).await?;
//!     let recording = pending.recv().await?;
//!
//!     manager.play_with_effect(&recording, Effect::Chipmunk).await?;
//!     Ok(())
//! }
//! ```

mod audio;
mod color;
mod error;
mod recording;

pub use {
    audio::{
        Analyser, AudioManager, CaptureDevice, CaptureEvent, CpalCapture, CpalCaptureDevice,
        DEFAULT_BPM, DEFAULT_FFT_SIZE, DEFAULT_MAX_DURATION, DEFAULT_SAMPLE_RATE, DecodedBuffer,
        Effect, Endpoint, LiveInput, NodeId, NodeSpec, ParseEffectError, PendingRecording,
        PlaybackController, PlayerState, RecordingSession, RenderEngine, RenderGraph,
        SessionPhase, SignalEngine, Topology, WAV_MEDIA_TYPE, eighth_note_secs,
    },
    color::{Color, ColorAllocator, PALETTE},
    error::AudioError,
    error::Result as CoreResult,
    recording::{Recording, RecordingId},
};

#[cfg(test)]
mod tests;
