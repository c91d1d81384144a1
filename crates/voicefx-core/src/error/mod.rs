use error_location::ErrorLocation;
use thiserror::Error;

/// Audio capture and playback errors with source location tracking.
#[derive(Error, Debug)]
pub enum AudioError {
    /// Access to the input device was refused or the stream could not start.
    #[error("Microphone permission denied: {reason} {location}")]
    PermissionDenied {
        /// Description of the refusal.
        reason: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// No usable audio hardware was found.
    #[error("Audio device unavailable: {reason} {location}")]
    DeviceUnavailable {
        /// Description of the missing device.
        reason: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// A recording is already in progress.
    #[error("Recording already in progress {location}")]
    AlreadyRecording {
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// Maximum recording duration must be positive.
    #[error("Invalid maximum recording duration: {duration_ms}ms {location}")]
    InvalidDuration {
        /// Rejected duration in milliseconds.
        duration_ms: u128,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// Recorded audio could not be decoded into samples.
    #[error("Failed to decode audio: {reason} {location}")]
    DecodeFailure {
        /// Description of the decode failure.
        reason: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// Signal processing engine operation failed.
    #[error("Engine error: {reason} {location}")]
    EngineError {
        /// Description of the engine failure.
        reason: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// Analyser transform size is not a power of two in 32..=32768.
    #[error("Invalid analyser FFT size: {fft_size} {location}")]
    InvalidAnalyserSize {
        /// Rejected transform size.
        fft_size: usize,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// The session ended before the recording was delivered.
    #[error("Recording aborted before completion {location}")]
    RecordingAborted {
        /// Source location where error occurred.
        location: ErrorLocation,
    },
}

impl AudioError {
    /// Whether the caller can simply retry the operation.
    ///
    /// Permission, device and concurrent-start failures are expected
    /// operational outcomes; the system is left idle and usable.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AudioError::PermissionDenied { .. }
                | AudioError::DeviceUnavailable { .. }
                | AudioError::AlreadyRecording { .. }
        )
    }
}

/// Result type alias using [`AudioError`].
pub type Result<T> = std::result::Result<T, AudioError>;
