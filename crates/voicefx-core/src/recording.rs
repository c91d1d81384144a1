use crate::Color;

use std::{fmt, sync::Arc, time::Duration};

use uuid::Uuid;

/// Opaque, monotonically increasing recording identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordingId(pub(crate) u64);

impl RecordingId {
    /// Raw counter value.
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RecordingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rec-{}", self.0)
    }
}

/// A finished voice clip.
///
/// Produced once at the end of a successful recording session and never
/// mutated afterwards. Cloning shares the encoded audio.
#[derive(Debug, Clone)]
pub struct Recording {
    id: RecordingId,
    session_id: Uuid,
    audio_data: Arc<[u8]>,
    media_type: &'static str,
    color: Color,
    duration: Duration,
}

impl Recording {
    pub(crate) fn new(
        id: RecordingId,
        session_id: Uuid,
        audio_data: Vec<u8>,
        media_type: &'static str,
        color: Color,
        duration: Duration,
    ) -> Self {
        Self {
            id,
            session_id,
            audio_data: audio_data.into(),
            media_type,
            color,
            duration,
        }
    }

    /// Recording identifier.
    pub fn id(&self) -> RecordingId {
        self.id
    }

    /// Session that produced this recording, for log correlation.
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Encoded audio in the capture device's container format.
    pub fn audio_data(&self) -> &[u8] {
        &self.audio_data
    }

    /// Container media type, e.g. `audio/wav`.
    pub fn media_type(&self) -> &'static str {
        self.media_type
    }

    /// Display color assigned at creation.
    pub fn color(&self) -> Color {
        self.color
    }

    /// Wall-clock time spent capturing.
    pub fn duration(&self) -> Duration {
        self.duration
    }
}
