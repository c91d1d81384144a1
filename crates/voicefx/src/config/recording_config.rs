use crate::config::{DEFAULT_MAX_DURATION_MS, default_max_duration_ms};

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Recording configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingConfig {
    /// Capture stops on its own after this many milliseconds.
    #[serde(default = "default_max_duration_ms")]
    pub max_duration_ms: u64,
}

impl RecordingConfig {
    /// Maximum duration as a [`Duration`].
    pub fn max_duration(&self) -> Duration {
        Duration::from_millis(self.max_duration_ms)
    }
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            max_duration_ms: DEFAULT_MAX_DURATION_MS,
        }
    }
}
