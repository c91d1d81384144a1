use crate::config::{
    DEFAULT_METER_WIDTH, DEFAULT_REFRESH_MS, DEFAULT_VISUALIZER_ENABLED, default_meter_width,
    default_refresh_ms, default_visualizer_enabled,
};

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Level meter configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisualizerConfig {
    /// Whether the meter starts enabled.
    #[serde(default = "default_visualizer_enabled")]
    pub enabled: bool,
    /// Redraw interval in milliseconds.
    #[serde(default = "default_refresh_ms")]
    pub refresh_ms: u64,
    /// Bar width in terminal columns.
    #[serde(default = "default_meter_width")]
    pub width: usize,
}

impl VisualizerConfig {
    /// Redraw interval as a [`Duration`].
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_ms)
    }
}

impl Default for VisualizerConfig {
    fn default() -> Self {
        Self {
            enabled: DEFAULT_VISUALIZER_ENABLED,
            refresh_ms: DEFAULT_REFRESH_MS,
            width: DEFAULT_METER_WIDTH,
        }
    }
}
