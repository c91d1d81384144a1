mod playback_config;
#[allow(clippy::module_inception)]
mod config;
mod recording_config;
mod visualizer_config;

pub(crate) use {
    config::Config, playback_config::PlaybackConfig, recording_config::RecordingConfig,
    visualizer_config::VisualizerConfig,
};

pub(crate) const DEFAULT_MAX_DURATION_MS: u64 = 15_000;
pub(crate) const DEFAULT_VISUALIZER_ENABLED: bool = true;
pub(crate) const DEFAULT_REFRESH_MS: u64 = 33;
pub(crate) const DEFAULT_METER_WIDTH: usize = 40;

pub(crate) fn default_max_duration_ms() -> u64 {
    DEFAULT_MAX_DURATION_MS
}

pub(crate) fn default_visualizer_enabled() -> bool {
    DEFAULT_VISUALIZER_ENABLED
}

pub(crate) fn default_refresh_ms() -> u64 {
    DEFAULT_REFRESH_MS
}

pub(crate) fn default_meter_width() -> usize {
    DEFAULT_METER_WIDTH
}
