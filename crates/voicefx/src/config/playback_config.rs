use serde::{Deserialize, Serialize};
use voicefx_core::Effect;

/// Playback configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Effect used when `play` is given none.
    #[serde(default)]
    pub default_effect: Effect,
}
