//! Single-line level meter drawn from an analysis tap.

use crate::{AppResult, config::VisualizerConfig};

use std::sync::Arc;

use tokio::{
    io::{AsyncWriteExt, Stdout},
    sync::{Mutex, watch},
    time::MissedTickBehavior,
};
use tracing::{debug, info, instrument};
use voicefx_core::{Analyser, AudioManager, CaptureDevice, Color, SignalEngine};

const FLOOR_DB: f32 = -60.0;

/// What a [`MeterTap`] is listening to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapSource {
    /// The microphone during a capture.
    Recording,
    /// The output of the current playback.
    Playback,
}

/// Tap the meter currently follows.
#[derive(Clone)]
pub struct MeterTap {
    /// Source of the level readings.
    pub analyser: Analyser,
    /// Text shown before the bar.
    pub label: String,
    /// Bar color, if any.
    pub color: Option<Color>,
    /// Whether this follows the microphone or the playback output.
    pub source: TapSource,
}

impl MeterTap {
    /// Tap on the microphone of the active capture.
    pub fn recording(analyser: Analyser) -> Self {
        Self {
            analyser,
            label: "recording".to_string(),
            color: None,
            source: TapSource::Recording,
        }
    }

    /// Tap on the output of a playback.
    pub fn playback(analyser: Analyser, label: String, color: Color) -> Self {
        Self {
            analyser,
            label,
            color: Some(color),
            source: TapSource::Playback,
        }
    }
}

/// Drops a published recording tap so its analyser detaches from the input.
///
/// A playback tap published since is left alone. Returns whether a tap was
/// released.
pub fn release_recording_tap(tap_tx: &watch::Sender<Option<MeterTap>>) -> bool {
    tap_tx.send_if_modified(|tap| {
        let recording = matches!(tap, Some(t) if t.source == TapSource::Recording);
        if recording {
            *tap = None;
        }
        recording
    })
}

/// Renders an RMS level as a text bar.
#[derive(Debug, Clone, Copy)]
pub struct LevelMeter {
    width: usize,
}

impl LevelMeter {
    /// Meter `width` columns wide.
    pub fn new(width: usize) -> Self {
        Self { width }
    }

    /// Level in dBFS, clamped to the meter floor.
    pub fn level_db(rms: f32) -> f32 {
        if rms <= 0.0 || !rms.is_finite() {
            return FLOOR_DB;
        }
        (20.0 * rms.log10()).clamp(FLOOR_DB, 0.0)
    }

    /// Number of lit columns for `rms`.
    pub fn filled(&self, rms: f32) -> usize {
        let fraction = (Self::level_db(rms) - FLOOR_DB) / -FLOOR_DB;
        ((fraction * self.width as f32).round() as usize).min(self.width)
    }

    /// One meter line, e.g. `rec-1 [#####     ]  -12.0 dB`.
    pub fn render(&self, rms: f32, label: &str, color: Option<Color>) -> String {
        let filled = self.filled(rms);
        let lit = "#".repeat(filled);
        let unlit = " ".repeat(self.width - filled);
        let bar = match color {
            Some(color) => {
                let (r, g, b) = color.rgb();
                format!("\x1b[38;2;{};{};{}m{}\x1b[0m{}", r, g, b, lit, unlit)
            }
            None => format!("{}{}", lit, unlit),
        };
        format!("{} [{}] {:>6.1} dB", label, bar, Self::level_db(rms))
    }
}

/// Periodically redraws the meter while audio is active.
pub struct Visualizer<D: CaptureDevice, E: SignalEngine> {
    audio_manager: Arc<Mutex<AudioManager<D, E>>>,
    config: VisualizerConfig,
    tap_rx: watch::Receiver<Option<MeterTap>>,
    enabled_rx: watch::Receiver<bool>,
}

impl<D: CaptureDevice, E: SignalEngine> Visualizer<D, E> {
    /// Create a visualizer following the tap published on `tap_rx`.
    pub fn new(
        audio_manager: Arc<Mutex<AudioManager<D, E>>>,
        config: VisualizerConfig,
        tap_rx: watch::Receiver<Option<MeterTap>>,
        enabled_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            audio_manager,
            config,
            tap_rx,
            enabled_rx,
        }
    }

    /// Run until a shutdown signal is received.
    ///
    /// # Errors
    ///
    /// Returns error if the terminal cannot be written.
    #[instrument(skip(self, shutdown_rx))]
    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) -> AppResult<()> {
        let meter = LevelMeter::new(self.config.width);
        let mut stdout = tokio::io::stdout();
        let mut ticker = tokio::time::interval(self.config.refresh_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut drawn = false;

        info!(refresh_ms = self.config.refresh_ms, "Visualizer started");

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    break;
                }
                _ = ticker.tick() => {
                    let line = self.current_line(&meter);
                    match line {
                        Some(line) => {
                            draw(&mut stdout, &format!("\r{}", line)).await?;
                            drawn = true;
                        }
                        None if drawn => {
                            clear(&mut stdout).await?;
                            drawn = false;
                        }
                        None => {}
                    }
                }
            }
        }

        if drawn {
            clear(&mut stdout).await?;
        }
        debug!("Visualizer stopped");

        Ok(())
    }

    /// Meter line for this tick, or `None` when nothing should be drawn.
    fn current_line(&self, meter: &LevelMeter) -> Option<String> {
        if !*self.enabled_rx.borrow() {
            return None;
        }

        // Skip the tick rather than wait while a command holds the manager.
        let active = {
            let manager = self.audio_manager.try_lock().ok()?;
            manager.is_playing() || manager.is_recording()
        };
        if !active {
            return None;
        }

        let tap = self.tap_rx.borrow();
        let tap = tap.as_ref()?;
        Some(meter.render(tap.analyser.rms(), &tap.label, tap.color))
    }
}

async fn draw(stdout: &mut Stdout, text: &str) -> AppResult<()> {
    stdout.write_all(text.as_bytes()).await?;
    stdout.flush().await?;
    Ok(())
}

async fn clear(stdout: &mut Stdout) -> AppResult<()> {
    draw(stdout, "\r\x1b[2K").await
}
