use crate::{
    AppCommand, AppError, AppResult, MeterTap, app_command::HELP_TEXT, config::Config,
    visualizer::release_recording_tap,
};

use std::{panic::Location, sync::Arc};

use error_location::ErrorLocation;
use tokio::sync::{Mutex, mpsc, watch};
use tracing::{debug, error, info, instrument, warn};
use voicefx_core::{AudioManager, CoreResult, CpalCaptureDevice, Effect, Recording, RenderEngine};

/// Audio manager wired to the system microphone and speakers.
pub type Manager = AudioManager<CpalCaptureDevice, RenderEngine>;

/// Main application state.
///
/// Owns the in-memory recording list and executes commands one at a time.
/// Recording completion arrives as [`AppCommand::RecordingFinished`] from a
/// background task, so the loop never blocks on an active capture.
pub struct App {
    pub(crate) audio_manager: Arc<Mutex<Manager>>,
    pub(crate) config: Config,
    pub(crate) recordings: Vec<Recording>,
    pub(crate) command_tx: mpsc::Sender<AppCommand>,
    pub(crate) command_rx: mpsc::Receiver<AppCommand>,
    pub(crate) shutdown_tx: watch::Sender<bool>,
    pub(crate) meter_tap: watch::Sender<Option<MeterTap>>,
    pub(crate) meter_enabled: watch::Sender<bool>,
}

impl App {
    /// Run the main application event loop.
    #[instrument(skip(self))]
    pub(crate) async fn run(mut self) -> AppResult<()> {
        info!("VoiceFx starting");
        println!("voicefx ready, type 'help' for commands");

        while let Some(cmd) = self.command_rx.recv().await {
            if matches!(cmd, AppCommand::Quit) {
                info!("Shutdown requested");
                break;
            }

            if let Err(e) = self.handle(cmd).await {
                if e.is_recoverable() {
                    warn!(error = ?e, "Command failed");
                } else {
                    error!(error = ?e, "Command failed");
                }
                println!("error: {}", e.summary());
            }
        }

        self.shutdown().await;

        let _ = self.shutdown_tx.send(true);
        info!("VoiceFx shut down successfully");

        Ok(())
    }

    async fn handle(&mut self, cmd: AppCommand) -> AppResult<()> {
        match cmd {
            AppCommand::Record => self.record().await,
            AppCommand::Stop => {
                self.stop().await;
                Ok(())
            }
            AppCommand::Play { index, effect } => self.play(index, effect).await,
            AppCommand::Halt => {
                self.audio_manager.lock().await.stop_playback();
                Ok(())
            }
            AppCommand::List => {
                self.list();
                Ok(())
            }
            AppCommand::Meter => {
                self.toggle_meter();
                Ok(())
            }
            AppCommand::Help => {
                println!("{}", HELP_TEXT);
                Ok(())
            }
            AppCommand::RecordingFinished(result) => self.recording_finished(result),
            AppCommand::Quit => Ok(()),
        }
    }

    /// Start a recording and hand its completion to a background task.
    #[instrument(skip(self))]
    async fn record(&mut self) -> AppResult<()> {
        let max_duration = self.config.max_duration();

        let (pending, tap) = {
            let manager = self.audio_manager.lock().await;
            let pending = manager.start_recording(Some(max_duration)).await?;
            (pending, manager.create_recording_analyser()?)
        };

        if let Some(analyser) = tap {
            self.meter_tap.send_replace(Some(MeterTap::recording(analyser)));
        }

        let session_id = pending.session_id();
        let command_tx = self.command_tx.clone();
        tokio::spawn(async move {
            let result = pending.recv().await;
            if command_tx
                .send(AppCommand::RecordingFinished(result))
                .await
                .is_err()
            {
                warn!(session_id = %session_id, "Recording finished after shutdown");
            }
        });

        info!(
            session_id = %session_id,
            max_duration_ms = max_duration.as_millis(),
            "Recording started"
        );
        println!(
            "recording (stops after {:.1} s, type 'stop' to finish)",
            max_duration.as_secs_f32()
        );

        Ok(())
    }

    async fn stop(&self) {
        let manager = self.audio_manager.lock().await;
        if !manager.is_recording() {
            println!("not recording");
            return;
        }
        manager.stop_recording();
    }

    #[track_caller]
    fn recording_finished(&mut self, result: CoreResult<Recording>) -> AppResult<()> {
        if release_recording_tap(&self.meter_tap) {
            debug!("Recording meter tap released");
        }

        let recording = result.map_err(|source| AppError::Audio {
            source,
            location: ErrorLocation::from(Location::caller()),
        })?;

        info!(
            recording_id = %recording.id(),
            session_id = %recording.session_id(),
            bytes = recording.audio_data().len(),
            "Recording saved"
        );
        println!(
            "saved {} as #{} ({:.1} s)",
            recording.id(),
            self.recordings.len() + 1,
            recording.duration().as_secs_f32()
        );
        self.recordings.push(recording);

        Ok(())
    }

    /// Play a stored recording, replacing any current playback.
    #[instrument(skip(self))]
    async fn play(&mut self, index: Option<usize>, effect: Option<Effect>) -> AppResult<()> {
        let recording = self.select(index)?;
        let effect = effect.unwrap_or(self.config.playback.default_effect);

        let analyser = {
            let mut manager = self.audio_manager.lock().await;
            manager.play_with_effect(&recording, effect).await?;
            manager.get_analyser()
        };

        if let Some(analyser) = analyser {
            self.meter_tap.send_replace(Some(MeterTap::playback(
                analyser,
                format!("{} {}", recording.id(), effect),
                recording.color(),
            )));
        }

        info!(recording_id = %recording.id(), effect = %effect, "Playback started");
        println!("playing {} with {}", recording.id(), effect);

        Ok(())
    }

    #[track_caller]
    fn select(&self, index: Option<usize>) -> AppResult<Recording> {
        let invalid = |reason: String| AppError::InvalidCommand {
            input: "play".to_string(),
            reason,
            location: ErrorLocation::from(Location::caller()),
        };

        if self.recordings.is_empty() {
            return Err(invalid("no recordings yet".to_string()));
        }

        let position = index.map_or(self.recordings.len() - 1, |n| n.saturating_sub(1));
        self.recordings.get(position).cloned().ok_or_else(|| {
            invalid(format!(
                "no recording #{} (have {})",
                position + 1,
                self.recordings.len()
            ))
        })
    }

    fn list(&self) {
        if self.recordings.is_empty() {
            println!("no recordings yet");
            return;
        }

        for (i, recording) in self.recordings.iter().enumerate() {
            println!(
                "{:>3}  {:<8} {}  {:>8} bytes  {:>5.1} s",
                i + 1,
                recording.id().to_string(),
                recording.color(),
                recording.audio_data().len(),
                recording.duration().as_secs_f32()
            );
        }
    }

    fn toggle_meter(&self) {
        self.meter_enabled.send_modify(|enabled| *enabled = !*enabled);
        let enabled = *self.meter_enabled.borrow();
        info!(enabled, "Level meter toggled");
        println!("meter {}", if enabled { "on" } else { "off" });
    }

    /// Stop any capture and playback before exiting.
    async fn shutdown(&mut self) {
        let mut manager = self.audio_manager.lock().await;
        if manager.is_recording() {
            info!("Stopping active recording before exit");
            manager.stop_recording();
        }
        manager.stop_playback();
    }
}
