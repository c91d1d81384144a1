//! VoiceFx: record short voice clips and play them back through effects.

mod app;
mod app_command;
mod command_reader;
mod config;
mod error;
mod visualizer;

pub(crate) use {
    app::App,
    app_command::AppCommand,
    command_reader::CommandReader,
    error::{AppError, Result as AppResult},
    visualizer::{MeterTap, Visualizer},
};

use crate::config::Config;

use std::{sync::Arc, time::Duration};

use tokio::{
    io::BufReader,
    sync::{Mutex, mpsc, watch},
};
use tracing::error;
use tracing_subscriber::EnvFilter;
use voicefx_core::{AudioManager, CpalCaptureDevice, RenderEngine};

const DEFAULT_LOG_FILTER: &str = "voicefx=info,voicefx_core=info";

/// Application entry point.
fn main() {
    // Logs go to stderr so the meter on stdout stays readable.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load config: {:?}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = config.validate() {
        error!("Invalid config: {:?}", e);
        std::process::exit(1);
    }

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!("Failed to create tokio runtime: {:?}", e);
            std::process::exit(1);
        }
    };

    rt.block_on(async {
        let audio_manager = Arc::new(Mutex::new(AudioManager::new(
            CpalCaptureDevice::new(),
            RenderEngine::new(),
        )));

        let (command_tx, command_rx) = mpsc::channel(32);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (meter_tap, tap_rx) = watch::channel(None);
        let (meter_enabled, enabled_rx) = watch::channel(config.visualizer.enabled);

        let reader = CommandReader::new(command_tx.clone());
        let visualizer = Visualizer::new(
            Arc::clone(&audio_manager),
            config.visualizer.clone(),
            tap_rx,
            enabled_rx,
        );

        let app = App {
            audio_manager,
            config,
            recordings: Vec::new(),
            command_tx,
            command_rx,
            shutdown_tx,
            meter_tap,
            meter_enabled,
        };

        tokio::join!(
            async {
                let stdin = BufReader::new(tokio::io::stdin());
                if let Err(e) = reader.run(stdin, shutdown_rx.clone()).await {
                    error!(error = ?e, "Command reader error");
                }
            },
            async {
                if let Err(e) = visualizer.run(shutdown_rx.clone()).await {
                    error!(error = ?e, "Visualizer error");
                }
            },
            async {
                if let Err(e) = app.run().await {
                    error!(error = ?e, "App error");
                }
            }
        );
    });

    // A pending stdin read cannot be cancelled; do not wait on it.
    rt.shutdown_timeout(Duration::from_millis(100));
}
