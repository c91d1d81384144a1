//! Line-oriented command input.
//!
//! Reads one command per line and forwards parsed commands to the main
//! application. End of input is treated as `quit`.

use crate::{AppCommand, AppError, AppResult};

use std::panic::Location;

use error_location::ErrorLocation;
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt},
    sync::{mpsc, watch},
};
use tracing::{debug, info, instrument, warn};

/// Forwards commands typed on an input stream.
pub struct CommandReader {
    command_tx: mpsc::Sender<AppCommand>,
}

impl CommandReader {
    /// Create a reader that forwards to `command_tx`.
    pub fn new(command_tx: mpsc::Sender<AppCommand>) -> Self {
        Self { command_tx }
    }

    /// Run until end of input or a shutdown signal.
    ///
    /// # Errors
    ///
    /// Returns error if the input cannot be read or the application has
    /// stopped receiving commands.
    #[instrument(skip(self, input, shutdown_rx))]
    pub async fn run<R>(&self, input: R, mut shutdown_rx: watch::Receiver<bool>) -> AppResult<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    info!("Command reader shutting down");
                    break;
                }
                line = lines.next_line() => {
                    match line? {
                        Some(line) => self.handle_line(&line).await?,
                        None => {
                            info!("End of input, requesting shutdown");
                            self.send(AppCommand::Quit).await?;
                            break;
                        }
                    }
                }
            }
        }

        Ok(())
    }

    async fn handle_line(&self, line: &str) -> AppResult<()> {
        if line.trim().is_empty() {
            return Ok(());
        }

        match line.parse::<AppCommand>() {
            Ok(command) => {
                debug!(command = ?command, "Command parsed");
                self.send(command).await
            }
            Err(e) => {
                warn!(error = %e, "Ignoring invalid command");
                println!("{} (type 'help' for commands)", e.summary());
                Ok(())
            }
        }
    }

    #[track_caller]
    fn send(&self, command: AppCommand) -> impl Future<Output = AppResult<()>> + '_ {
        let location = ErrorLocation::from(Location::caller());
        async move {
            self.command_tx
                .send(command)
                .await
                .map_err(|e| AppError::ChannelSendFailed {
                    message: format!("Failed to forward command: {}", e),
                    location,
                })
        }
    }
}
