use crate::AppError;

use std::{panic::Location, str::FromStr};

use error_location::ErrorLocation;
use voicefx_core::{CoreResult, Effect, Recording};

/// Commands handled by the main application loop.
#[derive(Debug)]
pub enum AppCommand {
    /// Start a new recording.
    Record,
    /// Stop the active recording.
    Stop,
    /// Play a recording with an effect.
    Play {
        /// 1-based position in the recording list; latest when absent.
        index: Option<usize>,
        /// Effect to apply; configured default when absent.
        effect: Option<Effect>,
    },
    /// Stop playback.
    Halt,
    /// Print the recordings made so far.
    List,
    /// Toggle the level meter.
    Meter,
    /// Print the command summary.
    Help,
    /// Request application shutdown.
    Quit,
    /// A background recording completed.
    RecordingFinished(CoreResult<Recording>),
}

/// Command summary printed by `help`.
pub const HELP_TEXT: &str = "\
commands:
  record                 start recording (stops by itself after the limit)
  stop                   stop recording
  play [index] [effect]  play a recording (effects: none, chipmunk, monster, echo)
  halt                   stop playback
  list                   list recordings
  meter                  toggle the level meter
  help                   show this text
  quit                   exit";

impl FromStr for AppCommand {
    type Err = AppError;

    #[track_caller]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: String| AppError::InvalidCommand {
            input: s.trim().to_string(),
            reason,
            location: ErrorLocation::from(Location::caller()),
        };

        let mut words = s.split_whitespace();
        let Some(verb) = words.next() else {
            return Err(invalid("empty command".to_string()));
        };
        let args: Vec<&str> = words.collect();

        let command = match verb.to_ascii_lowercase().as_str() {
            "record" | "r" => AppCommand::Record,
            "stop" | "s" => AppCommand::Stop,
            "halt" | "h" => AppCommand::Halt,
            "list" | "ls" => AppCommand::List,
            "meter" | "m" => AppCommand::Meter,
            "help" | "?" => AppCommand::Help,
            "quit" | "exit" | "q" => AppCommand::Quit,
            "play" | "p" => {
                let mut index = None;
                let mut effect = None;
                for arg in &args {
                    if let Ok(n) = arg.parse::<usize>() {
                        if n == 0 {
                            return Err(invalid("recording index starts at 1".to_string()));
                        }
                        if index.replace(n).is_some() {
                            return Err(invalid("more than one recording index".to_string()));
                        }
                    } else {
                        let parsed = arg.parse::<Effect>().map_err(|e| invalid(e.to_string()))?;
                        if effect.replace(parsed).is_some() {
                            return Err(invalid("more than one effect".to_string()));
                        }
                    }
                }
                return Ok(AppCommand::Play { index, effect });
            }
            other => return Err(invalid(format!("unknown command '{}'", other))),
        };

        if !args.is_empty() {
            return Err(invalid(format!("'{}' takes no arguments", verb)));
        }

        Ok(command)
    }
}
