//! Error taxonomy shared by the recorder, the players and the CLI.

use std::path::PathBuf;

use thiserror::Error;

use crate::platform::PlatformError;

#[derive(Debug, Error)]
pub enum Error {
    /// The recording file does not exist.
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Malformed JSON, a missing required key, or events that break the
    /// log invariants (unknown type, negative or decreasing time).
    #[error("invalid recording {}: {reason}", path.display())]
    InvalidDocument { path: PathBuf, reason: String },

    /// The recording parsed but holds zero events.
    #[error("no events in {}", .0.display())]
    EmptyLog(PathBuf),

    /// A single event could not be injected. Playback counts it and goes on.
    #[error("injection failed: {0}")]
    InjectionFailure(String),

    /// Ctrl+C or a declined confirmation. `completed` is the number of units
    /// (events or files) finished before the cancellation.
    #[error("cancelled by user ({completed} completed)")]
    UserCancelled { completed: usize },

    /// The pointer was parked in the top-left corner with the failsafe on.
    #[error("failsafe triggered: pointer moved to (0, 0)")]
    FailSafe { completed: usize },

    #[error("speed must be a number greater than 0, got {0}")]
    InvalidSpeed(String),

    #[error("config error in {}: {message}", path.display())]
    Config { path: PathBuf, message: String },

    /// Command-line input that clap cannot reject on its own.
    #[error("{0}")]
    Usage(String),

    /// Every candidate file of a batch was rejected.
    #[error("no valid recordings to play")]
    NothingToPlay,

    #[error("invalid file pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::UserCancelled { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
