// Error types for the playback core
// LoadError and EngineError come from the engine side, PlayerError is what commands return

use std::path::PathBuf;
use thiserror::Error;

use crate::state::PlaybackState;

/// Failure to prepare a sound resource for playback
#[derive(Error, Debug)]
pub enum LoadError {
    /// The locator does not point at an existing file
    #[error("Audio resource not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The locator scheme cannot be resolved locally
    #[error("Unsupported resource locator: {0}")]
    UnsupportedLocator(String),

    /// The container or codec could not be probed
    #[error("Failed to probe audio format: {0}")]
    Format(String),

    /// The container holds no decodable audio track
    #[error("No audio track found")]
    NoAudioTrack,

    /// The track does not report a frame count
    #[error("Track duration is unknown")]
    UnknownDuration,

    /// The output device could not be opened
    #[error("Audio output unavailable: {0}")]
    Output(String),

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Transient failure while producing output
#[derive(Error, Debug)]
pub enum EngineError {
    /// Output stream reported an error
    #[error("Audio output error: {0}")]
    Output(String),

    /// Seeking inside the resource failed
    #[error("Seek failed: {0}")]
    Seek(String),

    /// No resource has been prepared
    #[error("No sound prepared")]
    NotPrepared,

    /// The engine thread is gone
    #[error("Audio engine is not running")]
    Disconnected,
}

/// Error returned by transport commands
#[derive(Error, Debug)]
pub enum PlayerError {
    #[error(transparent)]
    Load(#[from] LoadError),

    /// Command issued in a state that forbids it
    #[error("Cannot {command} while {state}")]
    InvalidState {
        command: &'static str,
        state: PlaybackState,
    },

    #[error(transparent)]
    Engine(#[from] EngineError),

    /// The controller was built outside a tokio runtime
    #[error("No tokio runtime available: {0}")]
    Runtime(#[from] tokio::runtime::TryCurrentError),
}

impl PlayerError {
    pub fn is_invalid_state(&self) -> bool {
        matches!(self, PlayerError::InvalidState { .. })
    }
}

pub type Result<T> = std::result::Result<T, PlayerError>;
