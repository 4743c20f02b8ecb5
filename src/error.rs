use std::path::PathBuf;

use thiserror::Error;

/// Failure taxonomy for the synthesis pipeline.
///
/// Everything a caller can observe maps onto one of these variants; worker
/// threads never let an error cross the thread boundary unhandled.
#[derive(Debug, Error)]
pub enum Error {
    /// Rejected before any pipeline activity; no state change.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The audio output device could not be opened or configured. Fatal to
    /// playback capability, surfaced once at initialization.
    #[error("audio output device unavailable: {0}")]
    DeviceUnavailable(String),

    /// `start` was called while a synthesis run is in progress. The current
    /// run is unaffected.
    #[error("a synthesis run is already in progress")]
    AlreadyRunning,

    /// Filesystem failure while staging assets or persisting a result.
    #[error("i/o failure at {path}: {source}")]
    IoFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The synthesis engine could not be constructed or produced no audio.
    #[error("synthesis engine failure: {0}")]
    EngineFailure(String),
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::IoFailure {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
