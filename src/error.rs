//! Error types surfaced by the recorder engine and its ambient collaborators.

use std::io;
use std::path::PathBuf;

/// Result type alias for recorder operations.
pub type Result<T> = std::result::Result<T, RecorderError>;

/// Errors surfaced by [`crate::recorder::Recorder`] to its callers.
///
/// This is the typed rendition of the source's closed error enum
/// (`NoError, AlreadyRecording, FailedToOpen, FailedToSubscribe`) — `NoError`
/// has no variant here because a non-error result is just `Ok(())`.
#[derive(Debug, thiserror::Error)]
pub enum RecorderError {
    /// `start(path)` was called while a log was already open.
    #[error("already recording")]
    AlreadyRecording,

    /// The log backend failed to open the given path.
    ///
    /// The `Log` trait's `open` returns a bare `bool` (matching the external
    /// contract), so no underlying `io::Error` is available to attach here.
    #[error("failed to open log at {path}")]
    FailedToOpen { path: PathBuf },

    /// `SubscribeRaw` returned failure for the given topic.
    #[error("failed to subscribe to topic {topic}")]
    FailedToSubscribe { topic: String },
}

/// Errors surfaced while loading a [`crate::config::Config`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}
