// Error handling for sound sessions

use thiserror::Error;

/// Sound engine error types
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SoundError {
    /// Local file did not exist when the source was resolved
    #[error("File does not exist with name: {0}")]
    SourceNotFound(String),

    /// Source identifier cannot be classified
    #[error("Invalid source: {0}")]
    InvalidSource(String),

    /// Decode/playback failure reported by the media engine
    #[error("What: {code}, Extra: {extra}")]
    Engine { code: i32, extra: i32 },

    /// Operation not available on this platform
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// Platform failed while negotiating audio focus
    #[error("Audio focus request failed: {0}")]
    FocusRequestFailed(String),

    /// No session registered under the handle
    #[error("Undefined player: {0}")]
    SessionNotFound(i32),

    /// Verb cannot be honoured in the current session state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Audio manager failure
    #[error("Platform error: {0}")]
    Platform(String),

    /// Volume key routing needs a foreground activity
    #[error("Null current activity")]
    NoActivity,

    /// Options record could not be parsed
    #[error("Invalid options: {0}")]
    InvalidOptions(String),
}

/// Error delivered through a load continuation
pub type LoadError = SoundError;

/// Result type alias for sound operations
pub type Result<T> = std::result::Result<T, SoundError>;

impl From<serde_json::Error> for SoundError {
    fn from(err: serde_json::Error) -> Self {
        SoundError::InvalidOptions(err.to_string())
    }
}
