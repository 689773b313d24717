//! # Error Handling
//!
//! Error types for the audio bridge. The codec, resampler and framing layers
//! never fail (every numeric input is clamped), so the taxonomy here is small:
//!
//! - **Container errors**: `TooShort` and `InvalidFormat` from WAV unwrapping
//! - **Recording errors**: `FileNotFound` and `Io` from the recording writer
//! - **Session errors**: registry and per-call recording lifecycle failures
//! - **Configuration errors**: loading or validating `BridgeConfig`
//!
//! None of these are retried automatically. A corrupt buffer does not become
//! valid on retry, and a live call cannot wait for a missing file to reappear.

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the audio bridge.
///
/// ## Usage Example:
/// ```rust
/// use call_audio_bridge::error::AudioError;
///
/// let err = AudioError::TooShort { len: 10 };
/// assert!(err.to_string().contains("10 bytes"));
/// ```
#[derive(Debug, Error)]
pub enum AudioError {
    /// Buffer is smaller than the 44-byte canonical WAV header.
    #[error("WAV buffer too short: {len} bytes, need at least 44")]
    TooShort { len: usize },

    /// Magic words (`RIFF` / `WAVE`) are missing or wrong.
    #[error("invalid WAV format: {0}")]
    InvalidFormat(String),

    /// Recording target does not exist on disk.
    #[error("recording file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Any other filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No active session with this stream id.
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// Registry is already at its concurrency limit.
    #[error("maximum concurrent sessions ({0}) reached")]
    SessionLimit(usize),

    /// A session with this stream id is already registered.
    #[error("session '{0}' already exists")]
    DuplicateSession(String),

    /// The call's recording failed earlier and no longer accepts audio.
    #[error("recording for stream '{0}' was abandoned after an earlier failure")]
    RecordingAbandoned(String),

    /// Configuration file or environment variable problems.
    #[error("configuration error: {0}")]
    Config(String),
}

impl AudioError {
    /// Map an I/O error raised while touching `path`, turning `NotFound`
    /// into [`AudioError::FileNotFound`].
    pub fn from_io(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            AudioError::FileNotFound(path.into())
        } else {
            AudioError::Io(err)
        }
    }

    /// Short machine-readable tag, handy for structured log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            AudioError::TooShort { .. } => "too_short",
            AudioError::InvalidFormat(_) => "invalid_format",
            AudioError::FileNotFound(_) => "file_not_found",
            AudioError::Io(_) => "io",
            AudioError::SessionNotFound(_) => "session_not_found",
            AudioError::SessionLimit(_) => "session_limit",
            AudioError::DuplicateSession(_) => "duplicate_session",
            AudioError::RecordingAbandoned(_) => "recording_abandoned",
            AudioError::Config(_) => "config_error",
        }
    }
}

impl From<config::ConfigError> for AudioError {
    fn from(err: config::ConfigError) -> Self {
        AudioError::Config(err.to_string())
    }
}

/// Shorthand for `Result<T, AudioError>`.
pub type AudioResult<T> = Result<T, AudioError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_maps_to_file_not_found() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = AudioError::from_io(io, "/tmp/missing.wav");
        assert!(matches!(err, AudioError::FileNotFound(ref p) if p.ends_with("missing.wav")));
        assert_eq!(err.kind(), "file_not_found");
    }

    #[test]
    fn test_other_io_stays_io() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
        let err = AudioError::from_io(io, "/tmp/x.wav");
        assert!(matches!(err, AudioError::Io(_)));
    }

    #[test]
    fn test_messages_distinguish_container_errors() {
        let short = AudioError::TooShort { len: 10 }.to_string();
        let invalid = AudioError::InvalidFormat("missing RIFF".to_string()).to_string();
        assert!(short.contains("too short"));
        assert!(invalid.contains("invalid WAV format"));
        assert_ne!(short, invalid);
    }
}
