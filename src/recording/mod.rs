//! # Call Recording Module
//!
//! Persists one file per call: either bare PCM16 (`.pcm`) or a canonical WAV
//! (`.wav`), both at the storage profile unless told otherwise.
//!
//! ## File Lifecycle:
//! 1. **Absent**: no file yet
//! 2. **Created**: first `save` writes the initial audio
//! 3. **Appending**: each `append` extends it, keeping the WAV header valid
//!
//! There is no finalize step; the file is complete after every write.

pub mod writer;

use serde::{Deserialize, Serialize};

pub use writer::{RecordingInfo, RecordingWriter};

/// On-disk layout of a recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingFormat {
    Wav,
    Pcm,
}

impl RecordingFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            RecordingFormat::Wav => "wav",
            RecordingFormat::Pcm => "pcm",
        }
    }
}

impl std::str::FromStr for RecordingFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "wav" => Ok(RecordingFormat::Wav),
            "pcm" | "raw" => Ok(RecordingFormat::Pcm),
            _ => Err(format!("Unknown recording format: {}", s)),
        }
    }
}

/// How `append` keeps a WAV header consistent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppendStrategy {
    /// Read the whole file, concatenate, re-wrap and rewrite it.
    /// Cost grows with the length of the call.
    Rewrite,
    /// Append at the tail and patch the two size fields at the front.
    InPlace,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_parsing() {
        assert_eq!("WAV".parse::<RecordingFormat>(), Ok(RecordingFormat::Wav));
        assert_eq!("raw".parse::<RecordingFormat>(), Ok(RecordingFormat::Pcm));
        assert!("mp3".parse::<RecordingFormat>().is_err());
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(serde_json::to_string(&RecordingFormat::Pcm).unwrap(), "\"pcm\"");
        assert_eq!(serde_json::to_string(&AppendStrategy::InPlace).unwrap(), "\"in_place\"");
    }
}
