//! # Configuration Management
//!
//! Loads bridge configuration from multiple sources:
//! - Default values (built into the code)
//! - An optional TOML file (`bridge.toml`)
//! - A `.env` file, if present
//! - Environment variables with the `BRIDGE` prefix
//!
//! ## Configuration Priority (highest to lowest):
//! 1. Environment variables (`BRIDGE__RECORDING__DIRECTORY`, ...)
//! 2. Configuration file (`bridge.toml`)
//! 3. Default values (defined in the Default impl)

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::recording::{AppendStrategy, RecordingFormat};

/// Top-level bridge configuration.
///
/// Split into logical groups so each collaborator only needs to borrow
/// the section it cares about.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    pub recording: RecordingConfig,
    pub streaming: StreamingConfig,
    pub sessions: SessionsConfig,
}

/// Where and how call recordings are written.
///
/// ## Fields:
/// - `directory`: Folder that receives one file per call
/// - `default_format`: `wav` (44-byte header + PCM) or `pcm` (bare samples)
/// - `append_strategy`: `rewrite` re-wraps the whole file on every append,
///   `in_place` appends at the tail and patches the two size fields
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingConfig {
    pub directory: String,
    pub default_format: RecordingFormat,
    pub append_strategy: AppendStrategy,
}

/// Live-stream conversion settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamingConfig {
    /// Carry resampler phase across frames of the same call.
    pub stateful_resampling: bool,
}

/// Limits for the per-call session registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    pub max_concurrent_sessions: usize,
    pub max_session_age_secs: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            recording: RecordingConfig {
                directory: "recordings".to_string(),
                default_format: RecordingFormat::Wav,
                append_strategy: AppendStrategy::Rewrite,
            },
            streaming: StreamingConfig {
                stateful_resampling: false, // stateless per-frame resampling
            },
            sessions: SessionsConfig {
                max_concurrent_sessions: 100,
                max_session_age_secs: 4 * 60 * 60, // 4 hours
            },
        }
    }
}

impl BridgeConfig {
    /// Load configuration from defaults, `bridge.toml` and the environment.
    ///
    /// ## Environment Variable Examples:
    /// - `BRIDGE__RECORDING__DIRECTORY=/var/lib/calls`
    /// - `BRIDGE__RECORDING__APPEND_STRATEGY=in_place`
    /// - `BRIDGE__STREAMING__STATEFUL_RESAMPLING=true`
    pub fn load() -> Result<Self> {
        Self::load_from("bridge")
    }

    /// Same as [`BridgeConfig::load`] with an explicit file stem.
    pub fn load_from(file_stem: &str) -> Result<Self> {
        // A missing .env file is fine
        dotenv::dotenv().ok();

        let settings = config::Config::builder()
            .add_source(config::Config::try_from(&BridgeConfig::default())?)
            .add_source(config::File::with_name(file_stem).required(false))
            .add_source(
                config::Environment::with_prefix("BRIDGE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );

        let config: BridgeConfig = settings.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would break the writer or the registry.
    pub fn validate(&self) -> Result<()> {
        if self.recording.directory.trim().is_empty() {
            return Err(anyhow::anyhow!("Recording directory cannot be empty"));
        }

        if self.sessions.max_concurrent_sessions == 0 {
            return Err(anyhow::anyhow!("Max concurrent sessions must be greater than 0"));
        }

        Ok(())
    }

    /// Apply a partial JSON document, e.g. `{"streaming": {"stateful_resampling": true}}`.
    ///
    /// Only fields present in the document change; the result is re-validated
    /// and left untouched if validation fails.
    pub fn update_from_json(&mut self, json_str: &str) -> Result<()> {
        let partial: serde_json::Value = serde_json::from_str(json_str)?;
        let mut updated = self.clone();

        if let Some(recording) = partial.get("recording") {
            if let Some(dir) = recording.get("directory").and_then(|v| v.as_str()) {
                updated.recording.directory = dir.to_string();
            }
            if let Some(format) = recording.get("default_format") {
                updated.recording.default_format = serde_json::from_value(format.clone())?;
            }
            if let Some(strategy) = recording.get("append_strategy") {
                updated.recording.append_strategy = serde_json::from_value(strategy.clone())?;
            }
        }

        if let Some(streaming) = partial.get("streaming") {
            if let Some(stateful) = streaming.get("stateful_resampling").and_then(|v| v.as_bool()) {
                updated.streaming.stateful_resampling = stateful;
            }
        }

        if let Some(sessions) = partial.get("sessions") {
            if let Some(max) = sessions.get("max_concurrent_sessions").and_then(|v| v.as_u64()) {
                updated.sessions.max_concurrent_sessions = max as usize;
            }
            if let Some(age) = sessions.get("max_session_age_secs").and_then(|v| v.as_u64()) {
                updated.sessions.max_session_age_secs = age;
            }
        }

        updated.validate()?;
        *self = updated;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BridgeConfig::default();
        assert_eq!(config.recording.directory, "recordings");
        assert_eq!(config.recording.default_format, RecordingFormat::Wav);
        assert_eq!(config.recording.append_strategy, AppendStrategy::Rewrite);
        assert!(!config.streaming.stateful_resampling);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = BridgeConfig::default();
        config.sessions.max_concurrent_sessions = 0;
        assert!(config.validate().is_err());

        let mut config = BridgeConfig::default();
        config.recording.directory = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_update() {
        let mut config = BridgeConfig::default();
        let json = r#"{"recording": {"append_strategy": "in_place"}, "streaming": {"stateful_resampling": true}}"#;
        assert!(config.update_from_json(json).is_ok());
        assert_eq!(config.recording.append_strategy, AppendStrategy::InPlace);
        assert!(config.streaming.stateful_resampling);
        // Untouched fields keep their values
        assert_eq!(config.recording.directory, "recordings");
    }

    #[test]
    fn test_invalid_update_leaves_config_unchanged() {
        let mut config = BridgeConfig::default();
        let json = r#"{"streaming": {"stateful_resampling": true}, "sessions": {"max_concurrent_sessions": 0}}"#;
        assert!(config.update_from_json(json).is_err());
        assert!(!config.streaming.stateful_resampling);
        assert_eq!(config.sessions.max_concurrent_sessions, 100);
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let mut config = BridgeConfig::default();
        assert!(config.update_from_json(r#"{"streaming": {"frame_ms": 0}}"#).is_ok());
        assert!(!config.streaming.stateful_resampling);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let config = BridgeConfig::load_from("definitely-not-a-config-file").unwrap();
        assert_eq!(config.sessions.max_concurrent_sessions, 100);
    }
}
