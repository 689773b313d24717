//! # Call Audio Bridge
//!
//! Audio normalisation for a live voice-call pipeline. Bridges three
//! representations:
//!
//! - **Telephony gateway**: 8 kHz mu-law, base64 text frames
//! - **Speech AI endpoint**: 24 kHz PCM16, base64 text frames
//! - **Storage**: 16 kHz PCM16, bare or in a canonical WAV file
//!
//! ## Architecture:
//! - **audio**: Pure in-memory conversions (codec, resampler, WAV container,
//!   base64 framing, and the composed pipeline)
//! - **recording**: Per-call recording files that stay valid after every append
//! - **session**: Per-call state (stream pipeline, serialised recording)
//! - **state**: Shared registry, configuration and counters
//! - **config**: Layered configuration (defaults, TOML file, environment)
//! - **error**: Error taxonomy
//! - **telemetry**: `tracing` subscriber setup
//!
//! ## Example:
//! ```rust
//! use call_audio_bridge::audio::{codec, framing, pipeline};
//!
//! let frame = framing::encode(&codec::pcm16_to_mulaw(&[0u8; 320]));
//! let for_ai = pipeline::to_speech_ai(&frame);
//! assert_eq!(framing::decode(&for_ai).len(), 960);
//! ```

pub mod audio;      // Codec, resampler, container, framing, pipeline
pub mod config;     // Configuration management
pub mod error;      // Error types
pub mod recording;  // Recording writer
pub mod session;    // Per-call sessions
pub mod state;      // Shared bridge state
pub mod telemetry;  // Logging setup

pub use audio::{AudioBuffer, AudioFormat, Codec, StreamPipeline, StreamResampler};
pub use config::BridgeConfig;
pub use error::{AudioError, AudioResult};
pub use recording::{AppendStrategy, RecordingFormat, RecordingInfo, RecordingWriter};
pub use session::{CallSession, FrameOutcome, SessionManager, SessionStatus};
pub use state::{BridgeMetrics, BridgeState};
