//! # Audio Processing Module
//!
//! Normalises call audio between the three representations a live call
//! touches: the telephony gateway, the speech AI endpoint and durable storage.
//!
//! ## Key Components:
//! - **Format**: The canonical `AudioFormat` profiles
//! - **Buffer**: Format-tagged byte buffers and PCM16 sample helpers
//! - **Framing**: Base64 text transport
//! - **Codec**: G.711 mu-law companding
//! - **Resampler**: Linear sample-rate conversion, stateless and per-stream
//! - **Container**: Canonical 44-byte WAV header handling
//! - **Pipeline**: The named conversions built from the pieces above
//!
//! Everything here is pure in-memory arithmetic. Nothing blocks, nothing
//! holds shared mutable state, and any number of calls may use it at once.

pub mod buffer;     // Format-tagged buffers and sample helpers
pub mod codec;      // mu-law <-> PCM16
pub mod container;  // WAV header synthesis and extraction
pub mod format;     // Audio format profiles
pub mod framing;    // Base64 encode/decode
pub mod pipeline;   // Composed conversions
pub mod resampler;  // Linear resampling

pub use buffer::AudioBuffer;
pub use format::{AudioFormat, Codec};
pub use pipeline::StreamPipeline;
pub use resampler::StreamResampler;
