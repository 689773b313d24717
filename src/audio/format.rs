//! # Audio Format Profiles
//!
//! Fixed byte-layout profiles for the three audio representations the bridge
//! moves between:
//!
//! | Profile     | Rate     | Bits | Codec   | Used by                 |
//! |-------------|----------|------|---------|-------------------------|
//! | `TELEPHONY` | 8000 Hz  | 8    | mu-law  | Telephony gateway       |
//! | `SPEECH_AI` | 24000 Hz | 16   | PCM16   | Real-time speech AI     |
//! | `STORAGE`   | 16000 Hz | 16   | PCM16   | Call recordings on disk |
//!
//! All profiles are mono.

use serde::{Deserialize, Serialize};

/// Sample encoding carried by a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    /// ITU-T G.711 mu-law, one byte per sample
    Mulaw,
    /// Signed 16-bit little-endian linear PCM
    Pcm16,
}

impl Codec {
    pub fn as_str(&self) -> &'static str {
        match self {
            Codec::Mulaw => "mulaw",
            Codec::Pcm16 => "pcm16",
        }
    }
}

/// Describes the byte layout of an audio buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub bit_depth: u16,
    pub codec: Codec,
}

impl AudioFormat {
    /// 8 kHz mu-law, as streamed by the telephony gateway.
    pub const TELEPHONY: AudioFormat = AudioFormat {
        sample_rate: 8000,
        channels: 1,
        bit_depth: 8,
        codec: Codec::Mulaw,
    };

    /// 24 kHz PCM16, as expected by the speech AI endpoint.
    pub const SPEECH_AI: AudioFormat = AudioFormat {
        sample_rate: 24000,
        channels: 1,
        bit_depth: 16,
        codec: Codec::Pcm16,
    };

    /// 16 kHz PCM16, as persisted in call recordings.
    pub const STORAGE: AudioFormat = AudioFormat {
        sample_rate: 16000,
        channels: 1,
        bit_depth: 16,
        codec: Codec::Pcm16,
    };

    /// Mono PCM16 at an arbitrary rate.
    pub const fn pcm16(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            channels: 1,
            bit_depth: 16,
            codec: Codec::Pcm16,
        }
    }

    /// Bytes occupied by one sample of one channel.
    pub fn bytes_per_sample(&self) -> usize {
        (self.bit_depth as usize / 8).max(1)
    }

    /// Bytes per sample frame (all channels).
    pub fn block_align(&self) -> usize {
        self.channels as usize * self.bytes_per_sample()
    }

    /// Bytes of audio per second of playback.
    pub fn byte_rate(&self) -> u32 {
        (self.sample_rate as u64 * self.block_align() as u64).min(u32::MAX as u64) as u32
    }

    /// Playback duration of `byte_len` bytes in this format.
    pub fn duration_seconds(&self, byte_len: usize) -> f64 {
        let rate = self.byte_rate();
        if rate == 0 {
            return 0.0;
        }
        byte_len as f64 / rate as f64
    }

    /// Whether `byte_len` holds a whole number of sample frames.
    pub fn is_aligned(&self, byte_len: usize) -> bool {
        byte_len % self.block_align().max(1) == 0
    }
}
