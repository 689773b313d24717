//! # Audio Buffers
//!
//! A format-tagged byte buffer plus the PCM16 sample helpers the codec,
//! resampler and container layers share.
//!
//! Buffers are immutable once built: every conversion produces a new buffer
//! (the one exception is same-rate resampling, which hands back its input).

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;

use crate::audio::format::{AudioFormat, Codec};

/// Decode little-endian PCM16 bytes into samples.
///
/// ## Rust Concepts:
/// - **Cursor**: Reads from a byte slice as if it were a file
/// - **while let Ok(...)**: Keep reading until the slice runs out
///
/// A trailing odd byte is ignored.
pub fn pcm16_samples(data: &[u8]) -> Vec<i16> {
    let mut cursor = Cursor::new(data);
    let mut samples = Vec::with_capacity(data.len() / 2);
    while let Ok(sample) = cursor.read_i16::<LittleEndian>() {
        samples.push(sample);
    }
    samples
}

/// Encode samples as little-endian PCM16 bytes.
pub fn pcm16_bytes(samples: &[i16]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        // Writing into a Vec cannot fail
        let _ = out.write_i16::<LittleEndian>(sample);
    }
    out
}

/// Bytes carrying samples in a known format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioBuffer {
    format: AudioFormat,
    data: Vec<u8>,
}

impl AudioBuffer {
    pub fn new(format: AudioFormat, data: Vec<u8>) -> Self {
        Self { format, data }
    }

    /// Build a PCM16 buffer at `sample_rate` from decoded samples.
    pub fn from_samples(sample_rate: u32, samples: &[i16]) -> Self {
        Self::new(AudioFormat::pcm16(sample_rate), pcm16_bytes(samples))
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of samples per channel.
    pub fn sample_count(&self) -> usize {
        self.data.len() / self.format.block_align().max(1)
    }

    /// Playback duration in seconds.
    pub fn duration_seconds(&self) -> f64 {
        self.format.duration_seconds(self.data.len())
    }

    /// Decoded samples. Only meaningful for PCM16 buffers; mu-law bytes
    /// must go through the codec first.
    pub fn samples(&self) -> Vec<i16> {
        match self.format.codec {
            Codec::Pcm16 => pcm16_samples(&self.data),
            Codec::Mulaw => crate::audio::codec::decode_samples(&self.data),
        }
    }

    /// Check that the buffer holds whole samples.
    ///
    /// ## Returns:
    /// - **Ok(())**: Length matches the format
    /// - **Err(String)**: Description of the mismatch
    pub fn validate(&self) -> Result<(), String> {
        if !self.format.is_aligned(self.data.len()) {
            return Err(format!(
                "{} buffer length {} is not a multiple of {} bytes",
                self.format.codec.as_str(),
                self.data.len(),
                self.format.block_align()
            ));
        }
        Ok(())
    }
}
