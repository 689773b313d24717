//! # WAV Container
//!
//! Synthesis and extraction of the canonical 44-byte RIFF/WAVE header.
//!
//! ## Header Layout (all integers little-endian):
//! | Offset | Size | Field                         |
//! |--------|------|-------------------------------|
//! | 0      | 4    | `RIFF`                        |
//! | 4      | 4    | 36 + data size                |
//! | 8      | 4    | `WAVE`                        |
//! | 12     | 4    | `fmt `                        |
//! | 16     | 4    | 16 (fmt chunk size)           |
//! | 20     | 2    | 1 (linear PCM)                |
//! | 22     | 2    | channels                      |
//! | 24     | 4    | sample rate                   |
//! | 28     | 4    | byte rate                     |
//! | 32     | 2    | block align                   |
//! | 34     | 2    | bits per sample               |
//! | 36     | 4    | `data`                        |
//! | 40     | 4    | data size                     |
//!
//! ## Caller Obligation:
//! `create_header` and `wrap` write exactly the parameters they are given.
//! They do NOT check that the payload really is `channels` x `bit_depth`
//! audio. Passing mu-law bytes with `bit_depth = 16`, or a stereo label on a
//! mono payload, produces a well-formed header describing the wrong audio.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Seek, SeekFrom, Write};

use crate::audio::format::AudioFormat;
use crate::error::{AudioError, AudioResult};

/// Size of the canonical header.
pub const WAV_HEADER_SIZE: usize = 44;

/// Offset of the RIFF chunk size field.
pub const RIFF_SIZE_OFFSET: u64 = 4;

/// Offset of the data chunk size field.
pub const DATA_SIZE_OFFSET: u64 = 40;

/// `RIFF` magic plus the chunk size field.
const RIFF_DESCRIPTOR_SIZE: usize = 8;

const PCM_FORMAT_TAG: u16 = 1;
const FMT_CHUNK_SIZE: u32 = 16;

/// Build a 44-byte header for `data_length` bytes of payload.
///
/// Derived fields that cannot be represented (byte rate past `u32`, block
/// align past `u16`) saturate at the field's maximum.
pub fn create_header(data_length: u32, sample_rate: u32, channels: u16, bit_depth: u16) -> [u8; WAV_HEADER_SIZE] {
    let block_align = channels as u64 * bit_depth as u64 / 8;
    let byte_rate = (sample_rate as u64 * block_align).min(u32::MAX as u64) as u32;
    let block_align = block_align.min(u16::MAX as u64);

    let mut header = [0u8; WAV_HEADER_SIZE];
    let mut cursor = Cursor::new(&mut header[..]);
    // Writes into a fixed 44-byte array of exactly this layout cannot fail
    let _ = write_header_fields(
        &mut cursor,
        data_length,
        sample_rate,
        channels,
        bit_depth,
        byte_rate,
        block_align as u16,
    );
    header
}

fn write_header_fields<W: Write>(
    writer: &mut W,
    data_length: u32,
    sample_rate: u32,
    channels: u16,
    bit_depth: u16,
    byte_rate: u32,
    block_align: u16,
) -> std::io::Result<()> {
    // RIFF header
    writer.write_all(b"RIFF")?;
    writer.write_u32::<LittleEndian>(36u32.wrapping_add(data_length))?;
    writer.write_all(b"WAVE")?;

    // fmt chunk
    writer.write_all(b"fmt ")?;
    writer.write_u32::<LittleEndian>(FMT_CHUNK_SIZE)?;
    writer.write_u16::<LittleEndian>(PCM_FORMAT_TAG)?;
    writer.write_u16::<LittleEndian>(channels)?;
    writer.write_u32::<LittleEndian>(sample_rate)?;
    writer.write_u32::<LittleEndian>(byte_rate)?;
    writer.write_u16::<LittleEndian>(block_align)?;
    writer.write_u16::<LittleEndian>(bit_depth)?;

    // data chunk
    writer.write_all(b"data")?;
    writer.write_u32::<LittleEndian>(data_length)?;
    Ok(())
}

/// Wrap PCM in a WAV container described by `format`.
pub fn wrap_with(pcm: &[u8], format: AudioFormat) -> Vec<u8> {
    wrap(pcm, format.sample_rate, format.channels, format.bit_depth)
}

/// Prepend a canonical header to `pcm`. Output length is `pcm.len() + 44`.
pub fn wrap(pcm: &[u8], sample_rate: u32, channels: u16, bit_depth: u16) -> Vec<u8> {
    let header = create_header(pcm.len() as u32, sample_rate, channels, bit_depth);
    let mut wav = Vec::with_capacity(WAV_HEADER_SIZE + pcm.len());
    wav.extend_from_slice(&header);
    wav.extend_from_slice(pcm);
    wav
}

/// Wrap PCM with the storage profile (16 kHz, mono, 16-bit).
pub fn wrap_storage(pcm: &[u8]) -> Vec<u8> {
    wrap_with(pcm, AudioFormat::STORAGE)
}

fn check_magic(wav: &[u8]) -> AudioResult<()> {
    // Too small to hold even the RIFF descriptor and not starting with it:
    // this is not a truncated WAV, it is something else entirely.
    if wav.len() < RIFF_DESCRIPTOR_SIZE && !wav.starts_with(b"RIFF") {
        return Err(AudioError::InvalidFormat(format!(
            "{} byte buffer is not a RIFF stream",
            wav.len()
        )));
    }
    // Length is checked before the magic reads below so they stay in bounds
    if wav.len() < WAV_HEADER_SIZE {
        return Err(AudioError::TooShort { len: wav.len() });
    }
    if &wav[0..4] != b"RIFF" {
        return Err(AudioError::InvalidFormat("missing RIFF magic at offset 0".to_string()));
    }
    if &wav[8..12] != b"WAVE" {
        return Err(AudioError::InvalidFormat("missing WAVE magic at offset 8".to_string()));
    }
    Ok(())
}

/// Return the PCM payload after the 44-byte header.
///
/// ## Errors:
/// - **InvalidFormat**: under 8 bytes and not starting with `RIFF`
/// - **TooShort**: otherwise fewer than 44 bytes
/// - **InvalidFormat**: `RIFF` / `WAVE` magic missing
///
/// Only the canonical layout is understood; extra chunks before `data`
/// would end up in the returned payload.
pub fn unwrap(wav: &[u8]) -> AudioResult<&[u8]> {
    check_magic(wav)?;
    Ok(&wav[WAV_HEADER_SIZE..])
}

/// Cheap probe for the `RIFF....WAVE` magic words.
pub fn is_wav(buffer: &[u8]) -> bool {
    buffer.len() >= 12 && &buffer[0..4] == b"RIFF" && &buffer[8..12] == b"WAVE"
}

/// Overwrite the two size fields of a WAV stream in place.
///
/// The stream position is left just past the data size field.
pub fn patch_sizes<S: Write + Seek>(stream: &mut S, data_length: u32) -> std::io::Result<()> {
    stream.seek(SeekFrom::Start(RIFF_SIZE_OFFSET))?;
    stream.write_u32::<LittleEndian>(36u32.wrapping_add(data_length))?;
    stream.seek(SeekFrom::Start(DATA_SIZE_OFFSET))?;
    stream.write_u32::<LittleEndian>(data_length)?;
    Ok(())
}

/// Parsed fields of a canonical header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavHeader {
    pub riff_size: u32,
    pub channels: u16,
    pub sample_rate: u32,
    pub byte_rate: u32,
    pub block_align: u16,
    pub bit_depth: u16,
    pub data_size: u32,
}

impl WavHeader {
    /// Read the header fields at their canonical offsets.
    pub fn parse(wav: &[u8]) -> AudioResult<Self> {
        check_magic(wav)?;

        let mut cursor = Cursor::new(&wav[..WAV_HEADER_SIZE]);
        let read = |cursor: &mut Cursor<&[u8]>| -> std::io::Result<WavHeader> {
            cursor.set_position(RIFF_SIZE_OFFSET);
            let riff_size = cursor.read_u32::<LittleEndian>()?;
            cursor.set_position(22);
            let channels = cursor.read_u16::<LittleEndian>()?;
            let sample_rate = cursor.read_u32::<LittleEndian>()?;
            let byte_rate = cursor.read_u32::<LittleEndian>()?;
            let block_align = cursor.read_u16::<LittleEndian>()?;
            let bit_depth = cursor.read_u16::<LittleEndian>()?;
            cursor.set_position(DATA_SIZE_OFFSET);
            let data_size = cursor.read_u32::<LittleEndian>()?;
            Ok(WavHeader {
                riff_size,
                channels,
                sample_rate,
                byte_rate,
                block_align,
                bit_depth,
                data_size,
            })
        };
        read(&mut cursor).map_err(|e| AudioError::InvalidFormat(format!("unreadable header: {}", e)))
    }

    /// Declared playback length (`data_size / byte_rate`).
    pub fn duration_seconds(&self) -> f64 {
        if self.byte_rate == 0 {
            return 0.0;
        }
        self.data_size as f64 / self.byte_rate as f64
    }
}
