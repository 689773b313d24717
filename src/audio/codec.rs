//! # G.711 mu-law Codec
//!
//! Sample-by-sample companding between signed 16-bit linear PCM and 8-bit
//! mu-law, as used on the telephony leg of a call.
//!
//! ## Encoding (PCM16 → mu-law):
//! 1. **Sign**: split off the sign, keep the magnitude
//! 2. **Clip**: cap the magnitude at `MULAW_CLIP` so the bias cannot overflow
//! 3. **Bias**: add `MULAW_BIAS`, which guarantees a set bit in segment 0
//! 4. **Segment**: position of the highest set bit (0..=7), the logarithmic part
//! 5. **Mantissa**: the 4 bits just below that highest bit
//! 6. **Pack and invert**: `!(sign | segment << 4 | mantissa)`
//!
//! The transform is lossy but deterministic and stateless, so it is safe to
//! call from any number of call streams at once.

/// Bias added to the clipped magnitude before segment lookup.
const MULAW_BIAS: i32 = 0x84; // 132

/// Largest magnitude that can be biased without leaving 15 bits.
const MULAW_CLIP: i32 = 32635;

/// Decoded value for every possible mu-law byte.
static DECODE_TABLE: [i16; 256] = build_decode_table();

const fn build_decode_table() -> [i16; 256] {
    let mut table = [0i16; 256];
    let mut i = 0;
    while i < 256 {
        table[i] = expand(i as u8);
        i += 1;
    }
    table
}

const fn expand(mulaw: u8) -> i16 {
    let byte = !mulaw as i32;
    let sign = byte & 0x80;
    let segment = (byte >> 4) & 0x07;
    let mantissa = byte & 0x0F;

    // Midpoint of the quantisation interval, including the implicit leading bit
    let magnitude = (((mantissa << 1) | 0x21) << (segment + 2)) - MULAW_BIAS;

    if sign != 0 {
        -magnitude as i16
    } else {
        magnitude as i16
    }
}

/// Encode one linear sample to mu-law.
pub fn encode_sample(sample: i16) -> u8 {
    let sign: i32 = if sample < 0 { 0x80 } else { 0x00 };
    // Widen before negating: -i16::MIN does not fit in i16
    let magnitude = (sample as i32).abs().min(MULAW_CLIP) + MULAW_BIAS;

    // Biased magnitude is in 0x84..=0x7FFF, so its top bit sits at 7..=14
    let top_bit = 31 - (magnitude as u32).leading_zeros() as i32;
    let segment = (top_bit - 7).clamp(0, 7);
    let mantissa = (magnitude >> (segment + 3)) & 0x0F;

    !((sign | (segment << 4) | mantissa) as u8)
}

/// Decode one mu-law byte to a linear sample.
pub fn decode_sample(mulaw: u8) -> i16 {
    DECODE_TABLE[mulaw as usize]
}

/// Encode little-endian PCM16 bytes to mu-law, one output byte per sample.
///
/// A trailing odd byte is not a whole sample and is dropped.
pub fn pcm16_to_mulaw(pcm: &[u8]) -> Vec<u8> {
    pcm.chunks_exact(2)
        .map(|pair| encode_sample(i16::from_le_bytes([pair[0], pair[1]])))
        .collect()
}

/// Decode mu-law bytes to little-endian PCM16; output is twice the input length.
pub fn mulaw_to_pcm16(mulaw: &[u8]) -> Vec<u8> {
    let mut pcm = Vec::with_capacity(mulaw.len() * 2);
    for &byte in mulaw {
        pcm.extend_from_slice(&decode_sample(byte).to_le_bytes());
    }
    pcm
}

/// Decode mu-law bytes straight to samples.
pub fn decode_samples(mulaw: &[u8]) -> Vec<i16> {
    mulaw.iter().map(|&byte| decode_sample(byte)).collect()
}
