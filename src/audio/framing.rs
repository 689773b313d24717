//! # Base64 Framing
//!
//! Transport-safe text encoding for raw audio bytes. Both the telephony
//! gateway and the speech AI endpoint exchange audio as base64 text inside
//! their own message envelopes.
//!
//! Callers are trusted internal components, so decoding never fails: padding
//! is optional, characters outside the alphabet are skipped, input stops at
//! the first pad character, and a dangling final character is dropped.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD};
use base64::engine::DecodePaddingMode;
use base64::Engine as _;
use tracing::warn;

/// Lenient decoder: padding optional, trailing bits tolerated.
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Encode bytes as standard padded base64. Empty input gives an empty string.
pub fn encode(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Decode base64 text, best effort.
pub fn decode(text: &str) -> Vec<u8> {
    if text.is_empty() {
        return Vec::new();
    }

    // Fast path for well-formed frames
    if let Ok(bytes) = STANDARD.decode(text) {
        return bytes;
    }

    // Anything after the first pad character is not part of this frame
    let body = text.split('=').next().unwrap_or_default();
    let mut cleaned: Vec<u8> = body
        .bytes()
        .filter(|b| b.is_ascii_alphanumeric() || *b == b'+' || *b == b'/')
        .collect();
    // A single leftover character cannot carry a whole byte
    if cleaned.len() % 4 == 1 {
        cleaned.pop();
    }

    match LENIENT.decode(&cleaned) {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(error = %err, len = text.len(), "Discarding undecodable base64 frame");
            Vec::new()
        }
    }
}
