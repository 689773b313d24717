//! # Linear Resampler
//!
//! Sample-rate conversion for mono PCM16 by linear interpolation.
//!
//! ## Key Components:
//! - **`resample`**: stateless, one buffer at a time; every call starts at
//!   source position 0
//! - **`StreamResampler`**: per-call instance that carries the fractional
//!   source position and the previous chunk's last sample across frames, so
//!   chunk boundaries do not drift over a long call
//!
//! Source positions are tracked as exact fractions (`numerator / to_rate`)
//! rather than floats, so no error accumulates however many frames pass.
//!
//! ## Identity:
//! When the rates match, both forms hand back the input slice itself
//! (`Cow::Borrowed`). This runs once per frame in the live loop and must not
//! allocate.

use std::borrow::Cow;
use tracing::warn;

use crate::audio::buffer::{pcm16_bytes, pcm16_samples};

fn lerp(s0: i16, s1: i16, num: u64, den: u64) -> i16 {
    if num == 0 {
        return s0;
    }
    let frac = num as f64 / den as f64;
    let value = s0 as f64 + (s1 as f64 - s0 as f64) * frac;
    value.round().clamp(i16::MIN as f64, i16::MAX as f64) as i16
}

/// Output sample count for `input_samples` converted between the two rates.
pub fn output_sample_count(input_samples: usize, from_rate: u32, to_rate: u32) -> usize {
    if from_rate == 0 {
        return 0;
    }
    (input_samples as f64 * to_rate as f64 / from_rate as f64).round() as usize
}

/// Resample little-endian PCM16 from `from_rate` to `to_rate`.
///
/// ## Returns:
/// - **`Cow::Borrowed(pcm)`** when the rates are equal (no copy)
/// - **`Cow::Owned`** with `round(n * to / from)` samples otherwise
///
/// Positions past the last input sample clamp to it. A zero rate is not a
/// meaningful conversion and yields an empty buffer.
pub fn resample(pcm: &[u8], from_rate: u32, to_rate: u32) -> Cow<'_, [u8]> {
    if from_rate == to_rate {
        return Cow::Borrowed(pcm);
    }
    if from_rate == 0 || to_rate == 0 {
        warn!(from_rate, to_rate, "Refusing to resample with a zero sample rate");
        return Cow::Owned(Vec::new());
    }

    let input = pcm16_samples(pcm);
    if input.is_empty() {
        return Cow::Owned(Vec::new());
    }

    let last = input.len() - 1;
    let out_len = output_sample_count(input.len(), from_rate, to_rate);
    let (from, to) = (from_rate as u64, to_rate as u64);

    let mut output = Vec::with_capacity(out_len);
    for i in 0..out_len as u64 {
        // Source position of output sample i is i * from / to
        let pos = i * from;
        let idx = ((pos / to) as usize).min(last);
        let next = (idx + 1).min(last);
        output.push(lerp(input[idx], input[next], pos % to, to));
    }

    Cow::Owned(pcm16_bytes(&output))
}

/// Resampler that keeps its phase between successive chunks of one stream.
///
/// One instance belongs to one call leg and is dropped when the call ends.
#[derive(Debug, Clone)]
pub struct StreamResampler {
    from_rate: u32,
    to_rate: u32,
    /// Next output position relative to the start of the next chunk, in
    /// units of `1 / to_rate` source samples. Negative means "between the
    /// previous chunk's last sample and this chunk's first".
    phase: i64,
    last_sample: Option<i16>,
}

impl StreamResampler {
    pub fn new(from_rate: u32, to_rate: u32) -> Self {
        Self {
            from_rate,
            to_rate,
            phase: 0,
            last_sample: None,
        }
    }

    pub fn from_rate(&self) -> u32 {
        self.from_rate
    }

    pub fn to_rate(&self) -> u32 {
        self.to_rate
    }

    pub fn is_identity(&self) -> bool {
        self.from_rate == self.to_rate
    }

    /// Forget all carried state, as if the stream had just started.
    pub fn reset(&mut self) {
        self.phase = 0;
        self.last_sample = None;
    }

    /// Resample the next chunk of the stream.
    pub fn process<'a>(&mut self, pcm: &'a [u8]) -> Cow<'a, [u8]> {
        if self.is_identity() {
            return Cow::Borrowed(pcm);
        }
        if self.from_rate == 0 || self.to_rate == 0 {
            warn!(
                from_rate = self.from_rate,
                to_rate = self.to_rate,
                "Refusing to resample with a zero sample rate"
            );
            return Cow::Owned(Vec::new());
        }

        let input = pcm16_samples(pcm);
        if input.is_empty() {
            return Cow::Owned(Vec::new());
        }

        let to = self.to_rate as i64;
        let step = self.from_rate as i64;
        let n = input.len() as i64;
        let end = (n - 1) * to;

        let mut output = Vec::with_capacity(output_sample_count(input.len(), self.from_rate, self.to_rate) + 1);
        while self.phase <= end {
            let idx = self.phase.div_euclid(to);
            let rem = self.phase.rem_euclid(to) as u64;
            let sample = if idx < 0 {
                // Bridge from the previous chunk into this one
                let prev = self.last_sample.unwrap_or(input[0]);
                lerp(prev, input[0], rem, to as u64)
            } else {
                let idx = idx as usize;
                let next = (idx + 1).min(input.len() - 1);
                lerp(input[idx], input[next], rem, to as u64)
            };
            output.push(sample);
            self.phase += step;
        }

        self.phase -= n * to;
        self.last_sample = input.last().copied();

        Cow::Owned(pcm16_bytes(&output))
    }
}
