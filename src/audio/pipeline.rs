//! # Format Pipeline
//!
//! Named conversions between the telephony, speech AI and storage formats,
//! composed from framing, codec and resampler steps.
//!
//! ## Conversions:
//! - **`to_speech_ai`**: base64 mu-law 8k → base64 PCM16 24k
//! - **`to_storage`**: base64 mu-law 8k → PCM16 16k bytes
//! - **`to_raw_pcm`**: base64 mu-law 8k → PCM16 8k bytes
//! - **`from_speech_ai`**: base64 PCM16 24k → base64 mu-law 8k (reply leg)
//!
//! Empty input is empty output at every step, never an error. The free
//! functions are stateless; [`StreamPipeline`] is the per-call variant that
//! keeps resampler phase between frames.

use std::borrow::Cow;
use tracing::trace;

use crate::audio::codec;
use crate::audio::format::AudioFormat;
use crate::audio::framing;
use crate::audio::resampler::{resample, StreamResampler};

/// Telephony frame → base64 text for the speech AI endpoint.
pub fn to_speech_ai(base64_telephony: &str) -> String {
    let pcm = decode_telephony(base64_telephony);
    let upsampled = resample(
        &pcm,
        AudioFormat::TELEPHONY.sample_rate,
        AudioFormat::SPEECH_AI.sample_rate,
    );
    trace!(pcm_bytes = pcm.len(), out_bytes = upsampled.len(), "telephony -> speech AI");
    framing::encode(&upsampled)
}

/// Telephony frame → PCM16 bytes at the storage rate.
pub fn to_storage(base64_telephony: &str) -> Vec<u8> {
    let pcm = decode_telephony(base64_telephony);
    resample(
        &pcm,
        AudioFormat::TELEPHONY.sample_rate,
        AudioFormat::STORAGE.sample_rate,
    )
    .into_owned()
}

/// Telephony frame → PCM16 bytes at 8 kHz, no resampling.
pub fn to_raw_pcm(base64_telephony: &str) -> Vec<u8> {
    decode_telephony(base64_telephony)
}

/// Speech AI audio (base64 PCM16 24k) → base64 mu-law for the telephony gateway.
pub fn from_speech_ai(base64_speech: &str) -> String {
    let pcm = framing::decode(base64_speech);
    let downsampled = resample(
        &pcm,
        AudioFormat::SPEECH_AI.sample_rate,
        AudioFormat::TELEPHONY.sample_rate,
    );
    framing::encode(&codec::pcm16_to_mulaw(&downsampled))
}

fn decode_telephony(base64_telephony: &str) -> Vec<u8> {
    codec::mulaw_to_pcm16(&framing::decode(base64_telephony))
}

/// Per-call pipeline that carries resampler phase across frames.
///
/// Produces the same formats as the free functions; only chunk boundaries
/// differ. Owned by exactly one call session and dropped with it.
#[derive(Debug, Clone)]
pub struct StreamPipeline {
    stateful: bool,
    to_speech: StreamResampler,
    to_storage: StreamResampler,
    from_speech: StreamResampler,
}

impl StreamPipeline {
    /// `stateful = false` makes every method behave exactly like the
    /// corresponding free function.
    pub fn new(stateful: bool) -> Self {
        let telephony = AudioFormat::TELEPHONY.sample_rate;
        Self {
            stateful,
            to_speech: StreamResampler::new(telephony, AudioFormat::SPEECH_AI.sample_rate),
            to_storage: StreamResampler::new(telephony, AudioFormat::STORAGE.sample_rate),
            from_speech: StreamResampler::new(AudioFormat::SPEECH_AI.sample_rate, telephony),
        }
    }

    pub fn is_stateful(&self) -> bool {
        self.stateful
    }

    fn run<'a>(stateful: bool, resampler: &mut StreamResampler, pcm: &'a [u8]) -> Cow<'a, [u8]> {
        if stateful {
            resampler.process(pcm)
        } else {
            resample(pcm, resampler.from_rate(), resampler.to_rate())
        }
    }

    pub fn to_speech_ai(&mut self, base64_telephony: &str) -> String {
        let pcm = decode_telephony(base64_telephony);
        framing::encode(&Self::run(self.stateful, &mut self.to_speech, &pcm))
    }

    pub fn to_storage(&mut self, base64_telephony: &str) -> Vec<u8> {
        let pcm = decode_telephony(base64_telephony);
        Self::run(self.stateful, &mut self.to_storage, &pcm).into_owned()
    }

    /// Both outputs from one decode of the frame.
    pub fn split(&mut self, base64_telephony: &str) -> (String, Vec<u8>) {
        let pcm = decode_telephony(base64_telephony);
        let speech = framing::encode(&Self::run(self.stateful, &mut self.to_speech, &pcm));
        let storage = Self::run(self.stateful, &mut self.to_storage, &pcm).into_owned();
        (speech, storage)
    }

    pub fn from_speech_ai(&mut self, base64_speech: &str) -> String {
        let pcm = framing::decode(base64_speech);
        let downsampled = Self::run(self.stateful, &mut self.from_speech, &pcm);
        framing::encode(&codec::pcm16_to_mulaw(&downsampled))
    }

    /// Drop carried phase on every leg.
    pub fn reset(&mut self) {
        self.to_speech.reset();
        self.to_storage.reset();
        self.from_speech.reset();
    }
}
