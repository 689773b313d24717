//! # Recording Writer
//!
//! Owns the on-disk file for a call's audio: the initial write, WAV
//! wrapping, and appends that keep the header's size fields equal to the
//! cumulative payload.
//!
//! All methods block on file I/O. Callers must serialise appends to the same
//! path (see `session::CallSession`); different paths are independent.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::borrow::Cow;
use std::fs::{self, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::audio::container::{self, WavHeader, WAV_HEADER_SIZE};
use crate::audio::format::AudioFormat;
use crate::config::RecordingConfig;
use crate::error::{AudioError, AudioResult};
use crate::recording::{AppendStrategy, RecordingFormat};

/// What a save or append left on disk.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordingInfo {
    pub file_path: PathBuf,
    pub size_bytes: u64,
    /// Seconds of audio. WAV files use the header's byte rate, PCM files
    /// assume the writer's profile.
    pub duration: f64,
    pub format: RecordingFormat,
    pub updated_at: DateTime<Utc>,
}

/// Writes and extends call recordings under one directory.
#[derive(Debug, Clone)]
pub struct RecordingWriter {
    directory: PathBuf,
    strategy: AppendStrategy,
    /// Assumed layout of bare PCM and of audio that needs wrapping.
    profile: AudioFormat,
}

impl RecordingWriter {
    pub fn new(directory: impl Into<PathBuf>, strategy: AppendStrategy) -> Self {
        Self {
            directory: directory.into(),
            strategy,
            profile: AudioFormat::STORAGE,
        }
    }

    pub fn from_config(config: &RecordingConfig) -> Self {
        Self::new(&config.directory, config.append_strategy)
    }

    /// Use a PCM profile other than the 16 kHz storage default.
    pub fn with_profile(mut self, profile: AudioFormat) -> Self {
        self.profile = profile;
        self
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn strategy(&self) -> AppendStrategy {
        self.strategy
    }

    /// File path used for a stream. Characters that could escape the
    /// recordings directory are replaced.
    pub fn path_for(&self, stream_id: &str, format: RecordingFormat) -> PathBuf {
        let safe: String = stream_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.directory.join(format!("{}.{}", safe, format.extension()))
    }

    /// Create (or replace) the recording for `stream_id`.
    ///
    /// In `wav` format, audio that is not already WAV-framed is wrapped with
    /// the writer's profile first.
    pub fn save(&self, stream_id: &str, format: RecordingFormat, audio: &[u8]) -> AudioResult<RecordingInfo> {
        fs::create_dir_all(&self.directory).map_err(|e| AudioError::from_io(e, &self.directory))?;

        let bytes: Cow<'_, [u8]> = match format {
            RecordingFormat::Wav if !container::is_wav(audio) => {
                Cow::Owned(container::wrap_with(audio, self.profile))
            }
            _ => Cow::Borrowed(audio),
        };

        let path = self.path_for(stream_id, format);
        fs::write(&path, &bytes).map_err(|e| AudioError::from_io(e, &path))?;

        let info = self.describe(&path, format, &bytes, bytes.len() as u64);
        info!(
            stream_id = %stream_id,
            path = %path.display(),
            size_bytes = info.size_bytes,
            duration = info.duration,
            "Recording created"
        );
        Ok(info)
    }

    /// Append a PCM chunk to an existing recording.
    ///
    /// WAV files keep a header that describes the full accumulated payload;
    /// anything else receives the chunk as raw bytes.
    ///
    /// ## Errors:
    /// - **FileNotFound**: the recording does not exist
    /// - **TooShort / InvalidFormat**: the existing WAV header is damaged
    pub fn append(&self, path: &Path, chunk: &[u8]) -> AudioResult<RecordingInfo> {
        let result = match self.strategy {
            AppendStrategy::Rewrite => self.append_rewrite(path, chunk),
            AppendStrategy::InPlace => self.append_in_place(path, chunk),
        };
        if let Err(AudioError::FileNotFound(_)) = &result {
            warn!(path = %path.display(), "Append target is missing");
        }
        result
    }

    fn append_rewrite(&self, path: &Path, chunk: &[u8]) -> AudioResult<RecordingInfo> {
        let existing = fs::read(path).map_err(|e| AudioError::from_io(e, path))?;

        if !container::is_wav(&existing) {
            let mut file = OpenOptions::new()
                .append(true)
                .open(path)
                .map_err(|e| AudioError::from_io(e, path))?;
            file.write_all(chunk).map_err(|e| AudioError::from_io(e, path))?;
            let size = (existing.len() + chunk.len()) as u64;
            debug!(path = %path.display(), chunk = chunk.len(), size, "Appended raw PCM");
            return Ok(self.pcm_info(path, size));
        }

        // The header lives at a fixed offset at the front, so a tail append
        // would leave it under-reporting. Rebuild the whole file instead.
        let header = WavHeader::parse(&existing)?;
        let payload = container::unwrap(&existing)?;
        let mut combined = Vec::with_capacity(payload.len() + chunk.len());
        combined.extend_from_slice(payload);
        combined.extend_from_slice(chunk);

        let wav = container::wrap(&combined, header.sample_rate, header.channels, header.bit_depth);
        fs::write(path, &wav).map_err(|e| AudioError::from_io(e, path))?;

        debug!(path = %path.display(), chunk = chunk.len(), data_size = combined.len(), "Rewrote WAV recording");
        Ok(self.describe(path, RecordingFormat::Wav, &wav, wav.len() as u64))
    }

    fn append_in_place(&self, path: &Path, chunk: &[u8]) -> AudioResult<RecordingInfo> {
        let io = |e| AudioError::from_io(e, path);
        let mut file = OpenOptions::new().read(true).write(true).open(path).map_err(io)?;

        let mut head = Vec::with_capacity(WAV_HEADER_SIZE);
        (&mut file).take(WAV_HEADER_SIZE as u64).read_to_end(&mut head).map_err(io)?;

        // Validate before touching the file so a damaged header is left as found
        let header = if container::is_wav(&head) {
            Some(WavHeader::parse(&head)?)
        } else {
            None
        };

        let end = file.seek(SeekFrom::End(0)).map_err(io)?;
        file.write_all(chunk).map_err(io)?;
        let size = end + chunk.len() as u64;

        let Some(header) = header else {
            debug!(path = %path.display(), chunk = chunk.len(), size, "Appended raw PCM");
            return Ok(self.pcm_info(path, size));
        };

        let data_size = (size - WAV_HEADER_SIZE as u64) as u32;
        container::patch_sizes(&mut file, data_size).map_err(io)?;
        file.flush().map_err(io)?;

        debug!(path = %path.display(), chunk = chunk.len(), data_size, "Patched WAV header in place");
        let patched = WavHeader { data_size, riff_size: 36u32.wrapping_add(data_size), ..header };
        Ok(RecordingInfo {
            file_path: path.to_path_buf(),
            size_bytes: size,
            duration: patched.duration_seconds(),
            format: RecordingFormat::Wav,
            updated_at: Utc::now(),
        })
    }

    /// Describe an existing recording from its header and size.
    pub fn inspect(&self, path: &Path) -> AudioResult<RecordingInfo> {
        let io = |e| AudioError::from_io(e, path);
        let mut file = fs::File::open(path).map_err(io)?;
        let size = file.metadata().map_err(io)?.len();

        let mut head = Vec::with_capacity(WAV_HEADER_SIZE);
        (&mut file).take(WAV_HEADER_SIZE as u64).read_to_end(&mut head).map_err(io)?;

        if container::is_wav(&head) {
            Ok(self.describe(path, RecordingFormat::Wav, &head, size))
        } else {
            Ok(self.pcm_info(path, size))
        }
    }

    /// Remove a recording.
    pub fn delete(&self, path: &Path) -> AudioResult<()> {
        fs::remove_file(path).map_err(|e| AudioError::from_io(e, path))?;
        info!(path = %path.display(), "Recording deleted");
        Ok(())
    }

    fn describe(&self, path: &Path, format: RecordingFormat, bytes: &[u8], size: u64) -> RecordingInfo {
        match format {
            RecordingFormat::Wav => {
                let duration = match WavHeader::parse(bytes) {
                    Ok(header) => header.duration_seconds(),
                    Err(err) => {
                        // Pre-framed input that only looked like WAV
                        warn!(path = %path.display(), error = %err, "Unreadable WAV header, assuming storage profile");
                        self.profile.duration_seconds(size.saturating_sub(WAV_HEADER_SIZE as u64) as usize)
                    }
                };
                RecordingInfo {
                    file_path: path.to_path_buf(),
                    size_bytes: size,
                    duration,
                    format,
                    updated_at: Utc::now(),
                }
            }
            RecordingFormat::Pcm => self.pcm_info(path, size),
        }
    }

    fn pcm_info(&self, path: &Path, size: u64) -> RecordingInfo {
        RecordingInfo {
            file_path: path.to_path_buf(),
            size_bytes: size,
            duration: self.profile.duration_seconds(size as usize),
            format: RecordingFormat::Pcm,
            updated_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn writer(dir: &TempDir, strategy: AppendStrategy) -> RecordingWriter {
        RecordingWriter::new(dir.path().join("calls"), strategy)
    }

    fn data_size(path: &Path) -> u32 {
        WavHeader::parse(&fs::read(path).unwrap()).unwrap().data_size
    }

    #[test]
    fn test_save_wraps_pcm_as_wav() {
        let dir = TempDir::new().unwrap();
        let writer = writer(&dir, AppendStrategy::Rewrite);

        let info = writer.save("call-1", RecordingFormat::Wav, &vec![0u8; 1000]).unwrap();
        assert_eq!(info.size_bytes, 1044);
        assert_eq!(fs::metadata(&info.file_path).unwrap().len(), 1044);
        assert!(info.file_path.ends_with("calls/call-1.wav"));
        // 1000 bytes at 32000 bytes/s
        assert!((info.duration - 0.03125).abs() < 1e-9);
    }

    #[test]
    fn test_save_keeps_prewrapped_wav() {
        let dir = TempDir::new().unwrap();
        let writer = writer(&dir, AppendStrategy::Rewrite);

        let wav = container::wrap(&vec![0u8; 800], 8000, 1, 16);
        let info = writer.save("call-2", RecordingFormat::Wav, &wav).unwrap();
        assert_eq!(info.size_bytes, 844);
        // Duration follows the embedded header, not the storage profile
        assert!((info.duration - 0.05).abs() < 1e-9);
    }

    #[test]
    fn test_save_raw_pcm() {
        let dir = TempDir::new().unwrap();
        let writer = writer(&dir, AppendStrategy::Rewrite);

        let info = writer.save("call-3", RecordingFormat::Pcm, &vec![0u8; 32000]).unwrap();
        assert_eq!(info.size_bytes, 32000);
        assert_eq!(info.format, RecordingFormat::Pcm);
        assert!((info.duration - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_rewrite_append_tracks_cumulative_size() {
        let dir = TempDir::new().unwrap();
        let writer = writer(&dir, AppendStrategy::Rewrite);

        let info = writer.save("call-4", RecordingFormat::Wav, &vec![0u8; 1000]).unwrap();
        writer.append(&info.file_path, &vec![1u8; 500]).unwrap();
        let info = writer.append(&info.file_path, &vec![2u8; 300]).unwrap();

        assert_eq!(data_size(&info.file_path), 1800);
        assert_eq!(info.size_bytes, 1844);

        let bytes = fs::read(&info.file_path).unwrap();
        let payload = container::unwrap(&bytes).unwrap();
        assert_eq!(&payload[1000..1500], vec![1u8; 500].as_slice());
        assert_eq!(&payload[1500..], vec![2u8; 300].as_slice());
    }

    #[test]
    fn test_in_place_append_tracks_cumulative_size() {
        let dir = TempDir::new().unwrap();
        let writer = writer(&dir, AppendStrategy::InPlace);

        let info = writer.save("call-5", RecordingFormat::Wav, &vec![0u8; 1000]).unwrap();
        writer.append(&info.file_path, &vec![1u8; 500]).unwrap();
        let info = writer.append(&info.file_path, &vec![2u8; 300]).unwrap();

        assert_eq!(data_size(&info.file_path), 1800);
        assert_eq!(info.size_bytes, 1844);
        assert_eq!(fs::metadata(&info.file_path).unwrap().len(), 1844);
        let header = WavHeader::parse(&fs::read(&info.file_path).unwrap()).unwrap();
        assert_eq!(header.riff_size, 1836);
        assert!((info.duration - 1800.0 / 32000.0).abs() < 1e-9);
    }

    #[test]
    fn test_strategies_produce_identical_files() {
        let dir = TempDir::new().unwrap();
        let rewrite = RecordingWriter::new(dir.path().join("a"), AppendStrategy::Rewrite);
        let in_place = RecordingWriter::new(dir.path().join("b"), AppendStrategy::InPlace);

        let mut paths = Vec::new();
        for writer in [&rewrite, &in_place] {
            let info = writer.save("same", RecordingFormat::Wav, &[9u8; 64]).unwrap();
            for i in 0..5u8 {
                writer.append(&info.file_path, &[i; 32]).unwrap();
            }
            paths.push(info.file_path);
        }
        assert_eq!(fs::read(&paths[0]).unwrap(), fs::read(&paths[1]).unwrap());
    }

    #[test]
    fn test_append_raw_pcm_file() {
        let dir = TempDir::new().unwrap();
        for strategy in [AppendStrategy::Rewrite, AppendStrategy::InPlace] {
            let writer = writer(&dir, strategy);
            let info = writer.save("raw", RecordingFormat::Pcm, &[1u8; 100]).unwrap();
            let info = writer.append(&info.file_path, &[2u8; 60]).unwrap();
            assert_eq!(info.size_bytes, 160);
            assert_eq!(info.format, RecordingFormat::Pcm);
            assert_eq!(fs::read(&info.file_path).unwrap().len(), 160);
        }
    }

    #[test]
    fn test_append_missing_file() {
        let dir = TempDir::new().unwrap();
        for strategy in [AppendStrategy::Rewrite, AppendStrategy::InPlace] {
            let writer = writer(&dir, strategy);
            let missing = dir.path().join("nope.wav");
            let err = writer.append(&missing, &[0u8; 10]).unwrap_err();
            assert!(matches!(err, AudioError::FileNotFound(ref p) if p == &missing));
            assert!(!missing.exists());
        }
    }

    #[test]
    fn test_inspect_and_delete() {
        let dir = TempDir::new().unwrap();
        let writer = writer(&dir, AppendStrategy::Rewrite);
        let saved = writer.save("call-6", RecordingFormat::Wav, &vec![0u8; 3200]).unwrap();

        let inspected = writer.inspect(&saved.file_path).unwrap();
        assert_eq!(inspected.size_bytes, 3244);
        assert_eq!(inspected.format, RecordingFormat::Wav);
        assert!((inspected.duration - 0.1).abs() < 1e-9);

        writer.delete(&saved.file_path).unwrap();
        assert!(matches!(writer.delete(&saved.file_path), Err(AudioError::FileNotFound(_))));
        assert!(matches!(writer.inspect(&saved.file_path), Err(AudioError::FileNotFound(_))));
    }

    #[test]
    fn test_stream_id_is_sanitised() {
        let writer = RecordingWriter::new("/data", AppendStrategy::Rewrite);
        let path = writer.path_for("../etc/passwd", RecordingFormat::Pcm);
        assert_eq!(path, PathBuf::from("/data/___etc_passwd.pcm"));
    }

    #[test]
    fn test_info_serializes() {
        let info = RecordingInfo {
            file_path: PathBuf::from("/data/a.wav"),
            size_bytes: 44,
            duration: 0.0,
            format: RecordingFormat::Wav,
            updated_at: Utc::now(),
        };
        let json = serde_json::to_string(&info).unwrap();
        assert!(json.contains("\"format\":\"wav\""));
        assert!(json.contains("\"size_bytes\":44"));
        assert!(json.contains("\"updated_at\""));
    }
}
