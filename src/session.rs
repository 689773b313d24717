//! # Call Session Management
//!
//! One `CallSession` per live call. It owns the call's stream pipeline and
//! its recording, and is dropped when the call ends.
//!
//! ## Concurrency:
//! - **Pipeline**: behind a std `Mutex`, held only for in-memory conversion
//! - **Recording**: behind a `tokio::sync::Mutex` held across the blocking
//!   file write (run on `spawn_blocking`), so one call's appends are applied
//!   strictly in order
//! - **Across calls**: nothing is shared except the registry map and the
//!   atomic counters, so calls never wait on each other's file I/O
//!
//! ## Session Lifecycle:
//! 1. **Active**: converting frames, recording created on first chunk
//! 2. **Completed**: call ended normally
//! 3. **Error**: recording abandoned after a fatal write failure

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::audio::pipeline::StreamPipeline;
use crate::config::BridgeConfig;
use crate::error::{AudioError, AudioResult};
use crate::recording::{RecordingFormat, RecordingInfo, RecordingWriter};
use crate::state::BridgeMetrics;

/// Current status of a call session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionStatus {
    Active,
    Completed,
    Error(String),
}

impl SessionStatus {
    pub fn as_str(&self) -> &str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Completed => "completed",
            SessionStatus::Error(_) => "error",
        }
    }
}

#[derive(Debug)]
enum RecordingSlot {
    Absent,
    Active(RecordingInfo),
    Abandoned(String),
}

/// Per-call counters.
#[derive(Debug, Default, Clone)]
pub struct SessionStats {
    pub frames_in: u64,
    pub frames_out: u64,
    pub chunks_recorded: u64,
    pub bytes_recorded: u64,
}

/// Result of ingesting one inbound frame.
///
/// The speech text is always produced; recording is a side effect whose
/// failure does not hold back the live leg.
#[derive(Debug)]
pub struct FrameOutcome {
    /// Base64 PCM for the speech AI endpoint
    pub speech: String,
    /// `None` when the frame carried no audio to record
    pub recording: Option<AudioResult<RecordingInfo>>,
}

/// Audio state for a single live call.
pub struct CallSession {
    pub stream_id: String,
    pub created_at: DateTime<Utc>,
    status: RwLock<SessionStatus>,
    pipeline: Mutex<StreamPipeline>,
    recording: tokio::sync::Mutex<RecordingSlot>,
    writer: RecordingWriter,
    format: RecordingFormat,
    stats: RwLock<SessionStats>,
    metrics: Arc<BridgeMetrics>,
}

impl CallSession {
    pub fn new(
        stream_id: String,
        writer: RecordingWriter,
        format: RecordingFormat,
        stateful_resampling: bool,
        metrics: Arc<BridgeMetrics>,
    ) -> Self {
        Self {
            stream_id,
            created_at: Utc::now(),
            status: RwLock::new(SessionStatus::Active),
            pipeline: Mutex::new(StreamPipeline::new(stateful_resampling)),
            recording: tokio::sync::Mutex::new(RecordingSlot::Absent),
            writer,
            format,
            stats: RwLock::new(SessionStats::default()),
            metrics,
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn set_status(&self, status: SessionStatus) {
        *self.status.write().unwrap_or_else(|e| e.into_inner()) = status;
    }

    pub fn stats(&self) -> SessionStats {
        self.stats.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn with_pipeline<T>(&self, f: impl FnOnce(&mut StreamPipeline) -> T) -> T {
        let mut pipeline = self.pipeline.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut pipeline)
    }

    fn count_frame_in(&self) {
        self.stats.write().unwrap_or_else(|e| e.into_inner()).frames_in += 1;
        self.metrics.record_frame();
    }

    /// Telephony frame → base64 PCM for the speech AI endpoint.
    pub fn to_speech_ai(&self, base64_telephony: &str) -> String {
        self.count_frame_in();
        self.with_pipeline(|p| p.to_speech_ai(base64_telephony))
    }

    /// Telephony frame → storage-rate PCM.
    pub fn to_storage(&self, base64_telephony: &str) -> Vec<u8> {
        self.count_frame_in();
        self.with_pipeline(|p| p.to_storage(base64_telephony))
    }

    /// Speech AI reply → base64 mu-law for the telephony gateway.
    pub fn from_speech_ai(&self, base64_speech: &str) -> String {
        self.stats.write().unwrap_or_else(|e| e.into_inner()).frames_out += 1;
        self.metrics.record_frame();
        self.with_pipeline(|p| p.from_speech_ai(base64_speech))
    }

    /// Convert one inbound frame for the speech AI and record its storage form.
    ///
    /// The speech text is returned even when the recording write fails, so
    /// a broken recording never interrupts the live conversation.
    pub async fn ingest_frame(&self, base64_telephony: &str) -> FrameOutcome {
        self.count_frame_in();
        let (speech, storage) = self.with_pipeline(|p| p.split(base64_telephony));
        let recording = if storage.is_empty() {
            None
        } else {
            Some(self.record(storage).await)
        };
        FrameOutcome { speech, recording }
    }

    /// Persist a storage-rate chunk: creates the recording on first use and
    /// appends afterwards.
    ///
    /// ## Errors:
    /// - **RecordingAbandoned**: an earlier write failed fatally
    /// - **FileNotFound**: the file disappeared mid-call; the recording is
    ///   abandoned and not retried
    pub async fn record(&self, chunk: Vec<u8>) -> AudioResult<RecordingInfo> {
        let mut slot = self.recording.lock().await;

        let chunk_len = chunk.len() as u64;
        let writer = self.writer.clone();
        let result = match &*slot {
            RecordingSlot::Abandoned(reason) => {
                debug!(stream_id = %self.stream_id, reason = %reason, "Dropping chunk for abandoned recording");
                return Err(AudioError::RecordingAbandoned(self.stream_id.clone()));
            }
            RecordingSlot::Absent => {
                let stream_id = self.stream_id.clone();
                let format = self.format;
                run_blocking(move || writer.save(&stream_id, format, &chunk)).await
            }
            RecordingSlot::Active(info) => {
                let path = info.file_path.clone();
                run_blocking(move || writer.append(&path, &chunk)).await
            }
        };

        match result {
            Ok(info) => {
                {
                    let mut stats = self.stats.write().unwrap_or_else(|e| e.into_inner());
                    stats.chunks_recorded += 1;
                    stats.bytes_recorded += chunk_len;
                }
                self.metrics.record_bytes(chunk_len);
                *slot = RecordingSlot::Active(info.clone());
                Ok(info)
            }
            Err(err @ AudioError::FileNotFound(_)) => {
                warn!(stream_id = %self.stream_id, error = %err, "Recording abandoned");
                self.metrics.record_failure();
                *slot = RecordingSlot::Abandoned(err.to_string());
                self.set_status(SessionStatus::Error(err.to_string()));
                Err(err)
            }
            Err(err) => {
                warn!(stream_id = %self.stream_id, error = %err, "Recording write failed");
                self.metrics.record_failure();
                Err(err)
            }
        }
    }

    /// Latest state of the recording, if one exists.
    pub async fn recording_info(&self) -> Option<RecordingInfo> {
        match &*self.recording.lock().await {
            RecordingSlot::Active(info) => Some(info.clone()),
            _ => None,
        }
    }

    /// Mark the call finished. Waits for any in-flight append, then returns
    /// the final recording description.
    pub async fn finish(&self) -> Option<RecordingInfo> {
        let slot = self.recording.lock().await;
        if self.status() == SessionStatus::Active {
            self.set_status(SessionStatus::Completed);
        }
        let stats = self.stats();
        info!(
            stream_id = %self.stream_id,
            frames_in = stats.frames_in,
            bytes_recorded = stats.bytes_recorded,
            status = self.status().as_str(),
            "Call session finished"
        );
        match &*slot {
            RecordingSlot::Active(info) => Some(info.clone()),
            _ => None,
        }
    }
}

async fn run_blocking<F>(task: F) -> AudioResult<RecordingInfo>
where
    F: FnOnce() -> AudioResult<RecordingInfo> + Send + 'static,
{
    tokio::task::spawn_blocking(task).await.map_err(|e| {
        AudioError::Io(std::io::Error::new(std::io::ErrorKind::Other, format!("recording task failed: {}", e)))
    })?
}

/// Settings handed to each new session. Live sessions keep the ones they
/// were created with.
#[derive(Debug, Clone)]
struct SessionSettings {
    max_concurrent_sessions: usize,
    writer: RecordingWriter,
    format: RecordingFormat,
    stateful_resampling: bool,
}

/// Registry of live call sessions keyed by stream id.
pub struct SessionManager {
    sessions: Arc<RwLock<HashMap<String, Arc<CallSession>>>>,
    settings: RwLock<SessionSettings>,
    metrics: Arc<BridgeMetrics>,
}

impl SessionManager {
    pub fn new(
        max_concurrent_sessions: usize,
        writer: RecordingWriter,
        format: RecordingFormat,
        stateful_resampling: bool,
        metrics: Arc<BridgeMetrics>,
    ) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            settings: RwLock::new(SessionSettings {
                max_concurrent_sessions,
                writer,
                format,
                stateful_resampling,
            }),
            metrics,
        }
    }

    pub fn from_config(config: &BridgeConfig, metrics: Arc<BridgeMetrics>) -> Self {
        Self::new(
            config.sessions.max_concurrent_sessions,
            RecordingWriter::from_config(&config.recording),
            config.recording.default_format,
            config.streaming.stateful_resampling,
            metrics,
        )
    }

    /// Apply recording, streaming and limit settings to sessions created
    /// from now on.
    pub fn apply_config(&self, config: &BridgeConfig) {
        let mut settings = self.settings.write().unwrap_or_else(|e| e.into_inner());
        *settings = SessionSettings {
            max_concurrent_sessions: config.sessions.max_concurrent_sessions,
            writer: RecordingWriter::from_config(&config.recording),
            format: config.recording.default_format,
            stateful_resampling: config.streaming.stateful_resampling,
        };
        debug!(
            directory = %config.recording.directory,
            max_sessions = settings.max_concurrent_sessions,
            "Session settings updated"
        );
    }

    pub fn max_concurrent_sessions(&self) -> usize {
        self.settings.read().unwrap_or_else(|e| e.into_inner()).max_concurrent_sessions
    }

    /// Register a new call. A UUID is generated when no stream id is given.
    ///
    /// ## Errors:
    /// - **SessionLimit**: already at `max_concurrent_sessions`
    /// - **DuplicateSession**: the stream id is taken
    pub fn create_session(&self, stream_id: Option<String>) -> AudioResult<Arc<CallSession>> {
        let settings = self.settings.read().unwrap_or_else(|e| e.into_inner()).clone();
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());

        if sessions.len() >= settings.max_concurrent_sessions {
            return Err(AudioError::SessionLimit(settings.max_concurrent_sessions));
        }

        let stream_id = stream_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        if sessions.contains_key(&stream_id) {
            return Err(AudioError::DuplicateSession(stream_id));
        }

        let session = Arc::new(CallSession::new(
            stream_id.clone(),
            settings.writer,
            settings.format,
            settings.stateful_resampling,
            Arc::clone(&self.metrics),
        ));
        sessions.insert(stream_id.clone(), Arc::clone(&session));
        self.metrics.record_session();

        info!(stream_id = %stream_id, active = sessions.len(), "Call session started");
        Ok(session)
    }

    pub fn get_session(&self, stream_id: &str) -> Option<Arc<CallSession>> {
        let sessions = self.sessions.read().unwrap_or_else(|e| e.into_inner());
        sessions.get(stream_id).cloned()
    }

    /// Drop a session from the registry. Its resampler state goes with it.
    pub fn remove_session(&self, stream_id: &str) -> Option<Arc<CallSession>> {
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        sessions.remove(stream_id)
    }

    /// Finish and remove a session, returning its final recording.
    pub async fn end_session(&self, stream_id: &str) -> AudioResult<Option<RecordingInfo>> {
        let session = self
            .remove_session(stream_id)
            .ok_or_else(|| AudioError::SessionNotFound(stream_id.to_string()))?;
        Ok(session.finish().await)
    }

    pub fn active_session_count(&self) -> usize {
        self.sessions.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn active_session_ids(&self) -> Vec<String> {
        let sessions = self.sessions.read().unwrap_or_else(|e| e.into_inner());
        sessions.keys().cloned().collect()
    }

    /// Remove finished or failed sessions, and any older than `max_age_seconds`.
    pub fn cleanup_old_sessions(&self, max_age_seconds: u64) -> usize {
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        let now = Utc::now();
        let before = sessions.len();

        sessions.retain(|_, session| {
            let age = now.signed_duration_since(session.created_at).num_seconds();
            session.status() == SessionStatus::Active && age <= max_age_seconds as i64
        });

        let removed = before - sessions.len();
        if removed > 0 {
            debug!(removed, "Cleaned up call sessions");
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::container::WavHeader;
    use crate::audio::{codec, framing};
    use crate::recording::AppendStrategy;
    use tempfile::TempDir;

    fn manager(dir: &TempDir, max: usize) -> SessionManager {
        SessionManager::new(
            max,
            RecordingWriter::new(dir.path(), AppendStrategy::Rewrite),
            RecordingFormat::Wav,
            false,
            Arc::new(BridgeMetrics::default()),
        )
    }

    fn frame() -> String {
        // 80 mu-law bytes, 10 ms of telephony audio
        framing::encode(&codec::pcm16_to_mulaw(&vec![0x10u8; 160]))
    }

    #[test]
    fn test_session_limits() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir, 2);

        let first = manager.create_session(Some("a".to_string())).unwrap();
        assert_eq!(first.stream_id, "a");
        assert!(matches!(
            manager.create_session(Some("a".to_string())),
            Err(AudioError::DuplicateSession(_))
        ));

        let generated = manager.create_session(None).unwrap();
        assert!(Uuid::parse_str(&generated.stream_id).is_ok());

        assert!(matches!(manager.create_session(None), Err(AudioError::SessionLimit(2))));
        assert_eq!(manager.active_session_count(), 2);

        assert!(manager.remove_session("a").is_some());
        assert!(manager.get_session("a").is_none());
        assert_eq!(manager.active_session_count(), 1);
    }

    #[tokio::test]
    async fn test_ingest_records_cumulative_wav() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir, 4);
        let session = manager.create_session(Some("call".to_string())).unwrap();

        for _ in 0..5 {
            let outcome = session.ingest_frame(&frame()).await;
            assert_eq!(framing::decode(&outcome.speech).len(), 480);
            assert!(outcome.recording.unwrap().is_ok());
        }

        let info = session.recording_info().await.unwrap();
        let header = WavHeader::parse(&std::fs::read(&info.file_path).unwrap()).unwrap();
        // 5 frames x 160 samples at 16 kHz x 2 bytes
        assert_eq!(header.data_size, 5 * 320);
        assert_eq!(session.stats().chunks_recorded, 5);

        let final_info = manager.end_session("call").await.unwrap().unwrap();
        assert_eq!(final_info.size_bytes, 44 + 5 * 320);
        assert_eq!(session.status(), SessionStatus::Completed);
        assert!(matches!(manager.end_session("call").await, Err(AudioError::SessionNotFound(_))));
    }

    #[tokio::test]
    async fn test_missing_file_abandons_recording() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir, 4);
        let session = manager.create_session(Some("lost".to_string())).unwrap();

        let info = session.record(vec![0u8; 320]).await.unwrap();
        std::fs::remove_file(&info.file_path).unwrap();

        let err = session.record(vec![0u8; 320]).await.unwrap_err();
        assert!(matches!(err, AudioError::FileNotFound(_)));
        assert!(matches!(session.status(), SessionStatus::Error(_)));

        // Not retried: later chunks fail fast and no file is recreated
        let err = session.record(vec![0u8; 320]).await.unwrap_err();
        assert!(matches!(err, AudioError::RecordingAbandoned(_)));
        assert!(!info.file_path.exists());

        assert_eq!(manager.cleanup_old_sessions(3600), 1);
    }

    #[tokio::test]
    async fn test_speech_survives_abandoned_recording() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir, 4);
        let session = manager.create_session(Some("keep-talking".to_string())).unwrap();

        let first = session.ingest_frame(&frame()).await;
        let info = first.recording.unwrap().unwrap();
        std::fs::remove_file(&info.file_path).unwrap();

        let second = session.ingest_frame(&frame()).await;
        assert_eq!(framing::decode(&second.speech).len(), 480);
        assert!(matches!(second.recording, Some(Err(AudioError::FileNotFound(_)))));

        let third = session.ingest_frame(&frame()).await;
        assert_eq!(framing::decode(&third.speech).len(), 480);
        assert!(matches!(third.recording, Some(Err(AudioError::RecordingAbandoned(_)))));

        assert_eq!(session.stats().frames_in, 3);
        assert!(!info.file_path.exists());
    }

    #[tokio::test]
    async fn test_empty_frame_records_nothing() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir, 1);
        let session = manager.create_session(None).unwrap();

        let outcome = session.ingest_frame("").await;
        assert!(outcome.speech.is_empty());
        assert!(outcome.recording.is_none());
        assert!(session.recording_info().await.is_none());
    }

    #[tokio::test]
    async fn test_applied_config_reaches_new_sessions_only() {
        let dir = TempDir::new().unwrap();
        let moved = TempDir::new().unwrap();
        let manager = manager(&dir, 4);
        let before = manager.create_session(Some("before".to_string())).unwrap();

        let mut config = BridgeConfig::default();
        config.recording.directory = moved.path().to_string_lossy().into_owned();
        config.recording.default_format = RecordingFormat::Pcm;
        config.sessions.max_concurrent_sessions = 2;
        manager.apply_config(&config);
        assert_eq!(manager.max_concurrent_sessions(), 2);

        let after = manager.create_session(Some("after".to_string())).unwrap();
        let old = before.record(vec![0u8; 64]).await.unwrap();
        let new = after.record(vec![0u8; 64]).await.unwrap();

        assert!(old.file_path.starts_with(dir.path()));
        assert_eq!(old.size_bytes, 108);
        assert!(new.file_path.starts_with(moved.path()));
        assert_eq!(new.size_bytes, 64);
        assert!(matches!(manager.create_session(None), Err(AudioError::SessionLimit(2))));
    }

    #[tokio::test]
    async fn test_concurrent_appends_are_serialised() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir, 4);
        let session = manager.create_session(Some("busy".to_string())).unwrap();
        session.record(Vec::new()).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..20u8 {
            let session = Arc::clone(&session);
            handles.push(tokio::spawn(async move { session.record(vec![i; 100]).await }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let info = session.recording_info().await.unwrap();
        let header = WavHeader::parse(&std::fs::read(&info.file_path).unwrap()).unwrap();
        assert_eq!(header.data_size, 2000);
        assert_eq!(info.size_bytes, 2044);
    }

    #[tokio::test]
    async fn test_sessions_record_independently() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir, 4);
        let a = manager.create_session(Some("a".to_string())).unwrap();
        let b = manager.create_session(Some("b".to_string())).unwrap();

        a.record(vec![1u8; 100]).await.unwrap();
        b.record(vec![2u8; 60]).await.unwrap();
        a.record(vec![1u8; 100]).await.unwrap();

        assert_eq!(a.recording_info().await.unwrap().size_bytes, 244);
        assert_eq!(b.recording_info().await.unwrap().size_bytes, 104);
    }

    #[test]
    fn test_reply_leg_conversion() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir, 1);
        let session = manager.create_session(None).unwrap();
        let reply = framing::encode(&vec![0u8; 960]);
        assert_eq!(framing::decode(&session.from_speech_ai(&reply)).len(), 160);
        assert_eq!(session.stats().frames_out, 1);
    }
}
