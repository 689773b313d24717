//! # Bridge State
//!
//! Shared state handed to the call-session layer: configuration, the session
//! registry and process-wide counters.
//!
//! ## Thread Safety Pattern:
//! - **Config**: `Arc<RwLock<BridgeConfig>>`, many readers, rare runtime updates
//! - **Metrics**: atomics, bumped from every call's hot path without locking
//! - **Sessions**: the registry does its own locking

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Instant;
use tracing::info;

use crate::config::BridgeConfig;
use crate::session::SessionManager;

/// Process-wide counters across all calls.
#[derive(Debug, Default)]
pub struct BridgeMetrics {
    frames_converted: AtomicU64,
    bytes_recorded: AtomicU64,
    recording_failures: AtomicU64,
    sessions_started: AtomicU64,
}

impl BridgeMetrics {
    pub fn record_frame(&self) {
        self.frames_converted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_bytes(&self, bytes: u64) {
        self.bytes_recorded.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.recording_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_session(&self) {
        self.sessions_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            frames_converted: self.frames_converted.load(Ordering::Relaxed),
            bytes_recorded: self.bytes_recorded.load(Ordering::Relaxed),
            recording_failures: self.recording_failures.load(Ordering::Relaxed),
            sessions_started: self.sessions_started.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub frames_converted: u64,
    pub bytes_recorded: u64,
    pub recording_failures: u64,
    pub sessions_started: u64,
}

/// Everything the surrounding call-session code needs from the bridge.
#[derive(Clone)]
pub struct BridgeState {
    pub config: Arc<RwLock<BridgeConfig>>,
    pub metrics: Arc<BridgeMetrics>,
    pub sessions: Arc<SessionManager>,
    pub start_time: Instant,
}

impl BridgeState {
    pub fn new(config: BridgeConfig) -> Self {
        let metrics = Arc::new(BridgeMetrics::default());
        let sessions = Arc::new(SessionManager::from_config(&config, Arc::clone(&metrics)));
        info!(
            directory = %config.recording.directory,
            format = config.recording.default_format.extension(),
            stateful_resampling = config.streaming.stateful_resampling,
            "Audio bridge initialised"
        );
        Self {
            config: Arc::new(RwLock::new(config)),
            metrics,
            sessions,
            start_time: Instant::now(),
        }
    }

    pub fn get_config(&self) -> BridgeConfig {
        self.config.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Apply a partial JSON update.
    ///
    /// Sessions created afterwards use the new recording, streaming and limit
    /// settings; calls already in progress keep the ones they started with.
    pub fn update_config(&self, json: &str) -> anyhow::Result<()> {
        let mut config = self.config.write().unwrap_or_else(|e| e.into_inner());
        config.update_from_json(json)?;
        self.sessions.apply_config(&config);
        info!(directory = %config.recording.directory, "Configuration updated");
        Ok(())
    }

    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Sweep sessions past the configured age or already finished.
    pub fn cleanup_sessions(&self) -> usize {
        let max_age = self.get_config().sessions.max_session_age_secs;
        self.sessions.cleanup_old_sessions(max_age)
    }
}
