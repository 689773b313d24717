//! Tracing subscriber setup for hosts that have not installed their own.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "call_audio_bridge=info";

/// Install a console subscriber filtered by `RUST_LOG`, or `default_filter`
/// when the variable is absent.
///
/// ## Returns:
/// - **true**: this call installed the global subscriber
/// - **false**: one was already installed (left untouched)
pub fn init_tracing(default_filter: Option<&str>) -> bool {
    let fallback = default_filter.unwrap_or(DEFAULT_FILTER).to_string();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| fallback.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .is_ok()
}
