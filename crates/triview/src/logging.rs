//! Subscriber setup for `tracing` output.
//!
//! Triview only emits events; installing a subscriber is left to the
//! embedding harness. These helpers cover the two usual cases.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Directive used when `RUST_LOG` is unset
pub const DEFAULT_DIRECTIVE: &str = "triview=info";

fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Human-readable output captured by the test harness.
///
/// Safe to call from every test; only the first call installs anything.
pub fn init_test_tracing() {
    let _ = fmt()
        .with_env_filter(env_filter("triview=warn"))
        .with_test_writer()
        .try_init();
}

/// Structured JSON lines on stdout, for CI log collection.
///
/// Returns `false` when a global subscriber was already installed.
pub fn init_json_tracing() -> bool {
    let layer = fmt::layer().json().with_target(true);
    Registry::default()
        .with(env_filter(DEFAULT_DIRECTIVE))
        .with(layer)
        .try_init()
        .is_ok()
}
