//! Tracing subscriber setup for host binaries and tests.
//!
//! The engine itself only emits through `tracing`; installing a
//! subscriber is the host's call. These helpers install a global one,
//! filtered by `RUST_LOG`, and are safe to call more than once.

use std::sync::OnceLock;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: OnceLock<()> = OnceLock::new();

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Installs a human-readable global subscriber.
pub fn init_tracing() {
    INIT.get_or_init(|| {
        let _ = tracing_subscriber::registry()
            .with(env_filter())
            .with(tracing_subscriber::fmt::layer())
            .try_init();
    });
}

/// Installs a JSON-lines global subscriber, for machine-consumed logs.
pub fn init_json_tracing() {
    INIT.get_or_init(|| {
        let _ = tracing_subscriber::registry()
            .with(env_filter())
            .with(tracing_subscriber::fmt::layer().json())
            .try_init();
    });
}
