//! Logging Initialization
//!
//! Configures tracing-subscriber for structured logging. Embedders that
//! install their own subscriber can skip this entirely; the core only emits
//! `tracing` events.

use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

/// Initialize logging with the given default level
///
/// `RUST_LOG` overrides the level when set. Safe to call more than once; only
/// the first subscriber wins.
pub fn init_logging(level: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_ansi(true);

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init();
}

/// Initialize logging with defaults (for quick start or tests)
pub fn init_default_logging() {
    init_logging("info");
}
