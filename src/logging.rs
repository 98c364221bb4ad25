//! Diagnostics for the bridge, via `tracing`.
//!
//! The library lives inside a JVM that may already host another Rust
//! component with its own subscriber, so installation is best effort: the
//! first subscriber wins and a second attempt is a no-op.

use std::sync::Once;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static INIT: Once = Once::new();

/// Builds the filter from `directives`, falling back to the default filter
/// when they do not parse.
pub fn build_filter(directives: &str) -> EnvFilter {
    EnvFilter::try_new(directives)
        .unwrap_or_else(|_| EnvFilter::new(crate::config::DEFAULT_LOG_FILTER))
}

/// Installs a stderr subscriber filtered by `directives`.
///
/// Returns `true` if this call installed it.
pub fn init_logging(directives: &str) -> bool {
    let mut installed = false;
    INIT.call_once(|| {
        let layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .compact()
            .with_filter(build_filter(directives));

        installed = tracing_subscriber::registry().with(layer).try_init().is_ok();
    });
    installed
}
