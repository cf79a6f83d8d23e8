//! Structured logging setup.
//!
//! One `tracing` subscriber for the whole process, installed at most once —
//! tests build many [`crate::state::AppState`]s and must not try to install a
//! second global subscriber.

use std::sync::Once;

use tracing_subscriber::EnvFilter;

use crate::config::Config;

static INIT: Once = Once::new();

/// Initialize the global tracing subscriber from `config.service.log_level`.
/// Safe to call more than once; only the first call takes effect.
pub fn init_tracing(config: &Config) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_new(&config.service.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
        tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
        tracing::info!(fqdn = %config.service.fqdn, "tracing initialized");
    });
}

/// Install a panic hook that logs through `tracing` instead of writing to stderr
/// directly, so a panic on a background task still ends up in structured logs.
pub fn install_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        tracing::error!(panic = %info, "panicked");
    }));
}
