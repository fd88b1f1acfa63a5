//! Structured logging setup.
//!
//! Installs a `tracing-subscriber` formatter with environment-based
//! filtering. The `RUST_LOG` variable takes precedence; otherwise the level
//! from [`crate::config::Settings::log_level`] applies.

use once_cell::sync::OnceCell;
use tracing_subscriber::EnvFilter;

static INSTALLED: OnceCell<()> = OnceCell::new();

/// Install the global tracing subscriber.
///
/// Safe to call more than once; only the first call installs.
pub fn init(default_level: &str) {
    let default_level = default_level.to_string();
    INSTALLED.get_or_init(move || {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_level));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    });
}
