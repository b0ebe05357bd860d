//! Tracing Initialization
//!
//! Configures the global `tracing` subscriber: an `EnvFilter` honoring
//! `RUST_LOG` with a sane default directive for this crate, plus a
//! compact fmt layer.
//!
//! # Usage
//!
//! ```ignore
//! fx_feed_client::infrastructure::telemetry::init();
//! tracing::info!("ready");
//! ```

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Initialize the global subscriber. Safe to call more than once; later
/// calls are no-ops (tests initialize independently).
pub fn init() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("fx_feed_client=info"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init();
}
