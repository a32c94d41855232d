//! Log output for the headless runner.
//!
//! Library crates log through the `log` facade. This installs a compact
//! `tracing` subscriber on stderr and forwards `log` records into it, so
//! engine and runner output end up in one stream filtered by `RUST_LOG`.

use std::sync::Once;

use tracing_log::LogTracer;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt};

/// Installs the global subscriber. Later calls are no-ops.
///
/// `default_filter` applies when `RUST_LOG` is unset, e.g. `"info"`.
pub fn init(default_filter: &str) {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_filter));
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr).compact());

        if tracing::subscriber::set_global_default(subscriber).is_ok() {
            // Another logger may already be installed by an embedding host.
            let _ = LogTracer::init();
        }
    });
}
