//! Optional structured-logging bootstrap for binaries and tests that
//! embed this crate. The library itself never installs a global
//! subscriber — call [`init_json_logging`] from your own `main` or test
//! harness if one isn't already configured.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

/// Install a JSON-formatted `tracing` subscriber honoring `RUST_LOG`
/// (e.g. `RUST_LOG=info,merkle_blkdev=debug`), defaulting to `info`.
///
/// Safe to call more than once; if a global subscriber is already
/// installed the call is a no-op.
pub fn init_json_logging() {
    let fmt_layer = fmt::layer().json().with_current_span(true).with_span_list(true);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = Registry::default().with(filter).with(fmt_layer);
    let _ = tracing::subscriber::set_global_default(subscriber);
}
