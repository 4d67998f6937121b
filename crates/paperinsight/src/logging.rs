//! Tracing subscriber bootstrap.

use tracing_subscriber::EnvFilter;

/// Installs the global tracing subscriber and the `log` bridge.
/// Filter via `RUST_LOG`; defaults to `info`. Safe to call more than
/// once — later calls are no-ops.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_log::LogTracer::init();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}
