//! Subscriber setup for the engine's structured logs.

use tracing_subscriber::EnvFilter;

/// Everything at `info` and up unless `RUST_LOG` says otherwise.
const DEFAULT_FILTER: &str = "info";

/// Install the process-wide subscriber: JSON lines with timestamps,
/// `RUST_LOG`-style filtering.
///
/// Later calls lose the `try_init` race quietly, so tests and embedding
/// binaries can both call this without coordinating.
pub fn init() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .try_init();
}
