//! Logging setup for hypod binaries.

use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "hypod=info";
const VERBOSE_LOG_FILTER: &str = "hypod=debug";

/// Installs a stderr `tracing` subscriber.
///
/// `RUST_LOG` takes precedence; otherwise `verbose` selects debug output.
/// Returns false when a global subscriber was already installed.
pub fn init_logging(verbose: bool) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose {
            VERBOSE_LOG_FILTER
        } else {
            DEFAULT_LOG_FILTER
        })
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .is_ok()
}
