//! stderr logging for the `sg` binary.
//!
//! The library crates log through the `log` facade; the subscriber installed
//! here bridges those records so `RUST_LOG` filters them like any other event.

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,sqlx=warn";
const VERBOSE_FILTER: &str = "debug,sqlx=info";

/// Install the global subscriber. `RUST_LOG` wins over `--verbose`.
pub(crate) fn init(verbose: bool) {
    let fallback = if verbose { VERBOSE_FILTER } else { DEFAULT_FILTER };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    // A second init (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbose)
        .with_writer(std::io::stderr)
        .try_init();
}
