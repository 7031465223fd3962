//! Tracing subscriber setup for the binary.

use tracing_subscriber::EnvFilter;

/// `RUST_LOG` if set, otherwise `info` (or `debug` with `--verbose`).
pub fn env_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)))
}

pub const fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "debug"
    } else {
        "info,tower_http=warn"
    }
}

/// Install the global subscriber. A second call is a no-op.
pub fn init(verbose: bool) {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(verbose))
        .compact()
        .try_init()
        .ok();
}
