//! Tracing subscriber setup for binaries and long-running hosts.
//!
//! Library code only emits events; installing a subscriber is the host's
//! call. `RUST_LOG` overrides the default directive.

use tracing_subscriber::EnvFilter;

/// Install a formatted subscriber at `info` unless `RUST_LOG` says otherwise.
///
/// Returns false if a global subscriber was already installed.
pub fn init() -> bool {
    init_with_default("info")
}

/// Install a formatted subscriber with `default_directive` as the fallback filter.
pub fn init_with_default(default_directive: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .is_ok()
}
