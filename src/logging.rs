//! Tracing subscriber setup for the `epg` binary.
//!
//! The library only emits `tracing` events; installing a subscriber is the
//! binary's decision. `RUST_LOG` overrides the default filter.

use tracing_subscriber::EnvFilter;

/// Install a compact stderr subscriber. Calling it twice is a no-op.
pub fn init(verbose: bool) {
    let default = if verbose { "epg_monitor=debug" } else { "epg_monitor=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .try_init();
}
