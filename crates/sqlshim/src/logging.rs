//! Logging initialization.
//!
//! The library only emits `tracing` events: prepare and execution failures at
//! `error`, tolerated anomalies (out-of-range indices, fetch hiccups) at
//! `debug`, and wire traffic at `trace`. Binaries install a subscriber with one
//! of the functions below.
//!
//! The level can be controlled via the `RUST_LOG` environment variable:
//!
//! ```bash
//! RUST_LOG=sqlshim=debug,sqlshim_pg=trace sqlshim demo --config db.json
//! ```

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize logging at `warn`, unless `RUST_LOG` says otherwise.
///
/// # Panics
///
/// Panics if a global subscriber is already installed.
pub fn init_logging() {
    init_logging_with_level("warn");
}

/// Initialize logging with a specific default level.
///
/// `RUST_LOG`, when set, still wins.
///
/// # Panics
///
/// Panics if a global subscriber is already installed.
pub fn init_logging_with_level(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Initialize JSON-formatted logging, one event per line on stderr.
///
/// # Panics
///
/// Panics if a global subscriber is already installed.
pub fn init_logging_json(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr),
        )
        .init();
}
