//! Logging setup for the binary.
//!
//! Level is chosen in this order:
//! 1. `--verbose`: DEBUG for this crate
//! 2. `--quiet`: ERROR only
//! 3. `RUST_LOG`
//! 4. INFO for this crate

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Installs the global `tracing` subscriber. Call once, before any logging.
pub fn init_logger(verbose: bool, quiet: bool, no_color: bool) {
    let filter = if verbose {
        EnvFilter::new("jar_modularizer=debug")
    } else if quiet {
        EnvFilter::new("jar_modularizer=error")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("jar_modularizer=info"))
    };

    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .with_ansi(!no_color)
        .with_writer(std::io::stderr)
        .compact();

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}
