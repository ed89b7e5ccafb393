//! Logging initialization
//!
//! `RUST_LOG` defaults to `info` (`debug` for this workspace's crates in debug builds)
//! when unset. With the `profiling` feature, `profiling::scope!` spans of the engine are
//! emitted as tracing spans and show up in the same output.

use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

pub fn setup_logging() {
    if std::env::var("RUST_LOG").is_err() {
        // Safety: single-threaded at startup
        unsafe {
            if cfg!(debug_assertions) {
                std::env::set_var("RUST_LOG", "info,geo_layers_lib=debug,geo_layers_sim=debug");
            } else {
                std::env::set_var("RUST_LOG", "info");
            }
        }
    }

    // Logs go to stderr so the JSON summary on stdout stays machine readable
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_default_env());
    tracing_subscriber::registry().with(fmt_layer).init();

    if cfg!(feature = "profiling") {
        tracing::info!("Logging initialized (profiling scopes enabled)");
    } else {
        tracing::info!("Logging initialized (profiling disabled in this build)");
    }
}
