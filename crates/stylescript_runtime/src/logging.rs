//! Tracing subscriber setup for the CLI.

use std::sync::Once;

use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

static TRACING_INIT: Once = Once::new();

/// Installs the global tracing subscriber once.
///
/// The filter comes from `RUST_LOG` when it is set. Otherwise `fallback` is
/// used, and with no fallback nothing is installed.
pub fn init_tracing(fallback: Option<&str>) {
    TRACING_INIT.call_once(|| {
        let filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => match fallback {
                Some(directive) => EnvFilter::new(directive),
                None => return,
            },
        };
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_writer(std::io::stderr),
            )
            .with(filter)
            .init();
    });
}
