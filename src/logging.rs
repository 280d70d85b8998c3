//! Tracing subscriber setup for the CLI.
//!
//! Logs go to stderr so stdout stays clean for scripts. The filter comes
//! from `KKTRIAGE_LOG` (any `EnvFilter` directive, e.g. `debug` or
//! `karakeep_triage=trace`) and defaults to `info`.

use std::env;

use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

pub const LOG_ENV: &str = "KKTRIAGE_LOG";

/// Install the global subscriber. Calling it twice is harmless.
pub fn init_logger() {
    let filter = env::var(LOG_ENV).unwrap_or_else(|_| "info".to_string());
    let filter_layer = EnvFilter::try_new(&filter).unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .without_time()
                .with_ansi(false),
        )
        .with(filter_layer)
        .try_init();
}
