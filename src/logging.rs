// SPDX-License-Identifier: MPL-2.0
//! Diagnostic logging setup.
//!
//! Logs go to stderr so they never interleave with the status line and
//! subtitles printed on stdout. `RUST_LOG` wins over the settings file.

use crate::config::DEFAULT_LOG_FILTER;
use tracing_subscriber::EnvFilter;

/// Builds the filter from `RUST_LOG`, then `fallback`, then the default.
#[must_use]
pub fn env_filter(fallback: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(fallback))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// Installs the global subscriber. Later calls are ignored.
pub fn init(fallback: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(fallback))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
