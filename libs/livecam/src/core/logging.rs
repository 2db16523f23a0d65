// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::core::config::LoggingConfig;

/// Build the filter: `RUST_LOG` wins, otherwise `config.level`.
pub fn env_filter(config: &LoggingConfig) -> EnvFilter {
    if std::env::var(EnvFilter::DEFAULT_ENV).is_ok() {
        EnvFilter::builder().from_env_lossy()
    } else {
        EnvFilter::builder().parse_lossy(&config.level)
    }
}

/// Install the global subscriber. Returns `false` if one was already set,
/// which is not an error: embedding applications usually own logging.
pub fn init_logging(config: &LoggingConfig) -> bool {
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_thread_names(config.with_thread_names)
        .with_ansi(config.ansi)
        .with_target(false);

    let installed = tracing_subscriber::registry()
        .with(env_filter(config))
        .with(fmt_layer)
        .try_init()
        .is_ok();

    if installed {
        tracing::debug!("[livecam] Logging initialized at '{}'", config.level);
    }
    installed
}
