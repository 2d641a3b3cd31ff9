//! # mockmate-logging
//!
//! Structured logging with `tracing`.
//!
//! - [`init_logging`] installs the global subscriber: an [`EnvFilter`] built
//!   from `RUST_LOG` (or the configured level plus per-module overrides) and
//!   either a compact human-readable layer or a JSON layer on stderr
//! - [`capture_logs`] installs a thread-local capturing subscriber so tests can
//!   assert that lenient protocol handling was reported
//!
//! [`EnvFilter`]: tracing_subscriber::EnvFilter

#![deny(unsafe_code)]

pub mod capture;

pub use capture::{CapturedEvent, CapturedLogs, capture_logs};

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Subscriber configuration.
#[derive(Clone, Debug)]
pub struct LoggingConfig {
    /// Default level directive (`info`, `debug`, ...).
    pub level: String,
    /// Extra `target=level` directives.
    pub module_levels: Vec<(String, String)>,
    /// Emit JSON lines.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            module_levels: vec![
                ("hyper".to_string(), "warn".to_string()),
                ("reqwest".to_string(), "warn".to_string()),
            ],
            json: false,
        }
    }
}

impl LoggingConfig {
    /// Config with the given level and JSON switch, default module overrides.
    pub fn new(level: impl Into<String>, json: bool) -> Self {
        Self {
            level: level.into(),
            json,
            ..Self::default()
        }
    }

    /// The filter directive string, e.g. `info,hyper=warn`.
    pub fn directives(&self) -> String {
        let mut out = self.level.clone();
        for (target, level) in &self.module_levels {
            out.push(',');
            out.push_str(target);
            out.push('=');
            out.push_str(level);
        }
        out
    }
}

/// Build the filter: `RUST_LOG` wins, the config is the fallback.
pub fn build_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.directives()))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber. Later calls are no-ops.
pub fn init_logging(config: &LoggingConfig) {
    let filter = build_filter(config);

    if config.json {
        let layer = tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_target(true)
            .with_writer(std::io::stderr);
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(layer)
            .try_init();
    } else {
        let layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_writer(std::io::stderr)
            .compact();
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(layer)
            .try_init();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
