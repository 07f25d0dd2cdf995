//! Structured logging for potato analysis.
//!
//! Provides dual-mode logging on stderr:
//! - Human-readable console output for interactive use
//! - Machine-parseable JSON lines for batch runs
//!
//! # Usage
//!
//! ```ignore
//! use gsmp_core::logging::{init_logging, LogConfig};
//!
//! let config = LogConfig::from_env(None, None);
//! init_logging(&config);
//! ```
//!
//! The analysis itself only emits `tracing` events under the targets in
//! [`targets`]; installing a subscriber is left to the embedding application.

pub mod config;

pub use config::{LogConfig, LogFormat, LogLevel};

use std::io::IsTerminal;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Tracing targets, one per analysis stage.
pub mod targets {
    pub const CHAIN: &str = "gsmp_core::potato::chain";
    pub const PRECISION: &str = "gsmp_core::potato::precision";
    pub const TRANSIENT: &str = "gsmp_core::potato::transient";
    pub const EVALUATOR: &str = "gsmp_core::potato::evaluator";
    pub const MODEL: &str = "gsmp_core::model";
}

/// Install a global subscriber.
///
/// RUST_LOG, when set, takes over filtering; otherwise `config.level`
/// applies to the gsmp crates. Returns false if a subscriber was already
/// installed.
pub fn init_logging(config: &LogConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.default_directive()));

    let installed = match config.format {
        LogFormat::Human => {
            let use_ansi = std::io::stderr().is_terminal();
            let fmt_layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_file(config.source_location)
                .with_line_number(config.source_location)
                .with_ansi(use_ansi);

            if config.timestamps {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt_layer)
                    .try_init()
            } else {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt_layer.without_time())
                    .try_init()
            }
        }
        LogFormat::Jsonl => {
            let json_layer = fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_file(config.source_location)
                .with_line_number(config.source_location)
                .with_current_span(false);
            tracing_subscriber::registry()
                .with(filter)
                .with(json_layer)
                .try_init()
        }
    };
    installed.is_ok()
}

/// Initialize logging from the environment (for tests and simple cases).
pub fn init_default_logging() -> bool {
    init_logging(&LogConfig::from_env(None, None))
}
