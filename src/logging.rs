//! Diagnostic logging setup
//!
//! Library code logs through `tracing` macros only. The binary installs a
//! subscriber once, writing to stderr so stdout stays reserved for progress
//! and the run summary.

use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogFormat {
    /// Human-readable compact lines
    Text,
    /// One JSON object per event, for log aggregators
    Json,
}

/// Resolved logging settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    /// Filter directive used when `RUST_LOG` is not set
    pub default_directive: String,
    pub format: LogFormat,
    pub ansi: bool,
}

impl LogSettings {
    /// Settings for the `--verbose` / `--debug` flags
    ///
    /// Debug logs at `debug` in JSON, verbose at `info`, otherwise only
    /// warnings and errors are shown.
    pub fn from_flags(verbose: bool, debug: bool, use_color: bool) -> Self {
        let (level, format) = if debug {
            ("debug", LogFormat::Json)
        } else if verbose {
            ("info", LogFormat::Text)
        } else {
            ("warn", LogFormat::Text)
        };

        Self {
            default_directive: format!("{}={}", env!("CARGO_CRATE_NAME"), level),
            format,
            ansi: use_color && format == LogFormat::Text,
        }
    }

    /// `RUST_LOG` when set and valid, the default directive otherwise
    pub fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.default_directive))
    }
}

/// Install the global subscriber
///
/// Returns `Ok(false)` when a subscriber was already installed, which happens
/// when tests or embedding code set one up first.
pub fn init(settings: &LogSettings) -> Result<bool> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(settings.filter())
        .with_writer(std::io::stderr)
        .with_target(false);

    let installed = match settings.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.compact().with_ansi(settings.ansi).try_init(),
    };

    match installed {
        Ok(()) => Ok(true),
        Err(e) if e.to_string().contains("already") => Ok(false),
        Err(e) => Err(AppError::internal(format!("Failed to initialize logging: {}", e))),
    }
}
