//! SMTP Probe
//!
//! A connectivity probe and load-test harness for SMTP endpoints. It opens
//! repeated (optionally concurrent) SMTP sessions against a target, submits a
//! small test message on each one, classifies every attempt and reports the
//! aggregate results.

pub mod app;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod models;
pub mod output;
pub mod scheduler;
pub mod stats;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use error::{AppError, Result};
pub use executor::{AttemptExecutor, SmtpTransport, TcpTransport};
pub use models::{AttemptOutcome, OutcomeKind, ProbeConfig, RunSummary};
pub use scheduler::{RunHandle, Scheduler};
pub use stats::Aggregator;
pub use types::RunState;

/// Application version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");

/// Version with the commit and build time stamped in by `build.rs`
pub const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_COMMIT"),
    ", built ",
    env!("BUILD_TIME"),
    ")"
);

/// Default configuration values
pub mod defaults {
    use std::time::Duration;

    pub const DEFAULT_HOST: &str = "localhost";
    pub const DEFAULT_PORT: u16 = 2525;
    pub const DEFAULT_HELO_NAME: &str = "localhost";
    pub const DEFAULT_SENDER: &str = "sender@example.com";
    pub const DEFAULT_RECIPIENT: &str = "receiver@example.com";
    pub const DEFAULT_SUBJECT: &str = "smtp probe {seq}";
    pub const DEFAULT_BODY: &str = "test test test imagine i wrote something here.";
    pub const DEFAULT_CONCURRENCY: usize = 1;
    pub const DEFAULT_ATTEMPT_COUNT: u64 = 10;
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
    pub const DEFAULT_GRACE_TIMEOUT: Duration = Duration::from_secs(5);
    pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_secs(1);
    pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_millis(200);
    pub const DEFAULT_BACKOFF_MAX: Duration = Duration::from_secs(10);
    pub const DEFAULT_ENABLE_COLOR: bool = true;

    pub const MAX_CONCURRENCY: usize = 1024;
    pub const MAX_TIMEOUT: Duration = Duration::from_secs(300);
    pub const MAX_RETRIES: u32 = 10;
}
