//! Data models for probe configuration, attempt outcomes and run summaries

pub mod config;
pub mod outcome;
pub mod summary;

// Re-export main model types
pub use config::{validate_mailbox, ProbeConfig, RunLimit, SuccessThreshold};
pub use outcome::{AttemptOutcome, OutcomeKind};
pub use summary::{LatencyStats, RunSummary};
