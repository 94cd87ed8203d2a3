//! Type definitions and aliases

use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use serde::{Deserialize, Serialize};

// Re-export commonly used types
pub use crate::error::{AppError, Result};

/// Lifecycle state of a probe run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    /// Configured, not started
    Idle,
    /// Workers are issuing attempts
    Running,
    /// Stop condition reached, waiting for in-flight attempts
    Draining,
    /// Terminal state
    Stopped,
}

impl RunState {
    /// Check whether moving from this state to `next` is a legal transition
    pub fn can_transition_to(self, next: RunState) -> bool {
        matches!(
            (self, next),
            (RunState::Idle, RunState::Running)
                | (RunState::Running, RunState::Draining)
                | (RunState::Running, RunState::Stopped)
                | (RunState::Draining, RunState::Stopped)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Stopped)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RunState::Idle => "idle",
            RunState::Running => "running",
            RunState::Draining => "draining",
            RunState::Stopped => "stopped",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Phase of an SMTP session an attempt was in when it ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SmtpStage {
    Connect,
    Greeting,
    Ehlo,
    MailFrom,
    RcptTo,
    Data,
    Body,
    Quit,
    /// Whole attempt outlived the per-attempt ceiling
    Attempt,
    /// In flight when the grace timeout expired
    Abandoned,
}

impl SmtpStage {
    /// Number of network stages one attempt can pass through
    pub const NETWORK_STAGES: u32 = 8;

    pub fn as_str(self) -> &'static str {
        match self {
            SmtpStage::Connect => "connect",
            SmtpStage::Greeting => "greeting",
            SmtpStage::Ehlo => "ehlo",
            SmtpStage::MailFrom => "mail_from",
            SmtpStage::RcptTo => "rcpt_to",
            SmtpStage::Data => "data",
            SmtpStage::Body => "body",
            SmtpStage::Quit => "quit",
            SmtpStage::Attempt => "attempt",
            SmtpStage::Abandoned => "abandoned",
        }
    }
}

impl fmt::Display for SmtpStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Format of the final run summary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// Line-delimited key=value pairs
    Kv,
    /// A single JSON document
    Json,
}

impl FromStr for OutputFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "table" | "text" => Ok(OutputFormat::Table),
            "kv" | "key=value" => Ok(OutputFormat::Kv),
            "json" => Ok(OutputFormat::Json),
            other => Err(AppError::parse(format!(
                "Invalid output format '{}' (expected table, kv or json)",
                other
            ))),
        }
    }
}

/// Latency classification used for color coding
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PerformanceLevel {
    /// Good performance (< 100ms)
    Good,
    /// Moderate performance (100ms - 1s)
    Moderate,
    /// Poor performance (> 1s)
    Poor,
}

impl PerformanceLevel {
    /// Classify a latency value
    pub fn from_duration(duration: Duration) -> Self {
        Self::from_millis(duration.as_secs_f64() * 1000.0)
    }

    pub fn from_millis(ms: f64) -> Self {
        if ms < 100.0 {
            Self::Good
        } else if ms < 1000.0 {
            Self::Moderate
        } else {
            Self::Poor
        }
    }
}
