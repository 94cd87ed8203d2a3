//! Per-attempt outcome data model

use crate::types::SmtpStage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Classified result of a single attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum OutcomeKind {
    /// Message accepted by the server
    Success,
    /// DNS failure, refused or unreachable
    ConnectFailure { message: String },
    /// A stage did not complete within the timeout
    TimeoutFailure { stage: SmtpStage },
    /// The server answered with a 4xx/5xx reply
    ProtocolFailure { stage: SmtpStage, code: u16, message: String },
    /// Anything else
    UnknownFailure { message: String },
}

impl OutcomeKind {
    pub fn is_success(&self) -> bool {
        matches!(self, OutcomeKind::Success)
    }

    /// Whether the scheduler may retry an attempt that ended this way
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            OutcomeKind::ConnectFailure { .. } | OutcomeKind::TimeoutFailure { .. }
        )
    }

    /// Short name of the variant, used as a summary key
    pub fn label(&self) -> &'static str {
        match self {
            OutcomeKind::Success => "success",
            OutcomeKind::ConnectFailure { .. } => "connect_failure",
            OutcomeKind::TimeoutFailure { .. } => "timeout_failure",
            OutcomeKind::ProtocolFailure { .. } => "protocol_failure",
            OutcomeKind::UnknownFailure { .. } => "unknown_failure",
        }
    }
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutcomeKind::Success => f.write_str("sent"),
            OutcomeKind::ConnectFailure { message } => write!(f, "connect failed: {}", message),
            OutcomeKind::TimeoutFailure { stage: SmtpStage::Abandoned } => {
                f.write_str("abandoned after grace timeout")
            }
            OutcomeKind::TimeoutFailure { stage: SmtpStage::Attempt } => {
                f.write_str("exceeded the overall attempt deadline")
            }
            OutcomeKind::TimeoutFailure { stage } => write!(f, "timed out during {}", stage),
            OutcomeKind::ProtocolFailure { stage, code, message } => {
                write!(f, "{} rejected with {} {}", stage, code, message.replace('\n', " / "))
            }
            OutcomeKind::UnknownFailure { message } => write!(f, "{}", message),
        }
    }
}

/// Outcome of one attempt slot, including any retries spent on it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptOutcome {
    /// Globally unique, monotonically issued sequence number
    pub seq: u64,

    /// Worker that ran the attempt
    pub worker_id: usize,

    /// Wall-clock start of the final try
    pub started_at: DateTime<Utc>,

    /// Duration of the final try
    #[serde(with = "duration_ms")]
    pub duration: Duration,

    /// Retries performed before this final result
    pub retries: u32,

    #[serde(flatten)]
    pub kind: OutcomeKind,
}

impl AttemptOutcome {
    pub fn new(seq: u64, worker_id: usize, started_at: DateTime<Utc>, duration: Duration, kind: OutcomeKind) -> Self {
        Self {
            seq,
            worker_id,
            started_at,
            duration,
            retries: 0,
            kind,
        }
    }

    /// Outcome for an attempt still in flight when the grace timeout expired
    pub fn abandoned(seq: u64, worker_id: usize, started_at: DateTime<Utc>, duration: Duration) -> Self {
        Self::new(
            seq,
            worker_id,
            started_at,
            duration,
            OutcomeKind::TimeoutFailure { stage: SmtpStage::Abandoned },
        )
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn is_success(&self) -> bool {
        self.kind.is_success()
    }

    pub fn is_abandoned(&self) -> bool {
        matches!(self.kind, OutcomeKind::TimeoutFailure { stage: SmtpStage::Abandoned })
    }

    pub fn duration_ms(&self) -> f64 {
        self.duration.as_secs_f64() * 1000.0
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(duration.as_micros() as f64 / 1000.0)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let ms = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(ms / 1000.0).map_err(serde::de::Error::custom)
    }
}
