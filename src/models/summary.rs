//! Aggregate results of a probe run

use crate::models::config::SuccessThreshold;
use crate::types::RunState;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Latency statistics over successful attempts, in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LatencyStats {
    pub min_ms: f64,
    pub mean_ms: f64,
    pub p50_ms: f64,
    pub p90_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    pub max_ms: f64,
}

/// Point-in-time view of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Lifecycle state when the snapshot was taken
    pub state: RunState,

    /// `host:port` of the probed server
    pub target: String,

    /// Attempts with a recorded outcome
    pub total: u64,

    pub success: u64,
    pub connect_failures: u64,
    pub timeout_failures: u64,
    pub protocol_failures: u64,
    pub unknown_failures: u64,

    /// Protocol failures keyed by SMTP reply code
    pub protocol_codes: BTreeMap<u16, u64>,

    /// Retries spent across all attempts
    pub retries: u64,

    /// Attempts abandoned after the grace timeout (included in `timeout_failures`)
    pub abandoned: u64,

    /// `None` until at least one attempt succeeded
    pub latency: Option<LatencyStats>,

    /// Wall-clock time since the run started
    #[serde(with = "elapsed_secs")]
    pub elapsed: Duration,
}

impl RunSummary {
    /// Empty summary for a run that has not recorded anything yet
    pub fn empty(target: impl Into<String>) -> Self {
        Self {
            state: RunState::Idle,
            target: target.into(),
            total: 0,
            success: 0,
            connect_failures: 0,
            timeout_failures: 0,
            protocol_failures: 0,
            unknown_failures: 0,
            protocol_codes: BTreeMap::new(),
            retries: 0,
            abandoned: 0,
            latency: None,
            elapsed: Duration::ZERO,
        }
    }

    /// Sum of every failure kind
    pub fn failures(&self) -> u64 {
        self.connect_failures + self.timeout_failures + self.protocol_failures + self.unknown_failures
    }

    /// Success percentage, 0 when nothing was recorded
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.success as f64 / self.total as f64 * 100.0
        }
    }

    /// Every recorded attempt is counted exactly once
    pub fn is_consistent(&self) -> bool {
        self.success + self.failures() == self.total
            && self.protocol_codes.values().sum::<u64>() == self.protocol_failures
            && self.abandoned <= self.timeout_failures
    }

    /// Attempts per second over the elapsed time
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.total as f64 / secs
        } else {
            0.0
        }
    }

    /// Whether the run satisfies the configured threshold
    pub fn passes(&self, threshold: &SuccessThreshold) -> bool {
        threshold.is_met(self.success, self.total)
    }
}

mod elapsed_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(duration.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
