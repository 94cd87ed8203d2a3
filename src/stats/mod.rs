//! Result aggregation
//!
//! The [`Aggregator`] is the single owner of run counters. Workers call
//! [`Aggregator::record`] concurrently; the reporter takes snapshots. Both hold
//! the lock only long enough to update or copy constant-size state.

pub mod histogram;


pub use histogram::LatencyHistogram;

use crate::{
    models::{AttemptOutcome, LatencyStats, OutcomeKind, RunSummary},
    types::RunState,
};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Default)]
struct Counters {
    total: u64,
    success: u64,
    connect_failures: u64,
    timeout_failures: u64,
    protocol_failures: u64,
    unknown_failures: u64,
    retries: u64,
    abandoned: u64,
}

#[derive(Debug, Clone)]
struct AggregatorState {
    counters: Counters,
    protocol_codes: BTreeMap<u16, u64>,
    latency: LatencyHistogram,
    run_state: RunState,
    started: Option<Instant>,
    finished: Option<Instant>,
}

/// Thread-safe accumulator of attempt outcomes
#[derive(Debug)]
pub struct Aggregator {
    target: String,
    state: Mutex<AggregatorState>,
}

impl Aggregator {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            state: Mutex::new(AggregatorState {
                counters: Counters::default(),
                protocol_codes: BTreeMap::new(),
                latency: LatencyHistogram::new(),
                run_state: RunState::Idle,
                started: None,
                finished: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, AggregatorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Mark the start of the run; elapsed time is measured from here
    pub fn start(&self, at: Instant) {
        let mut state = self.lock();
        state.started.get_or_insert(at);
    }

    /// Freeze elapsed time; later snapshots report the same duration
    pub fn finish(&self, at: Instant) {
        let mut state = self.lock();
        state.finished.get_or_insert(at);
    }

    pub fn set_run_state(&self, run_state: RunState) {
        self.lock().run_state = run_state;
    }

    /// Count one final outcome
    pub fn record(&self, outcome: &AttemptOutcome) {
        let mut guard = self.lock();
        let state = &mut *guard;
        let counters = &mut state.counters;
        counters.total += 1;
        counters.retries += u64::from(outcome.retries);
        match &outcome.kind {
            OutcomeKind::Success => counters.success += 1,
            OutcomeKind::ConnectFailure { .. } => counters.connect_failures += 1,
            OutcomeKind::TimeoutFailure { .. } => {
                counters.timeout_failures += 1;
                if outcome.is_abandoned() {
                    counters.abandoned += 1;
                }
            }
            OutcomeKind::ProtocolFailure { code, .. } => {
                counters.protocol_failures += 1;
                *state.protocol_codes.entry(*code).or_insert(0) += 1;
            }
            OutcomeKind::UnknownFailure { .. } => counters.unknown_failures += 1,
        }
        if outcome.is_success() {
            state.latency.record(outcome.duration);
        }
    }

    /// Snapshot at the current instant
    pub fn snapshot(&self) -> RunSummary {
        self.snapshot_at(Instant::now())
    }

    /// Snapshot with elapsed time measured up to `now` (ignored once finished)
    pub fn snapshot_at(&self, now: Instant) -> RunSummary {
        let copy = self.lock().clone();
        self.summarize(copy, now)
    }

    fn summarize(&self, state: AggregatorState, now: Instant) -> RunSummary {
        let elapsed = match state.started {
            Some(started) => state.finished.unwrap_or(now).saturating_duration_since(started),
            None => Duration::ZERO,
        };
        let counters = state.counters;

        RunSummary {
            state: state.run_state,
            target: self.target.clone(),
            total: counters.total,
            success: counters.success,
            connect_failures: counters.connect_failures,
            timeout_failures: counters.timeout_failures,
            protocol_failures: counters.protocol_failures,
            unknown_failures: counters.unknown_failures,
            protocol_codes: state.protocol_codes,
            retries: counters.retries,
            abandoned: counters.abandoned,
            latency: latency_stats(&state.latency),
            elapsed,
        }
    }
}

fn millis(duration: Option<Duration>) -> f64 {
    duration.map(|d| d.as_secs_f64() * 1000.0).unwrap_or(0.0)
}

fn latency_stats(histogram: &LatencyHistogram) -> Option<LatencyStats> {
    if histogram.is_empty() {
        return None;
    }
    Some(LatencyStats {
        min_ms: millis(histogram.min()),
        mean_ms: millis(histogram.mean()),
        p50_ms: millis(histogram.percentile(50.0)),
        p90_ms: millis(histogram.percentile(90.0)),
        p95_ms: millis(histogram.percentile(95.0)),
        p99_ms: millis(histogram.percentile(99.0)),
        max_ms: millis(histogram.max()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SmtpStage;
    use chrono::Utc;

    fn outcome(seq: u64, kind: OutcomeKind, ms: u64) -> AttemptOutcome {
        AttemptOutcome::new(seq, 0, Utc::now(), Duration::from_millis(ms), kind)
    }

    #[test]
    fn test_record_counts_each_kind() {
        let aggregator = Aggregator::new("localhost:2525");
        aggregator.record(&outcome(1, OutcomeKind::Success, 10));
        aggregator.record(&outcome(2, OutcomeKind::ConnectFailure { message: "refused".into() }, 1));
        aggregator.record(&outcome(3, OutcomeKind::TimeoutFailure { stage: SmtpStage::Greeting }, 10_000));
        aggregator.record(&outcome(
            4,
            OutcomeKind::ProtocolFailure {
                stage: SmtpStage::RcptTo,
                code: 550,
                message: "no".into(),
            },
            5,
        ));
        aggregator.record(&outcome(5, OutcomeKind::UnknownFailure { message: "?".into() }, 5));
        aggregator.record(&AttemptOutcome::abandoned(6, 0, Utc::now(), Duration::from_secs(1)));

        let summary = aggregator.snapshot();
        assert_eq!(summary.total, 6);
        assert_eq!(summary.success, 1);
        assert_eq!(summary.connect_failures, 1);
        assert_eq!(summary.timeout_failures, 2);
        assert_eq!(summary.abandoned, 1);
        assert_eq!(summary.protocol_codes.get(&550), Some(&1));
        assert!(summary.is_consistent());
    }

    #[test]
    fn test_latency_only_over_successes() {
        let aggregator = Aggregator::new("t");
        aggregator.record(&outcome(1, OutcomeKind::Success, 20));
        aggregator.record(&outcome(2, OutcomeKind::TimeoutFailure { stage: SmtpStage::Body }, 10_000));

        let latency = aggregator.snapshot().latency.unwrap();
        assert_eq!(latency.max_ms, 20.0);
        assert_eq!(latency.min_ms, 20.0);
    }

    #[test]
    fn test_no_latency_without_success() {
        let aggregator = Aggregator::new("t");
        aggregator.record(&outcome(1, OutcomeKind::ConnectFailure { message: "x".into() }, 1));
        assert!(aggregator.snapshot().latency.is_none());
    }

    #[test]
    fn test_retries_summed() {
        let aggregator = Aggregator::new("t");
        aggregator.record(&outcome(1, OutcomeKind::Success, 1).with_retries(2));
        aggregator.record(&outcome(2, OutcomeKind::Success, 1).with_retries(1));
        assert_eq!(aggregator.snapshot().retries, 3);
    }

    #[test]
    fn test_elapsed_frozen_after_finish() {
        let aggregator = Aggregator::new("t");
        let start = Instant::now();
        aggregator.start(start);

        let live = aggregator.snapshot_at(start + Duration::from_secs(3));
        assert_eq!(live.elapsed, Duration::from_secs(3));

        aggregator.finish(start + Duration::from_secs(5));
        let frozen = aggregator.snapshot_at(start + Duration::from_secs(60));
        assert_eq!(frozen.elapsed, Duration::from_secs(5));
        assert_eq!(aggregator.snapshot(), aggregator.snapshot());
    }

    #[test]
    fn test_not_started_has_zero_elapsed() {
        let aggregator = Aggregator::new("t");
        assert_eq!(aggregator.snapshot().elapsed, Duration::ZERO);
        assert_eq!(aggregator.snapshot().state, RunState::Idle);
    }

    #[test]
    fn test_concurrent_records() {
        let aggregator = std::sync::Arc::new(Aggregator::new("t"));
        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let aggregator = aggregator.clone();
                std::thread::spawn(move || {
                    for i in 0..250u64 {
                        let kind = if i % 5 == 0 {
                            OutcomeKind::ConnectFailure { message: "refused".into() }
                        } else {
                            OutcomeKind::Success
                        };
                        aggregator.record(&outcome(worker * 1000 + i, kind, 1 + i % 7));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let summary = aggregator.snapshot();
        assert_eq!(summary.total, 2000);
        assert_eq!(summary.connect_failures, 400);
        assert_eq!(summary.success, 1600);
        assert!(summary.is_consistent());
    }
}
