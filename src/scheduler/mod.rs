//! Run scheduling
//!
//! A [`Scheduler`] spawns `concurrency` workers that claim sequence numbers,
//! execute attempts and publish outcomes until the stop condition is reached
//! or the run is cancelled. The run moves through
//! `Idle -> Running -> Draining -> Stopped`; the current state is published on
//! a watch channel.

pub mod rate;
pub mod retry;

pub use rate::RateLimiter;
pub use retry::{BackoffShape, RetryPolicy};

use crate::{
    error::{AppError, Result},
    executor::AttemptExecutor,
    models::{AttemptOutcome, ProbeConfig, RunSummary},
    stats::Aggregator,
    types::RunState,
};
use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Consumer of final outcomes besides the aggregator
pub trait OutcomeSink: Send + Sync {
    /// Called once per recorded outcome, from the worker that produced it.
    /// Must not block for long and must not fail the run.
    fn observe(&self, outcome: &AttemptOutcome);

    /// Called once after the last outcome
    fn close(&self) {}
}

/// Hands out globally unique, increasing sequence numbers starting at 1
#[derive(Debug)]
pub struct SequenceGenerator {
    next: AtomicU64,
    limit: Option<u64>,
}

impl SequenceGenerator {
    /// `limit` caps the highest number issued; `None` is unbounded
    pub fn new(limit: Option<u64>) -> Self {
        Self {
            next: AtomicU64::new(1),
            limit,
        }
    }

    /// Claim the next number, or `None` once the limit is exhausted
    pub fn next(&self) -> Option<u64> {
        self.next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| match self.limit {
                Some(limit) if n > limit => None,
                _ => n.checked_add(1),
            })
            .ok()
    }

    /// Numbers issued so far
    pub fn issued(&self) -> u64 {
        self.next.load(Ordering::SeqCst) - 1
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self.limit, Some(limit) if self.issued() >= limit)
    }
}

/// Owner of the run-state watch channel; rejects illegal transitions
#[derive(Clone)]
struct StateCell {
    tx: Arc<watch::Sender<RunState>>,
    aggregator: Arc<Aggregator>,
}

impl StateCell {
    fn transition(&self, next: RunState) -> bool {
        let changed = self.tx.send_if_modified(|current| {
            if current.can_transition_to(next) {
                *current = next;
                true
            } else {
                false
            }
        });
        if changed {
            self.aggregator.set_run_state(next);
            info!(state = %next, "run state changed");
        }
        changed
    }
}

/// Everything a worker needs, shared by all workers of a run
struct WorkerContext {
    config: Arc<ProbeConfig>,
    executor: AttemptExecutor,
    aggregator: Arc<Aggregator>,
    sinks: Vec<Arc<dyn OutcomeSink>>,
    sequence: SequenceGenerator,
    limiter: Option<RateLimiter>,
    deadline: Option<Instant>,
    state: StateCell,
    cancel: CancellationToken,
    abandon: CancellationToken,
}

impl WorkerContext {
    fn publish(&self, outcome: &AttemptOutcome) {
        self.aggregator.record(outcome);
        for sink in &self.sinks {
            sink.observe(outcome);
        }
    }

    /// The stop condition was reached; in-flight attempts may still finish
    fn drain(&self) {
        self.state.transition(RunState::Draining);
    }

    fn deadline_passed(&self) -> bool {
        matches!(self.deadline, Some(deadline) if Instant::now() >= deadline)
    }
}

async fn worker_loop(ctx: Arc<WorkerContext>, worker_id: usize) {
    debug!(worker_id, "worker started");
    loop {
        if ctx.cancel.is_cancelled() {
            break;
        }

        if ctx.sequence.is_exhausted() {
            ctx.drain();
            break;
        }

        if let Some(limiter) = &ctx.limiter {
            if !limiter.acquire(&ctx.cancel, ctx.deadline).await {
                if !ctx.cancel.is_cancelled() {
                    ctx.drain();
                }
                break;
            }
        }

        if ctx.deadline_passed() {
            ctx.drain();
            break;
        }

        let Some(seq) = ctx.sequence.next() else {
            ctx.drain();
            break;
        };

        let started_at = Utc::now();
        let start = Instant::now();
        let outcome = tokio::select! {
            biased;
            outcome = ctx.executor.execute_with_retry(seq, worker_id, &ctx.cancel) => outcome,
            _ = ctx.abandon.cancelled() => {
                AttemptOutcome::abandoned(seq, worker_id, started_at, start.elapsed())
            }
        };
        ctx.publish(&outcome);

        let more = !ctx.sequence.is_exhausted() && !ctx.deadline_passed();
        if more && !ctx.config.delay.is_zero() {
            tokio::select! {
                _ = ctx.cancel.cancelled() => break,
                _ = tokio::time::sleep(ctx.config.delay) => {}
            }
        }
    }
    debug!(worker_id, "worker finished");
}

async fn join_workers(workers: &mut JoinSet<()>) {
    while let Some(result) = workers.join_next().await {
        if let Err(e) = result {
            warn!(error = %e, "worker task failed");
        }
    }
}

/// Builder and entry point of a run
pub struct Scheduler {
    config: Arc<ProbeConfig>,
    executor: AttemptExecutor,
    aggregator: Arc<Aggregator>,
    sinks: Vec<Arc<dyn OutcomeSink>>,
}

impl Scheduler {
    pub fn new(config: Arc<ProbeConfig>, executor: AttemptExecutor) -> Self {
        let aggregator = Arc::new(Aggregator::new(config.target()));
        Self {
            config,
            executor,
            aggregator,
            sinks: Vec::new(),
        }
    }

    /// Scheduler using the plain TCP transport
    pub fn tcp(config: Arc<ProbeConfig>) -> Self {
        let executor = AttemptExecutor::tcp(config.clone());
        Self::new(config, executor)
    }

    /// Add an outcome tap
    pub fn with_sink(mut self, sink: Arc<dyn OutcomeSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn aggregator(&self) -> Arc<Aggregator> {
        self.aggregator.clone()
    }

    /// Start the run on the current Tokio runtime
    pub fn start(self) -> Result<RunHandle> {
        self.config.validate()?;

        let (tx, rx) = watch::channel(RunState::Idle);
        let cancel = CancellationToken::new();
        let state = StateCell {
            tx: Arc::new(tx),
            aggregator: self.aggregator.clone(),
        };
        let aggregator = self.aggregator.clone();

        let task = tokio::spawn(supervise(self, state, cancel.clone()));

        Ok(RunHandle {
            state: rx,
            cancel,
            aggregator,
            task,
        })
    }

    /// Start the run and wait for its final summary
    pub async fn run(self) -> Result<RunSummary> {
        self.start()?.wait().await
    }
}

async fn supervise(scheduler: Scheduler, state: StateCell, cancel: CancellationToken) -> RunSummary {
    let Scheduler {
        config,
        executor,
        aggregator,
        sinks,
    } = scheduler;

    let started = Instant::now();
    aggregator.start(started);
    state.transition(RunState::Running);
    info!(
        server = %config.target(),
        concurrency = config.concurrency,
        limit = %config.run_limit,
        "probe run started"
    );

    let ctx = Arc::new(WorkerContext {
        sequence: SequenceGenerator::new(config.run_limit.max_attempts()),
        limiter: config.rate_limit.map(RateLimiter::new),
        deadline: config.run_limit.max_duration().map(|d| started + d),
        executor,
        aggregator: aggregator.clone(),
        sinks,
        state: state.clone(),
        cancel: cancel.clone(),
        abandon: CancellationToken::new(),
        config,
    });

    let mut workers = JoinSet::new();
    for worker_id in 0..ctx.config.concurrency {
        workers.spawn(worker_loop(ctx.clone(), worker_id));
    }

    let cancelled = tokio::select! {
        _ = join_workers(&mut workers) => false,
        _ = cancel.cancelled() => true,
    };

    if cancelled {
        let grace = ctx.config.grace_timeout;
        info!(in_flight = workers.len(), grace_ms = grace.as_millis() as u64, "cancellation requested, waiting for in-flight attempts");
        if tokio::time::timeout(grace, join_workers(&mut workers)).await.is_err() {
            warn!(in_flight = workers.len(), "grace timeout expired, abandoning in-flight attempts");
            ctx.abandon.cancel();
            join_workers(&mut workers).await;
        }
    }

    aggregator.finish(Instant::now());
    for sink in &ctx.sinks {
        sink.close();
    }
    state.transition(RunState::Stopped);

    let summary = aggregator.snapshot();
    info!(
        total = summary.total,
        success = summary.success,
        elapsed_ms = summary.elapsed.as_millis() as u64,
        "probe run finished"
    );
    summary
}

/// Handle to a started run
pub struct RunHandle {
    state: watch::Receiver<RunState>,
    cancel: CancellationToken,
    aggregator: Arc<Aggregator>,
    task: JoinHandle<RunSummary>,
}

impl RunHandle {
    /// Request cancellation; in-flight attempts get the grace timeout
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> RunState {
        *self.state.borrow()
    }

    /// Receiver that observes every state change
    pub fn subscribe(&self) -> watch::Receiver<RunState> {
        self.state.clone()
    }

    pub fn aggregator(&self) -> Arc<Aggregator> {
        self.aggregator.clone()
    }

    /// Live snapshot of the run
    pub fn snapshot(&self) -> RunSummary {
        self.aggregator.snapshot()
    }

    /// Wait for the run to reach `Stopped` and return the final summary
    pub async fn wait(self) -> Result<RunSummary> {
        self.task
            .await
            .map_err(|e| AppError::runtime(format!("Run supervisor failed: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::testing::{Behavior, ScriptedTransport};
    use crate::models::RunLimit;
    use crate::types::SmtpStage;
    use proptest::prelude::*;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder {
        outcomes: Mutex<Vec<AttemptOutcome>>,
        closed: Mutex<bool>,
    }

    impl OutcomeSink for Recorder {
        fn observe(&self, outcome: &AttemptOutcome) {
            self.outcomes.lock().unwrap().push(outcome.clone());
        }

        fn close(&self) {
            *self.closed.lock().unwrap() = true;
        }
    }

    fn scheduler(behavior: Behavior, config: ProbeConfig) -> (Scheduler, Arc<Recorder>) {
        let config = Arc::new(config);
        let transport = Arc::new(ScriptedTransport::new(behavior));
        let recorder = Arc::new(Recorder::default());
        let scheduler = Scheduler::new(config.clone(), AttemptExecutor::new(config, transport))
            .with_sink(recorder.clone());
        (scheduler, recorder)
    }

    fn count_config(count: u64, concurrency: usize) -> ProbeConfig {
        ProbeConfig {
            run_limit: RunLimit::Count(count),
            concurrency,
            ..Default::default()
        }
    }

    #[test]
    fn test_sequence_generator_limit() {
        let sequence = SequenceGenerator::new(Some(3));
        assert_eq!(sequence.next(), Some(1));
        assert_eq!(sequence.next(), Some(2));
        assert!(!sequence.is_exhausted());
        assert_eq!(sequence.next(), Some(3));
        assert!(sequence.is_exhausted());
        assert_eq!(sequence.next(), None);
        assert_eq!(sequence.next(), None);
        assert_eq!(sequence.issued(), 3);
    }

    #[test]
    fn test_sequence_generator_unbounded() {
        let sequence = SequenceGenerator::new(None);
        for expected in 1..=1000 {
            assert_eq!(sequence.next(), Some(expected));
        }
        assert!(!sequence.is_exhausted());
    }

    proptest! {
        /// Concurrent claims never repeat a number nor exceed the limit
        #[test]
        fn sequence_numbers_unique_across_threads(limit in 1u64..500, threads in 1usize..16) {
            let sequence = SequenceGenerator::new(Some(limit));
            let mut claimed: Vec<u64> = std::thread::scope(|scope| {
                let handles: Vec<_> = (0..threads)
                    .map(|_| scope.spawn(|| {
                        let mut mine = Vec::new();
                        while let Some(seq) = sequence.next() {
                            mine.push(seq);
                        }
                        mine
                    }))
                    .collect();
                handles.into_iter().flat_map(|h| h.join().unwrap()).collect()
            });
            claimed.sort_unstable();
            prop_assert_eq!(claimed, (1..=limit).collect::<Vec<_>>());
        }
    }

    #[tokio::test]
    async fn test_refusing_target() {
        let (scheduler, _) = scheduler(Behavior::Refuse, count_config(10, 1));
        let summary = scheduler.run().await.unwrap();
        assert_eq!(summary.total, 10);
        assert_eq!(summary.success, 0);
        assert_eq!(summary.connect_failures, 10);
        assert_eq!(summary.state, RunState::Stopped);
        assert!(!summary.passes(&Default::default()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeding_target_runs_in_parallel() {
        let latency = Duration::from_millis(100);
        let (scheduler, _) = scheduler(Behavior::Succeed(latency), count_config(10, 5));
        let summary = scheduler.run().await.unwrap();
        assert_eq!(summary.success, 10);
        assert!(summary.passes(&Default::default()));
        assert!(summary.elapsed >= latency * 2, "elapsed {:?}", summary.elapsed);
        assert!(summary.elapsed < latency * 3, "elapsed {:?}", summary.elapsed);
    }

    #[tokio::test]
    async fn test_sequence_numbers_unique_and_increasing() {
        for concurrency in [1usize, 2, 16] {
            let (scheduler, recorder) = scheduler(Behavior::Succeed(Duration::from_millis(1)), count_config(40, concurrency));
            let summary = scheduler.run().await.unwrap();
            assert_eq!(summary.total, 40);

            let outcomes = recorder.outcomes.lock().unwrap().clone();
            let mut seqs: Vec<u64> = outcomes.iter().map(|o| o.seq).collect();
            seqs.sort_unstable();
            assert_eq!(seqs, (1..=40).collect::<Vec<_>>(), "concurrency {concurrency}");

            for worker in 0..concurrency {
                let mine: Vec<u64> = outcomes.iter().filter(|o| o.worker_id == worker).map(|o| o.seq).collect();
                assert!(mine.windows(2).all(|w| w[0] < w[1]), "worker {worker}: {mine:?}");
            }
        }
    }

    #[tokio::test]
    async fn test_protocol_failure_not_retried() {
        let config = ProbeConfig {
            retry: RetryPolicy {
                max_retries: 3,
                ..Default::default()
            },
            ..count_config(1, 1)
        };
        let (scheduler, recorder) = scheduler(Behavior::Reject(550), config);
        let summary = scheduler.run().await.unwrap();
        assert_eq!(summary.protocol_failures, 1);
        assert_eq!(summary.protocol_codes[&550], 1);
        assert_eq!(summary.retries, 0);
        assert!(*recorder.closed.lock().unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_abandons_in_flight() {
        let config = ProbeConfig {
            run_limit: RunLimit::Unbounded,
            concurrency: 3,
            grace_timeout: Duration::from_secs(2),
            ..Default::default()
        };
        let (scheduler, _) = scheduler(Behavior::Hang, config);
        let handle = scheduler.start().unwrap();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(handle.state(), RunState::Running);
        let cancelled_at = Instant::now();
        handle.cancel();

        let summary = handle.wait().await.unwrap();
        assert_eq!(summary.state, RunState::Stopped);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.abandoned, 3);
        assert_eq!(summary.timeout_failures, 3);
        assert!(cancelled_at.elapsed() < Duration::from_secs(2) + Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_lets_short_attempts_finish() {
        let config = ProbeConfig {
            run_limit: RunLimit::Unbounded,
            concurrency: 2,
            grace_timeout: Duration::from_secs(5),
            ..Default::default()
        };
        let (scheduler, _) = scheduler(Behavior::Succeed(Duration::from_millis(300)), config);
        let handle = scheduler.start().unwrap();

        tokio::time::sleep(Duration::from_millis(1000)).await;
        handle.cancel();

        let summary = handle.wait().await.unwrap();
        assert_eq!(summary.abandoned, 0);
        assert_eq!(summary.success, summary.total);
        assert!(summary.total >= 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_duration_limit() {
        let config = ProbeConfig {
            run_limit: RunLimit::Duration(Duration::from_secs(1)),
            concurrency: 1,
            ..Default::default()
        };
        let (scheduler, _) = scheduler(Behavior::Succeed(Duration::from_millis(100)), config);
        let summary = scheduler.run().await.unwrap();
        assert_eq!(summary.total, 10);
        assert_eq!(summary.state, RunState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_spaces_attempts() {
        let config = ProbeConfig {
            rate_limit: Some(5.0),
            ..count_config(5, 5)
        };
        let (scheduler, _) = scheduler(Behavior::Succeed(Duration::ZERO), config);
        let summary = scheduler.run().await.unwrap();
        assert_eq!(summary.success, 5);
        assert!(summary.elapsed >= Duration::from_millis(800));
    }

    #[tokio::test(start_paused = true)]
    async fn test_duration_limit_with_slow_rate() {
        let config = ProbeConfig {
            run_limit: RunLimit::Duration(Duration::from_secs(1)),
            concurrency: 5,
            rate_limit: Some(0.1),
            ..Default::default()
        };
        let (scheduler, recorder) = scheduler(Behavior::Succeed(Duration::ZERO), config);
        let summary = scheduler.run().await.unwrap();

        // Only the immediate slot fits inside the window
        assert_eq!(summary.total, 1);
        assert_eq!(summary.state, RunState::Stopped);
        assert!(summary.elapsed <= Duration::from_secs(1), "{:?}", summary.elapsed);
        assert_eq!(recorder.outcomes.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_between_attempts() {
        let config = ProbeConfig {
            delay: Duration::from_millis(500),
            ..count_config(3, 1)
        };
        let (scheduler, _) = scheduler(Behavior::Succeed(Duration::ZERO), config);
        let summary = scheduler.run().await.unwrap();
        assert_eq!(summary.total, 3);
        assert!(summary.elapsed >= Duration::from_millis(1000));
        assert!(summary.elapsed < Duration::from_millis(1500));
    }

    #[tokio::test]
    async fn test_state_transitions_observed() {
        let (scheduler, _) = scheduler(Behavior::Succeed(Duration::from_millis(5)), count_config(4, 2));
        let handle = scheduler.start().unwrap();
        let mut rx = handle.subscribe();
        let summary = handle.wait().await.unwrap();
        assert_eq!(summary.state, RunState::Stopped);
        assert_eq!(*rx.borrow_and_update(), RunState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_skips_draining() {
        let config = ProbeConfig {
            run_limit: RunLimit::Unbounded,
            concurrency: 2,
            grace_timeout: Duration::from_secs(1),
            ..Default::default()
        };
        let (scheduler, _) = scheduler(Behavior::Hang, config);
        let handle = scheduler.start().unwrap();

        let mut rx = handle.subscribe();
        let observer = tokio::spawn(async move {
            let mut seen = vec![*rx.borrow_and_update()];
            while rx.changed().await.is_ok() {
                seen.push(*rx.borrow_and_update());
            }
            seen
        });

        tokio::time::sleep(Duration::from_millis(500)).await;
        handle.cancel();
        let summary = handle.wait().await.unwrap();
        let seen = observer.await.unwrap();

        assert_eq!(summary.state, RunState::Stopped);
        assert_eq!(summary.abandoned, 2);
        assert_eq!(seen.last(), Some(&RunState::Stopped));
        assert!(!seen.contains(&RunState::Draining), "{seen:?}");
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let (scheduler, _) = scheduler(Behavior::Refuse, count_config(0, 1));
        assert!(scheduler.start().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_failures_carry_stage() {
        let (scheduler, recorder) = scheduler(Behavior::TimeOut(SmtpStage::Data), count_config(2, 1));
        let summary = scheduler.run().await.unwrap();
        assert_eq!(summary.timeout_failures, 2);
        assert_eq!(summary.abandoned, 0);
        let outcomes = recorder.outcomes.lock().unwrap();
        assert!(outcomes.iter().all(|o| !o.is_abandoned()));
    }
}
