//! Attempt execution
//!
//! An [`AttemptExecutor`] turns one sequence number into exactly one
//! [`AttemptOutcome`]. Transport errors, timeouts and even panics inside the
//! transport are classified, never propagated.

pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use transport::{run_session, Envelope, SmtpTransport, TcpTransport};

use crate::{
    client::{render_template, MessageBuilder},
    models::{AttemptOutcome, OutcomeKind, ProbeConfig},
    types::SmtpStage,
};
use chrono::{DateTime, Utc};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Performs single attempts against the configured target
#[derive(Clone)]
pub struct AttemptExecutor {
    config: Arc<ProbeConfig>,
    transport: Arc<dyn SmtpTransport>,
}

impl AttemptExecutor {
    pub fn new(config: Arc<ProbeConfig>, transport: Arc<dyn SmtpTransport>) -> Self {
        Self { config, transport }
    }

    /// Executor speaking SMTP over plain TCP
    pub fn tcp(config: Arc<ProbeConfig>) -> Self {
        Self::new(config, Arc::new(TcpTransport::new()))
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// Build the envelope and message for attempt `seq`
    pub fn envelope(&self, seq: u64, worker_id: usize, now: DateTime<Utc>) -> Envelope {
        let config = &self.config;
        let message = MessageBuilder::new(&config.sender, &config.recipient)
            .subject(render_template(&config.subject, seq, worker_id, now))
            .body(render_template(&config.body, seq, worker_id, now))
            .date(now)
            .build();

        Envelope {
            target: config.target(),
            helo_name: config.helo_name.clone(),
            sender: config.sender.clone(),
            recipient: config.recipient.clone(),
            message,
        }
    }

    /// Run one try and classify it
    pub async fn execute(&self, seq: u64, worker_id: usize) -> AttemptOutcome {
        let started_at = Utc::now();
        let start = Instant::now();
        let envelope = self.envelope(seq, worker_id, started_at);
        let ceiling = self.config.attempt_ceiling();

        let delivery = AssertUnwindSafe(self.transport.deliver(&envelope, self.config.timeout)).catch_unwind();

        let kind = match tokio::time::timeout(ceiling, delivery).await {
            Ok(Ok(Ok(()))) => OutcomeKind::Success,
            Ok(Ok(Err(error))) => OutcomeKind::from(error),
            Ok(Err(panic)) => OutcomeKind::UnknownFailure {
                message: format!("Transport panicked: {}", panic_message(panic.as_ref())),
            },
            Err(_) => {
                debug!(seq, worker_id, ceiling_ms = ceiling.as_millis() as u64, "attempt ceiling reached");
                OutcomeKind::TimeoutFailure { stage: SmtpStage::Attempt }
            }
        };

        let outcome = AttemptOutcome::new(seq, worker_id, started_at, start.elapsed(), kind);
        debug!(
            seq,
            worker_id,
            result = outcome.kind.label(),
            duration_ms = outcome.duration_ms(),
            "attempt finished"
        );
        outcome
    }

    /// Run an attempt, retrying connect and timeout failures per the retry policy
    ///
    /// Backoff waits end early when `cancel` fires; the last outcome is then
    /// returned as final.
    pub async fn execute_with_retry(&self, seq: u64, worker_id: usize, cancel: &CancellationToken) -> AttemptOutcome {
        let policy = self.config.retry;
        let mut retries = 0;

        loop {
            let outcome = self.execute(seq, worker_id).await;
            if !outcome.kind.is_retryable() || !policy.should_retry(retries) || cancel.is_cancelled() {
                return outcome.with_retries(retries);
            }

            let delay = policy.delay_for(retries + 1);
            debug!(seq, retry = retries + 1, delay_ms = delay.as_millis() as u64, reason = %outcome.kind, "retrying attempt");
            tokio::select! {
                _ = cancel.cancelled() => return outcome.with_retries(retries),
                _ = tokio::time::sleep(delay) => {}
            }
            retries += 1;
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
