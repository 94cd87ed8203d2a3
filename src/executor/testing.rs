//! Scripted transports for unit tests

use super::transport::{Envelope, SmtpTransport};
use crate::client::DeliveryError;
use crate::types::SmtpStage;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

#[derive(Debug, Clone)]
pub(crate) enum Behavior {
    /// Accept the message after this much (virtual) time
    Succeed(Duration),
    Refuse,
    Reject(u16),
    TimeOut(SmtpStage),
    /// Never return
    Hang,
    Panic,
    /// Refuse this many times, then succeed
    FlakyConnect(u32),
}

pub(crate) struct ScriptedTransport {
    behavior: Behavior,
    calls: AtomicU32,
}

impl ScriptedTransport {
    pub(crate) fn new(behavior: Behavior) -> Self {
        Self {
            behavior,
            calls: AtomicU32::new(0),
        }
    }

    pub(crate) fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

fn refused(envelope: &Envelope) -> DeliveryError {
    DeliveryError::Connect {
        target: envelope.target.clone(),
        message: "Connection refused (os error 111)".to_string(),
    }
}

#[async_trait]
impl SmtpTransport for ScriptedTransport {
    async fn deliver(&self, envelope: &Envelope, _stage_timeout: Duration) -> Result<(), DeliveryError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            Behavior::Succeed(latency) => {
                tokio::time::sleep(*latency).await;
                Ok(())
            }
            Behavior::Refuse => Err(refused(envelope)),
            Behavior::Reject(code) => Err(DeliveryError::Protocol {
                stage: SmtpStage::RcptTo,
                code: *code,
                message: "5.1.1 mailbox unavailable".to_string(),
            }),
            Behavior::TimeOut(stage) => Err(DeliveryError::Timeout(*stage)),
            Behavior::Hang => {
                std::future::pending::<()>().await;
                Ok(())
            }
            Behavior::Panic => panic!("transport exploded"),
            Behavior::FlakyConnect(failures) => {
                if call < *failures {
                    Err(refused(envelope))
                } else {
                    Ok(())
                }
            }
        }
    }
}
