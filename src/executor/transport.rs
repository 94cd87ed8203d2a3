//! Transport seam between the executor and the network

use crate::client::{DeliveryError, SmtpClient};
use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

/// Everything needed to submit one message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// `host:port` to connect to
    pub target: String,
    pub helo_name: String,
    pub sender: String,
    pub recipient: String,
    /// Complete RFC 5322 message (headers and body)
    pub message: String,
}

/// Delivers one envelope over one fresh session
#[async_trait]
pub trait SmtpTransport: Send + Sync {
    /// Run the whole dialogue; every stage is bounded by `stage_timeout`.
    /// The connection must be closed before returning.
    async fn deliver(&self, envelope: &Envelope, stage_timeout: Duration) -> Result<(), DeliveryError>;
}

/// Plain TCP transport used by the CLI
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpTransport;

impl TcpTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SmtpTransport for TcpTransport {
    async fn deliver(&self, envelope: &Envelope, stage_timeout: Duration) -> Result<(), DeliveryError> {
        let mut client = SmtpClient::connect(&envelope.target, stage_timeout).await?;
        run_session(&mut client, envelope).await
    }
}

/// Drive a connected session from greeting to QUIT
pub async fn run_session<S>(client: &mut SmtpClient<S>, envelope: &Envelope) -> Result<(), DeliveryError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    client.read_greeting().await?;
    client.ehlo(&envelope.helo_name).await?;
    client.mail_from(&envelope.sender).await?;
    client.rcpt_to(&envelope.recipient).await?;
    client.data().await?;
    client.send_data(&envelope.message).await?;

    // The message is already accepted at this point
    if let Err(e) = client.quit().await {
        debug!(error = %e, "QUIT failed after the message was accepted");
    }
    Ok(())
}
