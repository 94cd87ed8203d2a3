//! Minimal SMTP client used by the probe
//!
//! Speaks just enough of RFC 5321 to submit one message per connection:
//! greeting, EHLO (with HELO fallback), MAIL FROM, RCPT TO, DATA, body, QUIT.
//! Every stage is bounded by the stage timeout.

pub mod error;
pub mod message;
pub mod response;

pub use error::DeliveryError;
pub use message::{encode_data, render_template, MessageBuilder};
pub use response::{Response, ResponseLine};

use crate::types::SmtpStage;
use response::MAX_REPLY_SIZE;
use std::future::Future;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, trace};

const READ_CHUNK: usize = 4096;

/// Result alias for SMTP client operations
pub type DeliveryResult<T> = std::result::Result<T, DeliveryError>;

/// Run `fut` under the stage timeout
async fn bounded<T, F>(limit: Duration, stage: SmtpStage, fut: F) -> DeliveryResult<T>
where
    F: Future<Output = DeliveryResult<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(DeliveryError::Timeout(stage)),
    }
}

/// An SMTP session over any async byte stream
pub struct SmtpClient<S> {
    stream: S,
    buffer: Vec<u8>,
    timeout: Duration,
}

impl SmtpClient<TcpStream> {
    /// Resolve and connect to `target` (`host:port`) within `timeout`
    pub async fn connect(target: &str, timeout: Duration) -> DeliveryResult<Self> {
        let stream = bounded(timeout, SmtpStage::Connect, async {
            TcpStream::connect(target)
                .await
                .map_err(|e| DeliveryError::Connect {
                    target: target.to_string(),
                    message: e.to_string(),
                })
        })
        .await?;

        if let Err(e) = stream.set_nodelay(true) {
            debug!(server = %target, error = %e, "failed to set TCP_NODELAY");
        }

        Ok(Self::new(stream, timeout))
    }
}

impl<S> SmtpClient<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap an already connected stream
    pub fn new(stream: S, timeout: Duration) -> Self {
        Self {
            stream,
            buffer: Vec::with_capacity(READ_CHUNK),
            timeout,
        }
    }

    /// Read the 220 greeting
    pub async fn read_greeting(&mut self) -> DeliveryResult<Response> {
        let limit = self.timeout;
        let response = bounded(limit, SmtpStage::Greeting, self.read_response(SmtpStage::Greeting)).await?;
        expect(SmtpStage::Greeting, response, &[220])
    }

    /// Send EHLO, falling back to HELO when the server rejects EHLO with 5xx
    pub async fn ehlo(&mut self, name: &str) -> DeliveryResult<Response> {
        let response = self.command(SmtpStage::Ehlo, &format!("EHLO {}", name)).await?;
        if response.is_permanent_error() {
            trace!(code = response.code, "EHLO rejected, falling back to HELO");
            let response = self.command(SmtpStage::Ehlo, &format!("HELO {}", name)).await?;
            return expect(SmtpStage::Ehlo, response, &[250]);
        }
        expect(SmtpStage::Ehlo, response, &[250])
    }

    pub async fn mail_from(&mut self, sender: &str) -> DeliveryResult<Response> {
        let response = self
            .command(SmtpStage::MailFrom, &format!("MAIL FROM:<{}>", sender))
            .await?;
        expect(SmtpStage::MailFrom, response, &[250])
    }

    pub async fn rcpt_to(&mut self, recipient: &str) -> DeliveryResult<Response> {
        let response = self
            .command(SmtpStage::RcptTo, &format!("RCPT TO:<{}>", recipient))
            .await?;
        expect(SmtpStage::RcptTo, response, &[250, 251])
    }

    pub async fn data(&mut self) -> DeliveryResult<Response> {
        let response = self.command(SmtpStage::Data, "DATA").await?;
        expect(SmtpStage::Data, response, &[354])
    }

    /// Send the message (dot-stuffed, terminated by `.`) and read the verdict
    pub async fn send_data(&mut self, message: &str) -> DeliveryResult<Response> {
        let payload = encode_data(message);
        let limit = self.timeout;
        let response = bounded(limit, SmtpStage::Body, async {
            self.write_all(SmtpStage::Body, &payload).await?;
            self.read_response(SmtpStage::Body).await
        })
        .await?;
        expect(SmtpStage::Body, response, &[250])
    }

    pub async fn quit(&mut self) -> DeliveryResult<Response> {
        let response = self.command(SmtpStage::Quit, "QUIT").await?;
        expect(SmtpStage::Quit, response, &[221])
    }

    /// Send one command line and read its reply, bounded by the stage timeout
    pub async fn command(&mut self, stage: SmtpStage, line: &str) -> DeliveryResult<Response> {
        trace!(%stage, command = line, "sending SMTP command");
        let limit = self.timeout;
        let data = format!("{}\r\n", line);
        bounded(limit, stage, async {
            self.write_all(stage, data.as_bytes()).await?;
            self.read_response(stage).await
        })
        .await
    }

    async fn write_all(&mut self, stage: SmtpStage, data: &[u8]) -> DeliveryResult<()> {
        self.stream
            .write_all(data)
            .await
            .map_err(|source| DeliveryError::Io { stage, source })?;
        self.stream
            .flush()
            .await
            .map_err(|source| DeliveryError::Io { stage, source })
    }

    async fn read_response(&mut self, stage: SmtpStage) -> DeliveryResult<Response> {
        loop {
            if let Some((response, consumed)) = Response::parse_response(&self.buffer)? {
                self.buffer.drain(..consumed);
                trace!(%stage, code = response.code, "received SMTP reply");
                return Ok(response);
            }

            if self.buffer.len() > MAX_REPLY_SIZE {
                return Err(DeliveryError::Malformed(format!(
                    "Reply exceeds {} bytes",
                    MAX_REPLY_SIZE
                )));
            }

            let mut chunk = [0u8; READ_CHUNK];
            let n = self
                .stream
                .read(&mut chunk)
                .await
                .map_err(|source| DeliveryError::Io { stage, source })?;
            if n == 0 {
                return Err(DeliveryError::Closed(stage));
            }
            self.buffer.extend_from_slice(&chunk[..n]);
        }
    }
}

/// Accept `response` if its code is one of `expected`
fn expect(stage: SmtpStage, response: Response, expected: &[u16]) -> DeliveryResult<Response> {
    if expected.contains(&response.code) {
        Ok(response)
    } else {
        Err(DeliveryError::from_reply(stage, response.code, response.message()))
    }
}
