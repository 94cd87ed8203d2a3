//! Errors raised while talking to an SMTP server

use crate::models::OutcomeKind;
use crate::types::SmtpStage;
use std::io;
use thiserror::Error;

/// Failure of one SMTP dialogue
#[derive(Error, Debug)]
pub enum DeliveryError {
    /// Name resolution failed or the TCP connect was refused/unreachable
    #[error("Failed to connect to {target}: {message}")]
    Connect { target: String, message: String },

    /// A stage did not complete within the stage timeout
    #[error("Timed out during {0}")]
    Timeout(SmtpStage),

    /// The server answered with a 4xx or 5xx reply
    #[error("{stage} rejected: {code} {message}")]
    Protocol {
        stage: SmtpStage,
        code: u16,
        message: String,
    },

    /// A reply code that is neither the expected one nor an error
    #[error("Unexpected reply {code} during {stage}: {message}")]
    UnexpectedReply {
        stage: SmtpStage,
        code: u16,
        message: String,
    },

    /// Socket error after the connection was established
    #[error("I/O error during {stage}: {source}")]
    Io {
        stage: SmtpStage,
        #[source]
        source: io::Error,
    },

    /// The server sent something that is not an SMTP reply
    #[error("Malformed reply: {0}")]
    Malformed(String),

    /// The server closed the connection mid-dialogue
    #[error("Connection closed during {0}")]
    Closed(SmtpStage),
}

impl DeliveryError {
    /// Build a protocol or unexpected-reply error from a reply code
    pub fn from_reply(stage: SmtpStage, code: u16, message: String) -> Self {
        if (400..600).contains(&code) {
            Self::Protocol { stage, code, message }
        } else {
            Self::UnexpectedReply { stage, code, message }
        }
    }

    /// Stage the dialogue was in, when known
    pub fn stage(&self) -> Option<SmtpStage> {
        match self {
            Self::Connect { .. } => Some(SmtpStage::Connect),
            Self::Timeout(stage) | Self::Closed(stage) => Some(*stage),
            Self::Protocol { stage, .. }
            | Self::UnexpectedReply { stage, .. }
            | Self::Io { stage, .. } => Some(*stage),
            Self::Malformed(_) => None,
        }
    }
}

impl From<DeliveryError> for OutcomeKind {
    fn from(error: DeliveryError) -> Self {
        match error {
            DeliveryError::Connect { message, .. } => OutcomeKind::ConnectFailure { message },
            DeliveryError::Timeout(stage) => OutcomeKind::TimeoutFailure { stage },
            DeliveryError::Protocol { stage, code, message } => {
                OutcomeKind::ProtocolFailure { stage, code, message }
            }
            other => OutcomeKind::UnknownFailure {
                message: other.to_string(),
            },
        }
    }
}
