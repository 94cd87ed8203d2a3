//! Test message construction

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Substitute `{seq}`, `{worker}` and `{timestamp}` in a subject or body template
pub fn render_template(template: &str, seq: u64, worker_id: usize, timestamp: DateTime<Utc>) -> String {
    template
        .replace("{seq}", &seq.to_string())
        .replace("{worker}", &worker_id.to_string())
        .replace("{timestamp}", &timestamp.to_rfc3339())
}

/// Builder for a single-part `text/plain` RFC 5322 message
#[derive(Debug, Clone)]
pub struct MessageBuilder {
    from: String,
    to: String,
    subject: String,
    body: String,
    date: DateTime<Utc>,
    message_id: Option<String>,
}

impl MessageBuilder {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            subject: String::new(),
            body: String::new(),
            date: Utc::now(),
            message_id: None,
        }
    }

    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn date(mut self, date: DateTime<Utc>) -> Self {
        self.date = date;
        self
    }

    /// Use a fixed Message-ID instead of a random one
    pub fn message_id(mut self, message_id: impl Into<String>) -> Self {
        self.message_id = Some(message_id.into());
        self
    }

    fn generate_message_id(&self) -> String {
        let domain = self
            .from
            .rsplit_once('@')
            .map(|(_, domain)| domain)
            .filter(|domain| !domain.is_empty())
            .unwrap_or("localhost");
        format!("<{}@{}>", Uuid::new_v4(), domain)
    }

    /// Render headers and body with CRLF line endings
    pub fn build(&self) -> String {
        let message_id = self
            .message_id
            .clone()
            .unwrap_or_else(|| self.generate_message_id());

        let mut message = String::with_capacity(256 + self.body.len());
        message.push_str(&format!("From: <{}>\r\n", self.from));
        message.push_str(&format!("To: <{}>\r\n", self.to));
        message.push_str(&format!("Subject: {}\r\n", self.subject));
        message.push_str(&format!("Date: {}\r\n", self.date.to_rfc2822()));
        message.push_str(&format!("Message-ID: {}\r\n", message_id));
        message.push_str("MIME-Version: 1.0\r\n");
        message.push_str("Content-Type: text/plain; charset=utf-8\r\n");
        message.push_str("\r\n");
        for line in self.body.lines() {
            message.push_str(line);
            message.push_str("\r\n");
        }
        message
    }
}

/// Encode a message for the DATA phase
///
/// Lines are normalised to CRLF, lines starting with `.` are dot-stuffed and
/// the terminating `.` line is appended.
pub fn encode_data(message: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(message.len() + 16);
    for line in message.lines() {
        if line.starts_with('.') {
            out.push(b'.');
        }
        out.extend_from_slice(line.as_bytes());
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(b".\r\n");
    out
}
