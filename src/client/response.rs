//! SMTP reply parsing

use super::error::DeliveryError;

/// Longest reply the client buffers before giving up
pub const MAX_REPLY_SIZE: usize = 64 * 1024;

/// A single reply line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseLine {
    pub code: u16,
    /// `false` for `250-...` continuation lines
    pub is_last: bool,
    pub message: String,
}

/// A complete, possibly multi-line, SMTP reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub code: u16,
    pub lines: Vec<String>,
}

impl Response {
    pub fn new(code: u16, lines: Vec<String>) -> Self {
        Self { code, lines }
    }

    /// Reply text with lines joined by newlines
    pub fn message(&self) -> String {
        self.lines.join("\n")
    }

    pub fn is_success(&self) -> bool {
        (200..400).contains(&self.code)
    }

    pub fn is_temporary_error(&self) -> bool {
        (400..500).contains(&self.code)
    }

    pub fn is_permanent_error(&self) -> bool {
        (500..600).contains(&self.code)
    }

    pub fn is_error(&self) -> bool {
        self.is_temporary_error() || self.is_permanent_error()
    }

    /// Parse one line without its line terminator
    pub fn parse_line(line: &str) -> Result<ResponseLine, DeliveryError> {
        let bytes = line.as_bytes();
        if bytes.len() < 3 || !bytes[..3].iter().all(u8::is_ascii_digit) {
            return Err(DeliveryError::Malformed(format!("Invalid reply line '{}'", line)));
        }
        if !(b'2'..=b'5').contains(&bytes[0]) {
            return Err(DeliveryError::Malformed(format!("Invalid reply code in '{}'", line)));
        }

        let code = u16::from(bytes[0] - b'0') * 100 + u16::from(bytes[1] - b'0') * 10 + u16::from(bytes[2] - b'0');

        let is_last = match bytes.get(3) {
            None | Some(b' ') => true,
            Some(b'-') => false,
            Some(other) => {
                return Err(DeliveryError::Malformed(format!(
                    "Invalid separator '{}' in reply line",
                    char::from(*other)
                )))
            }
        };

        // Byte 3 is ASCII when present, so index 4 is a char boundary
        let message = line.get(4..).unwrap_or_default().to_string();

        Ok(ResponseLine { code, is_last, message })
    }

    /// Parse a complete reply from the front of `buffer`
    ///
    /// Returns the reply and the number of bytes consumed, or `None` when the
    /// buffer does not yet hold a complete reply.
    pub fn parse_response(buffer: &[u8]) -> Result<Option<(Self, usize)>, DeliveryError> {
        let mut consumed = 0;
        let mut code = None;
        let mut lines = Vec::new();

        while let Some(pos) = buffer[consumed..].iter().position(|&b| b == b'\n') {
            let raw = &buffer[consumed..consumed + pos];
            consumed += pos + 1;
            let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
            let text = String::from_utf8_lossy(raw);

            let parsed = Self::parse_line(&text)?;
            match code {
                Some(expected) if expected != parsed.code => {
                    return Err(DeliveryError::Malformed(format!(
                        "Reply code changed from {} to {} within a multi-line reply",
                        expected, parsed.code
                    )));
                }
                Some(_) => {}
                None => code = Some(parsed.code),
            }
            lines.push(parsed.message);

            if parsed.is_last {
                return Ok(Some((Self::new(parsed.code, lines), consumed)));
            }
        }

        Ok(None)
    }
}
