//! Probe configuration data model and validation

use crate::scheduler::retry::RetryPolicy;
use crate::types::{AppError, OutputFormat, Result};
use crate::utils::{parse_duration, parse_run_duration};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// When a run stops issuing new attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunLimit {
    /// Stop after this many attempts have been issued
    Count(u64),
    /// Stop issuing attempts once this much time has elapsed
    Duration(Duration),
    /// Run until cancelled (explicit `--duration infinite`)
    Unbounded,
}

impl RunLimit {
    /// Maximum number of attempts, if the limit is count based
    pub fn max_attempts(&self) -> Option<u64> {
        match self {
            RunLimit::Count(n) => Some(*n),
            _ => None,
        }
    }

    /// Run duration, if the limit is time based
    pub fn max_duration(&self) -> Option<Duration> {
        match self {
            RunLimit::Duration(d) => Some(*d),
            _ => None,
        }
    }
}

impl fmt::Display for RunLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunLimit::Count(n) => write!(f, "{} attempts", n),
            RunLimit::Duration(d) => write!(f, "{}", crate::utils::format_duration(*d)),
            RunLimit::Unbounded => f.write_str("until cancelled"),
        }
    }
}

/// Success rate a run must reach to exit with code 0
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuccessThreshold {
    /// At least one attempt succeeded
    AnySuccess,
    /// Success percentage (0-100) must be at least this value
    Percent(f64),
}

impl Default for SuccessThreshold {
    fn default() -> Self {
        SuccessThreshold::Percent(100.0)
    }
}

impl SuccessThreshold {
    /// Decide whether a run with these counts passes
    pub fn is_met(&self, successes: u64, total: u64) -> bool {
        if total == 0 {
            return false;
        }
        match self {
            SuccessThreshold::AnySuccess => successes > 0,
            SuccessThreshold::Percent(required) => {
                let rate = successes as f64 / total as f64 * 100.0;
                // Tolerate float noise so 100% with 3 of 3 passes
                rate + 1e-9 >= *required
            }
        }
    }
}

impl FromStr for SuccessThreshold {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("any") {
            return Ok(SuccessThreshold::AnySuccess);
        }
        let number = trimmed.strip_suffix('%').unwrap_or(trimmed);
        let value: f64 = number
            .parse()
            .map_err(|_| AppError::parse(format!("Invalid threshold '{}' (expected a percentage or 'any')", s)))?;
        if !(0.0..=100.0).contains(&value) {
            return Err(AppError::parse(format!("Threshold must be between 0 and 100, got {}", value)));
        }
        Ok(SuccessThreshold::Percent(value))
    }
}

impl fmt::Display for SuccessThreshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SuccessThreshold::AnySuccess => f.write_str("any success"),
            SuccessThreshold::Percent(p) => write!(f, "{}%", p),
        }
    }
}

/// Immutable parameters for one probe run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// SMTP server host name or IP address
    pub host: String,

    /// SMTP server port
    pub port: u16,

    /// Name announced in EHLO/HELO
    pub helo_name: String,

    /// Envelope sender and From header
    pub sender: String,

    /// Envelope recipient and To header
    pub recipient: String,

    /// Subject template (`{seq}`, `{worker}`, `{timestamp}` are substituted)
    pub subject: String,

    /// Body template
    pub body: String,

    /// Number of concurrent workers
    pub concurrency: usize,

    /// Stop condition
    pub run_limit: RunLimit,

    /// Timeout applied to every network stage of an attempt
    pub timeout: Duration,

    /// Pause each worker takes between its attempts
    pub delay: Duration,

    /// Global cap on attempt starts per second
    pub rate_limit: Option<f64>,

    /// Retry policy for connect and timeout failures
    pub retry: RetryPolicy,

    /// Required success rate for a zero exit code
    pub success_threshold: SuccessThreshold,

    /// Time in-flight attempts get after cancellation
    pub grace_timeout: Duration,

    /// How often live progress is rendered
    pub progress_interval: Duration,

    /// Final summary format
    pub output_format: OutputFormat,

    /// Enable colored terminal output
    pub enable_color: bool,

    /// Echo every outcome
    pub verbose: bool,

    /// Enable debug output
    pub debug: bool,

    /// Write every outcome as a JSON line to this file
    pub outcomes_file: Option<PathBuf>,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        use crate::defaults::*;
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            helo_name: DEFAULT_HELO_NAME.to_string(),
            sender: DEFAULT_SENDER.to_string(),
            recipient: DEFAULT_RECIPIENT.to_string(),
            subject: DEFAULT_SUBJECT.to_string(),
            body: DEFAULT_BODY.to_string(),
            concurrency: DEFAULT_CONCURRENCY,
            run_limit: RunLimit::Count(DEFAULT_ATTEMPT_COUNT),
            timeout: DEFAULT_TIMEOUT,
            delay: Duration::ZERO,
            rate_limit: None,
            retry: RetryPolicy::default(),
            success_threshold: SuccessThreshold::default(),
            grace_timeout: DEFAULT_GRACE_TIMEOUT,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            output_format: OutputFormat::default(),
            enable_color: DEFAULT_ENABLE_COLOR,
            verbose: false,
            debug: false,
            outcomes_file: None,
        }
    }
}

impl ProbeConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// `host:port` string used for connecting and reporting
    pub fn target(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            // Bare IPv6 literal
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Upper bound for a whole attempt, covering every network stage
    /// plus one extra exchange for the HELO fallback
    pub fn attempt_ceiling(&self) -> Duration {
        self.timeout
            .saturating_mul(crate::types::SmtpStage::NETWORK_STAGES + 1)
    }

    /// Validate the configuration and return the first hard error
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(AppError::config("Host cannot be empty"));
        }
        if self.host.chars().any(char::is_whitespace) {
            return Err(AppError::config(format!("Invalid host '{}'", self.host)));
        }

        if self.port == 0 {
            return Err(AppError::config("Port must be between 1 and 65535"));
        }

        if self.helo_name.trim().is_empty() || self.helo_name.chars().any(char::is_whitespace) {
            return Err(AppError::config(format!("Invalid HELO name '{}'", self.helo_name)));
        }

        validate_mailbox("sender", &self.sender)?;
        validate_mailbox("recipient", &self.recipient)?;

        if self.subject.contains('\r') || self.subject.contains('\n') {
            return Err(AppError::config("Subject cannot contain line breaks"));
        }

        if self.concurrency == 0 {
            return Err(AppError::config("Concurrency must be greater than 0"));
        }
        if self.concurrency > crate::defaults::MAX_CONCURRENCY {
            return Err(AppError::config(format!(
                "Concurrency cannot exceed {}",
                crate::defaults::MAX_CONCURRENCY
            )));
        }

        match self.run_limit {
            RunLimit::Count(0) => return Err(AppError::config("Attempt count must be greater than 0")),
            RunLimit::Duration(d) if d.is_zero() => {
                return Err(AppError::config("Run duration must be greater than 0"))
            }
            _ => {}
        }

        if self.timeout.is_zero() {
            return Err(AppError::config("Timeout must be greater than 0"));
        }
        if self.timeout > crate::defaults::MAX_TIMEOUT {
            return Err(AppError::config(format!(
                "Timeout cannot exceed {} seconds",
                crate::defaults::MAX_TIMEOUT.as_secs()
            )));
        }

        if let Some(rate) = self.rate_limit {
            if !rate.is_finite() || rate <= 0.0 {
                return Err(AppError::config("Rate limit must be a positive number of attempts per second"));
            }
        }

        self.retry.validate()?;

        if self.progress_interval.is_zero() {
            return Err(AppError::config("Progress interval must be greater than 0"));
        }

        Ok(())
    }

    /// Merge environment variables into this configuration
    pub fn merge_from_env(&mut self) -> Result<()> {
        if let Ok(host) = std::env::var("SMTP_HOST") {
            if !host.trim().is_empty() {
                self.host = host.trim().to_string();
            }
        }

        if let Ok(port) = std::env::var("SMTP_PORT") {
            self.port = port.trim().parse()
                .map_err(|e| AppError::config(format!("Invalid SMTP_PORT value '{}': {}", port, e)))?;
        }

        if let Ok(sender) = std::env::var("PROBE_SENDER") {
            self.sender = sender.trim().to_string();
        }

        if let Ok(recipient) = std::env::var("PROBE_RECIPIENT") {
            self.recipient = recipient.trim().to_string();
        }

        if let Ok(concurrency) = std::env::var("PROBE_CONCURRENCY") {
            self.concurrency = concurrency.trim().parse()
                .map_err(|e| AppError::config(format!("Invalid PROBE_CONCURRENCY value '{}': {}", concurrency, e)))?;
        }

        if let Ok(count) = std::env::var("PROBE_COUNT") {
            let count: u64 = count.trim().parse()
                .map_err(|e| AppError::config(format!("Invalid PROBE_COUNT value '{}': {}", count, e)))?;
            self.run_limit = RunLimit::Count(count);
        }

        if let Ok(timeout) = std::env::var("PROBE_TIMEOUT") {
            self.timeout = parse_duration(&timeout)
                .map_err(|e| AppError::config(format!("Invalid PROBE_TIMEOUT value '{}': {}", timeout, e)))?;
        }

        if let Ok(duration) = std::env::var("PROBE_DURATION") {
            self.run_limit = match parse_run_duration(&duration)
                .map_err(|e| AppError::config(format!("Invalid PROBE_DURATION value '{}': {}", duration, e)))?
            {
                Some(d) => RunLimit::Duration(d),
                None => RunLimit::Unbounded,
            };
        }

        if let Ok(enable_color) = std::env::var("PROBE_ENABLE_COLOR") {
            self.enable_color = enable_color.trim().parse()
                .map_err(|e| AppError::config(format!("Invalid PROBE_ENABLE_COLOR value '{}': {}", enable_color, e)))?;
        }

        Ok(())
    }
}

/// Check a mailbox is a plain `local@domain` address safe to place in `<...>`
pub fn validate_mailbox(field: &str, address: &str) -> Result<()> {
    if address.is_empty() {
        return Err(AppError::config(format!("The {} address cannot be empty", field)));
    }
    if address.chars().any(|c| c.is_whitespace() || c.is_control() || c == '<' || c == '>') {
        return Err(AppError::config(format!("Invalid {} address '{}'", field, address)));
    }
    match address.rsplit_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() && !domain.contains('@') => Ok(()),
        _ => Err(AppError::config(format!(
            "Invalid {} address '{}' (expected local@domain)",
            field, address
        ))),
    }
}
