//! Error handling for the SMTP probe
//!
//! Per-attempt failures are not errors: they are recorded as
//! [`crate::models::OutcomeKind`] values. `AppError` covers the conditions that
//! end a run early or decide its exit code.

use thiserror::Error;

/// Custom error types for the SMTP probe
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Parsing errors (durations, thresholds, numbers)
    #[error("Parsing error: {0}")]
    Parse(String),

    /// I/O errors (outcome log, terminal output)
    #[error("I/O error: {0}")]
    Io(String),

    /// Run could not be carried out (worker spawn or join failures)
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// The run finished but did not reach the required success rate
    #[error("Success rate {success_rate:.2}% is below the required {threshold}")]
    ThresholdNotMet { success_rate: f64, threshold: String },

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config(message.into())
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation(message.into())
    }

    /// Create a new parsing error
    pub fn parse<S: Into<String>>(message: S) -> Self {
        Self::Parse(message.into())
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        Self::Io(message.into())
    }

    /// Create a new runtime error
    pub fn runtime<S: Into<String>>(message: S) -> Self {
        Self::Runtime(message.into())
    }

    /// Create a threshold failure
    pub fn threshold_not_met<S: Into<String>>(success_rate: f64, threshold: S) -> Self {
        Self::ThresholdNotMet {
            success_rate,
            threshold: threshold.into(),
        }
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal(message.into())
    }

    /// Get error category for logging and reporting
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG",
            Self::Validation(_) => "VALIDATION",
            Self::Parse(_) => "PARSE",
            Self::Io(_) => "IO",
            Self::Runtime(_) => "RUNTIME",
            Self::ThresholdNotMet { .. } => "THRESHOLD",
            Self::Internal(_) => "INTERNAL",
        }
    }

    /// Whether the error was raised before any attempt was made
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Validation(_) | Self::Parse(_))
    }

    /// Get user-friendly error message with suggestions
    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::Config(msg) | Self::Validation(msg) => {
                format!("Configuration problem: {}\n\nSuggestion: Check your .env file, SMTP_* / PROBE_* variables or command line arguments.", msg)
            }
            Self::Parse(msg) => {
                format!("Failed to parse a value: {}\n\nSuggestion: Durations look like 500ms, 10s, 2m; thresholds like 95, 95% or any.", msg)
            }
            Self::Io(msg) => {
                format!("File or terminal operation failed: {}\n\nSuggestion: Check the --outcomes-file path and its permissions.", msg)
            }
            Self::Runtime(msg) => {
                format!("The run could not be completed: {}\n\nSuggestion: Lower --concurrency or check system resource limits.", msg)
            }
            Self::ThresholdNotMet { .. } => {
                format!("{}\n\nSuggestion: Inspect the failure breakdown above; use --retries for flaky networks or --threshold to relax the requirement.", self)
            }
            Self::Internal(msg) => {
                format!("Internal error: {}\n\nThis is likely a bug. Please report this issue with the error details.", msg)
            }
        }
    }

    /// Get exit code for this error type
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Validation(_) | Self::Parse(_) => 2,
            Self::ThresholdNotMet { .. } => 1,
            Self::Io(_) | Self::Runtime(_) | Self::Internal(_) => 1,
        }
    }

    /// Format error for console display with color coding
    pub fn format_for_console(&self, use_color: bool) -> String {
        let category = self.category();
        let message = self.to_string();

        if use_color {
            use colored::Colorize;
            match self {
                Self::Config(_) | Self::Validation(_) | Self::Parse(_) => {
                    format!("[{}] {}", category.red().bold(), message.red())
                }
                Self::ThresholdNotMet { .. } => {
                    format!("[{}] {}", category.yellow().bold(), message.yellow())
                }
                Self::Io(_) | Self::Runtime(_) => {
                    format!("[{}] {}", category.cyan().bold(), message.cyan())
                }
                Self::Internal(_) => {
                    format!("[{}] {}", category.bright_red().bold(), message.bright_red())
                }
            }
        } else {
            format!("[{}] {}", category, message)
        }
    }
}

// Standard library error conversions
impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::io(error.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        Self::parse(format!("JSON error: {}", error))
    }
}

impl From<dotenv::Error> for AppError {
    fn from(error: dotenv::Error) -> Self {
        Self::config(format!("Environment file error: {}", error))
    }
}

impl From<std::num::ParseIntError> for AppError {
    fn from(error: std::num::ParseIntError) -> Self {
        Self::parse(format!("Integer parse error: {}", error))
    }
}

impl From<std::num::ParseFloatError> for AppError {
    fn from(error: std::num::ParseFloatError) -> Self {
        Self::parse(format!("Float parse error: {}", error))
    }
}

impl From<std::str::ParseBoolError> for AppError {
    fn from(error: std::str::ParseBoolError) -> Self {
        Self::parse(format!("Boolean parse error: {}", error))
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(error: tokio::task::JoinError) -> Self {
        Self::runtime(format!("Worker task failed: {}", error))
    }
}

/// Custom Result type for the application
pub type Result<T> = std::result::Result<T, AppError>;

/// Error context trait for adding context to errors
pub trait ErrorContext<T> {
    /// Add context to an error, keeping its category
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;

    /// Add static context to an error
    fn context(self, message: &'static str) -> Result<T>;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: Into<AppError>,
{
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let context = f();
            match e.into() {
                AppError::Config(msg) => AppError::Config(format!("{}: {}", context, msg)),
                AppError::Validation(msg) => AppError::Validation(format!("{}: {}", context, msg)),
                AppError::Parse(msg) => AppError::Parse(format!("{}: {}", context, msg)),
                AppError::Io(msg) => AppError::Io(format!("{}: {}", context, msg)),
                AppError::Runtime(msg) => AppError::Runtime(format!("{}: {}", context, msg)),
                other => AppError::internal(format!("{}: {}", context, other)),
            }
        })
    }

    fn context(self, message: &'static str) -> Result<T> {
        self.with_context(|| message.to_string())
    }
}

/// Error reporter for user feedback on stderr
pub struct ErrorReporter {
    pub use_color: bool,
    pub verbose: bool,
}

impl ErrorReporter {
    /// Create a new error reporter
    pub fn new(use_color: bool, verbose: bool) -> Self {
        Self { use_color, verbose }
    }

    /// Report an error to the user
    pub fn report_error(&self, error: &AppError) {
        eprintln!("{}", self.render(error));
    }

    /// Render the report without printing it
    pub fn render(&self, error: &AppError) -> String {
        let mut out = error.format_for_console(self.use_color);
        if self.verbose || error.is_configuration_error() {
            out.push_str("\n\n");
            out.push_str(&error.user_friendly_message());
        }
        out
    }
}

impl Default for ErrorReporter {
    fn default() -> Self {
        Self::new(true, false)
    }
}
