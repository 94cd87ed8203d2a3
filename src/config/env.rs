//! Environment variable handling and .env file management

use crate::error::{AppError, Result};
use crate::utils::{parse_duration, parse_run_duration};
use std::path::Path;
use tracing::debug;

/// Default location of the environment file
pub const DEFAULT_ENV_FILE: &str = ".env";

/// Environment variable configuration manager
pub struct EnvManager;

impl EnvManager {
    /// Load an environment file if it exists
    ///
    /// Variables already present in the process environment are kept, so real
    /// environment variables take precedence over the file.
    pub fn load_env_file(path: &Path) -> Result<bool> {
        if !path.exists() {
            debug!(path = %path.display(), "no environment file found");
            return Ok(false);
        }

        dotenv::from_path(path)
            .map_err(|e| AppError::config(format!("Failed to load {}: {}", path.display(), e)))?;
        debug!(path = %path.display(), "loaded environment file");
        Ok(true)
    }

    /// Create example .env file content
    pub fn create_example_env_content() -> String {
        r#"# SMTP Probe configuration
#
# Values here are used when neither the process environment nor the
# command line sets them.

# Server to probe
# SMTP_HOST=localhost
# SMTP_PORT=2525

# Envelope addresses
# PROBE_SENDER=sender@example.com
# PROBE_RECIPIENT=receiver@example.com

# Number of concurrent workers
# PROBE_CONCURRENCY=4

# Stop condition: a fixed number of attempts, or a duration ("infinite" runs
# until Ctrl-C). Setting both is allowed here; the later one (duration) wins.
# PROBE_COUNT=100
# PROBE_DURATION=5m

# Timeout for every SMTP stage
# PROBE_TIMEOUT=10s

# Enable colored output (true/false)
# PROBE_ENABLE_COLOR=true
"#
        .to_string()
    }

    /// Save example .env file to disk
    pub fn save_example_env_file(path: &Path) -> Result<()> {
        std::fs::write(path, Self::create_example_env_content())
            .map_err(|e| AppError::config(format!("Failed to write example .env file: {}", e)))
    }

    /// Validate environment variable format before parsing
    pub fn validate_env_var(key: &str, value: &str) -> Result<()> {
        let value = value.trim();
        match key {
            "SMTP_HOST" => {
                if value.is_empty() || value.chars().any(char::is_whitespace) {
                    return Err(AppError::config(format!("Invalid SMTP_HOST value '{}'", value)));
                }
            }
            "SMTP_PORT" => {
                let port: u16 = value
                    .parse()
                    .map_err(|e| AppError::config(format!("Invalid SMTP_PORT value '{}': {}", value, e)))?;
                if port == 0 {
                    return Err(AppError::config("SMTP_PORT must be between 1 and 65535"));
                }
            }
            "PROBE_SENDER" | "PROBE_RECIPIENT" => {
                crate::models::validate_mailbox(key, value)?;
            }
            "PROBE_CONCURRENCY" => {
                let concurrency: usize = value
                    .parse()
                    .map_err(|e| AppError::config(format!("Invalid PROBE_CONCURRENCY value '{}': {}", value, e)))?;
                if concurrency == 0 || concurrency > crate::defaults::MAX_CONCURRENCY {
                    return Err(AppError::config(format!(
                        "PROBE_CONCURRENCY must be between 1 and {}, got: {}",
                        crate::defaults::MAX_CONCURRENCY,
                        concurrency
                    )));
                }
            }
            "PROBE_COUNT" => {
                let count: u64 = value
                    .parse()
                    .map_err(|e| AppError::config(format!("Invalid PROBE_COUNT value '{}': {}", value, e)))?;
                if count == 0 {
                    return Err(AppError::config("PROBE_COUNT must be greater than 0"));
                }
            }
            "PROBE_TIMEOUT" => {
                let timeout = parse_duration(value)
                    .map_err(|e| AppError::config(format!("Invalid PROBE_TIMEOUT value '{}': {}", value, e)))?;
                if timeout.is_zero() || timeout > crate::defaults::MAX_TIMEOUT {
                    return Err(AppError::config(format!(
                        "PROBE_TIMEOUT must be between 1ms and {}s",
                        crate::defaults::MAX_TIMEOUT.as_secs()
                    )));
                }
            }
            "PROBE_DURATION" => {
                parse_run_duration(value)
                    .map_err(|e| AppError::config(format!("Invalid PROBE_DURATION value '{}': {}", value, e)))?;
            }
            "PROBE_ENABLE_COLOR" => {
                value
                    .parse::<bool>()
                    .map_err(|e| AppError::config(format!("Invalid PROBE_ENABLE_COLOR value '{}': {}", value, e)))?;
            }
            _ => {}
        }

        Ok(())
    }

    /// Get list of all supported environment variables with descriptions
    pub fn get_supported_env_vars() -> Vec<(&'static str, &'static str, &'static str)> {
        vec![
            ("SMTP_HOST", "SMTP server host name or IP address", "mx.example.com"),
            ("SMTP_PORT", "SMTP server port (1-65535)", "25"),
            ("PROBE_SENDER", "Envelope sender address", "probe@example.com"),
            ("PROBE_RECIPIENT", "Envelope recipient address", "sink@example.com"),
            ("PROBE_CONCURRENCY", "Number of concurrent workers", "8"),
            ("PROBE_COUNT", "Number of attempts", "100"),
            ("PROBE_DURATION", "Run duration, or 'infinite'", "5m"),
            ("PROBE_TIMEOUT", "Timeout for each SMTP stage", "10s"),
            ("PROBE_ENABLE_COLOR", "Enable colored output", "true"),
        ]
    }

    /// Validate all currently set environment variables
    pub fn validate_current_env() -> Vec<String> {
        Self::get_supported_env_vars()
            .into_iter()
            .filter_map(|(var_name, _, _)| {
                let value = std::env::var(var_name).ok()?;
                Self::validate_env_var(var_name, &value)
                    .err()
                    .map(|e| format!("{}: {}", var_name, e))
            })
            .collect()
    }

    /// Validate the lines of an environment file without loading it
    pub fn check_env_file(path: &Path) -> Result<Option<Vec<String>>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::config(format!("Failed to read {}: {}", path.display(), e)))?;

        let warnings = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(|line| {
                let (key, value) = line.split_once('=')?;
                let value = value.trim().trim_matches('"');
                Self::validate_env_var(key.trim(), value)
                    .err()
                    .map(|e| format!("Line '{}': {}", line, e))
            })
            .collect();

        Ok(Some(warnings))
    }
}
