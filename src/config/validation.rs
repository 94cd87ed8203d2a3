//! Configuration validation rules beyond hard errors
//!
//! [`ProbeConfig::validate`] rejects configurations that cannot run. The
//! [`ConfigValidator`] looks for ones that can run but probably should not
//! run the way they are written, and reports them as warnings.

use crate::{
    error::Result,
    models::{ProbeConfig, RunLimit, SuccessThreshold},
};
use colored::*;
use std::time::Duration;

/// Concurrency above this is flagged as likely to hit server limits
const HIGH_CONCURRENCY: usize = 256;

/// Configuration validator with advisory rules
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate hard rules, then collect warnings
    pub fn validate_comprehensive(config: &ProbeConfig) -> Result<Vec<ValidationWarning>> {
        config.validate()?;

        let mut warnings = Vec::new();
        warnings.extend(Self::validate_workload(config));
        warnings.extend(Self::validate_timing(config));
        warnings.extend(Self::validate_threshold(config));
        Ok(warnings)
    }

    fn validate_workload(config: &ProbeConfig) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();

        if config.concurrency > HIGH_CONCURRENCY {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                format!(
                    "Concurrency of {} may exceed the server's connection limit or exhaust local ports",
                    config.concurrency
                ),
            ));
        }

        match config.run_limit {
            RunLimit::Count(count) if (config.concurrency as u64) > count => {
                warnings.push(ValidationWarning::new(
                    ValidationLevel::Info,
                    format!("Only {} of {} workers will get an attempt", count, config.concurrency),
                ));
            }
            RunLimit::Unbounded => {
                warnings.push(ValidationWarning::new(
                    ValidationLevel::Info,
                    "Run has no stop condition and continues until interrupted".to_string(),
                ));
            }
            _ => {}
        }

        if let Some(rate) = config.rate_limit {
            if !config.delay.is_zero() {
                warnings.push(ValidationWarning::new(
                    ValidationLevel::Info,
                    format!(
                        "Both a rate limit ({}/s) and a per-worker delay ({}) are set; the slower of the two wins",
                        rate,
                        crate::utils::format_duration(config.delay)
                    ),
                ));
            }
        }

        warnings
    }

    fn validate_timing(config: &ProbeConfig) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();

        if config.timeout < Duration::from_secs(1) {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                format!(
                    "Stage timeout of {} is shorter than many servers' greeting delay",
                    crate::utils::format_duration(config.timeout)
                ),
            ));
        }

        if config.grace_timeout.is_zero() {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Info,
                "Grace timeout is zero; in-flight attempts are abandoned as soon as the run is interrupted"
                    .to_string(),
            ));
        }

        if config.retry.max_retries > 0 && config.retry.max_delay > config.timeout.saturating_mul(3) {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Info,
                format!(
                    "Retry delays of up to {} will dominate attempt latency",
                    crate::utils::format_duration(config.retry.max_delay)
                ),
            ));
        }

        warnings
    }

    fn validate_threshold(config: &ProbeConfig) -> Vec<ValidationWarning> {
        match config.success_threshold {
            SuccessThreshold::Percent(p) if p == 0.0 => vec![ValidationWarning::new(
                ValidationLevel::Warning,
                "A 0% threshold passes any run that completes at least one attempt".to_string(),
            )],
            _ => Vec::new(),
        }
    }
}

/// Validation warning levels
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ValidationLevel {
    Info,
    Warning,
}

impl ValidationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
        }
    }

    pub fn color(&self) -> Color {
        match self {
            Self::Info => Color::Blue,
            Self::Warning => Color::Yellow,
        }
    }
}

/// Configuration validation warning
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub level: ValidationLevel,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(level: ValidationLevel, message: String) -> Self {
        Self { level, message }
    }

    /// Format warning for display
    pub fn format(&self, use_color: bool) -> String {
        let tag = format!("[{}]", self.level.as_str());
        if use_color {
            format!("{} {}", tag.color(self.level.color()).bold(), self.message)
        } else {
            format!("{} {}", tag, self.message)
        }
    }
}

/// Convenience function for comprehensive configuration validation
pub fn validate_config(config: &ProbeConfig) -> Result<Vec<ValidationWarning>> {
    ConfigValidator::validate_comprehensive(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn messages(config: &ProbeConfig) -> Vec<String> {
        validate_config(config)
            .unwrap()
            .into_iter()
            .map(|w| w.message)
            .collect()
    }

    #[test]
    fn test_default_config_has_no_warnings() {
        assert!(validate_config(&ProbeConfig::default()).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_config_is_an_error() {
        let config = ProbeConfig { port: 0, ..Default::default() };
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_high_concurrency_warning() {
        let config = ProbeConfig {
            concurrency: 512,
            run_limit: RunLimit::Count(10_000),
            ..Default::default()
        };
        let warnings = validate_config(&config).unwrap();
        assert!(warnings
            .iter()
            .any(|w| w.level == ValidationLevel::Warning && w.message.contains("512")));
    }

    #[test]
    fn test_idle_workers_noted() {
        let config = ProbeConfig {
            concurrency: 8,
            run_limit: RunLimit::Count(2),
            ..Default::default()
        };
        assert!(messages(&config).iter().any(|m| m.contains("Only 2 of 8")));
    }

    #[test]
    fn test_unbounded_run_noted() {
        let config = ProbeConfig { run_limit: RunLimit::Unbounded, ..Default::default() };
        assert!(messages(&config).iter().any(|m| m.contains("until interrupted")));
    }

    #[test]
    fn test_rate_and_delay_noted() {
        let config = ProbeConfig {
            rate_limit: Some(10.0),
            delay: Duration::from_millis(100),
            ..Default::default()
        };
        assert!(messages(&config).iter().any(|m| m.contains("rate limit")));
    }

    #[test]
    fn test_zero_grace_noted() {
        let config = ProbeConfig { grace_timeout: Duration::ZERO, ..Default::default() };
        assert!(messages(&config).iter().any(|m| m.contains("Grace timeout is zero")));
    }

    #[test]
    fn test_zero_threshold_warning() {
        let config = ProbeConfig {
            success_threshold: SuccessThreshold::Percent(0.0),
            ..Default::default()
        };
        assert!(messages(&config).iter().any(|m| m.contains("0% threshold")));
    }

    #[test]
    fn test_warning_format() {
        let warning = ValidationWarning::new(ValidationLevel::Info, "note".to_string());
        assert_eq!(warning.format(false), "[INFO] note");
    }
}
