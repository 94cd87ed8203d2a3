//! Retry policy for attempts that failed before reaching the server's dialogue
//!
//! Only connect and timeout failures are retried. The delay before retry `n`
//! (1-based) depends on the backoff shape and is capped at `max_delay`.

use crate::types::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// How the delay grows between retries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffShape {
    /// Always `base`
    Fixed,
    /// `base * n`
    Linear,
    /// `base * 2^(n-1)`
    #[default]
    Exponential,
}

impl FromStr for BackoffShape {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "fixed" | "constant" => Ok(BackoffShape::Fixed),
            "linear" => Ok(BackoffShape::Linear),
            "exponential" | "exp" => Ok(BackoffShape::Exponential),
            other => Err(AppError::parse(format!(
                "Invalid backoff '{}' (expected fixed, linear or exponential)",
                other
            ))),
        }
    }
}

impl fmt::Display for BackoffShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BackoffShape::Fixed => "fixed",
            BackoffShape::Linear => "linear",
            BackoffShape::Exponential => "exponential",
        })
    }
}

/// Retry configuration for one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Retries after the first try; 0 disables retrying
    pub max_retries: u32,

    pub backoff: BackoffShape,

    /// Delay unit the backoff shape is applied to
    pub base_delay: Duration,

    /// Upper bound for a single delay
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            backoff: BackoffShape::default(),
            base_delay: crate::defaults::DEFAULT_BACKOFF_BASE,
            max_delay: crate::defaults::DEFAULT_BACKOFF_MAX,
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries
    pub fn none() -> Self {
        Self::default()
    }

    /// Whether another retry is allowed after `retries_done` retries
    pub fn should_retry(&self, retries_done: u32) -> bool {
        retries_done < self.max_retries
    }

    /// Delay to wait before retry number `retry` (1-based)
    pub fn delay_for(&self, retry: u32) -> Duration {
        let retry = retry.max(1);
        let delay = match self.backoff {
            BackoffShape::Fixed => self.base_delay,
            BackoffShape::Linear => self.base_delay.saturating_mul(retry),
            BackoffShape::Exponential => {
                let factor = 1u32.checked_shl(retry - 1).unwrap_or(u32::MAX);
                self.base_delay.saturating_mul(factor)
            }
        };
        delay.min(self.max_delay)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_retries > crate::defaults::MAX_RETRIES {
            return Err(AppError::config(format!(
                "Retries cannot exceed {}",
                crate::defaults::MAX_RETRIES
            )));
        }
        if self.max_delay < self.base_delay {
            return Err(AppError::config(
                "Backoff max delay must be greater than or equal to the base delay",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(backoff: BackoffShape) -> RetryPolicy {
        RetryPolicy {
            max_retries: 5,
            backoff,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(500),
        }
    }

    #[test]
    fn test_default_never_retries() {
        let policy = RetryPolicy::default();
        assert!(!policy.should_retry(0));
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn test_should_retry_counts() {
        let policy = policy(BackoffShape::Fixed);
        assert!(policy.should_retry(0));
        assert!(policy.should_retry(4));
        assert!(!policy.should_retry(5));
    }

    #[test]
    fn test_fixed_backoff() {
        let policy = policy(BackoffShape::Fixed);
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(4), Duration::from_millis(100));
    }

    #[test]
    fn test_linear_backoff_capped() {
        let policy = policy(BackoffShape::Linear);
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(3), Duration::from_millis(300));
        assert_eq!(policy.delay_for(9), Duration::from_millis(500));
    }

    #[test]
    fn test_exponential_backoff_capped() {
        let policy = policy(BackoffShape::Exponential);
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
        assert_eq!(policy.delay_for(4), Duration::from_millis(500));
        assert_eq!(policy.delay_for(64), Duration::from_millis(500));
    }

    #[test]
    fn test_validation() {
        let mut bad = policy(BackoffShape::Fixed);
        bad.max_retries = 11;
        assert!(bad.validate().is_err());

        let mut bad = policy(BackoffShape::Fixed);
        bad.max_delay = Duration::from_millis(10);
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_backoff_parsing() {
        assert_eq!("fixed".parse::<BackoffShape>().unwrap(), BackoffShape::Fixed);
        assert_eq!("Linear".parse::<BackoffShape>().unwrap(), BackoffShape::Linear);
        assert_eq!("exp".parse::<BackoffShape>().unwrap(), BackoffShape::Exponential);
        assert!("random".parse::<BackoffShape>().is_err());
    }
}
