//! Configuration parsing from CLI arguments and environment variables

use crate::{
    cli::Cli,
    config::env::{EnvManager, DEFAULT_ENV_FILE},
    error::Result,
    models::ProbeConfig,
};
use std::path::PathBuf;
use tracing::debug;

/// Configuration parser that layers defaults, .env, environment and CLI
pub struct ConfigParser {
    cli: Cli,
    env_file: PathBuf,
}

impl ConfigParser {
    /// Create a new configuration parser with CLI arguments
    pub fn new(cli: Cli) -> Self {
        Self {
            cli,
            env_file: PathBuf::from(DEFAULT_ENV_FILE),
        }
    }

    /// Read the environment file from `path` instead of `./.env`
    pub fn with_env_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.env_file = path.into();
        self
    }

    /// Parse and build the complete configuration
    pub fn parse(&self) -> Result<ProbeConfig> {
        let mut config = ProbeConfig::default();

        EnvManager::load_env_file(&self.env_file)?;
        config.merge_from_env()?;
        self.apply_cli_overrides(&mut config);

        config.validate()?;
        Ok(config)
    }

    /// Apply CLI argument overrides to configuration
    fn apply_cli_overrides(&self, config: &mut ProbeConfig) {
        let cli = &self.cli;

        if let Some(host) = &cli.host {
            config.host = host.trim().to_string();
        }
        if let Some(port) = cli.port {
            config.port = port;
        }
        if let Some(sender) = &cli.sender {
            config.sender = sender.clone();
        }
        if let Some(recipient) = &cli.recipient {
            config.recipient = recipient.clone();
        }
        if let Some(helo_name) = &cli.helo_name {
            config.helo_name = helo_name.clone();
        }
        if let Some(subject) = &cli.subject {
            config.subject = subject.clone();
        }
        if let Some(body) = &cli.body {
            config.body = body.clone();
        }
        if let Some(concurrency) = cli.concurrency {
            config.concurrency = concurrency;
        }

        if let Some(count) = cli.count {
            config.run_limit = crate::models::RunLimit::Count(count);
        }
        if let Some(limit) = cli.duration {
            config.run_limit = limit;
        }

        if let Some(timeout) = cli.timeout {
            config.timeout = timeout;
        }
        if let Some(delay) = cli.delay {
            config.delay = delay;
        }
        if let Some(rate) = cli.rate_limit {
            config.rate_limit = Some(rate);
        }

        if let Some(retries) = cli.retries {
            config.retry.max_retries = retries;
        }
        if let Some(backoff) = cli.backoff {
            config.retry.backoff = backoff;
        }
        if let Some(base) = cli.backoff_base {
            config.retry.base_delay = base;
        }
        if let Some(max) = cli.backoff_max {
            config.retry.max_delay = max;
        }

        if let Some(threshold) = cli.threshold {
            config.success_threshold = threshold;
        }
        if let Some(grace) = cli.grace {
            config.grace_timeout = grace;
        }
        if let Some(format) = cli.format {
            config.output_format = format;
        }
        if let Some(interval) = cli.progress_interval {
            config.progress_interval = interval;
        }
        if let Some(path) = &cli.outcomes_file {
            config.outcomes_file = Some(path.clone());
        }

        config.enable_color = cli
            .color_override()
            .unwrap_or(config.enable_color && crate::output::supports_color());

        // CLI-only switches
        config.verbose = cli.verbose;
        config.debug = cli.debug;

        debug!(
            server = %config.target(),
            concurrency = config.concurrency,
            limit = %config.run_limit,
            "applied command-line overrides"
        );
    }
}

/// Convenience function to load complete configuration from CLI arguments
pub fn load_config(cli: Cli) -> Result<ProbeConfig> {
    ConfigParser::new(cli).parse()
}

/// Configuration summary for debug output
pub fn display_config_summary(config: &ProbeConfig) -> String {
    let mut summary = vec![
        format!("Target: {}", config.target()),
        format!("HELO name: {}", config.helo_name),
        format!("Sender: {}", config.sender),
        format!("Recipient: {}", config.recipient),
        format!("Concurrency: {}", config.concurrency),
        format!("Limit: {}", config.run_limit),
        format!("Stage timeout: {}", crate::utils::format_duration(config.timeout)),
        format!(
            "Retries: {} ({} backoff, base {}, max {})",
            config.retry.max_retries,
            config.retry.backoff,
            crate::utils::format_duration(config.retry.base_delay),
            crate::utils::format_duration(config.retry.max_delay)
        ),
    ];

    if let Some(rate) = config.rate_limit {
        summary.push(format!("Rate limit: {}/s", rate));
    }
    if !config.delay.is_zero() {
        summary.push(format!("Delay: {}", crate::utils::format_duration(config.delay)));
    }
    summary.push(format!("Threshold: {}", config.success_threshold));
    summary.push(format!("Grace timeout: {}", crate::utils::format_duration(config.grace_timeout)));
    summary.push(format!("Output format: {:?}", config.output_format));
    if let Some(path) = &config.outcomes_file {
        summary.push(format!("Outcomes file: {}", path.display()));
    }
    summary.push(format!("Color Output: {}", config.enable_color));
    summary.push(format!("Verbose: {}", config.verbose));

    summary.join("\n")
}
