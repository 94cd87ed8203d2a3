//! Command-line interface module with topic help

pub mod help;

pub use help::HelpSystem;

use crate::{
    models::{RunLimit, SuccessThreshold},
    scheduler::retry::BackoffShape,
    types::OutputFormat,
    utils::{parse_duration, parse_run_duration},
};
use clap::{ArgGroup, Parser};
use std::path::PathBuf;
use std::time::Duration;

/// SMTP Probe - send test messages to an SMTP server and report how it copes
///
/// Every option falls back to the environment (SMTP_HOST, PROBE_COUNT, ...),
/// then to a .env file in the working directory, then to built-in defaults.
#[derive(Parser, Debug, Clone)]
#[command(name = "probe")]
#[command(version, long_version = crate::LONG_VERSION, about, long_about = None)]
#[command(group(ArgGroup::new("limit").args(["count", "duration"])))]
pub struct Cli {
    /// SMTP server host name or IP address
    #[arg(long, value_name = "HOST")]
    pub host: Option<String>,

    /// SMTP server port
    #[arg(short, long, value_name = "PORT")]
    pub port: Option<u16>,

    /// Envelope sender address
    #[arg(long, value_name = "ADDRESS")]
    pub sender: Option<String>,

    /// Envelope recipient address
    #[arg(long, value_name = "ADDRESS")]
    pub recipient: Option<String>,

    /// Number of concurrent workers
    #[arg(short, long, value_name = "N")]
    pub concurrency: Option<usize>,

    /// Total number of attempts (default 10)
    #[arg(short = 'n', long, value_name = "N")]
    pub count: Option<u64>,

    /// Issue attempts for this long (e.g. 30s, 5m, or "infinite")
    #[arg(short, long, value_name = "DURATION", value_parser = parse_run_limit)]
    pub duration: Option<RunLimit>,

    /// Timeout for each SMTP stage (e.g. 10s, 500ms)
    #[arg(short, long, value_name = "DURATION", value_parser = parse_duration_arg)]
    pub timeout: Option<Duration>,

    /// Retries for connect and timeout failures
    #[arg(long, value_name = "N")]
    pub retries: Option<u32>,

    /// Backoff between retries: fixed, linear or exponential
    #[arg(long, value_name = "SHAPE", value_parser = parse_backoff)]
    pub backoff: Option<BackoffShape>,

    /// First retry delay
    #[arg(long, value_name = "DURATION", value_parser = parse_duration_arg)]
    pub backoff_base: Option<Duration>,

    /// Upper bound for any retry delay
    #[arg(long, value_name = "DURATION", value_parser = parse_duration_arg)]
    pub backoff_max: Option<Duration>,

    /// Maximum attempt starts per second across all workers
    #[arg(long, value_name = "PER_SECOND")]
    pub rate_limit: Option<f64>,

    /// Pause each worker takes between attempts
    #[arg(long, value_name = "DURATION", value_parser = parse_duration_arg)]
    pub delay: Option<Duration>,

    /// Required success rate: a percentage (95, 95%) or "any"
    #[arg(long, value_name = "THRESHOLD", value_parser = parse_threshold)]
    pub threshold: Option<SuccessThreshold>,

    /// Time in-flight attempts get to finish after Ctrl-C
    #[arg(long, value_name = "DURATION", value_parser = parse_duration_arg)]
    pub grace: Option<Duration>,

    /// Name announced in EHLO/HELO
    #[arg(long = "helo", value_name = "NAME")]
    pub helo_name: Option<String>,

    /// Subject template; {seq}, {worker} and {timestamp} are substituted
    #[arg(long, value_name = "TEMPLATE")]
    pub subject: Option<String>,

    /// Body template; same placeholders as --subject
    #[arg(long, value_name = "TEMPLATE")]
    pub body: Option<String>,

    /// Summary format: table, kv or json
    #[arg(long, value_name = "FORMAT", value_parser = parse_format)]
    pub format: Option<OutputFormat>,

    /// How often live progress is printed
    #[arg(long, value_name = "DURATION", value_parser = parse_duration_arg)]
    pub progress_interval: Option<Duration>,

    /// Write every outcome as a JSON line to this file
    #[arg(long, value_name = "PATH")]
    pub outcomes_file: Option<PathBuf>,

    /// Force colored output
    #[arg(long, conflicts_with = "no_color")]
    pub color: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Print every outcome as it happens
    #[arg(long)]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Show help for a specific topic (config, env, retry, output, exit-codes, examples)
    #[arg(long, value_name = "TOPIC")]
    pub help_topic: Option<String>,
}

impl Cli {
    /// Check if help should be displayed for a specific topic
    pub fn should_show_topic_help(&self) -> bool {
        self.help_topic.is_some()
    }

    /// Get the help topic if specified
    pub fn get_help_topic(&self) -> Option<&str> {
        self.help_topic.as_deref()
    }

    /// Explicit color choice from flags or `FORCE_COLOR`, if any
    pub fn color_override(&self) -> Option<bool> {
        if self.color {
            Some(true)
        } else if self.no_color {
            Some(false)
        } else if std::env::var_os("FORCE_COLOR").is_some() {
            Some(true)
        } else {
            None
        }
    }

    /// Check if colors should be enabled
    pub fn use_colors(&self) -> bool {
        self.color_override().unwrap_or_else(crate::output::supports_color)
    }

    /// Render help for the requested topic
    pub fn display_help(&self) -> Option<String> {
        let help_system = HelpSystem::new();
        let topic = self.help_topic.as_deref()?;
        Some(
            help_system
                .display_topic_help(topic, self.use_colors())
                .unwrap_or_else(|| help_system.display_topic_index(topic, self.use_colors())),
        )
    }
}

fn parse_duration_arg(s: &str) -> Result<Duration, String> {
    parse_duration(s).map_err(|e| e.to_string())
}

fn parse_run_limit(s: &str) -> Result<RunLimit, String> {
    match parse_run_duration(s).map_err(|e| e.to_string())? {
        Some(duration) => Ok(RunLimit::Duration(duration)),
        None => Ok(RunLimit::Unbounded),
    }
}

fn parse_backoff(s: &str) -> Result<BackoffShape, String> {
    s.parse().map_err(|e: crate::error::AppError| e.to_string())
}

fn parse_threshold(s: &str) -> Result<SuccessThreshold, String> {
    s.parse().map_err(|e: crate::error::AppError| e.to_string())
}

fn parse_format(s: &str) -> Result<OutputFormat, String> {
    s.parse().map_err(|e: crate::error::AppError| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_parsing_basic() {
        let cli = Cli::parse_from(["probe"]);
        assert!(cli.host.is_none());
        assert!(cli.count.is_none());
        assert!(cli.duration.is_none());
        assert!(!cli.verbose);
    }

    #[test]
    fn test_cli_parsing_all_options() {
        let cli = Cli::parse_from([
            "probe",
            "--host", "mx.example.com",
            "--port", "587",
            "--sender", "a@example.com",
            "--recipient", "b@example.com",
            "--concurrency", "8",
            "--count", "100",
            "--timeout", "500ms",
            "--retries", "2",
            "--backoff", "linear",
            "--backoff-base", "100ms",
            "--backoff-max", "2s",
            "--rate-limit", "12.5",
            "--delay", "50ms",
            "--threshold", "95%",
            "--grace", "3s",
            "--helo", "probe.example.com",
            "--format", "json",
            "--progress-interval", "2s",
            "--outcomes-file", "out.jsonl",
            "--no-color",
            "--verbose",
        ]);

        assert_eq!(cli.host.as_deref(), Some("mx.example.com"));
        assert_eq!(cli.port, Some(587));
        assert_eq!(cli.concurrency, Some(8));
        assert_eq!(cli.count, Some(100));
        assert_eq!(cli.timeout, Some(Duration::from_millis(500)));
        assert_eq!(cli.backoff, Some(BackoffShape::Linear));
        assert_eq!(cli.rate_limit, Some(12.5));
        assert_eq!(cli.threshold, Some(SuccessThreshold::Percent(95.0)));
        assert_eq!(cli.helo_name.as_deref(), Some("probe.example.com"));
        assert_eq!(cli.format, Some(OutputFormat::Json));
        assert_eq!(cli.outcomes_file, Some(PathBuf::from("out.jsonl")));
        assert_eq!(cli.color_override(), Some(false));
    }

    #[test]
    fn test_count_conflicts_with_duration() {
        let result = Cli::try_parse_from(["probe", "--count", "5", "--duration", "10s"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_color_flags_conflict() {
        assert!(Cli::try_parse_from(["probe", "--color", "--no-color"]).is_err());
    }

    #[test]
    fn test_duration_accepts_infinite() {
        let cli = Cli::parse_from(["probe", "--duration", "infinite"]);
        assert_eq!(cli.duration, Some(RunLimit::Unbounded));

        let cli = Cli::parse_from(["probe", "--duration", "2m"]);
        assert_eq!(cli.duration, Some(RunLimit::Duration(Duration::from_secs(120))));
    }

    #[test]
    fn test_bad_values_rejected() {
        assert!(Cli::try_parse_from(["probe", "--timeout", "soon"]).is_err());
        assert!(Cli::try_parse_from(["probe", "--backoff", "random"]).is_err());
        assert!(Cli::try_parse_from(["probe", "--threshold", "150"]).is_err());
        assert!(Cli::try_parse_from(["probe", "--format", "xml"]).is_err());
        assert!(Cli::try_parse_from(["probe", "--port", "70000"]).is_err());
    }

    #[test]
    fn test_help_topic_methods() {
        let cli = Cli::parse_from(["probe", "--help-topic", "retry", "--no-color"]);
        assert!(cli.should_show_topic_help());
        assert_eq!(cli.get_help_topic(), Some("retry"));
        assert!(cli.display_help().is_some_and(|h| h.contains("backoff")));

        let cli = Cli::parse_from(["probe"]);
        assert!(cli.display_help().is_none());
    }

    #[test]
    fn test_unknown_topic_lists_topics() {
        let cli = Cli::parse_from(["probe", "--help-topic", "nonsense", "--no-color"]);
        let help = cli.display_help().unwrap();
        assert!(help.contains("nonsense"));
        assert!(help.contains("exit-codes"));
    }
}
