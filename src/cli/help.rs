//! Topic help with examples and detailed guidance
//!
//! `probe --help` is generated by clap; this module backs `--help-topic`,
//! which explains the parts of the tool a flag description cannot.

use crate::config::env::EnvManager;
use colored::*;

const TOPICS: &[(&str, &str)] = &[
    ("config", "Configuration sources, precedence and limits"),
    ("env", "Environment variables and the .env file"),
    ("retry", "Retry policy and backoff shapes"),
    ("output", "Summary formats, progress and the outcomes file"),
    ("exit-codes", "What the exit status means"),
    ("examples", "Common invocations"),
];

/// Help system for the CLI application
#[derive(Debug, Default)]
pub struct HelpSystem;

impl HelpSystem {
    pub fn new() -> Self {
        Self
    }

    /// Display help for a topic, or `None` when the topic is unknown
    pub fn display_topic_help(&self, topic: &str, use_colors: bool) -> Option<String> {
        match topic.trim().to_lowercase().as_str() {
            "config" | "configuration" => Some(self.format_configuration_help(use_colors)),
            "env" | "environment" => Some(self.format_environment_help(use_colors)),
            "retry" | "retries" | "backoff" => Some(self.format_retry_help(use_colors)),
            "output" | "format" | "formats" => Some(self.format_output_help(use_colors)),
            "exit-codes" | "exit" | "exit-code" => Some(self.format_exit_code_help(use_colors)),
            "examples" | "example" => Some(self.format_examples_help(use_colors)),
            _ => None,
        }
    }

    /// List of known topics, prefixed by a note about the unknown one
    pub fn display_topic_index(&self, unknown: &str, use_colors: bool) -> String {
        let mut help = format!("Unknown help topic '{}'.\n\n", unknown);
        help.push_str(&self.header("AVAILABLE TOPICS:", use_colors));
        for (topic, description) in TOPICS {
            if use_colors {
                help.push_str(&format!("  {:<12} {}\n", topic.bright_yellow(), description));
            } else {
                help.push_str(&format!("  {:<12} {}\n", topic, description));
            }
        }
        help
    }

    fn header(&self, title: &str, use_colors: bool) -> String {
        if use_colors {
            format!("{}\n", title.bright_green().bold())
        } else {
            format!("{}\n", title)
        }
    }

    fn format_configuration_help(&self, use_colors: bool) -> String {
        let mut help = self.header("CONFIGURATION REFERENCE:", use_colors);
        help.push('\n');

        help.push_str("PRIORITY (highest to lowest):\n");
        help.push_str("1. Command-line arguments\n");
        help.push_str("2. Environment variables\n");
        help.push_str("3. .env file in the working directory\n");
        help.push_str("4. Built-in defaults\n\n");

        help.push_str("LIMITS:\n");
        help.push_str(&format!("- Concurrency: 1-{} workers\n", crate::defaults::MAX_CONCURRENCY));
        help.push_str(&format!(
            "- Stage timeout: up to {}s\n",
            crate::defaults::MAX_TIMEOUT.as_secs()
        ));
        help.push_str(&format!("- Retries: 0-{}\n", crate::defaults::MAX_RETRIES));
        help.push_str("- --count and --duration are mutually exclusive; with neither, 10 attempts run\n");
        help.push_str("- --duration infinite runs until Ctrl-C\n\n");

        help.push_str("DURATIONS:\n");
        help.push_str("  500ms, 10s, 2m, 1h, or a bare number of seconds\n");
        help
    }

    fn format_environment_help(&self, use_colors: bool) -> String {
        let mut help = self.header("ENVIRONMENT VARIABLES REFERENCE:", use_colors);
        help.push('\n');

        for (var_name, description, example) in EnvManager::get_supported_env_vars() {
            if use_colors {
                help.push_str(&format!(
                    "{}:\n  {}\n  Example: {}\n\n",
                    var_name.bright_yellow().bold(),
                    description,
                    example.bright_blue().italic()
                ));
            } else {
                help.push_str(&format!("{}:\n  {}\n  Example: {}\n\n", var_name, description, example));
            }
        }

        help.push_str("EXAMPLE .env FILE:\n");
        help.push_str(&EnvManager::create_example_env_content());
        help
    }

    fn format_retry_help(&self, use_colors: bool) -> String {
        let mut help = self.header("RETRY POLICY:", use_colors);
        help.push('\n');
        help.push_str("Only connect failures and stage timeouts are retried. A 4xx/5xx reply\n");
        help.push_str("from the server is a final answer and is never retried.\n\n");
        help.push_str("  --retries N         retries per attempt (default 0)\n");
        help.push_str("  --backoff SHAPE     fixed, linear or exponential (default exponential)\n");
        help.push_str("  --backoff-base D    first delay (default 200ms)\n");
        help.push_str("  --backoff-max D     cap for any delay (default 10s)\n\n");
        help.push_str("Delay before retry n:\n");
        help.push_str("  fixed        base\n");
        help.push_str("  linear       base * n\n");
        help.push_str("  exponential  base * 2^(n-1)\n\n");
        help.push_str("Retries reuse the attempt's sequence number; the summary reports the\n");
        help.push_str("total number of retries spent.\n");
        help
    }

    fn format_output_help(&self, use_colors: bool) -> String {
        let mut help = self.header("OUTPUT:", use_colors);
        help.push('\n');
        help.push_str("  --format table   aligned table, colored when enabled (default)\n");
        help.push_str("  --format kv      one key=value pair per line\n");
        help.push_str("  --format json    a single JSON document\n\n");
        help.push_str("Progress lines are printed every --progress-interval. With kv and json,\n");
        help.push_str("progress and --verbose echo lines go to stderr so stdout holds only the\n");
        help.push_str("summary.\n\n");
        help.push_str("--outcomes-file PATH writes every attempt as one JSON object per line.\n\n");
        help.push_str("Colors: --color forces them, --no-color disables them; otherwise\n");
        help.push_str("NO_COLOR, FORCE_COLOR and TERM=dumb are honored.\n");
        help
    }

    fn format_exit_code_help(&self, use_colors: bool) -> String {
        let mut help = self.header("EXIT CODES:", use_colors);
        help.push('\n');
        help.push_str("  0  the success rate met --threshold (default 100%)\n");
        help.push_str("  1  the threshold was missed, no attempt completed, or a runtime error occurred\n");
        help.push_str("  2  the configuration or command line was invalid\n");
        help
    }

    fn format_examples_help(&self, use_colors: bool) -> String {
        let mut help = self.header("EXAMPLES:", use_colors);
        help.push('\n');

        let examples = [
            ("Ten messages to a local test server", "probe --host localhost --port 2525"),
            (
                "Load test for one minute with 32 workers",
                "probe --host mx.example.com --port 25 -c 32 --duration 1m",
            ),
            (
                "Rate limited, tolerate 5% failures",
                "probe --host mx.example.com --rate-limit 20 --count 500 --threshold 95",
            ),
            (
                "Retry flaky connects",
                "probe --host mx.example.com --retries 3 --backoff exponential --backoff-base 250ms",
            ),
            ("Machine-readable summary", "probe --host mx.example.com --format json > summary.json"),
            ("Run until Ctrl-C", "probe --host mx.example.com --duration infinite --verbose"),
        ];

        for (description, command) in examples {
            help.push_str(&format!("  # {}\n", description));
            if use_colors {
                help.push_str(&format!("  {}\n\n", command.bright_cyan()));
            } else {
                help.push_str(&format!("  {}\n\n", command));
            }
        }
        help
    }
}
