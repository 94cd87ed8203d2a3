//! Colored formatter implementation with terminal color support
//!
//! Layout is delegated to [`PlainFormatter`]; this formatter only styles the
//! already padded cells, so colored and plain tables line up identically.

use crate::{
    error::Result,
    models::{AttemptOutcome, ProbeConfig, RunSummary, SuccessThreshold},
    types::PerformanceLevel,
};
use super::formatter::{outcome_line, progress_line, FormattingOptions, OutputFormatter, PlainFormatter};
use colored::*;

/// Color scheme configuration
#[derive(Debug, Clone)]
pub struct ColorScheme {
    pub header: Color,
    pub success: Color,
    pub warning: Color,
    pub error: Color,
    pub info: Color,
    pub muted: Color,
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self {
            header: Color::Blue,
            success: Color::Green,
            warning: Color::Yellow,
            error: Color::Red,
            info: Color::Cyan,
            muted: Color::BrightBlack,
        }
    }
}

impl PerformanceLevel {
    /// Color used for latency cells of this level
    pub fn color(&self) -> Color {
        match self {
            PerformanceLevel::Good => Color::Green,
            PerformanceLevel::Moderate => Color::Yellow,
            PerformanceLevel::Poor => Color::Red,
        }
    }
}

/// Colored formatter implementation
pub struct ColoredFormatter {
    plain_formatter: PlainFormatter,
    options: FormattingOptions,
    color_scheme: ColorScheme,
}

impl ColoredFormatter {
    /// Create a new colored formatter with options
    pub fn new(options: FormattingOptions) -> Self {
        Self::with_color_scheme(options, ColorScheme::default())
    }

    /// Create a colored formatter with custom color scheme
    pub fn with_color_scheme(options: FormattingOptions, color_scheme: ColorScheme) -> Self {
        Self {
            plain_formatter: PlainFormatter::new(options.clone()),
            options,
            color_scheme,
        }
    }

    /// Apply color to text if colors are enabled
    fn colorize(&self, text: &str, color: Color) -> ColoredString {
        if self.options.enable_color {
            text.color(color)
        } else {
            text.normal()
        }
    }

    /// Bold and colored, or plain when colors are disabled
    fn emphasize(&self, text: &str, color: Color) -> ColoredString {
        if self.options.enable_color {
            text.bold().color(color)
        } else {
            text.normal()
        }
    }

    fn rate_color(&self, percentage: f64) -> Color {
        if percentage >= 99.0 {
            self.color_scheme.success
        } else if percentage >= 90.0 {
            self.color_scheme.warning
        } else {
            self.color_scheme.error
        }
    }

    /// Style one padded value cell based on its metric label
    fn style_value(&self, label: &str, cell: &str, summary: &RunSummary, threshold: &SuccessThreshold) -> String {
        let label = label.trim();
        let numeric_nonzero = cell.trim().parse::<u64>().map(|n| n > 0).unwrap_or(false);

        let styled = match label {
            "Succeeded" => self.colorize(cell, self.color_scheme.success),
            "Success rate" => self.colorize(cell, self.rate_color(summary.success_rate())),
            "Connect failures" | "Timeout failures" | "Protocol failures" | "Unknown failures" | "abandoned"
                if numeric_nonzero =>
            {
                self.colorize(cell, self.color_scheme.error)
            }
            "reply codes" => self.colorize(cell, self.color_scheme.error),
            "Retries" if numeric_nonzero => self.colorize(cell, self.color_scheme.warning),
            "Target" => self.colorize(cell, self.color_scheme.info),
            "Result" if summary.passes(threshold) => self.emphasize(cell, self.color_scheme.success),
            "Result" => self.emphasize(cell, self.color_scheme.error),
            l if l.starts_with("Latency") => {
                let ms = match l {
                    "Latency min" => summary.latency.map(|s| s.min_ms),
                    "Latency mean" => summary.latency.map(|s| s.mean_ms),
                    "Latency p50" => summary.latency.map(|s| s.p50_ms),
                    "Latency p90" => summary.latency.map(|s| s.p90_ms),
                    "Latency p95" => summary.latency.map(|s| s.p95_ms),
                    "Latency p99" => summary.latency.map(|s| s.p99_ms),
                    _ => summary.latency.map(|s| s.max_ms),
                };
                match ms {
                    Some(ms) => self.colorize(cell, PerformanceLevel::from_millis(ms).color()),
                    None => cell.normal(),
                }
            }
            _ => cell.normal(),
        };
        styled.to_string()
    }
}

impl OutputFormatter for ColoredFormatter {
    fn format_header(&self, config: &ProbeConfig) -> Result<String> {
        let plain = self.plain_formatter.format_header(config)?;
        Ok(self.emphasize(&plain, self.color_scheme.header).to_string())
    }

    fn format_progress(&self, summary: &RunSummary, planned: Option<u64>) -> Result<String> {
        let line = progress_line(summary, planned);
        if summary.failures() > 0 {
            Ok(self.colorize(&line, self.color_scheme.warning).to_string())
        } else {
            Ok(line)
        }
    }

    fn format_outcome(&self, outcome: &AttemptOutcome) -> Result<String> {
        let line = outcome_line(outcome);
        let color = if outcome.is_success() {
            self.color_scheme.success
        } else {
            self.color_scheme.error
        };
        Ok(self.colorize(&line, color).to_string())
    }

    fn format_summary(&self, summary: &RunSummary, threshold: &SuccessThreshold) -> Result<String> {
        let plain = &self.plain_formatter;
        let rows = plain.summary_rows(summary, threshold);
        let table = plain.create_styled_table(&plain.summary_table(), &rows, |row, col, cell| match row {
            None => self.emphasize(cell, self.color_scheme.header).to_string(),
            Some(_) if col == 0 => self.colorize(cell, self.color_scheme.muted).to_string(),
            Some(idx) => {
                let label = rows.get(idx).and_then(|r| r.first()).map(String::as_str).unwrap_or("");
                self.style_value(label, cell, summary, threshold)
            }
        });
        Ok(table)
    }
}

/// Check if the terminal environment allows colors
///
/// `NO_COLOR` and `TERM=dumb` disable colors; `FORCE_COLOR` wins over both.
pub fn supports_color() -> bool {
    if std::env::var_os("FORCE_COLOR").is_some() {
        return true;
    }
    std::env::var_os("NO_COLOR").is_none() && std::env::var("TERM").map(|term| term != "dumb").unwrap_or(true)
}
