//! Output formatter trait and plain implementations
//!
//! Formatters only turn data into strings; writing them anywhere is the
//! [`Reporter`](super::Reporter)'s job.

use crate::{
    error::{AppError, Result},
    models::{AttemptOutcome, ProbeConfig, RunSummary, SuccessThreshold},
};
use serde::Serialize;
use std::fmt::Write as _;

/// Common interface for every summary format
pub trait OutputFormatter: Send + Sync {
    /// Banner printed once before the run starts
    fn format_header(&self, config: &ProbeConfig) -> Result<String>;

    /// One live status line; `planned` is the attempt count when known
    fn format_progress(&self, summary: &RunSummary, planned: Option<u64>) -> Result<String>;

    /// Verbose echo line for a single outcome
    fn format_outcome(&self, outcome: &AttemptOutcome) -> Result<String>;

    /// Final summary
    fn format_summary(&self, summary: &RunSummary, threshold: &SuccessThreshold) -> Result<String>;
}

/// Configuration options for formatting
#[derive(Debug, Clone)]
pub struct FormattingOptions {
    /// Enable colored output
    pub enable_color: bool,
    /// Include retry and latency detail rows even when they are zero
    pub verbose_mode: bool,
    /// Show table borders
    pub table_borders: bool,
    /// Maximum width of a table cell
    pub max_width: usize,
}

impl Default for FormattingOptions {
    fn default() -> Self {
        Self {
            enable_color: true,
            verbose_mode: false,
            table_borders: true,
            max_width: 80,
        }
    }
}

/// Table formatting configuration
#[derive(Debug, Clone)]
pub struct TableFormat {
    /// Column definitions
    pub columns: Vec<Column>,
    /// Show borders around table
    pub show_borders: bool,
    /// Show header row
    pub show_header: bool,
}

/// Column definition for table formatting
#[derive(Debug, Clone)]
pub struct Column {
    pub header: String,
    pub alignment: Alignment,
    pub min_width: usize,
    pub max_width: usize,
}

impl Column {
    pub fn new(header: &str, alignment: Alignment, max_width: usize) -> Self {
        Self {
            header: header.to_string(),
            alignment,
            min_width: 0,
            max_width,
        }
    }
}

/// Text alignment options
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Alignment {
    Left,
    Right,
}

/// Row data for table formatting
pub type RowData = Vec<String>;

fn fmt_err(e: std::fmt::Error) -> AppError {
    AppError::io(format!("Failed to format output: {}", e))
}

/// Milliseconds rendered with a precision that suits their magnitude
pub fn format_ms(ms: f64) -> String {
    if ms < 1.0 {
        format!("{:.0}µs", ms * 1000.0)
    } else if ms < 1000.0 {
        format!("{:.1}ms", ms)
    } else {
        format!("{:.2}s", ms / 1000.0)
    }
}

/// Percentage with one decimal; never rounds a partial result up to 100%
pub fn format_percentage(percentage: f64) -> String {
    if percentage >= 100.0 {
        "100.0%".to_string()
    } else if percentage > 99.9 {
        "99.9%".to_string()
    } else {
        format!("{:.1}%", percentage)
    }
}

/// `550×2, 421×1` style listing of protocol failure codes
pub fn format_codes(summary: &RunSummary) -> String {
    summary
        .protocol_codes
        .iter()
        .map(|(code, count)| format!("{}×{}", code, count))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Plain text formatter implementation
pub struct PlainFormatter {
    options: FormattingOptions,
}

impl PlainFormatter {
    /// Create a new plain formatter with options
    pub fn new(options: FormattingOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &FormattingOptions {
        &self.options
    }

    /// Two-column layout used by the summary table
    pub fn summary_table(&self) -> TableFormat {
        TableFormat {
            columns: vec![
                Column::new("Metric", Alignment::Left, 24),
                Column::new("Value", Alignment::Right, self.options.max_width),
            ],
            show_borders: self.options.table_borders,
            show_header: true,
        }
    }

    /// Rows of the summary table, in display order
    pub fn summary_rows(&self, summary: &RunSummary, threshold: &SuccessThreshold) -> Vec<RowData> {
        let verbose = self.options.verbose_mode;
        let mut rows: Vec<RowData> = vec![
            vec!["Target".into(), summary.target.clone()],
            vec!["State".into(), summary.state.to_string()],
            vec!["Attempts".into(), summary.total.to_string()],
            vec!["Succeeded".into(), summary.success.to_string()],
            vec!["Success rate".into(), format_percentage(summary.success_rate())],
            vec!["Connect failures".into(), summary.connect_failures.to_string()],
            vec!["Timeout failures".into(), summary.timeout_failures.to_string()],
        ];
        if summary.abandoned > 0 || verbose {
            rows.push(vec!["  abandoned".into(), summary.abandoned.to_string()]);
        }
        rows.push(vec!["Protocol failures".into(), summary.protocol_failures.to_string()]);
        if !summary.protocol_codes.is_empty() {
            rows.push(vec!["  reply codes".into(), format_codes(summary)]);
        }
        rows.push(vec!["Unknown failures".into(), summary.unknown_failures.to_string()]);
        if summary.retries > 0 || verbose {
            rows.push(vec!["Retries".into(), summary.retries.to_string()]);
        }
        rows.push(vec![
            "Elapsed".into(),
            crate::utils::format_duration(summary.elapsed),
        ]);
        rows.push(vec!["Throughput".into(), format!("{:.2}/s", summary.throughput())]);

        if let Some(latency) = summary.latency {
            rows.push(vec!["Latency min".into(), format_ms(latency.min_ms)]);
            rows.push(vec!["Latency mean".into(), format_ms(latency.mean_ms)]);
            rows.push(vec!["Latency p50".into(), format_ms(latency.p50_ms)]);
            rows.push(vec!["Latency p90".into(), format_ms(latency.p90_ms)]);
            rows.push(vec!["Latency p95".into(), format_ms(latency.p95_ms)]);
            rows.push(vec!["Latency p99".into(), format_ms(latency.p99_ms)]);
            rows.push(vec!["Latency max".into(), format_ms(latency.max_ms)]);
        }

        rows.push(vec!["Threshold".into(), threshold.to_string()]);
        rows.push(vec!["Result".into(), verdict(summary, threshold).to_string()]);
        rows
    }

    /// Create a table with the given format and data
    pub fn create_table(&self, format: &TableFormat, rows: &[RowData]) -> String {
        self.create_styled_table(format, rows, |_, _, cell| cell.to_string())
    }

    /// Create a table, passing every padded cell through `style`
    ///
    /// `style` receives the row index (`None` for the header), the column
    /// index and the already padded cell, so styling never changes widths.
    pub fn create_styled_table<F>(&self, format: &TableFormat, rows: &[RowData], style: F) -> String
    where
        F: Fn(Option<usize>, usize, &str) -> String,
    {
        if rows.is_empty() {
            return String::new();
        }

        let column_widths = self.calculate_column_widths(format, rows);
        let mut output = String::new();

        if format.show_header && !format.columns.is_empty() {
            if format.show_borders {
                output.push_str(&self.create_horizontal_border(&column_widths));
                output.push('\n');
            }
            let headers: Vec<String> = format.columns.iter().map(|c| c.header.clone()).collect();
            output.push_str(&self.create_row(&headers, &column_widths, format, |col, cell| {
                style(None, col, cell)
            }));
            output.push('\n');
            if format.show_borders {
                output.push_str(&self.create_horizontal_border(&column_widths));
                output.push('\n');
            }
        }

        for (idx, row) in rows.iter().enumerate() {
            output.push_str(&self.create_row(row, &column_widths, format, |col, cell| {
                style(Some(idx), col, cell)
            }));
            output.push('\n');
        }

        if format.show_borders {
            output.push_str(&self.create_horizontal_border(&column_widths));
        }

        output.trim_end_matches('\n').to_string()
    }

    fn calculate_column_widths(&self, format: &TableFormat, rows: &[RowData]) -> Vec<usize> {
        let num_columns = format
            .columns
            .len()
            .max(rows.iter().map(|r| r.len()).max().unwrap_or(0));

        (0..num_columns)
            .map(|col_idx| {
                let column = format.columns.get(col_idx);
                let mut width = column
                    .map(|c| c.min_width.max(c.header.chars().count()))
                    .unwrap_or(0);
                for row in rows {
                    if let Some(cell) = row.get(col_idx) {
                        width = width.max(cell.chars().count());
                    }
                }
                let cap = column.map(|c| c.max_width).unwrap_or(self.options.max_width);
                width.min(cap)
            })
            .collect()
    }

    fn create_row<F>(&self, data: &[String], widths: &[usize], format: &TableFormat, style: F) -> String
    where
        F: Fn(usize, &str) -> String,
    {
        let mut row = String::new();
        if format.show_borders {
            row.push('|');
        }

        for (idx, (cell, &width)) in data.iter().zip(widths.iter()).enumerate() {
            let alignment = format
                .columns
                .get(idx)
                .map(|c| c.alignment)
                .unwrap_or(Alignment::Left);
            let padded = align_text(cell, width, alignment);

            if format.show_borders {
                row.push(' ');
            }
            row.push_str(&style(idx, &padded));
            if format.show_borders {
                row.push_str(" |");
            } else {
                row.push_str("  ");
            }
        }

        row.trim_end().to_string()
    }

    fn create_horizontal_border(&self, widths: &[usize]) -> String {
        let mut border = String::from("+");
        for &width in widths {
            border.push_str(&"-".repeat(width + 2));
            border.push('+');
        }
        border
    }
}

/// Pad or truncate `text` to exactly `width` characters
pub fn align_text(text: &str, width: usize, alignment: Alignment) -> String {
    let len = text.chars().count();
    if len >= width {
        return text.chars().take(width).collect();
    }
    let padding = " ".repeat(width - len);
    match alignment {
        Alignment::Left => format!("{}{}", text, padding),
        Alignment::Right => format!("{}{}", padding, text),
    }
}

/// `PASS` or `FAIL` for the configured threshold
pub fn verdict(summary: &RunSummary, threshold: &SuccessThreshold) -> &'static str {
    if summary.passes(threshold) {
        "PASS"
    } else {
        "FAIL"
    }
}

/// Progress line shared by every formatter
pub fn progress_line(summary: &RunSummary, planned: Option<u64>) -> String {
    let mut line = format!("[{}] ", crate::utils::format_duration(summary.elapsed));
    match planned {
        Some(planned) => line.push_str(&format!("{}/{} done", summary.total, planned)),
        None => line.push_str(&format!("{} done", summary.total)),
    }
    line.push_str(&format!(
        ", {} ok, {} failed, {:.1}/s",
        summary.success,
        summary.failures(),
        summary.throughput()
    ));
    if let Some(latency) = summary.latency {
        line.push_str(&format!(", p50 {}", format_ms(latency.p50_ms)));
    }
    line
}

/// Verbose echo line shared by every formatter
pub fn outcome_line(outcome: &AttemptOutcome) -> String {
    if outcome.is_success() {
        format!("✅ email sent {}", outcome.seq)
    } else {
        format!("❌ email failed {}: {}", outcome.seq, outcome.kind)
    }
}

fn header_text(config: &ProbeConfig) -> String {
    format!(
        "Probing {} with {} worker(s), {}, timeout {}",
        config.target(),
        config.concurrency,
        config.run_limit,
        crate::utils::format_duration(config.timeout)
    )
}

impl OutputFormatter for PlainFormatter {
    fn format_header(&self, config: &ProbeConfig) -> Result<String> {
        let title = header_text(config);
        let border = "=".repeat(title.chars().count() + 4);
        let mut output = String::new();
        writeln!(output, "{}", border).map_err(fmt_err)?;
        writeln!(output, "  {}  ", title).map_err(fmt_err)?;
        write!(output, "{}", border).map_err(fmt_err)?;
        Ok(output)
    }

    fn format_progress(&self, summary: &RunSummary, planned: Option<u64>) -> Result<String> {
        Ok(progress_line(summary, planned))
    }

    fn format_outcome(&self, outcome: &AttemptOutcome) -> Result<String> {
        Ok(outcome_line(outcome))
    }

    fn format_summary(&self, summary: &RunSummary, threshold: &SuccessThreshold) -> Result<String> {
        let rows = self.summary_rows(summary, threshold);
        Ok(self.create_table(&self.summary_table(), &rows))
    }
}

/// Line-delimited `key=value` output for scripts
#[derive(Debug, Default)]
pub struct KvFormatter;

impl OutputFormatter for KvFormatter {
    fn format_header(&self, config: &ProbeConfig) -> Result<String> {
        Ok(format!(
            "target={}\nconcurrency={}\nlimit={}",
            config.target(),
            config.concurrency,
            config.run_limit
        ))
    }

    fn format_progress(&self, summary: &RunSummary, planned: Option<u64>) -> Result<String> {
        Ok(progress_line(summary, planned))
    }

    fn format_outcome(&self, outcome: &AttemptOutcome) -> Result<String> {
        Ok(outcome_line(outcome))
    }

    fn format_summary(&self, summary: &RunSummary, threshold: &SuccessThreshold) -> Result<String> {
        let mut output = String::new();
        let mut kv = |key: &str, value: String| writeln!(output, "{}={}", key, value).map_err(fmt_err);

        kv("target", summary.target.clone())?;
        kv("state", summary.state.to_string())?;
        kv("total", summary.total.to_string())?;
        kv("success", summary.success.to_string())?;
        kv("success_rate", format!("{:.2}", summary.success_rate()))?;
        kv("connect_failures", summary.connect_failures.to_string())?;
        kv("timeout_failures", summary.timeout_failures.to_string())?;
        kv("protocol_failures", summary.protocol_failures.to_string())?;
        kv("unknown_failures", summary.unknown_failures.to_string())?;
        for (code, count) in &summary.protocol_codes {
            kv(&format!("protocol_code_{}", code), count.to_string())?;
        }
        kv("retries", summary.retries.to_string())?;
        kv("abandoned", summary.abandoned.to_string())?;
        kv("elapsed_s", format!("{:.3}", summary.elapsed.as_secs_f64()))?;
        kv("throughput", format!("{:.2}", summary.throughput()))?;
        if let Some(latency) = summary.latency {
            kv("latency_min_ms", format!("{:.3}", latency.min_ms))?;
            kv("latency_mean_ms", format!("{:.3}", latency.mean_ms))?;
            kv("latency_p50_ms", format!("{:.3}", latency.p50_ms))?;
            kv("latency_p90_ms", format!("{:.3}", latency.p90_ms))?;
            kv("latency_p95_ms", format!("{:.3}", latency.p95_ms))?;
            kv("latency_p99_ms", format!("{:.3}", latency.p99_ms))?;
            kv("latency_max_ms", format!("{:.3}", latency.max_ms))?;
        }
        kv("threshold", threshold.to_string())?;
        kv("passed", summary.passes(threshold).to_string())?;

        Ok(output.trim_end().to_string())
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    #[serde(flatten)]
    summary: &'a RunSummary,
    success_rate: f64,
    threshold: String,
    passed: bool,
}

/// A single pretty-printed JSON document
#[derive(Debug, Default)]
pub struct JsonFormatter;

impl OutputFormatter for JsonFormatter {
    fn format_header(&self, config: &ProbeConfig) -> Result<String> {
        Ok(header_text(config))
    }

    fn format_progress(&self, summary: &RunSummary, planned: Option<u64>) -> Result<String> {
        Ok(progress_line(summary, planned))
    }

    fn format_outcome(&self, outcome: &AttemptOutcome) -> Result<String> {
        Ok(outcome_line(outcome))
    }

    fn format_summary(&self, summary: &RunSummary, threshold: &SuccessThreshold) -> Result<String> {
        let report = JsonReport {
            summary,
            success_rate: summary.success_rate(),
            threshold: threshold.to_string(),
            passed: summary.passes(threshold),
        };
        Ok(serde_json::to_string_pretty(&report)?)
    }
}
