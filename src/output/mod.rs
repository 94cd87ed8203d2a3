//! Output formatting and display system
//!
//! Formatters turn run data into text. The [`Reporter`] decides where that
//! text goes: the header, live progress and final summary go to stdout, except
//! that machine-readable formats move everything but the summary to stderr so
//! stdout stays parseable. Outcome taps ([`EchoSink`], [`OutcomeLog`]) plug
//! into the scheduler as [`OutcomeSink`]s.

mod colored;
mod formatter;

pub use colored::{supports_color, ColorScheme, ColoredFormatter};
pub use formatter::{
    align_text, format_codes, format_ms, format_percentage, Alignment, Column, FormattingOptions, JsonFormatter,
    KvFormatter, OutputFormatter, PlainFormatter, RowData, TableFormat,
};

use crate::{
    error::{AppError, ErrorContext, Result},
    models::{AttemptOutcome, ProbeConfig, RunSummary},
    scheduler::OutcomeSink,
    stats::Aggregator,
    types::OutputFormat,
};
use std::fs::File;
use std::io::{self, BufWriter, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Output formatting factory for creating appropriate formatters
pub struct OutputFormatterFactory;

impl OutputFormatterFactory {
    /// Create the formatter for a summary format and color preference
    pub fn create_formatter(format: OutputFormat, enable_color: bool, verbose: bool) -> Arc<dyn OutputFormatter> {
        let options = FormattingOptions {
            enable_color,
            verbose_mode: verbose,
            ..Default::default()
        };

        match format {
            OutputFormat::Table if enable_color => Arc::new(ColoredFormatter::new(options)),
            OutputFormat::Table => Arc::new(PlainFormatter::new(options)),
            OutputFormat::Kv => Arc::new(KvFormatter),
            OutputFormat::Json => Arc::new(JsonFormatter),
        }
    }
}

/// Destination for non-summary output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Stdout,
    Stderr,
}

impl Channel {
    /// Where header, progress and echo lines go for a summary format
    pub fn for_format(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Table => Channel::Stdout,
            OutputFormat::Kv | OutputFormat::Json => Channel::Stderr,
        }
    }

    fn is_terminal(self) -> bool {
        match self {
            Channel::Stdout => io::stdout().is_terminal(),
            Channel::Stderr => io::stderr().is_terminal(),
        }
    }

    fn write_line(self, line: &str) -> io::Result<()> {
        match self {
            Channel::Stdout => writeln!(io::stdout().lock(), "{}", line),
            Channel::Stderr => writeln!(io::stderr().lock(), "{}", line),
        }
    }

    /// Overwrite the current terminal line
    fn rewrite_line(self, line: &str) -> io::Result<()> {
        // \x1b[K erases what a longer previous line left behind
        match self {
            Channel::Stdout => {
                let mut out = io::stdout().lock();
                write!(out, "\r{}\x1b[K", line)?;
                out.flush()
            }
            Channel::Stderr => {
                let mut err = io::stderr().lock();
                write!(err, "\r{}\x1b[K", line)?;
                err.flush()
            }
        }
    }
}

/// Renders everything a run shows the user
pub struct Reporter {
    formatter: Arc<dyn OutputFormatter>,
    config: Arc<ProbeConfig>,
    channel: Channel,
}

impl Reporter {
    pub fn new(config: Arc<ProbeConfig>) -> Self {
        let formatter =
            OutputFormatterFactory::create_formatter(config.output_format, config.enable_color, config.verbose);
        Self {
            formatter,
            channel: Channel::for_format(config.output_format),
            config,
        }
    }

    pub fn formatter(&self) -> Arc<dyn OutputFormatter> {
        self.formatter.clone()
    }

    pub fn print_header(&self) {
        match self.formatter.format_header(&self.config) {
            Ok(header) => {
                if let Err(e) = self.channel.write_line(&header) {
                    warn!(error = %e, "failed to write header");
                }
            }
            Err(e) => warn!(error = %e, "failed to render header"),
        }
    }

    /// Spawn the live progress task; it exits when `stop` is cancelled
    pub fn spawn_progress(&self, aggregator: Arc<Aggregator>, stop: CancellationToken) -> JoinHandle<()> {
        let formatter = self.formatter.clone();
        let channel = self.channel;
        let interval = self.config.progress_interval;
        let planned = self.config.run_limit.max_attempts();

        tokio::spawn(async move {
            let tty = channel.is_terminal();
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first tick completes immediately
            ticker.tick().await;
            let mut rendered = false;

            loop {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                let line = match formatter.format_progress(&aggregator.snapshot(), planned) {
                    Ok(line) => line,
                    Err(e) => {
                        warn!(error = %e, "failed to render progress");
                        continue;
                    }
                };
                let written = if tty {
                    channel.rewrite_line(&line)
                } else {
                    channel.write_line(&line)
                };
                match written {
                    Ok(()) => rendered = true,
                    Err(e) => warn!(error = %e, "failed to write progress"),
                }
            }

            if tty && rendered {
                if let Err(e) = channel.write_line("") {
                    warn!(error = %e, "failed to finish progress line");
                }
            }
        })
    }

    /// Render the final summary to stdout
    /// Print the final summary to stdout
    pub fn print_summary(&self, summary: &RunSummary) {
        self.write_summary(summary, &mut io::stdout().lock());
    }

    /// Write the final summary to `out`; returns whether it was written
    ///
    /// Failures are logged and never reach the caller.
    pub fn write_summary<W: Write>(&self, summary: &RunSummary, out: &mut W) -> bool {
        let written = self
            .formatter
            .format_summary(summary, &self.config.success_threshold)
            .and_then(|text| writeln!(out, "{}", text).context("Cannot write summary"));
        match written {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "failed to print summary");
                false
            }
        }
    }

    /// Tap that echoes every outcome
    pub fn echo_sink(&self) -> EchoSink {
        EchoSink {
            formatter: self.formatter.clone(),
            channel: self.channel,
        }
    }
}

/// Verbose echo of every outcome, one line each
pub struct EchoSink {
    formatter: Arc<dyn OutputFormatter>,
    channel: Channel,
}

impl OutcomeSink for EchoSink {
    fn observe(&self, outcome: &AttemptOutcome) {
        let result = self
            .formatter
            .format_outcome(outcome)
            .and_then(|line| self.channel.write_line(&line).map_err(AppError::from));
        if let Err(e) = result {
            warn!(seq = outcome.seq, error = %e, "failed to echo outcome");
        }
    }
}

/// Raw outcome log: one JSON object per line
pub struct OutcomeLog {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl OutcomeLog {
    /// Create or truncate the log file
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path).with_context(|| format!("Cannot create outcomes file '{}'", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, outcome: &AttemptOutcome) -> Result<()> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        serde_json::to_writer(&mut *writer, outcome).context("Cannot encode outcome")?;
        writer.write_all(b"\n")?;
        Ok(())
    }
}

impl OutcomeSink for OutcomeLog {
    fn observe(&self, outcome: &AttemptOutcome) {
        if let Err(e) = self.append(outcome) {
            warn!(path = %self.path.display(), seq = outcome.seq, error = %e, "failed to write outcome");
        }
    }

    fn close(&self) {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = writer.flush() {
            warn!(path = %self.path.display(), error = %e, "failed to flush outcomes file");
        }
    }
}
