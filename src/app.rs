//! Application orchestration
//!
//! Wires configuration, the scheduler, outcome taps and the reporter together
//! for one run, and turns the final summary into an exit status.

use crate::{
    cli::Cli,
    config::{env::DEFAULT_ENV_FILE, display_config_summary, load_config, validate_config, EnvManager},
    error::{AppError, Result},
    logging::{self, LogSettings},
    models::{ProbeConfig, RunSummary, SuccessThreshold},
    output::{OutcomeLog, Reporter},
    scheduler::Scheduler,
};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Main application struct that coordinates all components
pub struct App {
    cli: Cli,
}

impl App {
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the probe and check the result against the success threshold
    pub async fn run(self) -> Result<RunSummary> {
        if let Some(force) = self.cli.color_override() {
            colored::control::set_override(force);
        }
        logging::init(&LogSettings::from_flags(
            self.cli.verbose,
            self.cli.debug,
            self.cli.use_colors(),
        ))?;
        debug!(version = crate::LONG_VERSION, "{} starting", crate::PKG_NAME);

        if let Some(warnings) = EnvManager::check_env_file(Path::new(DEFAULT_ENV_FILE))? {
            for warning in warnings {
                warn!(".env: {}", warning);
            }
        }

        let config = load_config(self.cli)?;
        let warnings = validate_config(&config)?;
        for warning in &warnings {
            eprintln!("{}", warning.format(config.enable_color));
        }

        if config.debug {
            eprintln!("{}", display_config_summary(&config));
            match serde_json::to_string(&config) {
                Ok(json) => debug!(config = %json, "resolved configuration"),
                Err(e) => warn!(error = %e, "failed to serialize configuration"),
            }
        }

        let summary = execute(Arc::new(config.clone())).await?;
        evaluate(&summary, &config.success_threshold)?;
        Ok(summary)
    }
}

/// Run the scheduler with the configured taps and render progress and summary
pub async fn execute(config: Arc<ProbeConfig>) -> Result<RunSummary> {
    let reporter = Reporter::new(config.clone());
    let mut scheduler = Scheduler::tcp(config.clone());

    if config.verbose {
        scheduler = scheduler.with_sink(Arc::new(reporter.echo_sink()));
    }
    if let Some(path) = &config.outcomes_file {
        let log = OutcomeLog::create(path)?;
        info!(path = %log.path().display(), "writing outcomes");
        scheduler = scheduler.with_sink(Arc::new(log));
    }

    reporter.print_header();
    let handle = scheduler.start()?;

    let stop_progress = CancellationToken::new();
    let progress = reporter.spawn_progress(handle.aggregator(), stop_progress.clone());

    let cancel = handle.cancellation_token();
    let signal = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, letting in-flight attempts finish");
            cancel.cancel();
        }
    });

    let result = handle.wait().await;

    signal.abort();
    stop_progress.cancel();
    if let Err(e) = progress.await {
        warn!(error = %e, "progress task failed");
    }

    let summary = result?;
    reporter.print_summary(&summary);
    Ok(summary)
}

/// Map a finished run to success or the error that sets the exit code
pub fn evaluate(summary: &RunSummary, threshold: &SuccessThreshold) -> Result<()> {
    if summary.total == 0 {
        return Err(AppError::runtime("No attempts were completed"));
    }
    if !summary.passes(threshold) {
        return Err(AppError::threshold_not_met(summary.success_rate(), threshold.to_string()));
    }
    Ok(())
}
