//! SMTP Probe - Main CLI Application
//!
//! Opens concurrent SMTP sessions against one server, sends a probe message in
//! each, and reports how many succeeded and how fast.

use clap::Parser;
use smtp_probe::{app::App, cli::Cli, error::ErrorReporter};
use std::process;

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let cli = Cli::parse();

    if let Some(help) = cli.display_help() {
        println!("{}", help);
        return;
    }

    let reporter = ErrorReporter::new(cli.use_colors(), cli.verbose || cli.debug);

    if let Err(e) = App::new(cli).run().await {
        reporter.report_error(&e);
        process::exit(e.exit_code());
    }
}
