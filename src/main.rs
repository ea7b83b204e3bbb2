//! dnsreconcile - DNS migration drift reconciler
//!
//! Checks that a legacy traffic manager and its replacement platform manage
//! the same names and answer them identically.

use anyhow::Context;
use clap::{CommandFactory, Parser};
use dnsreconcile::{
    app::{App, RunError, RunOutcome},
    cli::Cli,
    config::Config,
};
use std::{path::Path, process::ExitCode};
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Load configuration by layering sources: defaults, file, environment, and CLI args.
    let config = match Config::load(&cli).and_then(|config| config.validate().map(|_| config)) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {}\n\n{}", err, Cli::command().render_usage());
            return ExitCode::from(2);
        }
    };

    init_tracing(&config.log_level);
    debug!(?config, "Configuration loaded");

    let report_path = config.report.path.clone();
    match run(config).await {
        Ok(outcome) => {
            println!("{}", summary_line(&outcome, &report_path));
            ExitCode::from(outcome.exit_code())
        }
        Err(err) => {
            error!("{:#}", err);
            eprintln!("error: {:#}", err);
            let code = err
                .downcast_ref::<RunError>()
                .map(RunError::exit_code)
                .unwrap_or(1);
            ExitCode::from(code)
        }
    }
}

async fn run(config: Config) -> anyhow::Result<RunOutcome> {
    let app = App::builder(config).build()?;
    let outcome = app.run().await.context("run failed")?;
    Ok(outcome)
}

/// Diagnostics go to stderr; RUST_LOG takes precedence over `log_level`.
fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn summary_line(outcome: &RunOutcome, report_path: &Path) -> String {
    match outcome {
        RunOutcome::Passed { .. } => "check passed!".to_string(),
        RunOutcome::Divergent { divergent, .. } => format!(
            "found divergence in {} pair(s), see {}",
            divergent.len(),
            report_path.display()
        ),
        RunOutcome::AuditCompleted { .. } => {
            format!("finished! open {} to check", report_path.display())
        }
        RunOutcome::InventoryGap(gap) => format!(
            "{} domain(s) missing from Source A, see {}",
            gap.missing.len(),
            report_path.display()
        ),
    }
}
