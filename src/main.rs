//! Binary entry point for the betaboot CLI.

use std::io::{self, Write};
use std::process;

use clap::Parser;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use betaboot::{
    BatchParseError, BatchRequest, BatchResult, BetabootConfig, ConfigError, FleetOrchestrator,
    GcloudProvider, LifecycleAction, LifecycleError, Provider, StartupScripts, parse_batch_requests,
    run_batches,
};

mod cli;

use cli::Cli;

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("invalid --create arguments: {0}")]
    Batch(#[from] BatchParseError),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    let exit_code = match dispatch(&cli).await {
        Ok(()) => 0,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

async fn dispatch(cli: &Cli) -> Result<(), CliError> {
    let requests = parse_batch_requests(&cli.create)?;
    let config = BetabootConfig::load_without_cli_args()?;
    let settings = config.gcloud_settings()?;
    let provider = GcloudProvider::with_process_runner(
        settings,
        StartupScripts::new(config.script_directory()),
    );
    let fleet = FleetOrchestrator::new(provider).with_max_concurrency(config.concurrency_limit());

    run(&fleet, cli, &requests, &mut io::stdout()).await
}

/// Runs every requested operation, printing one summary line each.
///
/// A failing operation does not stop the later ones; the first error is
/// returned once everything has run.
async fn run<P: Provider>(
    fleet: &FleetOrchestrator<P>,
    cli: &Cli,
    requests: &[BatchRequest],
    out: &mut impl Write,
) -> Result<(), CliError> {
    let mut first_error = None;

    if !requests.is_empty() {
        for outcome in run_batches(fleet, requests).await {
            report_batch(out, LifecycleAction::Create, outcome, &mut first_error)?;
        }
    }
    if cli.stop {
        report_batch(out, LifecycleAction::Stop, fleet.stop().await, &mut first_error)?;
    }
    if cli.restart {
        report_batch(
            out,
            LifecycleAction::Restart,
            fleet.restart().await,
            &mut first_error,
        )?;
    }
    if cli.delete {
        report_batch(
            out,
            LifecycleAction::Delete,
            fleet.delete().await,
            &mut first_error,
        )?;
    }
    if cli.list {
        match fleet.list().await {
            Ok(records) => {
                for record in &records {
                    writeln!(out, "{} {} {}", record.name, record.zone, record.status)?;
                }
                writeln!(out, "{} instances", records.len())?;
            }
            Err(err) => {
                first_error.get_or_insert(err);
            }
        }
    }

    first_error.map_or(Ok(()), |err| Err(CliError::Lifecycle(err)))
}

fn report_batch(
    out: &mut impl Write,
    action: LifecycleAction,
    outcome: Result<BatchResult, LifecycleError>,
    first_error: &mut Option<LifecycleError>,
) -> Result<(), CliError> {
    match outcome {
        Ok(result) => writeln!(out, "{}", result.summary(action))?,
        Err(err) => {
            if let LifecycleError::Transport { result, .. } = &err {
                writeln!(out, "{}", result.summary(action))?;
            }
            first_error.get_or_insert(err);
        }
    }
    Ok(())
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}
