mod batch;
mod cli;
mod config;
mod delay;
mod error;
mod input;
mod orchestrator;
mod recorder;
mod remote;
mod state_machine;
mod ui;
mod verifier;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command};
use config::ProbeConfig;
use delay::TokioPause;
use error::ProbeError;
use orchestrator::JobOrchestrator;
use recorder::OutcomeRecorder;
use remote::RemoteClient;
use state_machine::RetryPolicy;
use ui::BatchProgress;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_json);

    let mut config = ProbeConfig::load_from(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;

    match cli.command {
        Command::Run {
            input,
            output,
            calls,
            max_retries,
        } => {
            if let Some(input) = input {
                config.input_path = input;
            }
            if let Some(output) = output {
                config.output_path = output;
            }
            if let Some(calls) = calls {
                config.api_calls = calls;
            }
            if let Some(max_retries) = max_retries {
                config.max_retries = max_retries;
            }
            config.validate().context("invalid command-line override")?;
            run(&config, cli.log_json).await
        }
        Command::Report { output } => {
            if let Some(output) = output {
                config.output_path = output;
            }
            let recorder = OutcomeRecorder::new(&config.output_path);
            let records = recorder.read_all().context("failed to read outcome log")?;
            ui::print_report(recorder.path(), &batch::tally_statuses(&records));
            Ok(())
        }
    }
}

async fn run(config: &ProbeConfig, log_json: bool) -> Result<()> {
    if config.api_key.is_empty() {
        tracing::warn!("no API key configured; set {}", config::API_KEY_ENV);
    }

    let jobs = input::read_jobs(&config.input_path, config).context("failed to read endpoints")?;
    let client = RemoteClient::new(config.api_key.clone())
        .map_err(ProbeError::from)
        .context("failed to build HTTP client")?;
    let orchestrator = JobOrchestrator::new(
        client,
        TokioPause,
        OutcomeRecorder::new(&config.output_path),
        RetryPolicy::from(config),
    );

    let total = jobs.len() as u64 * u64::from(config.api_calls);
    let progress = if log_json {
        BatchProgress::hidden()
    } else {
        BatchProgress::start(total)
    };
    let summary = batch::run_batch(&orchestrator, &jobs, config.api_calls, &progress).await;
    progress.complete(&summary);
    Ok(())
}

fn init_logging(verbose: bool, json: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
