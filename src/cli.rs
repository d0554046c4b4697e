//! genprobe command line, built on clap.
//!
//! [`Cli`] carries the subcommands in [`Command`] (run, report) and the
//! global flags (--config, --verbose, --log-json).

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// genprobe: drive image-generation APIs, poll jobs and check image delivery.
#[derive(Debug, Parser)]
#[command(name = "genprobe", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Path to the TOML configuration file.
    #[arg(long, global = true, default_value = crate::config::DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Enable debug logging.
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,

    /// Emit logs as JSON lines instead of the spinner and plain text.
    #[arg(long, global = true, default_value_t = false)]
    pub log_json: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Submit every endpoint row and record the outcomes.
    Run {
        /// Endpoints CSV (overrides `input_path`).
        #[arg(long)]
        input: Option<PathBuf>,

        /// Outcome log CSV (overrides `output_path`).
        #[arg(long)]
        output: Option<PathBuf>,

        /// Calls per endpoint row (overrides `api_calls`).
        #[arg(long)]
        calls: Option<u32>,

        /// Retry bound for submission, polling and link checks.
        #[arg(long)]
        max_retries: Option<u32>,
    },

    /// Summarise an outcome log by status.
    Report {
        /// Outcome log CSV (overrides `output_path`).
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_parses_run_subcommand() {
        let cli = Cli::parse_from([
            "genprobe",
            "run",
            "--input",
            "rows.csv",
            "--calls",
            "3",
            "--max-retries",
            "5",
        ]);
        match cli.command {
            Command::Run {
                input,
                output,
                calls,
                max_retries,
            } => {
                assert_eq!(input, Some(PathBuf::from("rows.csv")));
                assert!(output.is_none());
                assert_eq!(calls, Some(3));
                assert_eq!(max_retries, Some(5));
            }
            _ => panic!("expected Run command"),
        }
        assert_eq!(cli.config, PathBuf::from("genprobe.toml"));
    }

    #[test]
    fn cli_parses_global_flags() {
        let cli = Cli::parse_from([
            "genprobe",
            "--config",
            "ci.toml",
            "--verbose",
            "--log-json",
            "report",
        ]);
        assert!(cli.verbose);
        assert!(cli.log_json);
        assert_eq!(cli.config, PathBuf::from("ci.toml"));
        assert!(matches!(cli.command, Command::Report { output: None }));
    }

    #[test]
    fn cli_verify() {
        Cli::command().debug_assert();
    }
}
