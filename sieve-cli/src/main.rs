//! Sieve CLI: periodic SIEM alert triage into tracker tickets.
//!
//! `sieve run` is meant to be invoked by an external scheduler (cron, a
//! systemd timer, a CI job); each invocation performs one triage pass.

mod commands;

use clap::Parser;
use sieve_core::config::{PolicyKind, TimeWindow};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Sieve: triage SIEM alerts and file tickets for the ones that matter
#[derive(Parser, Debug)]
#[command(name = "sieve", version, about, long_about = None)]
struct Cli {
    /// Configuration file path (TOML, or JSON by extension)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Workspace directory searched for sieve.toml
    #[arg(short, long, default_value = ".", global = true)]
    workspace: PathBuf,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors to stderr
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Directory for the JSON log files
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Retrieve recent alerts, classify them and file tickets
    Run(RunArgs),
    /// Classify alerts from a JSON file without contacting any service
    Classify {
        /// JSON array of alert records, or an object with an "alerts" array
        file: PathBuf,
        /// Policy to apply: simple or scored
        #[arg(long)]
        policy: Option<PolicyKind>,
        /// Score needed for the scored policy
        #[arg(long)]
        threshold: Option<usize>,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Args, Debug, Default)]
struct RunArgs {
    /// Lookback window in hours
    #[arg(long, conflicts_with = "window")]
    hours: Option<u64>,

    /// Lookback window as a duration, e.g. 24h or 90m
    #[arg(long)]
    window: Option<TimeWindow>,

    /// Log the tickets that would be created instead of creating them
    #[arg(long)]
    test: bool,

    /// Score needed for the scored policy
    #[arg(long)]
    threshold: Option<usize>,

    /// Exit with status 2 when retrieval or any ticket filing failed
    #[arg(long)]
    strict: bool,

    /// Print the triage report as JSON on stdout
    #[arg(long)]
    json: bool,
}

#[derive(clap::Subcommand, Debug)]
enum ConfigAction {
    /// Write a starter sieve.toml into the workspace
    Init,
    /// Print the effective configuration with secrets redacted
    Show,
    /// Validate the configuration and resolve every credential
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Set up tracing: human-readable stderr + JSON file logging
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    // RUST_LOG, when set, wins over -v/-q
    let stderr_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(stderr_filter);

    let log_dir = cli.log_dir.clone().unwrap_or_else(|| {
        directories::ProjectDirs::from("dev", "sieve", "sieve")
            .map(|d| d.data_dir().join("logs"))
            .unwrap_or_else(|| PathBuf::from("."))
    });
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "sieve.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    let ctx = commands::Context {
        config_path: cli.config,
        workspace,
    };
    commands::handle_command(cli.command, &ctx).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_flags() {
        let cli = Cli::parse_from(["sieve", "-v", "run", "--hours", "6", "--test", "--strict"]);
        assert_eq!(cli.verbose, 1);
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.hours, Some(6));
                assert!(args.test);
                assert!(args.strict);
                assert!(args.window.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_window_duration() {
        let cli = Cli::parse_from(["sieve", "run", "--window", "90m"]);
        match cli.command {
            Commands::Run(args) => assert_eq!(
                args.window.map(|w| w.as_duration().as_secs()),
                Some(90 * 60)
            ),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_hours_and_window_conflict() {
        let result = Cli::try_parse_from(["sieve", "run", "--hours", "2", "--window", "2h"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_classify() {
        let cli = Cli::parse_from([
            "sieve",
            "classify",
            "alerts.json",
            "--policy",
            "simple",
            "--config",
            "custom.toml",
        ]);
        assert_eq!(cli.config, Some(PathBuf::from("custom.toml")));
        match cli.command {
            Commands::Classify { file, policy, .. } => {
                assert_eq!(file, PathBuf::from("alerts.json"));
                assert_eq!(policy, Some(PolicyKind::Simple));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
