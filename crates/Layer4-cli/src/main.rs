//! Warden CLI - Main entry point

mod cli;

use clap::{Parser, Subcommand};
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use warden_foundation::WorkerConfig;

/// Warden - run one task attempt under a deadline, killable with Ctrl-C
#[derive(Parser, Debug)]
#[command(name = "warden")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Execute a task attempt and print its outcome
    Run(cli::RunArgs),
    /// Print the effective worker configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    // Load configuration
    let config = WorkerConfig::load().unwrap_or_else(|e| {
        eprintln!("Warning: Failed to load config: {}", e);
        WorkerConfig::default()
    });

    // Initialize logging
    let log_level = if args.debug {
        "debug"
    } else {
        config.log_filter()
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    match args.command {
        Command::Run(run_args) => {
            let success = cli::run_once(run_args, &config).await?;
            Ok(if success {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Command::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}
