//! Scalp-DCA - main entry point
//!
//! This binary provides two subcommands:
//! - paper: run a simulated trading session against the paper exchange
//! - check: validate a configuration file

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;

#[derive(Parser, Debug)]
#[command(name = "scalp-dca")]
#[command(about = "Scalping with dollar-cost-averaging: paper sessions and config checks", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a simulated trading session on the paper exchange
    Paper {
        /// Path to configuration file
        #[arg(short, long, default_value = "configs/atom_usd.json")]
        config: String,

        /// Number of ticks to simulate
        #[arg(short, long, default_value = "240")]
        ticks: u64,

        /// Wall-clock seconds between ticks (0 = run flat out)
        #[arg(long, default_value = "0")]
        tick_secs: u64,
    },

    /// Validate a configuration file
    Check {
        /// Path to configuration file
        #[arg(short, long, default_value = "configs/atom_usd.json")]
        config: String,
    },
}

fn setup_logging(verbose: bool, command_name: &str) -> Result<()> {
    std::fs::create_dir_all("logs")?;

    let log_filename = format!(
        "{}_{}.log",
        command_name,
        chrono::Local::now().format("%Y-%m-%d_%H-%M-%S")
    );
    let log_path = PathBuf::from("logs").join(&log_filename);

    let level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let file_appender = tracing_appender::rolling::never("logs", &log_filename);

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(true);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(file_appender)
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    info!("Logging initialized");
    info!("Log file: {}", log_path.display());

    Ok(())
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    let command_name = match &cli.command {
        Commands::Paper { .. } => "paper",
        Commands::Check { .. } => "check",
    };

    setup_logging(cli.verbose, command_name)?;

    match cli.command {
        Commands::Paper {
            config,
            ticks,
            tick_secs,
        } => commands::paper::run(config, ticks, tick_secs),

        Commands::Check { config } => commands::check::run(config),
    }
}
