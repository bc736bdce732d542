//! Flight Delay Predictor CLI
//!
//! A command-line tool for scoring flights, explaining predictions and
//! inspecting the loaded pipeline artifact.

mod commands;
mod config;
mod output;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use commands::{inspect, predict};
use predictor_lib::{HolidayCalendar, Predictor};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Flight Delay Predictor CLI
#[derive(Parser)]
#[command(name = "fdp")]
#[command(author, version, about = "CLI for the Flight Delay Predictor", long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to ~/.config/fdp/config.toml when present)
    #[arg(long, global = true, env = "FDP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Pipeline artifact (overrides FDP_MODEL_PATH)
    #[arg(long, global = true)]
    pub model: Option<PathBuf>,

    /// Historical statistics artifact (overrides FDP_STATS_PATH)
    #[arg(long, global = true)]
    pub stats: Option<PathBuf>,

    /// Delay probability threshold in (0, 1] (overrides FDP_THRESHOLD)
    #[arg(long, global = true)]
    pub threshold: Option<f64>,

    /// Holiday calendar: brazil or united_states
    #[arg(long, global = true)]
    pub calendar: Option<HolidayCalendar>,

    /// Output format
    #[arg(long, short, global = true, default_value = "table")]
    pub format: output::OutputFormat,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Predict whether a flight will be delayed
    Predict {
        #[command(flatten)]
        request: RequestArgs,

        /// Include the top contributing factors
        #[arg(long)]
        explain: bool,

        /// Number of factors to show (defaults to the configured top_n)
        #[arg(long)]
        top_n: Option<usize>,
    },

    /// Explain which features drive a flight's prediction
    Explain {
        #[command(flatten)]
        request: RequestArgs,

        /// Number of factors to show (defaults to the configured top_n)
        #[arg(long)]
        top_n: Option<usize>,
    },

    /// Show the loaded pipeline: version, checksum and features
    Inspect,
}

/// A flight given either field by field or as a JSON request
#[derive(Args, Debug, Clone)]
pub struct RequestArgs {
    /// Operating airline code, e.g. GLO
    #[arg(long, required_unless_present = "request")]
    pub airline: Option<String>,

    /// Origin airport code
    #[arg(long, required_unless_present = "request")]
    pub origin: Option<String>,

    /// Destination airport code
    #[arg(long, required_unless_present = "request")]
    pub destination: Option<String>,

    /// Local departure time, e.g. 2024-12-24T18:00:00
    #[arg(long, required_unless_present = "request")]
    pub departure: Option<String>,

    /// JSON request file, or - for stdin
    #[arg(
        long,
        conflicts_with_all = ["airline", "origin", "destination", "departure"]
    )]
    pub request: Option<PathBuf>,
}

fn init_tracing(verbose: bool, json: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn load_predictor(cli: &Cli) -> Result<Predictor> {
    let config = config::resolve(cli)?;
    info!(model = ?config.model_path, stats = ?config.stats_path, "Loading predictor");
    Predictor::from_config(&config)
        .with_context(|| format!("Failed to load predictor from {}", config.model_path.display()))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    let predictor = load_predictor(&cli)?;

    // Execute command
    match &cli.command {
        Commands::Predict {
            request,
            explain,
            top_n,
        } => {
            let top_n = top_n.unwrap_or(predictor.top_n());
            predict::predict(&predictor, request, *explain, top_n, cli.format)?;
        }
        Commands::Explain { request, top_n } => {
            let top_n = top_n.unwrap_or(predictor.top_n());
            predict::explain(&predictor, request, top_n, cli.format)?;
        }
        Commands::Inspect => {
            inspect::inspect(&predictor, cli.format)?;
        }
    }

    Ok(())
}
