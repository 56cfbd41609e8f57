//! Turtle signals - main entry point
//!
//! This binary provides four subcommands:
//! - scan: Scan a ticker universe and persist fired signals
//! - signal: Evaluate one ticker and print its signal report
//! - size: Size a position from balance, entry and stop
//! - exit: Check exit and stop conditions for an open position

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

mod commands;

#[derive(Parser, Debug)]
#[command(name = "turtle-signals")]
#[command(about = "Turtle Trading breakout signals with a daily scan pipeline", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit console logs as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Scan the configured universe for breakout signals
    Scan {
        /// Path to configuration file
        #[arg(short, long, default_value = "configs/turtle.json")]
        config: String,

        /// Tickers to scan (comma-separated), overrides the configured universe
        #[arg(short, long)]
        tickers: Option<String>,

        /// What started the scan (manual or scheduled)
        #[arg(long, default_value = "manual")]
        trigger: String,

        /// Evaluation date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        as_of: Option<String>,

        /// Evaluate without writing to the signal store
        #[arg(long)]
        dry_run: bool,
    },

    /// Evaluate a single ticker and print its signal report as JSON
    Signal {
        /// Ticker symbol
        #[arg(short, long)]
        ticker: String,

        /// Path to configuration file
        #[arg(short, long, default_value = "configs/turtle.json")]
        config: String,

        /// Turtle system (system1 or system2), overrides config file
        #[arg(short, long)]
        system: Option<String>,

        /// Disable the 200-day trend filter
        #[arg(long)]
        no_trend_filter: bool,

        /// Evaluation date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        as_of: Option<String>,
    },

    /// Size a position with fixed-fractional risk
    Size {
        /// Account balance
        #[arg(short, long)]
        balance: f64,

        /// Entry price
        #[arg(short, long)]
        entry: f64,

        /// Stop loss price
        #[arg(short, long)]
        stop: f64,

        /// Fraction of balance to risk (0.02 = 2%)
        #[arg(short, long)]
        risk: Option<f64>,
    },

    /// Check exit and stop conditions for an open position
    Exit {
        /// Ticker symbol
        #[arg(short, long)]
        ticker: String,

        /// Position side (long or short)
        #[arg(long)]
        side: String,

        /// Turtle system (system1 or system2)
        #[arg(long, default_value = "system1")]
        system: String,

        /// Stop loss price to check against the latest close
        #[arg(long)]
        stop: Option<f64>,

        /// Path to configuration file
        #[arg(short, long, default_value = "configs/turtle.json")]
        config: String,

        /// Evaluation date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        as_of: Option<String>,
    },
}

fn setup_logging(verbose: bool, json: bool, command_name: &str, file_only: bool) -> Result<()> {
    std::fs::create_dir_all("logs")?;

    // {command}_{timestamp}.log
    let log_filename = format!(
        "{}_{}.log",
        command_name,
        chrono::Local::now().format("%Y-%m-%d_%H-%M-%S")
    );
    let log_path = PathBuf::from("logs").join(&log_filename);

    // Filter out noisy HTTP crates
    let level = if verbose { "debug" } else { "info" };
    let filter_str = format!(
        "{},hyper=warn,hyper_util=warn,reqwest=warn,rustls=warn,h2=warn",
        level
    );
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    let file_appender = tracing_appender::rolling::never("logs", &log_filename);
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(file_appender)
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(false);

    let console_layer = if file_only {
        None
    } else if json {
        Some(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_target(true)
                .boxed(),
        )
    } else {
        Some(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_line_number(true)
                .with_file(true)
                .with_ansi(true)
                .boxed(),
        )
    };

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

    // Commands that print JSON to stdout keep logs off the console
    let (command_name, file_only) = match &cli.command {
        Commands::Scan { .. } => ("scan", false),
        Commands::Signal { .. } => ("signal", true),
        Commands::Size { .. } => ("size", true),
        Commands::Exit { .. } => ("exit", false),
    };

    setup_logging(cli.verbose, cli.json, command_name, file_only)?;

    match cli.command {
        Commands::Scan {
            config,
            tickers,
            trigger,
            as_of,
            dry_run,
        } => commands::scan::run(config, tickers, trigger, as_of, dry_run),

        Commands::Signal {
            ticker,
            config,
            system,
            no_trend_filter,
            as_of,
        } => commands::signal::run(ticker, config, system, no_trend_filter, as_of),

        Commands::Size {
            balance,
            entry,
            stop,
            risk,
        } => commands::size::run(balance, entry, stop, risk),

        Commands::Exit {
            ticker,
            side,
            system,
            stop,
            config,
            as_of,
        } => commands::exit::run(ticker, side, system, stop, config, as_of),
    }
}
