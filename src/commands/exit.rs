//! Exit command implementation

use anyhow::{Context, Result};
use tracing::{info, warn};
use turtle_signals::data::build_source;
use turtle_signals::data::PriceSource;
use turtle_signals::{check_exit_signal_in, check_stop_loss, PositionSide, Ticker, TurtleSystem};

use super::{load_config, parse_as_of};

pub fn run(
    ticker: String,
    side: String,
    system: String,
    stop: Option<f64>,
    config_path: String,
    as_of: Option<String>,
) -> Result<()> {
    let config = load_config(&config_path)?;
    let side: PositionSide = side.parse().map_err(anyhow::Error::msg)?;
    let system: TurtleSystem = system.parse().map_err(anyhow::Error::msg)?;
    let ticker = Ticker::new(ticker);
    let as_of = parse_as_of(as_of)?;

    let source = build_source(&config.data)?;
    let bars = source
        .fetch_history(&ticker, as_of, config.data.history_days)
        .with_context(|| format!("Failed to fetch history for {}", ticker))?;
    let latest = bars
        .last()
        .with_context(|| format!("No bars for {}", ticker))?;

    let channel_exit = check_exit_signal_in(&bars, side, system, config.scan.breakout_window);
    let stop_hit = stop.map(|s| check_stop_loss(latest.close, s, side));

    info!(
        %ticker, %side, %system,
        close = latest.close,
        channel_exit,
        stop_hit = ?stop_hit,
        "Exit check"
    );
    if channel_exit || stop_hit == Some(true) {
        warn!("{} {} position should be closed", ticker, side);
    }

    println!("{}", "=".repeat(50));
    println!("EXIT CHECK: {} ({} {})", ticker, side, system);
    println!("{}", "=".repeat(50));
    println!("  Date:           {}", latest.date);
    println!("  Close:          {:.2}", latest.close);
    println!(
        "  Channel exit:   {} ({}-day {})",
        if channel_exit { "YES" } else { "no" },
        system.exit_period(),
        match side {
            PositionSide::Long => "low",
            PositionSide::Short => "high",
        }
    );
    match (stop, stop_hit) {
        (Some(s), Some(hit)) => println!("  Stop {:.2}:     {}", s, if hit { "HIT" } else { "not hit" }),
        _ => println!("  Stop:           not checked"),
    }
    println!("{}", "=".repeat(50));

    Ok(())
}
