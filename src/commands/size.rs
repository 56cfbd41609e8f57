//! Size command implementation

use anyhow::{Context, Result};
use tracing::info;
use turtle_signals::risk::DEFAULT_RISK_PERCENT;
use turtle_signals::{size_position, PositionSizingInput};

pub fn run(balance: f64, entry: f64, stop: f64, risk: Option<f64>) -> Result<()> {
    let mut input = PositionSizingInput::new(balance, entry, stop);
    if let Some(risk) = risk {
        input = input.with_risk_percent(risk);
    }

    let sizing = size_position(&input).context("Invalid position sizing input")?;
    info!(
        "Sized position: {} units @ {:.2} (risk {:.2}, stop distance {:.2})",
        sizing.units, entry, sizing.risk_amount, sizing.stop_distance
    );

    println!("{}", "=".repeat(50));
    println!("POSITION SIZE");
    println!("{}", "=".repeat(50));
    println!("  Balance:        {:>14.2}", balance);
    println!("  Risk:           {:>13.2}%", risk.unwrap_or(DEFAULT_RISK_PERCENT) * 100.0);
    println!("  Entry:          {:>14.2}", entry);
    println!("  Stop:           {:>14.2}", stop);
    println!("  Stop distance:  {:>14.2}", sizing.stop_distance);
    println!("  Risk amount:    {:>14.2}", sizing.risk_amount);
    println!("  Units:          {:>14}", sizing.units);
    println!("  Position size:  {:>14.2}", sizing.position_size);
    println!("{}", "=".repeat(50));

    Ok(())
}
