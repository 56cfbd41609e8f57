//! Exit and stop evaluation for open positions

use crate::config::BreakoutWindow;
use crate::indicators::{highest_high, lowest_low};
use crate::types::{Bar, PositionSide, TurtleSystem};

/// Turtle channel exit on the latest close, channel over the preceding bars
///
/// Same as [`check_exit_signal_in`] with the default [`BreakoutWindow`].
pub fn check_exit_signal(bars: &[Bar], side: PositionSide, system: TurtleSystem) -> bool {
    check_exit_signal_in(bars, side, system, BreakoutWindow::default())
}

/// Turtle channel exit with an explicit channel window
///
/// The channel spans `system.exit_period()` bars, resolved against the latest
/// bar the same way entry breakouts are. Longs exit below its low, shorts
/// above its high. Too little history never triggers an exit.
pub fn check_exit_signal_in(
    bars: &[Bar],
    side: PositionSide,
    system: TurtleSystem,
    window: BreakoutWindow,
) -> bool {
    let Some(latest) = bars.last() else {
        return false;
    };
    let channel = match window {
        BreakoutWindow::IncludingCurrent => bars,
        BreakoutWindow::PrecedingCurrent => &bars[..bars.len() - 1],
    };
    let period = system.exit_period();

    match side {
        PositionSide::Long => lowest_low(channel, period)
            .map(|low| latest.close < low)
            .unwrap_or(false),
        PositionSide::Short => highest_high(channel, period)
            .map(|high| latest.close > high)
            .unwrap_or(false),
    }
}

/// Fixed stop check; touching the stop counts as hit
pub fn check_stop_loss(current_price: f64, stop_loss_price: f64, side: PositionSide) -> bool {
    match side {
        PositionSide::Long => current_price <= stop_loss_price,
        PositionSide::Short => current_price >= stop_loss_price,
    }
}
