//! Technical indicators
//!
//! Turtle Trading indicators computed over the trailing window of a daily bar
//! sequence. Every function reads the *last* `period` bars and fails with
//! [`EngineError::InsufficientData`] when fewer are available; nothing is
//! cached between calls.

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::types::Bar;

/// Exit channel for System 1
pub const DONCHIAN_EXIT_PERIOD: usize = 10;
/// Entry channel for System 1, exit channel for System 2
pub const DONCHIAN_ENTRY_PERIOD: usize = 20;
/// Entry channel for System 2
pub const DONCHIAN_SLOW_PERIOD: usize = 55;
pub const ATR_PERIOD: usize = 14;
pub const TREND_MA_PERIOD: usize = 200;

/// Minimum history for the aggregate indicator set (the strictest window)
pub const MIN_TURTLE_BARS: usize = TREND_MA_PERIOD;

fn trailing<'a>(bars: &'a [Bar], period: usize, what: &'static str) -> EngineResult<&'a [Bar]> {
    if period == 0 {
        return Err(EngineError::InvalidParameter(format!(
            "{} period must be >= 1",
            what
        )));
    }
    if bars.len() < period {
        return Err(EngineError::insufficient(what, period, bars.len()));
    }
    Ok(&bars[bars.len() - period..])
}

/// Highest high over the last `period` bars (upper Donchian band)
pub fn highest_high(bars: &[Bar], period: usize) -> EngineResult<f64> {
    let window = trailing(bars, period, "Donchian high")?;
    Ok(window.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max))
}

/// Lowest low over the last `period` bars (lower Donchian band)
pub fn lowest_low(bars: &[Bar], period: usize) -> EngineResult<f64> {
    let window = trailing(bars, period, "Donchian low")?;
    Ok(window.iter().map(|b| b.low).fold(f64::INFINITY, f64::min))
}

pub fn donchian10_high(bars: &[Bar]) -> EngineResult<f64> {
    highest_high(bars, DONCHIAN_EXIT_PERIOD)
}

pub fn donchian10_low(bars: &[Bar]) -> EngineResult<f64> {
    lowest_low(bars, DONCHIAN_EXIT_PERIOD)
}

pub fn donchian20_high(bars: &[Bar]) -> EngineResult<f64> {
    highest_high(bars, DONCHIAN_ENTRY_PERIOD)
}

pub fn donchian20_low(bars: &[Bar]) -> EngineResult<f64> {
    lowest_low(bars, DONCHIAN_ENTRY_PERIOD)
}

pub fn donchian55_high(bars: &[Bar]) -> EngineResult<f64> {
    highest_high(bars, DONCHIAN_SLOW_PERIOD)
}

pub fn donchian55_low(bars: &[Bar]) -> EngineResult<f64> {
    lowest_low(bars, DONCHIAN_SLOW_PERIOD)
}

/// True range of each bar from index 1 onward
///
/// The first bar has no previous close, so the result is one shorter than the
/// input.
pub fn true_ranges(bars: &[Bar]) -> Vec<f64> {
    bars.iter()
        .tuple_windows()
        .map(|(prev, cur)| {
            let hl = cur.high - cur.low;
            let hc = (cur.high - prev.close).abs();
            let lc = (cur.low - prev.close).abs();
            hl.max(hc).max(lc)
        })
        .collect()
}

/// Average True Range: arithmetic mean of the last `period` true ranges
///
/// Needs `period` true-range values, i.e. `period + 1` bars.
pub fn atr(bars: &[Bar], period: usize) -> EngineResult<f64> {
    if period == 0 {
        return Err(EngineError::InvalidParameter(
            "ATR period must be >= 1".to_string(),
        ));
    }
    let tr = true_ranges(bars);
    if tr.len() < period {
        return Err(EngineError::insufficient("ATR", period + 1, bars.len()));
    }
    let sum: f64 = tr[tr.len() - period..].iter().sum();
    Ok(sum / period as f64)
}

pub fn atr14(bars: &[Bar]) -> EngineResult<f64> {
    atr(bars, ATR_PERIOD)
}

/// Simple moving average of closes over the last `period` bars
pub fn sma_close(bars: &[Bar], period: usize) -> EngineResult<f64> {
    let window = trailing(bars, period, "moving average")?;
    let sum: f64 = window.iter().map(|b| b.close).sum();
    Ok(sum / period as f64)
}

pub fn ma200(bars: &[Bar]) -> EngineResult<f64> {
    sma_close(bars, TREND_MA_PERIOD)
}

/// Full Turtle indicator set for the latest bar of a sequence
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurtleIndicators {
    pub donchian20_high: f64,
    pub donchian20_low: f64,
    pub donchian55_high: f64,
    pub donchian55_low: f64,
    pub donchian10_high: f64,
    pub donchian10_low: f64,
    pub atr14: f64,
    pub ma200: f64,
}

/// Compute every Turtle indicator at once
///
/// Requires [`MIN_TURTLE_BARS`] bars. Either all eight values are returned or
/// the call fails; a partially populated set is never produced.
pub fn compute_turtle_indicators(bars: &[Bar]) -> EngineResult<TurtleIndicators> {
    if bars.len() < MIN_TURTLE_BARS {
        return Err(EngineError::insufficient(
            "Turtle indicators",
            MIN_TURTLE_BARS,
            bars.len(),
        ));
    }

    Ok(TurtleIndicators {
        donchian20_high: donchian20_high(bars)?,
        donchian20_low: donchian20_low(bars)?,
        donchian55_high: donchian55_high(bars)?,
        donchian55_low: donchian55_low(bars)?,
        donchian10_high: donchian10_high(bars)?,
        donchian10_low: donchian10_low(bars)?,
        atr14: atr14(bars)?,
        ma200: ma200(bars)?,
    })
}
