//! Turtle Trading signal engine
//!
//! Implements both classic Turtle breakout systems:
//! - System 1: 20-day breakout entry, 10-day exit channel (aggressive)
//! - System 2: 55-day breakout entry, 20-day exit channel (conservative)
//!
//! An optional 200-day moving-average trend filter suppresses counter-trend
//! breakouts. Every call is a pure function of the bars and the config.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::{BreakoutWindow, ScanConfig};
use crate::error::{EngineError, EngineResult};
use crate::indicators::{compute_turtle_indicators, highest_high, lowest_low, TurtleIndicators};
use crate::trend::{analyze_trend, TrendAnalysis};
use crate::types::{Bar, Ticker, TurtleSystem};
use crate::validation::check_historical_data;

/// Classified signal for one system on the latest bar
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Signal {
    Flat,
    Buy { entry_price: f64, stop_loss: f64 },
    Sell { entry_price: f64, stop_loss: f64 },
}

/// One system's decision plus its derivation trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "SignalOutcomeRecord", try_from = "SignalOutcomeRecord")]
pub struct SignalOutcome {
    pub system: TurtleSystem,
    pub signal: Signal,
    pub reason: String,
    /// A breakout was detected but the trend filter suppressed it
    pub trend_filtered: bool,
}

impl SignalOutcome {
    pub fn buy_signal(&self) -> bool {
        matches!(self.signal, Signal::Buy { .. })
    }

    pub fn sell_signal(&self) -> bool {
        matches!(self.signal, Signal::Sell { .. })
    }

    pub fn is_flat(&self) -> bool {
        matches!(self.signal, Signal::Flat)
    }

    /// Latest close, present iff a signal fired
    pub fn entry_price(&self) -> Option<f64> {
        match self.signal {
            Signal::Buy { entry_price, .. } | Signal::Sell { entry_price, .. } => Some(entry_price),
            Signal::Flat => None,
        }
    }

    pub fn stop_loss(&self) -> Option<f64> {
        match self.signal {
            Signal::Buy { stop_loss, .. } | Signal::Sell { stop_loss, .. } => Some(stop_loss),
            Signal::Flat => None,
        }
    }
}

/// Flat wire form of [`SignalOutcome`] for API bodies and persistence
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignalOutcomeRecord {
    system: TurtleSystem,
    buy_signal: bool,
    sell_signal: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    entry_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop_loss: Option<f64>,
    reason: String,
    trend_filtered: bool,
}

impl From<SignalOutcome> for SignalOutcomeRecord {
    fn from(outcome: SignalOutcome) -> Self {
        SignalOutcomeRecord {
            system: outcome.system,
            buy_signal: outcome.buy_signal(),
            sell_signal: outcome.sell_signal(),
            entry_price: outcome.entry_price(),
            stop_loss: outcome.stop_loss(),
            reason: outcome.reason,
            trend_filtered: outcome.trend_filtered,
        }
    }
}

impl TryFrom<SignalOutcomeRecord> for SignalOutcome {
    type Error = String;

    fn try_from(record: SignalOutcomeRecord) -> Result<Self, Self::Error> {
        let prices = || -> Result<(f64, f64), String> {
            match (record.entry_price, record.stop_loss) {
                (Some(entry_price), Some(stop_loss)) => Ok((entry_price, stop_loss)),
                _ => Err("a fired signal needs entryPrice and stopLoss".to_string()),
            }
        };
        let signal = match (record.buy_signal, record.sell_signal) {
            (true, true) => return Err("buySignal and sellSignal are mutually exclusive".to_string()),
            (true, false) => {
                let (entry_price, stop_loss) = prices()?;
                Signal::Buy {
                    entry_price,
                    stop_loss,
                }
            }
            (false, true) => {
                let (entry_price, stop_loss) = prices()?;
                Signal::Sell {
                    entry_price,
                    stop_loss,
                }
            }
            (false, false) => Signal::Flat,
        };
        Ok(SignalOutcome {
            system: record.system,
            signal,
            reason: record.reason,
            trend_filtered: record.trend_filtered,
        })
    }
}

/// Everything the engine derives for one ticker on its latest bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalReport {
    pub ticker: Ticker,
    pub date: NaiveDate,
    pub close: f64,
    pub indicators: TurtleIndicators,
    pub trend_analysis: TrendAnalysis,
    pub system1: SignalOutcome,
    pub system2: SignalOutcome,
}

impl SignalReport {
    pub fn outcome(&self, system: TurtleSystem) -> &SignalOutcome {
        match system {
            TurtleSystem::System1 => &self.system1,
            TurtleSystem::System2 => &self.system2,
        }
    }

    /// Outcome of the system the config selects
    pub fn primary(&self, config: &ScanConfig) -> &SignalOutcome {
        self.outcome(config.system)
    }
}

/// Channel levels the latest close is tested against
#[derive(Debug, Clone, Copy, PartialEq)]
struct BreakoutLevels {
    entry_high: f64,
    exit_low: f64,
}

fn breakout_levels(
    system: TurtleSystem,
    bars: &[Bar],
    indicators: &TurtleIndicators,
    window: BreakoutWindow,
) -> EngineResult<BreakoutLevels> {
    match window {
        BreakoutWindow::IncludingCurrent => Ok(match system {
            TurtleSystem::System1 => BreakoutLevels {
                entry_high: indicators.donchian20_high,
                exit_low: indicators.donchian10_low,
            },
            TurtleSystem::System2 => BreakoutLevels {
                entry_high: indicators.donchian55_high,
                exit_low: indicators.donchian20_low,
            },
        }),
        BreakoutWindow::PrecedingCurrent => {
            let prior = &bars[..bars.len().saturating_sub(1)];
            Ok(BreakoutLevels {
                entry_high: highest_high(prior, system.entry_period())?,
                exit_low: lowest_low(prior, system.exit_period())?,
            })
        }
    }
}

/// Classify one system's signal on the latest bar
///
/// `indicators` and `trend` must come from the same `bars`. Buy and sell
/// conditions are evaluated independently; if both hold the call fails with
/// [`EngineError::AmbiguousSignal`] instead of picking a side.
pub fn classify_system(
    system: TurtleSystem,
    bars: &[Bar],
    indicators: &TurtleIndicators,
    trend: &TrendAnalysis,
    config: &ScanConfig,
) -> EngineResult<SignalOutcome> {
    let latest = bars
        .last()
        .ok_or_else(|| EngineError::insufficient("signal classification", 1, 0))?;
    let close = latest.close;
    let levels = breakout_levels(system, bars, indicators, config.breakout_window)?;
    let entry_period = system.entry_period();
    let exit_period = system.exit_period();

    let breaks_up = close > levels.entry_high;
    let breaks_down = close < levels.exit_low;
    if breaks_up && breaks_down {
        return Err(EngineError::AmbiguousSignal { system, close });
    }

    let multiplier = config.stop_multiplier_for(system);
    let stop_offset = multiplier * indicators.atr14;

    let outcome = if breaks_up {
        if config.use_trend_filter && !trend.is_above_ma200 {
            SignalOutcome {
                system,
                signal: Signal::Flat,
                reason: format!(
                    "Breakout above {}-day high ({:.2}) but FILTERED: price below 200-day MA ({:.2})",
                    entry_period, levels.entry_high, trend.ma200
                ),
                trend_filtered: true,
            }
        } else {
            SignalOutcome {
                system,
                signal: Signal::Buy {
                    entry_price: close,
                    stop_loss: close - stop_offset,
                },
                reason: format!(
                    "Close ({:.2}) > {}-day high ({:.2})",
                    close, entry_period, levels.entry_high
                ),
                trend_filtered: false,
            }
        }
    } else if breaks_down {
        if config.use_trend_filter && trend.is_above_ma200 {
            SignalOutcome {
                system,
                signal: Signal::Flat,
                reason: format!(
                    "Breakout below {}-day low ({:.2}) but FILTERED: price above 200-day MA ({:.2})",
                    exit_period, levels.exit_low, trend.ma200
                ),
                trend_filtered: true,
            }
        } else {
            SignalOutcome {
                system,
                signal: Signal::Sell {
                    entry_price: close,
                    stop_loss: close + stop_offset,
                },
                reason: format!(
                    "Close ({:.2}) < {}-day low ({:.2})",
                    close, exit_period, levels.exit_low
                ),
                trend_filtered: false,
            }
        }
    } else {
        SignalOutcome {
            system,
            signal: Signal::Flat,
            reason: format!(
                "No breakout: close ({:.2}) within {}-day high ({:.2}) and {}-day low ({:.2})",
                close, entry_period, levels.entry_high, exit_period, levels.exit_low
            ),
            trend_filtered: false,
        }
    };

    Ok(outcome)
}

/// Generate both systems' signals for a ticker
///
/// Runs the data-quality gate, computes the indicator set and trend once, then
/// classifies System 1 and System 2. Upstream failures propagate as
/// `InsufficientData` / `InvalidData`, never as a silent flat signal.
pub fn generate_signals(
    ticker: &Ticker,
    bars: &[Bar],
    config: &ScanConfig,
) -> EngineResult<SignalReport> {
    config.validate()?;
    check_historical_data(bars)?;

    let indicators = compute_turtle_indicators(bars)?;
    let trend = analyze_trend(bars);

    let system1 = classify_system(TurtleSystem::System1, bars, &indicators, &trend, config)?;
    let system2 = classify_system(TurtleSystem::System2, bars, &indicators, &trend, config)?;

    // check_historical_data guarantees a non-empty sequence
    let latest = &bars[bars.len() - 1];

    Ok(SignalReport {
        ticker: ticker.clone(),
        date: latest.date,
        close: latest.close,
        indicators,
        trend_analysis: trend,
        system1,
        system2,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trend::TrendContext;
    use approx::assert_relative_eq;
    use chrono::Duration;

    fn bar(i: usize, open: f64, high: f64, low: f64, close: f64) -> Bar {
        let start = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
        Bar::new_unchecked(start + Duration::days(i as i64), open, high, low, close, 300_000)
    }

    /// 200 flat bars at 100, 20 bars topping at 103.5, then a close of `last_close`
    fn breakout_series(last_close: f64) -> Vec<Bar> {
        let mut bars: Vec<Bar> = (0..200).map(|i| bar(i, 100.0, 100.0, 100.0, 100.0)).collect();
        bars.extend((200..220).map(|i| bar(i, 103.0, 103.5, 102.5, 103.0)));
        bars.push(bar(220, 103.5, last_close + 0.5, 103.0, last_close));
        bars
    }

    /// Flat history followed by a final bar closing below every recent low
    fn breakdown_series(base: f64, last_close: f64) -> Vec<Bar> {
        let mut bars: Vec<Bar> = (0..220)
            .map(|i| bar(i, base, base + 1.0, base - 1.0, base))
            .collect();
        bars.push(bar(220, base - 1.0, base - 1.0, last_close - 0.5, last_close));
        bars
    }

    fn no_filter() -> ScanConfig {
        ScanConfig::default().with_trend_filter(false)
    }

    #[test]
    fn test_system1_buy_breakout() {
        let bars = breakout_series(104.0);
        let report = generate_signals(&Ticker::new("TEST"), &bars, &no_filter()).unwrap();

        let s1 = &report.system1;
        assert!(s1.buy_signal());
        assert!(!s1.sell_signal());
        assert_eq!(s1.entry_price(), Some(104.0));
        assert_relative_eq!(
            s1.stop_loss().unwrap(),
            104.0 - 2.0 * report.indicators.atr14
        );
        assert_eq!(s1.reason, "Close (104.00) > 20-day high (103.50)");
        assert!(!s1.trend_filtered);

        // The prior 55 bars also top out at 103.5
        assert!(report.system2.buy_signal());
        assert_relative_eq!(
            report.system2.stop_loss().unwrap(),
            104.0 - 1.5 * report.indicators.atr14
        );
    }

    #[test]
    fn test_inclusive_window_cannot_break_out() {
        let bars = breakout_series(104.0);
        let config = no_filter().with_breakout_window(BreakoutWindow::IncludingCurrent);
        let report = generate_signals(&Ticker::new("TEST"), &bars, &config).unwrap();
        // The latest bar's own high bounds its close
        assert!(report.system1.is_flat());
        assert!(report.system2.is_flat());
        assert_eq!(report.indicators.donchian20_high, 104.5);
    }

    #[test]
    fn test_trend_filter_suppresses_counter_trend_buy() {
        // Long decline so the breakout bar is still far below the MA
        let mut bars: Vec<Bar> = (0..200)
            .map(|i| {
                let p = 200.0 - i as f64 * 0.5;
                bar(i, p, p + 0.5, p - 0.5, p)
            })
            .collect();
        bars.extend((200..220).map(|i| bar(i, 100.0, 100.5, 99.5, 100.0)));
        bars.push(bar(220, 100.5, 102.0, 100.5, 101.5));

        let filtered = generate_signals(&Ticker::new("DOWN"), &bars, &ScanConfig::default()).unwrap();
        assert_eq!(filtered.trend_analysis.context, TrendContext::Downtrend);
        let s1 = &filtered.system1;
        assert!(s1.is_flat());
        assert!(s1.trend_filtered);
        assert_eq!(s1.entry_price(), None);
        assert!(s1.reason.starts_with("Breakout above 20-day high (100.50) but FILTERED"));

        let unfiltered = generate_signals(&Ticker::new("DOWN"), &bars, &no_filter()).unwrap();
        assert!(unfiltered.system1.buy_signal());
    }

    #[test]
    fn test_system1_sell_breakdown() {
        let bars = breakdown_series(100.0, 95.0);
        let report = generate_signals(&Ticker::new("DROP"), &bars, &ScanConfig::default()).unwrap();

        // Price below MA, so the filter lets the sell through
        assert!(!report.trend_analysis.is_above_ma200);
        let s1 = &report.system1;
        assert!(s1.sell_signal());
        assert_eq!(s1.entry_price(), Some(95.0));
        assert_relative_eq!(s1.stop_loss().unwrap(), 95.0 + 2.0 * report.indicators.atr14);
        assert_eq!(s1.reason, "Close (95.00) < 10-day low (99.00)");

        let s2 = &report.system2;
        assert!(s2.sell_signal());
        assert_eq!(s2.reason, "Close (95.00) < 20-day low (99.00)");
    }

    #[test]
    fn test_trend_filter_suppresses_sell_in_uptrend() {
        // Strong uptrend, then a sharp one-day drop that stays above the MA
        let mut bars: Vec<Bar> = (0..220)
            .map(|i| {
                let p = 50.0 + i as f64;
                bar(i, p, p + 0.5, p - 0.5, p)
            })
            .collect();
        bars.push(bar(220, 255.0, 255.0, 240.0, 241.0));

        let report = generate_signals(&Ticker::new("UP"), &bars, &ScanConfig::default()).unwrap();
        assert!(report.trend_analysis.is_above_ma200);
        assert!(report.system1.is_flat());
        assert!(report.system1.trend_filtered);
        assert!(report
            .system1
            .reason
            .contains("but FILTERED: price above 200-day MA"));
    }

    #[test]
    fn test_custom_stop_multiplier_applies_to_both_systems() {
        let bars = breakout_series(104.0);
        let config = no_filter().with_stop_loss_multiplier(3.0);
        let report = generate_signals(&Ticker::new("TEST"), &bars, &config).unwrap();
        let atr = report.indicators.atr14;
        assert_relative_eq!(report.system1.stop_loss().unwrap(), 104.0 - 3.0 * atr);
        assert_relative_eq!(report.system2.stop_loss().unwrap(), 104.0 - 3.0 * atr);
    }

    #[test]
    fn test_no_breakout_is_flat() {
        let bars: Vec<Bar> = (0..230).map(|i| bar(i, 100.0, 101.0, 99.0, 100.0)).collect();
        let report = generate_signals(&Ticker::new("FLAT"), &bars, &ScanConfig::default()).unwrap();
        assert!(report.system1.is_flat());
        assert!(!report.system1.trend_filtered);
        assert!(report.system1.reason.starts_with("No breakout"));
        assert_eq!(report.system1.stop_loss(), None);
    }

    #[test]
    fn test_upstream_failures_propagate() {
        let short: Vec<Bar> = (0..20).map(|i| bar(i, 100.0, 105.0, 95.0, 100.0)).collect();
        assert!(matches!(
            generate_signals(&Ticker::new("AAPL"), &short, &ScanConfig::default()),
            Err(EngineError::InsufficientData { .. })
        ));

        let mut corrupt = breakout_series(104.0);
        corrupt[10].high = corrupt[10].low - 10.0;
        assert!(matches!(
            generate_signals(&Ticker::new("AAPL"), &corrupt, &ScanConfig::default()),
            Err(EngineError::InvalidData(_))
        ));

        let bad_config = ScanConfig::default().with_stop_loss_multiplier(-1.0);
        assert!(matches!(
            generate_signals(&Ticker::new("AAPL"), &breakout_series(104.0), &bad_config),
            Err(EngineError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_ambiguous_breakout_is_an_error() {
        // Hand-built indicator set where the exit low sits above the entry high
        let bars = breakout_series(104.0);
        let mut indicators = compute_turtle_indicators(&bars).unwrap();
        indicators.donchian20_high = 103.0;
        indicators.donchian10_low = 105.0;
        let trend = analyze_trend(&bars);
        let config = no_filter().with_breakout_window(BreakoutWindow::IncludingCurrent);

        let result = classify_system(TurtleSystem::System1, &bars, &indicators, &trend, &config);
        assert_eq!(
            result,
            Err(EngineError::AmbiguousSignal {
                system: TurtleSystem::System1,
                close: 104.0
            })
        );
    }

    #[test]
    fn test_primary_outcome_follows_config() {
        let bars = breakout_series(104.0);
        let config = no_filter().with_system(TurtleSystem::System2);
        let report = generate_signals(&Ticker::new("TEST"), &bars, &config).unwrap();
        assert_eq!(report.primary(&config).system, TurtleSystem::System2);
    }

    #[test]
    fn test_outcome_wire_format() {
        let report =
            generate_signals(&Ticker::new("TEST"), &breakout_series(104.0), &no_filter()).unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["ticker"], "TEST");
        assert_eq!(json["system1"]["buySignal"], true);
        assert_eq!(json["system1"]["sellSignal"], false);
        assert_eq!(json["system1"]["entryPrice"], 104.0);
        assert_eq!(json["trendAnalysis"]["context"], "uptrend");

        let back: SignalReport = serde_json::from_value(json).unwrap();
        assert_eq!(back.ticker, report.ticker);
        assert_eq!(back.date, report.date);
        assert!(back.system1.buy_signal());
        assert!(back.system2.buy_signal());

        let both = serde_json::json!({
            "system": "system1", "buySignal": true, "sellSignal": true,
            "entryPrice": 1.0, "stopLoss": 0.5, "reason": "", "trendFiltered": false
        });
        assert!(serde_json::from_value::<SignalOutcome>(both).is_err());
    }
}
