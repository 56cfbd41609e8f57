//! Primary trend classification against the 200-day moving average

use serde::{Deserialize, Serialize};

use crate::indicators::{sma_close, TREND_MA_PERIOD};
use crate::types::Bar;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendContext {
    Uptrend,
    Downtrend,
    /// History shorter than the moving-average window
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendAnalysis {
    pub context: TrendContext,
    pub ma200: f64,
    pub price: f64,
    #[serde(rename = "isAboveMA200")]
    pub is_above_ma200: bool,
    /// Distance from the MA as a fraction of it, clamped to [0, 1]
    pub strength: f64,
}

impl TrendAnalysis {
    fn neutral(price: f64) -> Self {
        Self {
            context: TrendContext::Neutral,
            ma200: 0.0,
            price,
            is_above_ma200: false,
            strength: 0.0,
        }
    }
}

/// Classify the trend of the latest close relative to the 200-bar SMA
///
/// Short sequences get a neutral result instead of an error. Ties between
/// price and MA resolve to downtrend.
pub fn analyze_trend(bars: &[Bar]) -> TrendAnalysis {
    let price = bars.last().map(|b| b.close).unwrap_or(0.0);

    let ma200 = match sma_close(bars, TREND_MA_PERIOD) {
        Ok(ma) => ma,
        Err(_) => return TrendAnalysis::neutral(price),
    };

    let is_above_ma200 = price > ma200;
    let strength = if ma200 > 0.0 {
        ((price - ma200).abs() / ma200).min(1.0)
    } else {
        0.0
    };

    TrendAnalysis {
        context: if is_above_ma200 {
            TrendContext::Uptrend
        } else {
            TrendContext::Downtrend
        },
        ma200,
        price,
        is_above_ma200,
        strength,
    }
}
