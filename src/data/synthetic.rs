//! Deterministic generated bars for demos and dry runs
//!
//! Each ticker gets its own drift, cycle and volatility derived from a hash of
//! its symbol, so repeated runs produce identical series without a vendor.

use anyhow::Result;
use chrono::{Datelike, NaiveDate, Weekday};

use super::{lookback_start, PriceSource};
use crate::types::{Bar, Ticker};

#[derive(Debug, Clone)]
pub struct SyntheticSource {
    base_price: f64,
}

impl Default for SyntheticSource {
    fn default() -> Self {
        Self { base_price: 50.0 }
    }
}

/// FNV-1a, stable across platforms and releases unlike `DefaultHasher`
fn symbol_seed(ticker: &Ticker) -> u64 {
    ticker
        .as_str()
        .bytes()
        .fold(0xcbf2_9ce4_8422_2325u64, |h, b| (h ^ u64::from(b)).wrapping_mul(0x0100_0000_01b3))
}

fn is_trading_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

impl SyntheticSource {
    pub fn with_base_price(mut self, price: f64) -> Self {
        self.base_price = price;
        self
    }

    /// Generate the series for `ticker` on trading days in `[start, end]`
    pub fn generate(&self, ticker: &Ticker, start: NaiveDate, end: NaiveDate) -> Vec<Bar> {
        let seed = symbol_seed(ticker);
        let unit = |shift: u32| ((seed >> shift) & 0xffff) as f64 / 65_535.0;

        let base = self.base_price * (0.5 + 1.5 * unit(0));
        let drift = (unit(16) - 0.45) * 0.004;
        let cycle = 20.0 + 60.0 * unit(32);
        let amplitude = 0.05 + 0.10 * unit(48);
        let range = 0.01 + 0.02 * unit(8);

        // index days from a fixed epoch so overlapping windows agree
        let epoch = NaiveDate::from_ymd_opt(2000, 1, 3).unwrap_or(start);

        start
            .iter_days()
            .take_while(|d| *d <= end)
            .filter(|d| is_trading_day(*d))
            .map(|date| {
                let t = (date - epoch).num_days() as f64;
                let trend = (1.0 + drift).powf(t / 10.0).clamp(0.2, 5.0);
                let mid = base * trend * (1.0 + amplitude * (t * std::f64::consts::TAU / cycle).sin());
                let prev_mid = base * trend * (1.0 + amplitude * ((t - 1.0) * std::f64::consts::TAU / cycle).sin());
                let high = mid.max(prev_mid) * (1.0 + range);
                let low = mid.min(prev_mid) * (1.0 - range);
                let volume = 500_000 + ((seed.rotate_left((t as u32) % 64) & 0xfffff) as u64);
                Bar::new_unchecked(date, prev_mid, high, low, mid, volume)
            })
            .collect()
    }
}

impl PriceSource for SyntheticSource {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn fetch_history(&self, ticker: &Ticker, as_of: NaiveDate, days: u32) -> Result<Vec<Bar>> {
        Ok(self.generate(ticker, lookback_start(as_of, days), as_of))
    }
}
