//! Price history sources
//!
//! Every vendor sits behind [`PriceSource`] and hands back a normalized bar
//! sequence: ascending dates, one bar per date, finite prices. OHLC
//! consistency is left to the engine's validator so a single corrupt bar
//! rejects the ticker rather than silently vanishing.
//!
//! Available sources:
//! - [`CsvDirSource`]: `{data_dir}/{TICKER}.csv`
//! - [`YahooSource`]: Yahoo Finance CSV download
//! - [`PolygonSource`]: Polygon daily aggregates (API key required)
//! - [`SyntheticSource`]: deterministic generated bars
//!
//! [`FallbackSource`] tries them in order with retry and a per-source circuit
//! breaker. A source that simply has nothing for a ticker reports [`NoData`],
//! which the chain skips past without retrying or tripping the breaker.

mod csv_source;
mod fallback;
mod polygon;
mod synthetic;
mod yahoo;

pub use csv_source::{load_csv, parse_bars, write_csv, CsvDirSource};
pub use fallback::FallbackSource;
pub use polygon::PolygonSource;
pub use synthetic::SyntheticSource;
pub use yahoo::YahooSource;

use anyhow::Result;
use chrono::{Duration, NaiveDate};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::common::RetryPolicy;
use crate::config::{DataConfig, SourceKind};
use crate::types::{Bar, Ticker};

/// The source has no history for this ticker (missing file, unknown symbol)
///
/// Permanent for the ticker, unlike transport or vendor failures.
#[derive(Debug, Clone, Error)]
#[error("{source_name} has no data for {ticker}: {detail}")]
pub struct NoData {
    pub source_name: String,
    pub ticker: Ticker,
    pub detail: String,
}

impl NoData {
    pub fn new(source_name: &str, ticker: &Ticker, detail: impl Into<String>) -> Self {
        Self {
            source_name: source_name.to_string(),
            ticker: ticker.clone(),
            detail: detail.into(),
        }
    }

    /// Whether `err` is, or wraps, a [`NoData`]
    pub fn is_no_data(err: &anyhow::Error) -> bool {
        err.downcast_ref::<NoData>().is_some()
    }
}

/// A provider of daily bars for a ticker
pub trait PriceSource: Send + Sync {
    fn name(&self) -> &str;

    /// Bars dated within `[as_of - days, as_of]`, normalized
    fn fetch_history(&self, ticker: &Ticker, as_of: NaiveDate, days: u32) -> Result<Vec<Bar>>;
}

impl<S: PriceSource + ?Sized> PriceSource for Arc<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn fetch_history(&self, ticker: &Ticker, as_of: NaiveDate, days: u32) -> Result<Vec<Bar>> {
        (**self).fetch_history(ticker, as_of, days)
    }
}

impl<S: PriceSource + ?Sized> PriceSource for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn fetch_history(&self, ticker: &Ticker, as_of: NaiveDate, days: u32) -> Result<Vec<Bar>> {
        (**self).fetch_history(ticker, as_of, days)
    }
}

/// First date of a `days`-long lookback ending at `as_of`
pub fn lookback_start(as_of: NaiveDate, days: u32) -> NaiveDate {
    as_of - Duration::days(i64::from(days))
}

/// Sort ascending, keep the last bar seen for each date, drop rows with
/// non-finite prices
pub fn normalize_bars(mut bars: Vec<Bar>) -> Vec<Bar> {
    let before = bars.len();
    bars.retain(Bar::is_finite);
    // stable sort keeps vendor order within a date, so the later row wins below
    bars.sort_by_key(|b| b.date);

    let mut out: Vec<Bar> = Vec::with_capacity(bars.len());
    for bar in bars {
        match out.last_mut() {
            Some(last) if last.date == bar.date => *last = bar,
            _ => out.push(bar),
        }
    }

    if out.len() != before {
        debug!("Normalization dropped {} of {} bars", before - out.len(), before);
    }
    out
}

/// Keep bars dated within `[start, end]`
pub fn filter_bars_by_date(bars: Vec<Bar>, start: NaiveDate, end: NaiveDate) -> Vec<Bar> {
    bars.into_iter()
        .filter(|b| b.date >= start && b.date <= end)
        .collect()
}

/// Build the configured fallback chain
///
/// Sources that cannot be constructed (Polygon without a key) are skipped
/// with a warning; an empty chain is an error.
pub fn build_source(config: &DataConfig) -> Result<FallbackSource> {
    let mut sources: Vec<Box<dyn PriceSource>> = Vec::new();

    for kind in &config.sources {
        match kind {
            SourceKind::Csv => sources.push(Box::new(CsvDirSource::new(&config.data_dir))),
            SourceKind::Yahoo => sources.push(Box::new(YahooSource::new()?)),
            SourceKind::Polygon => match &config.polygon_api_key {
                Some(key) => sources.push(Box::new(PolygonSource::new(key.clone())?)),
                None => tracing::warn!("Polygon source configured but POLYGON_API_KEY is not set; skipping"),
            },
            SourceKind::Synthetic => sources.push(Box::new(SyntheticSource::default())),
        }
    }

    if sources.is_empty() {
        anyhow::bail!("No usable price source configured");
    }

    let policy = RetryPolicy::default().with_max_retries(config.max_retries);
    Ok(FallbackSource::new(sources).with_retry_policy(policy))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, d).unwrap()
    }

    fn bar(d: u32, close: f64) -> Bar {
        Bar::new_unchecked(day(d), close, close + 1.0, close - 1.0, close, 100)
    }

    #[test]
    fn test_normalize_sorts_dedupes_and_drops_nan() {
        let bars = vec![
            bar(3, 12.0),
            bar(1, 10.0),
            bar(2, 11.0),
            bar(2, 11.5),
            Bar::new_unchecked(day(4), f64::NAN, 1.0, 1.0, 1.0, 0),
        ];
        let out = normalize_bars(bars);
        assert_eq!(out.len(), 3);
        assert_eq!(out.iter().map(|b| b.date).collect::<Vec<_>>(), vec![day(1), day(2), day(3)]);
        assert_eq!(out[1].close, 11.5);
    }

    #[test]
    fn test_filter_by_date_is_inclusive() {
        let bars: Vec<Bar> = (1..=10).map(|d| bar(d, 10.0)).collect();
        let out = filter_bars_by_date(bars, day(3), day(5));
        assert_eq!(out.len(), 3);
        assert_eq!(lookback_start(day(10), 7), day(3));
    }

    #[test]
    fn test_build_source_skips_polygon_without_key() {
        let config = DataConfig {
            sources: vec![SourceKind::Polygon, SourceKind::Synthetic],
            polygon_api_key: None,
            ..DataConfig::default()
        };
        let chain = build_source(&config).unwrap();
        assert_eq!(chain.source_names(), vec!["synthetic".to_string()]);

        let only_polygon = DataConfig {
            sources: vec![SourceKind::Polygon],
            polygon_api_key: None,
            ..DataConfig::default()
        };
        assert!(build_source(&only_polygon).is_err());
    }
}
