//! Polygon.io daily aggregates

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate};
use reqwest::blocking::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::{lookback_start, normalize_bars, PriceSource};
use crate::types::{Bar, Ticker};

const POLYGON_BASE_URL: &str = "https://api.polygon.io";

#[derive(Debug, Deserialize)]
struct AggregatesResponse {
    status: String,
    #[serde(default)]
    results: Vec<Aggregate>,
    #[serde(default)]
    error: Option<String>,
}

/// One daily aggregate bar; `t` is the window start in epoch millis
#[derive(Debug, Deserialize)]
struct Aggregate {
    t: i64,
    o: f64,
    h: f64,
    l: f64,
    c: f64,
    #[serde(default)]
    v: f64,
}

impl Aggregate {
    fn into_bar(self) -> Option<Bar> {
        let date = DateTime::from_timestamp_millis(self.t)?.date_naive();
        let volume = if self.v.is_finite() && self.v > 0.0 {
            self.v.round() as u64
        } else {
            0
        };
        Some(Bar::new_unchecked(date, self.o, self.h, self.l, self.c, volume))
    }
}

pub struct PolygonSource {
    client: Client,
    api_key: String,
    base_url: String,
}

impl PolygonSource {
    pub fn new(api_key: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            api_key,
            base_url: POLYGON_BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    fn url(&self, ticker: &Ticker, start: NaiveDate, end: NaiveDate) -> String {
        format!(
            "{}/v2/aggs/ticker/{}/range/1/day/{}/{}?adjusted=true&sort=asc&limit=50000&apiKey={}",
            self.base_url, ticker, start, end, self.api_key
        )
    }
}

fn parse_aggregates(body: &str, ticker: &Ticker) -> Result<Vec<Bar>> {
    let response: AggregatesResponse =
        serde_json::from_str(body).context("Failed to parse Polygon aggregates")?;
    if response.status != "OK" && response.status != "DELAYED" {
        anyhow::bail!(
            "Polygon returned status {} for {}: {}",
            response.status,
            ticker,
            response.error.unwrap_or_default()
        );
    }
    let bars = response
        .results
        .into_iter()
        .filter_map(Aggregate::into_bar)
        .collect();
    Ok(normalize_bars(bars))
}

impl PriceSource for PolygonSource {
    fn name(&self) -> &str {
        "polygon"
    }

    fn fetch_history(&self, ticker: &Ticker, as_of: NaiveDate, days: u32) -> Result<Vec<Bar>> {
        let url = self.url(ticker, lookback_start(as_of, days), as_of);
        debug!(%ticker, "Fetching Polygon aggregates");

        let body = self
            .client
            .get(&url)
            .send()
            .with_context(|| format!("Failed to fetch Polygon data for {}", ticker))?
            .error_for_status()
            .with_context(|| format!("Polygon returned an error for {}", ticker))?
            .text()
            .context("Failed to read Polygon response")?;

        parse_aggregates(&body, ticker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aggregates() {
        let body = r#"{
            "ticker": "AAPL", "status": "OK", "resultsCount": 2, "adjusted": true,
            "results": [
                {"v": 70790813, "vw": 131.6292, "o": 130.465, "c": 130.15, "h": 133.41, "l": 129.89, "t": 1673240400000, "n": 645365},
                {"v": 63896155, "o": 130.28, "c": 130.73, "h": 131.2636, "l": 128.12, "t": 1673154000000}
            ]
        }"#;
        let bars = parse_aggregates(body, &Ticker::new("AAPL")).unwrap();
        assert_eq!(bars.len(), 2);
        // sorted ascending regardless of payload order
        assert!(bars[0].date < bars[1].date);
        assert_eq!(bars[1].close, 130.15);
        assert_eq!(bars[1].volume, 70_790_813);
    }

    #[test]
    fn test_error_status() {
        let body = r#"{"status": "ERROR", "error": "Unknown API Key"}"#;
        let err = parse_aggregates(body, &Ticker::new("AAPL")).unwrap_err();
        assert!(err.to_string().contains("Unknown API Key"));
    }

    #[test]
    fn test_url_contains_range() {
        let source = PolygonSource::new("key".to_string()).unwrap();
        let url = source.url(
            &Ticker::new("spy"),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
        );
        assert!(url.contains("/v2/aggs/ticker/SPY/range/1/day/2024-01-01/2024-06-30"));
        assert!(url.ends_with("apiKey=key"));
    }
}
