//! Yahoo Finance daily history via the CSV download endpoint

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveTime};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::debug;

use super::{filter_bars_by_date, lookback_start, parse_bars, NoData, PriceSource};
use crate::types::{Bar, Ticker};

const YAHOO_DOWNLOAD_URL: &str = "https://query1.finance.yahoo.com/v7/finance/download";
const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36";

pub struct YahooSource {
    client: Client,
    base_url: String,
}

impl YahooSource {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: YAHOO_DOWNLOAD_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    fn url(&self, ticker: &Ticker, start: NaiveDate, end: NaiveDate) -> String {
        let ts = |d: NaiveDate| d.and_time(NaiveTime::MIN).and_utc().timestamp();
        format!(
            "{}/{}?period1={}&period2={}&interval=1d&events=history",
            self.base_url,
            ticker,
            ts(start),
            // period2 is exclusive
            ts(end.succ_opt().unwrap_or(end)),
        )
    }
}

impl PriceSource for YahooSource {
    fn name(&self) -> &str {
        "yahoo"
    }

    fn fetch_history(&self, ticker: &Ticker, as_of: NaiveDate, days: u32) -> Result<Vec<Bar>> {
        let start = lookback_start(as_of, days);
        let url = self.url(ticker, start, as_of);
        debug!(%ticker, "Fetching Yahoo history");

        let response = self
            .client
            .get(&url)
            .send()
            .with_context(|| format!("Failed to fetch Yahoo data for {}", ticker))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(NoData::new(self.name(), ticker, "unknown symbol").into());
        }

        let body = response
            .error_for_status()
            .with_context(|| format!("Yahoo returned an error for {}", ticker))?
            .text()
            .context("Failed to read Yahoo response")?;

        let bars = parse_bars(body.as_bytes(), &format!("yahoo:{}", ticker))?;
        Ok(filter_bars_by_date(bars, start, as_of))
    }
}
