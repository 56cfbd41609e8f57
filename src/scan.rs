//! Scan pipeline
//!
//! Runs the signal engine across a ticker universe:
//! 1. Fetch each ticker's history through the price cache (sequential, the
//!    cache has a single mutable owner)
//! 2. Evaluate every fetched history in parallel with rayon
//! 3. Size fired signals against the account
//! 4. Persist signals and scan history when a store is attached
//!
//! Per-ticker failures never abort the scan; they are counted and reported
//! in the [`ScanSummary`].

use anyhow::Result;
use chrono::NaiveDate;
use indicatif::ProgressBar;
use rayon::prelude::*;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::cache::PriceCache;
use crate::config::{AccountConfig, ScanConfig};
use crate::data::PriceSource;
use crate::risk::{size_position, PositionSizing, PositionSizingInput};
use crate::signals::{generate_signals, SignalOutcome, SignalReport};
use crate::storage::{ScanCounts, ScanTrigger, SqliteSignalStore, StoredSignal, SignalType};
use crate::types::{Bar, Ticker, TurtleSystem};

/// A fired signal, sized when an account is configured
#[derive(Debug, Clone, Serialize)]
pub struct SignalHit {
    pub ticker: Ticker,
    pub date: NaiveDate,
    pub system: TurtleSystem,
    pub signal_type: SignalType,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sizing: Option<PositionSizing>,
}

/// Per-ticker result of a scan
#[derive(Debug, Clone)]
pub enum TickerOutcome {
    Evaluated(Box<SignalReport>),
    /// History fetched but rejected by the engine (too short, corrupt, ambiguous)
    Skipped(String),
    FetchFailed(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanSummary {
    pub scan_id: Option<i64>,
    pub trigger: ScanTrigger,
    pub as_of: NaiveDate,
    pub system: TurtleSystem,
    pub tickers_scanned: usize,
    pub evaluated: usize,
    pub skipped: Vec<(Ticker, String)>,
    pub fetch_failures: Vec<(Ticker, String)>,
    pub trend_filtered: usize,
    pub buy_signals: Vec<SignalHit>,
    pub sell_signals: Vec<SignalHit>,
    pub execution_time_ms: u64,
}

impl ScanSummary {
    pub fn signals_generated(&self) -> usize {
        self.buy_signals.len() + self.sell_signals.len()
    }

    pub fn counts(&self) -> ScanCounts {
        ScanCounts {
            tickers_scanned: self.tickers_scanned as u32,
            buy_signals: self.buy_signals.len() as u32,
            sell_signals: self.sell_signals.len() as u32,
        }
    }
}

pub struct Scanner<S: PriceSource> {
    source: S,
    cache: PriceCache,
    config: ScanConfig,
    history_days: u32,
    account: Option<AccountConfig>,
    progress: ProgressBar,
}

impl<S: PriceSource> Scanner<S> {
    pub fn new(source: S, cache: PriceCache, config: ScanConfig) -> Self {
        Self {
            source,
            cache,
            config,
            history_days: 400,
            account: None,
            progress: ProgressBar::hidden(),
        }
    }

    pub fn with_history_days(mut self, days: u32) -> Self {
        self.history_days = days;
        self
    }

    /// Size every fired signal against this account
    pub fn with_account(mut self, account: AccountConfig) -> Self {
        self.account = Some(account);
        self
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    pub fn cache(&self) -> &PriceCache {
        &self.cache
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Fetch one ticker's history through the cache
    pub fn fetch(&mut self, ticker: &Ticker, as_of: NaiveDate) -> Result<Arc<[Bar]>> {
        self.cache
            .get_or_fetch(&self.source, ticker, as_of, self.history_days)
    }

    /// Evaluate tickers without touching any store
    pub fn evaluate(&mut self, tickers: &[Ticker], as_of: NaiveDate) -> Vec<(Ticker, TickerOutcome)> {
        self.progress.set_length(tickers.len() as u64 * 2);
        self.progress.set_message("fetching");

        let mut fetched: Vec<(Ticker, Arc<[Bar]>)> = Vec::with_capacity(tickers.len());
        let mut failed: Vec<(Ticker, TickerOutcome)> = Vec::new();
        for ticker in tickers {
            match self.fetch(ticker, as_of) {
                Ok(bars) => fetched.push((ticker.clone(), bars)),
                Err(e) => {
                    warn!(%ticker, "Failed to fetch history: {:#}", e);
                    failed.push((ticker.clone(), TickerOutcome::FetchFailed(format!("{:#}", e))));
                    // nothing left to evaluate for this ticker
                    self.progress.inc(1);
                }
            }
            self.progress.inc(1);
        }

        self.progress.set_message("evaluating");
        let config = self.config;
        let progress = &self.progress;
        let mut results: Vec<(Ticker, TickerOutcome)> = fetched
            .par_iter()
            .map(|(ticker, bars)| {
                let outcome = match generate_signals(ticker, bars, &config) {
                    Ok(report) => TickerOutcome::Evaluated(Box::new(report)),
                    Err(e) => {
                        if e.is_data_error() {
                            debug!(%ticker, "Skipping: {}", e);
                        } else {
                            warn!(%ticker, "Skipping: {}", e);
                        }
                        TickerOutcome::Skipped(e.to_string())
                    }
                };
                progress.inc(1);
                (ticker.clone(), outcome)
            })
            .collect();

        results.extend(failed);
        results.sort_by(|a, b| a.0.cmp(&b.0));
        self.progress.finish_with_message("done");
        results
    }

    /// Full scan: evaluate, size, persist, summarize
    ///
    /// With a store attached, the scan is recorded as in progress up front and
    /// marked completed or failed at the end. A scan where every ticker failed
    /// to fetch is a failed scan.
    pub fn scan(
        &mut self,
        tickers: &[Ticker],
        as_of: NaiveDate,
        trigger: ScanTrigger,
        store: Option<&SqliteSignalStore>,
    ) -> Result<ScanSummary> {
        let start = Instant::now();
        self.config.validate()?;

        let scan_id = match store {
            Some(store) => Some(store.start_scan(trigger)?),
            None => None,
        };
        info!(
            scan_id = ?scan_id,
            %trigger,
            tickers = tickers.len(),
            system = %self.config.system,
            "Scan started"
        );

        let purged = self.cache.purge_expired();
        if purged > 0 {
            debug!(purged, "Dropped expired cache entries");
        }

        let results = self.evaluate(tickers, as_of);
        let mut summary = self.summarize(results, scan_id, trigger, as_of);
        summary.execution_time_ms = start.elapsed().as_millis() as u64;

        let all_failed = !tickers.is_empty() && summary.fetch_failures.len() == tickers.len();

        if let (Some(store), Some(id)) = (store, scan_id) {
            if all_failed {
                let message = format!("No price history fetched for any of {} tickers", tickers.len());
                store.fail_scan(id, &message, summary.execution_time_ms)?;
                anyhow::bail!(message);
            }
            if let Err(e) = self.persist(store, id, &summary) {
                store.fail_scan(id, &format!("{:#}", e), summary.execution_time_ms)?;
                return Err(e);
            }
            store.complete_scan(id, &summary.counts(), summary.execution_time_ms)?;
        } else if all_failed {
            anyhow::bail!("No price history fetched for any of {} tickers", tickers.len());
        }

        info!(
            scan_id = ?scan_id,
            evaluated = summary.evaluated,
            buys = summary.buy_signals.len(),
            sells = summary.sell_signals.len(),
            skipped = summary.skipped.len(),
            fetch_failures = summary.fetch_failures.len(),
            elapsed_ms = summary.execution_time_ms,
            "Scan completed"
        );
        Ok(summary)
    }

    fn persist(&self, store: &SqliteSignalStore, scan_id: i64, summary: &ScanSummary) -> Result<()> {
        let rows: Vec<StoredSignal> = summary
            .buy_signals
            .iter()
            .chain(&summary.sell_signals)
            .map(|hit| StoredSignal {
                id: None,
                ticker: hit.ticker.clone(),
                signal_type: hit.signal_type,
                system: hit.system,
                entry_price: hit.entry_price,
                stop_loss_price: hit.stop_loss,
                entry_date: hit.date,
                scan_id: Some(scan_id),
                signal_status: Default::default(),
                notes: hit.reason.clone(),
            })
            .collect();
        store.save_signals(scan_id, &rows)?;
        Ok(())
    }

    fn summarize(
        &self,
        results: Vec<(Ticker, TickerOutcome)>,
        scan_id: Option<i64>,
        trigger: ScanTrigger,
        as_of: NaiveDate,
    ) -> ScanSummary {
        let mut summary = ScanSummary {
            scan_id,
            trigger,
            as_of,
            system: self.config.system,
            tickers_scanned: results.len(),
            evaluated: 0,
            skipped: Vec::new(),
            fetch_failures: Vec::new(),
            trend_filtered: 0,
            buy_signals: Vec::new(),
            sell_signals: Vec::new(),
            execution_time_ms: 0,
        };

        for (ticker, outcome) in results {
            match outcome {
                TickerOutcome::Evaluated(report) => {
                    summary.evaluated += 1;
                    let primary = report.primary(&self.config);
                    if primary.trend_filtered {
                        summary.trend_filtered += 1;
                    }
                    if let Some(hit) = self.hit_for(&report, primary) {
                        match hit.signal_type {
                            SignalType::Buy => summary.buy_signals.push(hit),
                            SignalType::Sell => summary.sell_signals.push(hit),
                        }
                    }
                }
                TickerOutcome::Skipped(reason) => summary.skipped.push((ticker, reason)),
                TickerOutcome::FetchFailed(reason) => summary.fetch_failures.push((ticker, reason)),
            }
        }
        summary
    }

    fn hit_for(&self, report: &SignalReport, outcome: &SignalOutcome) -> Option<SignalHit> {
        let stored = StoredSignal::from_outcome(&report.ticker, report.date, outcome)?;
        let sizing = self.account.as_ref().and_then(|account| {
            let input = PositionSizingInput::new(account.balance, stored.entry_price, stored.stop_loss_price)
                .with_risk_percent(account.risk_percent);
            size_position(&input)
                .map_err(|e| warn!(ticker = %report.ticker, "Could not size signal: {}", e))
                .ok()
        });
        Some(SignalHit {
            ticker: stored.ticker,
            date: stored.entry_date,
            system: stored.system,
            signal_type: stored.signal_type,
            entry_price: stored.entry_price,
            stop_loss: stored.stop_loss_price,
            reason: stored.notes,
            sizing,
        })
    }
}
