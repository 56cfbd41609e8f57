//! Price history cache
//!
//! An explicit `(ticker, as_of, days)` keyed store with a time-to-live, owned
//! by the scanner and passed in where needed. The signal engine never sees it.

use anyhow::Result;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::data::PriceSource;
use crate::types::{Bar, Ticker};

/// Default time-to-live for cached histories
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

type CacheKey = (Ticker, NaiveDate, u32);

#[derive(Debug, Clone)]
struct CacheEntry {
    bars: Arc<[Bar]>,
    fetched_at: Instant,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

#[derive(Debug)]
pub struct PriceCache {
    ttl: Duration,
    entries: HashMap<CacheKey, CacheEntry>,
    hits: u64,
    misses: u64,
}

impl Default for PriceCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL)
    }
}

impl PriceCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
            hits: 0,
            misses: 0,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fresh entry for a `days`-long lookback as seen at instant `now`
    pub fn get_at(&mut self, ticker: &Ticker, as_of: NaiveDate, days: u32, now: Instant) -> Option<Arc<[Bar]>> {
        let key = (ticker.clone(), as_of, days);
        let lookup = self.entries.get(&key).map(|entry| {
            let fresh = now.saturating_duration_since(entry.fetched_at) < self.ttl;
            (fresh, Arc::clone(&entry.bars))
        });
        match lookup {
            Some((true, bars)) => {
                self.hits += 1;
                Some(bars)
            }
            Some((false, _)) => {
                self.entries.remove(&key);
                self.misses += 1;
                None
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn get(&mut self, ticker: &Ticker, as_of: NaiveDate, days: u32) -> Option<Arc<[Bar]>> {
        self.get_at(ticker, as_of, days, Instant::now())
    }

    pub fn insert_at(
        &mut self,
        ticker: &Ticker,
        as_of: NaiveDate,
        days: u32,
        bars: Vec<Bar>,
        fetched_at: Instant,
    ) -> Arc<[Bar]> {
        let bars: Arc<[Bar]> = bars.into();
        self.entries.insert(
            (ticker.clone(), as_of, days),
            CacheEntry {
                bars: Arc::clone(&bars),
                fetched_at,
            },
        );
        bars
    }

    pub fn insert(&mut self, ticker: &Ticker, as_of: NaiveDate, days: u32, bars: Vec<Bar>) -> Arc<[Bar]> {
        self.insert_at(ticker, as_of, days, bars, Instant::now())
    }

    /// Cached history, or fetch from `source` and remember it
    pub fn get_or_fetch<S: PriceSource + ?Sized>(
        &mut self,
        source: &S,
        ticker: &Ticker,
        as_of: NaiveDate,
        days: u32,
    ) -> Result<Arc<[Bar]>> {
        if let Some(bars) = self.get(ticker, as_of, days) {
            debug!(%ticker, %as_of, days, "Cache hit");
            return Ok(bars);
        }
        let bars = source.fetch_history(ticker, as_of, days)?;
        Ok(self.insert(ticker, as_of, days, bars))
    }

    /// Drop entries expired as of `now`
    pub fn purge_expired_at(&mut self, now: Instant) -> usize {
        let ttl = self.ttl;
        let before = self.entries.len();
        self.entries
            .retain(|_, e| now.saturating_duration_since(e.fetched_at) < ttl);
        before - self.entries.len()
    }

    pub fn purge_expired(&mut self) -> usize {
        self.purge_expired_at(Instant::now())
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            hits: self.hits,
            misses: self.misses,
        }
    }
}
