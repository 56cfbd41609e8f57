//! Ordered fallback across price sources

use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use std::sync::Mutex;
use tracing::{debug, info, warn};

use super::{NoData, PriceSource};
use crate::common::{execute_with_retry, CircuitBreaker, CircuitBreakerConfig, RetryPolicy};
use crate::types::{Bar, Ticker};

struct GuardedSource {
    source: Box<dyn PriceSource>,
    breaker: Mutex<CircuitBreaker>,
}

/// Tries each source in order until one returns a non-empty history
///
/// Each source has its own circuit breaker, so a vendor that keeps failing is
/// skipped for the rest of its cooldown instead of costing a retry cycle per
/// ticker.
pub struct FallbackSource {
    sources: Vec<GuardedSource>,
    retry: RetryPolicy,
}

impl FallbackSource {
    pub fn new(sources: Vec<Box<dyn PriceSource>>) -> Self {
        Self::with_breaker_config(sources, CircuitBreakerConfig::default())
    }

    pub fn with_breaker_config(sources: Vec<Box<dyn PriceSource>>, config: CircuitBreakerConfig) -> Self {
        let sources = sources
            .into_iter()
            .map(|source| {
                let breaker = CircuitBreaker::new(source.name(), config.clone());
                GuardedSource {
                    source,
                    breaker: Mutex::new(breaker),
                }
            })
            .collect();
        Self {
            sources,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    pub fn source_names(&self) -> Vec<String> {
        self.sources
            .iter()
            .map(|g| g.source.name().to_string())
            .collect()
    }
}

impl PriceSource for FallbackSource {
    fn name(&self) -> &str {
        "fallback"
    }

    fn fetch_history(&self, ticker: &Ticker, as_of: NaiveDate, days: u32) -> Result<Vec<Bar>> {
        let mut failures = Vec::new();

        for guarded in &self.sources {
            let name = guarded.source.name();
            let mut breaker = guarded
                .breaker
                .lock()
                .map_err(|_| anyhow!("Circuit breaker lock poisoned for {}", name))?;

            // A source with nothing for this ticker answered fine; it is neither
            // retried nor held against its breaker
            let result = execute_with_retry(&self.retry, &mut breaker, || {
                match guarded.source.fetch_history(ticker, as_of, days) {
                    Ok(bars) if bars.is_empty() => Ok(None),
                    Ok(bars) => Ok(Some(bars)),
                    Err(e) if NoData::is_no_data(&e) => {
                        debug!(%ticker, source = name, "{:#}", e);
                        Ok(None)
                    }
                    Err(e) => Err(e),
                }
            });

            match result {
                Ok(Some(bars)) => {
                    debug!(%ticker, source = name, bars = bars.len(), "Fetched history");
                    if !failures.is_empty() {
                        info!(%ticker, source = name, "Fetched history after fallback");
                    }
                    return Ok(bars);
                }
                Ok(None) => failures.push(format!("{}: no data", name)),
                Err(e) => {
                    warn!(%ticker, source = name, "Source failed: {:#}", e);
                    failures.push(format!("{}: {:#}", name, e));
                }
            }
        }

        Err(anyhow!(
            "All price sources failed for {}: [{}]",
            ticker,
            failures.join("; ")
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::CircuitState;
    use crate::data::{write_csv, CsvDirSource};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    struct FailingSource {
        calls: Arc<AtomicUsize>,
    }

    impl PriceSource for FailingSource {
        fn name(&self) -> &str {
            "failing"
        }

        fn fetch_history(&self, _: &Ticker, _: NaiveDate, _: u32) -> Result<Vec<Bar>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(anyhow!("connection refused"))
        }
    }

    struct FixedSource(Vec<Bar>);

    impl PriceSource for FixedSource {
        fn name(&self) -> &str {
            "fixed"
        }

        fn fetch_history(&self, _: &Ticker, _: NaiveDate, _: u32) -> Result<Vec<Bar>> {
            Ok(self.0.clone())
        }
    }

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 2).unwrap()
    }

    fn no_wait() -> RetryPolicy {
        RetryPolicy::default()
            .with_max_retries(0)
            .with_base_delay(Duration::from_millis(1))
    }

    #[test]
    fn test_falls_back_to_next_source() {
        let calls = Arc::new(AtomicUsize::new(0));
        let bar = Bar::new_unchecked(as_of(), 1.0, 1.0, 1.0, 1.0, 0);
        let chain = FallbackSource::new(vec![
            Box::new(FailingSource { calls: calls.clone() }),
            Box::new(FixedSource(vec![bar.clone()])),
        ])
        .with_retry_policy(no_wait());

        let bars = chain.fetch_history(&Ticker::new("X"), as_of(), 10).unwrap();
        assert_eq!(bars, vec![bar]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_empty_history_falls_through() {
        let chain = FallbackSource::new(vec![Box::new(FixedSource(Vec::new()))]).with_retry_policy(no_wait());
        let err = chain.fetch_history(&Ticker::new("X"), as_of(), 10).unwrap_err();
        assert!(err.to_string().contains("All price sources failed for X"));
        assert!(err.to_string().contains("fixed: no data"));
    }

    #[test]
    fn test_missing_csv_files_leave_breaker_closed() {
        let dir = tempfile::tempdir().unwrap();
        let csv = CsvDirSource::new(dir.path());
        let bars: Vec<Bar> = (0..5)
            .map(|i| Bar::new_unchecked(as_of() - chrono::Duration::days(4 - i), 10.0, 11.0, 9.0, 10.5, 1))
            .collect();
        write_csv(csv.path_for(&Ticker::new("HAVE")), &bars).unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let config = CircuitBreakerConfig::default().with_cooldown(Duration::from_secs(600));
        let chain = FallbackSource::with_breaker_config(
            vec![Box::new(csv), Box::new(FailingSource { calls: calls.clone() })],
            config,
        )
        .with_retry_policy(RetryPolicy::default().with_base_delay(Duration::from_millis(1)));

        assert_eq!(chain.fetch_history(&Ticker::new("HAVE"), as_of(), 10).unwrap().len(), 5);
        for missing in ["M1", "M2", "M3", "M4"] {
            assert!(chain.fetch_history(&Ticker::new(missing), as_of(), 10).is_err());
        }
        assert_eq!(chain.sources[0].breaker.lock().unwrap().state(), CircuitState::Closed);
        assert_eq!(chain.fetch_history(&Ticker::new("HAVE"), as_of(), 10).unwrap().len(), 5);
    }

    #[test]
    fn test_open_breaker_skips_source() {
        let calls = Arc::new(AtomicUsize::new(0));
        let config = CircuitBreakerConfig::default()
            .with_failure_threshold(1)
            .with_cooldown(Duration::from_secs(600));
        let chain = FallbackSource::with_breaker_config(
            vec![Box::new(FailingSource { calls: calls.clone() })],
            config,
        )
        .with_retry_policy(no_wait());

        assert!(chain.fetch_history(&Ticker::new("A"), as_of(), 10).is_err());
        assert!(chain.fetch_history(&Ticker::new("B"), as_of(), 10).is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let state = chain.sources[0].breaker.lock().unwrap().state();
        assert_eq!(state, CircuitState::Open);
    }
}
