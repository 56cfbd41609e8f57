//! Scan command implementation

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tracing::{debug, info};
use turtle_signals::cache::PriceCache;
use turtle_signals::data::build_source;
use turtle_signals::scan::{ScanSummary, Scanner};
use turtle_signals::storage::{ScanTrigger, SqliteSignalStore};
use turtle_signals::Ticker;

use super::{load_config, parse_as_of};

pub fn run(
    config_path: String,
    tickers_override: Option<String>,
    trigger: String,
    as_of: Option<String>,
    dry_run: bool,
) -> Result<()> {
    info!("Starting scan");
    let config = load_config(&config_path)?;
    config.validate()?;

    let tickers: Vec<Ticker> = match tickers_override {
        Some(list) => {
            info!("Overriding universe to: {}", list);
            list.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(Ticker::new)
                .collect()
        }
        None => config.tickers(),
    };
    if tickers.is_empty() {
        anyhow::bail!("No tickers to scan; set `universe` in {} or pass --tickers", config_path);
    }
    debug!("Tickers: {:?}", tickers);

    let trigger: ScanTrigger = trigger.parse()?;
    let as_of = parse_as_of(as_of)?;

    let source = build_source(&config.data)?;
    info!("Price sources: {}", source.source_names().join(" -> "));

    let pb = ProgressBar::new(tickers.len() as u64 * 2);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner} {percent:>3}%|{bar:40}| {pos}/{len} [{elapsed}<{eta}] {msg}")?
            .progress_chars("█░ "),
    );

    let cache = PriceCache::new(Duration::from_secs(config.data.cache_ttl_secs));
    let mut scanner = Scanner::new(source, cache, config.scan)
        .with_history_days(config.data.history_days)
        .with_account(config.account.clone())
        .with_progress(pb);

    let store = if dry_run {
        info!("Dry run: signals will not be persisted");
        None
    } else {
        let mut store = SqliteSignalStore::open(&config.storage.db_path)?;
        if let Some(path) = &config.storage.json_backup_path {
            store = store.with_json_backup(path);
        }
        Some(store)
    };

    let summary = scanner.scan(&tickers, as_of, trigger, store.as_ref())?;
    print_summary(&summary);
    Ok(())
}

fn print_summary(summary: &ScanSummary) {
    println!("\n{}", "=".repeat(90));
    println!("SCAN SUMMARY ({} as of {})", summary.system, summary.as_of);
    println!("{}", "=".repeat(90));
    if let Some(id) = summary.scan_id {
        println!("  Scan id:         {}", id);
    }
    println!("  Trigger:         {}", summary.trigger);
    println!("  Tickers:         {}", summary.tickers_scanned);
    println!("  Evaluated:       {}", summary.evaluated);
    println!("  Skipped:         {}", summary.skipped.len());
    println!("  Fetch failures:  {}", summary.fetch_failures.len());
    println!("  Trend filtered:  {}", summary.trend_filtered);
    println!("  Buy signals:     {}", summary.buy_signals.len());
    println!("  Sell signals:    {}", summary.sell_signals.len());
    println!("  Elapsed:         {}ms", summary.execution_time_ms);

    let hits: Vec<_> = summary.buy_signals.iter().chain(&summary.sell_signals).collect();
    if hits.is_empty() {
        println!("{}", "=".repeat(90));
        return;
    }

    println!("{}", "-".repeat(90));
    println!(
        "{:<8} {:<5} {:>10} {:>10} {:>8} {:>12}  Reason",
        "Ticker", "Side", "Entry", "Stop", "Units", "Position"
    );
    for hit in hits {
        let (units, position) = match &hit.sizing {
            Some(s) => (s.units.to_string(), format!("{:.2}", s.position_size)),
            None => ("-".to_string(), "-".to_string()),
        };
        println!(
            "{:<8} {:<5} {:>10.2} {:>10.2} {:>8} {:>12}  {}",
            hit.ticker.as_str(),
            hit.signal_type.as_str(),
            hit.entry_price,
            hit.stop_loss,
            units,
            position,
            hit.reason
        );
    }
    println!("{}", "=".repeat(90));
}
