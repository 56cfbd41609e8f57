//! Signal command implementation

use anyhow::{Context, Result};
use tracing::info;
use turtle_signals::cache::PriceCache;
use turtle_signals::data::{build_source, PriceSource};
use turtle_signals::{generate_signals, Ticker, TurtleSystem};

use super::{load_config, parse_as_of};

pub fn run(
    ticker: String,
    config_path: String,
    system_override: Option<String>,
    no_trend_filter: bool,
    as_of: Option<String>,
) -> Result<()> {
    let mut config = load_config(&config_path)?;

    if let Some(system) = system_override {
        let system: TurtleSystem = system.parse().map_err(anyhow::Error::msg)?;
        info!("Overriding system to: {}", system);
        config.scan.system = system;
    }
    if no_trend_filter {
        info!("Trend filter disabled");
        config.scan.use_trend_filter = false;
    }
    config.validate()?;

    let ticker = Ticker::new(ticker);
    let as_of = parse_as_of(as_of)?;
    let source = build_source(&config.data)?;
    info!("Fetching {} as of {} via {}", ticker, as_of, source.source_names().join(" -> "));

    let mut cache = PriceCache::new(std::time::Duration::from_secs(config.data.cache_ttl_secs));
    let bars = cache.get_or_fetch(&source, &ticker, as_of, config.data.history_days)?;
    info!("Loaded {} bars for {} from {}", bars.len(), ticker, source.name());

    let report = generate_signals(&ticker, &bars, &config.scan)
        .with_context(|| format!("Failed to generate signals for {}", ticker))?;
    let primary = report.primary(&config.scan);
    info!(
        "{} {}: buy={} sell={} ({})",
        ticker,
        primary.system,
        primary.buy_signal(),
        primary.sell_signal(),
        primary.reason
    );

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
