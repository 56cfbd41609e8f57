//! CSV bar files: `date,open,high,low,close,volume` with ISO dates
//!
//! Columns are located by header name, so vendor exports with extra columns
//! (Yahoo's `Adj Close`) load unchanged.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::{filter_bars_by_date, lookback_start, normalize_bars, NoData, PriceSource};
use crate::types::{Bar, Ticker};

#[derive(Debug, Clone, Copy)]
struct Columns {
    date: usize,
    open: usize,
    high: usize,
    low: usize,
    close: usize,
    volume: Option<usize>,
}

impl Columns {
    fn from_headers(headers: &csv::StringRecord) -> Self {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
        };
        Columns {
            date: find("date").unwrap_or(0),
            open: find("open").unwrap_or(1),
            high: find("high").unwrap_or(2),
            low: find("low").unwrap_or(3),
            close: find("close").unwrap_or(4),
            volume: find("volume").or(if headers.len() > 5 { Some(5) } else { None }),
        }
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    // tolerate timestamps by reading the calendar date prefix
    let day = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

fn parse_row(record: &csv::StringRecord, cols: &Columns) -> Option<Bar> {
    let price = |idx: usize| record.get(idx)?.trim().parse::<f64>().ok();
    let volume = cols
        .volume
        .and_then(|idx| record.get(idx))
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite() && *v >= 0.0)
        .map(|v| v.round() as u64)
        .unwrap_or(0);

    Some(Bar::new_unchecked(
        parse_date(record.get(cols.date)?)?,
        price(cols.open)?,
        price(cols.high)?,
        price(cols.low)?,
        price(cols.close)?,
        volume,
    ))
}

/// Parse bars from CSV text, skipping rows that cannot be parsed
///
/// `origin` names the input in log messages. The result is normalized.
pub fn parse_bars<R: Read>(reader: R, origin: &str) -> Result<Vec<Bar>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = reader
        .headers()
        .with_context(|| format!("Failed to read CSV header from {}", origin))?
        .clone();
    let cols = Columns::from_headers(&headers);

    let mut bars = Vec::new();
    let mut skipped = 0usize;

    for (row_idx, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("Failed to read row {} of {}", row_idx + 1, origin))?;
        match parse_row(&record, &cols) {
            Some(bar) => bars.push(bar),
            None => {
                skipped += 1;
                debug!(
                    "Skipping unparseable row {} in {}: {:?}",
                    row_idx + 2, // 1-indexed plus header
                    origin,
                    record
                );
            }
        }
    }

    if skipped > 0 {
        warn!(
            "Skipped {} unparseable rows out of {} in {}",
            skipped,
            skipped + bars.len(),
            origin
        );
    }

    Ok(normalize_bars(bars))
}

/// Load bars from a CSV file
pub fn load_csv(path: impl AsRef<Path>) -> Result<Vec<Bar>> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("Failed to open CSV file: {}", path.display()))?;
    parse_bars(file, &path.display().to_string())
}

/// Write bars in the canonical column layout
pub fn write_csv(path: impl AsRef<Path>, bars: &[Bar]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create CSV file: {}", path.display()))?;
    writer.write_record(["date", "open", "high", "low", "close", "volume"])?;
    for bar in bars {
        writer.write_record(&[
            bar.date.format("%Y-%m-%d").to_string(),
            bar.open.to_string(),
            bar.high.to_string(),
            bar.low.to_string(),
            bar.close.to_string(),
            bar.volume.to_string(),
        ])?;
    }
    writer.flush().context("Failed to flush CSV writer")?;
    Ok(())
}

/// Reads `{dir}/{TICKER}.csv`
#[derive(Debug, Clone)]
pub struct CsvDirSource {
    dir: PathBuf,
}

impl CsvDirSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, ticker: &Ticker) -> PathBuf {
        self.dir.join(format!("{}.csv", ticker))
    }
}

impl PriceSource for CsvDirSource {
    fn name(&self) -> &str {
        "csv"
    }

    fn fetch_history(&self, ticker: &Ticker, as_of: NaiveDate, days: u32) -> Result<Vec<Bar>> {
        let path = self.path_for(ticker);
        if !path.exists() {
            return Err(NoData::new(self.name(), ticker, format!("no file at {}", path.display())).into());
        }
        let bars = load_csv(&path)?;
        Ok(filter_bars_by_date(bars, lookback_start(as_of, days), as_of))
    }
}
