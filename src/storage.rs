// Signal Store
// SQLite persistence of fired signals and scan history, with JSON export
//
// One row per fired signal, linked to the scan that produced it, plus one
// scan_history row per scan run tracking status and counts.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::signals::{Signal, SignalOutcome};
use crate::types::{Ticker, TurtleSystem};

// =============================================================================
// Data Models
// =============================================================================

macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl FromStr for $name {
            type Err = anyhow::Error;

            fn from_str(s: &str) -> Result<Self> {
                match s.trim().to_lowercase().as_str() {
                    $($text => Ok($name::$variant),)+
                    other => Err(anyhow!("Unknown {}: {}", stringify!($name), other)),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanTrigger {
    Scheduled,
    #[default]
    Manual,
}

text_enum!(ScanTrigger { Scheduled => "scheduled", Manual => "manual" });

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    InProgress,
    Completed,
    Failed,
}

text_enum!(ScanStatus { InProgress => "in_progress", Completed => "completed", Failed => "failed" });

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalType {
    Buy,
    Sell,
}

text_enum!(SignalType { Buy => "buy", Sell => "sell" });

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalStatus {
    #[default]
    Active,
    Triggered,
    Expired,
}

text_enum!(SignalStatus { Active => "active", Triggered => "triggered", Expired => "expired" });

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSignal {
    pub id: Option<i64>,
    pub ticker: Ticker,
    pub signal_type: SignalType,
    pub system: TurtleSystem,
    pub entry_price: f64,
    pub stop_loss_price: f64,
    pub entry_date: NaiveDate,
    pub scan_id: Option<i64>,
    pub signal_status: SignalStatus,
    pub notes: String,
}

impl StoredSignal {
    /// Row for a fired outcome; `None` for a flat one
    pub fn from_outcome(ticker: &Ticker, entry_date: NaiveDate, outcome: &SignalOutcome) -> Option<Self> {
        let (signal_type, entry_price, stop_loss) = match outcome.signal {
            Signal::Buy {
                entry_price,
                stop_loss,
            } => (SignalType::Buy, entry_price, stop_loss),
            Signal::Sell {
                entry_price,
                stop_loss,
            } => (SignalType::Sell, entry_price, stop_loss),
            Signal::Flat => return None,
        };
        Some(StoredSignal {
            id: None,
            ticker: ticker.clone(),
            signal_type,
            system: outcome.system,
            entry_price,
            stop_loss_price: stop_loss,
            entry_date,
            scan_id: None,
            signal_status: SignalStatus::Active,
            notes: outcome.reason.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRecord {
    pub id: i64,
    pub scan_timestamp: DateTime<Utc>,
    pub scan_trigger: ScanTrigger,
    pub scan_status: ScanStatus,
    pub tickers_scanned: u32,
    pub signals_generated: u32,
    pub buy_signals: u32,
    pub sell_signals: u32,
    pub error_message: Option<String>,
    pub execution_time_ms: Option<u64>,
}

/// Counts written when a scan completes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanCounts {
    pub tickers_scanned: u32,
    pub buy_signals: u32,
    pub sell_signals: u32,
}

impl ScanCounts {
    pub fn signals_generated(&self) -> u32 {
        self.buy_signals + self.sell_signals
    }
}

#[derive(Debug, Clone, Default)]
pub struct SignalFilter {
    pub ticker: Option<Ticker>,
    pub scan_id: Option<i64>,
    pub signal_type: Option<SignalType>,
    pub status: Option<SignalStatus>,
    pub limit: Option<u32>,
}

impl SignalFilter {
    pub fn for_scan(scan_id: i64) -> Self {
        Self {
            scan_id: Some(scan_id),
            ..Self::default()
        }
    }

    pub fn with_ticker(mut self, ticker: Ticker) -> Self {
        self.ticker = Some(ticker);
        self
    }

    pub fn with_signal_type(mut self, signal_type: SignalType) -> Self {
        self.signal_type = Some(signal_type);
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[derive(Debug, Serialize)]
struct ExportDocument {
    exported_at: DateTime<Utc>,
    scans: Vec<ScanRecord>,
    signals: Vec<StoredSignal>,
}

// =============================================================================
// Store Implementation
// =============================================================================

const SIGNAL_COLUMNS: &str = "id, ticker, signal_type, system, entry_price, stop_loss_price, \
                              entry_date, scan_id, signal_status, notes";

const SCAN_COLUMNS: &str = "id, scan_timestamp, scan_trigger, scan_status, tickers_scanned, \
                            signals_generated, buy_signals, sell_signals, error_message, \
                            execution_time_ms";

pub struct SqliteSignalStore {
    conn: Arc<Mutex<Connection>>,
    json_backup_path: Option<PathBuf>,
}

impl SqliteSignalStore {
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();

        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open database: {}", db_path.display()))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        let store = Self::from_connection(conn)?;
        info!("Signal store opened at {}", db_path.display());
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            json_backup_path: None,
        };
        store.create_tables()?;
        Ok(store)
    }

    /// Export a JSON snapshot after every completed or failed scan
    pub fn with_json_backup(mut self, path: impl Into<PathBuf>) -> Self {
        self.json_backup_path = Some(path.into());
        self
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("Signal store connection lock poisoned"))
    }

    fn create_tables(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS scan_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                scan_timestamp TEXT NOT NULL,
                scan_trigger TEXT NOT NULL,
                scan_status TEXT NOT NULL DEFAULT 'in_progress',
                tickers_scanned INTEGER NOT NULL DEFAULT 0,
                signals_generated INTEGER NOT NULL DEFAULT 0,
                buy_signals INTEGER NOT NULL DEFAULT 0,
                sell_signals INTEGER NOT NULL DEFAULT 0,
                error_message TEXT,
                execution_time_ms INTEGER,
                created_at TEXT DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS signals (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                ticker TEXT NOT NULL,
                signal_type TEXT NOT NULL,
                system TEXT NOT NULL,
                entry_price REAL NOT NULL,
                stop_loss_price REAL NOT NULL,
                entry_date TEXT NOT NULL,
                scan_id INTEGER REFERENCES scan_history(id),
                signal_status TEXT NOT NULL DEFAULT 'active',
                notes TEXT,
                created_at TEXT DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_signals_ticker ON signals(ticker)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_signals_scan ON signals(scan_id)",
            [],
        )?;

        debug!("Database schema created/verified");
        Ok(())
    }

    // =========================================================================
    // Scan history
    // =========================================================================

    /// Record a scan as in progress and return its id
    pub fn start_scan(&self, trigger: ScanTrigger) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO scan_history (scan_timestamp, scan_trigger, scan_status)
             VALUES (?1, ?2, ?3)",
            params![
                Utc::now().to_rfc3339(),
                trigger.as_str(),
                ScanStatus::InProgress.as_str()
            ],
        )?;
        let id = conn.last_insert_rowid();
        debug!(scan_id = id, %trigger, "Scan started");
        Ok(id)
    }

    pub fn complete_scan(&self, scan_id: i64, counts: &ScanCounts, execution_time_ms: u64) -> Result<()> {
        {
            let conn = self.conn()?;
            let updated = conn.execute(
                "UPDATE scan_history
                 SET scan_status = ?1, tickers_scanned = ?2, signals_generated = ?3,
                     buy_signals = ?4, sell_signals = ?5, execution_time_ms = ?6
                 WHERE id = ?7",
                params![
                    ScanStatus::Completed.as_str(),
                    counts.tickers_scanned,
                    counts.signals_generated(),
                    counts.buy_signals,
                    counts.sell_signals,
                    execution_time_ms as i64,
                    scan_id
                ],
            )?;
            if updated == 0 {
                anyhow::bail!("Scan {} not found", scan_id);
            }
        }
        self.auto_backup();
        Ok(())
    }

    pub fn fail_scan(&self, scan_id: i64, error_message: &str, execution_time_ms: u64) -> Result<()> {
        {
            let conn = self.conn()?;
            conn.execute(
                "UPDATE scan_history
                 SET scan_status = ?1, error_message = ?2, execution_time_ms = ?3
                 WHERE id = ?4",
                params![
                    ScanStatus::Failed.as_str(),
                    error_message,
                    execution_time_ms as i64,
                    scan_id
                ],
            )?;
        }
        self.auto_backup();
        Ok(())
    }

    pub fn get_scan(&self, scan_id: i64) -> Result<Option<ScanRecord>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {} FROM scan_history WHERE id = ?1", SCAN_COLUMNS);
        let raw = conn
            .query_row(&sql, params![scan_id], RawScan::from_row)
            .optional()?;
        raw.map(RawScan::into_record).transpose()
    }

    /// Most recent scans first
    pub fn recent_scans(&self, limit: u32) -> Result<Vec<ScanRecord>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM scan_history ORDER BY id DESC LIMIT ?1",
            SCAN_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let raws = stmt
            .query_map(params![limit], RawScan::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        raws.into_iter().map(RawScan::into_record).collect()
    }

    // =========================================================================
    // Signals
    // =========================================================================

    pub fn save_signal(&self, signal: &StoredSignal) -> Result<i64> {
        let conn = self.conn()?;
        insert_signal(&conn, signal, signal.scan_id)
    }

    /// Insert all of a scan's signals in one transaction
    pub fn save_signals(&self, scan_id: i64, signals: &[StoredSignal]) -> Result<Vec<i64>> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let ids = signals
            .iter()
            .map(|s| insert_signal(&tx, s, Some(scan_id)))
            .collect::<Result<Vec<_>>>()?;
        tx.commit().context("Failed to commit signals")?;
        debug!(scan_id, count = ids.len(), "Signals saved");
        Ok(ids)
    }

    pub fn update_signal_status(&self, signal_id: i64, status: SignalStatus) -> Result<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE signals SET signal_status = ?1 WHERE id = ?2",
            params![status.as_str(), signal_id],
        )?;
        if updated == 0 {
            anyhow::bail!("Signal {} not found", signal_id);
        }
        Ok(())
    }

    pub fn load_signals(&self, filter: &SignalFilter) -> Result<Vec<StoredSignal>> {
        let conn = self.conn()?;

        let mut clauses = Vec::new();
        let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        if let Some(ticker) = &filter.ticker {
            values.push(Box::new(ticker.as_str().to_string()));
            clauses.push(format!("ticker = ?{}", values.len()));
        }
        if let Some(scan_id) = filter.scan_id {
            values.push(Box::new(scan_id));
            clauses.push(format!("scan_id = ?{}", values.len()));
        }
        if let Some(signal_type) = filter.signal_type {
            values.push(Box::new(signal_type.as_str()));
            clauses.push(format!("signal_type = ?{}", values.len()));
        }
        if let Some(status) = filter.status {
            values.push(Box::new(status.as_str()));
            clauses.push(format!("signal_status = ?{}", values.len()));
        }

        let mut sql = format!("SELECT {} FROM signals", SIGNAL_COLUMNS);
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY id");
        if let Some(limit) = filter.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        let mut stmt = conn.prepare(&sql)?;
        let raws = stmt
            .query_map(
                rusqlite::params_from_iter(values.iter().map(|v| v.as_ref())),
                RawSignal::from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        let signals = raws
            .into_iter()
            .map(RawSignal::into_signal)
            .collect::<Result<Vec<_>>>()?;

        debug!("Loaded {} signals (filter: {:?})", signals.len(), filter);
        Ok(signals)
    }

    // =========================================================================
    // JSON export
    // =========================================================================

    /// Write every scan and signal to `path` as pretty JSON
    pub fn export_json_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let document = ExportDocument {
            exported_at: Utc::now(),
            scans: self.recent_scans(u32::MAX)?,
            signals: self.load_signals(&SignalFilter::default())?,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&document)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write JSON export: {}", path.display()))?;
        debug!("Exported {} signals to {}", document.signals.len(), path.display());
        Ok(())
    }

    /// Refresh the JSON backup; the database row is the record of truth, so a
    /// failed export is logged and never undoes a status change
    fn auto_backup(&self) {
        if let Some(path) = &self.json_backup_path {
            if let Err(e) = self.export_json_to(path) {
                warn!("JSON backup to {} failed: {:#}", path.display(), e);
            }
        }
    }
}

fn insert_signal(conn: &Connection, signal: &StoredSignal, scan_id: Option<i64>) -> Result<i64> {
    conn.execute(
        "INSERT INTO signals
         (ticker, signal_type, system, entry_price, stop_loss_price, entry_date,
          scan_id, signal_status, notes)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            signal.ticker.as_str(),
            signal.signal_type.as_str(),
            signal.system.as_str(),
            signal.entry_price,
            signal.stop_loss_price,
            signal.entry_date.format("%Y-%m-%d").to_string(),
            scan_id,
            signal.signal_status.as_str(),
            signal.notes,
        ],
    )
    .with_context(|| format!("Failed to save {} signal for {}", signal.signal_type, signal.ticker))?;
    Ok(conn.last_insert_rowid())
}

// Rows are read as plain SQL values first, then parsed into domain types so
// a malformed enum column surfaces as an error with context.

struct RawSignal {
    id: i64,
    ticker: String,
    signal_type: String,
    system: String,
    entry_price: f64,
    stop_loss_price: f64,
    entry_date: String,
    scan_id: Option<i64>,
    signal_status: String,
    notes: Option<String>,
}

impl RawSignal {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(RawSignal {
            id: row.get(0)?,
            ticker: row.get(1)?,
            signal_type: row.get(2)?,
            system: row.get(3)?,
            entry_price: row.get(4)?,
            stop_loss_price: row.get(5)?,
            entry_date: row.get(6)?,
            scan_id: row.get(7)?,
            signal_status: row.get(8)?,
            notes: row.get(9)?,
        })
    }

    fn into_signal(self) -> Result<StoredSignal> {
        Ok(StoredSignal {
            id: Some(self.id),
            ticker: Ticker::new(&self.ticker),
            signal_type: self.signal_type.parse()?,
            system: self
                .system
                .parse()
                .map_err(|e| anyhow!("Signal {}: {}", self.id, e))?,
            entry_price: self.entry_price,
            stop_loss_price: self.stop_loss_price,
            entry_date: NaiveDate::parse_from_str(&self.entry_date, "%Y-%m-%d")
                .with_context(|| format!("Signal {} has invalid entry_date", self.id))?,
            scan_id: self.scan_id,
            signal_status: self.signal_status.parse()?,
            notes: self.notes.unwrap_or_default(),
        })
    }
}

struct RawScan {
    id: i64,
    scan_timestamp: String,
    scan_trigger: String,
    scan_status: String,
    tickers_scanned: u32,
    signals_generated: u32,
    buy_signals: u32,
    sell_signals: u32,
    error_message: Option<String>,
    execution_time_ms: Option<i64>,
}

impl RawScan {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(RawScan {
            id: row.get(0)?,
            scan_timestamp: row.get(1)?,
            scan_trigger: row.get(2)?,
            scan_status: row.get(3)?,
            tickers_scanned: row.get(4)?,
            signals_generated: row.get(5)?,
            buy_signals: row.get(6)?,
            sell_signals: row.get(7)?,
            error_message: row.get(8)?,
            execution_time_ms: row.get(9)?,
        })
    }

    fn into_record(self) -> Result<ScanRecord> {
        Ok(ScanRecord {
            id: self.id,
            scan_timestamp: DateTime::parse_from_rfc3339(&self.scan_timestamp)
                .with_context(|| format!("Scan {} has invalid timestamp", self.id))?
                .with_timezone(&Utc),
            scan_trigger: self.scan_trigger.parse()?,
            scan_status: self.scan_status.parse()?,
            tickers_scanned: self.tickers_scanned,
            signals_generated: self.signals_generated,
            buy_signals: self.buy_signals,
            sell_signals: self.sell_signals,
            error_message: self.error_message,
            execution_time_ms: self.execution_time_ms.map(|ms| ms.max(0) as u64),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signal(ticker: &str, signal_type: SignalType) -> StoredSignal {
        StoredSignal {
            id: None,
            ticker: Ticker::new(ticker),
            signal_type,
            system: TurtleSystem::System1,
            entry_price: 104.0,
            stop_loss_price: 100.0,
            entry_date: NaiveDate::from_ymd_opt(2025, 2, 14).unwrap(),
            scan_id: None,
            signal_status: SignalStatus::Active,
            notes: "Close (104.00) > 20-day high (103.50)".to_string(),
        }
    }

    #[test]
    fn test_scan_lifecycle() {
        let store = SqliteSignalStore::open_in_memory().unwrap();
        let scan_id = store.start_scan(ScanTrigger::Scheduled).unwrap();

        let started = store.get_scan(scan_id).unwrap().unwrap();
        assert_eq!(started.scan_status, ScanStatus::InProgress);
        assert_eq!(started.scan_trigger, ScanTrigger::Scheduled);
        assert_eq!(started.execution_time_ms, None);

        let counts = ScanCounts {
            tickers_scanned: 12,
            buy_signals: 2,
            sell_signals: 1,
        };
        store.complete_scan(scan_id, &counts, 1500).unwrap();
        let done = store.get_scan(scan_id).unwrap().unwrap();
        assert_eq!(done.scan_status, ScanStatus::Completed);
        assert_eq!(done.signals_generated, 3);
        assert_eq!(done.tickers_scanned, 12);
        assert_eq!(done.execution_time_ms, Some(1500));

        assert!(store.get_scan(999).unwrap().is_none());
        assert!(store.complete_scan(999, &counts, 1).is_err());
    }

    #[test]
    fn test_failed_scan_keeps_message() {
        let store = SqliteSignalStore::open_in_memory().unwrap();
        let scan_id = store.start_scan(ScanTrigger::Manual).unwrap();
        store.fail_scan(scan_id, "All price sources failed", 20).unwrap();
        let record = store.get_scan(scan_id).unwrap().unwrap();
        assert_eq!(record.scan_status, ScanStatus::Failed);
        assert_eq!(record.error_message.as_deref(), Some("All price sources failed"));
    }

    #[test]
    fn test_save_and_filter_signals() {
        let store = SqliteSignalStore::open_in_memory().unwrap();
        let scan_a = store.start_scan(ScanTrigger::Manual).unwrap();
        let scan_b = store.start_scan(ScanTrigger::Manual).unwrap();

        store
            .save_signals(scan_a, &[signal("AAPL", SignalType::Buy), signal("MSFT", SignalType::Sell)])
            .unwrap();
        store.save_signals(scan_b, &[signal("AAPL", SignalType::Sell)]).unwrap();

        let all = store.load_signals(&SignalFilter::default()).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].scan_id, Some(scan_a));
        assert_eq!(all[0].notes, "Close (104.00) > 20-day high (103.50)");

        let for_a = store.load_signals(&SignalFilter::for_scan(scan_a)).unwrap();
        assert_eq!(for_a.len(), 2);

        let aapl_sells = store
            .load_signals(
                &SignalFilter::default()
                    .with_ticker(Ticker::new("AAPL"))
                    .with_signal_type(SignalType::Sell),
            )
            .unwrap();
        assert_eq!(aapl_sells.len(), 1);
        assert_eq!(aapl_sells[0].scan_id, Some(scan_b));

        let id = aapl_sells[0].id.unwrap();
        store.update_signal_status(id, SignalStatus::Expired).unwrap();
        let expired = store
            .load_signals(&SignalFilter {
                status: Some(SignalStatus::Expired),
                ..SignalFilter::default()
            })
            .unwrap();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].id, Some(id));
    }

    #[test]
    fn test_file_store_and_json_backup() {
        let dir = tempfile::tempdir().unwrap();
        let backup = dir.path().join("backup").join("signals.json");
        let store = SqliteSignalStore::open(dir.path().join("db").join("signals.db"))
            .unwrap()
            .with_json_backup(&backup);

        let scan_id = store.start_scan(ScanTrigger::Manual).unwrap();
        store.save_signals(scan_id, &[signal("IWM", SignalType::Buy)]).unwrap();
        store
            .complete_scan(
                scan_id,
                &ScanCounts {
                    tickers_scanned: 1,
                    buy_signals: 1,
                    sell_signals: 0,
                },
                5,
            )
            .unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&backup).unwrap()).unwrap();
        assert_eq!(json["scans"][0]["scan_status"], "completed");
        assert_eq!(json["signals"][0]["ticker"], "IWM");
        assert_eq!(json["signals"][0]["signal_type"], "buy");
    }

    #[test]
    fn test_backup_failure_keeps_scan_completed() {
        let dir = tempfile::tempdir().unwrap();
        // a directory cannot be written as a file
        let store = SqliteSignalStore::open_in_memory()
            .unwrap()
            .with_json_backup(dir.path());

        let scan_id = store.start_scan(ScanTrigger::Manual).unwrap();
        store
            .complete_scan(
                scan_id,
                &ScanCounts {
                    tickers_scanned: 2,
                    buy_signals: 0,
                    sell_signals: 0,
                },
                3,
            )
            .unwrap();
        let record = store.get_scan(scan_id).unwrap().unwrap();
        assert_eq!(record.scan_status, ScanStatus::Completed);
        assert!(store.export_json_to(dir.path()).is_err());
    }

    #[test]
    fn test_text_enums() {
        assert_eq!("in_progress".parse::<ScanStatus>().unwrap(), ScanStatus::InProgress);
        assert_eq!("Scheduled".parse::<ScanTrigger>().unwrap(), ScanTrigger::Scheduled);
        assert!("later".parse::<ScanTrigger>().is_err());
        assert_eq!(SignalType::Sell.to_string(), "sell");
    }
}
