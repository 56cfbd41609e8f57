//! Configuration management
//!
//! Two layers live here:
//! - [`ScanConfig`]: the immutable value object the signal engine consumes,
//!   validated once and carrying the per-system stop defaults.
//! - [`AppConfig`]: the pipeline configuration (universe, data sources, cache,
//!   storage, account) loaded from JSON with environment overrides.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{EngineError, EngineResult};
use crate::types::{Ticker, TurtleSystem};

/// Which bars form the breakout channel the latest close is compared with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BreakoutWindow {
    /// The N bars before the latest one (classic Turtle rule)
    #[default]
    PrecedingCurrent,
    /// The N bars ending at, and including, the latest one
    IncludingCurrent,
}

/// Signal engine configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScanConfig {
    /// System whose outcome the scan persists
    pub system: TurtleSystem,
    pub use_trend_filter: bool,
    /// Percent of equity risked per trade; informational for the engine
    pub risk_per_trade: f64,
    /// ATR multiple for stops; `None` uses each system's default
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_loss_multiplier: Option<f64>,
    pub breakout_window: BreakoutWindow,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            system: TurtleSystem::System1,
            use_trend_filter: true,
            risk_per_trade: 2.0,
            stop_loss_multiplier: None,
            breakout_window: BreakoutWindow::PrecedingCurrent,
        }
    }
}

impl ScanConfig {
    pub fn with_system(mut self, system: TurtleSystem) -> Self {
        self.system = system;
        self
    }

    pub fn with_trend_filter(mut self, enabled: bool) -> Self {
        self.use_trend_filter = enabled;
        self
    }

    pub fn with_stop_loss_multiplier(mut self, multiplier: f64) -> Self {
        self.stop_loss_multiplier = Some(multiplier);
        self
    }

    pub fn with_breakout_window(mut self, window: BreakoutWindow) -> Self {
        self.breakout_window = window;
        self
    }

    /// Stop multiple applied to `system`'s signals
    pub fn stop_multiplier_for(&self, system: TurtleSystem) -> f64 {
        self.stop_loss_multiplier
            .unwrap_or_else(|| system.default_stop_multiplier())
    }

    pub fn validate(&self) -> EngineResult<()> {
        if let Some(m) = self.stop_loss_multiplier {
            if !(m.is_finite() && m > 0.0) {
                return Err(EngineError::InvalidParameter(format!(
                    "stop loss multiplier must be positive, got {}",
                    m
                )));
            }
        }
        if !(self.risk_per_trade.is_finite() && self.risk_per_trade > 0.0 && self.risk_per_trade <= 100.0) {
            return Err(EngineError::InvalidParameter(format!(
                "risk per trade must be in (0, 100] percent, got {}",
                self.risk_per_trade
            )));
        }
        Ok(())
    }
}

/// Pipeline configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    pub universe: Vec<String>,
    pub scan: ScanConfig,
    pub data: DataConfig,
    pub storage: StorageConfig,
    pub account: AccountConfig,
}

impl AppConfig {
    /// Load configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let mut config: AppConfig =
            serde_json::from_str(&contents).context("Failed to parse config JSON")?;
        config.apply_env();
        Ok(config)
    }

    /// Load from `path` when it exists, otherwise fall back to defaults
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::from_file(path)
        } else {
            let mut config = AppConfig::default();
            config.apply_env();
            Ok(config)
        }
    }

    /// Vendor credentials come from the environment when present
    pub fn apply_env(&mut self) {
        if let Ok(key) = std::env::var("POLYGON_API_KEY") {
            if !key.trim().is_empty() {
                self.data.polygon_api_key = Some(key);
            }
        }
    }

    pub fn tickers(&self) -> Vec<Ticker> {
        self.universe.iter().map(Ticker::new).collect()
    }

    pub fn validate(&self) -> Result<()> {
        self.scan.validate().context("Invalid scan configuration")?;
        if !(self.account.balance > 0.0) {
            anyhow::bail!("account balance must be positive, got {}", self.account.balance);
        }
        if !(self.account.risk_percent > 0.0 && self.account.risk_percent <= 1.0) {
            anyhow::bail!(
                "account risk percent must be in (0, 1], got {}",
                self.account.risk_percent
            );
        }
        if self.data.sources.is_empty() {
            anyhow::bail!("at least one price source must be configured");
        }
        Ok(())
    }
}

/// Known price vendors, tried in the configured order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// `{data_dir}/{TICKER}.csv`
    Csv,
    Polygon,
    Yahoo,
    /// Deterministic generated bars, for demos and dry runs
    Synthetic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DataConfig {
    pub data_dir: String,
    /// Calendar days of history requested from vendors
    pub history_days: u32,
    pub cache_ttl_secs: u64,
    pub sources: Vec<SourceKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub polygon_api_key: Option<String>,
    pub max_retries: u32,
}

impl Default for DataConfig {
    fn default() -> Self {
        DataConfig {
            data_dir: "data".to_string(),
            // ~200 trading days need ~290 calendar days; leave headroom
            history_days: 400,
            cache_ttl_secs: 300,
            sources: vec![SourceKind::Csv, SourceKind::Polygon, SourceKind::Yahoo],
            polygon_api_key: None,
            max_retries: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StorageConfig {
    pub db_path: String,
    pub json_backup_path: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            db_path: "data/signals.db".to_string(),
            json_backup_path: None,
        }
    }
}

/// Account used for sizing fired signals
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AccountConfig {
    pub balance: f64,
    /// Fraction of balance risked per trade (0.02 = 2%)
    pub risk_percent: f64,
}

impl Default for AccountConfig {
    fn default() -> Self {
        AccountConfig {
            balance: 100_000.0,
            risk_percent: 0.02,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_stop_multiplier_defaults_per_system() {
        let config = ScanConfig::default();
        assert_eq!(config.stop_multiplier_for(TurtleSystem::System1), 2.0);
        assert_eq!(config.stop_multiplier_for(TurtleSystem::System2), 1.5);

        let config = config.with_stop_loss_multiplier(3.0);
        assert_eq!(config.stop_multiplier_for(TurtleSystem::System1), 3.0);
        assert_eq!(config.stop_multiplier_for(TurtleSystem::System2), 3.0);
    }

    #[test]
    fn test_scan_config_validation() {
        assert!(ScanConfig::default().validate().is_ok());
        assert!(ScanConfig::default()
            .with_stop_loss_multiplier(0.0)
            .validate()
            .is_err());
        assert!(ScanConfig::default()
            .with_stop_loss_multiplier(f64::NAN)
            .validate()
            .is_err());
        let mut config = ScanConfig::default();
        config.risk_per_trade = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_scan_config_json() {
        let config: ScanConfig = serde_json::from_str(
            r#"{"system":"system2","useTrendFilter":false,"riskPerTrade":1.5,"stopLossMultiplier":2.5}"#,
        )
        .unwrap();
        assert_eq!(config.system, TurtleSystem::System2);
        assert!(!config.use_trend_filter);
        assert_eq!(config.stop_loss_multiplier, Some(2.5));
        assert_eq!(config.breakout_window, BreakoutWindow::PrecedingCurrent);

        let partial: ScanConfig = serde_json::from_str(r#"{"useTrendFilter":false}"#).unwrap();
        assert_eq!(partial.system, TurtleSystem::System1);
        assert_eq!(partial.stop_loss_multiplier, None);
    }

    #[test]
    fn test_app_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "universe": ["aapl", "msft"],
                "scan": {{"system": "system2", "breakoutWindow": "includingCurrent"}},
                "data": {{"sources": ["synthetic"], "cacheTtlSecs": 60, "dataDir": "prices"}},
                "storage": {{"dbPath": "out/signals.db", "jsonBackupPath": "out/signals.json"}},
                "account": {{"balance": 50000.0, "riskPercent": 0.01}}
            }}"#
        )
        .unwrap();

        let config = AppConfig::from_file(file.path()).unwrap();
        assert_eq!(config.tickers(), vec![Ticker::new("AAPL"), Ticker::new("MSFT")]);
        assert_eq!(config.scan.system, TurtleSystem::System2);
        assert_eq!(config.scan.breakout_window, BreakoutWindow::IncludingCurrent);
        assert_eq!(config.data.sources, vec![SourceKind::Synthetic]);
        assert_eq!(config.data.cache_ttl_secs, 60);
        assert_eq!(config.data.data_dir, "prices");
        assert_eq!(config.data.history_days, 400);
        assert_eq!(config.storage.db_path, "out/signals.db");
        assert_eq!(config.storage.json_backup_path.as_deref(), Some("out/signals.json"));
        assert_eq!(config.account.balance, 50_000.0);
        assert_eq!(config.account.risk_percent, 0.01);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_sections_share_camel_case_keys() {
        let json = serde_json::to_value(AppConfig::default()).unwrap();
        assert!(json["scan"].get("useTrendFilter").is_some());
        assert!(json["data"].get("historyDays").is_some());
        assert!(json["data"].get("maxRetries").is_some());
        assert!(json["storage"].get("dbPath").is_some());
        assert!(json["account"].get("riskPercent").is_some());
        assert!(json["data"].get("history_days").is_none());
    }

    #[test]
    fn test_app_config_validation() {
        let mut config = AppConfig::default();
        assert!(config.validate().is_ok());
        config.account.balance = 0.0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.data.sources.clear();
        assert!(config.validate().is_err());
    }
}
