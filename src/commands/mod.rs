//! CLI subcommand implementations

pub mod exit;
pub mod scan;
pub mod signal;
pub mod size;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use tracing::info;
use turtle_signals::AppConfig;

/// Load the config file, or defaults when it does not exist
pub(crate) fn load_config(path: &str) -> Result<AppConfig> {
    let config = AppConfig::load_or_default(path)?;
    if std::path::Path::new(path).exists() {
        info!("Loaded configuration from: {}", path);
    } else {
        info!("No config at {}, using defaults", path);
    }
    Ok(config)
}

/// Parse an optional YYYY-MM-DD date, defaulting to today
pub(crate) fn parse_as_of(as_of: Option<String>) -> Result<NaiveDate> {
    match as_of {
        Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .with_context(|| format!("Failed to parse date: {}. Use YYYY-MM-DD format", s)),
        None => Ok(chrono::Local::now().date_naive()),
    }
}
