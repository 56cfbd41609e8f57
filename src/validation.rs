//! Data quality gate for bar sequences
//!
//! Validation is all-or-nothing: one bad bar anywhere fails the whole
//! sequence. It must pass before indicators or signals are computed.

use crate::error::{EngineError, EngineResult};
use crate::indicators::MIN_TURTLE_BARS;
use crate::types::Bar;

/// Check a sequence for signal generation, reporting the first failure
///
/// Checks, in order: length >= 200, then for every bar strictly positive
/// prices, `high >= low`, and `low <= close <= high`.
pub fn check_historical_data(bars: &[Bar]) -> EngineResult<()> {
    if bars.len() < MIN_TURTLE_BARS {
        return Err(EngineError::insufficient(
            "signal generation",
            MIN_TURTLE_BARS,
            bars.len(),
        ));
    }

    for bar in bars {
        bar.validate()
            .map_err(|e| EngineError::InvalidData(format!("bar {}: {}", bar.date, e)))?;
    }

    Ok(())
}

/// Boolean form of [`check_historical_data`]
pub fn validate_historical_data(bars: &[Bar]) -> bool {
    check_historical_data(bars).is_ok()
}

/// Dates strictly ascending (no duplicates, no reordering)
pub fn is_chronological(bars: &[Bar]) -> bool {
    bars.windows(2).all(|w| w[0].date < w[1].date)
}
