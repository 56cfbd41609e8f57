//! Position sizing
//!
//! Fixed-fractional risk: each trade risks a fixed fraction of the account,
//! converted into a unit count via the distance to the stop, then capped so a
//! single position never exceeds a fixed share of the balance.
//!
//! ```text
//! units = floor((balance * risk_percent) / |entry - stop|)
//! if units * entry > balance * 0.2: units = floor(balance * 0.2 / entry)
//! ```
//!
//! All values are currency-agnostic as long as balance and prices share a
//! denomination.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Fraction of the balance risked when the input does not specify one
pub const DEFAULT_RISK_PERCENT: f64 = 0.02;
/// Largest share of the balance a single position may occupy
pub const MAX_POSITION_FRACTION: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionSizingInput {
    pub account_balance: f64,
    pub entry_price: f64,
    pub stop_loss_price: f64,
    /// Fraction in (0, 1]; `None` uses [`DEFAULT_RISK_PERCENT`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_percent: Option<f64>,
}

impl PositionSizingInput {
    pub fn new(account_balance: f64, entry_price: f64, stop_loss_price: f64) -> Self {
        Self {
            account_balance,
            entry_price,
            stop_loss_price,
            risk_percent: None,
        }
    }

    pub fn with_risk_percent(mut self, risk_percent: f64) -> Self {
        self.risk_percent = Some(risk_percent);
        self
    }

    fn effective_risk_percent(&self) -> f64 {
        self.risk_percent.unwrap_or(DEFAULT_RISK_PERCENT)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionSizing {
    /// Whole units to trade
    pub units: u64,
    /// `units * entry_price`
    pub position_size: f64,
    /// Cash at risk before the cap is applied
    pub risk_amount: f64,
    pub stop_distance: f64,
}

fn floor_units(value: f64) -> u64 {
    // `as` saturates, and NaN maps to 0
    value.floor().max(0.0) as u64
}

/// Size a position from account balance, entry and stop
///
/// Does not range-check its inputs beyond the zero stop distance; call
/// [`validate_position_sizing`] first, or use [`size_position`].
pub fn calculate_position_size(input: &PositionSizingInput) -> EngineResult<PositionSizing> {
    let risk_amount = input.account_balance * input.effective_risk_percent();
    let stop_distance = (input.entry_price - input.stop_loss_price).abs();

    if stop_distance == 0.0 {
        return Err(EngineError::ZeroStopDistance);
    }

    let mut units = floor_units(risk_amount / stop_distance);

    let max_position_value = input.account_balance * MAX_POSITION_FRACTION;
    if units as f64 * input.entry_price > max_position_value {
        units = floor_units(max_position_value / input.entry_price);
    }

    Ok(PositionSizing {
        units,
        position_size: units as f64 * input.entry_price,
        risk_amount,
        stop_distance,
    })
}

/// Reject sizing inputs outside their domain
pub fn validate_position_sizing(input: &PositionSizingInput) -> EngineResult<()> {
    if !(input.account_balance.is_finite() && input.account_balance > 0.0) {
        return Err(EngineError::InvalidParameter(
            "Account balance must be positive".to_string(),
        ));
    }
    if !(input.entry_price.is_finite() && input.entry_price > 0.0) {
        return Err(EngineError::InvalidParameter(
            "Entry price must be positive".to_string(),
        ));
    }
    if !(input.stop_loss_price.is_finite() && input.stop_loss_price >= 0.0) {
        return Err(EngineError::InvalidParameter(
            "Stop loss price must be non-negative".to_string(),
        ));
    }
    if input.entry_price == input.stop_loss_price {
        return Err(EngineError::InvalidParameter(
            "Entry price and stop loss cannot be equal".to_string(),
        ));
    }
    let risk = input.effective_risk_percent();
    if !(risk > 0.0 && risk <= 1.0) {
        return Err(EngineError::InvalidParameter(format!(
            "Risk percent must be between 0 and 1, got {}",
            risk
        )));
    }
    Ok(())
}

/// Validate, then size
pub fn size_position(input: &PositionSizingInput) -> EngineResult<PositionSizing> {
    validate_position_sizing(input)?;
    calculate_position_size(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_position_sizing_capped() {
        let sizing = calculate_position_size(&PositionSizingInput::new(100_000.0, 100.0, 95.0)).unwrap();
        // 2000 / 5 = 400 units would be 40k, above the 20k cap
        assert_eq!(sizing.risk_amount, 2_000.0);
        assert_eq!(sizing.stop_distance, 5.0);
        assert_eq!(sizing.units, 200);
        assert_eq!(sizing.position_size, 20_000.0);
    }

    #[test]
    fn test_position_sizing_uncapped() {
        let sizing = calculate_position_size(&PositionSizingInput::new(100_000.0, 50.0, 40.0)).unwrap();
        assert_eq!(sizing.units, 200);
        assert_eq!(sizing.position_size, 10_000.0);
    }

    #[test]
    fn test_units_are_floored() {
        let input = PositionSizingInput::new(10_000.0, 30.0, 27.0).with_risk_percent(0.01);
        // 100 / 3 = 33.3
        let sizing = calculate_position_size(&input).unwrap();
        assert_eq!(sizing.units, 33);
        assert_relative_eq!(sizing.position_size, 990.0);
    }

    #[test]
    fn test_short_side_uses_absolute_distance() {
        let sizing = calculate_position_size(&PositionSizingInput::new(100_000.0, 100.0, 110.0)).unwrap();
        assert_eq!(sizing.stop_distance, 10.0);
        assert_eq!(sizing.units, 200);
    }

    #[test]
    fn test_zero_stop_distance() {
        let input = PositionSizingInput::new(100_000.0, 100.0, 100.0);
        assert_eq!(calculate_position_size(&input), Err(EngineError::ZeroStopDistance));
        assert!(matches!(
            validate_position_sizing(&input),
            Err(EngineError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_validation_rejects_out_of_domain() {
        let cases = [
            PositionSizingInput::new(0.0, 100.0, 95.0),
            PositionSizingInput::new(-5.0, 100.0, 95.0),
            PositionSizingInput::new(100_000.0, 0.0, 95.0),
            PositionSizingInput::new(100_000.0, 100.0, -1.0),
            PositionSizingInput::new(100_000.0, 100.0, 95.0).with_risk_percent(0.0),
            PositionSizingInput::new(100_000.0, 100.0, 95.0).with_risk_percent(1.5),
        ];
        for input in &cases {
            assert!(
                matches!(size_position(input), Err(EngineError::InvalidParameter(_))),
                "expected rejection for {:?}",
                input
            );
        }

        let ok = PositionSizingInput::new(100_000.0, 100.0, 0.0).with_risk_percent(1.0);
        assert!(validate_position_sizing(&ok).is_ok());
    }

    #[test]
    fn test_input_json() {
        let input: PositionSizingInput = serde_json::from_str(
            r#"{"accountBalance":50000,"entryPrice":25,"stopLossPrice":24}"#,
        )
        .unwrap();
        assert_eq!(input.risk_percent, None);
        let sizing = size_position(&input).unwrap();
        // 1000 risk / 1 = 1000 units = 25k, capped to 10k / 25 = 400
        assert_eq!(sizing.units, 400);
    }
}
