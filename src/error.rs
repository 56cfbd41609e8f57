//! Engine error taxonomy
//!
//! Every engine entry point returns [`EngineResult`]. Errors carry enough
//! context (which requirement failed, bars available vs. required) for the
//! caller to log a diagnostic; the engine itself never logs.

use thiserror::Error;

use crate::types::TurtleSystem;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// Sequence shorter than the window an operation needs
    #[error("insufficient data for {what}: requires {required} bars, got {available}")]
    InsufficientData {
        what: &'static str,
        required: usize,
        available: usize,
    },

    /// OHLC consistency violated somewhere in the sequence
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Sizing or configuration input out of domain
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("stop loss distance cannot be zero")]
    ZeroStopDistance,

    /// Buy and sell breakouts both held on the same bar
    #[error("ambiguous {system} signal: close {close} breaks both entry and exit channels")]
    AmbiguousSignal { system: TurtleSystem, close: f64 },
}

impl EngineError {
    pub(crate) fn insufficient(what: &'static str, required: usize, available: usize) -> Self {
        EngineError::InsufficientData {
            what,
            required,
            available,
        }
    }

    /// Errors the caller should treat as "skip this ticker" rather than as a
    /// defect in its own inputs
    pub fn is_data_error(&self) -> bool {
        matches!(
            self,
            EngineError::InsufficientData { .. } | EngineError::InvalidData(_)
        )
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
