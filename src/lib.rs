//! Turtle Trading Signals
//!
//! Classic Turtle breakout signals (System 1 and System 2) computed from daily
//! OHLCV bars, with position sizing, exit evaluation and a scan pipeline that
//! fetches, evaluates and persists signals for a ticker universe.
//!
//! The engine modules (`indicators`, `validation`, `trend`, `signals`, `risk`,
//! `exits`) are pure functions over borrowed bar slices. The pipeline modules
//! (`data`, `cache`, `storage`, `scan`) handle I/O around them.

pub mod cache;
pub mod common;
pub mod config;
pub mod data;
pub mod error;
pub mod exits;
pub mod indicators;
pub mod risk;
pub mod scan;
pub mod signals;
pub mod storage;
pub mod trend;
pub mod types;
pub mod validation;

pub use config::{AppConfig, BreakoutWindow, ScanConfig};
pub use error::{EngineError, EngineResult};
pub use exits::{check_exit_signal, check_exit_signal_in, check_stop_loss};
pub use indicators::{compute_turtle_indicators, TurtleIndicators};
pub use risk::{calculate_position_size, size_position, validate_position_sizing, PositionSizing, PositionSizingInput};
pub use signals::{generate_signals, Signal, SignalOutcome, SignalReport};
pub use trend::{analyze_trend, TrendAnalysis, TrendContext};
pub use types::*;
pub use validation::{check_historical_data, validate_historical_data};
