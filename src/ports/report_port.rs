//! Report output port trait.

use crate::domain::backtest::BacktestResult;
use crate::domain::error::CointraderError;
use std::path::Path;

/// Port for writing backtest results.
pub trait ReportPort {
    /// Write to `output_path`, or to standard output when it is `None`.
    fn write(&self, result: &BacktestResult, output_path: Option<&Path>)
    -> Result<(), CointraderError>;
}
