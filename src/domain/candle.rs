//! OHLCV candle representation.

use serde::{Deserialize, Serialize};

/// One fixed-duration bucket of price data, keyed by epoch seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// Midpoint of the candle's range.
    pub fn price_average(&self) -> f64 {
        (self.high + self.low) / 2.0
    }

    pub fn is_finite(&self) -> bool {
        self.open.is_finite()
            && self.high.is_finite()
            && self.low.is_finite()
            && self.close.is_finite()
            && self.volume.is_finite()
    }
}
