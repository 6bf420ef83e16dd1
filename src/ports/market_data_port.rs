//! Market data access port trait.

use crate::domain::candle::Candle;
use crate::domain::error::CointraderError;

/// Source of historical candles, keyed by trading pair and granularity.
pub trait MarketDataPort {
    /// Candles for `pair` at `granularity_secs`, ascending by timestamp.
    fn fetch_candles(&self, pair: &str, granularity_secs: u64)
    -> Result<Vec<Candle>, CointraderError>;

    fn list_pairs(&self) -> Result<Vec<String>, CointraderError>;
}
