//! CSV file market data adapter.
//!
//! Reads `<dir>/<PAIR>_<granularity_secs>.csv` with the header
//! `timestamp,open,high,low,close,volume`.

use crate::domain::candle::Candle;
use crate::domain::config_validation::is_valid_pair;
use crate::domain::error::CointraderError;
use crate::ports::market_data_port::MarketDataPort;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::{debug, warn};

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    /// Only `BASE-QUOTE` pairs map to a file, so a pair cannot name a path
    /// outside the data directory.
    fn csv_path(&self, pair: &str, granularity_secs: u64) -> Result<PathBuf, CointraderError> {
        if !is_valid_pair(pair) {
            return Err(CointraderError::MarketData {
                reason: format!("'{}' is not a BASE-QUOTE pair", pair),
            });
        }
        Ok(self.base_path.join(format!("{}_{}.csv", pair, granularity_secs)))
    }
}

impl MarketDataPort for CsvAdapter {
    fn fetch_candles(
        &self,
        pair: &str,
        granularity_secs: u64,
    ) -> Result<Vec<Candle>, CointraderError> {
        let path = self.csv_path(pair, granularity_secs)?;
        let content = fs::read_to_string(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => CointraderError::NoData {
                pair: pair.to_string(),
            },
            _ => CointraderError::MarketData {
                reason: format!("failed to read {}: {}", path.display(), e),
            },
        })?;

        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());
        let mut candles = Vec::new();
        for (line, result) in rdr.deserialize::<Candle>().enumerate() {
            let candle = result.map_err(|e| CointraderError::MarketData {
                reason: format!("{} row {}: {}", path.display(), line + 1, e),
            })?;
            candles.push(candle);
        }

        candles.sort_by_key(|c| c.timestamp);
        if let Some(dup) = candles.windows(2).find(|w| w[0].timestamp == w[1].timestamp) {
            return Err(CointraderError::MarketData {
                reason: format!(
                    "{} has duplicate candles at {}",
                    path.display(),
                    dup[0].timestamp
                ),
            });
        }

        debug!(pair, granularity_secs, candles = candles.len(), "loaded candles");
        Ok(candles)
    }

    fn list_pairs(&self) -> Result<Vec<String>, CointraderError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| CointraderError::MarketData {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let mut pairs = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| CointraderError::MarketData {
                reason: format!("directory entry error: {}", e),
            })?;

            let name = entry.file_name();
            let name_str = name.to_string_lossy();
            let Some(stem) = name_str.strip_suffix(".csv") else {
                continue;
            };
            match stem.rsplit_once('_') {
                Some((pair, secs)) if secs.parse::<u64>().is_ok() && is_valid_pair(pair) => {
                    pairs.push(pair.to_string());
                }
                _ => warn!(file = %name_str, "skipping file without a <BASE-QUOTE>_<secs>.csv name"),
            }
        }

        pairs.sort();
        pairs.dedup();
        Ok(pairs)
    }
}
