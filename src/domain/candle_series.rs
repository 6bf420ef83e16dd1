//! Candle series with attached indicator columns.

use crate::domain::candle::Candle;
use crate::domain::error::CointraderError;
use crate::domain::indicator::{IndicatorId, IndicatorSeries};
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct CandleSeries {
    pub pair: String,
    candles: Vec<Candle>,
    pub indicators: BTreeMap<IndicatorId, IndicatorSeries>,
}

impl CandleSeries {
    /// Build a series, rejecting non-finite values and timestamps that are
    /// not strictly ascending.
    pub fn new(pair: impl Into<String>, candles: Vec<Candle>) -> Result<Self, CointraderError> {
        if let Some(bad) = candles.iter().find(|c| !c.is_finite()) {
            return Err(CointraderError::InvalidCandles {
                reason: format!("non-numeric value in candle at {}", bad.timestamp),
            });
        }
        if let Some(pair) = candles.windows(2).find(|w| w[1].timestamp <= w[0].timestamp) {
            return Err(CointraderError::InvalidCandles {
                reason: format!(
                    "timestamps must be strictly ascending: {} followed by {}",
                    pair[0].timestamp, pair[1].timestamp
                ),
            });
        }

        Ok(Self {
            pair: pair.into(),
            candles,
            indicators: BTreeMap::new(),
        })
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.close).collect()
    }

    /// `[timestamp, close]` rows for the result payload.
    pub fn closing_prices(&self) -> Vec<(i64, f64)> {
        self.candles.iter().map(|c| (c.timestamp, c.close)).collect()
    }

    /// Candles at or after `start_time`; indicator columns are dropped since
    /// they would no longer be aligned.
    pub fn since(&self, start_time: Option<i64>) -> CandleSeries {
        let candles = match start_time {
            Some(start) => self
                .candles
                .iter()
                .copied()
                .filter(|c| c.timestamp >= start)
                .collect(),
            None => self.candles.clone(),
        };
        CandleSeries {
            pair: self.pair.clone(),
            candles,
            indicators: BTreeMap::new(),
        }
    }

    pub fn attach(&mut self, series: IndicatorSeries) {
        self.indicators.insert(series.id, series);
    }

    /// Scalar value of an attached indicator at `index`; absent during
    /// warm-up or when the indicator was never computed.
    pub fn indicator_at(&self, id: &IndicatorId, index: usize) -> Option<f64> {
        self.indicators.get(id).and_then(|s| s.scalar_at(index))
    }
}
