#![allow(dead_code)]

use cointrader::domain::backtest::BacktestConfig;
pub use cointrader::domain::candle::Candle;
use cointrader::domain::error::CointraderError;
use cointrader::domain::expression::{CompareOp, Expression, Operand};
use cointrader::ports::market_data_port::MarketDataPort;
use std::collections::HashMap;

pub const HOUR: i64 = 3_600;
pub const START: i64 = 1_546_300_800; // 2019-01-01T00:00:00Z

pub struct MockMarketDataPort {
    pub data: HashMap<(String, u64), Vec<Candle>>,
    pub errors: HashMap<String, String>,
}

impl MockMarketDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_candles(mut self, pair: &str, granularity_secs: u64, candles: Vec<Candle>) -> Self {
        self.data
            .insert((pair.to_string(), granularity_secs), candles);
        self
    }

    pub fn with_error(mut self, pair: &str, reason: &str) -> Self {
        self.errors.insert(pair.to_string(), reason.to_string());
        self
    }
}

impl MarketDataPort for MockMarketDataPort {
    fn fetch_candles(
        &self,
        pair: &str,
        granularity_secs: u64,
    ) -> Result<Vec<Candle>, CointraderError> {
        if let Some(reason) = self.errors.get(pair) {
            return Err(CointraderError::MarketData {
                reason: reason.clone(),
            });
        }
        Ok(self
            .data
            .get(&(pair.to_string(), granularity_secs))
            .cloned()
            .unwrap_or_default())
    }

    fn list_pairs(&self) -> Result<Vec<String>, CointraderError> {
        let mut pairs: Vec<String> = self.data.keys().map(|(pair, _)| pair.clone()).collect();
        pairs.sort();
        pairs.dedup();
        Ok(pairs)
    }
}

pub fn make_candle(timestamp: i64, close: f64) -> Candle {
    Candle {
        timestamp,
        open: close,
        high: close + 1.0,
        low: (close - 1.0).max(0.0),
        close,
        volume: 10.0,
    }
}

/// Hourly candles from [`START`], one per close.
pub fn candles_from_closes(closes: &[f64]) -> Vec<Candle> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| make_candle(START + HOUR * i as i64, close))
        .collect()
}

pub fn rising_candles(count: usize, start_price: f64) -> Vec<Candle> {
    let closes: Vec<f64> = (0..count).map(|i| start_price + i as f64).collect();
    candles_from_closes(&closes)
}

pub fn csv_content(candles: &[Candle]) -> String {
    let mut out = String::from("timestamp,open,high,low,close,volume\n");
    for c in candles {
        out.push_str(&format!(
            "{},{},{},{},{},{}\n",
            c.timestamp, c.open, c.high, c.low, c.close, c.volume
        ));
    }
    out
}

pub fn price_above(value: f64) -> Expression {
    Expression::compare(CompareOp::Gt, Operand::CurrentPrice, Operand::Literal(value))
}

pub fn price_below(value: f64) -> Expression {
    Expression::compare(CompareOp::Lt, Operand::CurrentPrice, Operand::Literal(value))
}

pub fn never() -> Expression {
    price_below(0.0)
}

pub fn zero_fee_config(capital: f64) -> BacktestConfig {
    BacktestConfig {
        trading_fee: 0.0,
        ..BacktestConfig::new("BTC-USD", capital)
    }
}
