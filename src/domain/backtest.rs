//! Backtest engine and event loop.
//!
//! [`BacktestConfig`] holds the run parameters, [`BacktestRunner`] makes one
//! forward pass over a candle series and returns a [`BacktestResult`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

use crate::domain::candle::Candle;
use crate::domain::candle_series::CandleSeries;
use crate::domain::config_validation::is_valid_pair;
use crate::domain::error::CointraderError;
use crate::domain::evaluate::Snapshot;
use crate::domain::execution::{
    DEFAULT_TRADING_FEE, ExecutionParams, TickContext, Venue, process_tick,
};
use crate::domain::expression::Expression;
use crate::domain::indicator::{IndicatorId, IndicatorSeries, parse_indicator_list};
use crate::domain::indicator_helpers::compute_indicators;
use crate::domain::ledger::{Ledger, PricePoint};
use crate::domain::trade::Trade;
use crate::ports::market_data_port::MarketDataPort;

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub pair: String,
    pub capital: f64,
    pub stop_loss_pct: Option<f64>,
    pub trading_fee: f64,
    pub max_trades_at_once: usize,
    /// Inclusive lower bound on candle timestamps, epoch seconds.
    pub start_time: Option<i64>,
}

impl BacktestConfig {
    pub fn new(pair: impl Into<String>, capital: f64) -> Self {
        BacktestConfig {
            pair: pair.into(),
            capital,
            stop_loss_pct: None,
            trading_fee: DEFAULT_TRADING_FEE,
            max_trades_at_once: 1,
            start_time: None,
        }
    }

    pub fn validate(&self) -> Result<(), CointraderError> {
        let invalid = |key: &str, reason: String| -> Result<(), CointraderError> {
            Err(CointraderError::ConfigInvalid {
                section: "backtest".into(),
                key: key.into(),
                reason,
            })
        };

        if !is_valid_pair(&self.pair) {
            return invalid("pair", format!("'{}' is not a BASE-QUOTE pair", self.pair));
        }
        if !(self.capital.is_finite() && self.capital > 0.0) {
            return invalid("capital", format!("must be positive, got {}", self.capital));
        }
        if !(self.trading_fee >= 0.0 && self.trading_fee < 1.0) {
            return invalid(
                "trading_fee",
                format!("must be in [0, 1), got {}", self.trading_fee),
            );
        }
        if let Some(pct) = self.stop_loss_pct {
            if !(pct > 0.0 && pct < 1.0) {
                return invalid("stop_loss", format!("must be in (0, 1), got {}", pct));
            }
        }
        if self.max_trades_at_once == 0 {
            return invalid("max_trades_at_once", "must be at least 1".into());
        }
        Ok(())
    }

    pub fn execution_params(&self) -> ExecutionParams {
        ExecutionParams {
            trading_fee: self.trading_fee,
            stop_loss_pct: self.stop_loss_pct,
            max_trades_at_once: self.max_trades_at_once,
        }
    }
}

/// Outcome of one run. Serializes to
/// `{buys, sells, closingPrices, indicators, profit}`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BacktestResult {
    pub buys: Vec<PricePoint>,
    pub sells: Vec<PricePoint>,
    pub closing_prices: Vec<PricePoint>,
    pub indicators: BTreeMap<IndicatorId, IndicatorSeries>,
    /// Realized profit, rounded to 8 decimals.
    pub profit: f64,
    #[serde(skip)]
    pub final_reserve: f64,
    #[serde(skip)]
    pub open_trades: Vec<Trade>,
}

/// A strategy as submitted by a client or stored in a file:
/// `{indicators, buyStrategy, sellStrategy}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyDocument {
    #[serde(default)]
    pub indicators: Vec<String>,
    pub buy_strategy: Expression,
    pub sell_strategy: Expression,
}

impl StrategyDocument {
    pub fn from_json_str(text: &str) -> Result<Self, CointraderError> {
        serde_json::from_str(text).map_err(|e| CointraderError::StrategyInvalid {
            reason: e.to_string(),
        })
    }

    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, CointraderError> {
        serde_json::from_slice(bytes).map_err(|e| CointraderError::StrategyInvalid {
            reason: e.to_string(),
        })
    }

    pub fn display_indicators(&self) -> Result<Vec<IndicatorId>, CointraderError> {
        parse_indicator_list(&self.indicators)
    }

    /// Validate the document and build a runner for `config`.
    pub fn into_runner(self, config: BacktestConfig) -> Result<BacktestRunner, CointraderError> {
        let display = self.display_indicators()?;
        BacktestRunner::new(config, self.buy_strategy, self.sell_strategy, display)
    }
}

pub fn round_money(value: f64) -> f64 {
    (value * 1e8).round() / 1e8
}

#[derive(Debug, Clone)]
pub struct BacktestRunner {
    config: BacktestConfig,
    buy: Expression,
    sell: Expression,
    display: Vec<IndicatorId>,
}

impl BacktestRunner {
    /// `display` lists the indicators returned in the result; indicators the
    /// strategies reference are computed as well.
    pub fn new(
        config: BacktestConfig,
        buy: Expression,
        sell: Expression,
        display: Vec<IndicatorId>,
    ) -> Result<Self, CointraderError> {
        config.validate()?;
        Ok(Self {
            config,
            buy,
            sell,
            display,
        })
    }

    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    /// Every indicator the run computes, display ones first.
    pub fn indicator_ids(&self) -> Vec<IndicatorId> {
        let mut ids = self.display.clone();
        for id in self
            .buy
            .required_indicators()
            .into_iter()
            .chain(self.sell.required_indicators())
        {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        ids
    }

    pub fn run(&self, candles: Vec<Candle>) -> Result<BacktestResult, CointraderError> {
        let pair = self.config.pair.as_str();
        let mut series = CandleSeries::new(pair, candles)?.since(self.config.start_time);
        if series.is_empty() {
            return Err(CointraderError::NoData {
                pair: pair.to_string(),
            });
        }

        let ids = self.indicator_ids();
        compute_indicators(&mut series, &ids);

        info!(
            pair,
            candles = series.len(),
            indicators = ids.len(),
            warmup = ids.iter().map(IndicatorId::warmup).max().unwrap_or(0),
            capital = self.config.capital,
            "running backtest"
        );

        let params = self.config.execution_params();
        let mut ledger = Ledger::new(self.config.capital);
        let mut trades: Vec<Trade> = Vec::new();

        for (index, candle) in series.candles().iter().enumerate() {
            let snapshot = Snapshot::at(&series, index);
            let ctx = TickContext {
                pair,
                timestamp: candle.timestamp,
                snapshot: &snapshot,
                buy: &self.buy,
                sell: &self.sell,
                params: &params,
                venue: Venue::Simulated,
            };
            process_tick(&ctx, &mut ledger, &mut trades)?;
        }

        info!(
            pair,
            trades = ledger.trade_count(),
            sells = ledger.sells.len(),
            profit = ledger.profit,
            "backtest finished"
        );

        let closing_prices = series.closing_prices();
        let mut indicators = series.indicators;
        indicators.retain(|id, _| self.display.contains(id));

        Ok(BacktestResult {
            buys: ledger.buys,
            sells: ledger.sells,
            closing_prices,
            indicators,
            profit: round_money(ledger.profit),
            final_reserve: ledger.reserve,
            open_trades: trades,
        })
    }
}

/// Fetch candles for the runner's pair and run it.
pub fn fetch_and_run(
    market_data: &dyn MarketDataPort,
    granularity_secs: u64,
    runner: &BacktestRunner,
) -> Result<BacktestResult, CointraderError> {
    let pair = &runner.config().pair;
    let candles = market_data.fetch_candles(pair, granularity_secs)?;
    if candles.is_empty() {
        return Err(CointraderError::NoData { pair: pair.clone() });
    }
    runner.run(candles)
}
