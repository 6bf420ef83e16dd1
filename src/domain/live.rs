//! One tick of live trading.
//!
//! A [`LiveSession`] keeps the ledger and trades between calls. Each
//! [`LiveSession::step`] polls pending orders, rebuilds the snapshot from the
//! latest candles and runs the same tick logic as a backtest, with orders
//! routed to the exchange. Scheduling the steps is left to the caller.

use tracing::{debug, info};

use crate::domain::candle::Candle;
use crate::domain::candle_series::CandleSeries;
use crate::domain::error::CointraderError;
use crate::domain::evaluate::Snapshot;
use crate::domain::execution::{ExecutionParams, TickContext, TickOutcome, Venue, process_tick};
use crate::domain::expression::Expression;
use crate::domain::indicator::IndicatorId;
use crate::domain::indicator_helpers::compute_indicators;
use crate::domain::ledger::Ledger;
use crate::domain::trade::{Trade, TradeStatus};
use crate::ports::exchange_port::ExchangePort;

pub struct LiveSession<E: ExchangePort> {
    exchange: E,
    pair: String,
    params: ExecutionParams,
    buy: Expression,
    sell: Expression,
    indicators: Vec<IndicatorId>,
    ledger: Ledger,
    trades: Vec<Trade>,
    closing: Vec<Trade>,
}

impl<E: ExchangePort> LiveSession<E> {
    pub fn new(
        exchange: E,
        pair: impl Into<String>,
        capital: f64,
        params: ExecutionParams,
        buy: Expression,
        sell: Expression,
    ) -> Result<Self, CointraderError> {
        if !(capital.is_finite() && capital > 0.0) {
            return Err(CointraderError::InvalidTrade {
                reason: format!("capital must be positive, got {}", capital),
            });
        }
        let indicators = buy
            .required_indicators()
            .union(&sell.required_indicators())
            .copied()
            .collect();

        Ok(Self {
            exchange,
            pair: pair.into(),
            params,
            buy,
            sell,
            indicators,
            ledger: Ledger::new(capital),
            trades: Vec::new(),
            closing: Vec::new(),
        })
    }

    pub fn exchange(&self) -> &E {
        &self.exchange
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Trades holding a slot: unfilled buys and filled positions.
    pub fn open_trades(&self) -> &[Trade] {
        &self.trades
    }

    /// Sell orders submitted but not yet filled.
    pub fn closing_trades(&self) -> &[Trade] {
        &self.closing
    }

    /// Advance the session using `candles`, the most recent closed candles
    /// in ascending order. The last one is the current tick.
    pub fn step(&mut self, candles: Vec<Candle>) -> Result<TickOutcome, CointraderError> {
        self.poll_orders()?;

        let mut series = CandleSeries::new(self.pair.as_str(), candles)?;
        let Some(last) = series.candles().last().copied() else {
            return Err(CointraderError::NoData {
                pair: self.pair.clone(),
            });
        };
        compute_indicators(&mut series, &self.indicators);
        let snapshot = Snapshot::at(&series, series.len() - 1);

        let ctx = TickContext {
            pair: &self.pair,
            timestamp: last.timestamp,
            snapshot: &snapshot,
            buy: &self.buy,
            sell: &self.sell,
            params: &self.params,
            venue: Venue::Live(&self.exchange),
        };
        let outcome = process_tick(&ctx, &mut self.ledger, &mut self.trades)?;

        self.closing.extend(
            outcome
                .closed
                .iter()
                .filter(|t| t.status == TradeStatus::ClosedUnfilled)
                .cloned(),
        );
        debug!(
            pair = %self.pair,
            timestamp = last.timestamp,
            open = self.trades.len(),
            closing = self.closing.len(),
            "live step"
        );
        Ok(outcome)
    }

    fn poll_orders(&mut self) -> Result<(), CointraderError> {
        for trade in &mut self.trades {
            trade.poll(&self.exchange)?;
        }
        for trade in &mut self.closing {
            trade.poll(&self.exchange)?;
        }

        let before = self.closing.len();
        self.closing.retain(|t| t.status != TradeStatus::Closed);
        if self.closing.len() < before {
            info!(
                pair = %self.pair,
                settled = before - self.closing.len(),
                profit = self.ledger.profit,
                "sell orders settled"
            );
        }
        Ok(())
    }
}
