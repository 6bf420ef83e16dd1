//! Trade lifecycle.
//!
//! A trade moves through `OpenUnfilled -> Open -> ClosedUnfilled -> Closed`.
//! Simulated trades skip the unfilled states: [`Trade::open`] starts `Open`
//! and [`Trade::close`] ends `Closed`. Live trades submit limit orders through
//! an [`ExchangePort`] and advance when [`Trade::poll`] sees the order done.

use std::fmt;

use serde::Serialize;
use tracing::info;

use crate::domain::error::CointraderError;
use crate::ports::exchange_port::{ExchangePort, OrderAck, OrderStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TradeStatus {
    OpenUnfilled,
    Open,
    ClosedUnfilled,
    Closed,
}

impl fmt::Display for TradeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TradeStatus::OpenUnfilled => "open-unfilled",
            TradeStatus::Open => "open",
            TradeStatus::ClosedUnfilled => "closed-unfilled",
            TradeStatus::Closed => "closed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trade {
    pub pair: String,
    pub entry_price: f64,
    pub exit_price: Option<f64>,
    pub amount_base: f64,
    pub stop_loss_price: Option<f64>,
    pub status: TradeStatus,
    pub realized_profit: f64,
    /// Id of the latest order submitted for this trade; `None` when simulated.
    pub order_id: Option<String>,
}

impl Trade {
    /// Open a simulated trade spending `quote_amount` at `entry_price`.
    pub fn open(
        pair: &str,
        entry_price: f64,
        quote_amount: f64,
        stop_loss_pct: Option<f64>,
    ) -> Result<Self, CointraderError> {
        Self::build(pair, entry_price, quote_amount, stop_loss_pct, TradeStatus::Open)
    }

    /// Submit a buy order and return the trade in `OpenUnfilled`.
    pub fn open_live(
        exchange: &dyn ExchangePort,
        pair: &str,
        entry_price: f64,
        quote_amount: f64,
        stop_loss_pct: Option<f64>,
    ) -> Result<Self, CointraderError> {
        let mut trade = Self::build(
            pair,
            entry_price,
            quote_amount,
            stop_loss_pct,
            TradeStatus::OpenUnfilled,
        )?;
        let ack = exchange.buy(pair, trade.amount_base, entry_price)?;
        trade.order_id = Some(accepted_order_id(pair, ack)?);
        Ok(trade)
    }

    fn build(
        pair: &str,
        entry_price: f64,
        quote_amount: f64,
        stop_loss_pct: Option<f64>,
        status: TradeStatus,
    ) -> Result<Self, CointraderError> {
        if !entry_price.is_finite() || entry_price <= 0.0 {
            return Err(CointraderError::InvalidTrade {
                reason: format!("entry price must be positive, got {}", entry_price),
            });
        }
        if !quote_amount.is_finite() || quote_amount <= 0.0 {
            return Err(CointraderError::InvalidTrade {
                reason: format!("quote amount must be positive, got {}", quote_amount),
            });
        }
        if let Some(pct) = stop_loss_pct {
            if !(pct > 0.0 && pct < 1.0) {
                return Err(CointraderError::InvalidTrade {
                    reason: format!("stop loss must be in (0, 1), got {}", pct),
                });
            }
        }

        Ok(Self {
            pair: pair.to_string(),
            entry_price,
            exit_price: None,
            amount_base: quote_amount / entry_price,
            stop_loss_price: stop_loss_pct.map(|pct| entry_price * (1.0 - pct)),
            status,
            realized_profit: 0.0,
            order_id: None,
        })
    }

    /// Close a simulated trade, returning `(realized_profit, proceeds)`.
    pub fn close(&mut self, exit_price: f64) -> Result<(f64, f64), CointraderError> {
        self.ensure_open("close")?;
        let settled = self.settle(exit_price);
        self.status = TradeStatus::Closed;
        Ok(settled)
    }

    /// Submit a sell order; the trade moves to `ClosedUnfilled`. A rejected
    /// order leaves the trade untouched.
    pub fn close_live(
        &mut self,
        exchange: &dyn ExchangePort,
        exit_price: f64,
    ) -> Result<(f64, f64), CointraderError> {
        self.ensure_open("close")?;
        let ack = exchange.sell(&self.pair, self.amount_base, exit_price)?;
        self.order_id = Some(accepted_order_id(&self.pair, ack)?);
        let settled = self.settle(exit_price);
        self.status = TradeStatus::ClosedUnfilled;
        Ok(settled)
    }

    /// Ask the exchange whether the pending order filled and advance the
    /// state if so. Settled states are returned unchanged.
    pub fn poll(&mut self, exchange: &dyn ExchangePort) -> Result<TradeStatus, CointraderError> {
        let next = match self.status {
            TradeStatus::OpenUnfilled => TradeStatus::Open,
            TradeStatus::ClosedUnfilled => TradeStatus::Closed,
            settled => return Ok(settled),
        };
        let Some(order_id) = self.order_id.as_deref() else {
            return Err(CointraderError::InvalidTransition {
                status: self.status,
                action: "poll",
            });
        };

        if exchange.order_status(order_id)? == OrderStatus::Done {
            self.status = next;
            match next {
                TradeStatus::Open => info!(
                    pair = %self.pair,
                    price = self.entry_price,
                    amount = self.amount_base,
                    "buy order filled"
                ),
                _ => info!(
                    pair = %self.pair,
                    price = self.exit_price.unwrap_or_default(),
                    profit = self.realized_profit,
                    "sell order filled"
                ),
            }
        }
        Ok(self.status)
    }

    pub fn can_sell(&self) -> bool {
        self.status == TradeStatus::Open
    }

    /// True when a stop-loss is set and `price` is strictly below it.
    pub fn should_stop_loss(&self, price: f64) -> bool {
        self.stop_loss_price.is_some_and(|stop| price < stop)
    }

    /// Quote currency committed at entry.
    pub fn cost(&self) -> f64 {
        self.amount_base * self.entry_price
    }

    fn ensure_open(&self, action: &'static str) -> Result<(), CointraderError> {
        if self.status == TradeStatus::Open {
            Ok(())
        } else {
            Err(CointraderError::InvalidTransition {
                status: self.status,
                action,
            })
        }
    }

    fn settle(&mut self, exit_price: f64) -> (f64, f64) {
        let proceeds = self.amount_base * exit_price;
        self.exit_price = Some(exit_price);
        self.realized_profit = proceeds - self.cost();
        (self.realized_profit, proceeds)
    }
}

fn accepted_order_id(pair: &str, ack: OrderAck) -> Result<String, CointraderError> {
    match ack {
        OrderAck::Accepted { order_id } if order_id.trim().is_empty() => {
            Err(CointraderError::Exchange {
                reason: format!("order for {} accepted without an order id", pair),
            })
        }
        OrderAck::Accepted { order_id } => Ok(order_id),
        OrderAck::Rejected { message } => Err(CointraderError::OrderRejected {
            pair: pair.to_string(),
            message,
        }),
    }
}
