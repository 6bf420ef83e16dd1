//! Trade execution for one tick.
//!
//! Shared by the backtest runner and the live session. A tick first tries to
//! open a trade on the buy signal, then closes trades that were already open
//! before the tick on the sell signal or their stop-loss. A trade is never
//! opened and closed on the same tick.
//!
//! Fees are multiplicative: the entry fee reduces the quote stake before the
//! base amount is derived, and the exit fee is taken from both the realized
//! profit and the proceeds returned to the reserve.

use tracing::debug;

use super::error::CointraderError;
use super::evaluate::{Snapshot, should_execute};
use super::expression::Expression;
use super::ledger::Ledger;
use super::trade::Trade;
use crate::ports::exchange_port::ExchangePort;

pub const DEFAULT_TRADING_FEE: f64 = 0.0025;

/// Parameters governing entries and exits.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionParams {
    pub trading_fee: f64,
    pub stop_loss_pct: Option<f64>,
    pub max_trades_at_once: usize,
}

impl Default for ExecutionParams {
    fn default() -> Self {
        ExecutionParams {
            trading_fee: DEFAULT_TRADING_FEE,
            stop_loss_pct: None,
            max_trades_at_once: 1,
        }
    }
}

/// Where orders go.
#[derive(Clone, Copy)]
pub enum Venue<'a> {
    Simulated,
    Live(&'a dyn ExchangePort),
}

/// Net of a multiplicative fee.
pub fn apply_fee(amount: f64, fee: f64) -> f64 {
    amount * (1.0 - fee)
}

/// Quote capital staked on the next entry: an even share of the reserve
/// across the free slots, so with one free slot the whole reserve is used.
pub fn entry_stake(reserve: f64, open_trades: usize, max_trades_at_once: usize) -> f64 {
    let free = max_trades_at_once.saturating_sub(open_trades);
    if free == 0 {
        0.0
    } else {
        reserve / free as f64
    }
}

/// What happened during one tick.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TickOutcome {
    pub bought: bool,
    /// Trades closed on this tick, removed from the open list.
    pub closed: Vec<Trade>,
}

/// Everything one tick needs besides the mutable state.
pub struct TickContext<'a> {
    pub pair: &'a str,
    pub timestamp: i64,
    pub snapshot: &'a Snapshot,
    pub buy: &'a Expression,
    pub sell: &'a Expression,
    pub params: &'a ExecutionParams,
    pub venue: Venue<'a>,
}

pub fn process_tick(
    ctx: &TickContext<'_>,
    ledger: &mut Ledger,
    trades: &mut Vec<Trade>,
) -> Result<TickOutcome, CointraderError> {
    let price = ctx.snapshot.current_price;
    let fee = ctx.params.trading_fee;
    let held_before = trades.len();
    let mut outcome = TickOutcome::default();

    if trades.len() < ctx.params.max_trades_at_once
        && ledger.reserve > 0.0
        && should_execute(ctx.buy, ctx.snapshot)
    {
        let stake = entry_stake(ledger.reserve, trades.len(), ctx.params.max_trades_at_once);
        let quote = apply_fee(stake, fee);
        let trade = match ctx.venue {
            Venue::Simulated => Trade::open(ctx.pair, price, quote, ctx.params.stop_loss_pct)?,
            Venue::Live(exchange) => {
                Trade::open_live(exchange, ctx.pair, price, quote, ctx.params.stop_loss_pct)?
            }
        };
        debug!(
            pair = ctx.pair,
            timestamp = ctx.timestamp,
            price,
            amount = trade.amount_base,
            "buy"
        );
        ledger.record_buy(ctx.timestamp, price, stake);
        trades.push(trade);
        outcome.bought = true;
    }

    // Evaluated once per tick, only if something can be sold.
    let mut sell_signal: Option<bool> = None;
    // Trades stay in the list until their close succeeds, so a failed order
    // leaves every position in place.
    let mut held = held_before;
    let mut idx = 0;
    while idx < held {
        let trade = &mut trades[idx];
        if !trade.can_sell() {
            idx += 1;
            continue;
        }

        let signal = *sell_signal.get_or_insert_with(|| should_execute(ctx.sell, ctx.snapshot));
        if !(signal || trade.should_stop_loss(price)) {
            idx += 1;
            continue;
        }

        let (profit, proceeds) = match ctx.venue {
            Venue::Simulated => trade.close(price)?,
            Venue::Live(exchange) => trade.close_live(exchange, price)?,
        };
        let (net_profit, net_proceeds) = (apply_fee(profit, fee), apply_fee(proceeds, fee));
        debug!(
            pair = ctx.pair,
            timestamp = ctx.timestamp,
            price,
            profit = net_profit,
            stop_loss = !signal,
            "sell"
        );
        ledger.record_sell(ctx.timestamp, price, net_profit, net_proceeds);
        outcome.closed.push(trades.remove(idx));
        held -= 1;
    }

    Ok(outcome)
}
