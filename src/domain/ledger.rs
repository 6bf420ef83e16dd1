//! Running account of one backtest or live session.

use serde::Serialize;

/// A `(timestamp, price)` event; serializes as `[t, p]`.
pub type PricePoint = (i64, f64);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ledger {
    pub buys: Vec<PricePoint>,
    pub sells: Vec<PricePoint>,
    /// Realized profit net of exit fees, in quote currency.
    pub profit: f64,
    /// Quote capital not committed to an open trade.
    pub reserve: f64,
}

impl Ledger {
    pub fn new(capital: f64) -> Self {
        Ledger {
            buys: Vec::new(),
            sells: Vec::new(),
            profit: 0.0,
            reserve: capital,
        }
    }

    /// Take `stake` out of the reserve for a new trade and record the buy.
    pub fn record_buy(&mut self, timestamp: i64, price: f64, stake: f64) {
        self.reserve -= stake;
        if self.reserve < 1e-12 {
            self.reserve = 0.0;
        }
        self.buys.push((timestamp, price));
    }

    /// Credit the net profit and net proceeds of a closed trade.
    pub fn record_sell(&mut self, timestamp: i64, price: f64, net_profit: f64, net_proceeds: f64) {
        self.profit += net_profit;
        self.reserve += net_proceeds;
        self.sells.push((timestamp, price));
    }

    pub fn trade_count(&self) -> usize {
        self.buys.len()
    }
}
