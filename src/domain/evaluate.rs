//! Strategy expression evaluation.
//!
//! Evaluates an [`Expression`] against a per-tick [`Snapshot`] of the current
//! price and indicator values.
//!
//! # Evaluation Semantics
//!
//! - The empty tree is always true
//! - A comparison with an absent side (warm-up, or an indicator that was
//!   never computed) is false
//! - `Eq` compares within `1e-9`
//! - `And` short-circuits on the first `false`, `Or` on the first `true`

use crate::domain::candle_series::CandleSeries;
use crate::domain::expression::{CompareOp, Expression, Operand};
use crate::domain::indicator::IndicatorId;
use std::collections::HashMap;

const EPSILON: f64 = 1e-9;

/// The values a strategy can see at one tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub current_price: f64,
    pub values: HashMap<IndicatorId, Option<f64>>,
}

impl Snapshot {
    pub fn new(current_price: f64) -> Self {
        Self {
            current_price,
            values: HashMap::new(),
        }
    }

    pub fn with(mut self, id: IndicatorId, value: Option<f64>) -> Self {
        self.values.insert(id, value);
        self
    }

    /// Snapshot at `index`: the close plus every attached indicator.
    pub fn at(series: &CandleSeries, index: usize) -> Self {
        let current_price = series.candles()[index].close;
        let values = series
            .indicators
            .keys()
            .map(|id| (*id, series.indicator_at(id, index)))
            .collect();
        Self {
            current_price,
            values,
        }
    }

    fn resolve(&self, operand: &Operand) -> Option<f64> {
        match operand {
            Operand::Literal(v) => Some(*v),
            Operand::CurrentPrice => Some(self.current_price),
            Operand::Indicator(id) => self.values.get(id).copied().flatten(),
        }
    }
}

pub fn should_execute(expr: &Expression, snapshot: &Snapshot) -> bool {
    match expr {
        Expression::Always => true,
        Expression::Compare { op, left, right } => {
            let (Some(l), Some(r)) = (snapshot.resolve(left), snapshot.resolve(right)) else {
                return false;
            };
            match op {
                CompareOp::Eq => (l - r).abs() < EPSILON,
                CompareOp::Lt => l < r,
                CompareOp::LEq => l <= r,
                CompareOp::Gt => l > r,
                CompareOp::GEq => l >= r,
            }
        }
        Expression::And(e1, e2) => should_execute(e1, snapshot) && should_execute(e2, snapshot),
        Expression::Or(e1, e2) => should_execute(e1, snapshot) || should_execute(e2, snapshot),
        Expression::Not(e) => !should_execute(e, snapshot),
    }
}
