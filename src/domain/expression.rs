//! Strategy expression AST.
//!
//! This module defines the tree a buy or sell strategy is written in:
//! - `Operand`: what can be compared (current price, literals, indicators)
//! - `CompareOp`: the five comparison operators
//! - `Expression`: comparisons combined with And/Or/Not, or the empty
//!   (always true) tree
//!
//! The JSON form uses a `kind` tag on every node, e.g.
//! `{"kind":"GT","l":{"kind":"currentprice"},"r":{"kind":"real","val":0}}`.
//! An empty object (or `null`) is the empty tree. A JSON string is read as
//! condition text (see [`crate::domain::expression_parser`]). Unknown tags
//! are rejected here, when the tree is built, so evaluation never has to fail.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeSet;

use crate::domain::error::CointraderError;
use crate::domain::expression_parser;
use crate::domain::indicator::{IndicatorId, checked_stddev_mult};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operand {
    Literal(f64),
    CurrentPrice,
    Indicator(IndicatorId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Lt,
    LEq,
    Gt,
    GEq,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Expression {
    #[default]
    Always,
    Compare {
        op: CompareOp,
        left: Operand,
        right: Operand,
    },
    And(Box<Expression>, Box<Expression>),
    Or(Box<Expression>, Box<Expression>),
    Not(Box<Expression>),
}

impl Expression {
    pub fn compare(op: CompareOp, left: Operand, right: Operand) -> Self {
        Expression::Compare { op, left, right }
    }

    pub fn and(e1: Expression, e2: Expression) -> Self {
        Expression::And(Box::new(e1), Box::new(e2))
    }

    pub fn or(e1: Expression, e2: Expression) -> Self {
        Expression::Or(Box::new(e1), Box::new(e2))
    }

    pub fn negate(e: Expression) -> Self {
        Expression::Not(Box::new(e))
    }

    /// Every indicator the tree references.
    pub fn required_indicators(&self) -> BTreeSet<IndicatorId> {
        let mut ids = BTreeSet::new();
        self.collect_indicators(&mut ids);
        ids
    }

    fn collect_indicators(&self, ids: &mut BTreeSet<IndicatorId>) {
        match self {
            Expression::Always => {}
            Expression::Compare { left, right, .. } => {
                for operand in [left, right] {
                    if let Operand::Indicator(id) = operand {
                        ids.insert(*id);
                    }
                }
            }
            Expression::And(e1, e2) | Expression::Or(e1, e2) => {
                e1.collect_indicators(ids);
                e2.collect_indicators(ids);
            }
            Expression::Not(e) => e.collect_indicators(ids),
        }
    }

    /// Build a tree from its JSON form.
    pub fn from_json(value: serde_json::Value) -> Result<Self, CointraderError> {
        match &value {
            serde_json::Value::Null => return Ok(Expression::Always),
            serde_json::Value::Object(map) if map.is_empty() => return Ok(Expression::Always),
            serde_json::Value::String(text) => return Ok(expression_parser::parse(text)?),
            _ => {}
        }
        let wire: WireExp =
            serde_json::from_value(value).map_err(|e| CointraderError::StrategyInvalid {
                reason: e.to_string(),
            })?;
        wire.try_into()
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Expression::Always => serde_json::Value::Object(serde_json::Map::new()),
            _ => serde_json::to_value(WireExp::from(self)).unwrap_or_default(),
        }
    }
}

impl Serialize for Expression {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Expression {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        Expression::from_json(value).map_err(serde::de::Error::custom)
    }
}

fn default_stddev() -> f64 {
    2.0
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "kind")]
enum WireOperand {
    #[serde(rename = "real")]
    Real { val: f64 },
    #[serde(rename = "currentprice")]
    CurrentPrice,
    #[serde(rename = "sma")]
    Sma { period: usize },
    #[serde(rename = "ema")]
    Ema { period: usize },
    #[serde(rename = "rsi")]
    Rsi { period: usize },
    #[serde(rename = "bollinger")]
    Bollinger {
        period: usize,
        #[serde(default = "default_stddev")]
        stddev: f64,
    },
}

// Children stay as raw JSON so an empty subtree (`{}`) is legal at any depth.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "kind")]
enum WireExp {
    And { e1: serde_json::Value, e2: serde_json::Value },
    Or { e1: serde_json::Value, e2: serde_json::Value },
    Not { e: serde_json::Value },
    Eq { l: WireOperand, r: WireOperand },
    LT { l: WireOperand, r: WireOperand },
    LEq { l: WireOperand, r: WireOperand },
    GT { l: WireOperand, r: WireOperand },
    GEq { l: WireOperand, r: WireOperand },
}

impl From<&Expression> for WireExp {
    fn from(expr: &Expression) -> Self {
        match expr {
            // Callers serialize the empty tree as `{}` before reaching here.
            Expression::Always => WireExp::Eq {
                l: WireOperand::Real { val: 0.0 },
                r: WireOperand::Real { val: 0.0 },
            },
            Expression::Compare { op, left, right } => {
                let (l, r) = (WireOperand::from(*left), WireOperand::from(*right));
                match op {
                    CompareOp::Eq => WireExp::Eq { l, r },
                    CompareOp::Lt => WireExp::LT { l, r },
                    CompareOp::LEq => WireExp::LEq { l, r },
                    CompareOp::Gt => WireExp::GT { l, r },
                    CompareOp::GEq => WireExp::GEq { l, r },
                }
            }
            Expression::And(e1, e2) => WireExp::And {
                e1: e1.to_json(),
                e2: e2.to_json(),
            },
            Expression::Or(e1, e2) => WireExp::Or {
                e1: e1.to_json(),
                e2: e2.to_json(),
            },
            Expression::Not(e) => WireExp::Not { e: e.to_json() },
        }
    }
}

impl From<Operand> for WireOperand {
    fn from(operand: Operand) -> Self {
        match operand {
            Operand::Literal(val) => WireOperand::Real { val },
            Operand::CurrentPrice => WireOperand::CurrentPrice,
            Operand::Indicator(IndicatorId::Sma(period)) => WireOperand::Sma { period },
            Operand::Indicator(IndicatorId::Ema(period)) => WireOperand::Ema { period },
            Operand::Indicator(IndicatorId::Rsi(period)) => WireOperand::Rsi { period },
            Operand::Indicator(IndicatorId::Bollinger {
                period,
                stddev_mult_x100,
            }) => WireOperand::Bollinger {
                period,
                stddev: stddev_mult_x100 as f64 / 100.0,
            },
        }
    }
}

impl TryFrom<WireOperand> for Operand {
    type Error = CointraderError;

    fn try_from(wire: WireOperand) -> Result<Self, Self::Error> {
        let check_period = |kind: &str, period: usize| {
            if period == 0 {
                Err(CointraderError::StrategyInvalid {
                    reason: format!("{} period must be a positive integer", kind),
                })
            } else {
                Ok(period)
            }
        };

        Ok(match wire {
            WireOperand::Real { val } => {
                if !val.is_finite() {
                    return Err(CointraderError::StrategyInvalid {
                        reason: "real value must be finite".into(),
                    });
                }
                Operand::Literal(val)
            }
            WireOperand::CurrentPrice => Operand::CurrentPrice,
            WireOperand::Sma { period } => {
                Operand::Indicator(IndicatorId::Sma(check_period("sma", period)?))
            }
            WireOperand::Ema { period } => {
                Operand::Indicator(IndicatorId::Ema(check_period("ema", period)?))
            }
            WireOperand::Rsi { period } => {
                Operand::Indicator(IndicatorId::Rsi(check_period("rsi", period)?))
            }
            WireOperand::Bollinger { period, stddev } => {
                let stddev_mult_x100 = checked_stddev_mult(stddev).map_err(|reason| {
                    CointraderError::StrategyInvalid {
                        reason: format!("bollinger {}", reason),
                    }
                })?;
                Operand::Indicator(IndicatorId::Bollinger {
                    period: check_period("bollinger", period)?,
                    stddev_mult_x100,
                })
            }
        })
    }
}

impl TryFrom<WireExp> for Expression {
    type Error = CointraderError;

    fn try_from(wire: WireExp) -> Result<Self, Self::Error> {
        let compare = |op, l: WireOperand, r: WireOperand| -> Result<Expression, CointraderError> {
            Ok(Expression::compare(op, l.try_into()?, r.try_into()?))
        };

        match wire {
            WireExp::And { e1, e2 } => Ok(Expression::and(
                Expression::from_json(e1)?,
                Expression::from_json(e2)?,
            )),
            WireExp::Or { e1, e2 } => Ok(Expression::or(
                Expression::from_json(e1)?,
                Expression::from_json(e2)?,
            )),
            WireExp::Not { e } => Ok(Expression::negate(Expression::from_json(e)?)),
            WireExp::Eq { l, r } => compare(CompareOp::Eq, l, r),
            WireExp::LT { l, r } => compare(CompareOp::Lt, l, r),
            WireExp::LEq { l, r } => compare(CompareOp::LEq, l, r),
            WireExp::GT { l, r } => compare(CompareOp::Gt, l, r),
            WireExp::GEq { l, r } => compare(CompareOp::GEq, l, r),
        }
    }
}
