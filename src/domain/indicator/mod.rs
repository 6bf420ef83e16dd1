//! Technical indicator implementations.
//!
//! This module provides types for representing indicator values and series:
//! - `IndicatorId`: indicator identity + parameters, with the `sma-9` text form
//! - `IndicatorValue`: the output shape of one indicator at one tick
//! - `IndicatorPoint`: a single timestamped, possibly absent, value
//! - `IndicatorSeries`: a time series of points aligned with the candles
//!
//! The calculations themselves are pure functions over a slice of closes and
//! live in the submodules. Every window is trailing, so the value at index `i`
//! only depends on closes at indices `<= i`.

pub mod bollinger;
pub mod ema;
pub mod rsi;
pub mod sma;

use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::domain::error::CointraderError;

pub use bollinger::BollingerBands;

pub const DEFAULT_BOLLINGER_STDDEV_X100: u32 = 200;
pub const MAX_BOLLINGER_STDDEV: f64 = 100.0;

/// Bollinger multipliers are kept in hundredths so that identifiers stay
/// `Eq + Hash`. Anything that does not convert exactly is rejected.
pub fn checked_stddev_mult(mult: f64) -> Result<u32, String> {
    if !mult.is_finite() || mult <= 0.0 || mult > MAX_BOLLINGER_STDDEV {
        return Err(format!(
            "stddev multiplier must be in (0, {}], got {}",
            MAX_BOLLINGER_STDDEV, mult
        ));
    }
    let scaled = mult * 100.0;
    let hundredths = scaled.round();
    if (scaled - hundredths).abs() > 1e-6 || hundredths < 1.0 {
        return Err(format!(
            "stddev multiplier must have at most two decimals, got {}",
            mult
        ));
    }
    Ok(hundredths as u32)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IndicatorId {
    Sma(usize),
    Ema(usize),
    Rsi(usize),
    Bollinger {
        period: usize,
        stddev_mult_x100: u32,
    },
}

impl IndicatorId {
    pub fn period(&self) -> usize {
        match self {
            IndicatorId::Sma(period) | IndicatorId::Ema(period) | IndicatorId::Rsi(period) => {
                *period
            }
            IndicatorId::Bollinger { period, .. } => *period,
        }
    }

    /// Number of leading ticks for which the indicator has no value.
    pub fn warmup(&self) -> usize {
        match self {
            IndicatorId::Rsi(period) => *period,
            _ => self.period().saturating_sub(1),
        }
    }
}

impl fmt::Display for IndicatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorId::Sma(period) => write!(f, "sma-{}", period),
            IndicatorId::Ema(period) => write!(f, "ema-{}", period),
            IndicatorId::Rsi(period) => write!(f, "rsi-{}", period),
            IndicatorId::Bollinger {
                period,
                stddev_mult_x100,
            } => {
                let mult = *stddev_mult_x100 as f64 / 100.0;
                write!(f, "bollinger-{}-{}", period, mult)
            }
        }
    }
}

impl FromStr for IndicatorId {
    type Err = CointraderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let spec = s.trim().to_lowercase();
        let invalid = |reason: &str| CointraderError::IndicatorSpec {
            spec: s.to_string(),
            reason: reason.to_string(),
        };

        let mut parts = spec.split('-');
        let kind = parts.next().unwrap_or_default();
        let period: usize = parts
            .next()
            .ok_or_else(|| invalid("missing period"))?
            .parse()
            .map_err(|_| invalid("period must be a positive integer"))?;
        if period == 0 {
            return Err(invalid("period must be a positive integer"));
        }

        let id = match kind {
            "sma" => IndicatorId::Sma(period),
            "ema" => IndicatorId::Ema(period),
            "rsi" => IndicatorId::Rsi(period),
            "bollinger" => {
                let stddev_mult_x100 = match parts.next() {
                    None => DEFAULT_BOLLINGER_STDDEV_X100,
                    Some(raw) => {
                        let mult: f64 = raw
                            .parse()
                            .map_err(|_| invalid("stddev multiplier must be a number"))?;
                        checked_stddev_mult(mult).map_err(|reason| invalid(&reason))?
                    }
                };
                IndicatorId::Bollinger {
                    period,
                    stddev_mult_x100,
                }
            }
            _ => return Err(invalid("unknown indicator kind")),
        };

        if parts.next().is_some() {
            return Err(invalid("unexpected trailing component"));
        }
        Ok(id)
    }
}

impl Serialize for IndicatorId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Parse a request list such as `["sma-9", "rsi-14", "currentprice"]`.
///
/// `currentprice` is always part of the snapshot and is skipped; duplicates
/// collapse to a single entry while preserving first-seen order.
pub fn parse_indicator_list<S: AsRef<str>>(
    specs: &[S],
) -> Result<Vec<IndicatorId>, CointraderError> {
    let mut ids = Vec::with_capacity(specs.len());
    for spec in specs {
        let spec = spec.as_ref();
        if spec.trim().eq_ignore_ascii_case("currentprice") {
            continue;
        }
        let id: IndicatorId = spec.parse()?;
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    Ok(ids)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IndicatorValue {
    Simple(f64),
    Bollinger(BollingerBands),
}

impl IndicatorValue {
    /// The scalar a strategy sees; for bands this is the middle band.
    pub fn scalar(&self) -> f64 {
        match self {
            IndicatorValue::Simple(v) => *v,
            IndicatorValue::Bollinger(bands) => bands.middle,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorPoint {
    pub timestamp: i64,
    pub value: Option<IndicatorValue>,
}

/// Serializes as `[t, v]`, `[t, upper, middle, lower]` or `[t, null]`.
impl Serialize for IndicatorPoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match &self.value {
            Some(IndicatorValue::Bollinger(bands)) => {
                let mut seq = serializer.serialize_seq(Some(4))?;
                seq.serialize_element(&self.timestamp)?;
                seq.serialize_element(&bands.upper)?;
                seq.serialize_element(&bands.middle)?;
                seq.serialize_element(&bands.lower)?;
                seq.end()
            }
            other => {
                let mut seq = serializer.serialize_seq(Some(2))?;
                seq.serialize_element(&self.timestamp)?;
                seq.serialize_element(&other.map(|v| v.scalar()))?;
                seq.end()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSeries {
    pub id: IndicatorId,
    pub values: Vec<IndicatorPoint>,
}

impl IndicatorSeries {
    pub fn scalar_at(&self, index: usize) -> Option<f64> {
        self.values
            .get(index)
            .and_then(|point| point.value)
            .map(|value| value.scalar())
    }
}

impl Serialize for IndicatorSeries {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.values.serialize(serializer)
    }
}
