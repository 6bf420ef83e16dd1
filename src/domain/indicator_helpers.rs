//! Glue between the pure indicator functions and a candle series.

use crate::domain::candle_series::CandleSeries;
use crate::domain::indicator::bollinger::calculate_bollinger;
use crate::domain::indicator::ema::calculate_ema;
use crate::domain::indicator::rsi::calculate_rsi;
use crate::domain::indicator::sma::calculate_sma;
use crate::domain::indicator::{IndicatorId, IndicatorPoint, IndicatorSeries, IndicatorValue};

/// Compute one indicator over the series' closes. [`CandleSeries::new`]
/// has already rejected non-finite candles.
pub fn compute_indicator(series: &CandleSeries, id: IndicatorId) -> IndicatorSeries {
    let closes = series.closes();
    let values: Vec<Option<IndicatorValue>> = match id {
        IndicatorId::Sma(period) => simple(calculate_sma(&closes, period)),
        IndicatorId::Ema(period) => simple(calculate_ema(&closes, period)),
        IndicatorId::Rsi(period) => simple(calculate_rsi(&closes, period)),
        IndicatorId::Bollinger {
            period,
            stddev_mult_x100,
        } => calculate_bollinger(&closes, period, stddev_mult_x100)
            .into_iter()
            .map(|bands| bands.map(IndicatorValue::Bollinger))
            .collect(),
    };

    let values = series
        .candles()
        .iter()
        .zip(values)
        .map(|(candle, value)| IndicatorPoint {
            timestamp: candle.timestamp,
            value,
        })
        .collect();

    IndicatorSeries { id, values }
}

/// Compute every requested indicator and attach it to the series.
pub fn compute_indicators(series: &mut CandleSeries, ids: &[IndicatorId]) {
    for &id in ids {
        if series.indicators.contains_key(&id) {
            continue;
        }
        let computed = compute_indicator(series, id);
        series.attach(computed);
    }
}

fn simple(values: Vec<Option<f64>>) -> Vec<Option<IndicatorValue>> {
    values
        .into_iter()
        .map(|v| v.map(IndicatorValue::Simple))
        .collect()
}
