//! Bollinger Bands indicator.
//!
//! Bollinger Bands consist of:
//! - Middle: Simple Moving Average (SMA) over n periods
//! - Upper: Middle + (multiplier × StdDev)
//! - Lower: Middle - (multiplier × StdDev)
//!
//! Where StdDev is population standard deviation (divides by N, not N-1).
//!
//! Warmup: first (period-1) values are absent.

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BollingerBands {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

pub fn calculate_bollinger(
    closes: &[f64],
    period: usize,
    stddev_mult_x100: u32,
) -> Vec<Option<BollingerBands>> {
    if period == 0 {
        return vec![None; closes.len()];
    }

    let mult = stddev_mult_x100 as f64 / 100.0;

    (0..closes.len())
        .map(|i| {
            if i + 1 < period {
                return None;
            }
            let window = &closes[i + 1 - period..=i];

            let middle = window.iter().sum::<f64>() / period as f64;
            let variance = window
                .iter()
                .map(|close| {
                    let diff = close - middle;
                    diff * diff
                })
                .sum::<f64>()
                / period as f64;
            let stddev = variance.sqrt();

            Some(BollingerBands {
                upper: middle + mult * stddev,
                middle,
                lower: middle - mult * stddev,
            })
        })
        .collect()
}
