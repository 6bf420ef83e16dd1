//! RSI (Relative Strength Index) indicator implementation.
//!
//! Uses Wilder's smoothing for average gain/loss calculation:
//! - First average: simple mean of gains/losses over the first n changes
//! - Subsequent: avg = (prev_avg * (n-1) + current) / n
//!
//! Formula: RSI = 100 - (100 / (1 + avg_gain / avg_loss))
//! If avg_loss == 0: RSI = 100
//!
//! Warmup: first n values are absent (n price changes are needed).

pub fn calculate_rsi(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    if period == 0 || closes.len() < 2 {
        return vec![None; closes.len()];
    }

    let mut values = Vec::with_capacity(closes.len());
    values.push(None);

    let mut gains: Vec<f64> = Vec::with_capacity(closes.len() - 1);
    let mut losses: Vec<f64> = Vec::with_capacity(closes.len() - 1);

    for pair in closes.windows(2) {
        let change = pair[1] - pair[0];
        gains.push(if change > 0.0 { change } else { 0.0 });
        losses.push(if change < 0.0 { -change } else { 0.0 });
    }

    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;

    for change_idx in 0..gains.len() {
        if change_idx < period - 1 {
            values.push(None);
            continue;
        }

        if change_idx == period - 1 {
            avg_gain = gains[..period].iter().sum::<f64>() / period as f64;
            avg_loss = losses[..period].iter().sum::<f64>() / period as f64;
        } else {
            avg_gain = (avg_gain * (period - 1) as f64 + gains[change_idx]) / period as f64;
            avg_loss = (avg_loss * (period - 1) as f64 + losses[change_idx]) / period as f64;
        }

        values.push(Some(relative_strength_index(avg_gain, avg_loss)));
    }

    values
}

fn relative_strength_index(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - (100.0 / (1.0 + avg_gain / avg_loss))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rsi_empty() {
        assert!(calculate_rsi(&[], 14).is_empty());
    }

    #[test]
    fn rsi_single_close() {
        assert_eq!(calculate_rsi(&[100.0], 14), vec![None]);
    }

    #[test]
    fn rsi_warmup_period() {
        let closes: Vec<f64> = (1..=15).map(|i| 100.0 + (i as f64 % 5.0) * 2.0).collect();
        let values = calculate_rsi(&closes, 14);

        assert_eq!(values.len(), 15);
        for (i, value) in values.iter().enumerate().take(14) {
            assert!(value.is_none(), "tick {} should be absent", i);
        }
        assert!(values[14].is_some(), "tick 14 should have a value");
    }

    #[test]
    fn rsi_all_gains_no_losses() {
        let closes: Vec<f64> = (0..15).map(|i| 100.0 + i as f64).collect();
        let values = calculate_rsi(&closes, 14);
        assert!((values[14].unwrap() - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn rsi_all_losses_no_gains() {
        let closes: Vec<f64> = (0..15).map(|i| 100.0 - i as f64).collect();
        let values = calculate_rsi(&closes, 14);
        assert!(values[14].unwrap().abs() < f64::EPSILON);
    }

    #[test]
    fn rsi_in_range() {
        let closes: Vec<f64> = (1..=40)
            .map(|i| 100.0 + (i as f64 % 7.0 - 3.0) * 2.0)
            .collect();

        for rsi in calculate_rsi(&closes, 14).into_iter().flatten() {
            assert!((0.0..=100.0).contains(&rsi), "RSI {} out of range", rsi);
        }
    }

    #[test]
    fn rsi_zero_period() {
        assert_eq!(calculate_rsi(&[100.0, 101.0], 0), vec![None, None]);
    }

    #[test]
    fn rsi_wilder_smoothing_step() {
        // changes: +2, -1, +3 with period 2
        let values = calculate_rsi(&[10.0, 12.0, 11.0, 14.0], 2);
        assert!(values[0].is_none());
        assert!(values[1].is_none());

        let (g, l) = (1.0, 0.5);
        let first = 100.0 - 100.0 / (1.0 + g / l);
        assert!((values[2].unwrap() - first).abs() < 1e-9);

        let (g, l) = ((g * 1.0 + 3.0) / 2.0, (l * 1.0 + 0.0) / 2.0);
        let second = 100.0 - 100.0 / (1.0 + g / l);
        assert!((values[3].unwrap() - second).abs() < 1e-9);
    }

    #[test]
    fn rsi_known_calculation() {
        let closes = [
            44.0, 44.25, 44.50, 43.75, 44.50, 44.25, 44.75, 45.25, 45.50, 45.25, 45.50, 46.0,
            46.25, 46.0, 46.50,
        ];
        let rsi = calculate_rsi(&closes, 14)[14].unwrap();
        assert!(rsi > 50.0 && rsi < 100.0, "RSI should be in bullish territory");
    }
}
