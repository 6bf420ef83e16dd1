//! Simple Moving Average indicator.
//!
//! SMA[i] = mean(C[i-n+1..=i]). Warmup: first (n-1) values are absent.

pub fn calculate_sma(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    if period == 0 {
        return vec![None; closes.len()];
    }

    closes
        .iter()
        .enumerate()
        .map(|(i, _)| {
            if i + 1 < period {
                None
            } else {
                let window = &closes[i + 1 - period..=i];
                Some(window.iter().sum::<f64>() / period as f64)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    #[test]
    fn sma_warmup() {
        let values = calculate_sma(&[10.0, 20.0, 30.0, 40.0], 3);
        assert_eq!(values.len(), 4);
        assert!(values[0].is_none());
        assert!(values[1].is_none());
        assert!(values[2].is_some());
        assert!(values[3].is_some());
    }

    #[test]
    fn sma_trailing_mean() {
        let values = calculate_sma(&[10.0, 20.0, 30.0, 40.0], 3);
        assert_relative_eq!(values[2].unwrap(), 20.0);
        assert_relative_eq!(values[3].unwrap(), 30.0);
    }

    #[test]
    fn sma_period_1_is_identity() {
        let closes = [3.0, 1.0, 4.0];
        let values = calculate_sma(&closes, 1);
        for (v, c) in values.iter().zip(closes.iter()) {
            assert_relative_eq!(v.unwrap(), *c);
        }
    }

    #[test]
    fn sma_period_longer_than_series() {
        let values = calculate_sma(&[1.0, 2.0], 5);
        assert!(values.iter().all(Option::is_none));
    }

    #[test]
    fn sma_period_0() {
        let values = calculate_sma(&[1.0, 2.0], 0);
        assert_eq!(values, vec![None, None]);
    }

    #[test]
    fn sma_empty() {
        assert!(calculate_sma(&[], 3).is_empty());
    }

    #[test]
    fn sma_is_causal() {
        let base = [5.0, 6.0, 7.0, 8.0, 9.0];
        let mut changed = base;
        changed[4] = 1000.0;
        let a = calculate_sma(&base, 2);
        let b = calculate_sma(&changed, 2);
        assert_eq!(a[..4], b[..4]);
    }

    proptest! {
        #[test]
        fn constant_series_yields_constant_sma(v in -1.0e6f64..1.0e6, n in 1usize..40, period in 1usize..20) {
            let closes = vec![v; n];
            let values = calculate_sma(&closes, period);
            prop_assert_eq!(values.len(), n);
            for (i, value) in values.iter().enumerate() {
                if i + 1 < period {
                    prop_assert!(value.is_none());
                } else {
                    let got = value.unwrap();
                    prop_assert!((got - v).abs() <= 1e-9 * v.abs().max(1.0));
                }
            }
        }
    }
}
