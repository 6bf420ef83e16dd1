//! Candle granularity strings (`15m`, `1h`, `1d`).

use crate::domain::error::CointraderError;

/// Convert a period string into its length in seconds.
pub fn parse_period(input: &str) -> Result<u64, CointraderError> {
    let invalid = || CointraderError::PeriodParse {
        input: input.to_string(),
    };

    let trimmed = input.trim();
    let digits_end = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    let (count, unit) = trimmed.split_at(digits_end);

    let count: u64 = count.parse().map_err(|_| invalid())?;
    let unit_secs = match unit {
        "m" => 60,
        "h" => 60 * 60,
        "d" => 24 * 60 * 60,
        _ => return Err(invalid()),
    };

    match count.checked_mul(unit_secs) {
        Some(secs) if secs > 0 => Ok(secs),
        _ => Err(invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_each_unit() {
        assert_eq!(parse_period("15m").unwrap(), 900);
        assert_eq!(parse_period("1h").unwrap(), 3_600);
        assert_eq!(parse_period("6h").unwrap(), 21_600);
        assert_eq!(parse_period("1d").unwrap(), 86_400);
        assert_eq!(parse_period(" 5m ").unwrap(), 300);
    }

    #[test]
    fn rejects_missing_count() {
        assert!(matches!(
            parse_period("h"),
            Err(CointraderError::PeriodParse { .. })
        ));
        assert!(parse_period("").is_err());
    }

    #[test]
    fn rejects_unknown_unit() {
        assert!(parse_period("15s").is_err());
        assert!(parse_period("1w").is_err());
        assert!(parse_period("15").is_err());
        assert!(parse_period("1hh").is_err());
    }

    #[test]
    fn rejects_zero() {
        assert!(parse_period("0m").is_err());
    }
}
