//! Configuration validation.
//!
//! Validates all config fields before anything runs, and builds the
//! [`BacktestConfig`] from a validated config.

use crate::domain::backtest::{BacktestConfig, StrategyDocument};
use crate::domain::error::CointraderError;
use crate::domain::execution::DEFAULT_TRADING_FEE;
use crate::domain::expression_parser;
use crate::domain::period::parse_period;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;

pub fn validate_data_config(config: &dyn ConfigPort) -> Result<(), CointraderError> {
    require(config, "data", "csv_dir")?;
    Ok(())
}

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), CointraderError> {
    require(config, "backtest", "pair")?;
    validate_period(config)?;
    build_backtest_config(config)?.validate()
}

/// Candle granularity in seconds from `[backtest] period`.
pub fn granularity_secs(config: &dyn ConfigPort) -> Result<u64, CointraderError> {
    let raw = require(config, "backtest", "period")?;
    parse_period(&raw)
}

fn validate_period(config: &dyn ConfigPort) -> Result<(), CointraderError> {
    granularity_secs(config).map(|_| ()).map_err(|err| match err {
        CointraderError::PeriodParse { input } => CointraderError::ConfigInvalid {
            section: "backtest".to_string(),
            key: "period".to_string(),
            reason: format!("'{}' should be an integer followed by m, h or d", input),
        },
        other => other,
    })
}

/// Read `[backtest]` into a config. Optional keys fall back to their
/// defaults; present keys must parse.
pub fn build_backtest_config(config: &dyn ConfigPort) -> Result<BacktestConfig, CointraderError> {
    let pair = require(config, "backtest", "pair")?;
    let capital = optional_f64(config, "backtest", "capital")?.ok_or_else(|| {
        CointraderError::ConfigMissing {
            section: "backtest".to_string(),
            key: "capital".to_string(),
        }
    })?;

    let stop_loss_pct = match optional_f64(config, "backtest", "stop_loss")? {
        Some(pct) if pct == 0.0 => None,
        other => other,
    };
    let trading_fee =
        optional_f64(config, "backtest", "trading_fee")?.unwrap_or(DEFAULT_TRADING_FEE);
    let max_trades_at_once = match config.get_string("backtest", "max_trades_at_once") {
        None => 1,
        Some(raw) => config
            .get_uint("backtest", "max_trades_at_once")
            .map(|n| n as usize)
            .ok_or_else(|| CointraderError::ConfigInvalid {
                section: "backtest".to_string(),
                key: "max_trades_at_once".to_string(),
                reason: format!("'{}' is not a positive integer", raw),
            })?,
    };
    let start_time = match config.get_string("backtest", "start_time") {
        None => None,
        Some(raw) => Some(parse_start_time(&raw).map_err(|reason| {
            CointraderError::ConfigInvalid {
                section: "backtest".to_string(),
                key: "start_time".to_string(),
                reason,
            }
        })?),
    };

    Ok(BacktestConfig {
        pair: normalize_pair(&pair),
        capital,
        stop_loss_pct,
        trading_fee,
        max_trades_at_once,
        start_time,
    })
}

/// Read `[strategy]`: `indicators` is a comma separated list, `buy` and
/// `sell` are condition text.
pub fn build_strategy_document(
    config: &dyn ConfigPort,
) -> Result<StrategyDocument, CointraderError> {
    let indicators = config
        .get_string("strategy", "indicators")
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default();
    let buy = require(config, "strategy", "buy")?;
    let sell = require(config, "strategy", "sell")?;

    Ok(StrategyDocument {
        indicators,
        buy_strategy: expression_parser::parse(&buy)?,
        sell_strategy: expression_parser::parse(&sell)?,
    })
}

/// Epoch seconds, or a `YYYY-MM-DD` date taken at midnight UTC.
pub fn parse_start_time(value: &str) -> Result<i64, String> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<i64>() {
        return Ok(secs);
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp())
        .ok_or_else(|| format!("'{}' is neither epoch seconds nor YYYY-MM-DD", value))
}

/// `BTC/USD` and `btc-usd` both become `BTC-USD`.
pub fn normalize_pair(pair: &str) -> String {
    pair.trim().replace('/', "-").to_uppercase()
}

/// `BASE-QUOTE`, both sides ASCII alphanumeric.
pub fn is_valid_pair(pair: &str) -> bool {
    let alnum = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric());
    pair.split_once('-')
        .is_some_and(|(base, quote)| alnum(base) && alnum(quote))
}

fn require(config: &dyn ConfigPort, section: &str, key: &str) -> Result<String, CointraderError> {
    match config.get_string(section, key) {
        Some(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        _ => Err(CointraderError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }),
    }
}

fn optional_f64(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<f64>, CointraderError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(raw) => config
            .get_double(section, key)
            .filter(|v| v.is_finite())
            .map(Some)
            .ok_or_else(|| CointraderError::ConfigInvalid {
                section: section.to_string(),
                key: key.to_string(),
                reason: format!("'{}' is not a number", raw),
            }),
    }
}
