//! Core domain types and logic.

pub mod candle;
pub mod candle_series;
pub mod indicator;
pub mod indicator_helpers;
pub mod expression;
pub mod expression_parser;
pub mod evaluate;
pub mod period;
pub mod trade;
pub mod ledger;
pub mod execution;
pub mod backtest;
pub mod live;
pub mod config_validation;
pub mod error;
