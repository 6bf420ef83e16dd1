//! Domain error types.

use crate::domain::trade::TradeStatus;

/// A parse error with position information for condition parsing.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("parse error at position {position}: {message}")]
pub struct ParseError {
    pub message: String,
    /// Character (not byte) offset into the input.
    pub position: usize,
}

impl ParseError {
    /// Format the error with a caret pointing at the error position in the input.
    pub fn display_with_context(&self, input: &str) -> String {
        let caret = " ".repeat(self.position) + "^";
        format!(
            "{input}\n{caret}\n{err}",
            input = input,
            caret = caret,
            err = self
        )
    }
}

/// Top-level error type for cointrader.
#[derive(Debug, thiserror::Error)]
pub enum CointraderError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("invalid period '{input}': period should be an integer followed by m, h or d")]
    PeriodParse { input: String },

    #[error("invalid indicator '{spec}': {reason}")]
    IndicatorSpec { spec: String, reason: String },

    #[error("invalid strategy: {reason}")]
    StrategyInvalid { reason: String },

    #[error(transparent)]
    ExpressionParse(#[from] ParseError),

    #[error("invalid candle data: {reason}")]
    InvalidCandles { reason: String },

    #[error("market data error: {reason}")]
    MarketData { reason: String },

    #[error("no candles for {pair}")]
    NoData { pair: String },

    #[error("invalid trade: {reason}")]
    InvalidTrade { reason: String },

    #[error("cannot {action} a trade in state {status}")]
    InvalidTransition {
        status: TradeStatus,
        action: &'static str,
    },

    #[error("order for {pair} rejected: {message}")]
    OrderRejected { pair: String, message: String },

    #[error("exchange error: {reason}")]
    Exchange { reason: String },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&CointraderError> for std::process::ExitCode {
    fn from(err: &CointraderError) -> Self {
        let code: u8 = match err {
            CointraderError::Io(_) | CointraderError::Json(_) => 1,
            CointraderError::ConfigParse { .. }
            | CointraderError::ConfigMissing { .. }
            | CointraderError::ConfigInvalid { .. }
            | CointraderError::PeriodParse { .. } => 2,
            CointraderError::MarketData { .. } | CointraderError::InvalidCandles { .. } => 3,
            CointraderError::IndicatorSpec { .. }
            | CointraderError::StrategyInvalid { .. }
            | CointraderError::ExpressionParse(_) => 4,
            CointraderError::NoData { .. } => 5,
            CointraderError::InvalidTrade { .. }
            | CointraderError::InvalidTransition { .. }
            | CointraderError::OrderRejected { .. }
            | CointraderError::Exchange { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}
