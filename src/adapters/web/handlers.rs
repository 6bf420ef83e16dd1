//! HTTP request handlers for the web adapter.

use axum::{
    Json,
    body::Bytes,
    extract::{Query, State},
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::domain::backtest::{BacktestConfig, BacktestResult, StrategyDocument, fetch_and_run};
use crate::domain::config_validation::{normalize_pair, parse_start_time};
use crate::domain::error::CointraderError;
use crate::domain::period::parse_period;

use super::{AppState, Envelope, WebError};

pub async fn pairs(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Envelope<Vec<String>>>, WebError> {
    let pairs = state.market_data.list_pairs()?;
    Ok(Json(Envelope::ok(pairs)))
}

/// Query string of `POST /backtest`. Fields are kept as text so a bad value
/// comes back as an error envelope rather than a bare rejection.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BacktestQuery {
    pub pair: Option<String>,
    pub period: Option<String>,
    pub capital: Option<String>,
    pub stop_loss: Option<String>,
    pub start_time: Option<String>,
}

impl BacktestQuery {
    /// Resolve the run parameters and the candle granularity in seconds.
    pub fn to_config(&self) -> Result<(BacktestConfig, u64), CointraderError> {
        let pair = required(&self.pair, "pair")?;
        let granularity_secs = parse_period(required(&self.period, "period")?)?;
        let capital = number(required(&self.capital, "capital")?, "capital")?;

        let mut config = BacktestConfig::new(normalize_pair(pair), capital);
        if let Some(raw) = present(&self.stop_loss) {
            let pct = number(raw, "stopLoss")?;
            config.stop_loss_pct = (pct != 0.0).then_some(pct);
        }
        if let Some(raw) = present(&self.start_time) {
            config.start_time = Some(
                parse_start_time(raw).map_err(|reason| invalid("startTime", reason))?,
            );
        }
        config.validate()?;
        Ok((config, granularity_secs))
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn required<'a>(value: &'a Option<String>, key: &str) -> Result<&'a str, CointraderError> {
    present(value).ok_or_else(|| CointraderError::ConfigMissing {
        section: "query".to_string(),
        key: key.to_string(),
    })
}

fn number(raw: &str, key: &str) -> Result<f64, CointraderError> {
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| invalid(key, format!("'{}' is not a number", raw)))
}

fn invalid(key: &str, reason: String) -> CointraderError {
    CointraderError::ConfigInvalid {
        section: "query".to_string(),
        key: key.to_string(),
        reason,
    }
}

pub async fn backtest(
    State(state): State<Arc<AppState>>,
    Query(query): Query<BacktestQuery>,
    body: Bytes,
) -> Result<Json<Envelope<BacktestResult>>, WebError> {
    let (config, granularity_secs) = query.to_config().inspect_err(|e| {
        warn!(error = %e, "rejected backtest request");
    })?;
    let runner = StrategyDocument::from_json_slice(&body)?.into_runner(config)?;
    info!(pair = %runner.config().pair, granularity_secs, "backtest requested");

    let market_data = Arc::clone(&state.market_data);
    let result = tokio::task::spawn_blocking(move || {
        fetch_and_run(market_data.as_ref(), granularity_secs, &runner)
    })
    .await
    .map_err(|e| WebError::internal(format!("backtest task failed: {}", e)))??;

    Ok(Json(Envelope::ok(result)))
}

pub async fn not_found() -> WebError {
    WebError::not_found("Not Found")
}
