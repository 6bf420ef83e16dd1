//! Web server adapter.
//!
//! Serves the static front page and the JSON API used by it:
//! `GET /pairs` and `POST /backtest`. Every API response is an envelope
//! `{response, result}`.

mod error;
mod handlers;

pub use error::WebError;
pub use handlers::*;

use axum::{
    Router,
    routing::{get, post},
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::services::{ServeDir, ServeFile};
use tracing::info;

use crate::domain::error::CointraderError;
use crate::ports::market_data_port::MarketDataPort;

pub struct AppState {
    pub market_data: Arc<dyn MarketDataPort + Send + Sync>,
    pub static_dir: PathBuf,
}

#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub response: u16,
    pub result: T,
}

impl<T> Envelope<T> {
    pub fn ok(result: T) -> Self {
        Self {
            response: 200,
            result,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let index = ServeFile::new(state.static_dir.join("index.html"));
    let assets = ServeDir::new(&state.static_dir);

    Router::new()
        .route_service("/", index)
        .route("/pairs", get(handlers::pairs))
        .route("/backtest", post(handlers::backtest))
        .nest_service("/static", assets)
        .fallback(handlers::not_found)
        .with_state(Arc::new(state))
}

/// Bind `addr` and serve until the process is stopped.
pub async fn serve(state: AppState, addr: &str) -> Result<(), CointraderError> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "web server listening");
    axum::serve(listener, build_router(state)).await?;
    Ok(())
}
