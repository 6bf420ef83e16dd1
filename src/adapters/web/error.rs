//! Error envelopes for the web adapter.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::error::Error;

use crate::domain::error::CointraderError;

use super::Envelope;

#[derive(Debug)]
pub struct WebError {
    pub status: StatusCode,
    pub message: String,
    pub stack_trace: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    message: &'a str,
    stack_trace: &'a str,
}

impl WebError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            status,
            stack_trace: message.clone(),
            message,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

/// The error and each of its sources, one per line.
pub fn source_chain(err: &(dyn Error + 'static)) -> String {
    let mut lines = vec![err.to_string()];
    let mut source = err.source();
    while let Some(cause) = source {
        lines.push(format!("caused by: {}", cause));
        source = cause.source();
    }
    lines.join("\n")
}

impl From<CointraderError> for WebError {
    fn from(err: CointraderError) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: err.to_string(),
            stack_trace: source_chain(&err),
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        // The page reads the envelope only from 200 responses; API failures
        // carry their code in `response`.
        let http_status = if self.status == StatusCode::NOT_FOUND {
            StatusCode::NOT_FOUND
        } else {
            StatusCode::OK
        };
        let body = Envelope {
            response: self.status.as_u16(),
            result: ErrorBody {
                message: &self.message,
                stack_trace: &self.stack_trace,
            },
        };
        (http_status, Json(body)).into_response()
    }
}
