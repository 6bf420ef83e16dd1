//! JSON report adapter implementing ReportPort.
//!
//! Writes the result in the `{buys, sells, closingPrices, indicators, profit}`
//! shape served by the HTTP API.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use tracing::info;

use crate::domain::backtest::BacktestResult;
use crate::domain::error::CointraderError;
use crate::ports::report_port::ReportPort;

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonReportAdapter {
    pub pretty: bool,
}

impl JsonReportAdapter {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    pub fn render(&self, result: &BacktestResult) -> Result<String, CointraderError> {
        let text = if self.pretty {
            serde_json::to_string_pretty(result)?
        } else {
            serde_json::to_string(result)?
        };
        Ok(text)
    }
}

impl ReportPort for JsonReportAdapter {
    fn write(
        &self,
        result: &BacktestResult,
        output_path: Option<&Path>,
    ) -> Result<(), CointraderError> {
        let text = self.render(result)?;
        match output_path {
            Some(path) => {
                fs::write(path, text + "\n")?;
                info!(path = %path.display(), "report written");
            }
            None => {
                let mut stdout = io::stdout().lock();
                writeln!(stdout, "{}", text)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn sample_result() -> BacktestResult {
        BacktestResult {
            buys: vec![(60, 10.0)],
            sells: vec![(120, 12.5)],
            closing_prices: vec![(60, 10.0), (120, 12.5)],
            indicators: BTreeMap::new(),
            profit: 24.9375,
            final_reserve: 124.6875,
            open_trades: Vec::new(),
        }
    }

    #[test]
    fn render_compact() {
        let text = JsonReportAdapter::new(false).render(&sample_result()).unwrap();
        assert_eq!(
            text,
            r#"{"buys":[[60,10.0]],"sells":[[120,12.5]],"closingPrices":[[60,10.0],[120,12.5]],"indicators":{},"profit":24.9375}"#
        );
    }

    #[test]
    fn render_pretty_is_multiline() {
        let text = JsonReportAdapter::new(true).render(&sample_result()).unwrap();
        assert!(text.lines().count() > 1);
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["profit"], serde_json::json!(24.9375));
    }

    #[test]
    fn write_to_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("result.json");
        JsonReportAdapter::default()
            .write(&sample_result(), Some(&path))
            .unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(value["sells"], serde_json::json!([[120, 12.5]]));
    }

    #[test]
    fn write_to_missing_directory_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").join("result.json");
        let err = JsonReportAdapter::default()
            .write(&sample_result(), Some(&path))
            .unwrap_err();
        assert!(matches!(err, CointraderError::Io(_)));
    }
}
