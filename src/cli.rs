//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_report_adapter::JsonReportAdapter;
use crate::domain::backtest::{StrategyDocument, fetch_and_run};
use crate::domain::config_validation::{
    build_backtest_config, build_strategy_document, granularity_secs, validate_backtest_config,
    validate_data_config,
};
use crate::domain::error::CointraderError;
use crate::domain::expression_parser;
use crate::domain::indicator::IndicatorId;
use crate::ports::config_port::ConfigPort;
use crate::ports::market_data_port::MarketDataPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "cointrader", about = "Cryptocurrency strategy backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// JSON file with `indicators`, `buyStrategy` and `sellStrategy`;
        /// defaults to the `[strategy]` section of the config
        #[arg(short, long)]
        strategy: Option<PathBuf>,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        pair: Option<String>,
        #[arg(long)]
        period: Option<String>,
        /// Epoch seconds or YYYY-MM-DD
        #[arg(long)]
        start_time: Option<String>,
        #[arg(long)]
        pretty: bool,
    },
    /// Validate a strategy file or a single condition
    Validate {
        #[arg(short, long, required_unless_present = "expr", conflicts_with = "expr")]
        strategy: Option<PathBuf>,
        #[arg(long)]
        expr: Option<String>,
    },
    /// List pairs with candle data
    Pairs {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Start the web server
    Serve {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            strategy,
            output,
            pair,
            period,
            start_time,
            pretty,
        } => {
            let overrides = Overrides {
                pair,
                period,
                start_time,
            };
            finish(run_backtest(
                &config,
                strategy.as_deref(),
                output.as_deref(),
                overrides,
                pretty,
            ))
        }
        Command::Validate { strategy, expr } => match (strategy, expr) {
            (_, Some(expr)) => run_validate_expr(&expr),
            (Some(strategy), None) => finish(run_validate(&strategy)),
            (None, None) => {
                eprintln!("error: either --strategy or --expr is required");
                ExitCode::from(2)
            }
        },
        Command::Pairs { config } => finish(run_pairs(&config)),
        Command::Serve { config } => finish(run_serve(&config)),
    }
}

fn finish(result: Result<(), CointraderError>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

/// Command-line values that take precedence over `[backtest]`.
#[derive(Debug, Default)]
pub struct Overrides {
    pub pair: Option<String>,
    pub period: Option<String>,
    pub start_time: Option<String>,
}

impl Overrides {
    pub fn apply(self, config: &mut FileConfigAdapter) {
        let values = [
            ("pair", self.pair),
            ("period", self.period),
            ("start_time", self.start_time),
        ];
        for (key, value) in values {
            if let Some(value) = value {
                config.set("backtest", key, value);
            }
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, CointraderError> {
    info!(path = %path.display(), "loading config");
    FileConfigAdapter::from_file(path)
}

pub fn load_strategy(path: &Path) -> Result<StrategyDocument, CointraderError> {
    info!(path = %path.display(), "loading strategy");
    let text = fs::read_to_string(path)?;
    StrategyDocument::from_json_str(&text)
}

pub fn csv_adapter(config: &dyn ConfigPort) -> Result<CsvAdapter, CointraderError> {
    validate_data_config(config)?;
    let dir = config
        .get_string("data", "csv_dir")
        .unwrap_or_default();
    Ok(CsvAdapter::new(PathBuf::from(dir.trim())))
}

pub fn run_backtest(
    config_path: &Path,
    strategy_path: Option<&Path>,
    output_path: Option<&Path>,
    overrides: Overrides,
    pretty: bool,
) -> Result<(), CointraderError> {
    let mut config = load_config(config_path)?;
    overrides.apply(&mut config);

    let market_data = csv_adapter(&config)?;
    validate_backtest_config(&config)?;
    let bt_config = build_backtest_config(&config)?;
    let granularity = granularity_secs(&config)?;

    let document = match strategy_path {
        Some(path) => load_strategy(path)?,
        None => build_strategy_document(&config)?,
    };
    let runner = document.into_runner(bt_config)?;

    let result = fetch_and_run(&market_data, granularity, &runner)?;
    info!(
        pair = %runner.config().pair,
        buys = result.buys.len(),
        sells = result.sells.len(),
        profit = result.profit,
        open_trades = result.open_trades.len(),
        "backtest complete"
    );

    JsonReportAdapter::new(pretty).write(&result, output_path)
}

pub fn run_validate(strategy_path: &Path) -> Result<(), CointraderError> {
    let document = load_strategy(strategy_path)?;
    let display = document.display_indicators()?;

    let mut referenced = document.buy_strategy.required_indicators();
    referenced.extend(document.sell_strategy.required_indicators());

    eprintln!("Display indicators:  {}", join_ids(&display));
    eprintln!("Strategy indicators: {}", join_ids(&referenced));
    eprintln!("Buy strategy:  {}", serde_json::to_string(&document.buy_strategy)?);
    eprintln!("Sell strategy: {}", serde_json::to_string(&document.sell_strategy)?);
    eprintln!("\nStrategy is valid.");
    Ok(())
}

fn join_ids<'a>(ids: impl IntoIterator<Item = &'a IndicatorId>) -> String {
    ids.into_iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse condition text and print its JSON form on stdout.
fn run_validate_expr(expr: &str) -> ExitCode {
    match expression_parser::parse(expr) {
        Ok(parsed) => {
            println!("{}", parsed.to_json());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {}", e.display_with_context(expr));
            (&CointraderError::from(e)).into()
        }
    }
}

pub fn run_pairs(config_path: &Path) -> Result<(), CointraderError> {
    let config = load_config(config_path)?;
    let market_data = csv_adapter(&config)?;
    for pair in market_data.list_pairs()? {
        println!("{}", pair);
    }
    Ok(())
}

fn run_serve(config_path: &Path) -> Result<(), CointraderError> {
    #[cfg(feature = "web")]
    {
        use crate::adapters::web::{AppState, serve};
        use std::sync::Arc;

        let config = load_config(config_path)?;
        let market_data = csv_adapter(&config)?;
        let bind = config
            .get_string("server", "bind")
            .unwrap_or_else(|| "0.0.0.0:5000".to_string());
        let static_dir = config
            .get_string("server", "static_dir")
            .unwrap_or_else(|| "static".to_string());

        let state = AppState {
            market_data: Arc::new(market_data),
            static_dir: PathBuf::from(static_dir),
        };

        tokio::runtime::Runtime::new()?.block_on(serve(state, &bind))
    }

    #[cfg(not(feature = "web"))]
    {
        let _ = config_path;
        Err(CointraderError::ConfigInvalid {
            section: "server".to_string(),
            key: "bind".to_string(),
            reason: "built without the web feature".to_string(),
        })
    }
}
