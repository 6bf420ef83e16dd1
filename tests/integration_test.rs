//! Integration tests for the backtest pipeline.
//!
//! Tests cover:
//! - Buy-and-hold and round-trip trades on small series
//! - Fee and stop-loss arithmetic
//! - Several trades open at once
//! - Indicator-driven strategies loaded from JSON
//! - Fetching through the market data port
//! - Live sessions against an exchange that fills immediately
//! - Determinism and accounting properties

mod common;

use approx::assert_relative_eq;
use cointrader::domain::backtest::{
    BacktestConfig, BacktestResult, BacktestRunner, StrategyDocument, fetch_and_run,
};
use cointrader::domain::error::CointraderError;
use cointrader::domain::evaluate::{Snapshot, should_execute};
use cointrader::domain::execution::ExecutionParams;
use cointrader::domain::expression::Expression;
use cointrader::domain::indicator::IndicatorId;
use cointrader::domain::live::LiveSession;
use cointrader::domain::trade::TradeStatus;
use cointrader::ports::exchange_port::{ExchangePort, OrderAck, OrderStatus};
use common::*;
use proptest::prelude::*;
use std::cell::Cell;

fn run(
    config: BacktestConfig,
    buy: Expression,
    sell: Expression,
    closes: &[f64],
) -> BacktestResult {
    BacktestRunner::new(config, buy, sell, vec![])
        .unwrap()
        .run(candles_from_closes(closes))
        .unwrap()
}

fn t(i: i64) -> i64 {
    START + HOUR * i
}

mod basic_runs {
    use super::*;

    #[test]
    fn rising_series_buys_once_and_holds() {
        let config = zero_fee_config(1_000.0);
        let result = BacktestRunner::new(config, Expression::Always, never(), vec![])
            .unwrap()
            .run(rising_candles(20, 100.0))
            .unwrap();

        assert_eq!(result.buys, vec![(t(0), 100.0)]);
        assert!(result.sells.is_empty());
        assert_eq!(result.final_reserve, 0.0);
        assert_eq!(result.open_trades.len(), 1);
        assert_eq!(result.open_trades[0].status, TradeStatus::Open);
    }

    #[test]
    fn two_candles_capital_100() {
        let result = run(zero_fee_config(100.0), Expression::Always, never(), &[10.0, 20.0]);

        assert_eq!(result.buys, vec![(t(0), 10.0)]);
        assert!(result.sells.is_empty());
        assert_eq!(result.profit, 0.0);
        assert_eq!(result.final_reserve, 0.0);
        assert_eq!(result.closing_prices, vec![(t(0), 10.0), (t(1), 20.0)]);
    }

    #[test]
    fn flat_round_trip_has_zero_profit() {
        let result = run(
            zero_fee_config(100.0),
            Expression::Always,
            Expression::Always,
            &[10.0, 10.0, 10.0],
        );

        // the slot is busy on tick 1, so the next buy waits for tick 2
        assert_eq!(result.buys, vec![(t(0), 10.0), (t(2), 10.0)]);
        assert_eq!(result.sells, vec![(t(1), 10.0)]);
        assert_eq!(result.profit, 0.0);
    }

    #[test]
    fn no_close_on_the_buy_tick() {
        let result = run(zero_fee_config(100.0), Expression::Always, Expression::Always, &[10.0]);
        assert_eq!(result.buys.len(), 1);
        assert!(result.sells.is_empty());
        assert_eq!(result.open_trades.len(), 1);
    }

    #[test]
    fn identical_inputs_give_identical_results() {
        let closes = [10.0, 12.0, 9.0, 14.0, 8.0, 15.0, 7.0];
        let make = || {
            run(
                BacktestConfig::new("BTC-USD", 250.0),
                price_below(10.0),
                price_above(13.0),
                &closes,
            )
        };
        let a = make();
        let b = make();
        assert_eq!(
            serde_json::to_value(&a).unwrap(),
            serde_json::to_value(&b).unwrap()
        );
        assert_eq!(a.final_reserve, b.final_reserve);
    }
}

mod fees_and_stops {
    use super::*;

    #[test]
    fn entry_and_exit_fees() {
        let result = run(
            BacktestConfig::new("BTC-USD", 100.0),
            price_below(15.0),
            price_above(15.0),
            &[10.0, 20.0],
        );

        // quote 99.75 buys 9.975; proceeds 199.5, profit 99.75, both net of 0.25%
        assert_eq!(result.sells, vec![(t(1), 20.0)]);
        assert_relative_eq!(result.profit, 99.500_625, epsilon = 1e-9);
        assert_relative_eq!(result.final_reserve, 199.001_25, epsilon = 1e-9);
    }

    #[test]
    fn stop_loss_closes_below_threshold() {
        let config = BacktestConfig {
            stop_loss_pct: Some(0.1),
            ..zero_fee_config(100.0)
        };
        let result = run(config, price_above(99.0), never(), &[100.0, 95.0, 89.0, 80.0]);

        assert_eq!(result.buys, vec![(t(0), 100.0)]);
        assert_eq!(result.sells, vec![(t(2), 89.0)]);
        assert_relative_eq!(result.profit, -11.0, epsilon = 1e-9);
        assert_relative_eq!(result.final_reserve, 89.0, epsilon = 1e-9);
        assert!(result.open_trades.is_empty());
    }

    #[test]
    fn stop_loss_is_strict() {
        let config = BacktestConfig {
            stop_loss_pct: Some(0.1),
            ..zero_fee_config(100.0)
        };
        let result = run(config, price_above(99.0), never(), &[100.0, 90.0]);
        assert!(result.sells.is_empty());
        assert_eq!(result.open_trades.len(), 1);
    }
}

mod multiple_trades {
    use super::*;

    fn two_slots() -> BacktestConfig {
        BacktestConfig {
            max_trades_at_once: 2,
            ..zero_fee_config(100.0)
        }
    }

    #[test]
    fn reserve_is_split_across_free_slots() {
        let result = run(two_slots(), Expression::Always, never(), &[10.0, 20.0, 30.0]);

        assert_eq!(result.buys, vec![(t(0), 10.0), (t(1), 20.0)]);
        assert_eq!(result.open_trades.len(), 2);
        assert_relative_eq!(result.open_trades[0].amount_base, 5.0);
        assert_relative_eq!(result.open_trades[1].amount_base, 2.5);
        assert_eq!(result.final_reserve, 0.0);
    }

    #[test]
    fn one_signal_closes_every_open_trade() {
        let result = run(two_slots(), price_below(25.0), price_above(25.0), &[10.0, 20.0, 30.0]);

        assert_eq!(result.sells, vec![(t(2), 30.0), (t(2), 30.0)]);
        assert_relative_eq!(result.profit, 125.0, epsilon = 1e-9);
        assert_relative_eq!(result.final_reserve, 225.0, epsilon = 1e-9);
        assert!(result.open_trades.is_empty());
    }
}

mod strategy_documents {
    use super::*;

    const SMA_CROSS: &str = r#"{
        "indicators": ["sma-3", "currentprice"],
        "buyStrategy": {"kind": "GT", "l": {"kind": "currentprice"}, "r": {"kind": "sma", "period": 3}},
        "sellStrategy": {"kind": "LT", "l": {"kind": "currentprice"}, "r": {"kind": "sma", "period": 3}}
    }"#;

    #[test]
    fn sma_cross_through_market_data_port() {
        let port = MockMarketDataPort::new().with_candles(
            "BTC-USD",
            3_600,
            candles_from_closes(&[10.0, 10.0, 10.0, 20.0, 5.0]),
        );
        let runner = StrategyDocument::from_json_str(SMA_CROSS)
            .unwrap()
            .into_runner(zero_fee_config(100.0))
            .unwrap();

        let result = fetch_and_run(&port, 3_600, &runner).unwrap();

        assert_eq!(result.buys, vec![(t(3), 20.0)]);
        assert_eq!(result.sells, vec![(t(4), 5.0)]);
        assert_relative_eq!(result.profit, -75.0, epsilon = 1e-9);

        let value = serde_json::to_value(&result).unwrap();
        let sma = &value["indicators"]["sma-3"];
        assert_eq!(sma[0], serde_json::json!([t(0), null]));
        assert_eq!(sma[2], serde_json::json!([t(2), 10.0]));
        assert_eq!(sma.as_array().unwrap().len(), 5);
    }

    #[test]
    fn display_indicators_do_not_change_trades() {
        let port = MockMarketDataPort::new().with_candles(
            "BTC-USD",
            3_600,
            candles_from_closes(&[10.0, 12.0, 9.0, 14.0, 8.0]),
        );
        let bare = BacktestRunner::new(
            zero_fee_config(100.0),
            price_below(10.0),
            price_above(13.0),
            vec![],
        )
        .unwrap();
        let decorated = BacktestRunner::new(
            zero_fee_config(100.0),
            price_below(10.0),
            price_above(13.0),
            vec![IndicatorId::Ema(2), IndicatorId::Rsi(2)],
        )
        .unwrap();

        let a = fetch_and_run(&port, 3_600, &bare).unwrap();
        let b = fetch_and_run(&port, 3_600, &decorated).unwrap();
        assert_eq!(a.buys, b.buys);
        assert_eq!(a.sells, b.sells);
        assert_eq!(a.profit, b.profit);
        assert_eq!(b.indicators.len(), 2);
    }

    #[test]
    fn missing_pair_is_no_data() {
        let port = MockMarketDataPort::new();
        let runner =
            BacktestRunner::new(zero_fee_config(100.0), Expression::Always, never(), vec![])
                .unwrap();
        assert!(matches!(
            fetch_and_run(&port, 3_600, &runner),
            Err(CointraderError::NoData { .. })
        ));
    }

    #[test]
    fn port_errors_propagate() {
        let port = MockMarketDataPort::new().with_error("BTC-USD", "exchange down");
        let runner =
            BacktestRunner::new(zero_fee_config(100.0), Expression::Always, never(), vec![])
                .unwrap();
        let err = fetch_and_run(&port, 3_600, &runner).unwrap_err();
        assert!(matches!(err, CointraderError::MarketData { .. }));
        assert!(err.to_string().contains("exchange down"));
    }

    #[test]
    fn json_round_trip_preserves_evaluation() {
        let doc = StrategyDocument::from_json_str(SMA_CROSS).unwrap();
        let text = serde_json::to_string(&doc).unwrap();
        let back = StrategyDocument::from_json_str(&text).unwrap();
        assert_eq!(back, doc);

        for (price, sma) in [(9.0, Some(10.0)), (11.0, Some(10.0)), (11.0, None)] {
            let snapshot = Snapshot::new(price).with(IndicatorId::Sma(3), sma);
            assert_eq!(
                should_execute(&back.buy_strategy, &snapshot),
                should_execute(&doc.buy_strategy, &snapshot)
            );
        }
    }
}

mod live_sessions {
    use super::*;

    /// Accepts every order and reports it filled on the next poll.
    #[derive(Default)]
    struct InstantExchange {
        next_id: Cell<u32>,
    }

    impl InstantExchange {
        fn accept(&self) -> OrderAck {
            self.next_id.set(self.next_id.get() + 1);
            OrderAck::Accepted {
                order_id: format!("order-{}", self.next_id.get()),
            }
        }
    }

    impl ExchangePort for InstantExchange {
        fn buy(&self, _: &str, _: f64, _: f64) -> Result<OrderAck, CointraderError> {
            Ok(self.accept())
        }

        fn sell(&self, _: &str, _: f64, _: f64) -> Result<OrderAck, CointraderError> {
            Ok(self.accept())
        }

        fn order_status(&self, _: &str) -> Result<OrderStatus, CointraderError> {
            Ok(OrderStatus::Done)
        }
    }

    #[test]
    fn live_session_matches_backtest_once_filled() {
        let closes = [10.0, 20.0, 15.0];
        let params = ExecutionParams {
            trading_fee: 0.0,
            ..Default::default()
        };
        let mut live = LiveSession::new(
            InstantExchange::default(),
            "BTC-USD",
            100.0,
            params,
            price_below(12.0),
            price_above(18.0),
        )
        .unwrap();

        let candles = candles_from_closes(&closes);
        for end in 1..=candles.len() {
            live.step(candles[..end].to_vec()).unwrap();
        }

        let backtest = run(zero_fee_config(100.0), price_below(12.0), price_above(18.0), &closes);
        assert_eq!(live.ledger().buys, backtest.buys);
        assert_eq!(live.ledger().sells, backtest.sells);
        assert_relative_eq!(live.ledger().profit, backtest.profit, epsilon = 1e-9);
        assert!(live.closing_trades().is_empty());
    }
}

proptest! {
    #[test]
    fn accounting_balances_without_fees(
        closes in prop::collection::vec(1.0f64..1_000.0, 1..60),
        buy_below in 1.0f64..1_000.0,
        sell_above in 1.0f64..1_000.0,
    ) {
        let result = run(zero_fee_config(1_000.0), price_below(buy_below), price_above(sell_above), &closes);

        prop_assert!(result.buys.len() >= result.sells.len());
        prop_assert_eq!(result.buys.len() - result.sells.len(), result.open_trades.len());
        prop_assert!(result.open_trades.len() <= 1);
        // reserve and an open trade are mutually exclusive
        prop_assert_eq!(result.final_reserve == 0.0, result.open_trades.len() == 1);

        let committed: f64 = result.open_trades.iter().map(|t| t.cost()).sum();
        let expected = 1_000.0 + result.profit;
        prop_assert!((result.final_reserve + committed - expected).abs() <= 1e-6 * expected.abs().max(1.0));
    }

    #[test]
    fn runs_are_deterministic(closes in prop::collection::vec(1.0f64..100.0, 1..40)) {
        let config = BacktestConfig { max_trades_at_once: 3, ..BacktestConfig::new("BTC-USD", 10.0) };
        let a = run(config.clone(), price_below(50.0), price_above(60.0), &closes);
        let b = run(config, price_below(50.0), price_above(60.0), &closes);
        prop_assert_eq!(serde_json::to_value(&a).unwrap(), serde_json::to_value(&b).unwrap());
    }
}
