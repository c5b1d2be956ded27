//! Integration tests across ledger, strategy, signal pipeline and the
//! backtest driver, using in-memory candles and the simulated market.

mod common;

use approx::assert_relative_eq;
use common::*;
use investr::adapters::memory_source::MemoryCandleSource;
use investr::adapters::simulated_market::SimulatedMarket;
use investr::domain::backtest::{run_backtest, BacktestResult, SignalPipeline};
use investr::domain::decision::{Decision, Side};
use investr::domain::error::InvestrError;
use investr::domain::frequency::Frequency;
use investr::domain::ledger::OrderLedger;
use investr::domain::order::{Order, OrderRequest};
use investr::domain::strategy::{Action, Strategy, StrategyConfig, StrategyState};
use investr::domain::trend::TrendDetector;
use investr::ports::market_port::Market;

/// Drops to 100 (BUY), flat (HOLD), back to 110 (SELL), flat.
const ROUND_TRIP: [f64; 5] = [110.0, 100.0, 100.0, 110.0, 110.0];

fn hourly_pipeline() -> SignalPipeline {
    SignalPipeline::new(vec![ma_group(Frequency::ONE_HOUR, &[2])], TrendDetector::default())
        .unwrap()
}

fn run_hourly(
    closes: &[f64],
    end_hour: i64,
    market: &mut dyn Market,
) -> (Result<BacktestResult, InvestrError>, Strategy) {
    let source = MemoryCandleSource::new().with_series(Frequency::ONE_HOUR, hourly(closes));
    let mut strategy = Strategy::new(strategy_config());
    let result = run_backtest(
        &backtest_config(0, end_hour),
        &hourly_pipeline(),
        &mut strategy,
        &source,
        market,
    );
    (result, strategy)
}

mod ledger_scenarios {
    use super::*;

    #[test]
    fn buy_then_sell_realizes_difference() {
        let mut ledger = OrderLedger::new();
        ledger.record(order(1, Side::Buy, 1.0, 100.0)).unwrap();
        let trade = ledger.record(order(2, Side::Sell, 1.0, 110.0)).unwrap().unwrap();

        assert_eq!((trade.buy_id, trade.sell_id), (1, 2));
        assert_relative_eq!(ledger.realized_pnl(), 10.0);
        assert!(ledger.unpaired_orders().is_empty());
        assert_eq!(ledger.order(1).unwrap().paired_with, Some(2));
        assert_eq!(ledger.order(2).unwrap().paired_with, Some(1));
    }

    #[test]
    fn two_open_buys_are_reported_in_submission_order() {
        let mut ledger = OrderLedger::new();
        ledger.record(order(1, Side::Buy, 5.0, 100.0)).unwrap();
        ledger.record(order(2, Side::Buy, 5.0, 100.0)).unwrap();

        let unpaired = ledger.unpaired_orders();
        let ids: Vec<u64> = unpaired.buys.iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert!(unpaired.sells.is_empty());
        assert!(ledger.unrealized_pnl(120.0) > 0.0);
        assert_relative_eq!(ledger.unrealized_pnl(120.0), 200.0);
    }

    #[test]
    fn sell_first_is_closed_by_later_buy() {
        let mut ledger = OrderLedger::new();
        ledger.record(order(1, Side::Sell, 2.0, 50.0)).unwrap();
        assert_relative_eq!(ledger.unrealized_pnl(40.0), 20.0);

        let trade = ledger.record(order(2, Side::Buy, 2.0, 45.0)).unwrap().unwrap();
        assert_eq!((trade.buy_id, trade.sell_id), (2, 1));
        assert_relative_eq!(trade.profit, 10.0);
        ledger.verify().unwrap();
    }
}

mod group_scenarios {
    use super::*;

    #[test]
    fn one_buy_one_hold_is_hold_under_default_policy() {
        // MA(2): close 100 under mean 105 -> BUY. MA(3): close equals mean -> HOLD.
        let group = ma_group(Frequency::ONE_HOUR, &[2, 3]);
        let evaluation = group.evaluate(&hourly(&[90.0, 110.0, 100.0])).unwrap();

        let votes: Vec<Decision> = evaluation
            .votes
            .iter()
            .map(|v| v.outcome.decision())
            .collect();
        assert_eq!(votes, vec![Decision::Buy, Decision::Hold]);
        assert_eq!(evaluation.decision(), Decision::Hold);
        assert_eq!(evaluation.frequency_decision.frequency, Frequency::ONE_HOUR);
    }

    #[test]
    fn short_window_votes_hold_for_long_members() {
        let group = ma_group(Frequency::ONE_HOUR, &[2, 50]);
        let evaluation = group.evaluate(&hourly(&[110.0, 100.0])).unwrap();
        assert_eq!(evaluation.insufficient_count(), 1);
        assert_eq!(evaluation.decision(), Decision::Hold);
    }
}

mod strategy_scenarios {
    use super::*;

    #[test]
    fn timeout_cools_down_without_forced_sell() {
        let mut strategy = Strategy::new(strategy_config());
        let mut market = SimulatedMarket::new();

        strategy.step(&tick(0, 100.0, Decision::Buy), &mut market).unwrap();
        assert!(matches!(strategy.state(), StrategyState::Holding { .. }));

        strategy.step(&tick(3, 100.0, Decision::Hold), &mut market).unwrap();
        assert!(matches!(strategy.state(), StrategyState::Holding { .. }));

        let outcome = strategy.step(&tick(7, 100.0, Decision::Hold), &mut market).unwrap();
        assert_eq!(outcome.state, StrategyState::Cooldown { until: at(19) });
        assert_eq!(outcome.action, Action::None);

        let unpaired = strategy.unpaired_orders();
        assert_eq!(unpaired.buys.len(), 1);
        assert_eq!(unpaired.buys[0].id, 1);
        assert_eq!(market.fills().len(), 1);

        // signals are ignored while cooling down
        strategy.step(&tick(10, 120.0, Decision::Sell), &mut market).unwrap();
        assert_eq!(market.fills().len(), 1);

        let outcome = strategy.step(&tick(19, 120.0, Decision::Hold), &mut market).unwrap();
        assert_eq!(outcome.state, StrategyState::Idle);
        assert_eq!(strategy.unpaired_orders().buys.len(), 1);
    }

    #[test]
    fn sustained_unprofitable_sells_still_time_out() {
        let mut strategy = Strategy::new(StrategyConfig {
            min_profit: Some(0.0),
            ..strategy_config()
        });
        let mut market = SimulatedMarket::new();
        strategy.step(&tick(0, 100.0, Decision::Buy), &mut market).unwrap();

        for hour in 1..=48 {
            strategy.step(&tick(hour, 80.0, Decision::Sell), &mut market).unwrap();
        }

        // timed out at h7, cooled down until h19, idle afterwards
        assert_eq!(strategy.state(), StrategyState::Idle);
        assert_eq!(market.fills().len(), 1);
        assert_eq!(strategy.unpaired_orders().buys.len(), 1);
        assert!(strategy.skipped().iter().all(|s| s.side == Side::Sell));
    }

    #[test]
    fn rejected_buy_on_expiry_tick_stays_in_cooldown() {
        let mut strategy = Strategy::new(strategy_config());
        let mut market = SimulatedMarket::new().reject_submission(1, "exchange halted");
        strategy.step(&tick(0, 100.0, Decision::Buy), &mut market).unwrap();
        strategy.step(&tick(7, 100.0, Decision::Hold), &mut market).unwrap();
        let cooling = StrategyState::Cooldown { until: at(19) };

        let err = strategy.step(&tick(19, 90.0, Decision::Buy), &mut market).unwrap_err();
        assert!(matches!(err, InvestrError::MarketRejected { .. }));
        assert_eq!(strategy.state(), cooling);

        let outcome = strategy.step(&tick(20, 90.0, Decision::Buy), &mut market).unwrap();
        assert_eq!(outcome.previous, cooling);
        assert!(matches!(outcome.state, StrategyState::Holding { since, .. } if since == at(20)));
    }

    #[test]
    fn pnl_tracks_open_buy() {
        let mut strategy = Strategy::new(strategy_config());
        let mut market = SimulatedMarket::new();
        strategy.step(&tick(0, 100.0, Decision::Buy), &mut market).unwrap();

        assert_relative_eq!(strategy.pnl(100.0), 0.0);
        assert_relative_eq!(strategy.pnl(110.0), 50.0);
        assert_relative_eq!(strategy.equity(110.0), 1050.0);
    }
}

mod backtest_pipeline {
    use super::*;

    #[test]
    fn round_trip_realizes_profit() {
        let mut market = SimulatedMarket::new();
        let (result, strategy) = run_hourly(&ROUND_TRIP, 4, &mut market);
        let result = result.unwrap();

        assert_eq!(result.ticks.len(), 5);
        assert_eq!(result.skipped_ticks, 0);
        assert_eq!(result.final_rate, Some(110.0));

        let decisions: Vec<Decision> = result.ticks.iter().map(|t| t.trend.decision).collect();
        assert_eq!(
            decisions,
            vec![
                Decision::Hold,
                Decision::Buy,
                Decision::Hold,
                Decision::Sell,
                Decision::Hold
            ]
        );
        assert!(matches!(result.ticks[1].action, Action::Filled { .. }));
        assert!(matches!(
            &result.ticks[3].action,
            Action::Filled { realized: Some(trade), .. } if trade.buy_id == 1
        ));

        assert_relative_eq!(result.summary.realized, 50.0);
        assert_relative_eq!(result.summary.unrealized, 0.0);
        assert_relative_eq!(result.summary.growth_pct, 5.0);
        assert_eq!(result.summary.trades, 1);
        assert_eq!(result.summary.max_drawdown, 0.0);
        assert_relative_eq!(strategy.available_capital(), 1050.0);
        assert_eq!(strategy.state(), StrategyState::Idle);
        assert_eq!(market.fills().len(), 2);
    }

    #[test]
    fn first_tick_with_partial_window_is_not_degraded() {
        let mut market = SimulatedMarket::new();
        let (result, _) = run_hourly(&ROUND_TRIP, 1, &mut market);
        let result = result.unwrap();
        assert!(result.ticks[0].degraded.is_empty());
        assert_eq!(result.ticks[0].trend.decision, Decision::Hold);
    }

    #[test]
    fn ticks_before_data_are_skipped() {
        let source = MemoryCandleSource::new().with_series(Frequency::ONE_HOUR, hourly(&ROUND_TRIP));
        let mut strategy = Strategy::new(strategy_config());
        let mut market = SimulatedMarket::new();
        let result = run_backtest(
            &backtest_config(-2, 4),
            &hourly_pipeline(),
            &mut strategy,
            &source,
            &mut market,
        )
        .unwrap();

        assert_eq!(result.skipped_ticks, 2);
        assert_eq!(result.ticks.len(), 5);
        assert_eq!(result.ticks[0].timestamp, at(0));
    }

    #[test]
    fn windows_are_fetched_as_of_the_tick() {
        let source = RecordingSource::new(
            MemoryCandleSource::new().with_series(Frequency::ONE_HOUR, hourly(&ROUND_TRIP)),
        );
        let mut strategy = Strategy::new(strategy_config());
        let mut market = SimulatedMarket::new();
        run_backtest(
            &backtest_config(2, 2),
            &hourly_pipeline(),
            &mut strategy,
            &source,
            &mut market,
        )
        .unwrap();

        let requests = source.requests.borrow();
        assert!(requests.iter().all(|&(_, _, as_of)| as_of == at(2)));
        assert!(requests.contains(&(Frequency::ONE_HOUR, 2, at(2))));
    }

    #[test]
    fn timeout_leaves_buy_unpaired_at_end() {
        let closes = [110.0, 100.0, 100.0, 100.0, 100.0, 100.0, 100.0, 100.0, 100.0, 100.0];
        let mut market = SimulatedMarket::new();
        let (result, strategy) = run_hourly(&closes, 9, &mut market);
        let result = result.unwrap();

        assert_eq!(strategy.state(), StrategyState::Cooldown { until: at(20) });
        assert_eq!(result.summary.unpaired_buys, 1);
        assert_eq!(result.summary.trades, 0);
        assert_eq!(market.fills().len(), 1);
    }

    #[test]
    fn source_failure_stops_the_run() {
        let mut strategy = Strategy::new(strategy_config());
        let mut market = SimulatedMarket::new();
        let err = run_backtest(
            &backtest_config(0, 3),
            &hourly_pipeline(),
            &mut strategy,
            &BrokenSource,
            &mut market,
        )
        .unwrap_err();
        assert!(matches!(err, InvestrError::DataSource { .. }));
    }
}

mod degraded_frequencies {
    use super::*;

    fn two_frequency_pipeline(slow: Frequency) -> SignalPipeline {
        SignalPipeline::new(
            vec![
                ma_group(Frequency::ONE_HOUR, &[2]),
                ma_group(slow, &[2]),
            ],
            TrendDetector::default(),
        )
        .unwrap()
    }

    fn falling_hours() -> Vec<Candle> {
        hourly(&[100.0, 100.0, 100.0, 100.0, 100.0, 100.0, 100.0, 100.0, 90.0])
    }

    #[test]
    fn out_of_order_series_votes_hold() {
        let mut six_hour = series(Frequency::SIX_HOURS, &[100.0, 90.0]);
        six_hour.reverse();
        let source = MemoryCandleSource::new()
            .with_series(Frequency::ONE_HOUR, falling_hours())
            .with_series(Frequency::SIX_HOURS, six_hour);

        let signals = two_frequency_pipeline(Frequency::SIX_HOURS)
            .evaluate(&source, at(8))
            .unwrap();

        assert_eq!(signals.degraded, vec![Frequency::SIX_HOURS]);
        assert_eq!(signals.groups.len(), 1);
        assert_eq!(signals.trend.vote_of(Frequency::SIX_HOURS), Some(Decision::Hold));
        assert_eq!(signals.trend.vote_of(Frequency::ONE_HOUR), Some(Decision::Buy));
        assert_eq!(signals.trend.decision, Decision::Buy);
    }

    #[test]
    fn frequency_without_candles_yet_votes_hold() {
        let late_days: Vec<Candle> = vec![candle(at(48), 100.0), candle(at(72), 100.0)];
        let source = MemoryCandleSource::new()
            .with_series(Frequency::ONE_HOUR, falling_hours())
            .with_series(Frequency::ONE_DAY, late_days);

        let signals = two_frequency_pipeline(Frequency::ONE_DAY)
            .evaluate(&source, at(8))
            .unwrap();

        assert_eq!(signals.degraded, vec![Frequency::ONE_DAY]);
        assert_eq!(signals.trend.contributions.len(), 2);
    }
}

mod market_rejections {
    use super::*;

    #[test]
    fn rejection_is_counted_and_strategy_stays_idle() {
        let mut market = SimulatedMarket::new().reject_submission(0, "exchange halted");
        let (result, strategy) = run_hourly(&ROUND_TRIP, 4, &mut market);
        let result = result.unwrap();

        assert_eq!(result.rejected, 1);
        assert_eq!(result.ticks[1].rejections, 1);
        assert_eq!(result.ticks[1].action, Action::None);
        assert_eq!(result.ticks[1].state, StrategyState::Idle);
        assert_eq!(strategy.rejected_orders().len(), 1);
        assert_eq!(strategy.rejected_orders()[0].reason, "exchange halted");
        assert!(strategy.ledger().orders().is_empty());
    }

    #[test]
    fn retry_fills_on_same_tick() {
        let source = MemoryCandleSource::new().with_series(Frequency::ONE_HOUR, hourly(&ROUND_TRIP));
        let mut strategy = Strategy::new(strategy_config());
        let mut market = SimulatedMarket::new().reject_submission(0, "busy");
        let mut config = backtest_config(0, 4);
        config.retry_rejected = 1;

        let result = run_backtest(
            &config,
            &hourly_pipeline(),
            &mut strategy,
            &source,
            &mut market,
        )
        .unwrap();

        assert_eq!(result.rejected, 1);
        assert!(matches!(result.ticks[1].action, Action::Filled { .. }));
        assert_relative_eq!(result.summary.realized, 50.0);
        assert_eq!(market.submissions(), 3);
    }

    /// Market that hands out the same order id every time.
    struct StuckIdMarket;

    impl Market for StuckIdMarket {
        fn submit(&mut self, request: &OrderRequest) -> Result<Order, InvestrError> {
            Ok(Order {
                id: 7,
                side: request.side,
                amount: request.amount,
                rate: request.rate,
                cost: request.notional(),
                timestamp: request.timestamp,
                paired_with: None,
            })
        }

        fn current_rate(&self, _symbol: &str) -> Result<f64, InvestrError> {
            Ok(100.0)
        }
    }

    #[test]
    fn ledger_invariant_violation_aborts_run() {
        let (result, strategy) = run_hourly(&ROUND_TRIP, 4, &mut StuckIdMarket);
        assert!(matches!(
            result.unwrap_err(),
            InvestrError::InvariantViolation { .. }
        ));
        assert_eq!(strategy.ledger().orders().len(), 1);
    }
}
