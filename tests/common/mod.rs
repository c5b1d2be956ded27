#![allow(dead_code)]

use chrono::{Duration, NaiveDate, NaiveDateTime};
use investr::adapters::memory_source::MemoryCandleSource;
use investr::domain::backtest::BacktestConfig;
use investr::domain::decision::{Decision, Side, TrendDecision};
use investr::domain::error::InvestrError;
use investr::domain::frequency::Frequency;
use investr::domain::indicator::{Indicator, MovingAverage};
use investr::domain::indicator_group::IndicatorGroup;
pub use investr::domain::ohlcv::Candle;
use investr::domain::order::Order;
use investr::domain::strategy::{StrategyConfig, Tick};
use investr::ports::candle_port::CandleSource;
use std::cell::RefCell;

pub const SYMBOL: &str = "BTCUSD";

/// `2024-01-01 00:00:00` plus `hour` hours.
pub fn at(hour: i64) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        + Duration::hours(hour)
}

pub fn candle(timestamp: NaiveDateTime, close: f64) -> Candle {
    Candle {
        timestamp,
        open: close,
        high: close,
        low: close,
        close,
        volume: 1000.0,
    }
}

/// Candles spaced one `frequency` apart starting at `at(0)`.
pub fn series(frequency: Frequency, closes: &[f64]) -> Vec<Candle> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| candle(at(0) + frequency.duration() * i as i32, close))
        .collect()
}

pub fn hourly(closes: &[f64]) -> Vec<Candle> {
    series(Frequency::ONE_HOUR, closes)
}

pub fn order(id: u64, side: Side, amount: f64, rate: f64) -> Order {
    Order {
        id,
        side,
        amount,
        rate,
        cost: amount * rate,
        timestamp: at(id as i64),
        paired_with: None,
    }
}

pub fn tick(hour: i64, rate: f64, decision: Decision) -> Tick {
    Tick {
        timestamp: at(hour),
        rate,
        trend: TrendDecision {
            decision,
            contributions: Vec::new(),
        },
    }
}

pub fn ma_group(frequency: Frequency, periods: &[usize]) -> IndicatorGroup {
    let indicators: Vec<Box<dyn Indicator>> = periods
        .iter()
        .map(|&p| Box::new(MovingAverage::new(p)) as Box<dyn Indicator>)
        .collect();
    IndicatorGroup::new(frequency, indicators)
}

pub fn backtest_config(start_hour: i64, end_hour: i64) -> BacktestConfig {
    BacktestConfig {
        symbol: SYMBOL.to_string(),
        start: at(start_hour),
        end: at(end_hour),
        step: Frequency::ONE_HOUR,
        retry_rejected: 0,
    }
}

/// Half the capital per BUY so prices of 100 give whole amounts.
pub fn strategy_config() -> StrategyConfig {
    StrategyConfig {
        symbol: SYMBOL.to_string(),
        capital: 1000.0,
        position_size: 0.5,
        ..StrategyConfig::default()
    }
}

/// Candle source that records every request it serves.
pub struct RecordingSource {
    inner: MemoryCandleSource,
    pub requests: RefCell<Vec<(Frequency, usize, NaiveDateTime)>>,
}

impl RecordingSource {
    pub fn new(inner: MemoryCandleSource) -> Self {
        Self {
            inner,
            requests: RefCell::new(Vec::new()),
        }
    }
}

impl CandleSource for RecordingSource {
    fn latest(
        &self,
        frequency: Frequency,
        count: usize,
        as_of: NaiveDateTime,
    ) -> Result<Vec<Candle>, InvestrError> {
        self.requests.borrow_mut().push((frequency, count, as_of));
        self.inner.latest(frequency, count, as_of)
    }

    fn frequencies(&self) -> Vec<Frequency> {
        self.inner.frequencies()
    }
}

/// Candle source that fails every request.
pub struct BrokenSource;

impl CandleSource for BrokenSource {
    fn latest(
        &self,
        frequency: Frequency,
        _count: usize,
        _as_of: NaiveDateTime,
    ) -> Result<Vec<Candle>, InvestrError> {
        Err(InvestrError::DataSource {
            reason: format!("feed for {} is down", frequency),
        })
    }

    fn frequencies(&self) -> Vec<Frequency> {
        Vec::new()
    }
}
