//! Simple moving average indicator.
//!
//! Mean-reversion reading of price against its SMA: a close under the average
//! is a BUY, a close over it a SELL.

use crate::domain::decision::Decision;
use crate::domain::error::InvestrError;
use crate::domain::indicator::stddev::mean;
use crate::domain::indicator::{trailing_window, Indicator, IndicatorKind};
use crate::domain::ohlcv::{closes, Candle};

pub const DEFAULT_PERIOD: usize = 50;

#[derive(Debug, Clone)]
pub struct MovingAverage {
    period: usize,
}

impl MovingAverage {
    pub fn new(period: usize) -> Self {
        MovingAverage {
            period: period.max(1),
        }
    }
}

impl Default for MovingAverage {
    fn default() -> Self {
        MovingAverage::new(DEFAULT_PERIOD)
    }
}

impl Indicator for MovingAverage {
    fn kind(&self) -> IndicatorKind {
        IndicatorKind::MovingAverage {
            period: self.period,
        }
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn decide(&self, window: &[Candle]) -> Result<Decision, InvestrError> {
        let window = trailing_window(&self.name(), window, self.lookback())?;
        let prices = closes(window);
        let sma = mean(&prices);
        let rate = prices[prices.len() - 1];

        Ok(if rate < sma {
            Decision::Buy
        } else if rate > sma {
            Decision::Sell
        } else {
            Decision::Hold
        })
    }
}
