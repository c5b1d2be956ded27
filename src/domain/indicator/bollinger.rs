//! Bollinger Bands indicator with a band-proximity decision rule.
//!
//! Bollinger Bands consist of:
//! - Middle: Simple Moving Average (SMA) over n periods
//! - Upper: Middle + (multiplier × StdDev)
//! - Lower: Middle - (multiplier × StdDev)
//!
//! Where StdDev is population standard deviation (divides by N, not N-1).
//!
//! A signal fires only when the close sits within `proximity` of a band edge,
//! measured as a fraction of the half-band between that edge and the middle:
//! - BUY:  close <= lower + proximity × (middle - lower)
//! - SELL: close >= upper - proximity × (upper - middle)
//!
//! A close that is merely above or below the middle line is a HOLD. At
//! proximity 1.0 both thresholds meet on the middle line and a close exactly
//! on it is a HOLD. With a
//! zero-width band (flat prices) the result is always HOLD.
//!
//! Default parameters: period=20, multiplier=2.0, proximity=0.5

use crate::domain::decision::Decision;
use crate::domain::error::InvestrError;
use crate::domain::indicator::stddev::{mean, population_stddev};
use crate::domain::indicator::{trailing_window, Indicator, IndicatorKind};
use crate::domain::ohlcv::{closes, Candle};

pub const DEFAULT_PERIOD: usize = 20;
pub const DEFAULT_MULTIPLIER: f64 = 2.0;
pub const DEFAULT_PROXIMITY: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bands {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

#[derive(Debug, Clone)]
pub struct Bollinger {
    period: usize,
    multiplier: f64,
    proximity: f64,
}

impl Bollinger {
    pub fn new(period: usize, multiplier: f64, proximity: f64) -> Self {
        Bollinger {
            period: period.max(1),
            multiplier,
            proximity: proximity.clamp(0.0, 1.0),
        }
    }

    pub fn bands(&self, prices: &[f64]) -> Bands {
        let middle = mean(prices);
        let width = self.multiplier * population_stddev(prices);
        Bands {
            upper: middle + width,
            middle,
            lower: middle - width,
        }
    }

    /// (buy_at_or_below, sell_at_or_above) price thresholds for the given bands.
    pub fn thresholds(&self, bands: &Bands) -> (f64, f64) {
        let reach = 1.0 - self.proximity;
        let buy = bands.middle - reach * (bands.middle - bands.lower);
        let sell = bands.middle + reach * (bands.upper - bands.middle);
        (buy, sell)
    }
}

impl Default for Bollinger {
    fn default() -> Self {
        Bollinger::new(DEFAULT_PERIOD, DEFAULT_MULTIPLIER, DEFAULT_PROXIMITY)
    }
}

impl Indicator for Bollinger {
    fn kind(&self) -> IndicatorKind {
        IndicatorKind::Bollinger {
            period: self.period,
            multiplier: self.multiplier,
            proximity: self.proximity,
        }
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn decide(&self, window: &[Candle]) -> Result<Decision, InvestrError> {
        let window = trailing_window(&self.name(), window, self.lookback())?;
        let prices = closes(window);
        let bands = self.bands(&prices);
        if bands.upper - bands.lower <= 0.0 {
            return Ok(Decision::Hold);
        }

        let rate = prices[prices.len() - 1];
        let (buy, sell) = self.thresholds(&bands);

        Ok(if rate <= buy && rate >= sell {
            Decision::Hold
        } else if rate <= buy {
            Decision::Buy
        } else if rate >= sell {
            Decision::Sell
        } else {
            Decision::Hold
        })
    }
}
