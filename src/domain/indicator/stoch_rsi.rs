//! Stochastic RSI oscillator.
//!
//! %K = 100 × (RSI - min(RSI)) / (max(RSI) - min(RSI)) over `k_period` RSI values
//! %D = SMA(%K, d_period)
//!
//! A flat RSI range yields %K = 50.
//!
//! Decision rule:
//! - BUY:  oversold > %D >= %K
//! - SELL: overbought < %D <= %K
//!
//! Default parameters: rsi=14, k=3, d=3, thresholds 20/80.

use crate::domain::decision::Decision;
use crate::domain::error::InvestrError;
use crate::domain::indicator::rsi::calculate_rsi;
use crate::domain::indicator::stddev::mean;
use crate::domain::indicator::{trailing_window, Indicator, IndicatorKind};
use crate::domain::ohlcv::{closes, Candle};

pub const DEFAULT_RSI_PERIOD: usize = 14;
pub const DEFAULT_K_PERIOD: usize = 3;
pub const DEFAULT_D_PERIOD: usize = 3;
pub const DEFAULT_OVERSOLD: f64 = 20.0;
pub const DEFAULT_OVERBOUGHT: f64 = 80.0;

#[derive(Debug, Clone)]
pub struct StochRsi {
    rsi_period: usize,
    k_period: usize,
    d_period: usize,
    oversold: f64,
    overbought: f64,
}

impl StochRsi {
    pub fn new(rsi_period: usize, k_period: usize, d_period: usize) -> Self {
        StochRsi {
            rsi_period: rsi_period.max(1),
            k_period: k_period.max(1),
            d_period: d_period.max(1),
            oversold: DEFAULT_OVERSOLD,
            overbought: DEFAULT_OVERBOUGHT,
        }
    }

    pub fn with_thresholds(mut self, oversold: f64, overbought: f64) -> Self {
        self.oversold = oversold;
        self.overbought = overbought;
        self
    }

    /// (%K, %D) at the last price, `None` during warmup.
    pub fn lines(&self, prices: &[f64]) -> Option<(f64, f64)> {
        let rsi: Vec<f64> = calculate_rsi(prices, self.rsi_period)
            .into_iter()
            .flatten()
            .collect();
        if rsi.len() < self.k_period {
            return None;
        }

        let k_line: Vec<f64> = rsi
            .windows(self.k_period)
            .map(|w| {
                let low = w.iter().copied().fold(f64::INFINITY, f64::min);
                let high = w.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                let current = w[w.len() - 1];
                if high - low <= 0.0 {
                    50.0
                } else {
                    100.0 * (current - low) / (high - low)
                }
            })
            .collect();
        if k_line.len() < self.d_period {
            return None;
        }

        let k = k_line[k_line.len() - 1];
        let d = mean(&k_line[k_line.len() - self.d_period..]);
        Some((k, d))
    }
}

impl Default for StochRsi {
    fn default() -> Self {
        StochRsi::new(DEFAULT_RSI_PERIOD, DEFAULT_K_PERIOD, DEFAULT_D_PERIOD)
    }
}

impl Indicator for StochRsi {
    fn kind(&self) -> IndicatorKind {
        IndicatorKind::StochRsi {
            rsi_period: self.rsi_period,
            k_period: self.k_period,
            d_period: self.d_period,
        }
    }

    fn lookback(&self) -> usize {
        self.rsi_period + self.k_period + self.d_period - 1
    }

    fn decide(&self, window: &[Candle]) -> Result<Decision, InvestrError> {
        let name = self.name();
        let window = trailing_window(&name, window, self.lookback())?;
        let (k, d) = self
            .lines(&closes(window))
            .ok_or_else(|| InvestrError::InsufficientData {
                context: name,
                have: window.len(),
                need: self.lookback(),
            })?;

        Ok(if self.oversold > d && d >= k {
            Decision::Buy
        } else if self.overbought < d && d <= k {
            Decision::Sell
        } else {
            Decision::Hold
        })
    }
}
