//! MACD (Moving Average Convergence Divergence) indicator.
//!
//! MACD Line = EMA(fast) - EMA(slow)
//! Signal Line = EMA(signal) of MACD Line
//!
//! Decision rule: `macd < signal < 0` is a BUY (momentum bottoming out below
//! zero), `macd > signal > 0` is a SELL, anything else HOLD.
//!
//! Default parameters: fast=6, slow=26, signal=9
//! Warmup: slow - 1 + signal - 1 candles, so lookback is slow + signal - 1.

use crate::domain::decision::Decision;
use crate::domain::error::InvestrError;
use crate::domain::indicator::ema::{calculate_ema, last_ema};
use crate::domain::indicator::{trailing_window, Indicator, IndicatorKind};
use crate::domain::ohlcv::{closes, Candle};

pub const DEFAULT_FAST: usize = 6;
pub const DEFAULT_SLOW: usize = 26;
pub const DEFAULT_SIGNAL: usize = 9;

#[derive(Debug, Clone)]
pub struct Macd {
    fast: usize,
    slow: usize,
    signal: usize,
}

impl Macd {
    pub fn new(fast: usize, slow: usize, signal: usize) -> Self {
        Macd {
            fast: fast.max(1),
            slow: slow.max(1),
            signal: signal.max(1),
        }
    }

    /// MACD line and signal line at the last price, `None` during warmup.
    pub fn lines(&self, prices: &[f64]) -> Option<(f64, f64)> {
        let fast = calculate_ema(prices, self.fast);
        let slow = calculate_ema(prices, self.slow);

        let macd_line: Vec<f64> = fast
            .iter()
            .zip(slow.iter())
            .filter_map(|(f, s)| Some((*f)? - (*s)?))
            .collect();

        let signal = last_ema(&macd_line, self.signal)?;
        let macd = *macd_line.last()?;
        Some((macd, signal))
    }
}

impl Default for Macd {
    fn default() -> Self {
        Macd::new(DEFAULT_FAST, DEFAULT_SLOW, DEFAULT_SIGNAL)
    }
}

impl Indicator for Macd {
    fn kind(&self) -> IndicatorKind {
        IndicatorKind::Macd {
            fast: self.fast,
            slow: self.slow,
            signal: self.signal,
        }
    }

    fn lookback(&self) -> usize {
        self.fast.max(self.slow) + self.signal - 1
    }

    fn decide(&self, window: &[Candle]) -> Result<Decision, InvestrError> {
        let name = self.name();
        let window = trailing_window(&name, window, self.lookback())?;
        let (macd, signal) =
            self.lines(&closes(window))
                .ok_or_else(|| InvestrError::InsufficientData {
                    context: name,
                    have: window.len(),
                    need: self.lookback(),
                })?;

        Ok(if macd < signal && signal < 0.0 {
            Decision::Buy
        } else if macd > signal && signal > 0.0 {
            Decision::Sell
        } else {
            Decision::Hold
        })
    }
}
