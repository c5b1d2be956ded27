//! Technical indicators that turn a candle window into a `Decision`.
//!
//! This module provides:
//! - `Indicator`: the common decision contract
//! - `IndicatorKind`: indicator identity + parameters, parsed from config strings
//! - `trailing_window`: window validation shared by every implementation
//!
//! Indicators are stateless. Each one declares how many candles it needs
//! (`lookback`) and only ever looks at that many trailing candles, so the same
//! window always produces the same decision.

pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod moving_average;
pub mod rsi;
pub mod stddev;
pub mod stoch_rsi;

use std::fmt;
use std::str::FromStr;

use crate::domain::decision::Decision;
use crate::domain::error::InvestrError;
use crate::domain::ohlcv::{check_window, Candle};

pub use bollinger::Bollinger;
pub use macd::Macd;
pub use moving_average::MovingAverage;
pub use stoch_rsi::StochRsi;

pub trait Indicator: fmt::Debug + Send + Sync {
    fn kind(&self) -> IndicatorKind;

    fn name(&self) -> String {
        self.kind().to_string()
    }

    /// Minimum number of candles `decide` needs.
    fn lookback(&self) -> usize;

    /// Decision for the final candle of `window`.
    ///
    /// Fails with `InsufficientData` when the window is shorter than
    /// `lookback`, and with `InvariantViolation` when it is empty or not
    /// strictly increasing in time.
    fn decide(&self, window: &[Candle]) -> Result<Decision, InvestrError>;
}

/// Validates `window` and returns its trailing `lookback` candles.
pub fn trailing_window<'a>(
    name: &str,
    window: &'a [Candle],
    lookback: usize,
) -> Result<&'a [Candle], InvestrError> {
    check_window(window)?;
    if window.len() < lookback {
        return Err(InvestrError::InsufficientData {
            context: name.to_string(),
            have: window.len(),
            need: lookback,
        });
    }
    Ok(&window[window.len() - lookback..])
}

#[derive(Debug, Clone, PartialEq)]
pub enum IndicatorKind {
    MovingAverage {
        period: usize,
    },
    Macd {
        fast: usize,
        slow: usize,
        signal: usize,
    },
    Bollinger {
        period: usize,
        multiplier: f64,
        proximity: f64,
    },
    StochRsi {
        rsi_period: usize,
        k_period: usize,
        d_period: usize,
    },
}

impl IndicatorKind {
    pub fn build(&self) -> Box<dyn Indicator> {
        match *self {
            IndicatorKind::MovingAverage { period } => Box::new(MovingAverage::new(period)),
            IndicatorKind::Macd { fast, slow, signal } => Box::new(Macd::new(fast, slow, signal)),
            IndicatorKind::Bollinger {
                period,
                multiplier,
                proximity,
            } => Box::new(Bollinger::new(period, multiplier, proximity)),
            IndicatorKind::StochRsi {
                rsi_period,
                k_period,
                d_period,
            } => Box::new(StochRsi::new(rsi_period, k_period, d_period)),
        }
    }

    fn validate(&self) -> Result<(), String> {
        let periods: Vec<usize> = match *self {
            IndicatorKind::MovingAverage { period } => vec![period],
            IndicatorKind::Macd { fast, slow, signal } => vec![fast, slow, signal],
            IndicatorKind::Bollinger {
                period,
                multiplier,
                proximity,
            } => {
                if !(multiplier > 0.0) {
                    return Err(format!("{}: multiplier must be positive", self));
                }
                if !(0.0..=1.0).contains(&proximity) {
                    return Err(format!("{}: proximity must be between 0 and 1", self));
                }
                vec![period]
            }
            IndicatorKind::StochRsi {
                rsi_period,
                k_period,
                d_period,
            } => vec![rsi_period, k_period, d_period],
        };
        if periods.contains(&0) {
            return Err(format!("{}: periods must be positive", self));
        }
        if let IndicatorKind::Macd { fast, slow, .. } = *self {
            if fast >= slow {
                return Err(format!("{}: fast period must be below slow period", self));
            }
        }
        Ok(())
    }
}

impl fmt::Display for IndicatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorKind::MovingAverage { period } => write!(f, "MA({})", period),
            IndicatorKind::Macd { fast, slow, signal } => {
                write!(f, "MACD({},{},{})", fast, slow, signal)
            }
            IndicatorKind::Bollinger {
                period,
                multiplier,
                proximity,
            } => write!(f, "BOLLINGER({},{},{})", period, multiplier, proximity),
            IndicatorKind::StochRsi {
                rsi_period,
                k_period,
                d_period,
            } => write!(f, "STOCHRSI({},{},{})", rsi_period, k_period, d_period),
        }
    }
}

impl FromStr for IndicatorKind {
    type Err = String;

    /// Parses `name` or `name(arg,...)`. Omitted trailing arguments take the
    /// indicator's defaults.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (name, args) = match s.find('(') {
            Some(open) => {
                let close = s
                    .rfind(')')
                    .filter(|&close| close == s.len() - 1 && close > open)
                    .ok_or_else(|| format!("unbalanced parentheses in '{}'", s))?;
                (&s[..open], &s[open + 1..close])
            }
            None => (s, ""),
        };

        let args: Vec<&str> = args
            .split(',')
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .collect();
        let int_arg = |i: usize, default: usize| -> Result<usize, String> {
            args.get(i).map_or(Ok(default), |a| {
                a.parse()
                    .map_err(|_| format!("invalid argument '{}' in '{}'", a, s))
            })
        };
        let float_arg = |i: usize, default: f64| -> Result<f64, String> {
            args.get(i).map_or(Ok(default), |a| {
                a.parse()
                    .map_err(|_| format!("invalid argument '{}' in '{}'", a, s))
            })
        };

        let (kind, arity) = match name.trim().to_lowercase().as_str() {
            "ma" | "sma" => (
                IndicatorKind::MovingAverage {
                    period: int_arg(0, moving_average::DEFAULT_PERIOD)?,
                },
                1,
            ),
            "macd" => (
                IndicatorKind::Macd {
                    fast: int_arg(0, macd::DEFAULT_FAST)?,
                    slow: int_arg(1, macd::DEFAULT_SLOW)?,
                    signal: int_arg(2, macd::DEFAULT_SIGNAL)?,
                },
                3,
            ),
            "bollinger" | "bb" | "bbands" => (
                IndicatorKind::Bollinger {
                    period: int_arg(0, bollinger::DEFAULT_PERIOD)?,
                    multiplier: float_arg(1, bollinger::DEFAULT_MULTIPLIER)?,
                    proximity: float_arg(2, bollinger::DEFAULT_PROXIMITY)?,
                },
                3,
            ),
            "stochrsi" | "stoch_rsi" => (
                IndicatorKind::StochRsi {
                    rsi_period: int_arg(0, stoch_rsi::DEFAULT_RSI_PERIOD)?,
                    k_period: int_arg(1, stoch_rsi::DEFAULT_K_PERIOD)?,
                    d_period: int_arg(2, stoch_rsi::DEFAULT_D_PERIOD)?,
                },
                3,
            ),
            other => return Err(format!("unknown indicator '{}'", other)),
        };

        if args.len() > arity {
            return Err(format!("too many arguments in '{}'", s));
        }
        kind.validate()?;
        Ok(kind)
    }
}

/// Parses a comma-separated list such as `macd(6,26,9), bollinger(20,2,0.5)`.
/// Commas inside parentheses belong to the indicator's argument list.
pub fn parse_indicator_list(s: &str) -> Result<Vec<IndicatorKind>, String> {
    let mut kinds = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;

    for (i, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| format!("unbalanced parentheses in '{}'", s))?;
            }
            ',' if depth == 0 => {
                kinds.push(s[start..i].parse()?);
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(format!("unbalanced parentheses in '{}'", s));
    }
    let tail = s[start..].trim();
    if !tail.is_empty() {
        kinds.push(tail.parse()?);
    }
    if kinds.is_empty() {
        return Err("no indicators configured".to_string());
    }
    Ok(kinds)
}
