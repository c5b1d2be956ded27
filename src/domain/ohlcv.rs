//! OHLCV candle representation.

use chrono::{NaiveDate, NaiveDateTime};

use crate::domain::error::InvestrError;

#[derive(Debug, Clone, PartialEq)]
pub struct Candle {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// (high + low + close) / 3
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }
}

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parses `%Y-%m-%d %H:%M:%S`, or a bare date as midnight.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Closing prices of a window, oldest first.
pub fn closes(window: &[Candle]) -> Vec<f64> {
    window.iter().map(|c| c.close).collect()
}

/// Checks that a window is non-empty and strictly increasing in time.
pub fn check_window(window: &[Candle]) -> Result<(), InvestrError> {
    if window.is_empty() {
        return Err(InvestrError::invariant("empty candle window"));
    }
    if let Some(pair) = window
        .windows(2)
        .find(|pair| pair[1].timestamp <= pair[0].timestamp)
    {
        return Err(InvestrError::invariant(format!(
            "candle timestamps not increasing: {} then {}",
            pair[0].timestamp, pair[1].timestamp
        )));
    }
    Ok(())
}
