//! In-memory candle source.
//!
//! Series are served exactly as inserted. A series that is not in time order
//! is still served, and the resulting window is rejected downstream by the
//! window check.

use chrono::NaiveDateTime;
use std::collections::BTreeMap;

use crate::domain::error::InvestrError;
use crate::domain::frequency::Frequency;
use crate::domain::ohlcv::Candle;
use crate::ports::candle_port::CandleSource;

#[derive(Debug, Clone)]
struct Series {
    candles: Vec<Candle>,
    sorted: bool,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryCandleSource {
    series: BTreeMap<Frequency, Series>,
}

impl MemoryCandleSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the series for `frequency`.
    pub fn insert(&mut self, frequency: Frequency, candles: Vec<Candle>) {
        let sorted = candles
            .windows(2)
            .all(|pair| pair[0].timestamp < pair[1].timestamp);
        self.series.insert(frequency, Series { candles, sorted });
    }

    pub fn with_series(mut self, frequency: Frequency, candles: Vec<Candle>) -> Self {
        self.insert(frequency, candles);
        self
    }

    pub fn candles(&self, frequency: Frequency) -> &[Candle] {
        self.series
            .get(&frequency)
            .map(|s| s.candles.as_slice())
            .unwrap_or(&[])
    }

    /// First and last timestamp of a series.
    pub fn range(&self, frequency: Frequency) -> Option<(NaiveDateTime, NaiveDateTime)> {
        let candles = self.candles(frequency);
        let first = candles.iter().map(|c| c.timestamp).min()?;
        let last = candles.iter().map(|c| c.timestamp).max()?;
        Some((first, last))
    }
}

impl CandleSource for MemoryCandleSource {
    fn latest(
        &self,
        frequency: Frequency,
        count: usize,
        as_of: NaiveDateTime,
    ) -> Result<Vec<Candle>, InvestrError> {
        let series = self
            .series
            .get(&frequency)
            .ok_or_else(|| InvestrError::DataSource {
                reason: format!("no candles loaded for {}", frequency),
            })?;

        let visible: Vec<&Candle> = if series.sorted {
            let end = series.candles.partition_point(|c| c.timestamp <= as_of);
            series.candles[..end].iter().collect()
        } else {
            series
                .candles
                .iter()
                .filter(|c| c.timestamp <= as_of)
                .collect()
        };

        if visible.len() < count {
            return Err(InvestrError::InsufficientData {
                context: format!("{} candles at {}", frequency, as_of),
                have: visible.len(),
                need: count,
            });
        }
        Ok(visible[visible.len() - count..]
            .iter()
            .map(|&c| c.clone())
            .collect())
    }

    fn frequencies(&self) -> Vec<Frequency> {
        self.series.keys().copied().collect()
    }
}
