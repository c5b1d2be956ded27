//! Candle source port trait.

use chrono::NaiveDateTime;

use crate::domain::error::InvestrError;
use crate::domain::frequency::Frequency;
use crate::domain::ohlcv::Candle;

pub trait CandleSource {
    /// The `count` most recent candles of `frequency` stamped at or before
    /// `as_of`, oldest first.
    ///
    /// Fails with `InsufficientData` when fewer than `count` exist.
    fn latest(
        &self,
        frequency: Frequency,
        count: usize,
        as_of: NaiveDateTime,
    ) -> Result<Vec<Candle>, InvestrError>;

    /// Frequencies this source can serve.
    fn frequencies(&self) -> Vec<Frequency>;
}
