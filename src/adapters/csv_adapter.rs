//! CSV candle loader.
//!
//! Reads one file per frequency, `<data_dir>/<symbol>_<freq>.csv`, with a
//! header row and the columns `timestamp,open,high,low,close,volume`.
//! Timestamps use `%Y-%m-%d %H:%M:%S`; a bare `%Y-%m-%d` is read as midnight.

use std::fs;
use std::path::{Path, PathBuf};

use crate::adapters::memory_source::MemoryCandleSource;
use crate::domain::error::InvestrError;
use crate::domain::frequency::Frequency;
use crate::domain::ohlcv::{parse_timestamp, Candle};

pub struct CsvCandleLoader {
    base_path: PathBuf,
}

impl CsvCandleLoader {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    pub fn csv_path(&self, symbol: &str, frequency: Frequency) -> PathBuf {
        self.base_path.join(format!("{}_{}.csv", symbol, frequency))
    }

    /// Candles for one frequency, sorted by timestamp.
    pub fn load(&self, symbol: &str, frequency: Frequency) -> Result<Vec<Candle>, InvestrError> {
        let path = self.csv_path(symbol, frequency);
        let content = fs::read_to_string(&path).map_err(|e| InvestrError::DataSource {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;
        let mut candles = parse_candles(&content, &path)?;
        candles.sort_by_key(|c| c.timestamp);
        tracing::debug!(
            path = %path.display(),
            count = candles.len(),
            "loaded candles"
        );
        Ok(candles)
    }

    /// Loads every requested frequency into a memory source.
    pub fn load_source(
        &self,
        symbol: &str,
        frequencies: &[Frequency],
    ) -> Result<MemoryCandleSource, InvestrError> {
        let mut source = MemoryCandleSource::new();
        for &frequency in frequencies {
            source.insert(frequency, self.load(symbol, frequency)?);
        }
        Ok(source)
    }
}

fn column<'a>(
    record: &'a csv::StringRecord,
    idx: usize,
    name: &str,
    path: &Path,
    line: usize,
) -> Result<&'a str, InvestrError> {
    record.get(idx).ok_or_else(|| InvestrError::DataSource {
        reason: format!("{}:{}: missing {} column", path.display(), line, name),
    })
}

fn parse_candles(content: &str, path: &Path) -> Result<Vec<Candle>, InvestrError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());
    let mut candles = Vec::new();

    for (row, result) in rdr.records().enumerate() {
        let line = row + 2;
        let record = result.map_err(|e| InvestrError::DataSource {
            reason: format!("{}: CSV parse error: {}", path.display(), e),
        })?;

        let number = |idx: usize, name: &str| -> Result<f64, InvestrError> {
            let raw = column(&record, idx, name, path, line)?;
            raw.parse().map_err(|_| InvestrError::DataSource {
                reason: format!("{}:{}: invalid {} value '{}'", path.display(), line, name, raw),
            })
        };

        let raw_ts = column(&record, 0, "timestamp", path, line)?;
        let timestamp = parse_timestamp(raw_ts).ok_or_else(|| InvestrError::DataSource {
            reason: format!("{}:{}: invalid timestamp '{}'", path.display(), line, raw_ts),
        })?;

        candles.push(Candle {
            timestamp,
            open: number(1, "open")?,
            high: number(2, "high")?,
            low: number(3, "low")?,
            close: number(4, "close")?,
            volume: number(5, "volume")?,
        });
    }

    Ok(candles)
}
