//! CSV candle files.
//!
//! One file per symbol in a directory. The file name is the symbol with `/`
//! replaced by `_` (`BTC/USD` -> `BTC_USD.csv`). Header:
//! `timestamp,open,high,low,close,volume`, timestamps in RFC 3339.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use crate::candles::{slice_range, validate_series, Candle, CandleSource, DataError};

/// Reads candles from `<dir>/<symbol>.csv`.
#[derive(Debug, Clone)]
pub struct CsvCandleSource {
    dir: PathBuf,
}

impl CsvCandleSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the CSV file backing `symbol`.
    pub fn path_for(&self, symbol: &str) -> PathBuf {
        self.dir.join(format!("{}.csv", file_stem(symbol)))
    }
}

impl CandleSource for CsvCandleSource {
    fn fetch(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Candle>, DataError> {
        let path = self.path_for(symbol);
        if !path.exists() {
            return Err(DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            });
        }
        let all = read_candles(&path)?;
        let window = slice_range(&all, start, end);
        if window.is_empty() {
            return Err(DataError::EmptyRange {
                symbol: symbol.to_string(),
                start,
                end,
            });
        }
        Ok(window)
    }
}

/// Read and validate one candle file.
pub fn read_candles(path: &Path) -> Result<Vec<Candle>, DataError> {
    let read_err = |reason: String| DataError::Read {
        path: path.display().to_string(),
        reason,
    };
    let mut rdr = csv::Reader::from_path(path).map_err(|e| read_err(e.to_string()))?;
    let candles = rdr
        .deserialize::<Candle>()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| read_err(e.to_string()))?;
    validate_series(&candles)?;
    Ok(candles)
}

/// Write candles in the format [`read_candles`] expects.
pub fn write_candles(path: &Path, candles: &[Candle]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    for candle in candles {
        wtr.serialize(candle)
            .context("failed to serialize candle row")?;
    }
    wtr.flush()
        .with_context(|| format!("failed to flush {}", path.display()))?;
    Ok(())
}

fn file_stem(symbol: &str) -> String {
    symbol.replace('/', "_")
}
