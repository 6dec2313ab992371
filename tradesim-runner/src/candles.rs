//! Candle type, candle source trait, and series validation.
//!
//! The `CandleSource` trait abstracts over where price history comes from
//! (CSV files, memory, a remote market-data provider) so sessions can be
//! replayed from any of them and mocked in tests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// One OHLCV bar for a fixed time bucket (e.g. 5 minutes).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// Basic OHLC sanity: finite, positive, high/low bracket open and close.
    pub fn is_sane(&self) -> bool {
        let prices = [self.open, self.high, self.low, self.close];
        if prices.iter().any(|p| !p.is_finite() || *p <= 0.0) {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.volume >= 0.0
    }
}

/// Structured error types for candle retrieval.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("no candles for '{symbol}' between {start} and {end}")]
    EmptyRange {
        symbol: String,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("candle {index} is out of order ({timestamp} is not after the previous bar)")]
    OutOfOrder {
        index: usize,
        timestamp: DateTime<Utc>,
    },

    #[error("candle {index} at {timestamp} failed OHLC sanity checks")]
    InsaneCandle {
        index: usize,
        timestamp: DateTime<Utc>,
    },

    #[error("failed to read candles from {path}: {reason}")]
    Read { path: String, reason: String },
}

/// A provider of historical candles.
pub trait CandleSource: Send + Sync {
    /// Candles for `symbol` with `start <= timestamp < end`, ascending.
    fn fetch(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Candle>, DataError>;
}

/// Candles held in memory, keyed by symbol.
#[derive(Debug, Clone, Default)]
pub struct MemoryCandleSource {
    series: HashMap<String, Vec<Candle>>,
}

impl MemoryCandleSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the series for a symbol.
    pub fn insert(&mut self, symbol: impl Into<String>, mut candles: Vec<Candle>) {
        candles.sort_by_key(|c| c.timestamp);
        self.series.insert(symbol.into(), candles);
    }

    pub fn with_series(mut self, symbol: impl Into<String>, candles: Vec<Candle>) -> Self {
        self.insert(symbol, candles);
        self
    }
}

impl CandleSource for MemoryCandleSource {
    fn fetch(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Candle>, DataError> {
        let all = self
            .series
            .get(symbol)
            .ok_or_else(|| DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            })?;
        let window = slice_range(all, start, end);
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

/// Keep candles with `start <= timestamp < end`.
pub fn slice_range(candles: &[Candle], start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<Candle> {
    candles
        .iter()
        .filter(|c| c.timestamp >= start && c.timestamp < end)
        .copied()
        .collect()
}

/// Check a series is strictly ascending and every candle is sane.
pub fn validate_series(candles: &[Candle]) -> Result<(), DataError> {
    for (index, candle) in candles.iter().enumerate() {
        if !candle.is_sane() {
            return Err(DataError::InsaneCandle {
                index,
                timestamp: candle.timestamp,
            });
        }
        if index > 0 && candle.timestamp <= candles[index - 1].timestamp {
            return Err(DataError::OutOfOrder {
                index,
                timestamp: candle.timestamp,
            });
        }
    }
    Ok(())
}
