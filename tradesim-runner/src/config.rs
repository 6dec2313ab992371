//! Serializable replay session configuration.
//!
//! Sessions are configured from TOML:
//!
//! ```toml
//! [session]
//! symbol = "BTC/USD"
//! start = "2024-08-01T00:00:00Z"
//! end = "2024-08-08T00:00:00Z"
//! initial_balance = 10000.0
//! risk_free_rate = 0.01
//!
//! [costs]
//! maker_fee = 0.0005
//! taker_fee = 0.0002
//! slippage = 0.01
//! ```
//!
//! `initial_balance`, `risk_free_rate` and the whole `[costs]` table are optional.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tradesim_core::DEFAULT_RISK_FREE_RATE;

use crate::costs::CostModel;

/// Starting cash when the config does not say.
pub const DEFAULT_INITIAL_BALANCE: f64 = 10_000.0;

/// Errors from loading or validating a session config.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Everything needed to reproduce one replay session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionConfig {
    pub session: SessionSettings,

    #[serde(default)]
    pub costs: CostModel,
}

/// The `[session]` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionSettings {
    /// Instrument to replay.
    pub symbol: String,

    /// First candle timestamp (inclusive).
    pub start: DateTime<Utc>,

    /// Last candle timestamp (exclusive).
    pub end: DateTime<Utc>,

    #[serde(default = "default_initial_balance")]
    pub initial_balance: f64,

    #[serde(default = "default_risk_free_rate")]
    pub risk_free_rate: f64,
}

fn default_initial_balance() -> f64 {
    DEFAULT_INITIAL_BALANCE
}

fn default_risk_free_rate() -> f64 {
    DEFAULT_RISK_FREE_RATE
}

impl SessionConfig {
    /// Config with default balance, risk-free rate and costs.
    pub fn new(symbol: impl Into<String>, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            session: SessionSettings {
                symbol: symbol.into(),
                start,
                end,
                initial_balance: DEFAULT_INITIAL_BALANCE,
                risk_free_rate: DEFAULT_RISK_FREE_RATE,
            },
            costs: CostModel::default(),
        }
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: SessionConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.session;
        if s.symbol.trim().is_empty() {
            return Err(ConfigError::Invalid("symbol must not be empty".into()));
        }
        if s.start >= s.end {
            return Err(ConfigError::Invalid(format!(
                "start {} must be before end {}",
                s.start, s.end
            )));
        }
        if !s.initial_balance.is_finite() || s.initial_balance <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "initial_balance must be positive, got {}",
                s.initial_balance
            )));
        }
        if !s.risk_free_rate.is_finite() {
            return Err(ConfigError::Invalid("risk_free_rate must be finite".into()));
        }
        if !self.costs.is_valid() {
            return Err(ConfigError::Invalid(
                "fees and slippage must be non-negative and finite".into(),
            ));
        }
        Ok(())
    }

    /// Deterministic BLAKE3 hash of the canonical JSON form.
    ///
    /// Two sessions with identical configs share a fingerprint.
    pub fn fingerprint(&self) -> String {
        // Serializing plain data with string keys cannot fail.
        let json = serde_json::to_string(self).unwrap_or_default();
        blake3::hash(json.as_bytes()).to_hex().to_string()
    }
}
