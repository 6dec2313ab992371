//! tradesim runner — replays portfolios over historical candles.
//!
//! This crate builds on `tradesim-core` to provide:
//! - Candle sources (CSV directory, in-memory) behind one trait
//! - A transaction-cost model from maker/taker fees and slippage
//! - TOML session configuration with a deterministic fingerprint
//! - A replay session that steps a portfolio bar by bar in simulated time
//! - Parallel batch replay and JSON/CSV report export
//! - Tracing subscriber setup

pub mod batch;
pub mod candles;
pub mod config;
pub mod costs;
pub mod csv_source;
pub mod logging;
pub mod report;
pub mod session;

pub use batch::{run_batch, run_batch_from_source, BatchJob};
pub use candles::{validate_series, Candle, CandleSource, DataError, MemoryCandleSource};
pub use config::{ConfigError, SessionConfig, SessionSettings};
pub use costs::{CostModel, Liquidity};
pub use csv_source::CsvCandleSource;
pub use report::{export_json, export_trades_csv, import_json, SessionReport};
pub use session::{ReplaySession, SessionError, StepState};
