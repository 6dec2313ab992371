//! tradesim core — trade lifecycle and portfolio accounting.
//!
//! This crate contains the accounting engine a trading simulation runs on:
//! - Trades with per-side valuation laws, mark-to-market, excursions and drawdown
//! - A portfolio of cash, open trades and closed trades with a valuation history
//! - Sharpe, Sortino and cumulative return over that history
//! - An injectable clock so every timestamp is controllable in tests
//!
//! No I/O happens here. Price data and the simulation loop live with the caller.

pub mod clock;
pub mod domain;
pub mod metrics;

pub use clock::{Clock, ManualClock, SystemClock};
pub use domain::{
    OpenOutcome, PerformanceSnapshot, Portfolio, PortfolioError, PositionSide, Rejection, Trade,
    TradeError, TradeId, TradeReport, TradeStatistics,
};
pub use metrics::{PerformanceRatios, DEFAULT_RISK_FREE_RATE};
