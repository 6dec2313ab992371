//! Domain types: trades, position sides, portfolios.

pub mod ids;
pub mod portfolio;
pub mod position;
pub mod trade;

pub use ids::TradeId;
pub use portfolio::{
    OpenOutcome, PerformanceSnapshot, Portfolio, PortfolioError, Rejection, TradeStatistics,
};
pub use position::PositionSide;
pub use trade::{Trade, TradeError, TradeReport};
