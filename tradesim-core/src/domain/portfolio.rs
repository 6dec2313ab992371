//! Portfolio — cash plus every trade it has admitted.
//!
//! Cash only moves on admission (minus the trade's initial value) and on
//! close (plus the trade's final value). A trade lives in exactly one of the
//! open set or the closed sequence.

use super::ids::TradeId;
use super::position::PositionSide;
use super::trade::{Trade, TradeError};
use crate::clock::{Clock, SystemClock};
use crate::metrics::PerformanceRatios;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors from portfolio operations.
///
/// Insufficient funds is not an error; see [`OpenOutcome::Rejected`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PortfolioError {
    #[error("invalid order: {0}")]
    InvalidOrder(String),

    #[error("trade {0} is not open in this portfolio")]
    TradeNotOpen(TradeId),

    #[error("trade {0} is already closed")]
    TradeAlreadyClosed(TradeId),

    #[error(transparent)]
    Trade(#[from] TradeError),
}

/// Result of asking the portfolio to open a trade.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum OpenOutcome {
    Accepted(TradeId),
    Rejected(Rejection),
}

impl OpenOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, OpenOutcome::Accepted(_))
    }

    pub fn trade_id(&self) -> Option<TradeId> {
        match self {
            OpenOutcome::Accepted(id) => Some(*id),
            OpenOutcome::Rejected(_) => None,
        }
    }
}

/// Why an open request was turned away. State is untouched on rejection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Rejection {
    InsufficientFunds { required: f64, available: f64 },
}

/// One point of the valuation time series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSnapshot {
    pub timestamp: DateTime<Utc>,
    pub balance: f64,
    pub evaluation: f64,
}

/// Win/loss tally over closed trades.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TradeStatistics {
    pub trade_count: usize,
    pub winners: usize,
    pub losers: usize,
    /// Fraction of closed trades with positive PnL.
    pub win_rate: f64,
    pub realized_pnl: f64,
    /// Mean of the per-trade `return_on_trade` (percent).
    pub mean_return_on_trade: f64,
}

/// Cash, open trades, closed trades and the valuation history.
///
/// Single-writer: every mutation takes `&mut self`, nothing locks.
#[derive(Debug, Clone)]
pub struct Portfolio {
    initial_balance: f64,
    balance: f64,
    evaluation: f64,
    open_trades: Vec<Trade>,
    closed_trades: Vec<Trade>,
    performance_history: Vec<PerformanceSnapshot>,
    total_transaction_costs: f64,
    next_trade_id: TradeId,
    clock: Arc<dyn Clock>,
}

impl Portfolio {
    pub fn new(initial_balance: f64, clock: Arc<dyn Clock>) -> Self {
        Self {
            initial_balance,
            balance: initial_balance,
            evaluation: initial_balance,
            open_trades: Vec::new(),
            closed_trades: Vec::new(),
            performance_history: Vec::new(),
            total_transaction_costs: 0.0,
            next_trade_id: TradeId(1),
            clock,
        }
    }

    /// Portfolio stamped with wall-clock time.
    pub fn with_system_clock(initial_balance: f64) -> Self {
        Self::new(initial_balance, Arc::new(SystemClock))
    }

    /// Open a trade if the cash covers its initial value.
    ///
    /// Malformed arguments are an error. Lack of cash is an
    /// [`OpenOutcome::Rejected`] that leaves the portfolio unchanged.
    /// An open cost at or above the position's worth (`initial_value <= 0`)
    /// is [`PortfolioError::InvalidOrder`].
    pub fn open_trade(
        &mut self,
        ticker: impl Into<String>,
        quantity: f64,
        price: f64,
        open_cost: f64,
        side: PositionSide,
    ) -> Result<OpenOutcome, PortfolioError> {
        validate_quantity(quantity)?;
        validate_price(price)?;
        validate_cost(open_cost)?;

        let trade = Trade::open(
            self.next_trade_id,
            ticker,
            quantity,
            price,
            open_cost,
            side,
            self.clock.now(),
        );
        if trade.initial_value().is_nan() || trade.initial_value() <= 0.0 {
            return Err(PortfolioError::InvalidOrder(format!(
                "initial value {} is not positive (cost exceeds notional)",
                trade.initial_value()
            )));
        }

        if trade.initial_value() > self.balance {
            warn!(
                ticker = trade.ticker(),
                required = trade.initial_value(),
                available = self.balance,
                "open rejected: insufficient funds"
            );
            return Ok(OpenOutcome::Rejected(Rejection::InsufficientFunds {
                required: trade.initial_value(),
                available: self.balance,
            }));
        }

        let id = trade.id();
        self.next_trade_id = id.next();
        self.balance -= trade.initial_value();
        self.total_transaction_costs += open_cost;
        debug!(
            %id,
            ticker = trade.ticker(),
            side = %side,
            quantity,
            price,
            initial_value = trade.initial_value(),
            balance = self.balance,
            "trade opened"
        );
        self.open_trades.push(trade);
        Ok(OpenOutcome::Accepted(id))
    }

    /// Close an open trade at `price`, paying `close_cost`, and credit its
    /// final value to cash.
    pub fn close_trade(
        &mut self,
        id: TradeId,
        price: f64,
        close_cost: f64,
    ) -> Result<&Trade, PortfolioError> {
        let Some(index) = self.open_trades.iter().position(|t| t.id() == id) else {
            if self.closed_trades.iter().any(|t| t.id() == id) {
                return Err(PortfolioError::TradeAlreadyClosed(id));
            }
            return Err(PortfolioError::TradeNotOpen(id));
        };
        validate_price(price)?;
        validate_cost(close_cost)?;

        let now = self.clock.now();
        self.open_trades[index].close(price, close_cost, now)?;
        let trade = self.open_trades.remove(index);
        self.balance += trade.value();
        self.total_transaction_costs += close_cost;
        debug!(
            %id,
            ticker = trade.ticker(),
            price,
            value = trade.value(),
            pnl = trade.pnl(),
            balance = self.balance,
            "trade closed"
        );
        self.closed_trades.push(trade);

        let last = self.closed_trades.len() - 1;
        Ok(&self.closed_trades[last])
    }

    /// Mark every open trade on `ticker` to a fresh `price`.
    ///
    /// Returns how many trades were marked. Does not record a snapshot; call
    /// [`Portfolio::evaluate`] afterwards.
    pub fn mark(&mut self, ticker: &str, price: f64) -> Result<usize, PortfolioError> {
        validate_price(price)?;
        let now = self.clock.now();
        let mut marked = 0;
        for trade in self.open_trades.iter_mut().filter(|t| t.ticker() == ticker) {
            trade.apply_mark(price, now);
            marked += 1;
        }
        Ok(marked)
    }

    /// Revalue the portfolio and append a snapshot to the history.
    ///
    /// Each open trade is re-marked at its own last price; no new market
    /// price enters here. Fresh prices come in through [`Portfolio::mark`].
    pub fn evaluate(&mut self) -> PerformanceSnapshot {
        let now = self.clock.now();
        let mut open_value = 0.0;
        for trade in &mut self.open_trades {
            let last_price = trade.close_price();
            trade.apply_mark(last_price, now);
            open_value += trade.value();
        }
        self.evaluation = open_value + self.balance;
        self.track_performance()
    }

    /// Append `{now, balance, evaluation}` to the history and return it.
    ///
    /// Uses the evaluation as of the last [`Portfolio::evaluate`].
    pub fn track_performance(&mut self) -> PerformanceSnapshot {
        let snapshot = PerformanceSnapshot {
            timestamp: self.clock.now(),
            balance: self.balance,
            evaluation: self.evaluation,
        };
        self.performance_history.push(snapshot);
        snapshot
    }

    /// Sharpe, Sortino and cumulative return over the snapshot history.
    ///
    /// `None` with fewer than three snapshots. A zero evaluation anywhere in
    /// the history leaves Sharpe and Sortino as `None`.
    pub fn calculate_performance_ratios(&self, risk_free_rate: f64) -> Option<PerformanceRatios> {
        let evaluations: Vec<f64> = self
            .performance_history
            .iter()
            .map(|s| s.evaluation)
            .collect();
        PerformanceRatios::compute(
            &evaluations,
            self.evaluation,
            self.initial_balance,
            risk_free_rate,
        )
    }

    /// Win/loss tally over the closed trades.
    pub fn trade_statistics(&self) -> TradeStatistics {
        let trade_count = self.closed_trades.len();
        if trade_count == 0 {
            return TradeStatistics::default();
        }
        let winners = self.closed_trades.iter().filter(|t| t.pnl() > 0.0).count();
        let losers = self.closed_trades.iter().filter(|t| t.pnl() < 0.0).count();
        let realized_pnl = self.closed_trades.iter().map(Trade::pnl).sum();
        let mean_return_on_trade = self
            .closed_trades
            .iter()
            .map(|t| t.evaluate().return_on_trade)
            .sum::<f64>()
            / trade_count as f64;
        TradeStatistics {
            trade_count,
            winners,
            losers,
            win_rate: winners as f64 / trade_count as f64,
            realized_pnl,
            mean_return_on_trade,
        }
    }

    pub fn initial_balance(&self) -> f64 {
        self.initial_balance
    }

    /// Cash available for new trades.
    pub fn balance(&self) -> f64 {
        self.balance
    }

    /// Cash plus open trade values, as of the last evaluate.
    pub fn evaluation(&self) -> f64 {
        self.evaluation
    }

    /// Open trades in admission order.
    pub fn open_trades(&self) -> &[Trade] {
        &self.open_trades
    }

    /// Closed trades in close order.
    pub fn closed_trades(&self) -> &[Trade] {
        &self.closed_trades
    }

    /// Look up a trade in either set.
    pub fn trade(&self, id: TradeId) -> Option<&Trade> {
        self.open_trades
            .iter()
            .chain(self.closed_trades.iter())
            .find(|t| t.id() == id)
    }

    pub fn has_open_trades(&self) -> bool {
        !self.open_trades.is_empty()
    }

    pub fn performance_history(&self) -> &[PerformanceSnapshot] {
        &self.performance_history
    }

    /// Sum of open and close costs paid by admitted trades.
    pub fn total_transaction_costs(&self) -> f64 {
        self.total_transaction_costs
    }
}

fn validate_quantity(quantity: f64) -> Result<(), PortfolioError> {
    if quantity.is_finite() && quantity > 0.0 {
        Ok(())
    } else {
        Err(PortfolioError::InvalidOrder(format!(
            "quantity must be positive and finite, got {quantity}"
        )))
    }
}

fn validate_price(price: f64) -> Result<(), PortfolioError> {
    if price.is_finite() && price > 0.0 {
        Ok(())
    } else {
        Err(PortfolioError::InvalidOrder(format!(
            "price must be positive and finite, got {price}"
        )))
    }
}

fn validate_cost(cost: f64) -> Result<(), PortfolioError> {
    if cost.is_finite() && cost >= 0.0 {
        Ok(())
    } else {
        Err(PortfolioError::InvalidOrder(format!(
            "transaction cost must be non-negative and finite, got {cost}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 8, 1, 0, 0, 0).unwrap()
    }

    fn portfolio(balance: f64) -> (Portfolio, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(t0()));
        (Portfolio::new(balance, clock.clone()), clock)
    }

    #[test]
    fn new_portfolio_is_all_cash() {
        let (p, _) = portfolio(1_000.0);
        assert_eq!(p.balance(), 1_000.0);
        assert_eq!(p.evaluation(), 1_000.0);
        assert!(p.open_trades().is_empty());
        assert!(p.closed_trades().is_empty());
        assert!(p.performance_history().is_empty());
    }

    #[test]
    fn open_deducts_initial_value() {
        let (mut p, _) = portfolio(1_000.0);
        let outcome = p
            .open_trade("BTC/USD", 10.0, 50.0, 5.0, PositionSide::Long)
            .unwrap();
        assert_eq!(outcome, OpenOutcome::Accepted(TradeId(1)));
        assert_eq!(p.balance(), 505.0);
        assert_eq!(p.open_trades().len(), 1);
        assert_eq!(p.total_transaction_costs(), 5.0);
    }

    #[test]
    fn open_at_exact_balance_is_accepted() {
        let (mut p, _) = portfolio(495.0);
        let outcome = p
            .open_trade("BTC/USD", 10.0, 50.0, 5.0, PositionSide::Long)
            .unwrap();
        assert!(outcome.is_accepted());
        assert_eq!(p.balance(), 0.0);
    }

    #[test]
    fn open_beyond_balance_is_rejected_without_side_effects() {
        let (mut p, _) = portfolio(100.0);
        let outcome = p
            .open_trade("BTC/USD", 10.0, 50.0, 5.0, PositionSide::Long)
            .unwrap();
        assert_eq!(
            outcome,
            OpenOutcome::Rejected(Rejection::InsufficientFunds {
                required: 495.0,
                available: 100.0,
            })
        );
        assert_eq!(outcome.trade_id(), None);
        assert_eq!(p.balance(), 100.0);
        assert!(p.open_trades().is_empty());
        assert!(p.closed_trades().is_empty());
        assert_eq!(p.total_transaction_costs(), 0.0);
    }

    #[test]
    fn rejected_open_does_not_consume_an_id() {
        let (mut p, _) = portfolio(600.0);
        let _ = p.open_trade("X", 100.0, 50.0, 0.0, PositionSide::Long).unwrap();
        let outcome = p.open_trade("X", 10.0, 50.0, 0.0, PositionSide::Long).unwrap();
        assert_eq!(outcome.trade_id(), Some(TradeId(1)));
    }

    #[test]
    fn invalid_arguments_are_errors() {
        let (mut p, _) = portfolio(1_000.0);
        assert!(matches!(
            p.open_trade("X", 0.0, 50.0, 0.0, PositionSide::Long),
            Err(PortfolioError::InvalidOrder(_))
        ));
        assert!(matches!(
            p.open_trade("X", 1.0, f64::NAN, 0.0, PositionSide::Long),
            Err(PortfolioError::InvalidOrder(_))
        ));
        assert!(matches!(
            p.open_trade("X", 1.0, 50.0, -1.0, PositionSide::Long),
            Err(PortfolioError::InvalidOrder(_))
        ));
        // cost swallows the whole notional
        assert!(matches!(
            p.open_trade("X", 1.0, 5.0, 5.0, PositionSide::Long),
            Err(PortfolioError::InvalidOrder(_))
        ));
        assert_eq!(p.balance(), 1_000.0);
    }

    #[test]
    fn close_credits_final_value() {
        let (mut p, _) = portfolio(1_000.0);
        let id = p
            .open_trade("BTC/USD", 10.0, 50.0, 5.0, PositionSide::Long)
            .unwrap()
            .trade_id()
            .unwrap();
        let closed = p.close_trade(id, 60.0, 5.0).unwrap();
        assert_eq!(closed.value(), 595.0);
        assert_eq!(closed.pnl(), 100.0);
        assert_eq!(p.balance(), 1_100.0);
        assert!(p.open_trades().is_empty());
        assert_eq!(p.closed_trades().len(), 1);
        assert_eq!(p.total_transaction_costs(), 10.0);
    }

    #[test]
    fn close_unknown_trade_is_error() {
        let (mut p, _) = portfolio(1_000.0);
        assert_eq!(
            p.close_trade(TradeId(7), 60.0, 0.0).unwrap_err(),
            PortfolioError::TradeNotOpen(TradeId(7))
        );
    }

    #[test]
    fn double_close_is_error_and_keeps_balance() {
        let (mut p, _) = portfolio(1_000.0);
        let id = p
            .open_trade("BTC/USD", 10.0, 50.0, 5.0, PositionSide::Long)
            .unwrap()
            .trade_id()
            .unwrap();
        p.close_trade(id, 60.0, 5.0).unwrap();
        let err = p.close_trade(id, 70.0, 5.0).unwrap_err();
        assert_eq!(err, PortfolioError::TradeAlreadyClosed(id));
        assert_eq!(p.balance(), 1_100.0);
        assert_eq!(p.closed_trades().len(), 1);
    }

    #[test]
    fn evaluate_replays_last_price() {
        let (mut p, clock) = portfolio(1_000.0);
        let _ = p.open_trade("BTC/USD", 10.0, 50.0, 5.0, PositionSide::Long).unwrap();

        // No fresh price: the long is re-marked at its entry price.
        let snap = p.evaluate();
        assert_eq!(snap.evaluation, 505.0 + 500.0);
        assert_eq!(snap.balance, 505.0);

        clock.advance(Duration::minutes(5));
        assert_eq!(p.mark("BTC/USD", 60.0).unwrap(), 1);
        let snap = p.evaluate();
        assert_eq!(snap.evaluation, 505.0 + 600.0);
        assert_eq!(snap.timestamp, t0() + Duration::minutes(5));
        assert_eq!(p.open_trades()[0].age(), Duration::minutes(5));
        assert_eq!(p.performance_history().len(), 2);
    }

    #[test]
    fn mark_only_touches_matching_ticker() {
        let (mut p, _) = portfolio(10_000.0);
        let _ = p.open_trade("BTC/USD", 1.0, 100.0, 0.0, PositionSide::Long).unwrap();
        let _ = p.open_trade("ETH/USD", 1.0, 100.0, 0.0, PositionSide::Long).unwrap();
        assert_eq!(p.mark("ETH/USD", 120.0).unwrap(), 1);
        assert_eq!(p.open_trades()[0].value(), 100.0);
        assert_eq!(p.open_trades()[1].value(), 120.0);
        assert_eq!(p.mark("SOL/USD", 1.0).unwrap(), 0);
    }

    #[test]
    fn track_performance_appends_without_revaluing() {
        let (mut p, _) = portfolio(1_000.0);
        let _ = p.open_trade("BTC/USD", 10.0, 50.0, 0.0, PositionSide::Long).unwrap();
        // evaluation still reflects the last evaluate (none yet)
        let snap = p.track_performance();
        assert_eq!(snap.balance, 500.0);
        assert_eq!(snap.evaluation, 1_000.0);
        assert_eq!(p.performance_history(), &[snap]);
    }

    #[test]
    fn ratios_need_three_snapshots() {
        let (mut p, _) = portfolio(1_000.0);
        p.evaluate();
        p.evaluate();
        assert_eq!(p.calculate_performance_ratios(0.01), None);
    }

    #[test]
    fn ratios_survive_a_zero_evaluation() {
        let (mut p, _) = portfolio(200.0);
        let _ = p
            .open_trade("BTC/USD", 1.0, 100.0, 0.0, PositionSide::Short)
            .unwrap();
        p.evaluate(); // 200
        p.mark("BTC/USD", 300.0).unwrap();
        p.evaluate(); // short wiped out, cash 0
        p.mark("BTC/USD", 110.0).unwrap();
        p.evaluate(); // 190
        p.evaluate();

        let evaluations: Vec<f64> = p.performance_history().iter().map(|s| s.evaluation).collect();
        assert_eq!(evaluations, vec![200.0, 0.0, 190.0, 190.0]);
        let ratios = p.calculate_performance_ratios(0.01).unwrap();
        assert_eq!(ratios.sharpe_ratio, None);
        assert_eq!(ratios.sortino_ratio, None);
        assert!((ratios.cumulative_return.unwrap() + 0.05).abs() < 1e-12);
    }

    #[test]
    fn system_clock_stamps_wall_time() {
        let before = Utc::now();
        let mut p = Portfolio::with_system_clock(1_000.0);
        let id = p
            .open_trade("BTC/USD", 1.0, 100.0, 0.0, PositionSide::Long)
            .unwrap()
            .trade_id()
            .unwrap();
        let snap = p.evaluate();
        let after = Utc::now();
        let opened_at = p.trade(id).unwrap().opened_at();
        assert!(before <= opened_at && opened_at <= after);
        assert!(before <= snap.timestamp && snap.timestamp <= after);
    }

    #[test]
    fn ratios_over_history() {
        let (mut p, _) = portfolio(1_000.0);
        let id = p
            .open_trade("BTC/USD", 10.0, 50.0, 0.0, PositionSide::Long)
            .unwrap()
            .trade_id()
            .unwrap();
        p.evaluate(); // 1000
        p.mark("BTC/USD", 60.0).unwrap();
        p.evaluate(); // 1100
        p.mark("BTC/USD", 55.0).unwrap();
        p.evaluate(); // 1050
        p.close_trade(id, 55.0, 0.0).unwrap();

        let ratios = p.calculate_performance_ratios(0.0).unwrap();
        let returns: [f64; 2] = [1_100.0 / 1_000.0 - 1.0, 1_050.0 / 1_100.0 - 1.0];
        let mean = (returns[0] + returns[1]) / 2.0;
        let std = ((returns[0] - mean).powi(2) + (returns[1] - mean).powi(2)) / 2.0;
        assert!((ratios.sharpe_ratio.unwrap() - mean / std.sqrt()).abs() < 1e-12);
        // a single negative return has no spread
        assert_eq!(ratios.sortino_ratio, None);
        assert!((ratios.cumulative_return.unwrap() - 0.05).abs() < 1e-12);
    }

    #[test]
    fn trade_lookup_spans_both_sets() {
        let (mut p, _) = portfolio(10_000.0);
        let a = p.open_trade("A", 1.0, 10.0, 0.0, PositionSide::Long).unwrap().trade_id().unwrap();
        let b = p.open_trade("B", 1.0, 10.0, 0.0, PositionSide::Short).unwrap().trade_id().unwrap();
        p.close_trade(a, 11.0, 0.0).unwrap();
        assert!(!p.trade(a).unwrap().is_open());
        assert!(p.trade(b).unwrap().is_open());
        assert!(p.trade(TradeId(99)).is_none());
    }

    #[test]
    fn trade_statistics_over_closed_trades() {
        let (mut p, _) = portfolio(10_000.0);
        assert_eq!(p.trade_statistics(), TradeStatistics::default());

        let a = p.open_trade("A", 10.0, 10.0, 0.0, PositionSide::Long).unwrap().trade_id().unwrap();
        let b = p.open_trade("B", 10.0, 10.0, 0.0, PositionSide::Long).unwrap().trade_id().unwrap();
        p.close_trade(a, 12.0, 0.0).unwrap(); // +20
        p.close_trade(b, 9.0, 0.0).unwrap(); // -10

        let stats = p.trade_statistics();
        assert_eq!(stats.trade_count, 2);
        assert_eq!(stats.winners, 1);
        assert_eq!(stats.losers, 1);
        assert_eq!(stats.win_rate, 0.5);
        assert_eq!(stats.realized_pnl, 10.0);
        assert!((stats.mean_return_on_trade - 5.0).abs() < 1e-12);
    }
}
