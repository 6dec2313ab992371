//! Replay session — walks a portfolio through a candle series one bar at a time.
//!
//! The session owns the portfolio and a [`ManualClock`] pinned to the
//! current candle's timestamp, so trade ages and snapshot dates are in
//! simulated time rather than wall-clock time.
//!
//! Per step:
//! 1. Advance the cursor and move the clock to the candle's timestamp
//! 2. Mark open trades on the session symbol to the candle close
//! 3. Evaluate the portfolio (one snapshot per step)
//!
//! Between steps a driver may open and close trades at the current close;
//! the session prices transaction costs with the configured
//! [`CostModel`](crate::costs::CostModel).
//! Deciding *what* to trade is the driver's job.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use tradesim_core::{
    ManualClock, OpenOutcome, PerformanceSnapshot, Portfolio, PortfolioError, PositionSide,
    Trade, TradeId,
};

use crate::candles::{validate_series, Candle, CandleSource, DataError};
use crate::config::{ConfigError, SessionConfig};
use crate::costs::Liquidity;
use crate::report::SessionReport;

/// Errors from driving a replay session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("data error: {0}")]
    Data(#[from] DataError),

    #[error("portfolio error: {0}")]
    Portfolio(#[from] PortfolioError),

    #[error("no candles to replay")]
    NoCandles,

    #[error("session has not started; call step() first")]
    NotStarted,

    #[error("session finished after {steps} steps")]
    Finished { steps: usize },
}

/// What a step produced.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepState {
    /// Index of the candle this step consumed.
    pub index: usize,
    pub candle: Candle,
    pub snapshot: PerformanceSnapshot,
    pub open_trades: usize,
    /// True when no candles remain.
    pub done: bool,
}

/// A portfolio replayed over one symbol's candle series.
#[derive(Debug)]
pub struct ReplaySession {
    config: SessionConfig,
    candles: Vec<Candle>,
    cursor: Option<usize>,
    portfolio: Portfolio,
    clock: Arc<ManualClock>,
}

impl ReplaySession {
    /// Build a session over an already-loaded series.
    pub fn new(config: SessionConfig, candles: Vec<Candle>) -> Result<Self, SessionError> {
        config.validate()?;
        if candles.is_empty() {
            return Err(SessionError::NoCandles);
        }
        validate_series(&candles)?;

        let clock = Arc::new(ManualClock::new(candles[0].timestamp));
        let portfolio = Portfolio::new(config.session.initial_balance, clock.clone());
        info!(
            symbol = %config.session.symbol,
            candles = candles.len(),
            initial_balance = config.session.initial_balance,
            fingerprint = %config.fingerprint(),
            "replay session created"
        );
        Ok(Self {
            config,
            candles,
            cursor: None,
            portfolio,
            clock,
        })
    }

    /// Fetch the configured symbol and range from `source`, then build.
    pub fn from_source(
        config: SessionConfig,
        source: &dyn CandleSource,
    ) -> Result<Self, SessionError> {
        let s = &config.session;
        let candles = source.fetch(&s.symbol, s.start, s.end)?;
        Self::new(config, candles)
    }

    /// Consume the next candle: mark, evaluate, snapshot.
    pub fn step(&mut self) -> Result<StepState, SessionError> {
        let index = self.cursor.map_or(0, |i| i + 1);
        let Some(&candle) = self.candles.get(index) else {
            return Err(SessionError::Finished {
                steps: self.candles.len(),
            });
        };
        self.cursor = Some(index);
        self.clock.set(candle.timestamp);

        self.portfolio
            .mark(&self.config.session.symbol, candle.close)?;
        let snapshot = self.portfolio.evaluate();
        let done = self.is_done();
        debug!(
            index,
            close = candle.close,
            evaluation = snapshot.evaluation,
            balance = snapshot.balance,
            "step"
        );
        if done {
            info!(
                steps = index + 1,
                evaluation = snapshot.evaluation,
                "replay session reached the last candle"
            );
        }
        Ok(StepState {
            index,
            candle,
            snapshot,
            open_trades: self.portfolio.open_trades().len(),
            done,
        })
    }

    /// Step until the series is exhausted. Returns the number of steps taken.
    pub fn run_to_end(&mut self) -> Result<usize, SessionError> {
        let mut steps = 0;
        while !self.is_done() {
            self.step()?;
            steps += 1;
        }
        Ok(steps)
    }

    /// The candle consumed by the last step.
    pub fn current_candle(&self) -> Result<&Candle, SessionError> {
        self.cursor
            .map(|i| &self.candles[i])
            .ok_or(SessionError::NotStarted)
    }

    /// Open a trade at the current close, costs priced by the cost model.
    pub fn open(
        &mut self,
        side: PositionSide,
        quantity: f64,
        liquidity: Liquidity,
    ) -> Result<OpenOutcome, SessionError> {
        let price = self.current_candle()?.close;
        let cost = self.config.costs.transaction_cost(quantity, price, liquidity);
        let outcome = self.portfolio.open_trade(
            self.config.session.symbol.clone(),
            quantity,
            price,
            cost,
            side,
        )?;
        Ok(outcome)
    }

    /// Close an open trade at the current close. Returns the finished trade.
    pub fn close(&mut self, id: TradeId, liquidity: Liquidity) -> Result<Trade, SessionError> {
        let price = self.current_candle()?.close;
        let quantity = self
            .portfolio
            .open_trades()
            .iter()
            .find(|t| t.id() == id)
            .map(Trade::quantity);
        // Unknown and already-closed ids fall through to the portfolio's error.
        let cost = quantity.map_or(0.0, |q| {
            self.config.costs.transaction_cost(q, price, liquidity)
        });
        let trade = self.portfolio.close_trade(id, price, cost)?;
        Ok(trade.clone())
    }

    /// Close every open trade at the current close, in admission order.
    pub fn close_all(&mut self, liquidity: Liquidity) -> Result<Vec<Trade>, SessionError> {
        let ids: Vec<TradeId> = self.portfolio.open_trades().iter().map(Trade::id).collect();
        ids.into_iter().map(|id| self.close(id, liquidity)).collect()
    }

    pub fn is_done(&self) -> bool {
        self.cursor == Some(self.candles.len() - 1)
    }

    /// Candles not yet consumed.
    pub fn remaining(&self) -> usize {
        match self.cursor {
            Some(i) => self.candles.len() - 1 - i,
            None => self.candles.len(),
        }
    }

    /// Number of steps taken so far.
    pub fn steps(&self) -> usize {
        self.cursor.map_or(0, |i| i + 1)
    }

    pub fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Snapshot the session into a serializable report.
    pub fn report(&self) -> SessionReport {
        SessionReport::from_portfolio(
            self.config.fingerprint(),
            &self.config.session.symbol,
            self.candles.len(),
            self.steps(),
            &self.portfolio,
            self.config.session.risk_free_rate,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::costs::CostModel;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 8, 1, 0, 0, 0).unwrap()
    }

    fn candles(closes: &[f64]) -> Vec<Candle> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Candle {
                timestamp: t0() + Duration::minutes(5 * i as i64),
                open: close,
                high: close + 1.0,
                low: close - 1.0,
                close,
                volume: 1.0,
            })
            .collect()
    }

    fn config() -> SessionConfig {
        let mut config = SessionConfig::new("BTC/USD", t0(), t0() + Duration::days(1));
        config.session.initial_balance = 1_000.0;
        config.costs = CostModel::frictionless();
        config
    }

    #[test]
    fn empty_series_is_rejected() {
        assert!(matches!(
            ReplaySession::new(config(), vec![]),
            Err(SessionError::NoCandles)
        ));
    }

    #[test]
    fn trading_before_first_step_fails() {
        let mut session = ReplaySession::new(config(), candles(&[100.0])).unwrap();
        assert!(matches!(
            session.open(PositionSide::Long, 1.0, Liquidity::Taker),
            Err(SessionError::NotStarted)
        ));
    }

    #[test]
    fn steps_walk_the_series_then_finish() {
        let mut session = ReplaySession::new(config(), candles(&[100.0, 101.0, 102.0])).unwrap();
        assert_eq!(session.remaining(), 3);

        let first = session.step().unwrap();
        assert_eq!(first.index, 0);
        assert!(!first.done);
        assert_eq!(first.snapshot.timestamp, t0());

        session.step().unwrap();
        let last = session.step().unwrap();
        assert!(last.done);
        assert_eq!(session.remaining(), 0);
        assert_eq!(session.portfolio().performance_history().len(), 3);
        assert!(matches!(
            session.step(),
            Err(SessionError::Finished { steps: 3 })
        ));
    }

    #[test]
    fn open_mark_close_at_bar_prices() {
        let mut session =
            ReplaySession::new(config(), candles(&[100.0, 110.0, 120.0])).unwrap();
        session.step().unwrap();
        let id = session
            .open(PositionSide::Long, 5.0, Liquidity::Taker)
            .unwrap()
            .trade_id()
            .unwrap();
        assert_eq!(session.portfolio().balance(), 500.0);

        let state = session.step().unwrap();
        assert_eq!(state.snapshot.evaluation, 500.0 + 550.0);
        assert_eq!(state.open_trades, 1);

        session.step().unwrap();
        let trade = session.close(id, Liquidity::Taker).unwrap();
        assert_eq!(trade.value(), 600.0);
        assert_eq!(trade.age(), Duration::minutes(10));
        assert_eq!(session.portfolio().balance(), 1_100.0);
    }

    #[test]
    fn costs_come_from_the_model() {
        let mut cfg = config();
        cfg.costs = CostModel::new(0.0, 0.001, 0.1);
        let mut session = ReplaySession::new(cfg, candles(&[100.0, 100.0])).unwrap();
        session.step().unwrap();
        let id = session
            .open(PositionSide::Long, 2.0, Liquidity::Taker)
            .unwrap()
            .trade_id()
            .unwrap();
        // 200 notional * 0.001 + 2 * 0.1
        let trade = session.portfolio().trade(id).unwrap();
        assert!((trade.open_transaction_cost() - 0.4).abs() < 1e-12);

        session.step().unwrap();
        let closed = session.close(id, Liquidity::Maker).unwrap();
        // maker fee is zero, slippage only
        assert!((closed.close_transaction_cost() - 0.2).abs() < 1e-12);
    }

    #[test]
    fn close_unknown_trade_surfaces_portfolio_error() {
        let mut session = ReplaySession::new(config(), candles(&[100.0])).unwrap();
        session.step().unwrap();
        assert!(matches!(
            session.close(TradeId(9), Liquidity::Taker),
            Err(SessionError::Portfolio(PortfolioError::TradeNotOpen(_)))
        ));
    }

    #[test]
    fn close_all_flattens_the_book() {
        let mut session = ReplaySession::new(config(), candles(&[10.0, 12.0])).unwrap();
        session.step().unwrap();
        let _ = session.open(PositionSide::Long, 10.0, Liquidity::Taker).unwrap();
        let _ = session.open(PositionSide::Short, 5.0, Liquidity::Taker).unwrap();
        session.step().unwrap();
        let closed = session.close_all(Liquidity::Taker).unwrap();
        assert_eq!(closed.len(), 2);
        assert!(!session.portfolio().has_open_trades());
    }

    #[test]
    fn run_to_end_consumes_everything() {
        let mut session =
            ReplaySession::new(config(), candles(&[10.0, 11.0, 12.0, 13.0])).unwrap();
        session.step().unwrap();
        assert_eq!(session.run_to_end().unwrap(), 3);
        assert!(session.is_done());
        assert_eq!(session.steps(), 4);
    }
}
