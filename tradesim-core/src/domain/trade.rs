//! Trade — one position from open through mark-to-market to close.
//!
//! A trade owns its own valuation. [`Trade::apply_mark`] is the only writer
//! of the derived fields (value, PnL, age, excursions, drawdown); the public
//! mark path and the close path both go through it.

use super::ids::TradeId;
use super::position::PositionSide;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from trade lifecycle operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TradeError {
    #[error("trade {0} is already closed")]
    AlreadyClosed(TradeId),
}

/// A single long or short position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    // ── Identification ──
    id: TradeId,
    ticker: String,
    side: PositionSide,
    quantity: f64,

    // ── Prices ──
    initial_price: f64,
    /// Last price the trade was marked at (the exit price once closed).
    close_price: f64,

    // ── Costs ──
    open_transaction_cost: f64,
    close_transaction_cost: f64,

    // ── Valuation ──
    initial_value: f64,
    value: f64,
    pnl: f64,

    // ── Extrema ──
    max_favorable_excursion: f64,
    max_adverse_excursion: f64,
    max_value: f64,
    min_value: f64,
    max_drawdown: f64,

    // ── Time ──
    opened_at: DateTime<Utc>,
    closed_at: Option<DateTime<Utc>>,
    #[serde(rename = "age_ms", with = "age_millis")]
    age: Duration,
}

impl Trade {
    /// Open a position at `price`, paying `open_cost`.
    ///
    /// No admission checks happen here; the portfolio decides whether the
    /// trade may exist.
    pub fn open(
        id: TradeId,
        ticker: impl Into<String>,
        quantity: f64,
        price: f64,
        open_cost: f64,
        side: PositionSide,
        opened_at: DateTime<Utc>,
    ) -> Self {
        let initial_value = side.initial_value(quantity, price, open_cost);
        Self {
            id,
            ticker: ticker.into(),
            side,
            quantity,
            initial_price: price,
            close_price: price,
            open_transaction_cost: open_cost,
            close_transaction_cost: 0.0,
            initial_value,
            value: initial_value,
            pnl: -open_cost,
            max_favorable_excursion: 0.0,
            max_adverse_excursion: 0.0,
            max_value: initial_value,
            min_value: initial_value,
            max_drawdown: 0.0,
            opened_at,
            closed_at: None,
            age: Duration::zero(),
        }
    }

    /// Mark the trade to `price` as of `at`.
    pub fn mark(&mut self, price: f64, at: DateTime<Utc>) -> Result<(), TradeError> {
        self.ensure_open()?;
        self.apply_mark(price, at);
        Ok(())
    }

    /// Close the trade at `price`, paying `close_cost`.
    ///
    /// The close cost comes off both the final value and the PnL. A trade
    /// closes at most once.
    pub fn close(
        &mut self,
        price: f64,
        close_cost: f64,
        at: DateTime<Utc>,
    ) -> Result<(), TradeError> {
        self.ensure_open()?;
        self.apply_mark(price, at);
        self.value -= close_cost;
        self.pnl -= close_cost;
        self.close_transaction_cost = close_cost;
        self.close_price = price;
        self.closed_at = Some(at);
        self.age = at - self.opened_at;
        Ok(())
    }

    /// Performance report for this trade. Pure read.
    pub fn evaluate(&self) -> TradeReport {
        let win_loss_ratio = if self.max_drawdown != 0.0 {
            Some(self.pnl / self.max_drawdown.abs())
        } else {
            None
        };
        TradeReport {
            trade_id: self.id,
            return_on_trade: self.pnl / self.initial_value * 100.0,
            trade_duration_hours: self.age_seconds() / 3600.0,
            win_loss_ratio,
            mae: self.max_adverse_excursion,
            mfe: self.max_favorable_excursion,
            max_drawdown: self.max_drawdown,
        }
    }

    /// Recompute every derived field from a new price.
    ///
    /// Excursions and drawdown are updated after the new value is in place.
    /// Callers guarantee the trade is open.
    pub(crate) fn apply_mark(&mut self, price: f64, at: DateTime<Utc>) {
        self.close_price = price;
        self.value = self
            .side
            .mark_value(self.quantity, self.initial_price, self.initial_value, price);
        self.pnl = self.value - self.initial_value;
        self.age = at - self.opened_at;

        // MAE/MFE start at zero, so a trade that never goes non-positive
        // keeps an MAE of 0.
        self.max_favorable_excursion = self.max_favorable_excursion.max(self.value);
        self.max_adverse_excursion = self.max_adverse_excursion.min(self.value);

        if self.value > self.max_value {
            self.max_value = self.value;
        }
        if self.value < self.min_value {
            self.min_value = self.value;
            self.max_drawdown = self.initial_value - self.min_value;
        }
    }

    fn ensure_open(&self) -> Result<(), TradeError> {
        if self.is_open() {
            Ok(())
        } else {
            Err(TradeError::AlreadyClosed(self.id))
        }
    }

    pub fn id(&self) -> TradeId {
        self.id
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn side(&self) -> PositionSide {
        self.side
    }

    pub fn quantity(&self) -> f64 {
        self.quantity
    }

    pub fn initial_price(&self) -> f64 {
        self.initial_price
    }

    pub fn close_price(&self) -> f64 {
        self.close_price
    }

    pub fn open_transaction_cost(&self) -> f64 {
        self.open_transaction_cost
    }

    pub fn close_transaction_cost(&self) -> f64 {
        self.close_transaction_cost
    }

    pub fn initial_value(&self) -> f64 {
        self.initial_value
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn pnl(&self) -> f64 {
        self.pnl
    }

    pub fn max_favorable_excursion(&self) -> f64 {
        self.max_favorable_excursion
    }

    pub fn max_adverse_excursion(&self) -> f64 {
        self.max_adverse_excursion
    }

    pub fn max_value(&self) -> f64 {
        self.max_value
    }

    pub fn min_value(&self) -> f64 {
        self.min_value
    }

    /// Decline from the initial value to the lowest value seen.
    pub fn max_drawdown(&self) -> f64 {
        self.max_drawdown
    }

    pub fn opened_at(&self) -> DateTime<Utc> {
        self.opened_at
    }

    pub fn closed_at(&self) -> Option<DateTime<Utc>> {
        self.closed_at
    }

    pub fn is_open(&self) -> bool {
        self.closed_at.is_none()
    }

    /// Time since open as of the last mark, or the full holding time once closed.
    pub fn age(&self) -> Duration {
        self.age
    }

    pub fn age_seconds(&self) -> f64 {
        self.age.num_milliseconds() as f64 / 1000.0
    }
}

/// Read-only performance summary of one trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeReport {
    pub trade_id: TradeId,
    /// PnL as a percentage of the initial value.
    pub return_on_trade: f64,
    pub trade_duration_hours: f64,
    /// PnL over |max drawdown|; `None` when the trade never drew down.
    pub win_loss_ratio: Option<f64>,
    pub mae: f64,
    pub mfe: f64,
    pub max_drawdown: f64,
}

mod age_millis {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(age: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(age.num_milliseconds())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        i64::deserialize(deserializer).map(Duration::milliseconds)
    }
}
