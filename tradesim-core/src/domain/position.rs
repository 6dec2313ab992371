//! Position side and its valuation laws.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of a trade.
///
/// Each side carries its own valuation law. The short law values the
/// position against a basis of twice the entry notional, so a short opened
/// at `p` and marked at `p` is worth `2 * p * quantity - open_cost`, and
/// every unit the price falls adds `quantity` to that. This basis is kept
/// as-is and is pending product confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionSide {
    Long,
    Short,
}

impl PositionSide {
    /// Value of a freshly opened position, net of the opening cost.
    pub fn initial_value(self, quantity: f64, price: f64, open_cost: f64) -> f64 {
        match self {
            PositionSide::Long => quantity * price - open_cost,
            PositionSide::Short => quantity * (2.0 * price) - open_cost,
        }
    }

    /// Mark-to-market value at `price`.
    ///
    /// The long law ignores the entry entirely (gross notional at `price`);
    /// the short law moves the initial value by the price change since entry.
    pub fn mark_value(
        self,
        quantity: f64,
        initial_price: f64,
        initial_value: f64,
        price: f64,
    ) -> f64 {
        match self {
            PositionSide::Long => price * quantity,
            PositionSide::Short => (initial_price - price) * quantity + initial_value,
        }
    }

    pub fn is_long(self) -> bool {
        self == PositionSide::Long
    }

    pub fn is_short(self) -> bool {
        self == PositionSide::Short
    }
}

impl fmt::Display for PositionSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionSide::Long => write!(f, "long"),
            PositionSide::Short => write!(f, "short"),
        }
    }
}
