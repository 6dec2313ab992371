//! Cost model — transaction cost of a fill from exchange fees and slippage.
//!
//! The fee is a fraction of notional that depends on whether the order adds
//! liquidity (maker) or takes it (taker). Slippage is a fixed amount per
//! unit traded. The result is passed to the portfolio as the open or close
//! transaction cost.

use serde::{Deserialize, Serialize};

/// Which side of the book an order executes against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Liquidity {
    Maker,
    Taker,
}

/// Exchange fees plus per-unit slippage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostModel {
    /// Fee as a fraction of notional for resting (maker) orders.
    pub maker_fee: f64,
    /// Fee as a fraction of notional for aggressive (taker) orders.
    pub taker_fee: f64,
    /// Price units lost per unit traded.
    pub slippage: f64,
}

impl Default for CostModel {
    fn default() -> Self {
        Self {
            maker_fee: 0.0005,
            taker_fee: 0.0002,
            slippage: 0.01,
        }
    }
}

impl CostModel {
    pub fn new(maker_fee: f64, taker_fee: f64, slippage: f64) -> Self {
        Self {
            maker_fee,
            taker_fee,
            slippage,
        }
    }

    pub fn frictionless() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    pub fn fee_rate(&self, liquidity: Liquidity) -> f64 {
        match liquidity {
            Liquidity::Maker => self.maker_fee,
            Liquidity::Taker => self.taker_fee,
        }
    }

    /// Total cost of trading `quantity` at `price`.
    pub fn transaction_cost(&self, quantity: f64, price: f64, liquidity: Liquidity) -> f64 {
        let notional = quantity * price;
        notional * self.fee_rate(liquidity) + quantity * self.slippage
    }

    /// Whether every component is finite and non-negative.
    pub fn is_valid(&self) -> bool {
        [self.maker_fee, self.taker_fee, self.slippage]
            .iter()
            .all(|v| v.is_finite() && *v >= 0.0)
    }
}
