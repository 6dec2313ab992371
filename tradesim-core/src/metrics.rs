//! Performance ratios — pure functions over a series of portfolio evaluations.
//!
//! Every metric is evaluation series in, `Option<f64>` out. `None` means the
//! metric is undefined for the input (too little history, zero variance, a
//! zero denominator); nothing here panics or divides by zero.

use serde::{Deserialize, Serialize};

/// Risk-free rate used when the caller has no opinion.
pub const DEFAULT_RISK_FREE_RATE: f64 = 0.01;

/// Minimum number of period returns for the ratios to be defined.
pub const MIN_RETURNS: usize = 2;

/// Standard deviations below this are treated as zero.
const STD_EPSILON: f64 = 1e-15;

/// Portfolio-level risk/return ratios.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceRatios {
    pub sharpe_ratio: Option<f64>,
    pub sortino_ratio: Option<f64>,
    pub cumulative_return: Option<f64>,
}

impl PerformanceRatios {
    /// Compute the ratios for an evaluation series.
    ///
    /// Returns `None` when fewer than [`MIN_RETURNS`] period returns exist.
    /// A zero evaluation in the series leaves Sharpe and Sortino undefined
    /// but keeps the cumulative return, which uses `current_evaluation`
    /// (not necessarily the last element of `evaluations`).
    pub fn compute(
        evaluations: &[f64],
        current_evaluation: f64,
        initial_balance: f64,
        risk_free_rate: f64,
    ) -> Option<Self> {
        if evaluations.len() < MIN_RETURNS + 1 {
            return None;
        }
        let cumulative_return = cumulative_return(current_evaluation, initial_balance);
        let Some(returns) = period_returns(evaluations) else {
            return Some(Self {
                sharpe_ratio: None,
                sortino_ratio: None,
                cumulative_return,
            });
        };
        Some(Self {
            sharpe_ratio: sharpe_ratio(&returns, risk_free_rate),
            sortino_ratio: sortino_ratio(&returns, risk_free_rate),
            cumulative_return,
        })
    }
}

/// Simple returns between consecutive evaluations: `e[i] / e[i-1] - 1`.
///
/// `None` if any evaluation used as a denominator is zero.
pub fn period_returns(evaluations: &[f64]) -> Option<Vec<f64>> {
    evaluations
        .windows(2)
        .map(|w| {
            if w[0] == 0.0 {
                None
            } else {
                Some(w[1] / w[0] - 1.0)
            }
        })
        .collect()
}

/// Sharpe ratio: `(mean(r) - rf) / std(r)`, population standard deviation.
///
/// The risk-free rate is applied per period as given (no annualization).
pub fn sharpe_ratio(returns: &[f64], risk_free_rate: f64) -> Option<f64> {
    let mean = mean(returns)?;
    let std = population_std_dev(returns)?;
    if std < STD_EPSILON {
        return None;
    }
    Some((mean - risk_free_rate) / std)
}

/// Sortino ratio: `(mean(r) - rf) / std(negative r)`.
///
/// The denominator is the population standard deviation of the negative
/// returns alone. Undefined with no negative returns or a single repeated
/// negative return.
pub fn sortino_ratio(returns: &[f64], risk_free_rate: f64) -> Option<f64> {
    let mean = mean(returns)?;
    let downside: Vec<f64> = returns.iter().copied().filter(|&r| r < 0.0).collect();
    let downside_std = population_std_dev(&downside)?;
    if downside_std < STD_EPSILON {
        return None;
    }
    Some((mean - risk_free_rate) / downside_std)
}

/// `current / initial - 1`; undefined for a zero initial balance.
pub fn cumulative_return(current_evaluation: f64, initial_balance: f64) -> Option<f64> {
    if initial_balance == 0.0 {
        return None;
    }
    Some(current_evaluation / initial_balance - 1.0)
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population (divide by n) standard deviation. `None` for an empty slice.
pub fn population_std_dev(values: &[f64]) -> Option<f64> {
    let mean = mean(values)?;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    Some(var.sqrt())
}
