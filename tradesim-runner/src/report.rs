//! Reporting and export — JSON session reports and CSV trade tapes.
//!
//! Persisted reports carry a `schema_version` field. Newer versions than
//! this build understands are rejected on load.

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tradesim_core::{
    PerformanceRatios, PerformanceSnapshot, Portfolio, Trade, TradeReport, TradeStatistics,
};

pub const SCHEMA_VERSION: u32 = 1;

/// Everything worth keeping from one replay session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub schema_version: u32,
    pub fingerprint: String,
    pub symbol: String,
    pub candle_count: usize,
    pub steps: usize,

    // ── Cash and valuation ──
    pub initial_balance: f64,
    pub final_balance: f64,
    pub final_evaluation: f64,
    pub total_transaction_costs: f64,

    // ── Performance ──
    pub ratios: Option<PerformanceRatios>,
    pub statistics: TradeStatistics,
    pub trade_reports: Vec<TradeReport>,

    // ── Raw records ──
    pub closed_trades: Vec<Trade>,
    pub open_trades: Vec<Trade>,
    pub history: Vec<PerformanceSnapshot>,
}

impl SessionReport {
    pub fn from_portfolio(
        fingerprint: String,
        symbol: &str,
        candle_count: usize,
        steps: usize,
        portfolio: &Portfolio,
        risk_free_rate: f64,
    ) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            fingerprint,
            symbol: symbol.to_string(),
            candle_count,
            steps,
            initial_balance: portfolio.initial_balance(),
            final_balance: portfolio.balance(),
            final_evaluation: portfolio.evaluation(),
            total_transaction_costs: portfolio.total_transaction_costs(),
            ratios: portfolio.calculate_performance_ratios(risk_free_rate),
            statistics: portfolio.trade_statistics(),
            trade_reports: portfolio.closed_trades().iter().map(Trade::evaluate).collect(),
            closed_trades: portfolio.closed_trades().to_vec(),
            open_trades: portfolio.open_trades().to_vec(),
            history: portfolio.performance_history().to_vec(),
        }
    }
}

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize a `SessionReport` to pretty JSON.
pub fn export_json(report: &SessionReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize SessionReport to JSON")
}

/// Deserialize a `SessionReport` from JSON, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<SessionReport> {
    let report: SessionReport =
        serde_json::from_str(json).context("failed to deserialize SessionReport from JSON")?;
    if report.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            report.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(report)
}

/// Write the pretty JSON report to `path`.
pub fn write_json(path: &Path, report: &SessionReport) -> Result<()> {
    let json = export_json(report)?;
    std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Export a trade list as CSV.
///
/// Columns: id, ticker, side, quantity, initial_price, close_price,
/// open_cost, close_cost, initial_value, value, pnl, mae, mfe, max_drawdown,
/// opened_at, closed_at, age_seconds
pub fn export_trades_csv(trades: &[Trade]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "id",
        "ticker",
        "side",
        "quantity",
        "initial_price",
        "close_price",
        "open_cost",
        "close_cost",
        "initial_value",
        "value",
        "pnl",
        "mae",
        "mfe",
        "max_drawdown",
        "opened_at",
        "closed_at",
        "age_seconds",
    ])?;

    for t in trades {
        wtr.write_record(&[
            t.id().0.to_string(),
            t.ticker().to_string(),
            t.side().to_string(),
            t.quantity().to_string(),
            t.initial_price().to_string(),
            t.close_price().to_string(),
            t.open_transaction_cost().to_string(),
            t.close_transaction_cost().to_string(),
            t.initial_value().to_string(),
            t.value().to_string(),
            t.pnl().to_string(),
            t.max_adverse_excursion().to_string(),
            t.max_favorable_excursion().to_string(),
            t.max_drawdown().to_string(),
            t.opened_at().to_rfc3339(),
            t.closed_at().map(|d| d.to_rfc3339()).unwrap_or_default(),
            t.age_seconds().to_string(),
        ])?;
    }

    let bytes = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(bytes).context("CSV output is not valid UTF-8")
}
