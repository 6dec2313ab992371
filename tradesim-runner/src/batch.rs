//! Batch replay — many independent sessions in parallel.
//!
//! Each job gets its own `ReplaySession` (and so its own portfolio and
//! clock); nothing is shared between workers except the read-only driver
//! and candle source. Results come back in job order.

use anyhow::{Context, Result};
use rayon::prelude::*;
use tracing::info;

use crate::candles::{Candle, CandleSource};
use crate::config::SessionConfig;
use crate::report::SessionReport;
use crate::session::ReplaySession;

/// One session to replay: its config and the candles to replay it over.
#[derive(Debug, Clone)]
pub struct BatchJob {
    pub config: SessionConfig,
    pub candles: Vec<Candle>,
}

/// Replay every job with `driver` and collect a report per job.
///
/// The driver receives a fresh, unstarted session and is responsible for
/// stepping it. A failing job does not stop the others.
pub fn run_batch<F>(jobs: Vec<BatchJob>, driver: F) -> Vec<Result<SessionReport>>
where
    F: Fn(&mut ReplaySession) -> Result<()> + Sync,
{
    let total = jobs.len();
    let reports: Vec<Result<SessionReport>> = jobs
        .into_par_iter()
        .map(|job| {
            let symbol = job.config.session.symbol.clone();
            let mut session = ReplaySession::new(job.config, job.candles)
                .with_context(|| format!("failed to build session for {symbol}"))?;
            driver(&mut session).with_context(|| format!("driver failed on {symbol}"))?;
            Ok(session.report())
        })
        .collect();

    let failed = reports.iter().filter(|r| r.is_err()).count();
    info!(total, failed, "batch replay finished");
    reports
}

/// Like [`run_batch`], fetching each config's candles from `source` first.
pub fn run_batch_from_source<F>(
    configs: &[SessionConfig],
    source: &dyn CandleSource,
    driver: F,
) -> Vec<Result<SessionReport>>
where
    F: Fn(&mut ReplaySession) -> Result<()> + Sync,
{
    configs
        .par_iter()
        .map(|config| {
            let mut session = ReplaySession::from_source(config.clone(), source)
                .with_context(|| format!("failed to load {}", config.session.symbol))?;
            driver(&mut session)?;
            Ok(session.report())
        })
        .collect()
}
