//! Backtest runner — wires together config, engine, and metrics.
//!
//! `run_single_backtest()` takes a parsed config and a loaded panel, drives
//! the portfolio engine over the configured date range, and packages the
//! outcome as a serializable `BacktestSummary` with its performance report.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use rebalab_core::domain::DailyRecord;
use rebalab_core::engine::{EngineError, PortfolioEngine};
use rebalab_core::market::{MarketError, MarketPanel};

use crate::config::{BacktestConfig, ConfigError};
use crate::data_loader::LoadError;
use crate::metrics::PerformanceReport;

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("data error: {0}")]
    Load(#[from] LoadError),

    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("market data error: {0}")]
    Market(#[from] MarketError),
}

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

/// Complete serializable result of a single backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestSummary {
    /// Schema version for forward-compatible deserialization.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub run_id: String,
    pub policy: String,
    /// First simulated trading date (start resolved forward).
    pub start_date: NaiveDate,
    /// Last simulated trading date.
    pub end_date: NaiveDate,
    pub initial_cash: f64,
    pub report: PerformanceReport,
    pub nav_series: Vec<(NaiveDate, f64)>,
    /// Benchmark over the simulated range, rebased to 100 at the first
    /// observation.
    pub benchmark_series: Vec<(NaiveDate, f64)>,
    pub history: Vec<DailyRecord>,
    pub warnings: Vec<String>,
    pub dataset_hash: String,
    pub has_synthetic: bool,
}

/// Default schema version for deserializing older JSON without the field.
fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Run a single backtest over a pre-loaded panel.
pub fn run_single_backtest(
    config: &BacktestConfig,
    panel: &MarketPanel,
    dataset_hash: &str,
    has_synthetic: bool,
) -> Result<BacktestSummary, RunError> {
    let policy = config.policy.build()?;
    let policy_name = policy.name().to_string();

    let engine = PortfolioEngine::new(panel, policy, config.engine_config())?;
    let run = engine.run()?;

    // The engine guarantees at least the initialization record on success.
    let start_date = run
        .history
        .first()
        .map(|r| r.date)
        .unwrap_or(config.backtest.start_date);
    let end_date = run
        .history
        .last()
        .map(|r| r.date)
        .unwrap_or(config.backtest.end_date);

    let nav_series = run.nav_series();
    let benchmark_series = panel.benchmark_rebased(start_date, end_date)?;

    let report = PerformanceReport::compute(
        &nav_series,
        &benchmark_series,
        config.backtest.risk_free_rate,
        run.total_dividends(),
        run.total_injections(),
        run.rebalance_count,
    );

    Ok(BacktestSummary {
        schema_version: SCHEMA_VERSION,
        run_id: config.run_id(),
        policy: policy_name,
        start_date,
        end_date,
        initial_cash: config.backtest.initial_cash,
        report,
        nav_series,
        benchmark_series,
        history: run.history,
        warnings: run.warnings,
        dataset_hash: dataset_hash.to_string(),
        has_synthetic,
    })
}
