//! Policy sweep — run several policies over one shared panel.
//!
//! The day loop itself is strictly sequential, so parallelism lives here:
//! one engine per policy config, fanned out on a Rayon pool over a shared
//! `&MarketPanel`. Results are collected into a leaderboard ordered by
//! information ratio.

use std::collections::HashMap;

use rayon::prelude::*;

use rebalab_core::market::MarketPanel;

use crate::config::{BacktestConfig, PolicyConfig};
use crate::runner::{run_single_backtest, BacktestSummary, RunError};

/// Policy sweep executor.
pub struct PolicySweep {
    parallel: bool,
}

impl Default for PolicySweep {
    fn default() -> Self {
        Self::new()
    }
}

impl PolicySweep {
    pub fn new() -> Self {
        Self { parallel: true }
    }

    /// Enables or disables parallel execution.
    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Run one backtest per policy, sharing the base `[backtest]` and
    /// `[data]` sections.
    pub fn sweep(
        &self,
        base: &BacktestConfig,
        policies: &[PolicyConfig],
        panel: &MarketPanel,
        dataset_hash: &str,
        has_synthetic: bool,
    ) -> Result<SweepResults, RunError> {
        let configs: Vec<BacktestConfig> = policies
            .iter()
            .map(|policy| {
                let mut config = base.clone();
                config.policy = policy.clone();
                config
            })
            .collect();

        let results: Vec<BacktestSummary> = if self.parallel {
            configs
                .par_iter()
                .map(|config| run_single_backtest(config, panel, dataset_hash, has_synthetic))
                .collect::<Result<Vec<_>, _>>()?
        } else {
            configs
                .iter()
                .map(|config| run_single_backtest(config, panel, dataset_hash, has_synthetic))
                .collect::<Result<Vec<_>, _>>()?
        };

        Ok(SweepResults::new(results))
    }
}

/// Results from a policy sweep.
#[derive(Debug)]
pub struct SweepResults {
    results: Vec<BacktestSummary>,
    by_run_id: HashMap<String, usize>,
}

impl SweepResults {
    fn new(results: Vec<BacktestSummary>) -> Self {
        let by_run_id = results
            .iter()
            .enumerate()
            .map(|(i, r)| (r.run_id.clone(), i))
            .collect();
        Self { results, by_run_id }
    }

    pub fn all(&self) -> &[BacktestSummary] {
        &self.results
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn get(&self, run_id: &str) -> Option<&BacktestSummary> {
        self.by_run_id.get(run_id).map(|&i| &self.results[i])
    }

    /// Leaderboard: descending information ratio.
    pub fn leaderboard(&self) -> Vec<&BacktestSummary> {
        let mut sorted: Vec<_> = self.results.iter().collect();
        sorted.sort_by(|a, b| {
            b.report
                .information_ratio
                .partial_cmp(&a.report.information_ratio)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        sorted
    }

    pub fn top_n(&self, n: usize) -> Vec<&BacktestSummary> {
        self.leaderboard().into_iter().take(n).collect()
    }

    pub fn best(&self) -> Option<&BacktestSummary> {
        self.leaderboard().into_iter().next()
    }
}
