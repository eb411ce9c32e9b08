//! Performance ranking — trailing-return rankings and dividend-quality screens.
//!
//! A `PerformanceRanker` is a borrow-only view over a [`MarketPanel`]: it owns
//! nothing and never caches, so rankings are point-in-time by construction.
//! Policies configure it with their anchor exclusions and window lengths.

use chrono::{Datelike, NaiveDate};

use crate::market::{MarketError, MarketPanel};

/// Default trailing-performance window, in months.
pub const DEFAULT_PERFORMANCE_MONTHS: u32 = 6;
/// Default realized-volatility window, in months.
pub const DEFAULT_VOLATILITY_MONTHS: u32 = 12;

/// Errors from ranking and screening.
#[derive(Debug, thiserror::Error)]
pub enum RankError {
    #[error("insufficient candidates: needed {needed}, found {found}")]
    InsufficientCandidates { needed: usize, found: usize },

    #[error(transparent)]
    Market(#[from] MarketError),
}

pub struct PerformanceRanker<'a> {
    panel: &'a MarketPanel,
    excluded: Vec<String>,
    performance_months: u32,
    volatility_months: u32,
}

impl<'a> PerformanceRanker<'a> {
    pub fn new(panel: &'a MarketPanel) -> Self {
        Self {
            panel,
            excluded: Vec::new(),
            performance_months: DEFAULT_PERFORMANCE_MONTHS,
            volatility_months: DEFAULT_VOLATILITY_MONTHS,
        }
    }

    /// Instruments removed from every ranking (typically the policy anchors).
    pub fn with_excluded(mut self, excluded: Vec<String>) -> Self {
        self.excluded = excluded;
        self
    }

    pub fn with_performance_months(mut self, months: u32) -> Self {
        self.performance_months = months;
        self
    }

    pub fn with_volatility_months(mut self, months: u32) -> Self {
        self.volatility_months = months;
        self
    }

    /// The `n` instruments with the highest trailing total return, ties broken
    /// by instrument id ascending so rankings are deterministic.
    pub fn top_performers(&self, as_of: NaiveDate, n: usize) -> Result<Vec<String>, RankError> {
        let perf = self
            .panel
            .performance_window(as_of, self.performance_months, &self.excluded)?;

        if perf.len() < n {
            return Err(RankError::InsufficientCandidates {
                needed: n,
                found: perf.len(),
            });
        }

        let mut ranked: Vec<(String, f64)> = perf.into_iter().collect();
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        Ok(ranked.into_iter().take(n).map(|(id, _)| id).collect())
    }

    /// Instruments that paid a positive dividend in each of the two calendar
    /// years before `as_of.year()`, with the more recent year's yield strictly
    /// above the prior year's. Sorted by instrument id.
    pub fn consistent_dividend_payers(
        &self,
        as_of: NaiveDate,
        excluded: &[String],
    ) -> Vec<String> {
        let ledger = self.panel.dividends();
        let recent_year = as_of.year() - 1;
        let prior_year = as_of.year() - 2;

        let mut payers: Vec<String> = self
            .panel
            .instruments()
            .iter()
            .filter(|name| {
                !self.excluded.iter().any(|e| e == *name)
                    && !excluded.iter().any(|e| e == *name)
            })
            .filter(|name| {
                match (
                    ledger.payment_in_year(name, recent_year),
                    ledger.payment_in_year(name, prior_year),
                ) {
                    (Some(recent), Some(prior)) => recent.yield_pct > prior.yield_pct,
                    _ => false,
                }
            })
            .cloned()
            .collect();

        payers.sort();
        payers
    }

    /// The `n` consistent payers with the highest most-recent-year yield,
    /// re-sorted ascending by realized volatility.
    ///
    /// Yield is only the admission filter; the returned ordering is by
    /// volatility. Candidates whose volatility cannot be computed (no price
    /// history in the window) are dropped before admission.
    pub fn top_dividend_stocks(&self, as_of: NaiveDate, n: usize) -> Result<Vec<String>, RankError> {
        let ledger = self.panel.dividends();
        let recent_year = as_of.year() - 1;

        let mut candidates: Vec<(String, f64, f64)> = Vec::new(); // (id, yield, volatility)
        for name in self.consistent_dividend_payers(as_of, &[]) {
            let Some(recent) = ledger.payment_in_year(&name, recent_year) else {
                continue;
            };
            match self
                .panel
                .realized_volatility(&name, as_of, self.volatility_months)
            {
                Ok(vol) => candidates.push((name, recent.yield_pct, vol)),
                Err(MarketError::EmptyRange { .. }) => continue,
                Err(e) => return Err(e.into()),
            }
        }

        if candidates.len() < n {
            return Err(RankError::InsufficientCandidates {
                needed: n,
                found: candidates.len(),
            });
        }

        // Admission: top n yields, ties by id ascending.
        candidates.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        candidates.truncate(n);

        // Final ordering: ascending volatility, ties by id ascending.
        candidates.sort_by(|a, b| {
            a.2.partial_cmp(&b.2)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });

        Ok(candidates.into_iter().map(|(id, _, _)| id).collect())
    }
}
