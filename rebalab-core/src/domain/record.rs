//! Daily history records — one append-only entry per simulated trading day.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::position::PortfolioState;
use super::transaction::Transaction;

/// One day of portfolio history.
///
/// Appended by the engine after the day is fully committed; past entries are
/// never mutated. `total_value = portfolio_value + cash`, and `nav` follows
/// the chain rule `nav[t] = nav[t-1] * total_value[t] / total_value[t-1]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyRecord {
    pub date: NaiveDate,
    pub state: PortfolioState,
    pub nav: f64,
    pub total_value: f64,
    /// Market value of holdings only (no cash).
    pub portfolio_value: f64,
    pub cash: f64,
    /// Dividend entitlements collected this day.
    pub dividends: f64,
    /// Cash contributed from outside to fund this day's rebalance, when the
    /// target schedule demanded more than was available (0 otherwise).
    pub cash_injection: f64,
    /// Empty on days with no initialization or rebalancing event.
    pub transactions: Vec<Transaction>,
}

impl DailyRecord {
    pub fn rebalanced(&self) -> bool {
        !self.transactions.is_empty()
    }
}
