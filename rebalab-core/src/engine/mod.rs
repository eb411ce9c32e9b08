//! Portfolio engine — the day-by-day rebalancing loop.
//!
//! The engine consumes an immutable [`MarketPanel`](crate::market::MarketPanel)
//! and a boxed [`WeightingPolicy`](crate::policy::WeightingPolicy), then runs
//! the sequential day loop:
//!
//! 1. Mark every held position to the day's prices
//! 2. Collect dividend entitlements into cash
//! 3. Recompute total value and weights
//! 4. Ask the policy whether to rebalance; if so, apply targets and rotation
//! 5. Chain the NAV and append the day's history record
//!
//! Days are strictly sequential: NAV and rotation state are chained, so there
//! is no intra-run parallelism. Run whole engines in parallel instead.

pub mod day_loop;
pub mod rebalance;

use chrono::NaiveDate;

use crate::market::MarketError;
use crate::policy::PolicyError;

pub use day_loop::{EngineRun, PortfolioEngine};

/// Relative tolerance for the weight-sum invariant (cash weight included).
pub const WEIGHT_SUM_RTOL: f64 = 1e-5;

/// Quantity adjustments below this are suppressed, no transaction recorded.
pub const QTY_EPS: f64 = 1e-6;

/// Configuration for a single backtest run.
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Starting cash, in currency units.
    pub initial_cash: f64,
    /// Starting value of the chained NAV index (typically 100).
    pub initial_nav: f64,
}

impl EngineConfig {
    pub fn new(start_date: NaiveDate, end_date: NaiveDate, initial_cash: f64) -> Self {
        Self {
            start_date,
            end_date,
            initial_cash,
            initial_nav: 100.0,
        }
    }

    pub fn with_initial_nav(mut self, initial_nav: f64) -> Self {
        self.initial_nav = initial_nav;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), EngineError> {
        if self.initial_cash <= 0.0 {
            return Err(EngineError::InvalidConfig(format!(
                "initial_cash must be > 0, got {}",
                self.initial_cash
            )));
        }
        if self.initial_nav <= 0.0 {
            return Err(EngineError::InvalidConfig(format!(
                "initial_nav must be > 0, got {}",
                self.initial_nav
            )));
        }
        if self.start_date > self.end_date {
            return Err(EngineError::InvalidConfig(format!(
                "start_date {} is after end_date {}",
                self.start_date, self.end_date
            )));
        }
        Ok(())
    }
}

/// Errors that abort a backtest run.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("no trading date at or after {requested}")]
    NoValidDate { requested: NaiveDate },

    #[error("no price for '{instrument}' on {date}")]
    MissingPrice {
        instrument: String,
        date: NaiveDate,
    },

    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error(transparent)]
    Market(#[from] MarketError),

    #[error("invalid engine configuration: {0}")]
    InvalidConfig(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn config_rejects_nonpositive_cash() {
        let config = EngineConfig::new(date(2024, 1, 1), date(2024, 6, 1), 0.0);
        assert!(matches!(
            config.validate(),
            Err(EngineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn config_rejects_inverted_dates() {
        let config = EngineConfig::new(date(2024, 6, 1), date(2024, 1, 1), 1000.0);
        assert!(matches!(
            config.validate(),
            Err(EngineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn config_defaults_nav_to_100() {
        let config = EngineConfig::new(date(2024, 1, 1), date(2024, 6, 1), 1000.0);
        assert_eq!(config.initial_nav, 100.0);
        assert!(config.validate().is_ok());
    }
}
