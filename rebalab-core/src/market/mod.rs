//! Market data access — immutable price panel and dividend ledger.
//!
//! Both structures are built once at load time and treated as shared-read
//! resources afterwards: any number of engines may query them concurrently.

pub mod dividends;
pub mod panel;

pub use dividends::{DividendLedger, DividendRecord};
pub use panel::MarketPanel;

use chrono::NaiveDate;

/// Errors from point-in-time and windowed market queries.
#[derive(Debug, thiserror::Error)]
pub enum MarketError {
    #[error("no market data for date {date}")]
    MissingData { date: NaiveDate },

    #[error("no observations between {start} and {end}")]
    EmptyRange { start: NaiveDate, end: NaiveDate },

    #[error("malformed panel: {0}")]
    Malformed(String),
}
