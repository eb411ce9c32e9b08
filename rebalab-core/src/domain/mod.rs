//! Domain types — positions, portfolio state, transactions, daily records.

pub mod position;
pub mod record;
pub mod transaction;

pub use position::{PortfolioState, Position};
pub use record::DailyRecord;
pub use transaction::{Transaction, TransactionKind};
