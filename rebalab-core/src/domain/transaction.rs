//! Transactions — immutable records of portfolio mutations.

use serde::{Deserialize, Serialize};

/// What a transaction did to the holding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionKind {
    /// A new line entered the portfolio (initialization or rotation add).
    Acquisition,
    /// An existing line was traded back toward its target weight.
    Adjustment,
    /// A line left the portfolio entirely (rotation drop).
    Disposal,
}

/// An immutable trade record.
///
/// `quantity` is a signed delta (negative for sells) and
/// `value = quantity * price`, so disposals carry negative value. Emitted only
/// by initialization or a rebalancing event — a do-nothing day produces none.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub instrument: String,
    pub kind: TransactionKind,
    pub quantity: f64,
    pub price: f64,
    pub value: f64,
}

impl Transaction {
    pub fn new(instrument: &str, kind: TransactionKind, quantity: f64, price: f64) -> Self {
        Self {
            instrument: instrument.to_string(),
            kind,
            quantity,
            price,
            value: quantity * price,
        }
    }
}
