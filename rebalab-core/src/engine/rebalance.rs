//! Applying a rebalancing transition to a portfolio state.
//!
//! Two steps, in order: restore target weights over the current holdings,
//! then execute satellite swaps. The swap's newcomer inherits the dropped
//! position's slot (its post-target value and weight), so rotation never
//! moves value between slots.

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::domain::{PortfolioState, Position, Transaction, TransactionKind};
use crate::policy::RotationPlan;

use super::{EngineError, QTY_EPS};

/// Set each scheduled instrument to `weight × total`, at the day's prices.
///
/// Held instruments get an `Adjustment` for the quantity delta; instruments
/// entering the schedule get an `Acquisition` appended at the end of the
/// holdings order. Deltas below [`QTY_EPS`] are suppressed.
pub fn apply_targets(
    state: &mut PortfolioState,
    targets: &[(String, f64)],
    total: f64,
    prices: &HashMap<String, f64>,
    date: NaiveDate,
    transactions: &mut Vec<Transaction>,
) -> Result<(), EngineError> {
    for (instrument, weight) in targets {
        let target_value = weight * total;

        if let Some(pos) = state.get_mut(instrument) {
            if pos.price <= 0.0 {
                return Err(EngineError::MissingPrice {
                    instrument: instrument.clone(),
                    date,
                });
            }
            let target_quantity = target_value / pos.price;
            let delta = target_quantity - pos.quantity;
            if delta.abs() > QTY_EPS {
                transactions.push(Transaction::new(
                    instrument,
                    TransactionKind::Adjustment,
                    delta,
                    pos.price,
                ));
                pos.quantity = target_quantity;
                pos.value = target_value;
                pos.weight = *weight;
            }
        } else {
            let price =
                prices
                    .get(instrument)
                    .copied()
                    .ok_or_else(|| EngineError::MissingPrice {
                        instrument: instrument.clone(),
                        date,
                    })?;
            let quantity = target_value / price;
            if quantity.abs() > QTY_EPS {
                transactions.push(Transaction::new(
                    instrument,
                    TransactionKind::Acquisition,
                    quantity,
                    price,
                ));
                state.push(Position {
                    instrument: instrument.clone(),
                    quantity,
                    price,
                    value: target_value,
                    weight: *weight,
                });
            }
        }
    }
    Ok(())
}

/// Execute satellite swaps: a full `Disposal` of the dropped position and an
/// `Acquisition` of the newcomer sized to the dropped slot's value.
pub fn apply_rotation(
    state: &mut PortfolioState,
    plan: &RotationPlan,
    prices: &HashMap<String, f64>,
    date: NaiveDate,
    transactions: &mut Vec<Transaction>,
) -> Result<(), EngineError> {
    for swap in &plan.swaps {
        if !state.contains(&swap.drop) {
            continue;
        }
        let price = prices
            .get(&swap.add)
            .copied()
            .ok_or_else(|| EngineError::MissingPrice {
                instrument: swap.add.clone(),
                date,
            })?;

        // contains() checked above, so the remove cannot miss.
        let Some(old) = state.remove(&swap.drop) else {
            continue;
        };
        transactions.push(Transaction::new(
            &swap.drop,
            TransactionKind::Disposal,
            -old.quantity,
            old.price,
        ));

        let quantity = old.value / price;
        transactions.push(Transaction::new(
            &swap.add,
            TransactionKind::Acquisition,
            quantity,
            price,
        ));
        state.push(Position {
            instrument: swap.add.clone(),
            quantity,
            price,
            value: old.value,
            weight: old.weight,
        });
    }
    Ok(())
}
