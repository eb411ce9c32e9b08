//! Portfolio state — an insertion-ordered set of marked positions.

use serde::{Deserialize, Serialize};

/// A single holding, marked to the most recent processed date.
///
/// Accounting identity: `value == quantity * price`. The weight is relative
/// to the portfolio's total value (market value of holdings plus cash) as of
/// the same date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub instrument: String,
    pub quantity: f64,
    pub price: f64,
    pub value: f64,
    pub weight: f64,
}

/// The set of open positions for one backtest run.
///
/// Insertion order is preserved and is semantic: satellite rotation walks the
/// holdings in the order they were first acquired (FIFO of discovery) and
/// appends replacements at the end. A `HashMap` would lose that ordering, so
/// positions live in a `Vec` with linear lookup — portfolios here hold a few
/// dozen instruments at most.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortfolioState {
    positions: Vec<Position>,
}

impl PortfolioState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a position. Panics in debug builds if the instrument is already
    /// held — callers must use `get_mut` to adjust an existing holding.
    pub fn push(&mut self, position: Position) {
        debug_assert!(
            !self.contains(&position.instrument),
            "duplicate position for {}",
            position.instrument
        );
        self.positions.push(position);
    }

    pub fn contains(&self, instrument: &str) -> bool {
        self.positions.iter().any(|p| p.instrument == instrument)
    }

    pub fn get(&self, instrument: &str) -> Option<&Position> {
        self.positions.iter().find(|p| p.instrument == instrument)
    }

    pub fn get_mut(&mut self, instrument: &str) -> Option<&mut Position> {
        self.positions
            .iter_mut()
            .find(|p| p.instrument == instrument)
    }

    /// Remove and return a position, preserving the order of the rest.
    pub fn remove(&mut self, instrument: &str) -> Option<Position> {
        let idx = self
            .positions
            .iter()
            .position(|p| p.instrument == instrument)?;
        Some(self.positions.remove(idx))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Position> {
        self.positions.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Position> {
        self.positions.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Sum of position values (excludes cash).
    pub fn market_value(&self) -> f64 {
        self.positions.iter().map(|p| p.value).sum()
    }

    /// Sum of recorded weights.
    pub fn weights_sum(&self) -> f64 {
        self.positions.iter().map(|p| p.weight).sum()
    }

    /// Instruments in holding order.
    pub fn instruments(&self) -> Vec<String> {
        self.positions.iter().map(|p| p.instrument.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(instrument: &str, quantity: f64, price: f64) -> Position {
        Position {
            instrument: instrument.into(),
            quantity,
            price,
            value: quantity * price,
            weight: 0.0,
        }
    }

    #[test]
    fn insertion_order_is_preserved() {
        let mut state = PortfolioState::new();
        state.push(pos("ORAC", 10.0, 100.0));
        state.push(pos("SNTS", 5.0, 200.0));
        state.push(pos("BOAB", 2.0, 50.0));

        let order: Vec<_> = state.iter().map(|p| p.instrument.as_str()).collect();
        assert_eq!(order, ["ORAC", "SNTS", "BOAB"]);
    }

    #[test]
    fn remove_keeps_relative_order() {
        let mut state = PortfolioState::new();
        state.push(pos("A", 1.0, 1.0));
        state.push(pos("B", 1.0, 1.0));
        state.push(pos("C", 1.0, 1.0));

        let removed = state.remove("B").unwrap();
        assert_eq!(removed.instrument, "B");
        let order: Vec<_> = state.iter().map(|p| p.instrument.as_str()).collect();
        assert_eq!(order, ["A", "C"]);
    }

    #[test]
    fn market_value_sums_position_values() {
        let mut state = PortfolioState::new();
        state.push(pos("A", 10.0, 100.0)); // 1000
        state.push(pos("B", 5.0, 200.0)); // 1000
        assert_eq!(state.market_value(), 2000.0);
    }

    #[test]
    fn get_mut_updates_in_place() {
        let mut state = PortfolioState::new();
        state.push(pos("A", 10.0, 100.0));
        {
            let p = state.get_mut("A").unwrap();
            p.price = 110.0;
            p.value = p.quantity * p.price;
        }
        assert_eq!(state.get("A").unwrap().value, 1100.0);
    }
}
