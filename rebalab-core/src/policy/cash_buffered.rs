//! Dividend blend with a standing cash buffer.
//!
//! Same tiered-anchor-plus-dividend-sleeve shape as the blend policy, but
//! only a fraction of total value is ever invested: the schedule sums to
//! `1 - cash_target`, leaving a permanent cash cushion. A rebalance fires
//! on holding drift or when the cash cushion itself swells past its target
//! by more than the tolerance.

use chrono::NaiveDate;

use crate::market::MarketPanel;
use crate::ranking::PerformanceRanker;

use super::{PolicyError, PolicyView, TargetWeights, WeightingPolicy, DEFAULT_TOLERANCE};

/// Tiered anchors and a dividend sleeve with a reserved cash weight.
///
/// # Schedule
/// ```text
/// anchor_i  -> weight_i
/// satellite -> (1 - sum(weight_i) - cash_target) / n
/// cash      -> cash_target                        (held, never bought)
/// ```
#[derive(Debug, Clone)]
pub struct CashBufferedBlend {
    anchors: Vec<(String, f64)>,
    satellite_count: usize,

    /// Fraction of total value kept in cash.
    cash_target: f64,

    tolerance: f64,
}

impl CashBufferedBlend {
    pub fn new(anchors: Vec<(String, f64)>, satellite_count: usize, cash_target: f64) -> Self {
        assert!(!anchors.is_empty(), "at least one anchor is required");
        assert!(satellite_count > 0, "satellite_count must be > 0");
        assert!(
            cash_target > 0.0 && cash_target < 1.0,
            "cash_target must be in (0, 1)"
        );

        let anchor_sum: f64 = anchors.iter().map(|(_, w)| w).sum();
        assert!(
            anchors.iter().all(|(_, w)| *w > 0.0) && anchor_sum + cash_target < 1.0,
            "anchor weights plus cash_target must leave room for satellites"
        );

        Self {
            anchors,
            satellite_count,
            cash_target,
            tolerance: DEFAULT_TOLERANCE,
        }
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        assert!(tolerance > 0.0, "tolerance must be > 0");
        self.tolerance = tolerance;
        self
    }

    fn anchor_weight(&self, instrument: &str) -> Option<f64> {
        self.anchors
            .iter()
            .find(|(name, _)| name == instrument)
            .map(|(_, w)| *w)
    }

    fn satellite_weight(&self) -> f64 {
        let anchor_sum: f64 = self.anchors.iter().map(|(_, w)| w).sum();
        (1.0 - anchor_sum - self.cash_target) / self.satellite_count as f64
    }

    fn target_for(&self, instrument: &str) -> f64 {
        self.anchor_weight(instrument)
            .unwrap_or_else(|| self.satellite_weight())
    }
}

impl WeightingPolicy for CashBufferedBlend {
    fn name(&self) -> &str {
        "cash_buffered_blend"
    }

    fn cash_target(&self) -> f64 {
        self.cash_target
    }

    fn tolerance(&self) -> f64 {
        self.tolerance
    }

    fn initial_weights(
        &self,
        panel: &MarketPanel,
        date: NaiveDate,
    ) -> Result<TargetWeights, PolicyError> {
        for (name, _) in &self.anchors {
            if !panel.instruments().contains(name) {
                return Err(PolicyError::InvalidConfig(format!(
                    "anchor '{name}' is not in the market panel"
                )));
            }
        }

        let anchor_names: Vec<String> =
            self.anchors.iter().map(|(name, _)| name.clone()).collect();
        let satellites = PerformanceRanker::new(panel)
            .with_excluded(anchor_names)
            .top_dividend_stocks(date, self.satellite_count)?;

        let satellite_weight = self.satellite_weight();
        let mut weights: TargetWeights = self.anchors.clone();
        for name in satellites {
            weights.push((name, satellite_weight));
        }
        Ok(weights)
    }

    /// Fires on holding drift past the tolerance, or when the cash cushion
    /// swells past its target by more than the tolerance.
    fn needs_rebalance(&self, view: &PolicyView<'_>, _date: NaiveDate) -> bool {
        if view.cash_weight() > self.cash_target + self.tolerance {
            return true;
        }
        view.state
            .iter()
            .any(|p| (p.weight - self.target_for(&p.instrument)).abs() > self.tolerance)
    }

    fn rebalance_targets(
        &self,
        view: &PolicyView<'_>,
        _panel: &MarketPanel,
        _date: NaiveDate,
    ) -> Result<TargetWeights, PolicyError> {
        let weights = view
            .state
            .iter()
            .map(|p| (p.instrument.clone(), self.target_for(&p.instrument)))
            .collect();
        Ok(weights)
    }
}
