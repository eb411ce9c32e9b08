//! Tiered anchors plus a dividend-screened satellite sleeve.
//!
//! Anchors carry two weight tiers; satellites come from the
//! dividend-consistency screen ordered by realized volatility, each at an
//! equal share of the remainder. The sleeve is fixed once selected: no
//! rotation, only weight restoration. A rebalance fires when idle cash
//! builds up past a fraction of total value, or when any holding drifts
//! from its target by more than the tolerance.

use chrono::NaiveDate;

use crate::market::MarketPanel;
use crate::ranking::PerformanceRanker;

use super::{PolicyError, PolicyView, TargetWeights, WeightingPolicy, DEFAULT_TOLERANCE};

/// Two-tier anchors with an equal-weight dividend sleeve.
///
/// # Schedule
/// ```text
/// anchor_i  -> weight_i                        (fixed, two tiers)
/// satellite -> (1 - sum(weight_i)) / n         (equal split over n payers)
/// ```
#[derive(Debug, Clone)]
pub struct TieredDividendBlend {
    anchors: Vec<(String, f64)>,
    satellite_count: usize,

    /// Cash fraction of total value that forces redeployment.
    cash_trigger_fraction: f64,

    tolerance: f64,
}

impl TieredDividendBlend {
    pub fn new(anchors: Vec<(String, f64)>, satellite_count: usize) -> Self {
        assert!(!anchors.is_empty(), "at least one anchor is required");
        assert!(satellite_count > 0, "satellite_count must be > 0");

        let anchor_sum: f64 = anchors.iter().map(|(_, w)| w).sum();
        assert!(
            anchors.iter().all(|(_, w)| *w > 0.0) && anchor_sum < 1.0,
            "anchor weights must be positive and sum below 1.0"
        );

        Self {
            anchors,
            satellite_count,
            cash_trigger_fraction: 0.10,
            tolerance: DEFAULT_TOLERANCE,
        }
    }

    pub fn with_cash_trigger_fraction(mut self, fraction: f64) -> Self {
        assert!(fraction > 0.0 && fraction < 1.0, "fraction must be in (0, 1)");
        self.cash_trigger_fraction = fraction;
        self
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
        (1.0 - anchor_sum) / self.satellite_count as f64
    }

    /// Target for a held instrument: its anchor tier, or the sleeve share.
    fn target_for(&self, instrument: &str) -> f64 {
        self.anchor_weight(instrument)
            .unwrap_or_else(|| self.satellite_weight())
    }
}

impl WeightingPolicy for TieredDividendBlend {
    fn name(&self) -> &str {
        "tiered_dividend_blend"
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

    /// Fires on idle cash past the trigger fraction, or on any holding
    /// drifting from its target by more than the tolerance.
    fn needs_rebalance(&self, view: &PolicyView<'_>, _date: NaiveDate) -> bool {
        if view.cash >= self.cash_trigger_fraction * view.total_value && view.total_value > 0.0 {
            return true;
        }
        view.state
            .iter()
            .any(|p| (p.weight - self.target_for(&p.instrument)).abs() > self.tolerance)
    }

    /// Restores every holding to its scheduled weight; the sleeve membership
    /// is left as it stands.
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
