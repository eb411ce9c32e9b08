//! Fixed core weights plus ceiling-capped free groups.
//!
//! The fixed members hold scheduled weights and are policed by the drift
//! tolerance. Free-group members start at scheduled weights and are allowed
//! to run, bounded only by a per-group ceiling. A rebalance restores the
//! whole initial schedule.

use chrono::NaiveDate;

use crate::market::MarketPanel;

use super::{weights_sum, PolicyError, PolicyView, TargetWeights, WeightingPolicy, DEFAULT_TOLERANCE};

/// Members that may drift up to a shared weight ceiling.
#[derive(Debug, Clone)]
pub struct FreeGroup {
    pub members: Vec<(String, f64)>,
    /// No member of the group may exceed this weight.
    pub ceiling: f64,
}

/// Fixed schedule with free groups riding under ceilings.
#[derive(Debug, Clone)]
pub struct MultiGroupFixedAndFree {
    fixed: Vec<(String, f64)>,
    free_groups: Vec<FreeGroup>,
    tolerance: f64,
}

impl MultiGroupFixedAndFree {
    /// The combined schedule (fixed plus all group members) must sum to 1.
    pub fn new(fixed: Vec<(String, f64)>, free_groups: Vec<FreeGroup>) -> Self {
        assert!(
            !fixed.is_empty() || !free_groups.is_empty(),
            "schedule cannot be empty"
        );
        for group in &free_groups {
            assert!(!group.members.is_empty(), "free group cannot be empty");
            assert!(
                group.members.iter().all(|(_, w)| *w <= group.ceiling),
                "scheduled group weights must start under the ceiling"
            );
        }

        let total = weights_sum(&fixed)
            + free_groups
                .iter()
                .map(|g| weights_sum(&g.members))
                .sum::<f64>();
        assert!(
            (total - 1.0).abs() < 1e-9,
            "schedule weights must sum to 1.0, got {total}"
        );

        Self {
            fixed,
            free_groups,
            tolerance: DEFAULT_TOLERANCE,
        }
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        assert!(tolerance > 0.0, "tolerance must be > 0");
        self.tolerance = tolerance;
        self
    }

    fn fixed_weight(&self, instrument: &str) -> Option<f64> {
        self.fixed
            .iter()
            .find(|(name, _)| name == instrument)
            .map(|(_, w)| *w)
    }

    fn group_ceiling(&self, instrument: &str) -> Option<f64> {
        self.free_groups
            .iter()
            .find(|g| g.members.iter().any(|(name, _)| name == instrument))
            .map(|g| g.ceiling)
    }

    fn schedule(&self) -> TargetWeights {
        let mut weights = self.fixed.clone();
        for group in &self.free_groups {
            weights.extend(group.members.iter().cloned());
        }
        weights
    }
}

impl WeightingPolicy for MultiGroupFixedAndFree {
    fn name(&self) -> &str {
        "multi_group_fixed_and_free"
    }

    fn tolerance(&self) -> f64 {
        self.tolerance
    }

    fn initial_weights(
        &self,
        panel: &MarketPanel,
        _date: NaiveDate,
    ) -> Result<TargetWeights, PolicyError> {
        let schedule = self.schedule();
        for (name, _) in &schedule {
            if !panel.instruments().contains(name) {
                return Err(PolicyError::InvalidConfig(format!(
                    "scheduled instrument '{name}' is not in the market panel"
                )));
            }
        }
        Ok(schedule)
    }

    /// Fires when a fixed member drifts past the tolerance or a free member
    /// climbs strictly above its group ceiling.
    fn needs_rebalance(&self, view: &PolicyView<'_>, _date: NaiveDate) -> bool {
        view.state.iter().any(|p| {
            if let Some(target) = self.fixed_weight(&p.instrument) {
                (p.weight - target).abs() > self.tolerance
            } else if let Some(ceiling) = self.group_ceiling(&p.instrument) {
                p.weight > ceiling
            } else {
                false
            }
        })
    }

    fn rebalance_targets(
        &self,
        _view: &PolicyView<'_>,
        _panel: &MarketPanel,
        _date: NaiveDate,
    ) -> Result<TargetWeights, PolicyError> {
        Ok(self.schedule())
    }
}
