//! Equal anchors plus a momentum-ranked satellite sleeve.
//!
//! A fixed set of anchor holdings is capped at a per-anchor weight; the
//! remainder of the portfolio is spread equally over the top trailing
//! performers. A rebalance fires when any anchor drifts above its cap, and
//! every rebalance also rotates stale satellites out for the current
//! ranking, the newcomer inheriting the dropped slot.

use chrono::NaiveDate;

use crate::market::MarketPanel;
use crate::ranking::PerformanceRanker;

use super::{
    PolicyError, PolicyView, RotationPlan, RotationSwap, TargetWeights, WeightingPolicy,
    DEFAULT_TOLERANCE,
};

/// Anchor-capped core with an equal-weight top-N satellite sleeve.
///
/// # Schedule
/// ```text
/// anchor_i  -> cap_i                          (fixed)
/// satellite -> (1 - sum(cap_i)) / n           (equal split over top n)
/// ```
#[derive(Debug, Clone)]
pub struct EqualAnchorTopN {
    /// Anchor instruments with their weight caps.
    anchors: Vec<(String, f64)>,

    /// How many ranked satellites to hold.
    satellite_count: usize,

    /// Trailing-return ranking window, in months.
    lookback_months: u32,

    tolerance: f64,
}

impl EqualAnchorTopN {
    pub fn new(anchors: Vec<(String, f64)>, satellite_count: usize, lookback_months: u32) -> Self {
        assert!(!anchors.is_empty(), "at least one anchor is required");
        assert!(satellite_count > 0, "satellite_count must be > 0");
        assert!(lookback_months > 0, "lookback_months must be > 0");

        let anchor_sum: f64 = anchors.iter().map(|(_, w)| w).sum();
        assert!(
            anchors.iter().all(|(_, w)| *w > 0.0) && anchor_sum < 1.0,
            "anchor caps must be positive and sum below 1.0"
        );

        Self {
            anchors,
            satellite_count,
            lookback_months,
            tolerance: DEFAULT_TOLERANCE,
        }
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        assert!(tolerance > 0.0, "tolerance must be > 0");
        self.tolerance = tolerance;
        self
    }

    fn anchor_cap(&self, instrument: &str) -> Option<f64> {
        self.anchors
            .iter()
            .find(|(name, _)| name == instrument)
            .map(|(_, cap)| *cap)
    }

    fn anchor_names(&self) -> Vec<String> {
        self.anchors.iter().map(|(name, _)| name.clone()).collect()
    }

    fn satellite_weight(&self) -> f64 {
        let anchor_sum: f64 = self.anchors.iter().map(|(_, w)| w).sum();
        (1.0 - anchor_sum) / self.satellite_count as f64
    }

    /// Current top satellites by trailing return, anchors excluded.
    fn ranked_satellites(
        &self,
        panel: &MarketPanel,
        date: NaiveDate,
    ) -> Result<Vec<String>, PolicyError> {
        let ranked = PerformanceRanker::new(panel)
            .with_excluded(self.anchor_names())
            .with_performance_months(self.lookback_months)
            .top_performers(date, self.satellite_count)?;
        Ok(ranked)
    }
}

impl WeightingPolicy for EqualAnchorTopN {
    fn name(&self) -> &str {
        "equal_anchor_top_n"
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

        let satellite_weight = self.satellite_weight();
        let mut weights: TargetWeights = self.anchors.clone();
        for name in self.ranked_satellites(panel, date)? {
            weights.push((name, satellite_weight));
        }
        Ok(weights)
    }

    /// Fires when any anchor has drifted strictly above its cap.
    fn needs_rebalance(&self, view: &PolicyView<'_>, _date: NaiveDate) -> bool {
        view.state.iter().any(|p| {
            self.anchor_cap(&p.instrument)
                .is_some_and(|cap| p.weight > cap)
        })
    }

    /// Restores anchors to their caps and equalizes the held satellites.
    fn rebalance_targets(
        &self,
        view: &PolicyView<'_>,
        _panel: &MarketPanel,
        _date: NaiveDate,
    ) -> Result<TargetWeights, PolicyError> {
        let satellite_weight = self.satellite_weight();
        let weights = view
            .state
            .iter()
            .map(|p| {
                let target = self
                    .anchor_cap(&p.instrument)
                    .unwrap_or(satellite_weight);
                (p.instrument.clone(), target)
            })
            .collect();
        Ok(weights)
    }

    /// Swaps held satellites that dropped out of the current ranking for the
    /// newcomers, pairing the oldest held slot with the best-ranked entrant.
    fn rotate_satellites(
        &self,
        view: &PolicyView<'_>,
        panel: &MarketPanel,
        date: NaiveDate,
    ) -> Result<RotationPlan, PolicyError> {
        let ranked = self.ranked_satellites(panel, date)?;

        let incoming: Vec<&String> = ranked
            .iter()
            .filter(|name| !view.state.contains(name))
            .collect();

        let outgoing: Vec<String> = view
            .state
            .iter()
            .filter(|p| self.anchor_cap(&p.instrument).is_none())
            .filter(|p| !ranked.contains(&p.instrument))
            .map(|p| p.instrument.clone())
            .collect();

        let swaps = outgoing
            .into_iter()
            .zip(incoming)
            .map(|(drop, add)| RotationSwap {
                drop,
                add: add.clone(),
            })
            .collect();

        Ok(RotationPlan { swaps })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PortfolioState, Position};
    use crate::market::{DividendLedger, MarketPanel};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// Sixty trading days: two anchors, three candidate satellites, benchmark.
    fn panel() -> MarketPanel {
        let dates: Vec<NaiveDate> = (0..60)
            .map(|i| date(2024, 1, 1) + chrono::Days::new(i))
            .collect();
        let flat = |base: f64| -> Vec<Option<f64>> { (0..60).map(|_| Some(base)).collect() };
        let trend = |base: f64, slope: f64| -> Vec<Option<f64>> {
            (0..60).map(|i| Some(base + slope * i as f64)).collect()
        };

        MarketPanel::new(
            dates,
            vec![
                ("ORAC".into(), flat(1000.0)),
                ("SNTS".into(), flat(2000.0)),
                ("FAST".into(), trend(100.0, 2.0)),
                ("SLOW".into(), trend(100.0, 0.5)),
                ("DULL".into(), flat(100.0)),
                ("BRVM C".into(), trend(50.0, 0.1)),
            ],
            "BRVM C",
            DividendLedger::new(),
        )
        .unwrap()
    }

    fn policy() -> EqualAnchorTopN {
        EqualAnchorTopN::new(vec![("ORAC".into(), 0.2), ("SNTS".into(), 0.2)], 2, 2)
    }

    fn position(instrument: &str, weight: f64) -> Position {
        Position {
            instrument: instrument.into(),
            quantity: 1.0,
            price: weight * 1000.0,
            value: weight * 1000.0,
            weight,
        }
    }

    #[test]
    fn initial_weights_are_anchors_then_top_performers() {
        let panel = panel();
        let weights = policy().initial_weights(&panel, date(2024, 2, 29)).unwrap();

        let names: Vec<&str> = weights.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["ORAC", "SNTS", "FAST", "SLOW"]);

        // Two anchors at 0.20 leave 0.60 split over two satellites.
        assert_eq!(weights[0].1, 0.2);
        assert!((weights[2].1 - 0.3).abs() < 1e-12);
        let sum: f64 = weights.iter().map(|(_, w)| w).sum();
        assert!((sum - 1.0).abs() < 1e-12);
    }

    #[test]
    fn unknown_anchor_is_invalid_config() {
        let panel = panel();
        let bad = EqualAnchorTopN::new(vec![("NOPE".into(), 0.2)], 2, 2);
        let err = bad.initial_weights(&panel, date(2024, 2, 29)).unwrap_err();
        assert!(matches!(err, PolicyError::InvalidConfig(_)));
    }

    #[test]
    fn trigger_fires_only_above_cap() {
        let policy = policy();
        let mut state = PortfolioState::new();
        state.push(position("ORAC", 0.20));
        state.push(position("FAST", 0.80));
        let view = PolicyView {
            state: &state,
            cash: 0.0,
            total_value: 1000.0,
        };
        // At the cap exactly: no trigger.
        assert!(!policy.needs_rebalance(&view, date(2024, 2, 1)));

        let mut state = PortfolioState::new();
        state.push(position("ORAC", 0.23));
        state.push(position("FAST", 0.77));
        let view = PolicyView {
            state: &state,
            cash: 0.0,
            total_value: 1000.0,
        };
        assert!(policy.needs_rebalance(&view, date(2024, 2, 1)));
    }

    #[test]
    fn rebalance_targets_cover_every_holding() {
        let policy = policy();
        let panel = panel();
        let mut state = PortfolioState::new();
        state.push(position("ORAC", 0.25));
        state.push(position("SNTS", 0.15));
        state.push(position("FAST", 0.35));
        state.push(position("DULL", 0.25));
        let view = PolicyView {
            state: &state,
            cash: 0.0,
            total_value: 1000.0,
        };

        let targets = policy
            .rebalance_targets(&view, &panel, date(2024, 2, 29))
            .unwrap();
        assert_eq!(targets.len(), 4);
        assert_eq!(targets[0], ("ORAC".to_string(), 0.2));
        assert!((targets[2].1 - 0.3).abs() < 1e-12); // FAST at satellite weight
    }

    #[test]
    fn rotation_pairs_oldest_slot_with_best_newcomer() {
        let policy = policy();
        let panel = panel();
        // DULL was bought first and is no longer ranked; FAST/SLOW are the
        // current top two, of which only SLOW is missing.
        let mut state = PortfolioState::new();
        state.push(position("ORAC", 0.2));
        state.push(position("SNTS", 0.2));
        state.push(position("DULL", 0.3));
        state.push(position("FAST", 0.3));
        let view = PolicyView {
            state: &state,
            cash: 0.0,
            total_value: 1000.0,
        };

        let plan = policy
            .rotate_satellites(&view, &panel, date(2024, 2, 29))
            .unwrap();
        assert_eq!(
            plan.swaps,
            vec![RotationSwap {
                drop: "DULL".into(),
                add: "SLOW".into(),
            }]
        );
    }

    #[test]
    fn rotation_is_empty_when_ranking_is_unchanged() {
        let policy = policy();
        let panel = panel();
        let mut state = PortfolioState::new();
        state.push(position("ORAC", 0.2));
        state.push(position("SNTS", 0.2));
        state.push(position("FAST", 0.3));
        state.push(position("SLOW", 0.3));
        let view = PolicyView {
            state: &state,
            cash: 0.0,
            total_value: 1000.0,
        };

        let plan = policy
            .rotate_satellites(&view, &panel, date(2024, 2, 29))
            .unwrap();
        assert!(plan.is_empty());
    }
}
