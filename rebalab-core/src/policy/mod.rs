//! Weighting policies — the swappable strategy objects behind the engine.
//!
//! A policy defines the target-weight schedule (fixed anchors plus ranked
//! satellites), the rebalance-trigger predicate, and the satellite-rotation
//! rule. The engine owns all portfolio mutation; policies only decide.
//!
//! # Architecture invariant
//! Policies never see the history ledger or cash injections — only the
//! current marked state through [`PolicyView`] and the read-only market
//! panel. If a policy needs more, the separation of decision and execution
//! is being violated.

pub mod anchor_top_n;
pub mod cash_buffered;
pub mod dividend_blend;
pub mod multi_group;

use chrono::NaiveDate;

use crate::domain::PortfolioState;
use crate::market::{MarketError, MarketPanel};
use crate::ranking::RankError;

pub use anchor_top_n::EqualAnchorTopN;
pub use cash_buffered::CashBufferedBlend;
pub use dividend_blend::TieredDividendBlend;
pub use multi_group::{FreeGroup, MultiGroupFixedAndFree};

/// Default absolute weight-deviation tolerance for rebalance triggers.
pub const DEFAULT_TOLERANCE: f64 = 0.02;

/// Ordered instrument -> target weight schedule.
///
/// Order matters: the engine acquires instruments in schedule order, which
/// fixes the FIFO order later used by satellite rotation.
pub type TargetWeights = Vec<(String, f64)>;

/// Errors from policy decisions.
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error(transparent)]
    Rank(#[from] RankError),

    #[error(transparent)]
    Market(#[from] MarketError),

    #[error("invalid policy configuration: {0}")]
    InvalidConfig(String),
}

/// Read-only view of the engine's state handed to policy decisions.
#[derive(Debug, Clone, Copy)]
pub struct PolicyView<'a> {
    pub state: &'a PortfolioState,
    pub cash: f64,
    /// Market value of holdings plus cash.
    pub total_value: f64,
}

impl PolicyView<'_> {
    pub fn cash_weight(&self) -> f64 {
        if self.total_value > 0.0 {
            self.cash / self.total_value
        } else {
            0.0
        }
    }
}

/// One satellite swap: `drop` leaves the portfolio, `add` inherits its slot
/// (pre-drop value and weight).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationSwap {
    pub drop: String,
    pub add: String,
}

/// FIFO list of satellite swaps for one rebalancing event.
#[derive(Debug, Clone, Default)]
pub struct RotationPlan {
    pub swaps: Vec<RotationSwap>,
}

impl RotationPlan {
    pub fn is_empty(&self) -> bool {
        self.swaps.is_empty()
    }
}

/// A weighting policy: target schedule, trigger predicate, rotation rule.
pub trait WeightingPolicy: Send + Sync {
    /// Human-readable name (e.g. "equal_anchor_top_n").
    fn name(&self) -> &str;

    /// Fraction of total value held back as cash after any allocation event.
    fn cash_target(&self) -> f64 {
        0.0
    }

    /// Absolute weight-deviation tolerance used by the trigger.
    fn tolerance(&self) -> f64 {
        DEFAULT_TOLERANCE
    }

    /// Target weights for initialization. Must sum to `1 - cash_target()`
    /// within the engine's weight-sum tolerance.
    fn initial_weights(
        &self,
        panel: &MarketPanel,
        date: NaiveDate,
    ) -> Result<TargetWeights, PolicyError>;

    /// Whether today's marked state warrants a rebalancing transition.
    fn needs_rebalance(&self, view: &PolicyView<'_>, date: NaiveDate) -> bool;

    /// Target weights for a rebalancing event over the current holdings.
    fn rebalance_targets(
        &self,
        view: &PolicyView<'_>,
        panel: &MarketPanel,
        date: NaiveDate,
    ) -> Result<TargetWeights, PolicyError>;

    /// Satellite swaps for a rebalancing event. Defaults to none; policies
    /// with a ranked sleeve override this.
    fn rotate_satellites(
        &self,
        _view: &PolicyView<'_>,
        _panel: &MarketPanel,
        _date: NaiveDate,
    ) -> Result<RotationPlan, PolicyError> {
        Ok(RotationPlan::default())
    }
}

/// Sum of scheduled weights — used by policies to validate their configs.
pub(crate) fn weights_sum(weights: &[(String, f64)]) -> f64 {
    weights.iter().map(|(_, w)| w).sum()
}
