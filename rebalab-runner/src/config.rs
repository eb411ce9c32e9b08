//! Serializable backtest configuration.
//!
//! A `BacktestConfig` captures everything needed to reproduce a run: date
//! range, starting cash, benchmark column, risk-free rate, and a policy
//! selection. Policies are a tagged enum so they round-trip through TOML,
//! and four built-in presets cover the standard BRVM setups.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use rebalab_core::engine::EngineConfig;
use rebalab_core::policy::{
    CashBufferedBlend, EqualAnchorTopN, FreeGroup, MultiGroupFixedAndFree, TieredDividendBlend,
    WeightingPolicy,
};

/// Unique identifier for a backtest run (content-addressable hash).
pub type RunId = String;

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Serializable configuration for a single backtest run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BacktestConfig {
    pub backtest: BacktestSection,

    #[serde(default)]
    pub data: DataSection,

    pub policy: PolicyConfig,
}

/// Date range, capital, and rate parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BacktestSection {
    /// Backtest start date (inclusive; resolved forward to a trading date).
    pub start_date: NaiveDate,

    /// Backtest end date (inclusive).
    pub end_date: NaiveDate,

    /// Starting cash, in currency units.
    pub initial_cash: f64,

    /// Starting value of the chained NAV index.
    #[serde(default = "default_initial_nav")]
    pub initial_nav: f64,

    /// Annual risk-free rate used by Sharpe/Sortino.
    #[serde(default = "default_risk_free_rate")]
    pub risk_free_rate: f64,
}

/// Data source parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DataSection {
    /// Name of the benchmark column in the price table.
    #[serde(default = "default_benchmark")]
    pub benchmark: String,
}

impl Default for DataSection {
    fn default() -> Self {
        Self {
            benchmark: default_benchmark(),
        }
    }
}

fn default_initial_nav() -> f64 {
    100.0
}

fn default_risk_free_rate() -> f64 {
    0.06
}

fn default_benchmark() -> String {
    "BRVM C".to_string()
}

/// One anchor (or fixed) line in a policy schedule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScheduleLine {
    pub instrument: String,
    pub weight: f64,
}

/// One free group in a multi-group schedule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FreeGroupConfig {
    pub members: Vec<ScheduleLine>,
    pub ceiling: f64,
}

/// Weighting policy selection (serializable tagged enum).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PolicyConfig {
    /// Capped anchors plus top-N trailing-return satellites with rotation.
    EqualAnchorTopN {
        anchors: Vec<ScheduleLine>,
        satellite_count: usize,
        lookback_months: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tolerance: Option<f64>,
    },

    /// Anchors plus a consistent-dividend satellite sleeve.
    TieredDividendBlend {
        anchors: Vec<ScheduleLine>,
        satellite_count: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cash_trigger_fraction: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tolerance: Option<f64>,
    },

    /// Dividend blend holding a permanent cash buffer.
    CashBufferedBlend {
        anchors: Vec<ScheduleLine>,
        satellite_count: usize,
        cash_target: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tolerance: Option<f64>,
    },

    /// Fixed schedule plus free groups riding under per-member ceilings.
    MultiGroupFixedAndFree {
        fixed: Vec<ScheduleLine>,
        free_groups: Vec<FreeGroupConfig>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tolerance: Option<f64>,
    },
}

impl PolicyConfig {
    /// Names accepted by [`PolicyConfig::preset`].
    pub const PRESET_NAMES: [&'static str; 4] = [
        "anchor_top_n",
        "dividend_blend",
        "cash_buffered",
        "multi_group",
    ];

    /// Built-in BRVM presets for the four policies.
    pub fn preset(name: &str) -> Option<PolicyConfig> {
        let anchor = |instrument: &str, weight: f64| ScheduleLine {
            instrument: instrument.to_string(),
            weight,
        };
        match name {
            "anchor_top_n" => Some(PolicyConfig::EqualAnchorTopN {
                anchors: vec![anchor("ORAC", 0.20), anchor("SNTS", 0.20)],
                satellite_count: 18,
                lookback_months: 6,
                tolerance: None,
            }),
            "dividend_blend" => Some(PolicyConfig::TieredDividendBlend {
                anchors: vec![
                    anchor("ORAC", 0.18),
                    anchor("SNTS", 0.18),
                    anchor("SGBC", 0.05),
                    anchor("ECOC", 0.05),
                ],
                satellite_count: 16,
                cash_trigger_fraction: None,
                tolerance: None,
            }),
            "cash_buffered" => Some(PolicyConfig::CashBufferedBlend {
                anchors: vec![anchor("ORAC", 0.20), anchor("SNTS", 0.20)],
                satellite_count: 11,
                cash_target: 0.05,
                tolerance: None,
            }),
            "multi_group" => Some(PolicyConfig::MultiGroupFixedAndFree {
                fixed: vec![anchor("ORAC", 0.20), anchor("SNTS", 0.20)],
                free_groups: vec![
                    FreeGroupConfig {
                        members: vec![anchor("SGBC", 0.10), anchor("ECOC", 0.10)],
                        ceiling: 0.15,
                    },
                    FreeGroupConfig {
                        members: vec![
                            anchor("SDCC", 0.10),
                            anchor("PALC", 0.10),
                            anchor("TTLC", 0.10),
                            anchor("NTLC", 0.10),
                        ],
                        ceiling: 0.15,
                    },
                ],
                tolerance: None,
            }),
            _ => None,
        }
    }

    /// Human-readable name matching `WeightingPolicy::name()`.
    pub fn name(&self) -> &'static str {
        match self {
            PolicyConfig::EqualAnchorTopN { .. } => "equal_anchor_top_n",
            PolicyConfig::TieredDividendBlend { .. } => "tiered_dividend_blend",
            PolicyConfig::CashBufferedBlend { .. } => "cash_buffered_blend",
            PolicyConfig::MultiGroupFixedAndFree { .. } => "multi_group_fixed_and_free",
        }
    }

    /// Validate the schedule before constructing the policy.
    ///
    /// Policy constructors assert on bad parameters; this turns the same
    /// conditions into recoverable errors for user-supplied TOML.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let check_anchors = |anchors: &[ScheduleLine], label: &str| -> Result<f64, ConfigError> {
            if anchors.is_empty() {
                return Err(ConfigError::Invalid(format!("{label} cannot be empty")));
            }
            let mut sum = 0.0;
            for line in anchors {
                if line.weight <= 0.0 {
                    return Err(ConfigError::Invalid(format!(
                        "{label} weight for '{}' must be > 0, got {}",
                        line.instrument, line.weight
                    )));
                }
                sum += line.weight;
            }
            Ok(sum)
        };
        let check_tolerance = |tolerance: Option<f64>| -> Result<(), ConfigError> {
            if let Some(t) = tolerance {
                if t <= 0.0 {
                    return Err(ConfigError::Invalid(format!(
                        "tolerance must be > 0, got {t}"
                    )));
                }
            }
            Ok(())
        };

        match self {
            PolicyConfig::EqualAnchorTopN {
                anchors,
                satellite_count,
                lookback_months,
                tolerance,
            } => {
                let sum = check_anchors(anchors, "anchors")?;
                if sum >= 1.0 {
                    return Err(ConfigError::Invalid(format!(
                        "anchor weights must sum below 1.0, got {sum}"
                    )));
                }
                if *satellite_count == 0 {
                    return Err(ConfigError::Invalid("satellite_count must be > 0".into()));
                }
                if *lookback_months == 0 {
                    return Err(ConfigError::Invalid("lookback_months must be > 0".into()));
                }
                check_tolerance(*tolerance)
            }
            PolicyConfig::TieredDividendBlend {
                anchors,
                satellite_count,
                cash_trigger_fraction,
                tolerance,
            } => {
                let sum = check_anchors(anchors, "anchors")?;
                if sum >= 1.0 {
                    return Err(ConfigError::Invalid(format!(
                        "anchor weights must sum below 1.0, got {sum}"
                    )));
                }
                if *satellite_count == 0 {
                    return Err(ConfigError::Invalid("satellite_count must be > 0".into()));
                }
                if let Some(f) = cash_trigger_fraction {
                    if *f <= 0.0 || *f >= 1.0 {
                        return Err(ConfigError::Invalid(format!(
                            "cash_trigger_fraction must be in (0, 1), got {f}"
                        )));
                    }
                }
                check_tolerance(*tolerance)
            }
            PolicyConfig::CashBufferedBlend {
                anchors,
                satellite_count,
                cash_target,
                tolerance,
            } => {
                let sum = check_anchors(anchors, "anchors")?;
                if *cash_target <= 0.0 || *cash_target >= 1.0 {
                    return Err(ConfigError::Invalid(format!(
                        "cash_target must be in (0, 1), got {cash_target}"
                    )));
                }
                if sum + cash_target >= 1.0 {
                    return Err(ConfigError::Invalid(format!(
                        "anchor weights plus cash_target must sum below 1.0, got {}",
                        sum + cash_target
                    )));
                }
                if *satellite_count == 0 {
                    return Err(ConfigError::Invalid("satellite_count must be > 0".into()));
                }
                check_tolerance(*tolerance)
            }
            PolicyConfig::MultiGroupFixedAndFree {
                fixed,
                free_groups,
                tolerance,
            } => {
                if fixed.is_empty() && free_groups.is_empty() {
                    return Err(ConfigError::Invalid("schedule cannot be empty".into()));
                }
                let mut total: f64 = fixed.iter().map(|l| l.weight).sum();
                for group in free_groups {
                    if group.members.is_empty() {
                        return Err(ConfigError::Invalid("free group cannot be empty".into()));
                    }
                    for member in &group.members {
                        if member.weight > group.ceiling {
                            return Err(ConfigError::Invalid(format!(
                                "free member '{}' starts above its ceiling ({} > {})",
                                member.instrument, member.weight, group.ceiling
                            )));
                        }
                        total += member.weight;
                    }
                }
                if (total - 1.0).abs() > 1e-9 {
                    return Err(ConfigError::Invalid(format!(
                        "schedule weights must sum to 1.0, got {total}"
                    )));
                }
                check_tolerance(*tolerance)
            }
        }
    }

    /// Construct the boxed policy. Validates first.
    pub fn build(&self) -> Result<Box<dyn WeightingPolicy>, ConfigError> {
        self.validate()?;
        let pairs = |lines: &[ScheduleLine]| -> Vec<(String, f64)> {
            lines
                .iter()
                .map(|l| (l.instrument.clone(), l.weight))
                .collect()
        };

        Ok(match self {
            PolicyConfig::EqualAnchorTopN {
                anchors,
                satellite_count,
                lookback_months,
                tolerance,
            } => {
                let mut policy =
                    EqualAnchorTopN::new(pairs(anchors), *satellite_count, *lookback_months);
                if let Some(t) = tolerance {
                    policy = policy.with_tolerance(*t);
                }
                Box::new(policy)
            }
            PolicyConfig::TieredDividendBlend {
                anchors,
                satellite_count,
                cash_trigger_fraction,
                tolerance,
            } => {
                let mut policy = TieredDividendBlend::new(pairs(anchors), *satellite_count);
                if let Some(f) = cash_trigger_fraction {
                    policy = policy.with_cash_trigger_fraction(*f);
                }
                if let Some(t) = tolerance {
                    policy = policy.with_tolerance(*t);
                }
                Box::new(policy)
            }
            PolicyConfig::CashBufferedBlend {
                anchors,
                satellite_count,
                cash_target,
                tolerance,
            } => {
                let mut policy =
                    CashBufferedBlend::new(pairs(anchors), *satellite_count, *cash_target);
                if let Some(t) = tolerance {
                    policy = policy.with_tolerance(*t);
                }
                Box::new(policy)
            }
            PolicyConfig::MultiGroupFixedAndFree {
                fixed,
                free_groups,
                tolerance,
            } => {
                let groups = free_groups
                    .iter()
                    .map(|g| FreeGroup {
                        members: pairs(&g.members),
                        ceiling: g.ceiling,
                    })
                    .collect();
                let mut policy = MultiGroupFixedAndFree::new(pairs(fixed), groups);
                if let Some(t) = tolerance {
                    policy = policy.with_tolerance(*t);
                }
                Box::new(policy)
            }
        })
    }
}

impl BacktestConfig {
    /// Parse a config from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: BacktestConfig = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and parse a config from a TOML file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backtest.initial_cash <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "initial_cash must be > 0, got {}",
                self.backtest.initial_cash
            )));
        }
        if self.backtest.initial_nav <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "initial_nav must be > 0, got {}",
                self.backtest.initial_nav
            )));
        }
        if self.backtest.start_date > self.backtest.end_date {
            return Err(ConfigError::Invalid(format!(
                "start_date {} is after end_date {}",
                self.backtest.start_date, self.backtest.end_date
            )));
        }
        if self.backtest.risk_free_rate < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "risk_free_rate must be >= 0, got {}",
                self.backtest.risk_free_rate
            )));
        }
        self.policy.validate()
    }

    /// Engine parameters derived from the `[backtest]` section.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig::new(
            self.backtest.start_date,
            self.backtest.end_date,
            self.backtest.initial_cash,
        )
        .with_initial_nav(self.backtest.initial_nav)
    }

    /// Computes a deterministic hash ID for this configuration.
    ///
    /// Two runs with identical configs get the same RunId, so artifacts
    /// are content-addressable across machines.
    pub fn run_id(&self) -> RunId {
        let json = serde_json::to_string(self).expect("BacktestConfig serialization failed");
        let hash = blake3::hash(json.as_bytes());
        format!("{}", hash.to_hex())
    }
}
