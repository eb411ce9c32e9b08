//! Rebalab Runner — backtest orchestration over `rebalab-core`.
//!
//! This crate builds on `rebalab-core` to provide:
//! - TOML-backed run configuration with four built-in policy presets
//! - CSV market-data loading with a deterministic synthetic fallback
//! - Benchmark-relative performance reporting
//! - Policy sweeps parallelized across independent runs
//! - Schema-versioned JSON/CSV artifact export

pub mod config;
pub mod data_loader;
pub mod export;
pub mod metrics;
pub mod runner;
pub mod sweep;

pub use config::{BacktestConfig, ConfigError, PolicyConfig, RunId, ScheduleLine};
pub use data_loader::{generate_synthetic_panel, load_panel, LoadError, LoadedPanel};
pub use export::{export_json, import_json, load_artifacts, save_artifacts};
pub use metrics::PerformanceReport;
pub use runner::{run_single_backtest, BacktestSummary, RunError, SCHEMA_VERSION};
pub use sweep::{PolicySweep, SweepResults};
