//! RebaLab Core — market panel, rankings, weighting policies, portfolio engine.
//!
//! This crate contains the heart of the rebalancing backtester:
//! - Domain types (positions, transactions, daily history records)
//! - Immutable market panel with point-in-time price and dividend queries
//! - Performance ranking and dividend-consistency screens
//! - The `WeightingPolicy` trait and its four concrete policies
//! - The sequential day-loop engine with chained NAV accounting

pub mod domain;
pub mod engine;
pub mod market;
pub mod policy;
pub mod ranking;
