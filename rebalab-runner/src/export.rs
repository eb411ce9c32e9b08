//! Artifact export — JSON manifest and CSV extracts.
//!
//! Every run saves a bundle directory containing:
//! - `manifest.json` — the full `BacktestSummary`, schema-versioned
//! - `holdings.csv` — flattened per-day positions
//! - `transactions.csv` — every trade the engine recorded
//! - `nav.csv` — the chained NAV next to the rebased benchmark
//! - `metrics.csv` — the performance report as metric/value rows
//!
//! Unknown schema versions are rejected on load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::runner::{BacktestSummary, SCHEMA_VERSION};

// ─── JSON manifest ──────────────────────────────────────────────────

/// Serialize a `BacktestSummary` to pretty JSON.
pub fn export_json(summary: &BacktestSummary) -> Result<String> {
    serde_json::to_string_pretty(summary).context("failed to serialize BacktestSummary to JSON")
}

/// Deserialize a `BacktestSummary` from JSON, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<BacktestSummary> {
    let summary: BacktestSummary =
        serde_json::from_str(json).context("failed to deserialize BacktestSummary from JSON")?;
    if summary.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            summary.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(summary)
}

// ─── CSV extracts ───────────────────────────────────────────────────

/// Flatten the daily position snapshots into one row per held line.
///
/// Columns: date, instrument, quantity, price, value, weight
pub fn export_holdings_csv(summary: &BacktestSummary) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["date", "instrument", "quantity", "price", "value", "weight"])?;

    for record in &summary.history {
        for position in record.state.iter() {
            wtr.write_record([
                &record.date.to_string(),
                &position.instrument,
                &format!("{:.6}", position.quantity),
                &format!("{:.2}", position.price),
                &format!("{:.2}", position.value),
                &format!("{:.6}", position.weight),
            ])?;
        }
    }

    finish_csv(wtr)
}

/// One row per transaction, tagged with the day it happened.
///
/// Columns: date, instrument, kind, quantity, price, value
pub fn export_transactions_csv(summary: &BacktestSummary) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["date", "instrument", "kind", "quantity", "price", "value"])?;

    for record in &summary.history {
        for tx in &record.transactions {
            wtr.write_record([
                &record.date.to_string(),
                &tx.instrument,
                &format!("{:?}", tx.kind),
                &format!("{:.6}", tx.quantity),
                &format!("{:.2}", tx.price),
                &format!("{:.2}", tx.value),
            ])?;
        }
    }

    finish_csv(wtr)
}

/// NAV and rebased benchmark, aligned by date where both exist.
///
/// Columns: date, nav, benchmark (blank where the benchmark has no
/// observation)
pub fn export_nav_csv(summary: &BacktestSummary) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["date", "nav", "benchmark"])?;

    let bench: std::collections::HashMap<_, _> =
        summary.benchmark_series.iter().copied().collect();
    for (date, nav) in &summary.nav_series {
        let bench_cell = bench
            .get(date)
            .map(|v| format!("{v:.6}"))
            .unwrap_or_default();
        wtr.write_record([&date.to_string(), &format!("{nav:.6}"), &bench_cell])?;
    }

    finish_csv(wtr)
}

/// The performance report as metric/value rows.
pub fn export_metrics_csv(summary: &BacktestSummary) -> Result<String> {
    let r = &summary.report;
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["metric", "value"])?;

    let rows: [(&str, String); 14] = [
        ("portfolio_return_pct", format!("{:.4}", r.portfolio_return_pct)),
        ("benchmark_return_pct", format!("{:.4}", r.benchmark_return_pct)),
        ("surperformance_pct", format!("{:.4}", r.surperformance_pct)),
        (
            "portfolio_volatility_pct",
            format!("{:.4}", r.portfolio_volatility_pct),
        ),
        (
            "benchmark_volatility_pct",
            format!("{:.4}", r.benchmark_volatility_pct),
        ),
        ("beta", format!("{:.4}", r.beta)),
        ("correlation", format!("{:.4}", r.correlation)),
        ("tracking_error_pct", format!("{:.4}", r.tracking_error_pct)),
        ("sharpe", format!("{:.4}", r.sharpe)),
        ("sortino", format!("{:.4}", r.sortino)),
        ("information_ratio", format!("{:.4}", r.information_ratio)),
        ("total_dividends", format!("{:.2}", r.total_dividends)),
        ("total_injections", format!("{:.2}", r.total_injections)),
        ("rebalance_count", r.rebalance_count.to_string()),
    ];
    for (metric, value) in &rows {
        wtr.write_record([*metric, value.as_str()])?;
    }

    finish_csv(wtr)
}

fn finish_csv(wtr: csv::Writer<Vec<u8>>) -> Result<String> {
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Save the full artifact set for a single run.
///
/// Creates a directory named `{policy}_{timestamp}/` under `output_dir`.
/// Returns the path to the created directory.
pub fn save_artifacts(summary: &BacktestSummary, output_dir: &Path) -> Result<PathBuf> {
    let dirname = format!(
        "{}_{}",
        summary.policy,
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    );
    let run_dir = output_dir.join(dirname);
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    std::fs::write(run_dir.join("manifest.json"), export_json(summary)?)?;
    std::fs::write(run_dir.join("holdings.csv"), export_holdings_csv(summary)?)?;
    std::fs::write(
        run_dir.join("transactions.csv"),
        export_transactions_csv(summary)?,
    )?;
    std::fs::write(run_dir.join("nav.csv"), export_nav_csv(summary)?)?;
    std::fs::write(run_dir.join("metrics.csv"), export_metrics_csv(summary)?)?;

    Ok(run_dir)
}

/// Load a `BacktestSummary` from an artifact directory's manifest.json.
///
/// Rejects unknown schema versions.
pub fn load_artifacts(dir: &Path) -> Result<BacktestSummary> {
    let manifest_path = dir.join("manifest.json");
    let json = std::fs::read_to_string(&manifest_path)
        .with_context(|| format!("failed to read {}", manifest_path.display()))?;
    import_json(&json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::PerformanceReport;
    use chrono::NaiveDate;
    use rebalab_core::domain::{
        DailyRecord, PortfolioState, Position, Transaction, TransactionKind,
    };

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sample_summary() -> BacktestSummary {
        let d0 = date(2024, 1, 2);
        let mut state = PortfolioState::new();
        state.push(Position {
            instrument: "ORAC".into(),
            quantity: 100.0,
            price: 9_500.0,
            value: 950_000.0,
            weight: 0.5,
        });
        state.push(Position {
            instrument: "SNTS".into(),
            quantity: 73.0,
            price: 13_000.0,
            value: 949_000.0,
            weight: 0.4995,
        });

        let record = DailyRecord {
            date: d0,
            state,
            nav: 100.0,
            total_value: 1_900_000.0,
            portfolio_value: 1_899_000.0,
            cash: 1_000.0,
            dividends: 0.0,
            cash_injection: 0.0,
            transactions: vec![Transaction::new(
                "ORAC",
                TransactionKind::Acquisition,
                100.0,
                9_500.0,
            )],
        };

        let nav_series = vec![(d0, 100.0)];
        let benchmark_series = vec![(d0, 100.0)];
        BacktestSummary {
            schema_version: SCHEMA_VERSION,
            run_id: "abc123".into(),
            policy: "equal_anchor_top_n".into(),
            start_date: d0,
            end_date: d0,
            initial_cash: 1_900_000.0,
            report: PerformanceReport::compute(&nav_series, &benchmark_series, 0.06, 0.0, 0.0, 0),
            nav_series,
            benchmark_series,
            history: vec![record],
            warnings: vec![],
            dataset_hash: "testhash".into(),
            has_synthetic: false,
        }
    }

    #[test]
    fn json_round_trip() {
        let summary = sample_summary();
        let json = export_json(&summary).unwrap();
        let back = import_json(&json).unwrap();
        assert_eq!(back.run_id, summary.run_id);
        assert_eq!(back.history.len(), 1);
    }

    #[test]
    fn import_rejects_future_schema_version() {
        let summary = sample_summary();
        let json = export_json(&summary)
            .unwrap()
            .replace(
                &format!("\"schema_version\": {SCHEMA_VERSION}"),
                &format!("\"schema_version\": {}", SCHEMA_VERSION + 1),
            );
        let err = import_json(&json).unwrap_err();
        assert!(err.to_string().contains("unsupported schema version"));
    }

    #[test]
    fn holdings_csv_has_one_row_per_position() {
        let csv = export_holdings_csv(&sample_summary()).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next().unwrap(),
            "date,instrument,quantity,price,value,weight"
        );
        assert_eq!(lines.count(), 2);
        assert!(csv.contains("ORAC"));
        assert!(csv.contains("SNTS"));
    }

    #[test]
    fn transactions_csv_tags_rows_with_the_day() {
        let csv = export_transactions_csv(&sample_summary()).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next().unwrap(),
            "date,instrument,kind,quantity,price,value"
        );
        let row = lines.next().unwrap();
        assert!(row.starts_with("2024-01-02,ORAC,Acquisition"));
    }

    #[test]
    fn nav_csv_pairs_nav_with_benchmark() {
        let csv = export_nav_csv(&sample_summary()).unwrap();
        assert!(csv.starts_with("date,nav,benchmark\n"));
        assert!(csv.contains("2024-01-02,100.000000,100.000000"));
    }

    #[test]
    fn metrics_csv_lists_every_report_field() {
        let csv = export_metrics_csv(&sample_summary()).unwrap();
        assert!(csv.starts_with("metric,value\n"));
        for metric in [
            "portfolio_return_pct",
            "beta",
            "sharpe",
            "information_ratio",
            "rebalance_count",
        ] {
            assert!(csv.contains(metric), "missing {metric}");
        }
    }

    #[test]
    fn artifact_bundle_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let summary = sample_summary();

        let run_dir = save_artifacts(&summary, dir.path()).unwrap();
        for name in [
            "manifest.json",
            "holdings.csv",
            "transactions.csv",
            "nav.csv",
            "metrics.csv",
        ] {
            assert!(run_dir.join(name).exists(), "missing {name}");
        }

        let loaded = load_artifacts(&run_dir).unwrap();
        assert_eq!(loaded.run_id, summary.run_id);
    }
}
