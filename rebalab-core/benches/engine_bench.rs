//! Criterion benchmarks for RebaLab hot paths.
//!
//! Benchmarks:
//! 1. Day loop (full backtest over growing panel sizes)
//! 2. Point-in-time panel queries (prices_at, performance_window)
//! 3. Ranking (top performers, dividend screen)

use chrono::{Days, NaiveDate};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use rebalab_core::engine::{EngineConfig, PortfolioEngine};
use rebalab_core::market::{DividendLedger, DividendRecord, MarketPanel};
use rebalab_core::policy::{EqualAnchorTopN, TieredDividendBlend};
use rebalab_core::ranking::PerformanceRanker;

// ── Helpers ──────────────────────────────────────────────────────────

fn base_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 1, 2).unwrap()
}

/// A panel of `num_instruments` deterministic wavy price paths plus a
/// benchmark, with two rising-yield dividend years per instrument.
fn make_panel(days: usize, num_instruments: usize) -> MarketPanel {
    let dates: Vec<NaiveDate> = (0..days as u64)
        .map(|i| base_date() + Days::new(i))
        .collect();

    let mut ledger = DividendLedger::new();
    let mut columns: Vec<(String, Vec<Option<f64>>)> = (0..num_instruments)
        .map(|k| {
            let name = format!("SYM{k:02}");
            let base = 100.0 + 10.0 * k as f64;
            let drift = 0.01 * (1 + k % 7) as f64;
            let col = (0..days)
                .map(|i| Some(base + drift * i as f64 + (i as f64 * 0.1).sin() * 2.0))
                .collect();

            // A rising-yield dividend every year so the consistency screen
            // passes for any as-of year in the panel.
            for (j, year) in (2018..=2026).enumerate() {
                ledger.insert(
                    &name,
                    NaiveDate::from_ymd_opt(year, 7, 1).unwrap(),
                    DividendRecord {
                        amount: 3.0 + j as f64,
                        yield_pct: 3.0 + j as f64 + 0.1 * k as f64,
                    },
                );
            }
            (name, col)
        })
        .collect();
    columns.push((
        "BRVM C".to_string(),
        (0..days)
            .map(|i| Some(150.0 + 0.02 * i as f64))
            .collect(),
    ));

    MarketPanel::new(dates, columns, "BRVM C", ledger).unwrap()
}

// ── 1. Day Loop ──────────────────────────────────────────────────────

fn bench_day_loop(c: &mut Criterion) {
    let mut group = c.benchmark_group("day_loop");

    for &days in &[252, 1260, 2520] {
        let panel = make_panel(days, 24);
        let end = base_date() + Days::new(days as u64);

        group.bench_with_input(
            BenchmarkId::new("equal_anchor_top_n", days),
            &days,
            |b, _| {
                b.iter(|| {
                    let policy = EqualAnchorTopN::new(
                        vec![("SYM00".into(), 0.2), ("SYM01".into(), 0.2)],
                        18,
                        6,
                    );
                    let config = EngineConfig::new(base_date(), end, 90_000_000.0);
                    let engine =
                        PortfolioEngine::new(black_box(&panel), Box::new(policy), config).unwrap();
                    black_box(engine.run().unwrap())
                });
            },
        );

        group.bench_with_input(
            BenchmarkId::new("tiered_dividend_blend", days),
            &days,
            |b, _| {
                b.iter(|| {
                    let policy = TieredDividendBlend::new(
                        vec![
                            ("SYM00".into(), 0.18),
                            ("SYM01".into(), 0.18),
                            ("SYM02".into(), 0.05),
                            ("SYM03".into(), 0.05),
                        ],
                        16,
                    );
                    let config = EngineConfig::new(base_date(), end, 90_000_000.0);
                    let engine =
                        PortfolioEngine::new(black_box(&panel), Box::new(policy), config).unwrap();
                    black_box(engine.run().unwrap())
                });
            },
        );
    }

    group.finish();
}

// ── 2. Panel Queries ─────────────────────────────────────────────────

fn bench_panel_queries(c: &mut Criterion) {
    let mut group = c.benchmark_group("panel_queries");

    let panel = make_panel(2520, 40);
    let mid = base_date() + Days::new(1260);

    group.bench_function("prices_at", |b| {
        b.iter(|| panel.prices_at(black_box(mid)).unwrap());
    });

    group.bench_function("performance_window_6m", |b| {
        b.iter(|| panel.performance_window(black_box(mid), 6, &[]).unwrap());
    });

    group.bench_function("realized_volatility_12m", |b| {
        b.iter(|| {
            panel
                .realized_volatility(black_box("SYM07"), mid, 12)
                .unwrap()
        });
    });

    group.finish();
}

// ── 3. Ranking ───────────────────────────────────────────────────────

fn bench_ranking(c: &mut Criterion) {
    let mut group = c.benchmark_group("ranking");

    let panel = make_panel(2520, 40);
    let mid = base_date() + Days::new(1260);

    group.bench_function("top_performers_18_of_40", |b| {
        let ranker = PerformanceRanker::new(&panel);
        b.iter(|| ranker.top_performers(black_box(mid), 18).unwrap());
    });

    group.bench_function("top_dividend_stocks_16_of_40", |b| {
        let ranker = PerformanceRanker::new(&panel);
        b.iter(|| ranker.top_dividend_stocks(black_box(mid), 16).unwrap());
    });

    group.finish();
}

criterion_group!(benches, bench_day_loop, bench_panel_queries, bench_ranking);
criterion_main!(benches);
