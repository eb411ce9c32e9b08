//! Performance metrics — pure functions over NAV and benchmark series.
//!
//! Every metric is a pure function: aligned return series in, scalar out.
//! No dependencies on the loader or the engine. Degenerate inputs (fewer
//! than two observations, zero variance) yield 0.0, never NaN.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use rebalab_core::market::panel::TRADING_DAYS_PER_YEAR;

/// Aggregate performance of one run against its benchmark.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceReport {
    pub portfolio_return_pct: f64,
    pub benchmark_return_pct: f64,
    /// Portfolio return minus benchmark return, in percentage points.
    pub surperformance_pct: f64,
    pub portfolio_volatility_pct: f64,
    pub benchmark_volatility_pct: f64,
    pub beta: f64,
    pub correlation: f64,
    pub tracking_error_pct: f64,
    pub sharpe: f64,
    pub sortino: f64,
    pub information_ratio: f64,
    pub total_dividends: f64,
    pub total_injections: f64,
    pub rebalance_count: usize,
}

impl PerformanceReport {
    /// Compute the full report from two dated index series.
    ///
    /// The series are aligned on their common dates first; days present in
    /// only one series do not contribute to any statistic.
    pub fn compute(
        nav: &[(NaiveDate, f64)],
        benchmark: &[(NaiveDate, f64)],
        risk_free_rate: f64,
        total_dividends: f64,
        total_injections: f64,
        rebalance_count: usize,
    ) -> Self {
        let (portfolio, bench) = align_series(nav, benchmark);
        let rp = daily_returns(&portfolio);
        let rb = daily_returns(&bench);

        let portfolio_return_pct = percent_return(&portfolio);
        let benchmark_return_pct = percent_return(&bench);
        let tracking_error_pct = tracking_error(&rp, &rb) * 100.0;

        Self {
            portfolio_return_pct,
            benchmark_return_pct,
            surperformance_pct: portfolio_return_pct - benchmark_return_pct,
            portfolio_volatility_pct: annualized_volatility(&rp) * 100.0,
            benchmark_volatility_pct: annualized_volatility(&rb) * 100.0,
            beta: beta(&rp, &rb),
            correlation: correlation(&rp, &rb),
            tracking_error_pct,
            sharpe: sharpe_ratio(&rp, risk_free_rate),
            sortino: sortino_ratio(&rp, risk_free_rate),
            information_ratio: information_ratio(
                portfolio_return_pct,
                benchmark_return_pct,
                tracking_error_pct,
            ),
            total_dividends,
            total_injections,
            rebalance_count,
        }
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Intersect two dated series on their common dates, preserving order.
///
/// Both inputs must be date-ascending (the engine and panel guarantee it).
pub fn align_series(
    a: &[(NaiveDate, f64)],
    b: &[(NaiveDate, f64)],
) -> (Vec<f64>, Vec<f64>) {
    let mut out_a = Vec::new();
    let mut out_b = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].0.cmp(&b[j].0) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                out_a.push(a[i].1);
                out_b.push(b[j].1);
                i += 1;
                j += 1;
            }
        }
    }
    (out_a, out_b)
}

/// Total return over a series, in percent: (last - first) / first × 100.
pub fn percent_return(series: &[f64]) -> f64 {
    if series.len() < 2 {
        return 0.0;
    }
    let first = series[0];
    let last = series[series.len() - 1];
    if first <= 0.0 {
        return 0.0;
    }
    (last - first) / first * 100.0
}

/// Daily simple returns of an index series.
pub fn daily_returns(series: &[f64]) -> Vec<f64> {
    if series.len() < 2 {
        return Vec::new();
    }
    series
        .windows(2)
        .map(|w| if w[0] > 0.0 { (w[1] - w[0]) / w[0] } else { 0.0 })
        .collect()
}

/// Annualized standard deviation of daily returns, as a fraction.
pub fn annualized_volatility(returns: &[f64]) -> f64 {
    std_dev(returns) * TRADING_DAYS_PER_YEAR.sqrt()
}

/// Pearson correlation of two return series. 0.0 when either is degenerate.
pub fn correlation(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    if n < 2 {
        return 0.0;
    }
    let (a, b) = (&a[..n], &b[..n]);
    let cov = covariance(a, b);
    let denom = std_dev(a) * std_dev(b);
    if denom < 1e-15 {
        return 0.0;
    }
    cov / denom
}

/// Beta of the portfolio against the benchmark: cov(rp, rb) / var(rb).
pub fn beta(portfolio: &[f64], benchmark: &[f64]) -> f64 {
    let n = portfolio.len().min(benchmark.len());
    if n < 2 {
        return 0.0;
    }
    let (p, b) = (&portfolio[..n], &benchmark[..n]);
    let var_b = std_dev(b).powi(2);
    if var_b < 1e-15 {
        return 0.0;
    }
    covariance(p, b) / var_b
}

/// Annualized standard deviation of the daily return spread, as a fraction.
pub fn tracking_error(portfolio: &[f64], benchmark: &[f64]) -> f64 {
    let n = portfolio.len().min(benchmark.len());
    if n < 2 {
        return 0.0;
    }
    let spread: Vec<f64> = portfolio[..n]
        .iter()
        .zip(&benchmark[..n])
        .map(|(p, b)| p - b)
        .collect();
    annualized_volatility(&spread)
}

/// Annualized Sharpe ratio from daily returns.
///
/// The annual risk-free rate is converted to a daily compound rate; the
/// mean daily excess return is compounded back to annual and divided by
/// the annualized volatility.
pub fn sharpe_ratio(returns: &[f64], risk_free_rate: f64) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let daily_rf = (1.0 + risk_free_rate).powf(1.0 / TRADING_DAYS_PER_YEAR) - 1.0;
    let excess: Vec<f64> = returns.iter().map(|r| r - daily_rf).collect();
    let vol = annualized_volatility(returns);
    if vol < 1e-15 {
        return 0.0;
    }
    let annual_excess = (1.0 + mean_f64(&excess)).powf(TRADING_DAYS_PER_YEAR) - 1.0;
    annual_excess / vol
}

/// Annualized Sortino ratio: downside deviation in the denominator.
pub fn sortino_ratio(returns: &[f64], risk_free_rate: f64) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let daily_rf = (1.0 + risk_free_rate).powf(1.0 / TRADING_DAYS_PER_YEAR) - 1.0;
    let excess: Vec<f64> = returns.iter().map(|r| r - daily_rf).collect();

    let downside_sq: Vec<f64> = excess.iter().filter(|&&r| r < 0.0).map(|r| r * r).collect();
    if downside_sq.is_empty() {
        return 0.0;
    }
    let downside_var = downside_sq.iter().sum::<f64>() / excess.len() as f64;
    let downside_vol = downside_var.sqrt() * TRADING_DAYS_PER_YEAR.sqrt();
    if downside_vol < 1e-15 {
        return 0.0;
    }
    let annual_excess = (1.0 + mean_f64(&excess)).powf(TRADING_DAYS_PER_YEAR) - 1.0;
    annual_excess / downside_vol
}

/// Surperformance per unit of tracking error. 0.0 when the series track
/// each other exactly.
pub fn information_ratio(
    portfolio_return_pct: f64,
    benchmark_return_pct: f64,
    tracking_error_pct: f64,
) -> f64 {
    if tracking_error_pct < 1e-15 {
        return 0.0;
    }
    (portfolio_return_pct - benchmark_return_pct) / tracking_error_pct
}

// ─── Helpers ────────────────────────────────────────────────────────

pub(crate) fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n-1 denominator), 0.0 for fewer than 2 values.
pub(crate) fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(values);
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

/// Sample covariance (n-1 denominator). Callers guarantee equal lengths.
fn covariance(a: &[f64], b: &[f64]) -> f64 {
    if a.len() < 2 {
        return 0.0;
    }
    let mean_a = mean_f64(a);
    let mean_b = mean_f64(b);
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - mean_a) * (y - mean_b))
        .sum::<f64>()
        / (a.len() - 1) as f64
}
