//! Market panel — the immutable time-indexed price table.
//!
//! One column per tradable instrument plus one designated benchmark column,
//! keyed by ascending unique trading dates. Missing cells are `None` (a
//! non-numeric source cell is missing, never zero). All queries are
//! point-in-time or windowed reads; nothing mutates after construction.

use std::collections::HashMap;

use chrono::{Months, NaiveDate};

use super::dividends::{DividendLedger, DividendRecord};
use super::MarketError;

/// Trading days a year, used to annualize daily volatility.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

#[derive(Debug, Clone)]
pub struct MarketPanel {
    dates: Vec<NaiveDate>,
    date_index: HashMap<NaiveDate, usize>,
    /// Instrument columns in source order, benchmark excluded.
    instruments: Vec<String>,
    columns: HashMap<String, Vec<Option<f64>>>,
    benchmark: String,
    benchmark_col: Vec<Option<f64>>,
    dividends: DividendLedger,
}

impl MarketPanel {
    /// Build a panel from parallel columns.
    ///
    /// `columns` must contain the benchmark column; it is split out of the
    /// instrument set. Dates must be strictly ascending and every column must
    /// match their length.
    pub fn new(
        dates: Vec<NaiveDate>,
        columns: Vec<(String, Vec<Option<f64>>)>,
        benchmark: &str,
        dividends: DividendLedger,
    ) -> Result<Self, MarketError> {
        if dates.is_empty() {
            return Err(MarketError::Malformed("panel has no trading dates".into()));
        }
        if !dates.windows(2).all(|w| w[0] < w[1]) {
            return Err(MarketError::Malformed(
                "trading dates must be strictly ascending".into(),
            ));
        }

        let mut instruments = Vec::new();
        let mut column_map = HashMap::new();
        let mut benchmark_col = None;

        for (name, col) in columns {
            if col.len() != dates.len() {
                return Err(MarketError::Malformed(format!(
                    "column '{name}' has {} rows, expected {}",
                    col.len(),
                    dates.len()
                )));
            }
            if name == benchmark {
                benchmark_col = Some(col);
            } else {
                instruments.push(name.clone());
                column_map.insert(name, col);
            }
        }

        let benchmark_col = benchmark_col.ok_or_else(|| {
            MarketError::Malformed(format!("benchmark column '{benchmark}' not found"))
        })?;

        let date_index = dates
            .iter()
            .enumerate()
            .map(|(i, d)| (*d, i))
            .collect::<HashMap<_, _>>();

        Ok(Self {
            dates,
            date_index,
            instruments,
            columns: column_map,
            benchmark: benchmark.to_string(),
            benchmark_col,
            dividends,
        })
    }

    pub fn instruments(&self) -> &[String] {
        &self.instruments
    }

    pub fn benchmark_name(&self) -> &str {
        &self.benchmark
    }

    pub fn trading_dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn dividends(&self) -> &DividendLedger {
        &self.dividends
    }

    /// The first trading date at or after `date`, if any.
    pub fn next_trading_date_on_or_after(&self, date: NaiveDate) -> Option<NaiveDate> {
        let idx = self.dates.partition_point(|d| *d < date);
        self.dates.get(idx).copied()
    }

    /// Trading dates strictly after `after` and at most `up_to`, ascending.
    pub fn dates_between(&self, after: NaiveDate, up_to: NaiveDate) -> Vec<NaiveDate> {
        let lo = self.dates.partition_point(|d| *d <= after);
        let hi = self.dates.partition_point(|d| *d <= up_to);
        self.dates[lo..hi].to_vec()
    }

    /// Price of one instrument on one date, if known and present.
    pub fn price(&self, instrument: &str, date: NaiveDate) -> Option<f64> {
        let idx = *self.date_index.get(&date)?;
        self.columns.get(instrument)?.get(idx).copied().flatten()
    }

    /// All instrument prices on a trading date (benchmark excluded).
    ///
    /// Instruments with a missing cell are omitted from the map; callers that
    /// require a price for a held instrument detect the omission themselves.
    pub fn prices_at(&self, date: NaiveDate) -> Result<HashMap<String, f64>, MarketError> {
        let idx = *self
            .date_index
            .get(&date)
            .ok_or(MarketError::MissingData { date })?;

        let mut prices = HashMap::with_capacity(self.instruments.len());
        for name in &self.instruments {
            if let Some(p) = self.columns[name][idx] {
                prices.insert(name.clone(), p);
            }
        }
        Ok(prices)
    }

    /// The full raw benchmark series (missing cells skipped).
    pub fn benchmark_series(&self) -> Vec<(NaiveDate, f64)> {
        self.dates
            .iter()
            .zip(&self.benchmark_col)
            .filter_map(|(d, v)| v.map(|v| (*d, v)))
            .collect()
    }

    /// The benchmark over `[start, end]`, rebased to 100 at the first
    /// observation in the slice.
    pub fn benchmark_rebased(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<(NaiveDate, f64)>, MarketError> {
        let slice: Vec<(NaiveDate, f64)> = self
            .dates
            .iter()
            .zip(&self.benchmark_col)
            .filter(|(d, _)| **d >= start && **d <= end)
            .filter_map(|(d, v)| v.map(|v| (*d, v)))
            .collect();

        let first = slice
            .first()
            .map(|(_, v)| *v)
            .ok_or(MarketError::EmptyRange { start, end })?;

        Ok(slice
            .into_iter()
            .map(|(d, v)| (d, 100.0 * v / first))
            .collect())
    }

    /// Trailing total return per instrument, in percent, over
    /// `[as_of - months_back, as_of]`.
    ///
    /// Uses the first and last observation of each instrument inside the
    /// window. Instruments named in `excluded` (and the benchmark) are removed
    /// from the result; instruments with no observation in the window are
    /// omitted. Fails with `EmptyRange` when the window contains no trading
    /// date at all.
    pub fn performance_window(
        &self,
        as_of: NaiveDate,
        months_back: u32,
        excluded: &[String],
    ) -> Result<HashMap<String, f64>, MarketError> {
        let start = window_start(as_of, months_back);
        let lo = self.dates.partition_point(|d| *d < start);
        let hi = self.dates.partition_point(|d| *d <= as_of);
        if lo >= hi {
            return Err(MarketError::EmptyRange { start, end: as_of });
        }

        let mut perf = HashMap::new();
        for name in &self.instruments {
            if excluded.iter().any(|e| e == name) {
                continue;
            }
            let col = &self.columns[name][lo..hi];
            let first = col.iter().flatten().next();
            let last = col.iter().flatten().next_back();
            if let (Some(&first), Some(&last)) = (first, last) {
                if first != 0.0 {
                    perf.insert(name.clone(), (last - first) / first * 100.0);
                }
            }
        }
        Ok(perf)
    }

    /// Exact-date dividend lookup; the zero record on a miss.
    pub fn dividend_for(&self, instrument: &str, date: NaiveDate) -> DividendRecord {
        self.dividends.lookup(instrument, date)
    }

    /// Annualized standard deviation of daily percentage changes over the
    /// trailing `months_back` window.
    pub fn realized_volatility(
        &self,
        instrument: &str,
        as_of: NaiveDate,
        months_back: u32,
    ) -> Result<f64, MarketError> {
        let start = window_start(as_of, months_back);
        let lo = self.dates.partition_point(|d| *d < start);
        let hi = self.dates.partition_point(|d| *d <= as_of);

        let observed: Vec<f64> = self
            .columns
            .get(instrument)
            .map(|col| col[lo..hi].iter().flatten().copied().collect())
            .unwrap_or_default();

        if observed.len() < 2 {
            return Err(MarketError::EmptyRange { start, end: as_of });
        }

        let returns: Vec<f64> = observed
            .windows(2)
            .filter(|w| w[0] != 0.0)
            .map(|w| (w[1] - w[0]) / w[0])
            .collect();

        Ok(sample_std_dev(&returns) * TRADING_DAYS_PER_YEAR.sqrt())
    }
}

fn window_start(as_of: NaiveDate, months_back: u32) -> NaiveDate {
    as_of
        .checked_sub_months(Months::new(months_back))
        .unwrap_or(NaiveDate::MIN)
}

/// Sample standard deviation (n-1 denominator), 0.0 for fewer than 2 values.
fn sample_std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}
