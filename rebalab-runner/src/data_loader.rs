//! Market data loading for the runner.
//!
//! Builds a `MarketPanel` from two CSV sources:
//! 1. A price table: one `Date` column plus one column per instrument,
//!    one of which is the designated benchmark. Non-numeric cells become
//!    missing, never zero.
//! 2. A dividend sheet: rows `{instrument, date, amount, yield}`. Rows
//!    with unparseable fields are rejected and counted, never defaulted.
//!
//! A deterministic synthetic panel is available for demos and tests.
//! Results produced on synthetic data are tagged in the run output.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{Datelike, NaiveDate};
use thiserror::Error;

use rebalab_core::market::{DividendLedger, DividendRecord, MarketError, MarketPanel};

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read data file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("market data error: {0}")]
    Market(#[from] MarketError),

    #[error("malformed data: {0}")]
    Malformed(String),
}

/// A loaded panel plus its provenance.
#[derive(Debug)]
pub struct LoadedPanel {
    pub panel: MarketPanel,
    /// BLAKE3 hash over the full price table, in sorted column order.
    pub dataset_hash: String,
    /// True when the panel was generated rather than loaded.
    pub has_synthetic: bool,
    /// Data-quality notes (rejected dividend rows, blank price cells).
    pub warnings: Vec<String>,
}

/// Load a market panel from a price CSV and an optional dividend CSV.
pub fn load_panel(
    prices_path: &Path,
    dividends_path: Option<&Path>,
    benchmark: &str,
) -> Result<LoadedPanel, LoadError> {
    let (dates, columns, blank_cells) = read_price_csv(prices_path)?;

    let mut warnings = Vec::new();
    if blank_cells > 0 {
        warnings.push(format!(
            "{blank_cells} non-numeric price cells treated as missing"
        ));
    }

    let dividends = match dividends_path {
        Some(path) => {
            let ledger = read_dividend_csv(path)?;
            if ledger.rejected_rows() > 0 {
                warnings.push(format!(
                    "{} dividend rows rejected (unparseable fields)",
                    ledger.rejected_rows()
                ));
            }
            ledger
        }
        None => DividendLedger::new(),
    };

    let dataset_hash = compute_dataset_hash(&dates, &columns);
    let panel = MarketPanel::new(dates, columns, benchmark, dividends)?;

    Ok(LoadedPanel {
        panel,
        dataset_hash,
        has_synthetic: false,
        warnings,
    })
}

/// Accepts ISO (`2023-05-12`) and day-first (`12/05/2023`) dates.
fn parse_date(cell: &str) -> Option<NaiveDate> {
    let cell = cell.trim();
    NaiveDate::parse_from_str(cell, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(cell, "%d/%m/%Y"))
        .ok()
}

type PriceColumns = Vec<(String, Vec<Option<f64>>)>;

/// Parse the price table. Returns ascending dates, per-column cells, and
/// the count of non-numeric cells turned into misses.
fn read_price_csv(path: &Path) -> Result<(Vec<NaiveDate>, PriceColumns, usize), LoadError> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();
    if headers.is_empty() {
        return Err(LoadError::Malformed("price CSV has no header row".into()));
    }
    let instruments: Vec<String> = headers.iter().skip(1).map(|h| h.trim().to_string()).collect();
    if instruments.is_empty() {
        return Err(LoadError::Malformed(
            "price CSV has no instrument columns".into(),
        ));
    }

    let mut rows: Vec<(NaiveDate, Vec<Option<f64>>)> = Vec::new();
    let mut blank_cells = 0;
    for (line, record) in reader.records().enumerate() {
        let record = record?;
        let date_cell = record.get(0).unwrap_or("");
        let date = parse_date(date_cell).ok_or_else(|| {
            LoadError::Malformed(format!(
                "row {}: unparseable date '{date_cell}'",
                line + 2
            ))
        })?;

        let mut cells = Vec::with_capacity(instruments.len());
        for i in 0..instruments.len() {
            let cell = record.get(i + 1).unwrap_or("").trim();
            match cell.parse::<f64>() {
                Ok(v) => cells.push(Some(v)),
                Err(_) => {
                    if !cell.is_empty() {
                        blank_cells += 1;
                    }
                    cells.push(None);
                }
            }
        }
        rows.push((date, cells));
    }

    rows.sort_by_key(|(d, _)| *d);

    let dates: Vec<NaiveDate> = rows.iter().map(|(d, _)| *d).collect();
    let mut columns: PriceColumns = instruments
        .into_iter()
        .map(|name| (name, Vec::with_capacity(dates.len())))
        .collect();
    for (_, cells) in &rows {
        for (i, cell) in cells.iter().enumerate() {
            columns[i].1.push(*cell);
        }
    }

    Ok((dates, columns, blank_cells))
}

/// Parse the dividend sheet: `instrument, date, amount, yield` per row.
///
/// Rows whose date, amount, or yield fail to parse are dropped and counted
/// on the ledger's rejected-row counter.
fn read_dividend_csv(path: &Path) -> Result<DividendLedger, LoadError> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut ledger = DividendLedger::new();

    for record in reader.records() {
        let record = record?;
        let instrument = record.get(0).unwrap_or("").trim();
        let date = record.get(1).and_then(parse_date);
        let amount = record.get(2).and_then(|c| c.trim().parse::<f64>().ok());
        let yield_pct = record.get(3).and_then(|c| c.trim().parse::<f64>().ok());

        match (date, amount, yield_pct) {
            (Some(date), Some(amount), Some(yield_pct)) if !instrument.is_empty() => {
                ledger.insert(instrument, date, DividendRecord { amount, yield_pct });
            }
            _ => ledger.note_rejected_row(),
        }
    }

    Ok(ledger)
}

/// Deterministic BLAKE3 hash over dates and cells in sorted column order.
fn compute_dataset_hash(dates: &[NaiveDate], columns: &PriceColumns) -> String {
    let mut hasher = blake3::Hasher::new();

    for date in dates {
        hasher.update(date.to_string().as_bytes());
    }

    let sorted: BTreeMap<&String, &Vec<Option<f64>>> =
        columns.iter().map(|(name, col)| (name, col)).collect();
    for (name, col) in sorted {
        hasher.update(name.as_bytes());
        for cell in col.iter() {
            match cell {
                Some(v) => hasher.update(&v.to_le_bytes()),
                None => hasher.update(&[0xFF]),
            };
        }
    }

    hasher.finalize().to_hex().to_string()
}

/// Generate a deterministic synthetic panel for demos and tests.
///
/// Each column is a weekday-only random walk seeded from the instrument
/// name, so the same name always produces the same path. Every instrument
/// also gets a rising-yield dividend in each of the two calendar years
/// before `start`, which keeps the dividend screens populated.
pub fn generate_synthetic_panel(
    instruments: &[&str],
    benchmark: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<LoadedPanel, LoadError> {
    eprintln!(
        "WARNING: generating a synthetic market panel — results will be tagged as synthetic"
    );

    let dates = weekday_dates(start, end);
    if dates.is_empty() {
        return Err(LoadError::Malformed(format!(
            "no weekdays between {start} and {end}"
        )));
    }

    let mut columns: PriceColumns = Vec::with_capacity(instruments.len() + 1);
    let mut dividends = DividendLedger::new();

    for symbol in instruments {
        columns.push((symbol.to_string(), synthetic_walk(symbol, dates.len())));

        // Two prior years of rising yields, ex-date mid-year.
        for (offset, yield_pct) in [(2, 3.0), (1, 4.0)] {
            let year = start.year() - offset;
            if let Some(ex_date) = NaiveDate::from_ymd_opt(year, 6, 15) {
                dividends.insert(
                    symbol,
                    ex_date,
                    DividendRecord {
                        amount: 100.0 * yield_pct,
                        yield_pct,
                    },
                );
            }
        }
    }
    columns.push((benchmark.to_string(), synthetic_walk(benchmark, dates.len())));

    let dataset_hash = compute_dataset_hash(&dates, &columns);
    let panel = MarketPanel::new(dates, columns, benchmark, dividends)?;

    Ok(LoadedPanel {
        panel,
        dataset_hash,
        has_synthetic: true,
        warnings: Vec::new(),
    })
}

fn weekday_dates(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut dates = Vec::new();
    let mut current = start;
    while current <= end {
        let weekday = current.weekday();
        if weekday != chrono::Weekday::Sat && weekday != chrono::Weekday::Sun {
            dates.push(current);
        }
        current += chrono::Duration::days(1);
    }
    dates
}

/// Random walk seeded from the symbol name, ±3% daily.
fn synthetic_walk(symbol: &str, days: usize) -> Vec<Option<f64>> {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    let seed: [u8; 32] = *blake3::hash(symbol.as_bytes()).as_bytes();
    let mut rng = StdRng::from_seed(seed);

    let mut price = rng.gen_range(1_000.0..20_000.0_f64);
    let mut column = Vec::with_capacity(days);
    for _ in 0..days {
        column.push(Some(price));
        let daily_return: f64 = rng.gen_range(-0.03..0.03);
        price *= 1.0 + daily_return;
    }
    column
}
