//! Dividend ledger — per-issuer ex-date payments, merged from multiple sheets.

use std::collections::{BTreeMap, HashMap};

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// One dividend event: the per-share amount paid and the yield it represented.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DividendRecord {
    pub amount: f64,
    pub yield_pct: f64,
}

impl DividendRecord {
    pub const ZERO: DividendRecord = DividendRecord {
        amount: 0.0,
        yield_pct: 0.0,
    };
}

/// Mapping instrument -> ex-date -> dividend record.
///
/// Built once by the loader; read-only afterwards. Source rows whose dates
/// fail to parse are not defaulted — they are dropped and counted, and the
/// count is surfaced as a data-quality warning by the caller.
#[derive(Debug, Clone, Default)]
pub struct DividendLedger {
    by_instrument: HashMap<String, BTreeMap<NaiveDate, DividendRecord>>,
    rejected_rows: usize,
}

impl DividendLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, instrument: &str, date: NaiveDate, record: DividendRecord) {
        self.by_instrument
            .entry(instrument.to_string())
            .or_default()
            .insert(date, record);
    }

    /// Count a source row discarded because its date did not parse.
    pub fn note_rejected_row(&mut self) {
        self.rejected_rows += 1;
    }

    pub fn rejected_rows(&self) -> usize {
        self.rejected_rows
    }

    /// Exact-date lookup. Most days have no dividend event, so a miss is the
    /// zero record, never an error.
    pub fn lookup(&self, instrument: &str, date: NaiveDate) -> DividendRecord {
        self.by_instrument
            .get(instrument)
            .and_then(|dates| dates.get(&date))
            .copied()
            .unwrap_or(DividendRecord::ZERO)
    }

    /// First positive payment recorded for `instrument` in calendar `year`.
    pub fn payment_in_year(&self, instrument: &str, year: i32) -> Option<DividendRecord> {
        self.by_instrument.get(instrument).and_then(|dates| {
            dates
                .iter()
                .find(|(d, rec)| d.year() == year && rec.amount > 0.0)
                .map(|(_, rec)| *rec)
        })
    }

    pub fn is_empty(&self) -> bool {
        self.by_instrument.is_empty()
    }
}
