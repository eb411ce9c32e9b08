//! The sequential day loop and its terminal result.

use chrono::NaiveDate;

use crate::domain::{DailyRecord, PortfolioState, Position, Transaction, TransactionKind};
use crate::market::MarketPanel;
use crate::policy::{PolicyView, WeightingPolicy};

use super::rebalance::{apply_rotation, apply_targets};
use super::{EngineConfig, EngineError, WEIGHT_SUM_RTOL};

/// Terminal, read-only result of a completed backtest.
#[derive(Debug)]
pub struct EngineRun {
    /// One record per simulated trading day, in date order.
    pub history: Vec<DailyRecord>,
    /// Recoverable anomalies observed during the run (skipped dates,
    /// invariant drift). Never silently dropped.
    pub warnings: Vec<String>,
    pub rebalance_count: usize,
    pub final_cash: f64,
}

impl EngineRun {
    pub fn nav_series(&self) -> Vec<(NaiveDate, f64)> {
        self.history.iter().map(|r| (r.date, r.nav)).collect()
    }

    pub fn total_dividends(&self) -> f64 {
        self.history.iter().map(|r| r.dividends).sum()
    }

    pub fn total_injections(&self) -> f64 {
        self.history.iter().map(|r| r.cash_injection).sum()
    }

    pub fn final_state(&self) -> Option<&PortfolioState> {
        self.history.last().map(|r| &r.state)
    }
}

/// Drives one policy over one market panel from start to end date.
pub struct PortfolioEngine<'a> {
    panel: &'a MarketPanel,
    policy: Box<dyn WeightingPolicy>,
    config: EngineConfig,
    cash: f64,
    history: Vec<DailyRecord>,
    warnings: Vec<String>,
    rebalance_count: usize,
}

impl<'a> PortfolioEngine<'a> {
    pub fn new(
        panel: &'a MarketPanel,
        policy: Box<dyn WeightingPolicy>,
        config: EngineConfig,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            panel,
            policy,
            config,
            cash: 0.0,
            history: Vec::new(),
            warnings: Vec::new(),
            rebalance_count: 0,
        })
    }

    /// Run the backtest to completion.
    pub fn run(mut self) -> Result<EngineRun, EngineError> {
        let start = self.initialize()?;
        for date in self.panel.dates_between(start, self.config.end_date) {
            self.advance(date)?;
        }
        Ok(EngineRun {
            history: self.history,
            warnings: self.warnings,
            rebalance_count: self.rebalance_count,
            final_cash: self.cash,
        })
    }

    /// Buy the initial schedule on the first trading date at or after
    /// `start_date`. Returns the resolved date.
    fn initialize(&mut self) -> Result<NaiveDate, EngineError> {
        let start = self
            .panel
            .next_trading_date_on_or_after(self.config.start_date)
            .filter(|d| *d <= self.config.end_date)
            .ok_or(EngineError::NoValidDate {
                requested: self.config.start_date,
            })?;

        let weights = self.policy.initial_weights(self.panel, start)?;
        let prices = self.panel.prices_at(start)?;

        let mut state = PortfolioState::new();
        let mut transactions = Vec::with_capacity(weights.len());
        for (instrument, weight) in &weights {
            let price =
                prices
                    .get(instrument)
                    .copied()
                    .ok_or_else(|| EngineError::MissingPrice {
                        instrument: instrument.clone(),
                        date: start,
                    })?;
            let value = self.config.initial_cash * weight;
            let quantity = value / price;
            transactions.push(Transaction::new(
                instrument,
                TransactionKind::Acquisition,
                quantity,
                price,
            ));
            state.push(Position {
                instrument: instrument.clone(),
                quantity,
                price,
                value,
                weight: *weight,
            });
        }

        let invested = state.market_value();
        self.cash = self.config.initial_cash - invested;
        let total = invested + self.cash;
        self.check_weight_sum(&state, self.cash, total, start);

        self.history.push(DailyRecord {
            date: start,
            state,
            nav: self.config.initial_nav,
            total_value: total,
            portfolio_value: invested,
            cash: self.cash,
            dividends: 0.0,
            cash_injection: 0.0,
            transactions,
        });
        Ok(start)
    }

    /// Process one trading day. A missing price for a held instrument skips
    /// the whole day (warning recorded, no partial update).
    fn advance(&mut self, date: NaiveDate) -> Result<(), EngineError> {
        let (mut state, prev_nav, prev_total) = match self.history.last() {
            Some(rec) => (rec.state.clone(), rec.nav, rec.total_value),
            None => {
                return Err(EngineError::InvalidConfig(
                    "advance called before initialize".into(),
                ))
            }
        };

        let prices = self.panel.prices_at(date)?;

        // 1. Mark to market. The clone above means bailing out here leaves
        //    the committed history untouched.
        for pos in state.iter_mut() {
            match prices.get(&pos.instrument) {
                Some(&price) => {
                    pos.price = price;
                    pos.value = pos.quantity * price;
                }
                None => {
                    self.warnings.push(format!(
                        "{date}: no price for held '{}', date skipped",
                        pos.instrument
                    ));
                    return Ok(());
                }
            }
        }

        // 2. Dividend entitlements.
        let mut dividends = 0.0;
        for pos in state.iter() {
            let record = self.panel.dividend_for(&pos.instrument, date);
            if record.amount > 0.0 {
                dividends += record.amount * pos.quantity;
            }
        }
        self.cash += dividends;

        // 3. Revalue and reweight.
        let mut total = state.market_value() + self.cash;
        if total > 0.0 {
            for pos in state.iter_mut() {
                pos.weight = pos.value / total;
            }
        }

        // 4. Rebalance if the policy asks for it.
        let mut transactions = Vec::new();
        let mut injection = 0.0;
        let view = PolicyView {
            state: &state,
            cash: self.cash,
            total_value: total,
        };
        if self.policy.needs_rebalance(&view, date) {
            let targets = self.policy.rebalance_targets(&view, self.panel, date)?;
            let plan = self.policy.rotate_satellites(&view, self.panel, date)?;

            apply_targets(&mut state, &targets, total, &prices, date, &mut transactions)?;
            apply_rotation(&mut state, &plan, &prices, date, &mut transactions)?;

            let invested = state.market_value();
            let mut cash_after = total - invested;
            if cash_after < 0.0 {
                // The schedule demanded more than was available; the
                // shortfall is contributed from outside and tracked.
                injection = -cash_after;
                cash_after = 0.0;
            }
            self.cash = cash_after;
            total = invested + self.cash;
            self.rebalance_count += 1;

            if total > 0.0 {
                for pos in state.iter_mut() {
                    pos.weight = pos.value / total;
                }
            }
            self.check_weight_sum(&state, self.cash, total, date);
        }

        // 5. Chain the NAV off total value.
        let nav = if prev_total > 0.0 {
            prev_nav * total / prev_total
        } else {
            prev_nav
        };

        let portfolio_value = state.market_value();
        self.history.push(DailyRecord {
            date,
            state,
            nav,
            total_value: total,
            portfolio_value,
            cash: self.cash,
            dividends,
            cash_injection: injection,
            transactions,
        });
        Ok(())
    }

    /// Position weights plus the cash weight must sum to 1.
    fn check_weight_sum(&mut self, state: &PortfolioState, cash: f64, total: f64, date: NaiveDate) {
        if total <= 0.0 {
            return;
        }
        let sum = state.weights_sum() + cash / total;
        if (sum - 1.0).abs() > WEIGHT_SUM_RTOL {
            self.warnings
                .push(format!("{date}: weight sum {sum:.8} deviates from 1.0"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::{DividendLedger, DividendRecord, MarketPanel};
    use crate::policy::{EqualAnchorTopN, PolicyError, TargetWeights};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// Minimal deterministic policy for engine plumbing tests: a fixed
    /// two-way split, rebalancing when cash builds past 10%.
    struct FixedSplit;

    impl WeightingPolicy for FixedSplit {
        fn name(&self) -> &str {
            "fixed_split"
        }

        fn initial_weights(
            &self,
            _panel: &MarketPanel,
            _date: NaiveDate,
        ) -> Result<TargetWeights, PolicyError> {
            Ok(vec![("ORAC".to_string(), 0.5), ("SNTS".to_string(), 0.5)])
        }

        fn needs_rebalance(&self, view: &PolicyView<'_>, _date: NaiveDate) -> bool {
            view.cash_weight() > 0.10
        }

        fn rebalance_targets(
            &self,
            _view: &PolicyView<'_>,
            _panel: &MarketPanel,
            _date: NaiveDate,
        ) -> Result<TargetWeights, PolicyError> {
            Ok(vec![("ORAC".to_string(), 0.5), ("SNTS".to_string(), 0.5)])
        }
    }

    fn two_stock_panel(orac: Vec<Option<f64>>, snts: Vec<Option<f64>>) -> MarketPanel {
        let n = orac.len();
        let dates: Vec<NaiveDate> = (0..n as u64)
            .map(|i| date(2024, 1, 1) + chrono::Days::new(i))
            .collect();
        let bench: Vec<Option<f64>> = (0..n).map(|_| Some(50.0)).collect();
        MarketPanel::new(
            dates,
            vec![
                ("ORAC".into(), orac),
                ("SNTS".into(), snts),
                ("BRVM C".into(), bench),
            ],
            "BRVM C",
            DividendLedger::new(),
        )
        .unwrap()
    }

    fn flat(n: usize, v: f64) -> Vec<Option<f64>> {
        (0..n).map(|_| Some(v)).collect()
    }

    fn run_fixed_split(panel: &MarketPanel, config: EngineConfig) -> EngineRun {
        PortfolioEngine::new(panel, Box::new(FixedSplit), config)
            .unwrap()
            .run()
            .unwrap()
    }

    #[test]
    fn initialize_buys_the_schedule_and_resolves_start_forward() {
        let panel = two_stock_panel(flat(5, 100.0), flat(5, 200.0));
        // 2023-12-30 is before the panel: resolves to the first trading date.
        let config = EngineConfig::new(date(2023, 12, 30), date(2024, 1, 5), 10_000.0);
        let run = run_fixed_split(&panel, config);

        let first = &run.history[0];
        assert_eq!(first.date, date(2024, 1, 1));
        assert_eq!(first.nav, 100.0);
        assert_eq!(first.transactions.len(), 2);
        assert!(first
            .transactions
            .iter()
            .all(|t| t.kind == TransactionKind::Acquisition));
        assert!((first.cash - 0.0).abs() < 1e-9);
        assert!((first.state.get("ORAC").unwrap().quantity - 50.0).abs() < 1e-12);
    }

    #[test]
    fn start_past_all_data_is_no_valid_date() {
        let panel = two_stock_panel(flat(5, 100.0), flat(5, 200.0));
        let config = EngineConfig::new(date(2025, 1, 1), date(2025, 6, 1), 10_000.0);
        let err = PortfolioEngine::new(&panel, Box::new(FixedSplit), config)
            .unwrap()
            .run()
            .unwrap_err();
        assert!(matches!(err, EngineError::NoValidDate { .. }));
    }

    #[test]
    fn no_trade_days_have_empty_transactions() {
        let panel = two_stock_panel(flat(5, 100.0), flat(5, 200.0));
        let config = EngineConfig::new(date(2024, 1, 1), date(2024, 1, 5), 10_000.0);
        let run = run_fixed_split(&panel, config);

        assert_eq!(run.history.len(), 5);
        for record in &run.history[1..] {
            assert!(record.transactions.is_empty());
            assert!(!record.rebalanced());
        }
        assert_eq!(run.rebalance_count, 0);
    }

    #[test]
    fn nav_chains_off_total_value() {
        let orac: Vec<Option<f64>> = (0..5).map(|i| Some(100.0 + 10.0 * i as f64)).collect();
        let panel = two_stock_panel(orac, flat(5, 200.0));
        let config = EngineConfig::new(date(2024, 1, 1), date(2024, 1, 5), 10_000.0);
        let run = run_fixed_split(&panel, config);

        for pair in run.history.windows(2) {
            let expected = pair[0].nav * pair[1].total_value / pair[0].total_value;
            assert!((pair[1].nav - expected).abs() < 1e-9);
        }
        // Day 2: ORAC leg grew 10%, so total is 10_500 and NAV 105.
        assert!((run.history[1].nav - 105.0).abs() < 1e-9);
    }

    #[test]
    fn dividends_are_collected_into_cash() {
        let mut ledger = DividendLedger::new();
        ledger.insert(
            "ORAC",
            date(2024, 1, 3),
            DividendRecord {
                amount: 2.0,
                yield_pct: 2.0,
            },
        );
        let dates: Vec<NaiveDate> = (0..5u64).map(|i| date(2024, 1, 1) + chrono::Days::new(i)).collect();
        let panel = MarketPanel::new(
            dates,
            vec![
                ("ORAC".into(), flat(5, 100.0)),
                ("SNTS".into(), flat(5, 200.0)),
                ("BRVM C".into(), flat(5, 50.0)),
            ],
            "BRVM C",
            ledger,
        )
        .unwrap();
        let config = EngineConfig::new(date(2024, 1, 1), date(2024, 1, 5), 10_000.0);
        let run = run_fixed_split(&panel, config);

        // 50 ORAC shares times 2.0 per share.
        let payday = &run.history[2];
        assert_eq!(payday.date, date(2024, 1, 3));
        assert!((payday.dividends - 100.0).abs() < 1e-9);
        assert!((payday.cash - 100.0).abs() < 1e-9);
        assert!((run.total_dividends() - 100.0).abs() < 1e-9);
        // 1% cash is below the 10% trigger: no rebalance.
        assert_eq!(run.rebalance_count, 0);
    }

    #[test]
    fn missing_held_price_skips_the_date() {
        let mut orac = flat(5, 100.0);
        orac[2] = None;
        let panel = two_stock_panel(orac, flat(5, 200.0));
        let config = EngineConfig::new(date(2024, 1, 1), date(2024, 1, 5), 10_000.0);
        let run = run_fixed_split(&panel, config);

        let recorded: Vec<NaiveDate> = run.history.iter().map(|r| r.date).collect();
        assert!(!recorded.contains(&date(2024, 1, 3)));
        assert_eq!(run.history.len(), 4);
        assert_eq!(run.warnings.len(), 1);
        assert!(run.warnings[0].contains("ORAC"));
    }

    #[test]
    fn cash_buildup_is_redeployed_on_rebalance() {
        let mut ledger = DividendLedger::new();
        // A dividend worth 20% of the position value forces the cash trigger.
        ledger.insert(
            "ORAC",
            date(2024, 1, 3),
            DividendRecord {
                amount: 40.0,
                yield_pct: 40.0,
            },
        );
        let dates: Vec<NaiveDate> = (0..5u64).map(|i| date(2024, 1, 1) + chrono::Days::new(i)).collect();
        let panel = MarketPanel::new(
            dates,
            vec![
                ("ORAC".into(), flat(5, 100.0)),
                ("SNTS".into(), flat(5, 200.0)),
                ("BRVM C".into(), flat(5, 50.0)),
            ],
            "BRVM C",
            ledger,
        )
        .unwrap();
        let config = EngineConfig::new(date(2024, 1, 1), date(2024, 1, 5), 10_000.0);
        let run = run_fixed_split(&panel, config);

        let payday = &run.history[2];
        assert!(payday.rebalanced());
        assert_eq!(run.rebalance_count, 1);
        // Targets sum to 1.0, so all cash is reinvested.
        assert!(payday.cash.abs() < 1e-9);
        assert!((payday.cash_injection - 0.0).abs() < 1e-9);
        // Invariant holds post-rebalance, and nothing was warned about.
        assert!((payday.state.weights_sum() - 1.0).abs() < 1e-9);
        assert!(run.warnings.is_empty());
    }

    /// Two anchors capped at 20%, eighteen satellites, 90 million initial
    /// cash. One anchor marks up past its cap and must come back to exactly
    /// 0.20 after the rebalance.
    #[test]
    fn anchor_drift_past_cap_rebalances_back_to_the_cap() {
        let n = 10usize;
        let dates: Vec<NaiveDate> = (0..n as u64)
            .map(|i| date(2024, 1, 1) + chrono::Days::new(i))
            .collect();

        // ORAC jumps 20% on day 6 and stays there.
        let orac: Vec<Option<f64>> = (0..n)
            .map(|i| Some(if i >= 5 { 1200.0 } else { 1000.0 }))
            .collect();
        let mut columns = vec![("ORAC".to_string(), orac), ("SNTS".to_string(), flat(n, 2000.0))];
        for k in 0..18 {
            columns.push((format!("S{k:02}"), flat(n, 100.0 + k as f64)));
        }
        columns.push(("BRVM C".to_string(), flat(n, 50.0)));
        let panel = MarketPanel::new(dates, columns, "BRVM C", DividendLedger::new()).unwrap();

        let policy = EqualAnchorTopN::new(
            vec![("ORAC".into(), 0.2), ("SNTS".into(), 0.2)],
            18,
            6,
        );
        let config = EngineConfig::new(date(2024, 1, 1), date(2024, 1, 10), 90_000_000.0);
        let run = PortfolioEngine::new(&panel, Box::new(policy), config)
            .unwrap()
            .run()
            .unwrap();

        // Day 6 (index 5): ORAC is 21.6M of 93.6M, i.e. about 23%.
        let jump_day = &run.history[5];
        assert_eq!(jump_day.date, date(2024, 1, 6));
        assert!(jump_day.rebalanced());
        let orac = jump_day.state.get("ORAC").unwrap();
        assert!((orac.weight - 0.20).abs() < 1e-12);

        // Weight-sum invariant, cash weight included.
        let sum = jump_day.state.weights_sum() + jump_day.cash / jump_day.total_value;
        assert!((sum - 1.0).abs() < 1e-5);

        // Prices are flat afterwards: exactly one rebalance.
        assert_eq!(run.rebalance_count, 1);
        assert!(run.history[6..].iter().all(|r| !r.rebalanced()));
    }

    /// A satellite that falls out of the ranking is swapped for the best
    /// newcomer at the next rebalance, the newcomer inheriting its slot.
    #[test]
    fn rebalance_rotates_stale_satellites() {
        let n = 80usize;
        let dates: Vec<NaiveDate> = (0..n as u64)
            .map(|i| date(2024, 1, 1) + chrono::Days::new(i))
            .collect();

        // ORAC breaches its cap on the final day to force a rebalance.
        let orac: Vec<Option<f64>> = (0..n)
            .map(|i| Some(if i == n - 1 { 2000.0 } else { 1000.0 }))
            .collect();
        // GOOD and BEST rise; DULL starts as the second-best performer and
        // then goes flat, dropping out of the top two.
        let good: Vec<Option<f64>> = (0..n).map(|i| Some(100.0 + 1.0 * i as f64)).collect();
        let best: Vec<Option<f64>> = (0..n).map(|i| Some(100.0 + 2.0 * i as f64)).collect();
        let dull: Vec<Option<f64>> = (0..n)
            .map(|i| Some(if i < 3 { 100.0 + 50.0 * i as f64 } else { 200.0 }))
            .collect();
        let columns = vec![
            ("ORAC".to_string(), orac),
            ("GOOD".to_string(), good),
            ("BEST".to_string(), best),
            ("DULL".to_string(), dull),
            ("BRVM C".to_string(), flat(n, 50.0)),
        ];
        let panel = MarketPanel::new(dates, columns, "BRVM C", DividendLedger::new()).unwrap();

        let policy = EqualAnchorTopN::new(vec![("ORAC".into(), 0.2)], 2, 1);
        let config = EngineConfig::new(date(2024, 1, 2), date(2024, 3, 20), 1_000_000.0);
        let run = PortfolioEngine::new(&panel, Box::new(policy), config)
            .unwrap()
            .run()
            .unwrap();

        // On day 2 DULL has the top one-month return, so the initial sleeve
        // is DULL plus BEST.
        let first = &run.history[0];
        assert!(first.state.contains("DULL"));
        assert!(first.state.contains("BEST"));
        assert!(!first.state.contains("GOOD"));

        let last = run.history.last().unwrap();
        assert!(last.rebalanced());
        assert!(!last.state.contains("DULL"));
        assert!(last.state.contains("GOOD"));

        // Slot inheritance: GOOD's acquisition value equals DULL's disposal
        // value at the rebalance prices.
        let disposal = last
            .transactions
            .iter()
            .find(|t| t.kind == TransactionKind::Disposal)
            .unwrap();
        assert_eq!(disposal.instrument, "DULL");
        let good = last.state.get("GOOD").unwrap();
        assert!((good.value - (-disposal.value)).abs() < 1e-6);
    }
}
