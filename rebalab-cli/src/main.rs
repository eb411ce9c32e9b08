//! Rebalab CLI — run and sweep commands.
//!
//! Commands:
//! - `run` — execute one backtest from a TOML config file or named preset
//! - `sweep` — run every built-in policy preset over one dataset and print
//!   the leaderboard
//!
//! Market data comes from a price CSV plus an optional dividend CSV, or
//! from the deterministic synthetic generator with `--synthetic`.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use rebalab_runner::config::{BacktestConfig, BacktestSection, DataSection, PolicyConfig};
use rebalab_runner::data_loader::{generate_synthetic_panel, load_panel, LoadedPanel};
use rebalab_runner::export::save_artifacts;
use rebalab_runner::runner::{run_single_backtest, BacktestSummary};
use rebalab_runner::sweep::PolicySweep;

/// Instruments used when generating a synthetic panel.
const SYNTHETIC_UNIVERSE: [&str; 24] = [
    "ORAC", "SNTS", "SGBC", "ECOC", "SDCC", "PALC", "TTLC", "NTLC", "BOAB", "BOAC", "BOAN",
    "CIEC", "FTSC", "NSBC", "ONTB", "SIBC", "SLBC", "SMBC", "SOGC", "SPHC", "STBC", "TTLS",
    "UNLC", "UNXC",
];

#[derive(Parser)]
#[command(name = "rebalab", about = "Rebalab CLI — portfolio rebalancing backtester")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a backtest from a TOML config file or named preset.
    Run {
        /// Path to a TOML config file.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Named preset: anchor_top_n, dividend_blend, cash_buffered, multi_group.
        #[arg(long)]
        preset: Option<String>,

        /// Start date (YYYY-MM-DD, required with --preset).
        #[arg(long)]
        start: Option<String>,

        /// End date (YYYY-MM-DD, required with --preset).
        #[arg(long)]
        end: Option<String>,

        /// Initial cash (used with --preset).
        #[arg(long, default_value_t = 90_000_000.0)]
        initial_cash: f64,

        /// Price table CSV (Date column plus one column per instrument).
        #[arg(long)]
        prices: Option<PathBuf>,

        /// Dividend sheet CSV (instrument, date, amount, yield).
        #[arg(long)]
        dividends: Option<PathBuf>,

        /// Benchmark column name.
        #[arg(long, default_value = "BRVM C")]
        benchmark: String,

        /// Generate a deterministic synthetic panel instead of loading CSVs.
        #[arg(long, default_value_t = false)]
        synthetic: bool,

        /// Output directory for the artifact bundle.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,

        /// Print the full manifest JSON to stdout instead of the summary table.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Run every built-in policy preset over one dataset and rank them.
    Sweep {
        /// Start date (YYYY-MM-DD).
        #[arg(long)]
        start: String,

        /// End date (YYYY-MM-DD).
        #[arg(long)]
        end: String,

        /// Initial cash.
        #[arg(long, default_value_t = 90_000_000.0)]
        initial_cash: f64,

        /// Price table CSV.
        #[arg(long)]
        prices: Option<PathBuf>,

        /// Dividend sheet CSV.
        #[arg(long)]
        dividends: Option<PathBuf>,

        /// Benchmark column name.
        #[arg(long, default_value = "BRVM C")]
        benchmark: String,

        /// Generate a deterministic synthetic panel instead of loading CSVs.
        #[arg(long, default_value_t = false)]
        synthetic: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            preset,
            start,
            end,
            initial_cash,
            prices,
            dividends,
            benchmark,
            synthetic,
            output_dir,
            json,
        } => run_cmd(
            config,
            preset,
            start,
            end,
            initial_cash,
            prices,
            dividends,
            benchmark,
            synthetic,
            output_dir,
            json,
        ),
        Commands::Sweep {
            start,
            end,
            initial_cash,
            prices,
            dividends,
            benchmark,
            synthetic,
        } => sweep_cmd(
            start,
            end,
            initial_cash,
            prices,
            dividends,
            benchmark,
            synthetic,
        ),
    }
}

#[allow(clippy::too_many_arguments)]
fn run_cmd(
    config_path: Option<PathBuf>,
    preset_name: Option<String>,
    start: Option<String>,
    end: Option<String>,
    initial_cash: f64,
    prices: Option<PathBuf>,
    dividends: Option<PathBuf>,
    benchmark: String,
    synthetic: bool,
    output_dir: PathBuf,
    json: bool,
) -> Result<()> {
    if config_path.is_some() && preset_name.is_some() {
        bail!("--config and --preset are mutually exclusive");
    }
    if config_path.is_none() && preset_name.is_none() {
        bail!("one of --config or --preset is required");
    }

    let config = if let Some(path) = config_path {
        BacktestConfig::from_file(&path)
            .with_context(|| format!("failed to load config {}", path.display()))?
    } else {
        let preset_name = preset_name.unwrap();
        let start = start
            .as_deref()
            .context("--start is required with --preset")?;
        let end = end.as_deref().context("--end is required with --preset")?;
        build_config_from_preset(&preset_name, start, end, initial_cash, &benchmark)?
    };

    let loaded = load_or_generate(
        prices.as_deref(),
        dividends.as_deref(),
        &config.data.benchmark,
        synthetic,
        config.backtest.start_date,
        config.backtest.end_date,
    )?;
    echo_warnings(&loaded.warnings);

    let summary = run_single_backtest(
        &config,
        &loaded.panel,
        &loaded.dataset_hash,
        loaded.has_synthetic,
    )?;
    echo_warnings(&summary.warnings);

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }

    let run_dir = save_artifacts(&summary, &output_dir)?;
    println!("Artifacts saved to: {}", run_dir.display());

    Ok(())
}

fn sweep_cmd(
    start: String,
    end: String,
    initial_cash: f64,
    prices: Option<PathBuf>,
    dividends: Option<PathBuf>,
    benchmark: String,
    synthetic: bool,
) -> Result<()> {
    let base = build_config_from_preset("anchor_top_n", &start, &end, initial_cash, &benchmark)?;

    let loaded = load_or_generate(
        prices.as_deref(),
        dividends.as_deref(),
        &benchmark,
        synthetic,
        base.backtest.start_date,
        base.backtest.end_date,
    )?;
    echo_warnings(&loaded.warnings);

    let policies: Vec<PolicyConfig> = PolicyConfig::PRESET_NAMES
        .iter()
        .filter_map(|name| PolicyConfig::preset(name))
        .collect();

    let results = PolicySweep::new().sweep(
        &base,
        &policies,
        &loaded.panel,
        &loaded.dataset_hash,
        loaded.has_synthetic,
    )?;

    println!(
        "{:<28} {:>10} {:>10} {:>8} {:>8} {:>6}",
        "Policy", "Return %", "Bench %", "IR", "Sharpe", "Rebal"
    );
    println!("{}", "-".repeat(74));
    for summary in results.leaderboard() {
        let r = &summary.report;
        println!(
            "{:<28} {:>10.2} {:>10.2} {:>8.3} {:>8.3} {:>6}",
            summary.policy,
            r.portfolio_return_pct,
            r.benchmark_return_pct,
            r.information_ratio,
            r.sharpe,
            r.rebalance_count
        );
    }

    Ok(())
}

fn build_config_from_preset(
    name: &str,
    start: &str,
    end: &str,
    initial_cash: f64,
    benchmark: &str,
) -> Result<BacktestConfig> {
    if PolicyConfig::preset(name).is_none() {
        bail!(
            "unknown preset '{name}'. Valid: {}",
            PolicyConfig::PRESET_NAMES.join(", ")
        );
    }
    let config = BacktestConfig {
        backtest: BacktestSection {
            start_date: parse_date(start)?,
            end_date: parse_date(end)?,
            initial_cash,
            initial_nav: 100.0,
            risk_free_rate: 0.06,
        },
        data: DataSection {
            benchmark: benchmark.to_string(),
        },
        policy: PolicyConfig::preset(name).unwrap_or_else(|| unreachable!()),
    };
    config.validate()?;
    Ok(config)
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("invalid date '{s}' (expected YYYY-MM-DD)"))
}

fn load_or_generate(
    prices: Option<&Path>,
    dividends: Option<&Path>,
    benchmark: &str,
    synthetic: bool,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<LoadedPanel> {
    if synthetic {
        if prices.is_some() {
            bail!("--synthetic and --prices are mutually exclusive");
        }
        // Rankings need history before the start date; pad a year back.
        let padded_start = start - chrono::Duration::days(365);
        return Ok(generate_synthetic_panel(
            &SYNTHETIC_UNIVERSE,
            benchmark,
            padded_start,
            end,
        )?);
    }

    let prices = prices.context("--prices is required unless --synthetic is set")?;
    Ok(load_panel(prices, dividends, benchmark)?)
}

fn echo_warnings(warnings: &[String]) {
    for warning in warnings {
        eprintln!("WARNING: {warning}");
    }
}

fn print_summary(summary: &BacktestSummary) {
    let r = &summary.report;

    println!();
    println!("Backtest: {}", summary.policy);
    println!("Run id:   {}", summary.run_id);
    println!(
        "Period:   {} to {} ({} trading days)",
        summary.start_date,
        summary.end_date,
        summary.history.len()
    );
    if summary.has_synthetic {
        println!("Data:     SYNTHETIC");
    }
    println!();
    println!("{:<26} {:>14}", "Metric", "Value");
    println!("{}", "-".repeat(41));
    println!("{:<26} {:>13.2}%", "Portfolio return", r.portfolio_return_pct);
    println!("{:<26} {:>13.2}%", "Benchmark return", r.benchmark_return_pct);
    println!("{:<26} {:>13.2}%", "Surperformance", r.surperformance_pct);
    println!("{:<26} {:>13.2}%", "Portfolio volatility", r.portfolio_volatility_pct);
    println!("{:<26} {:>13.2}%", "Benchmark volatility", r.benchmark_volatility_pct);
    println!("{:<26} {:>14.3}", "Beta", r.beta);
    println!("{:<26} {:>14.3}", "Correlation", r.correlation);
    println!("{:<26} {:>13.2}%", "Tracking error", r.tracking_error_pct);
    println!("{:<26} {:>14.3}", "Sharpe", r.sharpe);
    println!("{:<26} {:>14.3}", "Sortino", r.sortino);
    println!("{:<26} {:>14.3}", "Information ratio", r.information_ratio);
    println!("{:<26} {:>14.0}", "Dividends collected", r.total_dividends);
    println!("{:<26} {:>14.0}", "Cash injected", r.total_injections);
    println!("{:<26} {:>14}", "Rebalances", r.rebalance_count);

    if let Some(last) = summary.history.last() {
        println!();
        println!("Final holdings ({} lines):", last.state.len());
        println!("{:<8} {:>14} {:>12} {:>8}", "Line", "Value", "Qty", "Weight");
        println!("{}", "-".repeat(46));
        for position in last.state.iter() {
            println!(
                "{:<8} {:>14.0} {:>12.2} {:>7.2}%",
                position.instrument,
                position.value,
                position.quantity,
                position.weight * 100.0
            );
        }
        println!("{:<8} {:>14.0} {:>12} {:>7.2}%", "CASH", last.cash, "", last.cash / last.total_value * 100.0);
    }
    println!();
}
