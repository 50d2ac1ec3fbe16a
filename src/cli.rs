//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;

use crate::adapters::console_report_adapter::ConsoleReportAdapter;
use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_trade_writer::write_trades_to_file;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::backtest::{self as backtest_engine, BacktestConfig, BacktestResult, BarInterval};
use crate::domain::config_validation::{parse_date, validate_backtest_config, validate_strategy_config};
use crate::domain::controller::ControllerParams;
use crate::domain::error::TrendfilterError;
use crate::domain::execution::FillPolicy;
use crate::domain::indicator::snapshot::warmup_bars;
use crate::domain::metrics::Metrics;
use crate::logging::init_logging;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

const DEFAULT_DATA_DIR: &str = "data";

#[derive(Parser, Debug)]
#[command(name = "trendfilter", about = "EMA trend-filter strategy backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Debug-level logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
        #[arg(long)]
        data_dir: Option<PathBuf>,
        /// Write closed trades to this CSV file
        #[arg(long)]
        trades_out: Option<PathBuf>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show the data range available for a symbol
    Info {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
    },
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub symbol: Option<String>,
    pub data_dir: Option<PathBuf>,
    pub trades_out: Option<PathBuf>,
}

pub fn run(cli: Cli) -> ExitCode {
    init_logging(cli.verbose);

    let result = match cli.command {
        Command::Backtest {
            config,
            symbol,
            data_dir,
            trades_out,
            dry_run,
        } => {
            let overrides = Overrides {
                symbol,
                data_dir,
                trades_out,
            };
            run_backtest(&config, &overrides, dry_run)
        }
        Command::Validate { config } => run_validate(&config),
        Command::Info { config, symbol } => run_info(&config, symbol.as_deref()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

/// Load the INI file and fold the command-line overrides into it.
pub fn load_config(path: &Path, overrides: &Overrides) -> Result<FileConfigAdapter, TrendfilterError> {
    info!("Loading config from {}", path.display());
    let mut adapter = FileConfigAdapter::from_file(path)?;

    if let Some(symbol) = &overrides.symbol {
        adapter.set("backtest", "symbol", Some(symbol.clone()));
    }
    if let Some(dir) = &overrides.data_dir {
        adapter.set("data", "dir", Some(dir.display().to_string()));
    }
    if let Some(out) = &overrides.trades_out {
        adapter.set("report", "trades_csv", Some(out.display().to_string()));
    }
    Ok(adapter)
}

fn parse_setting<T>(config: &dyn ConfigPort, key: &str, default: T) -> Result<T, TrendfilterError>
where
    T: std::str::FromStr<Err = String>,
{
    match config.get_string("backtest", key) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|reason| TrendfilterError::ConfigInvalid {
            section: "backtest".into(),
            key: key.into(),
            reason,
        }),
    }
}

pub fn build_backtest_config(config: &dyn ConfigPort) -> Result<BacktestConfig, TrendfilterError> {
    let symbol = config
        .get_string("backtest", "symbol")
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| TrendfilterError::ConfigMissing {
            section: "backtest".into(),
            key: "symbol".into(),
        })?;

    let start_str = config.get_string("backtest", "start_date");
    let end_str = config.get_string("backtest", "end_date");

    Ok(BacktestConfig {
        symbol,
        interval: parse_setting(config, "interval", BarInterval::Day1)?,
        start_date: parse_date(start_str.as_deref(), "start_date")?,
        end_date: parse_date(end_str.as_deref(), "end_date")?,
        initial_capital: config.get_double("backtest", "initial_capital", 100_000.0),
        commission_per_trade: config.get_double("backtest", "commission_per_trade", 0.0),
        commission_pct: config.get_double("backtest", "commission_pct", 0.1),
        slippage_pct: config.get_double("backtest", "slippage_pct", 0.0),
        fill_policy: parse_setting(config, "fill_policy", FillPolicy::NextOpen)?,
        risk_free_rate: config.get_double("backtest", "risk_free_rate", 0.02),
    })
}

pub fn build_controller_params(config: &dyn ConfigPort) -> ControllerParams {
    let defaults = ControllerParams::default();
    ControllerParams {
        fast_window: config.get_usize("strategy", "fast_window", defaults.fast_window),
        slow_window: config.get_usize("strategy", "slow_window", defaults.slow_window),
        position_fraction: config.get_double(
            "strategy",
            "position_fraction",
            defaults.position_fraction,
        ),
        volatility_window: config.get_usize(
            "strategy",
            "volatility_window",
            defaults.volatility_window,
        ),
        stop_multiplier: config.get_double("strategy", "stop_multiplier", defaults.stop_multiplier),
    }
}

pub fn resolve_data_dir(config: &dyn ConfigPort) -> PathBuf {
    config
        .get_string("data", "dir")
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
}

/// Fetch, check history length, run, and report. Returns the finished run.
pub fn run_backtest_pipeline(
    data_port: &dyn DataPort,
    bt_config: &BacktestConfig,
    params: &ControllerParams,
    reporter: &mut dyn ReportPort,
) -> Result<BacktestResult, TrendfilterError> {
    let bars = data_port.fetch_bars(
        &bt_config.symbol,
        bt_config.interval.as_str(),
        bt_config.start_date,
        bt_config.end_date,
    )?;

    if bars.is_empty() {
        return Err(TrendfilterError::NoData {
            symbol: bt_config.symbol.clone(),
            interval: bt_config.interval.to_string(),
        });
    }

    let minimum = warmup_bars(params.fast_window, params.slow_window, params.volatility_window);
    if bars.len() < minimum {
        return Err(TrendfilterError::InsufficientData {
            symbol: bt_config.symbol.clone(),
            bars: bars.len(),
            minimum,
        });
    }

    info!(
        "Running backtest: {} {} bars, {} to {}",
        bars.len(),
        bt_config.interval,
        bt_config.start_date,
        bt_config.end_date
    );

    let result = backtest_engine::run_backtest(&bars, bt_config, params, reporter)?;
    let metrics = Metrics::compute(
        &result.portfolio,
        bt_config.risk_free_rate,
        bt_config.interval.periods_per_year(),
    );
    reporter.summary(&backtest_engine::summarize(&result, &metrics, bt_config))?;

    Ok(result)
}

pub fn run_backtest(config_path: &Path, overrides: &Overrides, dry_run: bool) -> Result<(), TrendfilterError> {
    let adapter = load_config(config_path, overrides)?;
    validate_backtest_config(&adapter)?;
    validate_strategy_config(&adapter)?;

    let bt_config = build_backtest_config(&adapter)?;
    let params = build_controller_params(&adapter);
    let data_dir = resolve_data_dir(&adapter);

    if dry_run {
        print_dry_run(&bt_config, &params, &data_dir);
        return Ok(());
    }

    let data_port = CsvAdapter::new(data_dir);
    let mut reporter = ConsoleReportAdapter::stdout();
    let result = run_backtest_pipeline(&data_port, &bt_config, &params, &mut reporter)?;

    if let Some(path) = adapter
        .get_string("report", "trades_csv")
        .filter(|s| !s.trim().is_empty())
    {
        let path = PathBuf::from(path);
        write_trades_to_file(&path, &result.portfolio.closed_trades)?;
        info!(
            "Wrote {} trades to {}",
            result.portfolio.closed_trades.len(),
            path.display()
        );
    }
    Ok(())
}

fn print_dry_run(bt_config: &BacktestConfig, params: &ControllerParams, data_dir: &Path) {
    println!("Backtest:");
    println!("  symbol: {}", bt_config.symbol);
    println!("  interval: {}", bt_config.interval);
    println!("  period: {} to {}", bt_config.start_date, bt_config.end_date);
    println!("  initial capital: ${:.2}", bt_config.initial_capital);
    println!(
        "  commission: {}% + ${:.2} per trade",
        bt_config.commission_pct, bt_config.commission_per_trade
    );
    println!("  slippage: {}%", bt_config.slippage_pct);
    println!("  fill policy: {}", bt_config.fill_policy);
    println!("  data dir: {}", data_dir.display());

    println!("\nStrategy:");
    println!(
        "  EMA({}) / EMA({}), ATR({}) x {}",
        params.fast_window, params.slow_window, params.volatility_window, params.stop_multiplier
    );
    println!("  position fraction: {}", params.position_fraction);
    println!(
        "  warmup: {} bars",
        warmup_bars(params.fast_window, params.slow_window, params.volatility_window)
    );

    println!("\nDry run complete: configuration is valid");
}

pub fn run_validate(config_path: &Path) -> Result<(), TrendfilterError> {
    let adapter = load_config(config_path, &Overrides::default())?;
    validate_backtest_config(&adapter)?;
    validate_strategy_config(&adapter)?;
    println!("Configuration is valid.");
    Ok(())
}

pub fn run_info(config_path: &Path, symbol: Option<&str>) -> Result<(), TrendfilterError> {
    let overrides = Overrides {
        symbol: symbol.map(str::to_string),
        ..Overrides::default()
    };
    let adapter = load_config(config_path, &overrides)?;

    let symbol = adapter
        .get_string("backtest", "symbol")
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| TrendfilterError::ConfigMissing {
            section: "backtest".into(),
            key: "symbol".into(),
        })?;
    let interval: BarInterval = parse_setting(&adapter, "interval", BarInterval::Day1)?;
    let data_port = CsvAdapter::new(resolve_data_dir(&adapter));

    match data_port.data_range(&symbol, interval.as_str())? {
        Some((first, last, count)) => {
            println!("{symbol} ({interval}): {count} bars, {first} to {last}");
            Ok(())
        }
        None => Err(TrendfilterError::NoData {
            symbol,
            interval: interval.to_string(),
        }),
    }
}
