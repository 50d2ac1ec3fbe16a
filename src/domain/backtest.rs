//! Backtest configuration and the bar-iteration loop.
//!
//! The loop drives the position controller once per bar in timestamp order:
//! fill any order queued on the previous bar at this bar's open, report the
//! fill back to the controller, ask the controller for a decision using the
//! indicators at t and t-1, hand the decision to the broker, then mark the
//! portfolio to market at the close.

use chrono::NaiveDate;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};

use super::controller::{ControllerParams, Decision, PositionController, PositionState};
use super::error::TrendfilterError;
use super::execution::{Execution, ExecutionConfig, FillPolicy, SimulatedBroker};
use super::indicator::IndicatorSet;
use super::metrics::Metrics;
use super::ohlcv::Bar;
use super::portfolio::Portfolio;
use crate::ports::report_port::{OpenPositionSummary, ReportPort, RunSummary, TradeClosedEvent};

/// Bar sampling interval. Determines how per-bar returns are annualized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarInterval {
    Minute1,
    Minute5,
    Minute15,
    Minute30,
    Hour1,
    Day1,
    Week1,
}

impl BarInterval {
    pub fn as_str(&self) -> &'static str {
        match self {
            BarInterval::Minute1 => "1m",
            BarInterval::Minute5 => "5m",
            BarInterval::Minute15 => "15m",
            BarInterval::Minute30 => "30m",
            BarInterval::Hour1 => "1h",
            BarInterval::Day1 => "1d",
            BarInterval::Week1 => "1wk",
        }
    }

    /// Bars per year for a 6.5 hour session and 252 sessions.
    ///
    /// Hourly sessions start on the half hour, which leaves 7 bars per day.
    pub fn periods_per_year(&self) -> f64 {
        let per_day = match self {
            BarInterval::Minute1 => 390.0,
            BarInterval::Minute5 => 78.0,
            BarInterval::Minute15 => 26.0,
            BarInterval::Minute30 => 13.0,
            BarInterval::Hour1 => 7.0,
            BarInterval::Day1 => 1.0,
            BarInterval::Week1 => return 52.0,
        };
        per_day * 252.0
    }
}

impl fmt::Display for BarInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BarInterval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "1m" => Ok(BarInterval::Minute1),
            "5m" => Ok(BarInterval::Minute5),
            "15m" => Ok(BarInterval::Minute15),
            "30m" => Ok(BarInterval::Minute30),
            "1h" | "60m" => Ok(BarInterval::Hour1),
            "1d" => Ok(BarInterval::Day1),
            "1wk" => Ok(BarInterval::Week1),
            other => Err(format!(
                "unknown interval '{other}' (expected 1m, 5m, 15m, 30m, 1h, 1d or 1wk)"
            )),
        }
    }
}

/// Run-level parameters, independent of the strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub symbol: String,
    pub interval: BarInterval,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub initial_capital: f64,
    pub commission_per_trade: f64,
    pub commission_pct: f64,
    pub slippage_pct: f64,
    pub fill_policy: FillPolicy,
    pub risk_free_rate: f64,
}

impl BacktestConfig {
    pub fn execution_config(&self) -> ExecutionConfig {
        ExecutionConfig {
            commission_per_trade: self.commission_per_trade,
            commission_pct: self.commission_pct,
            slippage_pct: self.slippage_pct,
            fill_policy: self.fill_policy,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BacktestResult {
    pub portfolio: Portfolio,
    pub bars_processed: usize,
    pub rejected_fills: usize,
    pub final_state: PositionState,
    pub last_close: Option<f64>,
}

/// Run the strategy over `bars`, streaming closed trades to `reporter`.
///
/// Bars that are not well formed are dropped before indicators are computed.
pub fn run_backtest(
    bars: &[Bar],
    config: &BacktestConfig,
    params: &ControllerParams,
    reporter: &mut dyn ReportPort,
) -> Result<BacktestResult, TrendfilterError> {
    let bars: Vec<Bar> = bars.iter().filter(|b| b.is_well_formed()).cloned().collect();
    if bars.is_empty() {
        return Err(TrendfilterError::NoData {
            symbol: config.symbol.clone(),
            interval: config.interval.to_string(),
        });
    }

    let indicators = IndicatorSet::compute(
        &bars,
        params.fast_window,
        params.slow_window,
        params.volatility_window,
    );
    let mut controller = PositionController::new(params.clone());
    let mut broker = SimulatedBroker::new(config.execution_config());
    let mut portfolio = Portfolio::new(config.initial_capital);
    let mut rejected_fills = 0usize;
    let mut warmed_up = false;

    for (i, bar) in bars.iter().enumerate() {
        if let Some(exec) = broker.on_bar_open(bar, &mut portfolio) {
            settle(&mut controller, &exec, &mut rejected_fills, reporter)?;
        }

        let snapshot = indicators.snapshot(i);
        if !warmed_up && snapshot.current.resolved().is_some() && snapshot.previous.resolved().is_some()
        {
            warmed_up = true;
            debug!(bar = i, timestamp = %bar.timestamp, "indicators warmed up");
        }

        let equity = portfolio.total_equity(bar.close);
        let decision = controller.on_bar(bar, &snapshot, equity);
        match &decision {
            Decision::EnterLong { size, stop_price } => info!(
                timestamp = %bar.timestamp,
                "ENTRY: ${:.2} | Size: {} | Stop: ${:.2}",
                bar.close,
                size,
                stop_price
            ),
            Decision::ExitPosition(reason) => info!(
                timestamp = %bar.timestamp,
                "EXIT: {} at ${:.2}",
                reason,
                bar.close
            ),
            Decision::NoAction => {}
        }

        if let Some(exec) = broker.submit(decision, bar, &mut portfolio) {
            settle(&mut controller, &exec, &mut rejected_fills, reporter)?;
        }

        let marked = portfolio.total_equity(bar.close);
        portfolio.record_equity(bar.timestamp, marked);
    }

    if let Some(pending) = broker.pending() {
        debug!(?pending, "order still working at end of data, dropped");
    }

    Ok(BacktestResult {
        portfolio,
        bars_processed: bars.len(),
        rejected_fills,
        final_state: controller.state().clone(),
        last_close: bars.last().map(|b| b.close),
    })
}

fn settle(
    controller: &mut PositionController,
    exec: &Execution,
    rejected_fills: &mut usize,
    reporter: &mut dyn ReportPort,
) -> Result<(), TrendfilterError> {
    controller.apply_fill(&exec.decision, &exec.report);

    if !exec.report.filled {
        *rejected_fills += 1;
        warn!(
            timestamp = %exec.report.timestamp,
            decision = ?exec.decision,
            "order rejected, state unchanged"
        );
        return Ok(());
    }

    if let Some(trade) = &exec.closed_trade {
        let event = TradeClosedEvent::from_trade(controller.state().trade_count, trade);
        reporter.trade_closed(&event)?;
    }
    Ok(())
}

/// Collapse a finished run into the numbers the reporting side renders.
pub fn summarize(result: &BacktestResult, metrics: &Metrics, config: &BacktestConfig) -> RunSummary {
    let portfolio = &result.portfolio;
    let open_position = portfolio.position.as_ref().map(|pos| {
        let last_close = result.last_close.unwrap_or(pos.entry_price);
        OpenPositionSummary {
            quantity: pos.quantity,
            entry_price: pos.entry_price,
            last_close,
            unrealized_pnl: pos.unrealized_pnl(last_close),
        }
    });

    RunSummary {
        symbol: config.symbol.clone(),
        bars_processed: result.bars_processed,
        starting_value: portfolio.initial_capital,
        final_value: portfolio.final_equity(),
        total_return_pct: metrics.total_return * 100.0,
        annualized_return_pct: metrics.annualized_return * 100.0,
        sharpe_ratio: metrics.sharpe_ratio,
        sortino_ratio: metrics.sortino_ratio,
        max_drawdown_pct: metrics.max_drawdown * 100.0,
        max_drawdown_bars: metrics.max_drawdown_duration,
        total_trades: metrics.total_trades,
        won: metrics.trades_won,
        lost: metrics.trades_lost,
        win_rate: metrics.win_rate,
        profit_factor: metrics.profit_factor,
        rejected_fills: result.rejected_fills,
        open_position,
    }
}
