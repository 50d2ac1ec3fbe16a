//! Report generation port trait.

use chrono::NaiveDateTime;

use crate::domain::controller::ExitReason;
use crate::domain::error::TrendfilterError;
use crate::domain::position::{ClosedTrade, TradeOutcome};

/// Emitted once per closed round trip, in the order trades close.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeClosedEvent {
    pub trade_number: u32,
    pub symbol: String,
    pub exit_time: NaiveDateTime,
    pub exit_reason: ExitReason,
    pub pnl: f64,
    pub pnl_percent: f64,
    pub outcome: TradeOutcome,
}

impl TradeClosedEvent {
    pub fn from_trade(trade_number: u32, trade: &ClosedTrade) -> Self {
        TradeClosedEvent {
            trade_number,
            symbol: trade.symbol.clone(),
            exit_time: trade.exit_time,
            exit_reason: trade.exit_reason,
            pnl: trade.pnl,
            pnl_percent: trade.pnl_percent(),
            outcome: trade.outcome(),
        }
    }
}

/// Position still open when the data ran out, marked at the last close.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenPositionSummary {
    pub quantity: i64,
    pub entry_price: f64,
    pub last_close: f64,
    pub unrealized_pnl: f64,
}

/// End-of-run portfolio snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub symbol: String,
    pub bars_processed: usize,
    pub starting_value: f64,
    pub final_value: f64,
    /// Percent, 5.0 = +5 %.
    pub total_return_pct: f64,
    pub annualized_return_pct: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    /// Percent of peak equity.
    pub max_drawdown_pct: f64,
    pub max_drawdown_bars: usize,
    pub total_trades: usize,
    pub won: usize,
    pub lost: usize,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub rejected_fills: usize,
    pub open_position: Option<OpenPositionSummary>,
}

impl RunSummary {
    pub fn pnl(&self) -> f64 {
        self.final_value - self.starting_value
    }
}

/// Port for rendering run progress and results.
pub trait ReportPort {
    fn trade_closed(&mut self, event: &TradeClosedEvent) -> Result<(), TrendfilterError>;

    fn summary(&mut self, summary: &RunSummary) -> Result<(), TrendfilterError>;
}

/// Discards everything. Useful when only the returned result matters.
#[derive(Debug, Default)]
pub struct NullReporter;

impl ReportPort for NullReporter {
    fn trade_closed(&mut self, _event: &TradeClosedEvent) -> Result<(), TrendfilterError> {
        Ok(())
    }

    fn summary(&mut self, _summary: &RunSummary) -> Result<(), TrendfilterError> {
        Ok(())
    }
}
