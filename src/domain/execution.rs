//! Trade execution and fill simulation.
//!
//! A simulated broker that turns controller decisions into fills with
//! slippage and commissions, and reports each outcome back as a
//! [`FillReport`] so the controller can commit or discard the decision.

use chrono::NaiveDateTime;
use std::fmt;
use std::str::FromStr;

use super::controller::{Decision, ExitReason};
use super::ohlcv::Bar;
use super::portfolio::Portfolio;
use super::position::{ClosedTrade, Position};

/// When a submitted decision is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillPolicy {
    /// Fill at the open of the bar after the decision.
    NextOpen,
    /// Fill at the close of the decision bar.
    CurrentClose,
}

impl FillPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            FillPolicy::NextOpen => "next_open",
            FillPolicy::CurrentClose => "current_close",
        }
    }
}

impl fmt::Display for FillPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FillPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "next_open" => Ok(FillPolicy::NextOpen),
            "current_close" => Ok(FillPolicy::CurrentClose),
            other => Err(format!(
                "unknown fill policy '{other}' (expected next_open or current_close)"
            )),
        }
    }
}

/// Configuration for backtest execution parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionConfig {
    pub commission_per_trade: f64,
    /// Percent of notional, so 0.1 means 0.1 %.
    pub commission_pct: f64,
    pub slippage_pct: f64,
    pub fill_policy: FillPolicy,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        ExecutionConfig {
            commission_per_trade: 0.0,
            commission_pct: 0.1,
            slippage_pct: 0.0,
            fill_policy: FillPolicy::NextOpen,
        }
    }
}

/// Outcome of executing one decision, as seen by the controller.
#[derive(Debug, Clone, PartialEq)]
pub struct FillReport {
    pub filled: bool,
    pub price: f64,
    pub size: i64,
    pub timestamp: NaiveDateTime,
    pub commission: f64,
}

impl FillReport {
    pub fn rejected(timestamp: NaiveDateTime) -> Self {
        FillReport {
            filled: false,
            price: 0.0,
            size: 0,
            timestamp,
            commission: 0.0,
        }
    }
}

/// Calculate commission: flat_fee + (trade_value * pct / 100).
pub fn calculate_commission(trade_value: f64, config: &ExecutionConfig) -> f64 {
    config.commission_per_trade + (trade_value * config.commission_pct / 100.0)
}

/// Long entry (buy): execution_price = market_price * (1 + slippage_pct / 100)
pub fn apply_slippage_long_entry(market_price: f64, slippage_pct: f64) -> f64 {
    market_price * (1.0 + slippage_pct / 100.0)
}

/// Long exit (sell): execution_price = market_price * (1 - slippage_pct / 100)
pub fn apply_slippage_long_exit(market_price: f64, slippage_pct: f64) -> f64 {
    market_price * (1.0 - slippage_pct / 100.0)
}

/// Result of an entry attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryResult {
    Entered {
        quantity: i64,
        execution_price: f64,
        cost: f64,
        commission: f64,
    },
    InsufficientCapital,
    AlreadyOpen,
}

/// Buy `quantity` shares at `market_price` plus slippage.
///
/// Rejected when cost plus commission exceeds available cash, or when a
/// position is already open.
pub fn enter_long(
    portfolio: &mut Portfolio,
    symbol: &str,
    quantity: i64,
    market_price: f64,
    time: NaiveDateTime,
    config: &ExecutionConfig,
) -> EntryResult {
    if portfolio.has_position() {
        return EntryResult::AlreadyOpen;
    }
    if quantity <= 0 || !market_price.is_finite() || market_price <= 0.0 {
        return EntryResult::InsufficientCapital;
    }

    let execution_price = apply_slippage_long_entry(market_price, config.slippage_pct);
    let cost = quantity as f64 * execution_price;
    let commission = calculate_commission(cost, config);
    let total_cost = cost + commission;

    if total_cost > portfolio.cash {
        return EntryResult::InsufficientCapital;
    }

    portfolio.cash -= total_cost;
    portfolio.position = Some(Position {
        symbol: symbol.to_string(),
        quantity,
        entry_price: execution_price,
        entry_time: time,
        entry_commission: commission,
    });

    EntryResult::Entered {
        quantity,
        execution_price,
        cost,
        commission,
    }
}

/// Result of an exit.
#[derive(Debug, Clone, PartialEq)]
pub struct ExitResult {
    pub quantity: i64,
    pub exit_price: f64,
    pub exit_value: f64,
    pub exit_commission: f64,
    pub trade: ClosedTrade,
}

/// Sell the whole open position and record the closed trade.
///
/// PnL is net of both entry and exit commissions.
pub fn exit_position(
    portfolio: &mut Portfolio,
    market_price: f64,
    exit_time: NaiveDateTime,
    reason: ExitReason,
    config: &ExecutionConfig,
) -> Option<ExitResult> {
    if !market_price.is_finite() || market_price <= 0.0 {
        return None;
    }
    let position = portfolio.position.take()?;

    let exit_price = apply_slippage_long_exit(market_price, config.slippage_pct);
    let exit_value = position.quantity as f64 * exit_price;
    let exit_commission = calculate_commission(exit_value, config);

    let price_pnl = position.quantity as f64 * (exit_price - position.entry_price);
    let pnl = price_pnl - position.entry_commission - exit_commission;

    portfolio.cash += exit_value - exit_commission;

    let trade = ClosedTrade {
        symbol: position.symbol.clone(),
        quantity: position.quantity,
        entry_price: position.entry_price,
        exit_price,
        entry_time: position.entry_time,
        exit_time,
        pnl,
        commission: position.entry_commission + exit_commission,
        exit_reason: reason,
    };
    portfolio.record_trade(trade.clone());

    Some(ExitResult {
        quantity: position.quantity,
        exit_price,
        exit_value,
        exit_commission,
        trade,
    })
}

/// One executed (or rejected) decision.
#[derive(Debug, Clone, PartialEq)]
pub struct Execution {
    pub decision: Decision,
    pub report: FillReport,
    pub closed_trade: Option<ClosedTrade>,
}

/// Broker simulation holding at most one working order.
#[derive(Debug, Clone)]
pub struct SimulatedBroker {
    config: ExecutionConfig,
    pending: Option<Decision>,
}

impl SimulatedBroker {
    pub fn new(config: ExecutionConfig) -> Self {
        SimulatedBroker {
            config,
            pending: None,
        }
    }

    pub fn pending(&self) -> Option<&Decision> {
        self.pending.as_ref()
    }

    /// Accept a decision made on `bar`.
    ///
    /// Under `CurrentClose` it executes immediately at the bar's close;
    /// under `NextOpen` it is queued for [`SimulatedBroker::on_bar_open`].
    /// `NoAction` is ignored.
    pub fn submit(
        &mut self,
        decision: Decision,
        bar: &Bar,
        portfolio: &mut Portfolio,
    ) -> Option<Execution> {
        if decision == Decision::NoAction {
            return None;
        }
        match self.config.fill_policy {
            FillPolicy::CurrentClose => Some(self.execute(decision, bar, bar.close, portfolio)),
            FillPolicy::NextOpen => {
                self.pending = Some(decision);
                None
            }
        }
    }

    /// Fill the queued order, if any, at this bar's open.
    pub fn on_bar_open(&mut self, bar: &Bar, portfolio: &mut Portfolio) -> Option<Execution> {
        let decision = self.pending.take()?;
        Some(self.execute(decision, bar, bar.open, portfolio))
    }

    fn execute(
        &self,
        decision: Decision,
        bar: &Bar,
        market_price: f64,
        portfolio: &mut Portfolio,
    ) -> Execution {
        let rejected = FillReport::rejected(bar.timestamp);
        match decision {
            Decision::EnterLong { size, .. } => {
                let report = match enter_long(
                    portfolio,
                    &bar.symbol,
                    size,
                    market_price,
                    bar.timestamp,
                    &self.config,
                ) {
                    EntryResult::Entered {
                        quantity,
                        execution_price,
                        commission,
                        ..
                    } => FillReport {
                        filled: true,
                        price: execution_price,
                        size: quantity,
                        timestamp: bar.timestamp,
                        commission,
                    },
                    EntryResult::InsufficientCapital | EntryResult::AlreadyOpen => rejected,
                };
                Execution {
                    decision,
                    report,
                    closed_trade: None,
                }
            }
            Decision::ExitPosition(reason) => {
                match exit_position(portfolio, market_price, bar.timestamp, reason, &self.config)
                {
                    Some(exit) => Execution {
                        decision,
                        report: FillReport {
                            filled: true,
                            price: exit.exit_price,
                            size: exit.quantity,
                            timestamp: bar.timestamp,
                            commission: exit.exit_commission,
                        },
                        closed_trade: Some(exit.trade),
                    },
                    None => Execution {
                        decision,
                        report: rejected,
                        closed_trade: None,
                    },
                }
            }
            Decision::NoAction => Execution {
                decision,
                report: rejected,
                closed_trade: None,
            },
        }
    }
}
