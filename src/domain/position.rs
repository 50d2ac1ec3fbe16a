//! Open position and closed trade records.

use chrono::NaiveDateTime;
use std::fmt;

use super::controller::ExitReason;

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub symbol: String,
    pub quantity: i64,
    pub entry_price: f64,
    pub entry_time: NaiveDateTime,
    pub entry_commission: f64,
}

impl Position {
    pub fn market_value(&self, price: f64) -> f64 {
        self.quantity as f64 * price
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.quantity as f64 * (price - self.entry_price)
    }

    pub fn entry_notional(&self) -> f64 {
        self.quantity as f64 * self.entry_price
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeOutcome {
    Win,
    Loss,
}

impl fmt::Display for TradeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeOutcome::Win => f.write_str("WIN"),
            TradeOutcome::Loss => f.write_str("LOSS"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClosedTrade {
    pub symbol: String,
    pub quantity: i64,
    pub entry_price: f64,
    pub exit_price: f64,
    pub entry_time: NaiveDateTime,
    pub exit_time: NaiveDateTime,
    /// Net of entry and exit commissions.
    pub pnl: f64,
    pub commission: f64,
    pub exit_reason: ExitReason,
}

impl ClosedTrade {
    pub fn gross_pnl(&self) -> f64 {
        self.pnl + self.commission
    }

    /// Net P&L relative to entry notional, in percent.
    pub fn pnl_percent(&self) -> f64 {
        let notional = (self.entry_price * self.quantity as f64).abs();
        if notional > 0.0 {
            self.pnl / notional * 100.0
        } else {
            0.0
        }
    }

    pub fn outcome(&self) -> TradeOutcome {
        if self.pnl > 0.0 {
            TradeOutcome::Win
        } else {
            TradeOutcome::Loss
        }
    }

    pub fn duration(&self) -> chrono::Duration {
        self.exit_time - self.entry_time
    }
}
