//! Plain-text console reporting.

use std::io::Write;

use crate::domain::error::TrendfilterError;
use crate::ports::report_port::{ReportPort, RunSummary, TradeClosedEvent};

const RULE_WIDTH: usize = 60;

/// Writes one line per closed trade and a results block at the end.
pub struct ConsoleReportAdapter<W: Write> {
    out: W,
}

impl ConsoleReportAdapter<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> ConsoleReportAdapter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

/// `1234567.891` → `1,234,567.89`, sign kept, always two decimals.
pub fn format_money(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    let fixed = format!("{:.2}", value.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if value < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("{sign}{grouped}.{frac_part}")
}

fn signed_money(value: f64) -> String {
    if value >= 0.0 {
        format!("+${}", format_money(value))
    } else {
        format!("-${}", format_money(value.abs()))
    }
}

impl<W: Write> ReportPort for ConsoleReportAdapter<W> {
    fn trade_closed(&mut self, event: &TradeClosedEvent) -> Result<(), TrendfilterError> {
        writeln!(
            self.out,
            "Trade #{} [{}] | P&L: ${:.2} ({:.2}%) | {}",
            event.trade_number, event.outcome, event.pnl, event.pnl_percent, event.exit_reason
        )?;
        Ok(())
    }

    fn summary(&mut self, s: &RunSummary) -> Result<(), TrendfilterError> {
        let rule = "=".repeat(RULE_WIDTH);
        let out = &mut self.out;

        writeln!(out)?;
        writeln!(out, "{rule}")?;
        writeln!(out, "RESULTS: {} ({} bars)", s.symbol, s.bars_processed)?;
        writeln!(out, "{rule}")?;

        writeln!(out, "\nPortfolio:")?;
        writeln!(out, "  Starting: ${}", format_money(s.starting_value))?;
        writeln!(out, "  Final: ${}", format_money(s.final_value))?;
        writeln!(out, "  Return: {:+.2}%", s.total_return_pct)?;
        writeln!(out, "  Annualized: {:+.2}%", s.annualized_return_pct)?;
        writeln!(out, "  P&L: {}", signed_money(s.pnl()))?;

        writeln!(out, "\nRisk:")?;
        writeln!(out, "  Sharpe Ratio: {:.2}", s.sharpe_ratio)?;
        writeln!(out, "  Sortino Ratio: {:.2}", s.sortino_ratio)?;
        writeln!(
            out,
            "  Max Drawdown: {:.2}% over {} bars",
            s.max_drawdown_pct, s.max_drawdown_bars
        )?;

        writeln!(out, "\nTrades: {}", s.total_trades)?;
        if s.total_trades > 0 {
            writeln!(out, "  Won: {} | Lost: {}", s.won, s.lost)?;
            writeln!(out, "  Win Rate: {:.2}%", s.win_rate * 100.0)?;
            if s.profit_factor.is_infinite() {
                writeln!(out, "  Profit Factor: inf")?;
            } else {
                writeln!(out, "  Profit Factor: {:.2}", s.profit_factor)?;
            }
        }
        if s.rejected_fills > 0 {
            writeln!(out, "  Rejected orders: {}", s.rejected_fills)?;
        }
        if let Some(open) = &s.open_position {
            writeln!(
                out,
                "  Open: {} @ ${:.2} (last ${:.2}, unrealized {})",
                open.quantity,
                open.entry_price,
                open.last_close,
                signed_money(open.unrealized_pnl)
            )?;
        }

        writeln!(out, "\n{rule}")?;
        out.flush()?;
        Ok(())
    }
}
