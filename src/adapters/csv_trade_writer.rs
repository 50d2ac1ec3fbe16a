//! Closed-trade export to CSV.

use std::io::Write;
use std::path::Path;

use crate::domain::error::TrendfilterError;
use crate::domain::position::ClosedTrade;

const HEADER: [&str; 11] = [
    "trade",
    "symbol",
    "entry_time",
    "exit_time",
    "quantity",
    "entry_price",
    "exit_price",
    "commission",
    "pnl",
    "pnl_pct",
    "exit_reason",
];

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn csv_error(e: csv::Error) -> TrendfilterError {
    match e.into_kind() {
        csv::ErrorKind::Io(io) => TrendfilterError::Io(io),
        other => TrendfilterError::Io(std::io::Error::other(format!("{other:?}"))),
    }
}

/// Writes one row per trade, numbered from 1 in closing order.
pub fn write_trades<W: Write>(out: W, trades: &[ClosedTrade]) -> Result<(), TrendfilterError> {
    let mut wtr = csv::Writer::from_writer(out);
    wtr.write_record(HEADER).map_err(csv_error)?;

    for (i, trade) in trades.iter().enumerate() {
        wtr.write_record([
            (i + 1).to_string(),
            trade.symbol.clone(),
            trade.entry_time.format(TIME_FORMAT).to_string(),
            trade.exit_time.format(TIME_FORMAT).to_string(),
            trade.quantity.to_string(),
            format!("{:.4}", trade.entry_price),
            format!("{:.4}", trade.exit_price),
            format!("{:.2}", trade.commission),
            format!("{:.2}", trade.pnl),
            format!("{:.4}", trade.pnl_percent()),
            trade.exit_reason.to_string(),
        ])
        .map_err(csv_error)?;
    }

    wtr.flush()?;
    Ok(())
}

pub fn write_trades_to_file(path: &Path, trades: &[ClosedTrade]) -> Result<(), TrendfilterError> {
    let file = std::fs::File::create(path)?;
    write_trades(std::io::BufWriter::new(file), trades)
}
