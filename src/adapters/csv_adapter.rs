//! CSV file data adapter.
//!
//! Reads `{SYMBOL}_{interval}.csv` from a base directory. Columns are located
//! by header name (case-insensitive): a timestamp column named `timestamp`,
//! `datetime` or `date`, then `open`, `high`, `low`, `close` and an optional
//! `volume`. Extra columns are ignored.

use crate::domain::error::TrendfilterError;
use crate::domain::ohlcv::Bar;
use crate::ports::data_port::DataPort;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::fs;
use std::path::PathBuf;
use tracing::{debug, warn};

pub struct CsvAdapter {
    base_path: PathBuf,
}

struct Columns {
    timestamp: usize,
    open: usize,
    high: usize,
    low: usize,
    close: usize,
    volume: Option<usize>,
}

impl Columns {
    fn from_headers(headers: &csv::StringRecord) -> Result<Self, TrendfilterError> {
        let find = |names: &[&str]| {
            headers
                .iter()
                .position(|h| names.iter().any(|n| h.trim().eq_ignore_ascii_case(n)))
        };
        let require = |names: &[&str]| {
            find(names).ok_or_else(|| TrendfilterError::DataSource {
                reason: format!("missing {} column", names[0]),
            })
        };

        Ok(Columns {
            timestamp: require(&["timestamp", "datetime", "date"])?,
            open: require(&["open"])?,
            high: require(&["high"])?,
            low: require(&["low"])?,
            close: require(&["close"])?,
            volume: find(&["volume"]),
        })
    }
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str, interval: &str) -> PathBuf {
        self.base_path.join(format!("{}_{}.csv", symbol, interval))
    }

    fn read_all(&self, symbol: &str, interval: &str) -> Result<Vec<Bar>, TrendfilterError> {
        let path = self.csv_path(symbol, interval);
        let content = fs::read_to_string(&path).map_err(|e| TrendfilterError::DataSource {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let headers = rdr.headers().map_err(|e| TrendfilterError::DataSource {
            reason: format!("CSV header error: {}", e),
        })?;
        let columns = Columns::from_headers(headers)?;

        let mut bars = Vec::new();
        let mut skipped = 0usize;

        for (line, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| TrendfilterError::DataSource {
                reason: format!("CSV parse error: {}", e),
            })?;

            let raw_ts = record.get(columns.timestamp).unwrap_or_default();
            let timestamp = parse_timestamp(raw_ts).ok_or_else(|| TrendfilterError::DataSource {
                reason: format!("invalid timestamp '{}' on row {}", raw_ts, line + 1),
            })?;

            let field = |idx: usize| -> f64 {
                record
                    .get(idx)
                    .and_then(|v| v.trim().parse::<f64>().ok())
                    .unwrap_or(f64::NAN)
            };

            let bar = Bar {
                symbol: symbol.to_string(),
                timestamp,
                open: field(columns.open),
                high: field(columns.high),
                low: field(columns.low),
                close: field(columns.close),
                volume: columns.volume.map(field).unwrap_or(0.0),
            };

            if !bar.is_well_formed() {
                skipped += 1;
                continue;
            }
            bars.push(bar);
        }

        if skipped > 0 {
            warn!(symbol, interval, skipped, "dropped rows with missing or non-positive prices");
        }

        bars.sort_by_key(|b| b.timestamp);
        let before = bars.len();
        bars.dedup_by_key(|b| b.timestamp);
        if bars.len() < before {
            debug!(symbol, duplicates = before - bars.len(), "dropped duplicate timestamps");
        }

        Ok(bars)
    }
}

/// Accepts `YYYY-MM-DD`, `YYYY-MM-DD HH:MM[:SS]`, the `T`-separated forms,
/// and any of those followed by a UTC offset (the offset is dropped, keeping
/// exchange-local time).
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();

    const NAIVE: [&str; 4] = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ];
    for fmt in NAIVE {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(ts);
        }
    }

    const OFFSET: [&str; 2] = ["%Y-%m-%d %H:%M:%S%:z", "%Y-%m-%dT%H:%M:%S%:z"];
    for fmt in OFFSET {
        if let Ok(ts) = DateTime::parse_from_str(raw, fmt) {
            return Some(ts.naive_local());
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

impl DataPort for CsvAdapter {
    fn fetch_bars(
        &self,
        symbol: &str,
        interval: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<Bar>, TrendfilterError> {
        let bars = self
            .read_all(symbol, interval)?
            .into_iter()
            .filter(|b| {
                let date = b.timestamp.date();
                date >= start_date && date <= end_date
            })
            .collect();
        Ok(bars)
    }

    fn data_range(
        &self,
        symbol: &str,
        interval: &str,
    ) -> Result<Option<(NaiveDateTime, NaiveDateTime, usize)>, TrendfilterError> {
        let bars = self.read_all(symbol, interval)?;
        Ok(match (bars.first(), bars.last()) {
            (Some(first), Some(last)) => Some((first.timestamp, last.timestamp, bars.len())),
            _ => None,
        })
    }
}
