//! Data access port trait.

use crate::domain::error::TrendfilterError;
use crate::domain::ohlcv::Bar;
use chrono::{NaiveDate, NaiveDateTime};

pub trait DataPort {
    /// Bars for `symbol` at `interval` whose date falls in `[start_date, end_date]`,
    /// sorted by timestamp with duplicates removed.
    fn fetch_bars(
        &self,
        symbol: &str,
        interval: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<Bar>, TrendfilterError>;

    /// First timestamp, last timestamp and bar count, or `None` when empty.
    fn data_range(
        &self,
        symbol: &str,
        interval: &str,
    ) -> Result<Option<(NaiveDateTime, NaiveDateTime, usize)>, TrendfilterError>;
}
