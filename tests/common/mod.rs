#![allow(dead_code)]

use chrono::{Duration, NaiveDate, NaiveDateTime};
use std::collections::HashMap;
use trendfilter::domain::backtest::{BacktestConfig, BarInterval};
use trendfilter::domain::controller::ControllerParams;
use trendfilter::domain::error::TrendfilterError;
use trendfilter::domain::execution::FillPolicy;
pub use trendfilter::domain::ohlcv::Bar;
use trendfilter::ports::data_port::DataPort;
use trendfilter::ports::report_port::{ReportPort, RunSummary, TradeClosedEvent};

pub struct MockDataPort {
    pub data: HashMap<String, Vec<Bar>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<Bar>) -> Self {
        self.data.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_bars(
        &self,
        symbol: &str,
        _interval: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<Bar>, TrendfilterError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(TrendfilterError::DataSource {
                reason: reason.clone(),
            });
        }
        Ok(self
            .data
            .get(symbol)
            .map(|bars| {
                bars.iter()
                    .filter(|b| b.timestamp.date() >= start_date && b.timestamp.date() <= end_date)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn data_range(
        &self,
        symbol: &str,
        _interval: &str,
    ) -> Result<Option<(NaiveDateTime, NaiveDateTime, usize)>, TrendfilterError> {
        Ok(self.data.get(symbol).and_then(|bars| {
            let first = bars.first()?.timestamp;
            let last = bars.last()?.timestamp;
            Some((first, last, bars.len()))
        }))
    }
}

/// Collects everything the run reports.
#[derive(Default)]
pub struct RecordingReporter {
    pub trades: Vec<TradeClosedEvent>,
    pub summaries: Vec<RunSummary>,
}

impl ReportPort for RecordingReporter {
    fn trade_closed(&mut self, event: &TradeClosedEvent) -> Result<(), TrendfilterError> {
        self.trades.push(event.clone());
        Ok(())
    }

    fn summary(&mut self, summary: &RunSummary) -> Result<(), TrendfilterError> {
        self.summaries.push(summary.clone());
        Ok(())
    }
}

pub fn day(offset: usize) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 2)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        + Duration::days(offset as i64)
}

/// One bar per day; high and low sit `spread` either side of the close.
pub fn make_bars(symbol: &str, closes: &[f64], spread: f64) -> Vec<Bar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| Bar {
            symbol: symbol.to_string(),
            timestamp: day(i),
            open: close,
            high: close + spread,
            low: close - spread,
            close,
            volume: 1_000_000.0,
        })
        .collect()
}

/// Like `make_bars` but with explicit opens, for gap scenarios.
pub fn make_bars_with_opens(symbol: &str, opens: &[f64], closes: &[f64], spread: f64) -> Vec<Bar> {
    make_bars(symbol, closes, spread)
        .into_iter()
        .zip(opens)
        .map(|(mut bar, &open)| {
            bar.open = open;
            bar.high = bar.high.max(open);
            bar.low = bar.low.min(open);
            bar
        })
        .collect()
}

/// Flat at 10 for six bars, then a steady climb from 11 to 20 and a drop.
///
/// With fast 2 / slow 4 the golden cross lands on bar 6 (close 11) and the
/// fast average falls back under the slow one on bar 17 (close 15).
pub fn rally_then_drop() -> Vec<f64> {
    let mut closes = vec![10.0; 6];
    closes.extend((11..=20).map(f64::from));
    closes.extend([18.0, 15.0, 12.0]);
    closes
}

pub fn small_params() -> ControllerParams {
    ControllerParams {
        fast_window: 2,
        slow_window: 4,
        position_fraction: 0.5,
        volatility_window: 2,
        stop_multiplier: 8.0,
    }
}

pub fn sample_config(fill_policy: FillPolicy) -> BacktestConfig {
    BacktestConfig {
        symbol: "SPY".to_string(),
        interval: BarInterval::Day1,
        start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        end_date: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
        initial_capital: 100_000.0,
        commission_per_trade: 0.0,
        commission_pct: 0.0,
        slippage_pct: 0.0,
        fill_policy,
        risk_free_rate: 0.0,
    }
}
