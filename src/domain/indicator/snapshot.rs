//! The indicator view handed to the position controller on each bar.

use crate::domain::indicator::atr::calculate_atr;
use crate::domain::indicator::ema::calculate_ema;
use crate::domain::indicator::IndicatorSeries;
use crate::domain::ohlcv::Bar;

/// Indicator values at one bar. `None` while an indicator is still warming up.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct IndicatorFrame {
    pub fast_avg: Option<f64>,
    pub slow_avg: Option<f64>,
    pub volatility_range: Option<f64>,
}

impl IndicatorFrame {
    pub fn new(fast_avg: f64, slow_avg: f64, volatility_range: f64) -> Self {
        IndicatorFrame {
            fast_avg: Some(fast_avg),
            slow_avg: Some(slow_avg),
            volatility_range: Some(volatility_range),
        }
    }

    /// All three values present and finite.
    pub fn resolved(&self) -> Option<(f64, f64, f64)> {
        let fast = self.fast_avg.filter(|v| v.is_finite())?;
        let slow = self.slow_avg.filter(|v| v.is_finite())?;
        let range = self.volatility_range.filter(|v| v.is_finite())?;
        Some((fast, slow, range))
    }
}

/// Current bar (t) and the immediately preceding bar (t-1).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct IndicatorSnapshot {
    pub current: IndicatorFrame,
    pub previous: IndicatorFrame,
}

/// Fast EMA, slow EMA and ATR series aligned index-for-index with the bars.
#[derive(Debug, Clone)]
pub struct IndicatorSet {
    pub fast: IndicatorSeries,
    pub slow: IndicatorSeries,
    pub volatility: IndicatorSeries,
}

impl IndicatorSet {
    pub fn compute(
        bars: &[Bar],
        fast_window: usize,
        slow_window: usize,
        volatility_window: usize,
    ) -> Self {
        IndicatorSet {
            fast: calculate_ema(bars, fast_window),
            slow: calculate_ema(bars, slow_window),
            volatility: calculate_atr(bars, volatility_window),
        }
    }

    pub fn frame(&self, index: usize) -> IndicatorFrame {
        IndicatorFrame {
            fast_avg: self.fast.value_at(index),
            slow_avg: self.slow.value_at(index),
            volatility_range: self.volatility.value_at(index),
        }
    }

    /// Snapshot for bar `index`. Reads only `index` and `index - 1`.
    pub fn snapshot(&self, index: usize) -> IndicatorSnapshot {
        let previous = match index.checked_sub(1) {
            Some(prev) => self.frame(prev),
            None => IndicatorFrame::default(),
        };
        IndicatorSnapshot {
            current: self.frame(index),
            previous,
        }
    }
}

/// Bars needed before the first snapshot has both frames defined.
pub fn warmup_bars(fast_window: usize, slow_window: usize, volatility_window: usize) -> usize {
    fast_window.max(slow_window).max(volatility_window) + 1
}
