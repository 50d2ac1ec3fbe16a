//! Technical indicator implementations.
//!
//! - `IndicatorPoint`: A single point in an indicator time series
//! - `IndicatorType`: Indicator identity + parameters
//! - `IndicatorSeries`: A time series of indicator values
//! - `IndicatorSet` / `IndicatorSnapshot`: the three series the controller
//!   reads, and the two-bar view it is handed on each bar

pub mod atr;
pub mod ema;
pub mod snapshot;

pub use snapshot::{IndicatorFrame, IndicatorSet, IndicatorSnapshot};

use chrono::NaiveDateTime;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorPoint {
    pub timestamp: NaiveDateTime,
    pub valid: bool,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorType {
    Ema(usize),
    Atr(usize),
}

impl IndicatorType {
    pub fn period(&self) -> usize {
        match self {
            IndicatorType::Ema(period) | IndicatorType::Atr(period) => *period,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<IndicatorPoint>,
}

impl IndicatorSeries {
    pub fn empty(indicator_type: IndicatorType) -> Self {
        IndicatorSeries {
            indicator_type,
            values: Vec::new(),
        }
    }

    /// Value at `index`, or `None` during warmup, past the end, or when non-finite.
    pub fn value_at(&self, index: usize) -> Option<f64> {
        self.values
            .get(index)
            .filter(|p| p.valid && p.value.is_finite())
            .map(|p| p.value)
    }

    /// Index of the first valid point.
    pub fn first_valid(&self) -> Option<usize> {
        self.values.iter().position(|p| p.valid)
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Ema(period) => write!(f, "EMA({})", period),
            IndicatorType::Atr(period) => write!(f, "ATR({})", period),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn indicator_type_display() {
        assert_eq!(IndicatorType::Ema(50).to_string(), "EMA(50)");
        assert_eq!(IndicatorType::Atr(14).to_string(), "ATR(14)");
    }

    #[test]
    fn indicator_type_period() {
        assert_eq!(IndicatorType::Ema(200).period(), 200);
        assert_eq!(IndicatorType::Atr(14).period(), 14);
    }

    #[test]
    fn value_at_skips_invalid_and_non_finite() {
        let series = IndicatorSeries {
            indicator_type: IndicatorType::Ema(2),
            values: vec![
                IndicatorPoint {
                    timestamp: ts(1),
                    valid: false,
                    value: 0.0,
                },
                IndicatorPoint {
                    timestamp: ts(2),
                    valid: true,
                    value: 10.0,
                },
                IndicatorPoint {
                    timestamp: ts(3),
                    valid: true,
                    value: f64::NAN,
                },
            ],
        };

        assert_eq!(series.value_at(0), None);
        assert_eq!(series.value_at(1), Some(10.0));
        assert_eq!(series.value_at(2), None);
        assert_eq!(series.value_at(3), None);
        assert_eq!(series.first_valid(), Some(1));
    }
}
