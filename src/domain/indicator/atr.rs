//! Average True Range with Wilder smoothing.
//!
//! The first bar's true range is high - low. Seed is the simple mean of the
//! first `period` true ranges, then ATR[i] = (ATR[i-1]*(n-1) + TR[i]) / n.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::Bar;

pub fn calculate_atr(bars: &[Bar], period: usize) -> IndicatorSeries {
    if period == 0 || bars.is_empty() {
        return IndicatorSeries::empty(IndicatorType::Atr(period));
    }

    let tr_values: Vec<f64> = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            if i == 0 {
                bar.high - bar.low
            } else {
                bar.true_range(bars[i - 1].close)
            }
        })
        .collect();

    let mut results: Vec<IndicatorPoint> = Vec::with_capacity(bars.len());
    let mut atr = 0.0;

    for (i, bar) in bars.iter().enumerate() {
        if i < period - 1 {
            results.push(IndicatorPoint {
                timestamp: bar.timestamp,
                valid: false,
                value: 0.0,
            });
            continue;
        }

        atr = if i == period - 1 {
            tr_values[0..=i].iter().sum::<f64>() / period as f64
        } else {
            (atr * (period - 1) as f64 + tr_values[i]) / period as f64
        };
        results.push(IndicatorPoint {
            timestamp: bar.timestamp,
            valid: true,
            value: atr,
        });
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Atr(period),
        values: results,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn make_bar(day: u32, high: f64, low: f64, close: f64) -> Bar {
        Bar {
            symbol: "TEST".into(),
            timestamp: NaiveDate::from_ymd_opt(2024, 1, day)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            open: close,
            high,
            low,
            close,
            volume: 1000.0,
        }
    }

    fn rising_bars() -> Vec<Bar> {
        vec![
            make_bar(1, 110.0, 100.0, 105.0),
            make_bar(2, 115.0, 105.0, 110.0),
            make_bar(3, 120.0, 110.0, 115.0),
            make_bar(4, 125.0, 115.0, 120.0),
        ]
    }

    #[test]
    fn atr_warmup() {
        let bars: Vec<Bar> = (1..=5).map(|d| make_bar(d, 110.0, 90.0, 100.0)).collect();
        let series = calculate_atr(&bars, 3);

        assert_eq!(series.values.len(), 5);
        assert!(!series.values[0].valid);
        assert!(!series.values[1].valid);
        assert!(series.values[2].valid);
        assert!(series.values[4].valid);
    }

    #[test]
    fn atr_seed_is_average() {
        let series = calculate_atr(&rising_bars()[..3], 3);
        let expected = (10.0 + 10.0 + 10.0) / 3.0;
        assert!((series.value_at(2).unwrap() - expected).abs() < 1e-9);
    }

    #[test]
    fn atr_wilder_smoothing() {
        let series = calculate_atr(&rising_bars(), 3);
        let seed = 10.0;
        let expected = (seed * 2.0 + 10.0) / 3.0;
        assert!((series.value_at(3).unwrap() - expected).abs() < 1e-9);
    }

    #[test]
    fn atr_uses_gap_from_previous_close() {
        let bars = vec![
            make_bar(1, 110.0, 100.0, 105.0),
            make_bar(2, 130.0, 120.0, 125.0),
        ];
        let series = calculate_atr(&bars, 2);
        // TR0 = 10, TR1 = max(10, |130-105|, |120-105|) = 25
        assert!((series.value_at(1).unwrap() - 17.5).abs() < 1e-9);
    }

    #[test]
    fn atr_insufficient_bars_stays_invalid() {
        let bars: Vec<Bar> = (1..=2).map(|d| make_bar(d, 110.0, 90.0, 100.0)).collect();
        let series = calculate_atr(&bars, 5);
        assert_eq!(series.values.len(), 2);
        assert_eq!(series.first_valid(), None);
    }
}
