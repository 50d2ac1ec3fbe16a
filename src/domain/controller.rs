//! Trend-filtered position controller.
//!
//! Decides, bar by bar, whether to enter long, exit, or hold. Entries fire on
//! a golden cross (fast EMA crossing above slow EMA), exits on a trend
//! reversal (fast below slow) or a fixed ATR stop set at entry.
//!
//! Decision and commitment are separate steps: [`PositionController::on_bar`]
//! only reads state, and [`PositionController::apply_fill`] commits a decision
//! once the execution side reports it filled.

use std::fmt;

use super::execution::FillReport;
use super::indicator::IndicatorSnapshot;
use super::ohlcv::Bar;

#[derive(Debug, Clone, PartialEq)]
pub struct ControllerParams {
    pub fast_window: usize,
    pub slow_window: usize,
    /// Fraction of portfolio value committed on entry.
    pub position_fraction: f64,
    pub volatility_window: usize,
    /// Multiple of ATR subtracted from the entry close to place the stop.
    pub stop_multiplier: f64,
}

impl Default for ControllerParams {
    fn default() -> Self {
        ControllerParams {
            fast_window: 50,
            slow_window: 200,
            position_fraction: 0.95,
            volatility_window: 14,
            stop_multiplier: 8.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PositionState {
    pub is_open: bool,
    pub entry_price: Option<f64>,
    pub stop_price: Option<f64>,
    pub trade_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    TrendReversal,
    StopLoss,
}

impl ExitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitReason::TrendReversal => "trend-reversal",
            ExitReason::StopLoss => "stop-loss",
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    NoAction,
    /// Buy `size` whole shares. `stop_price` is committed when the fill is confirmed.
    EnterLong { size: i64, stop_price: f64 },
    ExitPosition(ExitReason),
}

#[derive(Debug, Clone)]
pub struct PositionController {
    params: ControllerParams,
    state: PositionState,
}

impl PositionController {
    pub fn new(params: ControllerParams) -> Self {
        PositionController {
            params,
            state: PositionState::default(),
        }
    }

    pub fn params(&self) -> &ControllerParams {
        &self.params
    }

    pub fn state(&self) -> &PositionState {
        &self.state
    }

    /// Evaluate one bar. Never mutates state.
    ///
    /// Returns `NoAction` when any indicator at t or t-1 is undefined or
    /// non-finite, or when the close or portfolio value is unusable.
    pub fn on_bar(
        &self,
        bar: &Bar,
        snapshot: &IndicatorSnapshot,
        portfolio_value: f64,
    ) -> Decision {
        let Some((fast, slow, range)) = snapshot.current.resolved() else {
            return Decision::NoAction;
        };
        let Some((prev_fast, prev_slow, _)) = snapshot.previous.resolved() else {
            return Decision::NoAction;
        };
        let close = bar.close;
        if !close.is_finite() || close <= 0.0 || !portfolio_value.is_finite() {
            return Decision::NoAction;
        }

        if self.state.is_open {
            if fast < slow {
                return Decision::ExitPosition(ExitReason::TrendReversal);
            }
            if let Some(stop) = self.state.stop_price {
                if close < stop {
                    return Decision::ExitPosition(ExitReason::StopLoss);
                }
            }
            return Decision::NoAction;
        }

        let golden_cross = fast > slow && prev_fast <= prev_slow;
        if !golden_cross {
            return Decision::NoAction;
        }

        let size = (portfolio_value * self.params.position_fraction / close).floor();
        if !size.is_finite() || size < 1.0 {
            return Decision::NoAction;
        }

        Decision::EnterLong {
            size: size as i64,
            stop_price: close - range * self.params.stop_multiplier,
        }
    }

    /// Commit `decision` if `fill` reports it executed. Rejections are ignored.
    pub fn apply_fill(&mut self, decision: &Decision, fill: &FillReport) {
        if !fill.filled {
            return;
        }
        match decision {
            Decision::EnterLong { stop_price, .. } => {
                self.state.is_open = true;
                self.state.entry_price = Some(fill.price);
                self.state.stop_price = Some(*stop_price);
                self.state.trade_count += 1;
            }
            Decision::ExitPosition(_) => {
                self.state.is_open = false;
                self.state.entry_price = None;
                self.state.stop_price = None;
            }
            Decision::NoAction => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::IndicatorFrame;
    use approx::assert_relative_eq;
    use chrono::{NaiveDate, NaiveDateTime};
    use proptest::prelude::*;

    fn ts() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(14, 30, 0)
            .unwrap()
    }

    fn bar(close: f64) -> Bar {
        Bar {
            symbol: "SPY".into(),
            timestamp: ts(),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1_000.0,
        }
    }

    fn snapshot(prev: (f64, f64), cur: (f64, f64), range: f64) -> IndicatorSnapshot {
        IndicatorSnapshot {
            current: IndicatorFrame::new(cur.0, cur.1, range),
            previous: IndicatorFrame::new(prev.0, prev.1, range),
        }
    }

    fn golden_cross(range: f64) -> IndicatorSnapshot {
        snapshot((99.0, 100.0), (101.0, 100.0), range)
    }

    fn filled(price: f64, size: i64) -> FillReport {
        FillReport {
            filled: true,
            price,
            size,
            timestamp: ts(),
            commission: 0.0,
        }
    }

    fn rejected() -> FillReport {
        FillReport::rejected(ts())
    }

    fn open_controller(entry_close: f64, range: f64) -> PositionController {
        let mut ctl = PositionController::new(ControllerParams::default());
        let decision = ctl.on_bar(&bar(entry_close), &golden_cross(range), 100_000.0);
        assert!(matches!(decision, Decision::EnterLong { .. }));
        ctl.apply_fill(&decision, &filled(entry_close, 1));
        ctl
    }

    #[test]
    fn defaults() {
        let p = ControllerParams::default();
        assert_eq!(p.fast_window, 50);
        assert_eq!(p.slow_window, 200);
        assert_eq!(p.volatility_window, 14);
        assert_relative_eq!(p.position_fraction, 0.95);
        assert_relative_eq!(p.stop_multiplier, 8.0);
        assert_eq!(PositionState::default().trade_count, 0);
        assert!(!PositionState::default().is_open);
    }

    #[test]
    fn cold_start_returns_no_action() {
        let ctl = PositionController::new(ControllerParams::default());
        let mut snap = golden_cross(2.0);
        snap.previous.slow_avg = None;
        assert_eq!(ctl.on_bar(&bar(100.0), &snap, 100_000.0), Decision::NoAction);

        let mut snap = golden_cross(2.0);
        snap.current.volatility_range = None;
        assert_eq!(ctl.on_bar(&bar(100.0), &snap, 100_000.0), Decision::NoAction);
        assert_eq!(ctl.state(), &PositionState::default());
    }

    #[test]
    fn malformed_input_returns_no_action() {
        let ctl = PositionController::new(ControllerParams::default());
        let mut snap = golden_cross(2.0);
        snap.current.fast_avg = Some(f64::NAN);
        assert_eq!(ctl.on_bar(&bar(100.0), &snap, 100_000.0), Decision::NoAction);

        let snap = golden_cross(2.0);
        assert_eq!(ctl.on_bar(&bar(0.0), &snap, 100_000.0), Decision::NoAction);
        assert_eq!(ctl.on_bar(&bar(-5.0), &snap, 100_000.0), Decision::NoAction);
        assert_eq!(ctl.on_bar(&bar(f64::NAN), &snap, 100_000.0), Decision::NoAction);
        assert_eq!(ctl.on_bar(&bar(100.0), &snap, f64::NAN), Decision::NoAction);
    }

    #[test]
    fn entry_fires_on_cross_bar() {
        let ctl = PositionController::new(ControllerParams::default());
        let decision = ctl.on_bar(&bar(100.0), &golden_cross(1.0), 100_000.0);
        assert_eq!(
            decision,
            Decision::EnterLong {
                size: 950,
                stop_price: 92.0
            }
        );
    }

    #[test]
    fn entry_fires_when_previous_fast_equals_slow() {
        let ctl = PositionController::new(ControllerParams::default());
        let snap = snapshot((100.0, 100.0), (100.5, 100.0), 1.0);
        assert!(matches!(
            ctl.on_bar(&bar(100.0), &snap, 100_000.0),
            Decision::EnterLong { .. }
        ));
    }

    #[test]
    fn no_entry_in_established_uptrend() {
        let ctl = PositionController::new(ControllerParams::default());
        let snap = snapshot((102.0, 100.0), (103.0, 100.0), 1.0);
        assert_eq!(ctl.on_bar(&bar(100.0), &snap, 100_000.0), Decision::NoAction);
    }

    #[test]
    fn no_entry_when_fast_equals_slow() {
        let ctl = PositionController::new(ControllerParams::default());
        let snap = snapshot((99.0, 100.0), (100.0, 100.0), 1.0);
        assert_eq!(ctl.on_bar(&bar(100.0), &snap, 100_000.0), Decision::NoAction);
    }

    #[test]
    fn size_is_floored() {
        let ctl = PositionController::new(ControllerParams::default());
        match ctl.on_bar(&bar(123.45), &golden_cross(1.0), 100_000.0) {
            Decision::EnterLong { size, .. } => assert_eq!(size, 769),
            other => panic!("expected entry, got {other:?}"),
        }
    }

    #[test]
    fn degenerate_size_suppresses_entry() {
        let ctl = PositionController::new(ControllerParams::default());
        let decision = ctl.on_bar(&bar(200_000.0), &golden_cross(1.0), 100_000.0);
        assert_eq!(decision, Decision::NoAction);
        assert_eq!(ctl.state(), &PositionState::default());
    }

    #[test]
    fn confirmed_entry_commits_state() {
        let mut ctl = PositionController::new(ControllerParams::default());
        let decision = ctl.on_bar(&bar(100.0), &golden_cross(2.0), 100_000.0);
        ctl.apply_fill(&decision, &filled(100.5, 950));

        let state = ctl.state();
        assert!(state.is_open);
        assert_eq!(state.entry_price, Some(100.5));
        assert_eq!(state.stop_price, Some(84.0));
        assert_eq!(state.trade_count, 1);
    }

    #[test]
    fn rejected_entry_leaves_state_and_reoffers() {
        let mut ctl = PositionController::new(ControllerParams::default());
        let snap = golden_cross(2.0);
        let first = ctl.on_bar(&bar(100.0), &snap, 100_000.0);
        assert!(matches!(first, Decision::EnterLong { .. }));

        ctl.apply_fill(&first, &rejected());
        assert!(!ctl.state().is_open);
        assert_eq!(ctl.state(), &PositionState::default());

        let second = ctl.on_bar(&bar(100.0), &snap, 100_000.0);
        assert_eq!(first, second);
    }

    #[test]
    fn stop_loss_exit() {
        let ctl = open_controller(100.0, 2.0);
        assert_eq!(ctl.state().stop_price, Some(84.0));

        let holding = snapshot((105.0, 100.0), (105.0, 100.0), 2.0);
        assert_eq!(
            ctl.on_bar(&bar(83.99), &holding, 100_000.0),
            Decision::ExitPosition(ExitReason::StopLoss)
        );
        assert_eq!(ctl.on_bar(&bar(84.0), &holding, 100_000.0), Decision::NoAction);
    }

    #[test]
    fn trend_reversal_exit() {
        let ctl = open_controller(100.0, 2.0);
        let reversal = snapshot((100.5, 100.0), (99.5, 100.0), 2.0);
        assert_eq!(
            ctl.on_bar(&bar(100.0), &reversal, 100_000.0),
            Decision::ExitPosition(ExitReason::TrendReversal)
        );
    }

    #[test]
    fn trend_reversal_dominates_stop() {
        let ctl = open_controller(100.0, 2.0);
        let reversal = snapshot((100.5, 100.0), (99.5, 100.0), 2.0);
        assert_eq!(
            ctl.on_bar(&bar(50.0), &reversal, 100_000.0),
            Decision::ExitPosition(ExitReason::TrendReversal)
        );
    }

    #[test]
    fn no_entry_while_open() {
        let ctl = open_controller(100.0, 2.0);
        assert_eq!(
            ctl.on_bar(&bar(100.0), &golden_cross(2.0), 100_000.0),
            Decision::NoAction
        );
    }

    #[test]
    fn confirmed_exit_clears_state_and_keeps_count() {
        let mut ctl = open_controller(100.0, 2.0);
        let exit = Decision::ExitPosition(ExitReason::TrendReversal);
        ctl.apply_fill(&exit, &rejected());
        assert!(ctl.state().is_open);

        ctl.apply_fill(&exit, &filled(99.0, 1));
        let state = ctl.state();
        assert!(!state.is_open);
        assert_eq!(state.entry_price, None);
        assert_eq!(state.stop_price, None);
        assert_eq!(state.trade_count, 1);
    }

    #[test]
    fn stop_is_not_trailed() {
        let mut ctl = open_controller(100.0, 2.0);
        let holding = snapshot((110.0, 100.0), (120.0, 100.0), 5.0);
        let decision = ctl.on_bar(&bar(150.0), &holding, 100_000.0);
        ctl.apply_fill(&decision, &filled(150.0, 1));
        assert_eq!(ctl.state().stop_price, Some(84.0));
    }

    #[test]
    fn exit_reason_labels() {
        assert_eq!(ExitReason::TrendReversal.to_string(), "trend-reversal");
        assert_eq!(ExitReason::StopLoss.as_str(), "stop-loss");
    }

    fn frame_strategy() -> impl Strategy<Value = IndicatorFrame> {
        (
            prop::option::weighted(0.9, 50.0..150.0f64),
            prop::option::weighted(0.9, 50.0..150.0f64),
            prop::option::weighted(0.9, 0.1..10.0f64),
        )
            .prop_map(|(fast_avg, slow_avg, volatility_range)| IndicatorFrame {
                fast_avg,
                slow_avg,
                volatility_range,
            })
    }

    proptest! {
        #[test]
        fn on_bar_never_mutates_and_respects_branch(
            current in frame_strategy(),
            previous in frame_strategy(),
            close in 1.0..500.0f64,
            value in 0.0..1_000_000.0f64,
            open in any::<bool>(),
        ) {
            let ctl = if open {
                open_controller(100.0, 2.0)
            } else {
                PositionController::new(ControllerParams::default())
            };
            let before = ctl.state().clone();
            let snap = IndicatorSnapshot { current, previous };
            let decision = ctl.on_bar(&bar(close), &snap, value);

            prop_assert_eq!(ctl.state(), &before);
            if open {
                let is_entry = matches!(decision, Decision::EnterLong { .. });
                prop_assert!(!is_entry);
            } else {
                let is_exit = matches!(decision, Decision::ExitPosition(_));
                prop_assert!(!is_exit);
            }
            if snap.current.resolved().is_none() || snap.previous.resolved().is_none() {
                prop_assert_eq!(decision, Decision::NoAction);
            }
        }

        #[test]
        fn entry_iff_strict_crossover(
            prev_fast in 50.0..150.0f64,
            prev_slow in 50.0..150.0f64,
            fast in 50.0..150.0f64,
            slow in 50.0..150.0f64,
        ) {
            let ctl = PositionController::new(ControllerParams::default());
            let snap = snapshot((prev_fast, prev_slow), (fast, slow), 1.0);
            let decision = ctl.on_bar(&bar(100.0), &snap, 100_000.0);
            let crossed = fast > slow && prev_fast <= prev_slow;
            let entered = matches!(decision, Decision::EnterLong { .. });
            prop_assert_eq!(entered, crossed);
        }
    }
}
