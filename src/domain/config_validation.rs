//! Configuration validation.
//!
//! Validates all config fields before a backtest runs.

use crate::domain::backtest::BarInterval;
use crate::domain::error::TrendfilterError;
use crate::domain::execution::FillPolicy;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), TrendfilterError> {
    validate_symbol(config)?;
    validate_interval(config)?;
    validate_initial_capital(config)?;
    validate_commission(config)?;
    validate_slippage(config)?;
    validate_fill_policy(config)?;
    validate_risk_free_rate(config)?;
    validate_dates(config)?;
    Ok(())
}

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), TrendfilterError> {
    validate_windows(config)?;
    validate_position_fraction(config)?;
    validate_stop_multiplier(config)?;
    Ok(())
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> TrendfilterError {
    TrendfilterError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn validate_symbol(config: &dyn ConfigPort) -> Result<(), TrendfilterError> {
    if config.has_value("backtest", "symbol") {
        Ok(())
    } else {
        Err(TrendfilterError::ConfigMissing {
            section: "backtest".to_string(),
            key: "symbol".to_string(),
        })
    }
}

fn validate_interval(config: &dyn ConfigPort) -> Result<(), TrendfilterError> {
    match config.get_string("backtest", "interval") {
        None => Ok(()),
        Some(s) => s
            .parse::<BarInterval>()
            .map(|_| ())
            .map_err(|reason| invalid("backtest", "interval", reason)),
    }
}

fn validate_initial_capital(config: &dyn ConfigPort) -> Result<(), TrendfilterError> {
    let value = config.get_double("backtest", "initial_capital", 100_000.0);
    if value <= 0.0 || !value.is_finite() {
        return Err(invalid(
            "backtest",
            "initial_capital",
            "initial_capital must be positive",
        ));
    }
    Ok(())
}

fn validate_commission(config: &dyn ConfigPort) -> Result<(), TrendfilterError> {
    let per_trade = config.get_double("backtest", "commission_per_trade", 0.0);
    if per_trade < 0.0 {
        return Err(invalid(
            "backtest",
            "commission_per_trade",
            "commission_per_trade must be non-negative",
        ));
    }
    let pct = config.get_double("backtest", "commission_pct", 0.1);
    if !(0.0..100.0).contains(&pct) {
        return Err(invalid(
            "backtest",
            "commission_pct",
            "commission_pct must be between 0 and 100",
        ));
    }
    Ok(())
}

fn validate_slippage(config: &dyn ConfigPort) -> Result<(), TrendfilterError> {
    let value = config.get_double("backtest", "slippage_pct", 0.0);
    if value < 0.0 {
        return Err(invalid(
            "backtest",
            "slippage_pct",
            "slippage_pct must be non-negative",
        ));
    }
    Ok(())
}

fn validate_fill_policy(config: &dyn ConfigPort) -> Result<(), TrendfilterError> {
    match config.get_string("backtest", "fill_policy") {
        None => Ok(()),
        Some(s) => s
            .parse::<FillPolicy>()
            .map(|_| ())
            .map_err(|reason| invalid("backtest", "fill_policy", reason)),
    }
}

fn validate_risk_free_rate(config: &dyn ConfigPort) -> Result<(), TrendfilterError> {
    let value = config.get_double("backtest", "risk_free_rate", 0.02);
    if !(0.0..1.0).contains(&value) {
        return Err(invalid(
            "backtest",
            "risk_free_rate",
            "risk_free_rate must be between 0 and 1",
        ));
    }
    Ok(())
}

fn validate_dates(config: &dyn ConfigPort) -> Result<(), TrendfilterError> {
    let start_str = config.get_string("backtest", "start_date");
    let end_str = config.get_string("backtest", "end_date");

    let start_date = parse_date(start_str.as_deref(), "start_date")?;
    let end_date = parse_date(end_str.as_deref(), "end_date")?;

    if start_date >= end_date {
        return Err(invalid(
            "backtest",
            "start_date",
            "start_date must be before end_date",
        ));
    }
    Ok(())
}

pub fn parse_date(value: Option<&str>, field: &str) -> Result<NaiveDate, TrendfilterError> {
    match value {
        None => Err(TrendfilterError::ConfigMissing {
            section: "backtest".to_string(),
            key: field.to_string(),
        }),
        Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| {
            invalid(
                "backtest",
                field,
                format!("invalid {} format, expected YYYY-MM-DD", field),
            )
        }),
    }
}

fn validate_windows(config: &dyn ConfigPort) -> Result<(), TrendfilterError> {
    for (key, default) in [
        ("fast_window", 50),
        ("slow_window", 200),
        ("volatility_window", 14),
    ] {
        if config.get_int("strategy", key, default) < 1 {
            return Err(invalid("strategy", key, format!("{key} must be at least 1")));
        }
    }

    let fast = config.get_int("strategy", "fast_window", 50);
    let slow = config.get_int("strategy", "slow_window", 200);
    if fast >= slow {
        return Err(invalid(
            "strategy",
            "fast_window",
            "fast_window must be shorter than slow_window",
        ));
    }
    Ok(())
}

fn validate_position_fraction(config: &dyn ConfigPort) -> Result<(), TrendfilterError> {
    let value = config.get_double("strategy", "position_fraction", 0.95);
    if value <= 0.0 || value > 1.0 {
        return Err(invalid(
            "strategy",
            "position_fraction",
            "position_fraction must be in (0, 1]",
        ));
    }
    Ok(())
}

fn validate_stop_multiplier(config: &dyn ConfigPort) -> Result<(), TrendfilterError> {
    let value = config.get_double("strategy", "stop_multiplier", 8.0);
    if value <= 0.0 || !value.is_finite() {
        return Err(invalid(
            "strategy",
            "stop_multiplier",
            "stop_multiplier must be positive",
        ));
    }
    Ok(())
}
