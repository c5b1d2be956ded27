//! Configuration validation.
//!
//! Every section is checked before any candle data is loaded. The typed
//! accessors here are also what the CLI uses to build its configs, so a file
//! that validates always builds.

use chrono::{Duration, NaiveDateTime};
use std::collections::BTreeSet;
use std::fmt::Display;
use std::str::FromStr;

use crate::domain::error::InvestrError;
use crate::domain::frequency::{parse_duration, Frequency};
use crate::domain::indicator::{parse_indicator_list, IndicatorKind};
use crate::domain::indicator_group::PolicyKind;
use crate::domain::ohlcv::parse_timestamp;
use crate::domain::trend::{TrendAlgorithm, DEFAULT_BAND};
use crate::ports::config_port::ConfigPort;

pub fn validate_config(config: &dyn ConfigPort) -> Result<(), InvestrError> {
    validate_backtest_config(config)?;
    validate_strategy_config(config)?;
    validate_signals_config(config)?;
    validate_trend_config(config)?;
    Ok(())
}

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), InvestrError> {
    require_value(config, "backtest", "symbol")?;
    let start = timestamp_value(config, "backtest", "start")?;
    let end = timestamp_value(config, "backtest", "end")?;
    if start >= end {
        return Err(invalid("backtest", "start", "start must be before end"));
    }
    parse_value::<Frequency>(config, "backtest", "step")?;
    parse_value::<u32>(config, "backtest", "retry_rejected")?;
    Ok(())
}

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), InvestrError> {
    if let Some(capital) = parse_value::<f64>(config, "strategy", "capital")? {
        if !(capital > 0.0) {
            return Err(invalid("strategy", "capital", "capital must be positive"));
        }
    }
    if let Some(size) = parse_value::<f64>(config, "strategy", "position_size")? {
        if !(size > 0.0 && size <= 1.0) {
            return Err(invalid(
                "strategy",
                "position_size",
                "position_size must be in (0, 1]",
            ));
        }
    }
    if let Some(limit) = parse_value::<usize>(config, "strategy", "order_limit")? {
        if limit == 0 {
            return Err(invalid("strategy", "order_limit", "order_limit must be at least 1"));
        }
    }
    duration_value(config, "strategy", "timeout", Duration::zero())?;
    duration_value(config, "strategy", "cooldown", Duration::zero())?;
    if let Some(min_profit) = parse_value::<f64>(config, "strategy", "min_profit")? {
        if !min_profit.is_finite() {
            return Err(invalid("strategy", "min_profit", "min_profit must be finite"));
        }
    }
    validate_flag(config, "strategy", "liquidate_stale")?;
    Ok(())
}

pub fn validate_signals_config(config: &dyn ConfigPort) -> Result<(), InvestrError> {
    for frequency in frequencies(config)? {
        indicators_for(config, frequency)?;
    }
    parse_value::<PolicyKind>(config, "signals", "policy")?;
    Ok(())
}

pub fn validate_trend_config(config: &dyn ConfigPort) -> Result<(), InvestrError> {
    trend_algorithm(config).map(|_| ())
}

/// A key that must be present and non-blank.
pub fn require_value(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<String, InvestrError> {
    config
        .get_value(section, key)
        .ok_or_else(|| InvestrError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        })
}

/// Parses an optional key. Blank counts as unset; anything unparseable is an
/// error rather than a silent default.
pub fn parse_value<T>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<T>, InvestrError>
where
    T: FromStr,
    T::Err: Display,
{
    config
        .get_value(section, key)
        .map(|raw| raw.parse::<T>().map_err(|e| invalid(section, key, e)))
        .transpose()
}

pub fn timestamp_value(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<NaiveDateTime, InvestrError> {
    let raw = require_value(config, section, key)?;
    parse_timestamp(&raw).ok_or_else(|| {
        invalid(
            section,
            key,
            format!("invalid timestamp '{}', expected YYYY-MM-DD HH:MM:SS", raw),
        )
    })
}

/// Duration in the frequency grammar (`6h`, `30m`, `1d`).
pub fn duration_value(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: Duration,
) -> Result<Duration, InvestrError> {
    match config.get_value(section, key) {
        Some(raw) => parse_duration(&raw).map_err(|e| invalid(section, key, e)),
        None => Ok(default),
    }
}

/// The `[signals] frequencies` list, in file order. Duplicates are rejected.
pub fn frequencies(config: &dyn ConfigPort) -> Result<Vec<Frequency>, InvestrError> {
    let raw = config
        .get_list("signals", "frequencies")
        .filter(|list| !list.is_empty())
        .ok_or_else(|| InvestrError::ConfigMissing {
            section: "signals".to_string(),
            key: "frequencies".to_string(),
        })?;

    let mut seen = BTreeSet::new();
    let mut out = Vec::with_capacity(raw.len());
    for item in raw {
        let frequency: Frequency = item
            .parse()
            .map_err(|e| invalid("signals", "frequencies", e))?;
        if !seen.insert(frequency) {
            return Err(invalid(
                "signals",
                "frequencies",
                format!("{} listed twice", frequency),
            ));
        }
        out.push(frequency);
    }
    Ok(out)
}

/// Indicators for one frequency: `indicators.<freq>` if set, else the shared
/// `indicators` list.
pub fn indicators_for(
    config: &dyn ConfigPort,
    frequency: Frequency,
) -> Result<Vec<IndicatorKind>, InvestrError> {
    let override_key = format!("indicators.{}", frequency);
    let key = if config.get_value("signals", &override_key).is_some() {
        override_key.as_str()
    } else {
        "indicators"
    };
    let raw = require_value(config, "signals", key)?;
    parse_indicator_list(&raw).map_err(|e| invalid("signals", key, e))
}

pub fn trend_algorithm(config: &dyn ConfigPort) -> Result<TrendAlgorithm, InvestrError> {
    let band = parse_value::<f64>(config, "trend", "band")?.unwrap_or(DEFAULT_BAND);
    match config.get_value("trend", "algorithm") {
        Some(name) => TrendAlgorithm::from_name(&name, band).map_err(|e| {
            let key = if e.starts_with("band") { "band" } else { "algorithm" };
            invalid("trend", key, e)
        }),
        None => TrendAlgorithm::from_name("mean", band).map_err(|e| invalid("trend", "band", e)),
    }
}

fn validate_flag(config: &dyn ConfigPort, section: &str, key: &str) -> Result<(), InvestrError> {
    // get_bool only falls back to its default for unrecognised values
    if config.get_value(section, key).is_some()
        && config.get_bool(section, key, true) != config.get_bool(section, key, false)
    {
        return Err(invalid(section, key, format!("{} must be true or false", key)));
    }
    Ok(())
}

fn invalid(section: &str, key: &str, reason: impl Display) -> InvestrError {
    InvestrError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}
