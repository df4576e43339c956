//! Exponential fan curve: maps a temperature onto a fan-speed percentage

use crate::errors::{FanManagerError, Result};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

/// Temperature band accepted from operators, in degrees Celsius
pub const OPERATOR_TEMP_RANGE: RangeInclusive<f64> = 40.0..=90.0;
/// Exponent band accepted from operators
pub const OPERATOR_EXPONENT_RANGE: RangeInclusive<f64> = 0.0..=10.0;
/// Poll interval band accepted from operators, in seconds
pub const OPERATOR_POLL_RANGE: RangeInclusive<u64> = 1..=300;

/// Shape of the temperature to fan-speed response.
///
/// Temperatures are normalized into `[min_temp, max_temp]`, raised to
/// `exponent`, then scaled into `[min_fan_speed, max_fan_speed]`. An exponent of
/// 1 is linear; larger exponents keep the fans quiet until the temperature
/// nears `max_temp`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurveConfig {
    pub min_fan_speed: u8,
    pub max_fan_speed: u8,
    pub min_temp: f64,
    pub max_temp: f64,
    pub exponent: f64,
    pub poll_interval_secs: u64,
}

impl Default for CurveConfig {
    fn default() -> Self {
        Self {
            min_fan_speed: 5,
            max_fan_speed: 100,
            min_temp: 50.0,
            max_temp: 80.0,
            exponent: 5.0,
            poll_interval_secs: 24,
        }
    }
}

impl CurveConfig {
    /// Check the invariants the curve relies on
    pub fn validate(&self) -> Result<()> {
        if self.max_fan_speed > 100 {
            return Err(FanManagerError::InvalidCurve(format!(
                "maximum fan speed {} exceeds 100",
                self.max_fan_speed
            )));
        }
        if self.min_fan_speed > self.max_fan_speed {
            return Err(FanManagerError::InvalidCurve(format!(
                "minimum fan speed {} is above maximum fan speed {}",
                self.min_fan_speed, self.max_fan_speed
            )));
        }
        if !self.min_temp.is_finite() || !self.max_temp.is_finite() {
            return Err(FanManagerError::InvalidCurve(
                "temperatures must be finite".to_string(),
            ));
        }
        if self.min_temp >= self.max_temp {
            return Err(FanManagerError::InvalidCurve(format!(
                "minimum temperature {} must be below maximum temperature {}",
                self.min_temp, self.max_temp
            )));
        }
        if !self.exponent.is_finite() || self.exponent < 0.0 {
            return Err(FanManagerError::InvalidCurve(format!(
                "exponent {} must be a non-negative number",
                self.exponent
            )));
        }
        if self.poll_interval_secs == 0 {
            return Err(FanManagerError::InvalidCurve(
                "poll interval must be at least one second".to_string(),
            ));
        }
        Ok(())
    }

    /// Check the narrower ranges accepted from the CLI and the remote surface
    pub fn validate_operator_bounds(&self) -> Result<()> {
        self.validate()?;

        for (name, value) in [("minimum", self.min_temp), ("maximum", self.max_temp)] {
            if !OPERATOR_TEMP_RANGE.contains(&value) {
                return Err(FanManagerError::InvalidCurve(format!(
                    "{} temperature {} outside {}-{}",
                    name,
                    value,
                    OPERATOR_TEMP_RANGE.start(),
                    OPERATOR_TEMP_RANGE.end()
                )));
            }
        }
        if !OPERATOR_EXPONENT_RANGE.contains(&self.exponent) {
            return Err(FanManagerError::InvalidCurve(format!(
                "intensity {} outside {}-{}",
                self.exponent,
                OPERATOR_EXPONENT_RANGE.start(),
                OPERATOR_EXPONENT_RANGE.end()
            )));
        }
        if !OPERATOR_POLL_RANGE.contains(&self.poll_interval_secs) {
            return Err(FanManagerError::InvalidCurve(format!(
                "poll rate {}s outside {}-{}s",
                self.poll_interval_secs,
                OPERATOR_POLL_RANGE.start(),
                OPERATOR_POLL_RANGE.end()
            )));
        }
        Ok(())
    }
}

/// Fan level for `temperature` under `cfg`, always within the configured speed band.
///
/// The result is truncated, not rounded. `exponent == 0` follows `f64::powf`,
/// where `0^0 == 1`, so every temperature maps to `max_fan_speed`.
/// `cfg` is expected to have passed [`CurveConfig::validate`]; an inverted speed
/// band does not panic but yields `max_fan_speed`.
pub fn compute_fan_level(temperature: f64, cfg: &CurveConfig) -> u8 {
    let min_speed = f64::from(cfg.min_fan_speed);
    let max_speed = f64::from(cfg.max_fan_speed);

    let x = ((temperature - cfg.min_temp) / (cfg.max_temp - cfg.min_temp)).clamp(0.0, 1.0);
    let shaped = x.powf(cfg.exponent);
    let raw = shaped * (max_speed - min_speed) + min_speed;

    // max/min rather than clamp: NaN lands on the floor and an inverted band cannot panic
    raw.max(min_speed).min(max_speed).trunc() as u8
}
