use crate::error::Result;
use crate::levels::Levels;
use crate::rules::{Condition, ConditionGroups, Rule, TemperatureTrend};
use crate::structs::{LastWeather, MeasurementSnapshot};
use chrono::{Datelike, NaiveDate};

/// Half-width of a wind direction sector, in degrees.
pub const WIND_SECTOR_HALF_WIDTH: f64 = 45.0;

/// Day-over-day swing (°C) a temperature change condition requires.
pub const TEMPERATURE_CHANGE_THRESHOLD: f64 = 5.0;

/// Everything a condition may look at for one decision.
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    pub levels: Levels,
    pub snapshot: &'a MeasurementSnapshot,
    pub last_weather: Option<LastWeather>,
    pub month: u32,
    pub day: u32,
    pub groups: &'a ConditionGroups,
}

impl<'a> EvalContext<'a> {
    pub fn new(
        snapshot: &'a MeasurementSnapshot,
        last_weather: Option<LastWeather>,
        date: NaiveDate,
        groups: &'a ConditionGroups,
    ) -> Self {
        Self {
            levels: Levels::classify(snapshot),
            snapshot,
            last_weather,
            month: date.month(),
            day: date.day(),
            groups,
        }
    }
}

/// Evaluates one condition of `rule`.
///
/// # Errors
///
/// Returns `InvalidRuleDefinition` when a group condition names a group the
/// context's table does not know. Catalog loading normally catches this first.
pub fn satisfies(rule: &str, condition: &Condition, ctx: &EvalContext) -> Result<bool> {
    let weather_id = ctx.snapshot.weather_id();

    let satisfied = match condition {
        Condition::Temperature(level) => ctx.levels.temperature == *level,
        Condition::Rain(level) => ctx.levels.rain == *level,
        Condition::Wind(level) => ctx.levels.wind == *level,
        Condition::WindDirection(center) => {
            in_wind_sector(*center, ctx.snapshot.wind_direction_deg(), ctx.levels.wind)
        }
        Condition::ContinuingCondition(group) => {
            let codes = ctx.groups.codes(rule, group)?;
            match ctx.last_weather {
                Some(last) => codes.contains(&last.weather_id) && codes.contains(&weather_id),
                None => false,
            }
        }
        Condition::WeatherGroup(group) => ctx.groups.codes(rule, group)?.contains(&weather_id),
        Condition::TemperatureChange(trend) => match ctx.last_weather {
            Some(last) => {
                let drop = last.temperature - ctx.snapshot.temperature_c();
                match trend {
                    TemperatureTrend::Rising => drop >= TEMPERATURE_CHANGE_THRESHOLD,
                    TemperatureTrend::Falling => drop <= -TEMPERATURE_CHANGE_THRESHOLD,
                }
            }
            None => false,
        },
        Condition::Month(months) => months.contains(&ctx.month),
        Condition::Date(dates) => dates.contains(&(ctx.month, ctx.day)),
        // Humidity is not forecast; these rules stay dormant.
        Condition::Humidity(_) => false,
    };

    Ok(satisfied)
}

/// A rule holds when every one of its conditions does.
pub fn rule_satisfied(rule: &Rule, ctx: &EvalContext) -> Result<bool> {
    for condition in &rule.conditions {
        if !satisfies(&rule.name, condition, ctx)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Calm days never match a direction. The north sector wraps across 0°,
/// other sectors are a plain ±45° window.
fn in_wind_sector(center: f64, direction: f64, wind_level: u8) -> bool {
    if wind_level < 1 {
        return false;
    }
    if center == 0.0 {
        direction <= WIND_SECTOR_HALF_WIDTH || direction >= 360.0 - WIND_SECTOR_HALF_WIDTH
    } else {
        center - WIND_SECTOR_HALF_WIDTH <= direction && direction <= center + WIND_SECTOR_HALF_WIDTH
    }
}
