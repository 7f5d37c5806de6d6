use crate::error::{DaybreakError, Result};
use crate::rules::{Condition, Rule};
use chrono::{DateTime, FixedOffset, Utc};
use log::{LevelFilter, Log, Metadata, Record as LogRecord};
use serde::{Deserialize, Serialize};

/// Simple logger implementation
pub struct SimpleLogger;

impl Log for SimpleLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &LogRecord) {
        println!("[{}] {}", record.level(), record.args());
    }

    fn flush(&self) {}
}

static LOGGER: SimpleLogger = SimpleLogger;

/// Installs [`SimpleLogger`] as the global logger. Fails if a logger is
/// already installed.
pub fn init_logger(debug: bool) -> Result<()> {
    log::set_logger(&LOGGER)?;
    log::set_max_level(if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    });
    Ok(())
}

/// Forecast measurements for the day being labelled.
///
/// Only constructible through [`MeasurementSnapshot::new`], which rejects
/// non-finite values and wind directions outside `[0, 360)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeasurementSnapshot {
    temperature_c: f64,
    rainfall_mm: f64,
    wind_speed_mps: f64,
    wind_direction_deg: f64,
    weather_id: i32,
}

impl MeasurementSnapshot {
    pub fn new(
        temperature_c: f64,
        rainfall_mm: f64,
        wind_speed_mps: f64,
        wind_direction_deg: f64,
        weather_id: i32,
    ) -> Result<Self> {
        check_finite("temperature_c", temperature_c)?;
        check_finite("rainfall_mm", rainfall_mm)?;
        check_finite("wind_speed_mps", wind_speed_mps)?;
        check_finite("wind_direction_deg", wind_direction_deg)?;
        if !(0.0..360.0).contains(&wind_direction_deg) {
            return Err(DaybreakError::InvalidMeasurement {
                field: "wind_direction_deg",
                value: wind_direction_deg,
            });
        }

        Ok(Self {
            temperature_c,
            rainfall_mm,
            wind_speed_mps,
            wind_direction_deg,
            weather_id,
        })
    }

    pub fn temperature_c(&self) -> f64 {
        self.temperature_c
    }

    pub fn rainfall_mm(&self) -> f64 {
        self.rainfall_mm
    }

    pub fn wind_speed_mps(&self) -> f64 {
        self.wind_speed_mps
    }

    pub fn wind_direction_deg(&self) -> f64 {
        self.wind_direction_deg
    }

    pub fn weather_id(&self) -> i32 {
        self.weather_id
    }
}

fn check_finite(field: &'static str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(DaybreakError::InvalidMeasurement { field, value })
    }
}

/// Yesterday's categorical code and maximum temperature.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastWeather {
    pub weather_id: i32,
    pub temperature: f64,
}

impl From<&MeasurementSnapshot> for LastWeather {
    fn from(snapshot: &MeasurementSnapshot) -> Self {
        Self {
            weather_id: snapshot.weather_id(),
            temperature: snapshot.temperature_c(),
        }
    }
}

/// The rule stored alongside a history entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryWeather {
    pub name: String,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

/// One past selection; the history log keeps these newest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Epoch milliseconds of the decision
    pub date: i64,
    pub weather: HistoryWeather,
}

impl HistoryEntry {
    pub fn new(date: DateTime<Utc>, rule: &Rule) -> Self {
        Self {
            date: date.timestamp_millis(),
            weather: HistoryWeather {
                name: rule.name.clone(),
                conditions: rule.conditions.clone(),
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.weather.name
    }
}

/// Configuration for one decision cycle
#[derive(Debug, Clone)]
pub struct CycleConfig {
    /// Offset of the local calendar used for month/day conditions
    pub utc_offset_hours: i32,
    /// Maximum history entries kept; `None` keeps everything
    pub retention: Option<usize>,
    /// Decide without writing to the history store
    pub dry_run: bool,
}

impl CycleConfig {
    /// The local calendar's offset; anything of a day or more is rejected.
    pub fn offset(&self) -> Result<FixedOffset> {
        self.utc_offset_hours
            .checked_mul(3600)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| {
                DaybreakError::InvalidConfig(format!(
                    "UTC offset of {} hours is out of range",
                    self.utc_offset_hours
                ))
            })
    }
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            utc_offset_hours: 9,
            retention: None,
            dry_run: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_in_hours() {
        let config = CycleConfig::default();
        assert_eq!(config.offset().unwrap().local_minus_utc(), 9 * 3600);

        let west = CycleConfig {
            utc_offset_hours: -5,
            ..Default::default()
        };
        assert_eq!(west.offset().unwrap().local_minus_utc(), -5 * 3600);
    }

    #[test]
    fn out_of_range_offset_is_an_error() {
        for hours in [24, -24, i32::MAX] {
            let config = CycleConfig {
                utc_offset_hours: hours,
                ..Default::default()
            };
            assert!(matches!(config.offset(), Err(DaybreakError::InvalidConfig(_))));
        }
    }

    #[test]
    fn second_logger_install_fails() {
        let _ = init_logger(false);
        assert!(matches!(init_logger(true), Err(DaybreakError::Logger(_))));
    }
}
