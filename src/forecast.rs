use crate::error::{DaybreakError, Result};
use crate::structs::MeasurementSnapshot;
use chrono::{DateTime, FixedOffset};
use log::debug;
use serde::Deserialize;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Provider of today's measurements.
pub trait ForecastSource {
    /// Returns the forecast for the local day containing `now`.
    fn fetch_forecast(&self, now: DateTime<FixedOffset>) -> Result<MeasurementSnapshot>;
}

pub fn fahrenheit_to_celsius(fahrenheit: f64) -> f64 {
    (fahrenheit - 32.0) * 5.0 / 9.0
}

pub fn miles_per_hour_to_mps(mph: f64) -> f64 {
    mph * 0.447
}

pub fn inches_to_mm(inches: f64) -> f64 {
    inches * 25.4
}

/// AccuWeather 5-day daily forecast document (imperial units).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DailyForecastResponse {
    pub daily_forecasts: Vec<DailyForecast>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DailyForecast {
    pub date: String,
    pub temperature: Option<TemperatureRange>,
    pub day: Option<DayForecast>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TemperatureRange {
    pub maximum: Option<UnitValue>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DayForecast {
    pub icon: Option<i32>,
    pub total_liquid: Option<UnitValue>,
    pub wind: Option<Wind>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Wind {
    pub speed: Option<UnitValue>,
    pub direction: Option<WindDirection>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WindDirection {
    pub degrees: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UnitValue {
    pub value: Option<f64>,
}

impl DailyForecastResponse {
    /// First forecast dated at or after the start of `now`'s local day.
    pub fn for_day(&self, now: DateTime<FixedOffset>) -> Result<&DailyForecast> {
        let start_of_day = now
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .and_then(|midnight| midnight.and_local_timezone(*now.offset()).single())
            .ok_or_else(|| DaybreakError::Forecast("ambiguous start of day".to_string()))?;

        self.daily_forecasts
            .iter()
            .find(|cast| {
                DateTime::parse_from_rfc3339(&cast.date).is_ok_and(|date| date >= start_of_day)
            })
            .ok_or_else(|| {
                DaybreakError::Forecast(format!("no daily forecast on or after {}", start_of_day))
            })
    }
}

impl DailyForecast {
    /// Converts the imperial forecast into a validated snapshot.
    pub fn to_snapshot(&self) -> Result<MeasurementSnapshot> {
        let day = self.day.as_ref();
        let weather_id = day
            .and_then(|d| d.icon)
            .ok_or_else(|| missing("Day.Icon"))?;
        let max_f = self
            .temperature
            .as_ref()
            .and_then(|t| t.maximum.as_ref())
            .and_then(|v| v.value)
            .ok_or_else(|| missing("Temperature.Maximum.Value"))?;
        let liquid_in = day
            .and_then(|d| d.total_liquid.as_ref())
            .and_then(|v| v.value)
            .ok_or_else(|| missing("Day.TotalLiquid.Value"))?;
        let wind = day.and_then(|d| d.wind.as_ref());
        let wind_mph = wind
            .and_then(|w| w.speed.as_ref())
            .and_then(|v| v.value)
            .ok_or_else(|| missing("Day.Wind.Speed.Value"))?;
        let wind_deg = wind
            .and_then(|w| w.direction.as_ref())
            .and_then(|d| d.degrees)
            .ok_or_else(|| missing("Day.Wind.Direction.Degrees"))?;

        MeasurementSnapshot::new(
            fahrenheit_to_celsius(max_f),
            inches_to_mm(liquid_in),
            miles_per_hour_to_mps(wind_mph),
            wind_deg,
            weather_id,
        )
    }
}

fn missing(field: &str) -> DaybreakError {
    DaybreakError::Forecast(format!("forecast is missing {}", field))
}

/// Reads a saved AccuWeather daily forecast response from disk.
#[derive(Debug, Clone)]
pub struct AccuWeatherFile {
    path: PathBuf,
}

impl AccuWeatherFile {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }
}

impl ForecastSource for AccuWeatherFile {
    fn fetch_forecast(&self, now: DateTime<FixedOffset>) -> Result<MeasurementSnapshot> {
        debug!("Reading forecast: {}", self.path.display());
        let file = File::open(&self.path)?;
        let response: DailyForecastResponse = serde_json::from_reader(file)?;
        let forecast = response.for_day(now)?;
        debug!("Using forecast dated {}", forecast.date);
        forecast.to_snapshot()
    }
}
