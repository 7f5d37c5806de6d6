use crate::structs::MeasurementSnapshot;

/// Lower bounds (°C) of temperature levels 1..=5.
pub const TEMPERATURE_THRESHOLDS: [f64; 5] = [5.0, 12.0, 18.0, 28.0, 32.0];

/// Lower bounds (mm) of rain levels 1..=4.
pub const RAIN_THRESHOLDS: [f64; 4] = [0.01, 3.0, 10.0, 20.0];

/// Lower bounds (m/s) of wind levels 1..=4.
pub const WIND_THRESHOLDS: [f64; 4] = [3.0, 8.0, 15.0, 25.0];

/// Ordinal buckets for one snapshot, one per dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Levels {
    pub temperature: u8,
    pub rain: u8,
    pub wind: u8,
}

impl Levels {
    pub fn classify(snapshot: &MeasurementSnapshot) -> Self {
        Self {
            temperature: temperature_level(snapshot.temperature_c()),
            rain: rain_level(snapshot.rainfall_mm()),
            wind: wind_level(snapshot.wind_speed_mps()),
        }
    }
}

/// Maps a value onto an ascending threshold table.
///
/// Each threshold is the inclusive lower bound of the next level, so a value
/// sitting exactly on a boundary lands in the higher bucket. Callers must
/// reject non-finite values first; `MeasurementSnapshot::new` does.
pub fn level_of(value: f64, thresholds: &[f64]) -> u8 {
    thresholds.iter().take_while(|&&bound| value >= bound).count() as u8
}

pub fn temperature_level(celsius: f64) -> u8 {
    level_of(celsius, &TEMPERATURE_THRESHOLDS)
}

pub fn rain_level(millimetres: f64) -> u8 {
    level_of(millimetres, &RAIN_THRESHOLDS)
}

pub fn wind_level(metres_per_second: f64) -> u8 {
    level_of(metres_per_second, &WIND_THRESHOLDS)
}
