#[derive(Debug, thiserror::Error)]
pub enum DaybreakError {
    #[error("Invalid measurement: {field} = {value}")]
    InvalidMeasurement { field: &'static str, value: f64 },
    #[error("Invalid rule definition in \"{rule}\": {reason}")]
    InvalidRuleDefinition { rule: String, reason: String },
    #[error("No rule matched today's weather ({evaluated} rules evaluated); the catalog needs a catch-all rule")]
    NoMatchingRule { evaluated: usize },
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Logger Error: {0}")]
    Logger(#[from] log::SetLoggerError),
    #[error("Forecast Error: {0}")]
    Forecast(String),
    #[error("I/O Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV Error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON Error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DaybreakError {
    pub(crate) fn rule(rule: &str, reason: impl Into<String>) -> Self {
        DaybreakError::InvalidRuleDefinition {
            rule: rule.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DaybreakError>;
