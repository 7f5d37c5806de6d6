pub mod announce;
pub mod cycle;
pub mod error;
pub mod evaluate;
pub mod forecast;
pub mod history;
pub mod levels;
pub mod load;
pub mod rules;
pub mod select;
pub mod structs;

// Re-export public API
pub use announce::{
    Announcement, ArticleFeeds, Haiku, MessagePayload, announce_new_entry, build_payload,
};
pub use cycle::{CycleOutcome, run_cycle};
pub use error::{DaybreakError, Result};
pub use evaluate::{EvalContext, rule_satisfied, satisfies};
pub use forecast::{AccuWeatherFile, ForecastSource};
pub use history::{HistoryStore, JsonFileStorage, MemoryStorage, Storage};
pub use levels::{Levels, level_of};
pub use load::{write_history_csv, write_payload};
pub use rules::{Condition, ConditionGroups, Rule, RuleCatalog, TemperatureTrend};
pub use select::{Selection, select, select_name};
pub use structs::{CycleConfig, HistoryEntry, LastWeather, MeasurementSnapshot, SimpleLogger, init_logger};
