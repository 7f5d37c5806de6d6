//! Decision cycle integration tests
//!
//! Covers the whole path from measurements to a persisted selection:
//! - classification feeding rule selection
//! - novelty penalty across consecutive days
//! - aborted cycles leaving the store untouched

use chrono::{DateTime, Duration, FixedOffset};
use lib::{
    Condition, ConditionGroups, CycleConfig, DaybreakError, EvalContext, HistoryStore,
    JsonFileStorage, LastWeather, Levels, MeasurementSnapshot, MemoryStorage, Rule, RuleCatalog,
    run_cycle, select_name,
};

fn morning(date: &str) -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339(&format!("{date}T05:00:00+09:00")).unwrap()
}

fn catalog(rules: Vec<Rule>) -> RuleCatalog {
    RuleCatalog::new(rules, ConditionGroups::accuweather()).unwrap()
}

// ============================================================================
// Classification into selection
// ============================================================================

#[test]
fn clear_calm_day_prefers_temperature_rule() {
    let snapshot = MeasurementSnapshot::new(20.0, 0.0, 2.0, 0.0, 1).unwrap();
    let levels = Levels::classify(&snapshot);
    // 18 <= 20 < 28 is temperature level 3
    assert_eq!(
        levels,
        Levels {
            temperature: 3,
            rain: 0,
            wind: 0
        }
    );

    let catalog = catalog(vec![
        Rule::new("catch-all", vec![]),
        Rule::new("warm", vec![Condition::Temperature(levels.temperature)]),
    ]);
    let mut store = HistoryStore::open(MemoryStorage::default(), None);
    let outcome = run_cycle(
        &catalog,
        snapshot,
        morning("2024-05-10"),
        &mut store,
        &CycleConfig::default(),
    )
    .unwrap();
    assert_eq!(outcome.name(), "warm");
    assert_eq!(outcome.score, 2.0);
}

#[test]
fn mild_day_matches_level_two() {
    let snapshot = MeasurementSnapshot::new(15.0, 0.0, 2.0, 0.0, 1).unwrap();
    let groups = ConditionGroups::accuweather();
    let date = morning("2024-05-10").date_naive();
    let ctx = EvalContext::new(&snapshot, None, date, &groups);
    let catalog = catalog(vec![
        Rule::new("catch-all", vec![]),
        Rule::new("mild", vec![Condition::Temperature(2)]),
    ]);
    assert_eq!(select_name(&catalog, &ctx, &[]).unwrap(), "mild");
}

#[test]
fn selection_is_deterministic() {
    let snapshot = MeasurementSnapshot::new(25.0, 4.0, 9.0, 170.0, 18).unwrap();
    let groups = ConditionGroups::accuweather();
    let date = morning("2024-06-20").date_naive();
    let last = Some(LastWeather {
        weather_id: 26,
        temperature: 24.0,
    });
    let ctx = EvalContext::new(&snapshot, last, date, &groups);
    let catalog = RuleCatalog::builtin().unwrap();

    let first = select_name(&catalog, &ctx, &[]).unwrap();
    for _ in 0..20 {
        assert_eq!(select_name(&catalog, &ctx, &[]).unwrap(), first);
    }
}

// ============================================================================
// History across days
// ============================================================================

#[test]
fn repeated_days_rotate_labels() {
    let catalog = catalog(vec![
        Rule::new("plain", vec![]),
        Rule::new("sunny", vec![Condition::WeatherGroup("sunny".into())]),
        Rule::new("sunny again", vec![Condition::ContinuingCondition("sunny".into())]),
    ]);
    let snapshot = MeasurementSnapshot::new(22.0, 0.0, 1.0, 0.0, 2).unwrap();
    let mut store = HistoryStore::open(MemoryStorage::default(), None);
    let config = CycleConfig::default();

    // Day one: no yesterday, so only "plain" and "sunny" match.
    let day_one = morning("2024-08-01");
    let first = run_cycle(&catalog, snapshot, day_one, &mut store, &config).unwrap();
    assert_eq!(first.name(), "sunny");

    // Day two: the continuing rule scores 4 against sunny's 3 - 30.
    let second = run_cycle(&catalog, snapshot, day_one + Duration::days(1), &mut store, &config)
        .unwrap();
    assert_eq!(second.name(), "sunny again");

    // Day three: sunny again at 4 - 30, sunny at 3 - 15, plain at 0.
    let third = run_cycle(&catalog, snapshot, day_one + Duration::days(2), &mut store, &config)
        .unwrap();
    assert_eq!(third.name(), "plain");

    let names: Vec<_> = store
        .histories()
        .unwrap()
        .iter()
        .map(|e| e.name().to_string())
        .collect();
    assert_eq!(names, ["plain", "sunny again", "sunny"]);
}

#[test]
fn date_rule_wins_when_active() {
    let catalog = RuleCatalog::builtin().unwrap();
    let snapshot = MeasurementSnapshot::new(8.0, 0.0, 4.0, 10.0, 1).unwrap();
    let mut store = HistoryStore::open(MemoryStorage::default(), None);
    let outcome = run_cycle(
        &catalog,
        snapshot,
        morning("2025-01-01"),
        &mut store,
        &CycleConfig::default(),
    )
    .unwrap();
    assert_eq!(outcome.name(), "元日");
}

// ============================================================================
// Failure handling
// ============================================================================

#[test]
fn no_match_aborts_without_writing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.json");
    let catalog = catalog(vec![Rule::new("snow only", vec![Condition::WeatherGroup("snow".into())])]);
    let snapshot = MeasurementSnapshot::new(30.0, 0.0, 1.0, 0.0, 1).unwrap();

    let mut store = HistoryStore::open(JsonFileStorage::open(&path).unwrap(), None);
    let err = run_cycle(
        &catalog,
        snapshot,
        morning("2024-07-01"),
        &mut store,
        &CycleConfig::default(),
    )
    .unwrap_err();
    assert!(matches!(err, DaybreakError::NoMatchingRule { evaluated: 1 }));
    assert!(store.last_weather().unwrap().is_none());
    assert!(store.histories().unwrap().is_empty());
    assert!(!path.exists());
}

#[test]
fn non_finite_measurements_are_rejected() {
    let err = MeasurementSnapshot::new(f64::NAN, 0.0, 0.0, 0.0, 1).unwrap_err();
    assert!(matches!(
        err,
        DaybreakError::InvalidMeasurement {
            field: "temperature_c",
            ..
        }
    ));
    assert!(MeasurementSnapshot::new(10.0, f64::INFINITY, 0.0, 0.0, 1).is_err());
    assert!(MeasurementSnapshot::new(10.0, 0.0, 0.0, 360.0, 1).is_err());
    assert!(MeasurementSnapshot::new(10.0, 0.0, 0.0, -1.0, 1).is_err());
}

#[test]
fn persisted_state_carries_into_next_run() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.json");
    let catalog = catalog(vec![
        Rule::new("plain", vec![]),
        Rule::new(
            "cold snap",
            vec![Condition::TemperatureChange(lib::TemperatureTrend::Rising)],
        ),
    ]);
    let config = CycleConfig::default();

    let warm = MeasurementSnapshot::new(20.0, 0.0, 1.0, 0.0, 1).unwrap();
    let mut store = HistoryStore::open(JsonFileStorage::open(&path).unwrap(), None);
    let first = run_cycle(&catalog, warm, morning("2024-10-01"), &mut store, &config).unwrap();
    assert_eq!(first.name(), "plain");
    store.close();

    // Yesterday was 20°C, today 12°C: a drop of 8 fires the authored "1" trend.
    let cold = MeasurementSnapshot::new(12.0, 0.0, 1.0, 0.0, 1).unwrap();
    let mut store = HistoryStore::open(JsonFileStorage::open(&path).unwrap(), None);
    let second = run_cycle(&catalog, cold, morning("2024-10-02"), &mut store, &config).unwrap();
    assert_eq!(second.name(), "cold snap");
    assert_eq!(store.histories().unwrap().len(), 2);
}
