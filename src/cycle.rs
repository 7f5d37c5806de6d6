use crate::error::Result;
use crate::evaluate::EvalContext;
use crate::history::{HistoryStore, Storage};
use crate::levels::Levels;
use crate::rules::{Rule, RuleCatalog};
use crate::select::select;
use crate::structs::{CycleConfig, HistoryEntry, LastWeather, MeasurementSnapshot};
use chrono::{DateTime, FixedOffset, Utc};
use log::{debug, info};

/// Result of one decision cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleOutcome {
    pub rule: Rule,
    pub score: f64,
    pub candidates: usize,
    pub levels: Levels,
    pub snapshot: MeasurementSnapshot,
}

impl CycleOutcome {
    pub fn name(&self) -> &str {
        &self.rule.name
    }
}

/// Runs one decision: read yesterday's state, select today's rule, persist.
///
/// The calendar date for month/day conditions is `now`'s local date. Nothing
/// is written unless a rule is selected; with `config.dry_run` nothing is
/// written at all.
///
/// # Errors
///
/// Any store read/write failure, `InvalidRuleDefinition`, or `NoMatchingRule`.
/// On error before the writes the store is left as it was.
pub fn run_cycle<S: Storage>(
    catalog: &RuleCatalog,
    snapshot: MeasurementSnapshot,
    now: DateTime<FixedOffset>,
    store: &mut HistoryStore<S>,
    config: &CycleConfig,
) -> Result<CycleOutcome> {
    let last_weather = store.last_weather()?;
    let histories = store.histories()?;
    debug!(
        "Loaded state | Last weather: {:?} | {} history entries",
        last_weather,
        histories.len()
    );

    let ctx = EvalContext::new(&snapshot, last_weather, now.date_naive(), catalog.groups());
    let selection = select(catalog, &ctx, &histories)?;
    info!(
        "Selected \"{}\" (score {:.2}, {} candidates)",
        selection.rule.name, selection.score, selection.candidates
    );

    let outcome = CycleOutcome {
        rule: selection.rule.clone(),
        score: selection.score,
        candidates: selection.candidates,
        levels: ctx.levels,
        snapshot,
    };

    if config.dry_run {
        info!("Dry run: history store left unchanged");
        return Ok(outcome);
    }

    store.set_last_weather(LastWeather::from(&snapshot))?;
    store.prepend_history(HistoryEntry::new(now.with_timezone(&Utc), &outcome.rule))?;
    debug!("History store updated");

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::MemoryStorage;
    use crate::rules::{Condition, ConditionGroups};

    fn now() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2024-12-25T06:30:00+09:00").unwrap()
    }

    fn catalog() -> RuleCatalog {
        RuleCatalog::new(
            vec![
                Rule::new("ordinary day", vec![]),
                Rule::new("christmas", vec![Condition::Date(vec![(12, 25)])]),
            ],
            ConditionGroups::accuweather(),
        )
        .unwrap()
    }

    #[test]
    fn persists_the_winner() {
        let snapshot = MeasurementSnapshot::new(8.0, 0.0, 1.0, 0.0, 7).unwrap();
        let mut store = HistoryStore::open(MemoryStorage::default(), None);
        let outcome = run_cycle(&catalog(), snapshot, now(), &mut store, &CycleConfig::default()).unwrap();

        assert_eq!(outcome.name(), "christmas");
        assert_eq!(
            store.last_weather().unwrap(),
            Some(LastWeather {
                weather_id: 7,
                temperature: 8.0
            })
        );
        let histories = store.histories().unwrap();
        assert_eq!(histories[0].name(), "christmas");
        assert_eq!(histories[0].date, now().timestamp_millis());
    }

    #[test]
    fn dry_run_writes_nothing() {
        let snapshot = MeasurementSnapshot::new(8.0, 0.0, 1.0, 0.0, 7).unwrap();
        let mut store = HistoryStore::open(MemoryStorage::default(), None);
        let config = CycleConfig {
            dry_run: true,
            ..Default::default()
        };
        run_cycle(&catalog(), snapshot, now(), &mut store, &config).unwrap();
        assert!(store.last_weather().unwrap().is_none());
        assert!(store.histories().unwrap().is_empty());
    }

    #[test]
    fn local_date_drives_calendar_conditions() {
        // 2024-12-24T23:00Z is already the 25th at UTC+9.
        let late_utc = DateTime::parse_from_rfc3339("2024-12-24T23:00:00+00:00")
            .unwrap()
            .with_timezone(&CycleConfig::default().offset().unwrap());
        let snapshot = MeasurementSnapshot::new(8.0, 0.0, 1.0, 0.0, 7).unwrap();
        let mut store = HistoryStore::open(MemoryStorage::default(), None);
        let outcome = run_cycle(&catalog(), snapshot, late_utc, &mut store, &CycleConfig::default()).unwrap();
        assert_eq!(outcome.name(), "christmas");
    }
}
