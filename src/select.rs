use crate::error::{DaybreakError, Result};
use crate::evaluate::{EvalContext, rule_satisfied};
use crate::rules::{Condition, Rule, RuleCatalog};
use crate::structs::HistoryEntry;
use log::debug;
use rayon::prelude::*;

// Specificity weights per condition kind. These encode how the catalog was
// authored to compete; change them and the catalog's balance shifts.
pub const TEMPERATURE_WEIGHT: f64 = 2.0;
pub const RAIN_WEIGHT: f64 = 3.0;
pub const WIND_WEIGHT: f64 = 2.0;
pub const WIND_DIRECTION_WEIGHT: f64 = 4.0;
pub const CONTINUING_CONDITION_WEIGHT: f64 = 4.0;
pub const TEMPERATURE_CHANGE_WEIGHT: f64 = 3.0;
pub const WEATHER_GROUP_WEIGHT: f64 = 3.0;
/// Split across the months of a month set.
pub const MONTH_WEIGHT: f64 = 6.0;
pub const DATE_WEIGHT: f64 = 30.0;
/// Penalty for the rule chosen last time; divided by `position + 1` further back.
pub const NOVELTY_PENALTY: f64 = 30.0;

/// The winning rule and its adjusted score.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection<'a> {
    pub rule: &'a Rule,
    pub score: f64,
    /// Number of rules that passed the filter
    pub candidates: usize,
}

/// Sum of the weights of the condition kinds present in `rule`.
pub fn specificity(rule: &Rule) -> f64 {
    rule.conditions
        .iter()
        .map(|condition| match condition {
            Condition::Temperature(_) => TEMPERATURE_WEIGHT,
            Condition::Rain(_) => RAIN_WEIGHT,
            Condition::Wind(_) => WIND_WEIGHT,
            Condition::WindDirection(_) => WIND_DIRECTION_WEIGHT,
            Condition::ContinuingCondition(_) => CONTINUING_CONDITION_WEIGHT,
            Condition::TemperatureChange(_) => TEMPERATURE_CHANGE_WEIGHT,
            Condition::WeatherGroup(_) => WEATHER_GROUP_WEIGHT,
            Condition::Month(months) => MONTH_WEIGHT / months.len() as f64,
            Condition::Date(_) => DATE_WEIGHT,
            Condition::Humidity(_) => 0.0,
        })
        .sum()
}

/// Penalty for the most recent appearance of `name` in the newest-first history.
pub fn novelty_penalty(name: &str, history: &[HistoryEntry]) -> f64 {
    history
        .iter()
        .position(|entry| entry.name() == name)
        .map_or(0.0, |position| NOVELTY_PENALTY / (position + 1) as f64)
}

pub fn score(rule: &Rule, history: &[HistoryEntry]) -> f64 {
    specificity(rule) - novelty_penalty(&rule.name, history)
}

/// Picks today's rule from `catalog`.
///
/// Rules are filtered to those whose conditions all hold, scored by
/// specificity minus novelty penalty, and the highest score wins. Equal
/// scores resolve to the rule that comes first in the catalog.
///
/// # Errors
///
/// Returns `NoMatchingRule` when nothing passes the filter and
/// `InvalidRuleDefinition` when a condition cannot be evaluated.
pub fn select<'a>(
    catalog: &'a RuleCatalog,
    ctx: &EvalContext,
    history: &[HistoryEntry],
) -> Result<Selection<'a>> {
    debug!(
        "Evaluating {} rules | Levels: temperature={} rain={} wind={}",
        catalog.len(),
        ctx.levels.temperature,
        ctx.levels.rain,
        ctx.levels.wind
    );

    // Indexed collect keeps catalog order.
    let verdicts = catalog
        .rules()
        .par_iter()
        .map(|rule| rule_satisfied(rule, ctx))
        .collect::<Result<Vec<bool>>>()?;

    let matching: Vec<&Rule> = catalog
        .rules()
        .iter()
        .zip(verdicts)
        .filter_map(|(rule, ok)| ok.then_some(rule))
        .collect();
    debug!("{} rules matched", matching.len());

    let mut best: Option<(&Rule, f64)> = None;
    for &rule in &matching {
        let adjusted = score(rule, history);
        debug!("  {} scored {:.2}", rule.name, adjusted);
        if best.is_none_or(|(_, top)| adjusted > top) {
            best = Some((rule, adjusted));
        }
    }

    match best {
        Some((rule, score)) => Ok(Selection {
            rule,
            score,
            candidates: matching.len(),
        }),
        None => Err(DaybreakError::NoMatchingRule {
            evaluated: catalog.len(),
        }),
    }
}

/// Same as [`select`], returning only the rule name.
pub fn select_name(
    catalog: &RuleCatalog,
    ctx: &EvalContext,
    history: &[HistoryEntry],
) -> Result<String> {
    select(catalog, ctx, history).map(|selection| selection.rule.name.clone())
}
