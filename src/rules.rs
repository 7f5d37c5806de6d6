use crate::error::{DaybreakError, Result};
use log::debug;
use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;

/// Catalog shipped with the binary, used when no catalog file is given.
const BUILTIN_CATALOG: &str = include_str!("../data/weathers.json");

/// Direction of a day-over-day temperature swing, authored as `1` / `-1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i8", into = "i8")]
pub enum TemperatureTrend {
    /// Authored as `1`. Matches when yesterday was at least 5°C *warmer* than
    /// today; the sign is kept exactly as the rule catalogs were written.
    Rising,
    /// Authored as `-1`. Matches when yesterday was at least 5°C *colder*.
    Falling,
}

impl TryFrom<i8> for TemperatureTrend {
    type Error = String;

    fn try_from(value: i8) -> std::result::Result<Self, Self::Error> {
        match value {
            1 => Ok(TemperatureTrend::Rising),
            -1 => Ok(TemperatureTrend::Falling),
            other => Err(format!("temperatureChange must be 1 or -1, got {}", other)),
        }
    }
}

impl From<TemperatureTrend> for i8 {
    fn from(trend: TemperatureTrend) -> Self {
        match trend {
            TemperatureTrend::Rising => 1,
            TemperatureTrend::Falling => -1,
        }
    }
}

/// One predicate of a rule, serialized in the authored `{"kind": value}` form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Condition {
    Temperature(u8),
    Rain(u8),
    Wind(u8),
    /// Sector centre in degrees; the sector spans ±45°.
    #[serde(rename = "winddeg")]
    WindDirection(f64),
    /// Group must hold both yesterday and today.
    ContinuingCondition(String),
    /// Group must hold today.
    #[serde(rename = "condition")]
    WeatherGroup(String),
    TemperatureChange(TemperatureTrend),
    Month(Vec<u32>),
    Date(Vec<(u32, u32)>),
    /// Recognized but never satisfied.
    Humidity(Value),
}

/// Discriminant of [`Condition`], used for weights and duplicate checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConditionKind {
    Temperature,
    Rain,
    Wind,
    WindDirection,
    ContinuingCondition,
    WeatherGroup,
    TemperatureChange,
    Month,
    Date,
    Humidity,
}

impl Condition {
    pub fn kind(&self) -> ConditionKind {
        match self {
            Condition::Temperature(_) => ConditionKind::Temperature,
            Condition::Rain(_) => ConditionKind::Rain,
            Condition::Wind(_) => ConditionKind::Wind,
            Condition::WindDirection(_) => ConditionKind::WindDirection,
            Condition::ContinuingCondition(_) => ConditionKind::ContinuingCondition,
            Condition::WeatherGroup(_) => ConditionKind::WeatherGroup,
            Condition::TemperatureChange(_) => ConditionKind::TemperatureChange,
            Condition::Month(_) => ConditionKind::Month,
            Condition::Date(_) => ConditionKind::Date,
            Condition::Humidity(_) => ConditionKind::Humidity,
        }
    }

    /// Checks the condition against the group table and value ranges.
    fn validate(&self, rule: &str, groups: &ConditionGroups) -> Result<()> {
        match self {
            Condition::Temperature(level) if *level > 5 => Err(DaybreakError::rule(
                rule,
                format!("temperature level {} is outside 0..=5", level),
            )),
            Condition::Rain(level) if *level > 4 => Err(DaybreakError::rule(
                rule,
                format!("rain level {} is outside 0..=4", level),
            )),
            Condition::Wind(level) if *level > 4 => Err(DaybreakError::rule(
                rule,
                format!("wind level {} is outside 0..=4", level),
            )),
            Condition::WindDirection(center) if !(0.0..360.0).contains(center) => Err(
                DaybreakError::rule(rule, format!("winddeg {} is outside [0, 360)", center)),
            ),
            Condition::ContinuingCondition(group) | Condition::WeatherGroup(group) => {
                groups.codes(rule, group).map(|_| ())
            }
            Condition::Month(months) => {
                if months.is_empty() {
                    return Err(DaybreakError::rule(rule, "month set is empty"));
                }
                match months.iter().find(|m| !(1..=12).contains(*m)) {
                    Some(month) => Err(DaybreakError::rule(
                        rule,
                        format!("month {} is outside 1..=12", month),
                    )),
                    None => Ok(()),
                }
            }
            Condition::Date(dates) => {
                if dates.is_empty() {
                    return Err(DaybreakError::rule(rule, "date set is empty"));
                }
                match dates
                    .iter()
                    .find(|(m, d)| !(1..=12).contains(m) || !(1..=31).contains(d))
                {
                    Some((month, day)) => Err(DaybreakError::rule(
                        rule,
                        format!("date [{}, {}] is not a calendar day", month, day),
                    )),
                    None => Ok(()),
                }
            }
            _ => Ok(()),
        }
    }
}

/// A named conjunction of conditions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub name: String,
    pub conditions: Vec<Condition>,
}

impl Rule {
    pub fn new(name: impl Into<String>, conditions: Vec<Condition>) -> Self {
        Self {
            name: name.into(),
            conditions,
        }
    }
}

/// Named groups of AccuWeather icon ids.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionGroups {
    groups: HashMap<String, Vec<i32>>,
}

impl ConditionGroups {
    pub fn new(groups: HashMap<String, Vec<i32>>) -> Self {
        Self { groups }
    }

    /// https://developer.accuweather.com/weather-icons
    pub fn accuweather() -> Self {
        let table: [(&str, &[i32]); 14] = [
            ("clear", &[1, 2]),
            ("sunny", &[1, 2, 3, 4, 30, 31, 32]),
            ("haze", &[5]),
            ("cloud", &[6, 7, 8]),
            ("mist", &[11]),
            ("sunshower", &[14, 17, 21]),
            ("thunderstorm", &[15, 16]),
            ("rain", &[18, 26]),
            ("shower", &[12, 13]),
            ("changing", &[19, 20]),
            ("snow", &[22, 23, 24]),
            ("sleet", &[25, 29]),
            ("drizzle", &[]),
            ("dust", &[]),
        ];
        Self::new(
            table
                .iter()
                .map(|(name, ids)| (name.to_string(), ids.to_vec()))
                .collect(),
        )
    }

    /// Resolves `group` for `rule`, failing when the name is unknown.
    pub fn codes(&self, rule: &str, group: &str) -> Result<&[i32]> {
        self.groups
            .get(group)
            .map(Vec::as_slice)
            .ok_or_else(|| DaybreakError::rule(rule, format!("unknown condition group \"{}\"", group)))
    }
}

/// Ordered, validated, immutable collection of rules.
#[derive(Debug, Clone)]
pub struct RuleCatalog {
    rules: Vec<Rule>,
    groups: ConditionGroups,
}

impl RuleCatalog {
    /// Builds a catalog, rejecting duplicate names, duplicate condition kinds
    /// within a rule and conditions that could never be evaluated.
    pub fn new(rules: Vec<Rule>, groups: ConditionGroups) -> Result<Self> {
        let mut names = HashSet::new();
        for rule in rules.iter() {
            if rule.name.trim().is_empty() {
                return Err(DaybreakError::rule(&rule.name, "rule name is empty"));
            }
            if !names.insert(rule.name.as_str()) {
                return Err(DaybreakError::rule(&rule.name, "rule name appears twice"));
            }

            let mut kinds = HashSet::new();
            for condition in &rule.conditions {
                if !kinds.insert(condition.kind()) {
                    return Err(DaybreakError::rule(
                        &rule.name,
                        format!("condition {:?} appears twice", condition.kind()),
                    ));
                }
                condition.validate(&rule.name, &groups)?;
            }
        }

        debug!("Rule catalog validated: {} rules", rules.len());
        Ok(Self { rules, groups })
    }

    /// Parses a catalog document: a JSON object mapping rule names to lists of
    /// condition objects. Key order is catalog order. A condition object may
    /// carry several kinds at once (`{"temperature": 3, "rain": 0}`).
    pub fn from_json(json: &str, groups: ConditionGroups) -> Result<Self> {
        let raw: RawCatalog = serde_json::from_str(json)?;
        let rules = raw
            .0
            .into_iter()
            .map(|(name, objects)| {
                let conditions = parse_conditions(&name, objects)?;
                Ok(Rule { name, conditions })
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(rules, groups)
    }

    pub fn load(path: &Path, groups: ConditionGroups) -> Result<Self> {
        debug!("Reading rule catalog: {}", path.display());
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json, groups)
    }

    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_CATALOG, ConditionGroups::accuweather())
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn groups(&self) -> &ConditionGroups {
        &self.groups
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

fn parse_conditions(rule: &str, objects: Vec<Map<String, Value>>) -> Result<Vec<Condition>> {
    let mut conditions = Vec::new();
    for object in objects {
        for (key, value) in object {
            let mut single = Map::new();
            single.insert(key.clone(), value);
            let condition = serde_json::from_value(Value::Object(single)).map_err(|e| {
                DaybreakError::rule(rule, format!("bad condition \"{}\": {}", key, e))
            })?;
            conditions.push(condition);
        }
    }
    Ok(conditions)
}

/// Rule entries in document order.
struct RawCatalog(Vec<(String, Vec<Map<String, Value>>)>);

impl<'de> Deserialize<'de> for RawCatalog {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct CatalogVisitor;

        impl<'de> Visitor<'de> for CatalogVisitor {
            type Value = RawCatalog;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object mapping rule names to condition lists")
            }

            fn visit_map<A>(self, mut map: A) -> std::result::Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some(entry) = map.next_entry()? {
                    entries.push(entry);
                }
                Ok(RawCatalog(entries))
            }
        }

        deserializer
            .deserialize_map(CatalogVisitor)
            .map_err(|e: D::Error| de::Error::custom(format!("rule catalog: {}", e)))
    }
}
