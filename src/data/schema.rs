use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use log::{debug, warn};
use serde::{Serialize, Serializer};

// ---------------------------------------------------------------------------
// Canonical fields
// ---------------------------------------------------------------------------

/// Pollutants that carry their own AQI sub-index in the AQI snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Pollutant {
    Co,
    Ozone,
    No2,
    Pm25,
}

impl Pollutant {
    pub const ALL: [Pollutant; 4] = [Pollutant::Co, Pollutant::Ozone, Pollutant::No2, Pollutant::Pm25];

    pub fn label(self) -> &'static str {
        match self {
            Pollutant::Co => "CO (Carbon Monoxide)",
            Pollutant::Ozone => "O₃ (Ozone)",
            Pollutant::No2 => "NO₂ (Nitrogen Dioxide)",
            Pollutant::Pm25 => "PM2.5 (Fine Particulate Matter)",
        }
    }
}

/// A semantic column role, independent of how the raw file names it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CanonicalField {
    Country,
    City,
    Year,
    Code,
    AqiValue,
    AqiCategory,
    /// Raw concentration of a pollutant (`pm25`, `no2`, `o3`, `co`).
    Concentration(Pollutant),
    PollutantAqiValue(Pollutant),
    PollutantAqiCategory(Pollutant),
}

impl CanonicalField {
    pub const PM25: CanonicalField = CanonicalField::Concentration(Pollutant::Pm25);

    /// Every canonical field, in resolution priority order.
    pub fn all() -> Vec<CanonicalField> {
        let mut fields = vec![
            CanonicalField::Country,
            CanonicalField::City,
            CanonicalField::Year,
            CanonicalField::Code,
            CanonicalField::AqiValue,
            CanonicalField::AqiCategory,
        ];
        for p in Pollutant::ALL {
            fields.push(CanonicalField::PollutantAqiValue(p));
            fields.push(CanonicalField::PollutantAqiCategory(p));
        }
        fields.extend(Pollutant::ALL.map(CanonicalField::Concentration));
        fields
    }

    /// Column name the field takes after canonicalization.
    pub fn name(self) -> &'static str {
        use CanonicalField::*;
        match self {
            Country => "country",
            City => "city",
            Year => "year",
            Code => "code",
            AqiValue => "aqi_value",
            AqiCategory => "aqi_category",
            Concentration(Pollutant::Co) => "co",
            Concentration(Pollutant::Ozone) => "o3",
            Concentration(Pollutant::No2) => "no2",
            Concentration(Pollutant::Pm25) => "pm25",
            PollutantAqiValue(Pollutant::Co) => "co_aqi_value",
            PollutantAqiValue(Pollutant::Ozone) => "ozone_aqi_value",
            PollutantAqiValue(Pollutant::No2) => "no2_aqi_value",
            PollutantAqiValue(Pollutant::Pm25) => "pm25_aqi_value",
            PollutantAqiCategory(Pollutant::Co) => "co_aqi_category",
            PollutantAqiCategory(Pollutant::Ozone) => "ozone_aqi_category",
            PollutantAqiCategory(Pollutant::No2) => "no2_aqi_category",
            PollutantAqiCategory(Pollutant::Pm25) => "pm25_aqi_category",
        }
    }

    /// Human-readable label for tables and notices.
    pub fn label(self) -> String {
        use CanonicalField::*;
        match self {
            Country => "Country".to_string(),
            City => "City".to_string(),
            Year => "Year".to_string(),
            Code => "Code".to_string(),
            AqiValue => "Overall AQI Value".to_string(),
            AqiCategory => "AQI Category".to_string(),
            Concentration(p) => p.label().to_string(),
            PollutantAqiValue(p) => format!("{} AQI Value", p.label()),
            PollutantAqiCategory(p) => format!("{} AQI Category", p.label()),
        }
    }

    /// Whether the field holds a numeric measurement that can be averaged.
    pub fn is_metric(self) -> bool {
        matches!(
            self,
            CanonicalField::AqiValue
                | CanonicalField::Concentration(_)
                | CanonicalField::PollutantAqiValue(_)
        )
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CanonicalField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CanonicalField::all()
            .into_iter()
            .find(|f| f.name() == s)
            .ok_or_else(|| format!("unknown canonical field `{s}`"))
    }
}

impl Serialize for CanonicalField {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Rule table
// ---------------------------------------------------------------------------

/// How a rule recognises a normalized column name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pattern {
    Exact(String),
    /// Every `all` substring present and no `none` substring present.
    Contains {
        all: Vec<&'static str>,
        none: Vec<&'static str>,
    },
    /// Starts with `prefix` and contains every `all` substring.
    Prefixed {
        prefix: &'static str,
        all: Vec<&'static str>,
    },
}

impl Pattern {
    pub fn matches(&self, column: &str) -> bool {
        match self {
            Pattern::Exact(name) => column == name,
            Pattern::Contains { all, none } => {
                all.iter().all(|s| column.contains(s)) && !none.iter().any(|s| column.contains(s))
            }
            Pattern::Prefixed { prefix, all } => {
                column.starts_with(prefix) && all.iter().all(|s| column.contains(s))
            }
        }
    }
}

fn exact(name: &str) -> Pattern {
    Pattern::Exact(name.to_string())
}

fn contains(all: &[&'static str], none: &[&'static str]) -> Pattern {
    Pattern::Contains {
        all: all.to_vec(),
        none: none.to_vec(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub pattern: Pattern,
    pub field: CanonicalField,
}

/// Ordered `(pattern, field)` rules. Earlier rules take priority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleTable {
    rules: Vec<Rule>,
}

/// Raw-name aliases that map straight onto a canonical field.
const ALIASES: &[(&str, CanonicalField)] = &[
    ("entity", CanonicalField::Country),
    ("country_name", CanonicalField::Country),
    ("overall_aqi_value", CanonicalField::AqiValue),
    ("overall_aqi_category", CanonicalField::AqiCategory),
    ("iso_code", CanonicalField::Code),
    ("ozone", CanonicalField::Concentration(Pollutant::Ozone)),
    ("pm2_5", CanonicalField::PM25),
    (
        "concentrations_of_fine_particulate_matter_pm25_-_residence_area_type:_total",
        CanonicalField::PM25,
    ),
];

impl Default for RuleTable {
    fn default() -> Self {
        RuleTable::with_aliases(&[])
    }
}

impl RuleTable {
    /// The default table with `extra` exact aliases placed right after the
    /// canonical-name rules.
    pub fn with_aliases(extra: &[(String, CanonicalField)]) -> Self {
        use CanonicalField::*;
        use Pollutant::*;

        let mut rules: Vec<Rule> = CanonicalField::all()
            .into_iter()
            .map(|field| Rule {
                pattern: exact(field.name()),
                field,
            })
            .collect();

        rules.extend(extra.iter().map(|(raw, field)| Rule {
            pattern: exact(raw),
            field: *field,
        }));
        rules.extend(ALIASES.iter().map(|(raw, field)| Rule {
            pattern: exact(raw),
            field: *field,
        }));

        let heuristics = [
            (contains(&["pm25", "aqi_value"], &[]), PollutantAqiValue(Pm25)),
            (contains(&["pm25", "aqi_category"], &[]), PollutantAqiCategory(Pm25)),
            (contains(&["no2", "aqi_value"], &[]), PollutantAqiValue(No2)),
            (contains(&["no2", "aqi_category"], &[]), PollutantAqiCategory(No2)),
            (contains(&["ozone", "aqi_value"], &[]), PollutantAqiValue(Ozone)),
            (contains(&["o3", "aqi_value"], &[]), PollutantAqiValue(Ozone)),
            (contains(&["ozone", "aqi_category"], &[]), PollutantAqiCategory(Ozone)),
            (contains(&["o3", "aqi_category"], &[]), PollutantAqiCategory(Ozone)),
            (
                Pattern::Prefixed { prefix: "co_", all: vec!["aqi_value"] },
                PollutantAqiValue(Co),
            ),
            (
                Pattern::Prefixed { prefix: "co_", all: vec!["aqi_category"] },
                PollutantAqiCategory(Co),
            ),
            (contains(&["pm25"], &["aqi"]), Concentration(Pm25)),
            (contains(&["particulate"], &["aqi"]), Concentration(Pm25)),
            (contains(&["country"], &["code"]), Country),
            (contains(&["year"], &[]), Year),
        ];
        rules.extend(
            heuristics
                .into_iter()
                .map(|(pattern, field)| Rule { pattern, field }),
        );

        RuleTable { rules }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Map canonical fields to columns of `columns` (normalized names).
    ///
    /// Rules run in order; a rule for an already-resolved field is skipped.
    /// Within a rule, the first unclaimed matching column (file order) wins
    /// and any other matching unclaimed columns are reported as ambiguities.
    pub fn resolve(&self, columns: &[String]) -> SchemaMapping {
        let mut mapping = SchemaMapping::default();
        let mut claimed: BTreeSet<&str> = BTreeSet::new();

        for rule in &self.rules {
            if mapping.fields.contains_key(&rule.field) {
                continue;
            }
            let mut candidates = columns
                .iter()
                .filter(|c| !claimed.contains(c.as_str()) && rule.pattern.matches(c));

            let Some(winner) = candidates.next() else {
                continue;
            };
            let ignored: Vec<String> = candidates.cloned().collect();

            debug!("resolved `{}` ← column `{winner}`", rule.field);
            if !ignored.is_empty() {
                warn!(
                    "column `{winner}` chosen for `{}`; also matching: {}",
                    rule.field,
                    ignored.join(", ")
                );
                mapping.ambiguities.push(Ambiguity {
                    field: rule.field,
                    chosen: winner.clone(),
                    ignored,
                });
            }
            claimed.insert(winner.as_str());
            mapping.fields.insert(rule.field, winner.clone());
        }
        mapping
    }
}

// ---------------------------------------------------------------------------
// Resolution result
// ---------------------------------------------------------------------------

/// Several columns matched the same field; only `chosen` was kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ambiguity {
    pub field: CanonicalField,
    pub chosen: String,
    pub ignored: Vec<String>,
}

/// Canonical field → raw column name. Absent fields are simply missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchemaMapping {
    fields: BTreeMap<CanonicalField, String>,
    ambiguities: Vec<Ambiguity>,
}

impl SchemaMapping {
    pub fn get(&self, field: CanonicalField) -> Option<&str> {
        self.fields.get(&field).map(String::as_str)
    }

    pub fn contains(&self, field: CanonicalField) -> bool {
        self.fields.contains_key(&field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (CanonicalField, &String)> {
        self.fields.iter().map(|(f, c)| (*f, c))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn ambiguities(&self) -> &[Ambiguity] {
        &self.ambiguities
    }

    /// Resolved metric fields, in canonical order.
    pub fn metrics(&self) -> Vec<CanonicalField> {
        self.fields.keys().copied().filter(|f| f.is_metric()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::loader::normalize_column_name;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| normalize_column_name(s)).collect()
    }

    #[test]
    fn country_resolves_regardless_of_case_and_spacing() {
        let table = RuleTable::default();
        for raw in ["Country", "Country ", "COUNTRY", "  country"] {
            let mapping = table.resolve(&cols(&[raw, "AQI Value"]));
            assert_eq!(mapping.get(CanonicalField::Country), Some("country"), "{raw:?}");
        }
    }

    #[test]
    fn kaggle_snapshot_headers() {
        let columns = cols(&[
            "Country",
            "City",
            "AQI Value",
            "AQI Category",
            "CO AQI Value",
            "CO AQI Category",
            "Ozone AQI Value",
            "Ozone AQI Category",
            "NO2 AQI Value",
            "NO2 AQI Category",
            "PM2.5 AQI Value",
            "PM2.5 AQI Category",
        ]);
        let mapping = RuleTable::default().resolve(&columns);

        assert_eq!(mapping.len(), 12);
        for (field, col) in mapping.iter() {
            assert_eq!(field.name(), col.as_str());
        }
        assert!(!mapping.contains(CanonicalField::PM25));
        assert!(mapping.ambiguities().is_empty());
    }

    #[test]
    fn owid_series_headers() {
        let columns = cols(&[
            "Entity",
            "Code",
            "Year",
            "Concentrations of fine particulate matter (PM2.5) - Residence area type: Total",
        ]);
        let mapping = RuleTable::default().resolve(&columns);

        assert_eq!(mapping.get(CanonicalField::Country), Some("entity"));
        assert_eq!(mapping.get(CanonicalField::Code), Some("code"));
        assert_eq!(mapping.get(CanonicalField::Year), Some("year"));
        assert_eq!(
            mapping.get(CanonicalField::PM25),
            Some("concentrations_of_fine_particulate_matter_pm25_-_residence_area_type:_total")
        );
    }

    #[test]
    fn aliases_and_substring_heuristics() {
        let mapping = RuleTable::default().resolve(&cols(&[
            "Overall AQI Value",
            "PM2.5 AQI Value (index)",
            "co_aqi_value_max",
            "Country Name",
        ]));
        assert_eq!(mapping.get(CanonicalField::AqiValue), Some("overall_aqi_value"));
        assert_eq!(
            mapping.get(CanonicalField::PollutantAqiValue(Pollutant::Pm25)),
            Some("pm25_aqi_value_index")
        );
        assert_eq!(
            mapping.get(CanonicalField::PollutantAqiValue(Pollutant::Co)),
            Some("co_aqi_value_max")
        );
        assert_eq!(mapping.get(CanonicalField::Country), Some("country_name"));
    }

    #[test]
    fn canonical_name_beats_alias() {
        let mapping = RuleTable::default().resolve(&cols(&["Entity", "Country"]));
        assert_eq!(mapping.get(CanonicalField::Country), Some("country"));
    }

    #[test]
    fn first_match_wins_and_is_recorded() {
        let mapping = RuleTable::default().resolve(&cols(&["PM2.5 mean", "PM2.5 median"]));
        assert_eq!(mapping.get(CanonicalField::PM25), Some("pm25_mean"));
        assert_eq!(
            mapping.ambiguities(),
            &[Ambiguity {
                field: CanonicalField::PM25,
                chosen: "pm25_mean".to_string(),
                ignored: vec!["pm25_median".to_string()],
            }]
        );
    }

    #[test]
    fn resolution_is_idempotent_on_canonical_names() {
        let table = RuleTable::default();
        let canonical: Vec<String> = CanonicalField::all()
            .into_iter()
            .map(|f| f.name().to_string())
            .collect();

        let first = table.resolve(&canonical);
        let second = table.resolve(&canonical);
        assert_eq!(first, second);
        assert_eq!(first.len(), canonical.len());
        for (field, col) in first.iter() {
            assert_eq!(field.name(), col.as_str());
        }
    }

    #[test]
    fn unmatched_fields_are_absent() {
        let mapping = RuleTable::default().resolve(&cols(&["station", "reading"]));
        assert!(mapping.is_empty());
        assert_eq!(mapping.get(CanonicalField::Country), None);
    }

    #[test]
    fn field_names_round_trip_through_from_str() {
        for field in CanonicalField::all() {
            assert_eq!(field.name().parse::<CanonicalField>(), Ok(field));
        }
        assert!("pollution".parse::<CanonicalField>().is_err());
    }

    #[test]
    fn extra_aliases_take_priority_over_heuristics() {
        let table = RuleTable::with_aliases(&[("nation".to_string(), CanonicalField::Country)]);
        let mapping = table.resolve(&cols(&["Country code", "Nation"]));
        assert_eq!(mapping.get(CanonicalField::Country), Some("nation"));
    }
}
