use std::collections::BTreeSet;

use log::warn;

use super::model::{Dataset, Record};
use super::schema::CanonicalField;
use crate::error::Result;

// ---------------------------------------------------------------------------
// Predicates: which records a view keeps
// ---------------------------------------------------------------------------

/// User-chosen constraints. Every part is optional; an empty set means
/// "no constraint" for that part.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predicates {
    /// Keep records whose `aqi_category` is in this set.
    pub categories: BTreeSet<String>,
    /// Keep records whose metric is ≥ this value.
    pub threshold: Option<f64>,
    /// Keep records with `lo <= year <= hi`.
    pub year_range: Option<(i64, i64)>,
    /// Keep records whose `country` is in this set.
    pub countries: BTreeSet<String>,
}

impl Predicates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select every category present in `dataset` (i.e., show everything).
    pub fn all_categories(dataset: &Dataset) -> BTreeSet<String> {
        match dataset.column(CanonicalField::AqiCategory) {
            Some(col) => dataset.distinct_keys(col).into_iter().collect(),
            None => BTreeSet::new(),
        }
    }

    pub fn with_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories = categories.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn with_year_range(mut self, lo: i64, hi: i64) -> Self {
        self.year_range = Some((lo.min(hi), lo.max(hi)));
        self
    }

    pub fn with_countries<I, S>(mut self, countries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.countries = countries.into_iter().map(Into::into).collect();
        self
    }
}

/// Return a new dataset holding the records of `dataset` that pass every
/// active predicate. `metric` is the column the threshold applies to.
///
/// A record passes when:
/// * its category is selected, or the selection covers every category of the
///   dataset (no effective filter), or the dataset has no category column
/// * its country is selected (requires `country`)
/// * its year lies in the range (requires `year`); missing years fail
/// * its metric is ≥ the threshold; missing metric values fail
pub fn filter(dataset: &Dataset, metric: &str, predicates: &Predicates) -> Result<Dataset> {
    let category_col = if predicates.categories.is_empty() {
        None
    } else {
        match dataset.column(CanonicalField::AqiCategory) {
            Some(col) => {
                let all = Predicates::all_categories(dataset);
                if all.is_subset(&predicates.categories) {
                    // everything selected, no filtering needed
                    None
                } else {
                    Some(col)
                }
            }
            None => {
                warn!("category filter ignored: dataset has no `aqi_category` column");
                None
            }
        }
    };

    let country_col = if predicates.countries.is_empty() {
        None
    } else {
        Some(dataset.require(CanonicalField::Country)?)
    };

    let year_col = match predicates.year_range {
        Some(_) => Some(dataset.require(CanonicalField::Year)?),
        None => None,
    };

    let keep = |rec: &Record| -> bool {
        if let Some(col) = category_col {
            match rec.get(col).as_key() {
                Some(cat) if predicates.categories.contains(&cat) => {}
                _ => return false,
            }
        }
        if let Some(col) = country_col {
            match rec.get(col).as_key() {
                Some(country) if predicates.countries.contains(&country) => {}
                _ => return false,
            }
        }
        if let (Some(col), Some((lo, hi))) = (year_col, predicates.year_range) {
            match rec.get(col).as_i64() {
                Some(year) if (lo..=hi).contains(&year) => {}
                _ => return false,
            }
        }
        if let Some(threshold) = predicates.threshold {
            match rec.get(metric).as_f64() {
                Some(v) if v >= threshold => {}
                _ => return false,
            }
        }
        true
    };

    let records: Vec<Record> = dataset.records.iter().filter(|r| keep(r)).cloned().collect();
    Ok(dataset.derive(records))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::Value;
    use crate::data::schema::RuleTable;
    use crate::error::DataError;

    fn dataset(rows: &[(&str, Option<f64>, &str, i64)]) -> Dataset {
        let columns: Vec<String> = ["country", "aqi_value", "aqi_category", "year"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let records = rows
            .iter()
            .map(|(country, aqi, cat, year)| {
                Record::new(
                    [
                        ("country".to_string(), Value::String(country.to_string())),
                        ("aqi_value".to_string(), aqi.map_or(Value::Null, Value::Float)),
                        ("aqi_category".to_string(), Value::String(cat.to_string())),
                        ("year".to_string(), Value::Integer(*year)),
                    ]
                    .into_iter()
                    .collect(),
                )
            })
            .collect();
        Dataset::from_records(columns, records).canonicalize(&RuleTable::default())
    }

    fn sample() -> Dataset {
        dataset(&[
            ("USA", Some(50.0), "Good", 2015),
            ("USA", Some(120.0), "Unhealthy", 2016),
            ("India", Some(160.0), "Unhealthy", 2017),
            ("Chad", None, "Good", 2018),
        ])
    }

    #[test]
    fn no_predicates_keeps_everything() {
        let ds = sample();
        let out = filter(&ds, "aqi_value", &Predicates::new()).unwrap();
        assert_eq!(out.len(), 4);
    }

    #[test]
    fn category_subset_filters() {
        let ds = sample();
        let out = filter(&ds, "aqi_value", &Predicates::new().with_categories(["Good"])).unwrap();
        assert_eq!(out.len(), 2);
        assert!(out
            .records
            .iter()
            .all(|r| r.get("aqi_category") == &Value::String("Good".into())));
    }

    #[test]
    fn full_category_set_is_no_filter() {
        let ds = sample();
        let all = Predicates::all_categories(&ds);
        let out = filter(&ds, "aqi_value", &Predicates::new().with_categories(all)).unwrap();
        assert_eq!(out.records, ds.records);
    }

    #[test]
    fn threshold_drops_missing_and_low_values() {
        let ds = sample();
        let out = filter(&ds, "aqi_value", &Predicates::new().with_threshold(100.0)).unwrap();
        assert_eq!(out.len(), 2);

        let out = filter(&ds, "aqi_value", &Predicates::new().with_threshold(0.0)).unwrap();
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn year_range_is_inclusive() {
        let ds = sample();
        let out = filter(&ds, "aqi_value", &Predicates::new().with_year_range(2016, 2017)).unwrap();
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn country_selection() {
        let ds = sample();
        let out = filter(&ds, "aqi_value", &Predicates::new().with_countries(["USA"])).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out.distinct_keys("country"), vec!["USA"]);
    }

    #[test]
    fn year_range_without_year_column_is_missing_field() {
        let ds = Dataset::from_records(vec!["country".to_string()], Vec::new())
            .canonicalize(&RuleTable::default());
        let err = filter(&ds, "aqi_value", &Predicates::new().with_year_range(2010, 2019))
            .unwrap_err();
        assert!(matches!(
            err,
            DataError::MissingField { field: CanonicalField::Year, .. }
        ));
    }

    #[test]
    fn source_dataset_is_untouched() {
        let ds = sample();
        let _ = filter(&ds, "aqi_value", &Predicates::new().with_threshold(1000.0)).unwrap();
        assert_eq!(ds.len(), 4);
    }
}
