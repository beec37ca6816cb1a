use std::collections::BTreeMap;

use serde::Serialize;

use super::filter::{filter, Predicates};
use super::model::{Dataset, Record, Value};
use super::schema::{CanonicalField, RuleTable};
use crate::error::Result;

/// Column name of the aggregated value in [`Aggregate::to_dataset`].
pub const METRIC_VALUE_COLUMN: &str = "metric_value";

/// Per-country mean of one metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Aggregate {
    pub metric: CanonicalField,
    pub by_country: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountryMean {
    pub country: String,
    pub value: f64,
}

impl Aggregate {
    pub fn len(&self) -> usize {
        self.by_country.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_country.is_empty()
    }

    pub fn get(&self, country: &str) -> Option<f64> {
        self.by_country.get(country).copied()
    }

    /// Rows ordered by descending mean; ties keep country order.
    pub fn sorted_desc(&self) -> Vec<CountryMean> {
        let mut rows: Vec<CountryMean> = self
            .by_country
            .iter()
            .map(|(country, value)| CountryMean {
                country: country.clone(),
                value: *value,
            })
            .collect();
        rows.sort_by(|a, b| b.value.total_cmp(&a.value));
        rows
    }

    /// The result as a two-column dataset (`country`, `metric_value`).
    pub fn to_dataset(&self) -> Dataset {
        let columns = vec![
            CanonicalField::Country.name().to_string(),
            METRIC_VALUE_COLUMN.to_string(),
        ];
        let records = self
            .by_country
            .iter()
            .map(|(country, value)| {
                Record::new(BTreeMap::from([
                    (columns[0].clone(), Value::String(country.clone())),
                    (columns[1].clone(), Value::Float(*value)),
                ]))
            })
            .collect();
        Dataset::from_records(columns, records).canonicalize(&RuleTable::default())
    }
}

/// Arithmetic mean ignoring missing values; `None` when nothing remains.
pub fn mean<I: IntoIterator<Item = f64>>(values: I) -> Option<f64> {
    let (sum, n) = values
        .into_iter()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

/// Group `dataset` by `key` and average `metric` per group.
///
/// Records with a missing key are dropped, missing metric values are
/// excluded from the mean and groups without any value are dropped.
pub fn group_mean(dataset: &Dataset, key: &str, metric: &str) -> BTreeMap<String, f64> {
    let mut groups: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for rec in &dataset.records {
        let Some(k) = rec.get(key).as_key() else {
            continue;
        };
        let values = groups.entry(k).or_default();
        if let Some(v) = rec.get(metric).as_f64() {
            values.push(v);
        }
    }
    groups
        .into_iter()
        .filter_map(|(k, values)| mean(values).map(|m| (k, m)))
        .collect()
}

/// Filter `dataset` with `predicates` and average `metric` per country.
///
/// Fails with `MissingField` when `metric` or `country` is absent. An empty
/// filtered set yields an empty aggregate.
pub fn filter_aggregate(
    dataset: &Dataset,
    metric: CanonicalField,
    predicates: &Predicates,
) -> Result<Aggregate> {
    let metric_col = dataset.require(metric)?;
    let country_col = dataset.require(CanonicalField::Country)?;

    let filtered = filter(dataset, metric_col, predicates)?;
    Ok(Aggregate {
        metric,
        by_country: group_mean(&filtered, country_col, metric_col),
    })
}
