//! Derived tables behind the dashboard's summary, country and trend views.

use std::collections::BTreeMap;

use serde::Serialize;

use super::aggregate::mean;
use super::filter::{filter, Predicates};
use super::model::Dataset;
use super::schema::{CanonicalField, Pollutant};
use crate::error::{DataError, Result};

/// Countries shown first when they exist.
const PREFERRED_COUNTRY: &str = "Malaysia";
const PREFERRED_TREND_COUNTRIES: [&str; 4] = ["Malaysia", "China", "India", "United States"];
/// Trends start no earlier than this year by default.
const DEFAULT_TREND_START: i64 = 2010;

// ---------------------------------------------------------------------------
// AQI summary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AqiSummary {
    pub records: usize,
    pub mean_aqi: Option<f64>,
    pub mean_pm25: Option<f64>,
    pub category_counts: BTreeMap<String, usize>,
}

/// Global means and per-category record counts. Absent fields stay `None`
/// (or empty) instead of failing.
pub fn aqi_summary(dataset: &Dataset) -> AqiSummary {
    let mean_of = |field: CanonicalField| dataset.column(field).and_then(|c| mean(dataset.numbers(c)));

    let mut category_counts = BTreeMap::new();
    if let Some(col) = dataset.column(CanonicalField::AqiCategory) {
        for rec in &dataset.records {
            if let Some(cat) = rec.get(col).as_key() {
                *category_counts.entry(cat).or_insert(0) += 1;
            }
        }
    }

    AqiSummary {
        records: dataset.len(),
        mean_aqi: mean_of(CanonicalField::AqiValue),
        mean_pm25: mean_of(CanonicalField::PM25),
        category_counts,
    }
}

// ---------------------------------------------------------------------------
// Country pollutant breakdown
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PollutantMean {
    pub pollutant: CanonicalField,
    pub value: f64,
}

/// Pollutant columns to compare: concentrations when the dataset has any,
/// otherwise the per-pollutant AQI values.
pub fn pollutant_fields(dataset: &Dataset) -> Vec<CanonicalField> {
    let present = |fields: Vec<CanonicalField>| -> Vec<CanonicalField> {
        fields.into_iter().filter(|f| dataset.column(*f).is_some()).collect()
    };
    let order = [Pollutant::Pm25, Pollutant::No2, Pollutant::Ozone, Pollutant::Co];

    let concentrations = present(order.map(CanonicalField::Concentration).to_vec());
    if !concentrations.is_empty() {
        return concentrations;
    }
    present(order.map(CanonicalField::PollutantAqiValue).to_vec())
}

/// Mean of every pollutant column for the records of `country`.
/// Pollutants without any value for that country are left out.
pub fn pollutant_means(dataset: &Dataset, country: &str) -> Result<Vec<PollutantMean>> {
    let country_col = dataset.require(CanonicalField::Country)?;
    let fields = pollutant_fields(dataset);

    let subset: Vec<_> = dataset
        .records
        .iter()
        .filter(|r| r.get(country_col).as_key().as_deref() == Some(country))
        .collect();

    Ok(fields
        .into_iter()
        .filter_map(|pollutant| {
            let col = pollutant.name();
            mean(subset.iter().filter_map(|r| r.get(col).as_f64()))
                .map(|value| PollutantMean { pollutant, value })
        })
        .collect())
}

/// "Malaysia" when present, otherwise the first country.
pub fn default_country(countries: &[String]) -> Option<String> {
    countries
        .iter()
        .find(|c| c.as_str() == PREFERRED_COUNTRY)
        .or_else(|| countries.first())
        .cloned()
}

// ---------------------------------------------------------------------------
// PM2.5 trends
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub country: String,
    pub year: i64,
    pub value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trend {
    /// Column the values were read from (`pm25` or a numeric fallback).
    pub value_column: String,
    pub points: Vec<TrendPoint>,
}

/// Yearly PM2.5 values of `countries` within `year_range`, sorted by
/// country then year.
pub fn pm25_trend(
    dataset: &Dataset,
    countries: &[String],
    year_range: (i64, i64),
) -> Result<Trend> {
    let country_col = dataset.require(CanonicalField::Country)?;
    let year_col = dataset.require(CanonicalField::Year)?;
    let value_column = dataset
        .metric_or_fallback(CanonicalField::PM25)
        .ok_or_else(|| DataError::MissingField {
            field: CanonicalField::PM25,
            available: dataset.column_names.clone(),
        })?;

    let predicates = Predicates::new()
        .with_countries(countries.iter().cloned())
        .with_year_range(year_range.0, year_range.1);
    let selected = filter(dataset, &value_column, &predicates)?;

    let mut points: Vec<TrendPoint> = selected
        .records
        .iter()
        .filter_map(|r| {
            Some(TrendPoint {
                country: r.get(country_col).as_key()?,
                year: r.get(year_col).as_i64()?,
                value: r.get(&value_column).as_f64(),
            })
        })
        .collect();
    points.sort_by(|a, b| a.country.cmp(&b.country).then(a.year.cmp(&b.year)));

    Ok(Trend {
        value_column,
        points,
    })
}

/// The preferred countries that exist, else the first three.
pub fn default_trend_countries(countries: &[String]) -> Vec<String> {
    let preferred: Vec<String> = PREFERRED_TREND_COUNTRIES
        .iter()
        .filter(|p| countries.iter().any(|c| c == *p))
        .map(|p| p.to_string())
        .collect();
    if preferred.is_empty() {
        countries.iter().take(3).cloned().collect()
    } else {
        preferred
    }
}

/// `(max(first_year, 2010), last_year)`, or `None` without any year.
pub fn default_year_range(dataset: &Dataset) -> Option<(i64, i64)> {
    let col = dataset.column(CanonicalField::Year)?;
    let years = dataset.records.iter().filter_map(|r| r.get(col).as_i64());
    let (lo, hi) = years.fold(None, |acc: Option<(i64, i64)>, y| match acc {
        None => Some((y, y)),
        Some((lo, hi)) => Some((lo.min(y), hi.max(y))),
    })?;
    Some((lo.max(DEFAULT_TREND_START).min(hi), hi))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{Record, Value};
    use crate::data::schema::RuleTable;

    fn build(columns: &[&str], rows: Vec<Vec<Value>>) -> Dataset {
        let columns: Vec<String> = columns.iter().map(|s| s.to_string()).collect();
        let records = rows
            .into_iter()
            .map(|row| Record::new(columns.iter().cloned().zip(row).collect()))
            .collect();
        Dataset::from_records(columns, records).canonicalize(&RuleTable::default())
    }

    fn s(v: &str) -> Value {
        Value::String(v.to_string())
    }

    fn snapshot() -> Dataset {
        build(
            &["country", "aqi_value", "aqi_category", "pm25_aqi_value", "no2_aqi_value"],
            vec![
                vec![s("Malaysia"), Value::Integer(60), s("Moderate"), Value::Integer(40), Value::Integer(2)],
                vec![s("Malaysia"), Value::Integer(80), s("Moderate"), Value::Integer(60), Value::Null],
                vec![s("Chad"), Value::Integer(150), s("Unhealthy"), Value::Integer(150), Value::Integer(1)],
            ],
        )
    }

    fn series() -> Dataset {
        build(
            &["entity", "code", "year", "concentrations"],
            vec![
                vec![s("India"), s("IND"), Value::Integer(2009), Value::Float(90.0)],
                vec![s("India"), s("IND"), Value::Integer(2011), Value::Float(88.0)],
                vec![s("India"), s("IND"), Value::Integer(2010), Value::Float(91.0)],
                vec![s("Chad"), s("TCD"), Value::Integer(2010), Value::Null],
                vec![s("Peru"), s("PER"), Value::Integer(2010), Value::Float(20.0)],
            ],
        )
    }

    #[test]
    fn summary_counts_and_means() {
        let summary = aqi_summary(&snapshot());
        assert_eq!(summary.records, 3);
        assert_eq!(summary.mean_aqi, Some(290.0 / 3.0));
        assert_eq!(summary.mean_pm25, None);
        assert_eq!(summary.category_counts.get("Moderate"), Some(&2));
        assert_eq!(summary.category_counts.get("Unhealthy"), Some(&1));
    }

    fn concentration_snapshot() -> Dataset {
        build(
            &["country", "co", "aqi_value", "o3", "pm25_aqi_value", "no2", "pm25", "no2_aqi_value"],
            vec![
                vec![
                    s("Malaysia"),
                    Value::Float(0.5),
                    Value::Integer(70),
                    Value::Float(30.0),
                    Value::Integer(66),
                    Value::Float(12.0),
                    Value::Float(20.0),
                    Value::Integer(9),
                ],
                vec![
                    s("Malaysia"),
                    Value::Float(1.5),
                    Value::Integer(90),
                    Value::Null,
                    Value::Integer(88),
                    Value::Float(14.0),
                    Value::Float(30.0),
                    Value::Integer(11),
                ],
                vec![
                    s("Chad"),
                    Value::Null,
                    Value::Integer(150),
                    Value::Float(40.0),
                    Value::Integer(150),
                    Value::Float(5.0),
                    Value::Float(55.0),
                    Value::Integer(3),
                ],
            ],
        )
    }

    #[test]
    fn concentrations_win_over_aqi_sub_indices() {
        let ds = concentration_snapshot();
        assert_eq!(
            pollutant_fields(&ds),
            vec![
                CanonicalField::Concentration(Pollutant::Pm25),
                CanonicalField::Concentration(Pollutant::No2),
                CanonicalField::Concentration(Pollutant::Ozone),
                CanonicalField::Concentration(Pollutant::Co),
            ]
        );

        let means = pollutant_means(&ds, "Malaysia").unwrap();
        let got: Vec<(&str, f64)> = means.iter().map(|m| (m.pollutant.name(), m.value)).collect();
        assert_eq!(got, vec![("pm25", 25.0), ("no2", 13.0), ("o3", 30.0), ("co", 1.0)]);

        let chad = pollutant_means(&ds, "Chad").unwrap();
        assert!(chad.iter().all(|m| m.pollutant != CanonicalField::Concentration(Pollutant::Co)));
    }

    #[test]
    fn summary_reports_pm25_concentration_mean() {
        let summary = aqi_summary(&concentration_snapshot());
        assert_eq!(summary.mean_pm25, Some(35.0));
        assert_eq!(summary.mean_aqi, Some(310.0 / 3.0));
        assert!(summary.category_counts.is_empty());
    }

    #[test]
    fn pollutant_means_fall_back_to_aqi_sub_indices() {
        let means = pollutant_means(&snapshot(), "Malaysia").unwrap();
        assert_eq!(
            means,
            vec![
                PollutantMean {
                    pollutant: CanonicalField::PollutantAqiValue(Pollutant::Pm25),
                    value: 50.0
                },
                PollutantMean {
                    pollutant: CanonicalField::PollutantAqiValue(Pollutant::No2),
                    value: 2.0
                },
            ]
        );
    }

    #[test]
    fn pollutant_means_need_country() {
        let ds = build(&["station", "pm25"], vec![vec![s("A"), Value::Float(3.0)]]);
        assert!(matches!(
            pollutant_means(&ds, "Malaysia"),
            Err(DataError::MissingField { field: CanonicalField::Country, .. })
        ));
    }

    #[test]
    fn default_country_prefers_malaysia() {
        let countries = vec!["Chad".to_string(), "Malaysia".to_string()];
        assert_eq!(default_country(&countries).as_deref(), Some("Malaysia"));
        assert_eq!(default_country(&countries[..1]).as_deref(), Some("Chad"));
        assert_eq!(default_country(&[]), None);
    }

    #[test]
    fn trend_uses_numeric_fallback_and_sorts() {
        let trend = pm25_trend(
            &series(),
            &["India".to_string(), "Chad".to_string()],
            (2010, 2011),
        )
        .unwrap();

        assert_eq!(trend.value_column, "concentrations");
        let keys: Vec<(&str, i64)> = trend
            .points
            .iter()
            .map(|p| (p.country.as_str(), p.year))
            .collect();
        assert_eq!(keys, vec![("Chad", 2010), ("India", 2010), ("India", 2011)]);
        assert_eq!(trend.points[0].value, None);
        assert_eq!(trend.points[1].value, Some(91.0));
    }

    #[test]
    fn trend_requires_year() {
        let err = pm25_trend(&snapshot(), &["Chad".to_string()], (2010, 2020)).unwrap_err();
        assert!(matches!(
            err,
            DataError::MissingField { field: CanonicalField::Year, .. }
        ));
    }

    #[test]
    fn default_trend_selection() {
        let ds = series();
        let countries = ds.distinct_keys("country");
        assert_eq!(default_trend_countries(&countries), vec!["India"]);
        assert_eq!(
            default_trend_countries(&["A", "B", "C", "D"].map(String::from)),
            vec!["A", "B", "C"]
        );
        assert_eq!(default_year_range(&ds), Some((2010, 2011)));
        assert_eq!(default_year_range(&snapshot()), None);
    }
}
