use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Serialize, Serializer};

use super::schema::{CanonicalField, RuleTable, SchemaMapping};
use crate::error::{DataError, Result};

/// One cell of a loaded file.
///
/// Cells land in `BTreeSet`s for distinct-value lookups, so `Value` is `Ord`.
/// Floats compare with `total_cmp`; equality follows the same ordering.
#[derive(Debug, Clone)]
pub enum Value {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Null,
}

impl Value {
    /// Cross-variant sort position: missing cells first, text last.
    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Integer(_) => 2,
            Value::Float(_) => 3,
            Value::String(_) => 4,
        }
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{s}"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v:.4}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Null => write!(f, "<null>"),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::String(s) => serializer.serialize_str(s),
            Value::Integer(i) => serializer.serialize_i64(*i),
            Value::Float(v) if v.is_nan() => serializer.serialize_none(),
            Value::Float(v) => serializer.serialize_f64(*v),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Null => serializer.serialize_none(),
        }
    }
}

impl Value {
    /// Numeric view of the value. NaN counts as missing and yields `None`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) if v.is_nan() => None,
            Value::Float(v) => Some(*v),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Integral view, accepting floats without a fractional part (`2015.0`).
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Float(v) if v.is_finite() && v.fract() == 0.0 => Some(*v as i64),
            _ => None,
        }
    }

    /// Whether the cell holds no usable value.
    pub fn is_missing(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Float(v) => v.is_nan(),
            _ => false,
        }
    }

    /// Text key used for grouping and set membership (country, category).
    pub fn as_key(&self) -> Option<String> {
        match self {
            Value::String(s) => Some(s.clone()),
            Value::Integer(i) => Some(i.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Float(v) if !v.is_nan() => Some(v.to_string()),
            _ => None,
        }
    }
}

// -- rows --

/// A single row: normalized column name → value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Record {
    pub fields: BTreeMap<String, Value>,
}

impl Record {
    pub fn new(fields: BTreeMap<String, Value>) -> Self {
        Record { fields }
    }

    /// Cell for `column`; absent columns read as `Null`.
    pub fn get(&self, column: &str) -> &Value {
        static NULL: Value = Value::Null;
        self.fields.get(column).unwrap_or(&NULL)
    }
}

// -- whole table --

/// A loaded table: rows, file-order column names, distinct values per
/// column and the resolved schema.
#[derive(Debug, Clone)]
pub struct Dataset {
    /// All records (rows), in file order.
    pub records: Vec<Record>,
    /// Column names in file order.
    pub column_names: Vec<String>,
    /// For each column the sorted set of unique values.
    pub unique_values: BTreeMap<String, BTreeSet<Value>>,
    /// Canonical fields resolved for this dataset (field → source column).
    pub schema: SchemaMapping,
}

impl Dataset {
    /// Build column indices from the loaded records. No schema is resolved yet.
    pub fn from_records(column_names: Vec<String>, records: Vec<Record>) -> Self {
        let unique_values = index_unique_values(&column_names, &records);
        Dataset {
            records,
            column_names,
            unique_values,
            schema: SchemaMapping::default(),
        }
    }

    /// Resolve canonical fields with `rules` and rename the matched columns
    /// to their canonical names. Applying it twice changes nothing.
    pub fn canonicalize(self, rules: &RuleTable) -> Self {
        let schema = rules.resolve(&self.column_names);
        let renames: BTreeMap<String, &'static str> = schema
            .iter()
            .filter(|(field, source)| field.name() != source.as_str())
            .map(|(field, source)| (source.clone(), field.name()))
            .collect();

        if renames.is_empty() {
            return Dataset { schema, ..self };
        }

        let rename = |col: String| match renames.get(&col) {
            Some(canonical) => canonical.to_string(),
            None => col,
        };

        let column_names: Vec<String> = self.column_names.into_iter().map(rename).collect();
        let records: Vec<Record> = self
            .records
            .into_iter()
            .map(|rec| Record::new(rec.fields.into_iter().map(|(k, v)| (rename(k), v)).collect()))
            .collect();
        let unique_values = self
            .unique_values
            .into_iter()
            .map(|(k, v)| (rename(k), v))
            .collect();

        Dataset {
            records,
            column_names,
            unique_values,
            schema,
        }
    }

    /// A new dataset with the same columns and schema holding `records`.
    pub fn derive(&self, records: Vec<Record>) -> Self {
        let unique_values = index_unique_values(&self.column_names, &records);
        Dataset {
            records,
            column_names: self.column_names.clone(),
            unique_values,
            schema: self.schema.clone(),
        }
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the dataset is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Column holding `field`, if it was resolved.
    pub fn column(&self, field: CanonicalField) -> Option<&'static str> {
        self.schema.contains(field).then(|| field.name())
    }

    /// Like [`Dataset::column`] but absence is a [`DataError::MissingField`].
    pub fn require(&self, field: CanonicalField) -> Result<&'static str> {
        self.column(field).ok_or_else(|| DataError::MissingField {
            field,
            available: self.column_names.clone(),
        })
    }

    /// A column is numeric when it holds at least one number and nothing
    /// else besides missing values.
    pub fn is_numeric_column(&self, column: &str) -> bool {
        match self.unique_values.get(column) {
            Some(values) => {
                let mut any_number = false;
                for v in values {
                    match v {
                        Value::Integer(_) | Value::Float(_) => any_number = true,
                        Value::Null => {}
                        _ => return false,
                    }
                }
                any_number
            }
            None => false,
        }
    }

    /// Column for the metric `field`, falling back to the first numeric
    /// column not claimed by a non-metric field (and not `year` / `code`).
    pub fn metric_or_fallback(&self, field: CanonicalField) -> Option<String> {
        if let Some(col) = self.column(field) {
            return Some(col.to_string());
        }
        let reserved: BTreeSet<&str> = self
            .schema
            .iter()
            .filter(|(f, _)| !f.is_metric())
            .map(|(f, _)| f.name())
            .chain(["year", "code"])
            .collect();

        self.column_names
            .iter()
            .find(|col| !reserved.contains(col.as_str()) && self.is_numeric_column(col))
            .cloned()
    }

    /// Sorted distinct non-missing values of `column`, as text keys.
    pub fn distinct_keys(&self, column: &str) -> Vec<String> {
        let keys: BTreeSet<String> = self
            .unique_values
            .get(column)
            .into_iter()
            .flatten()
            .filter_map(Value::as_key)
            .collect();
        keys.into_iter().collect()
    }

    /// Numeric values of `column`, missing cells skipped.
    pub fn numbers<'a>(&'a self, column: &'a str) -> impl Iterator<Item = f64> + 'a {
        self.records.iter().filter_map(move |r| r.get(column).as_f64())
    }
}

fn index_unique_values(
    column_names: &[String],
    records: &[Record],
) -> BTreeMap<String, BTreeSet<Value>> {
    let mut unique_values: BTreeMap<String, BTreeSet<Value>> = column_names
        .iter()
        .map(|c| (c.clone(), BTreeSet::new()))
        .collect();

    for rec in records {
        for (col, val) in &rec.fields {
            unique_values
                .entry(col.clone())
                .or_default()
                .insert(val.clone());
        }
    }
    unique_values
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(pairs: &[(&str, Value)]) -> Record {
        Record::new(pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect())
    }

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn values_sort_missing_first_and_text_last() {
        let mut values = vec![
            Value::String("Good".into()),
            Value::Float(2.5),
            Value::Null,
            Value::Integer(7),
            Value::Bool(true),
        ];
        values.sort();
        assert_eq!(
            values,
            vec![
                Value::Null,
                Value::Bool(true),
                Value::Integer(7),
                Value::Float(2.5),
                Value::String("Good".into()),
            ]
        );
        assert_eq!(Value::Float(f64::NAN), Value::Float(f64::NAN));
        assert_ne!(Value::Integer(1), Value::Float(1.0));
    }

    #[test]
    fn nan_is_missing() {
        assert_eq!(Value::Float(f64::NAN).as_f64(), None);
        assert!(Value::Float(f64::NAN).is_missing());
        assert!(Value::Null.is_missing());
        assert_eq!(Value::Integer(3).as_f64(), Some(3.0));
        assert_eq!(Value::Float(2015.0).as_i64(), Some(2015));
        assert_eq!(Value::Float(2015.5).as_i64(), None);
    }

    #[test]
    fn canonicalize_renames_aliases() {
        let ds = Dataset::from_records(
            cols(&["entity", "year", "value"]),
            vec![rec(&[
                ("entity", Value::String("Chad".into())),
                ("year", Value::Integer(2012)),
                ("value", Value::Float(40.5)),
            ])],
        )
        .canonicalize(&RuleTable::default());

        assert_eq!(ds.column_names, cols(&["country", "year", "value"]));
        assert_eq!(ds.records[0].get("country"), &Value::String("Chad".into()));
        assert_eq!(ds.column(CanonicalField::Country), Some("country"));
        assert!(ds.unique_values.contains_key("country"));
        assert!(!ds.unique_values.contains_key("entity"));
    }

    #[test]
    fn metric_fallback_skips_year_and_code() {
        let ds = Dataset::from_records(
            cols(&["entity", "code", "year", "concentration"]),
            vec![rec(&[
                ("entity", Value::String("Chad".into())),
                ("code", Value::String("TCD".into())),
                ("year", Value::Integer(2012)),
                ("concentration", Value::Float(40.5)),
            ])],
        )
        .canonicalize(&RuleTable::default());

        assert_eq!(ds.column(CanonicalField::PM25), None);
        assert_eq!(
            ds.metric_or_fallback(CanonicalField::PM25).as_deref(),
            Some("concentration")
        );
    }

    #[test]
    fn numeric_column_detection() {
        let ds = Dataset::from_records(
            cols(&["a", "b", "c"]),
            vec![
                rec(&[("a", Value::Integer(1)), ("b", Value::String("x".into())), ("c", Value::Null)]),
                rec(&[("a", Value::Null), ("b", Value::Integer(2)), ("c", Value::Null)]),
            ],
        );
        assert!(ds.is_numeric_column("a"));
        assert!(!ds.is_numeric_column("b"));
        assert!(!ds.is_numeric_column("c"));
    }
}
