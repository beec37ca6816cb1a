use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::path::Path;

use arrow::array::{Array, ArrayRef, AsArray};
use arrow::datatypes::{
    DataType, Float32Type, Float64Type, Int16Type, Int32Type, Int64Type, Int8Type, UInt32Type,
    UInt64Type,
};
use arrow::util::display::array_value_to_string;
use log::{info, warn};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::{Dataset, Record, Value};
use super::schema::RuleTable;
use crate::error::{DataError, Result};

/// Cell contents read as missing, on top of the empty string.
pub const NULL_TOKENS: &[&str] = &["NA", "N/A", "NaN", "nan", "null", "NULL", "None", "-"];

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load a dataset from a file, dispatching by extension, then resolve its
/// canonical fields with `rules`.
///
/// Supported formats:
/// * `.csv` / `.tsv` – header row plus delimited records
/// * `.json`         – `[{ "Country": "...", "AQI Value": 42, ... }, ...]`
/// * `.parquet`      – flat scalar columns
pub fn load_file(path: &Path, rules: &RuleTable) -> Result<Dataset> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let dataset = match ext.as_str() {
        "csv" => load_delimited(path, b',')?,
        "tsv" => load_delimited(path, b'\t')?,
        "json" => load_json(path)?,
        "parquet" | "pq" => load_parquet(path)?,
        other => return Err(DataError::UnsupportedFormat(other.to_string())),
    };

    let dataset = dataset.canonicalize(rules);
    info!(
        "loaded {} ({} records, {} columns, {} canonical fields)",
        path.display(),
        dataset.len(),
        dataset.column_names.len(),
        dataset.schema.len()
    );
    Ok(dataset)
}

/// Trim, lowercase, collapse whitespace runs into `_` and drop `.`, `(`, `)`.
///
/// `"PM2.5 (µg/m³)"` becomes `"pm25_µg/m³"`. Normalizing twice is a no-op.
pub fn normalize_column_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut in_space = false;
    for ch in raw.trim().chars() {
        if ch.is_whitespace() {
            if !in_space {
                out.push('_');
            }
            in_space = true;
            continue;
        }
        in_space = false;
        if matches!(ch, '.' | '(' | ')') {
            continue;
        }
        out.extend(ch.to_lowercase());
    }
    out
}

/// Normalize every header and suffix duplicates (`_2`, `_3`, …).
fn normalize_headers<'a>(raw: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut seen: BTreeSet<String> = BTreeSet::new();
    let mut out = Vec::new();
    for header in raw {
        let base = normalize_column_name(header);
        let mut name = base.clone();
        let mut n = 2;
        while seen.contains(&name) {
            name = format!("{base}_{n}");
            n += 1;
        }
        if name != base {
            warn!("duplicate column `{base}` (from {header:?}) renamed to `{name}`");
        }
        seen.insert(name.clone());
        out.push(name);
    }
    out
}

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => DataError::NotFound {
            path: path.to_path_buf(),
        },
        _ => DataError::Io(e),
    })
}

// ---------------------------------------------------------------------------
// Delimited text loader
// ---------------------------------------------------------------------------

fn load_delimited(path: &Path, delimiter: u8) -> Result<Dataset> {
    let file = open(path)?;
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .from_reader(file);

    let raw_headers = reader
        .headers()
        .map_err(|e| DataError::parse(path, format!("reading headers: {e}")))?
        .clone();
    if raw_headers.is_empty() {
        return Err(DataError::parse(path, "no header row"));
    }
    let headers = normalize_headers(raw_headers.iter());

    let mut records = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.map_err(|e| DataError::parse(path, format!("row {row_no}: {e}")))?;

        let fields: BTreeMap<String, Value> = headers
            .iter()
            .zip(record.iter())
            .map(|(col, cell)| (col.clone(), parse_cell(cell)))
            .collect();
        records.push(Record::new(fields));
    }

    Ok(Dataset::from_records(headers, records))
}

/// Infer a cell's type: null token, integer, float, boolean, then text.
pub fn parse_cell(raw: &str) -> Value {
    let s = raw.trim();
    if s.is_empty() || NULL_TOKENS.contains(&s) {
        return Value::Null;
    }
    if let Ok(i) = s.parse::<i64>() {
        return Value::Integer(i);
    }
    if let Ok(f) = s.parse::<f64>() {
        return Value::Float(f);
    }
    if s.eq_ignore_ascii_case("true") || s.eq_ignore_ascii_case("false") {
        return Value::Bool(s.eq_ignore_ascii_case("true"));
    }
    Value::String(s.to_string())
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Records-oriented JSON, the default `df.to_json(orient='records')`:
///
/// ```json
/// [
///   { "Country": "Chad", "AQI Value": 112, "AQI Category": "Unhealthy for Sensitive Groups" },
///   ...
/// ]
/// ```
fn load_json(path: &Path) -> Result<Dataset> {
    let text = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => DataError::NotFound {
            path: path.to_path_buf(),
        },
        std::io::ErrorKind::InvalidData => DataError::parse(path, e),
        _ => DataError::Io(e),
    })?;
    let root: JsonValue = serde_json::from_str(&text).map_err(|e| DataError::parse(path, e))?;

    let rows = root
        .as_array()
        .ok_or_else(|| DataError::parse(path, "expected top-level JSON array"))?;

    let mut headers: Vec<String> = Vec::new();
    let mut header_index: BTreeMap<String, String> = BTreeMap::new();
    let mut records = Vec::with_capacity(rows.len());

    for (i, row) in rows.iter().enumerate() {
        let obj = row
            .as_object()
            .ok_or_else(|| DataError::parse(path, format!("row {i} is not a JSON object")))?;

        let mut fields = BTreeMap::new();
        for (key, val) in obj {
            let col = match header_index.get(key) {
                Some(col) => col.clone(),
                None => {
                    let col = normalize_headers(
                        headers.iter().map(String::as_str).chain([key.as_str()]),
                    )
                    .pop()
                    .unwrap_or_default();
                    header_index.insert(key.clone(), col.clone());
                    headers.push(col.clone());
                    col
                }
            };
            fields.insert(col, json_to_value(val));
        }
        records.push(Record::new(fields));
    }

    Ok(Dataset::from_records(headers, records))
}

fn json_to_value(val: &JsonValue) -> Value {
    match val {
        JsonValue::String(s) => parse_cell(s),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Integer(i)
            } else if let Some(f) = n.as_f64() {
                Value::Float(f)
            } else {
                Value::String(n.to_string())
            }
        }
        JsonValue::Bool(b) => Value::Bool(*b),
        JsonValue::Null => Value::Null,
        other => Value::String(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file with flat scalar columns.
///
/// Works with files written by both **Pandas** (`df.to_parquet()`) and
/// **Polars** (`df.write_parquet()`).
fn load_parquet(path: &Path) -> Result<Dataset> {
    let file = open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .map_err(|e| DataError::parse(path, format!("reading parquet metadata: {e}")))?;
    let headers = normalize_headers(builder.schema().fields().iter().map(|f| f.name().as_str()));
    let reader = builder
        .build()
        .map_err(|e| DataError::parse(path, format!("building parquet reader: {e}")))?;

    let mut records = Vec::new();
    for batch_result in reader {
        let batch = batch_result
            .map_err(|e| DataError::parse(path, format!("reading parquet record batch: {e}")))?;

        for row in 0..batch.num_rows() {
            let fields: BTreeMap<String, Value> = headers
                .iter()
                .zip(batch.columns())
                .map(|(col, array)| (col.clone(), extract_value(array, row)))
                .collect();
            records.push(Record::new(fields));
        }
    }

    Ok(Dataset::from_records(headers, records))
}

/// Extract a single value from an Arrow column at a given row.
fn extract_value(col: &ArrayRef, row: usize) -> Value {
    if col.is_null(row) {
        return Value::Null;
    }
    match col.data_type() {
        DataType::Utf8 => Value::String(col.as_string::<i32>().value(row).to_string()),
        DataType::LargeUtf8 => Value::String(col.as_string::<i64>().value(row).to_string()),
        DataType::Int8 => Value::Integer(col.as_primitive::<Int8Type>().value(row) as i64),
        DataType::Int16 => Value::Integer(col.as_primitive::<Int16Type>().value(row) as i64),
        DataType::Int32 => Value::Integer(col.as_primitive::<Int32Type>().value(row) as i64),
        DataType::Int64 => Value::Integer(col.as_primitive::<Int64Type>().value(row)),
        DataType::UInt32 => Value::Integer(col.as_primitive::<UInt32Type>().value(row) as i64),
        DataType::UInt64 => Value::Float(col.as_primitive::<UInt64Type>().value(row) as f64),
        DataType::Float32 => Value::Float(col.as_primitive::<Float32Type>().value(row) as f64),
        DataType::Float64 => Value::Float(col.as_primitive::<Float64Type>().value(row)),
        DataType::Boolean => Value::Bool(col.as_boolean().value(row)),
        _ => match array_value_to_string(col, row) {
            Ok(s) => parse_cell(&s),
            Err(e) => {
                warn!("unreadable {:?} value at row {row}: {e}", col.data_type());
                Value::Null
            }
        },
    }
}
