use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, Int64Builder, StringBuilder};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;

const OUT_DIR: &str = "data/raw";

/// Country, ISO code, cities, and a baseline AQI level.
const COUNTRIES: &[(&str, &str, &[&str], f64)] = &[
    ("Malaysia", "MYS", &["Kuala Lumpur", "Penang", "Johor Bahru"], 70.0),
    ("China", "CHN", &["Beijing", "Shanghai", "Chengdu"], 130.0),
    ("India", "IND", &["Delhi", "Mumbai", "Kolkata"], 160.0),
    ("United States", "USA", &["Boston", "Denver", "Houston"], 45.0),
    ("Chad", "TCD", &["N'Djamena"], 150.0),
    ("Peru", "PER", &["Lima", "Cusco"], 55.0),
];

/// splitmix64 generator; a fixed seed gives identical sample files on every run.
struct SampleRng(u64);

impl SampleRng {
    fn next_u64(&mut self) -> u64 {
        self.0 = self.0.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.0;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    /// Uniform in [0, 1).
    fn uniform(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Normal sample via Box-Muller; the second variate is discarded.
    fn normal(&mut self, mean: f64, sd: f64) -> f64 {
        let r = (-2.0 * (1.0 - self.uniform()).ln()).sqrt();
        let theta = std::f64::consts::TAU * self.uniform();
        mean + sd * r * theta.cos()
    }
}

/// US EPA AQI band for a value.
fn aqi_category(aqi: i64) -> &'static str {
    match aqi {
        i64::MIN..=50 => "Good",
        51..=100 => "Moderate",
        101..=150 => "Unhealthy for Sensitive Groups",
        151..=200 => "Unhealthy",
        201..=300 => "Very Unhealthy",
        _ => "Hazardous",
    }
}

struct CityRow {
    country: String,
    city: String,
    /// Overall, then CO, ozone, NO2, PM2.5 sub-indices; `None` is a gap.
    values: [Option<i64>; 5],
}

fn generate_snapshot(rng: &mut SampleRng) -> Vec<CityRow> {
    let mut rows = Vec::new();
    for &(country, _, cities, base) in COUNTRIES {
        for &city in cities {
            let pm25 = rng.normal(base, base * 0.2).max(1.0).round() as i64;
            let ozone = rng.normal(base * 0.4, 8.0).max(0.0).round() as i64;
            let no2 = rng.normal(base * 0.1, 3.0).max(0.0).round() as i64;
            let co = rng.normal(2.0, 1.0).max(0.0).round() as i64;
            let overall = pm25.max(ozone).max(no2).max(co);

            // leave roughly one gap in ten to exercise missing-value handling
            let gap = (rng.uniform() * 10.0) as usize;
            let mut values = [Some(overall), Some(co), Some(ozone), Some(no2), Some(pm25)];
            if gap < values.len() && gap > 0 && rng.uniform() < 0.5 {
                values[gap] = None;
            }

            rows.push(CityRow {
                country: country.to_string(),
                city: city.to_string(),
                values,
            });
        }
    }
    rows
}

fn write_snapshot_csv(rows: &[CityRow], path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    writer.write_record([
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
    ])?;

    for row in rows {
        let mut record = vec![row.country.clone(), row.city.clone()];
        for value in row.values {
            match value {
                Some(v) => {
                    record.push(v.to_string());
                    record.push(aqi_category(v).to_string());
                }
                None => {
                    record.push(String::new());
                    record.push(String::new());
                }
            }
        }
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

fn write_snapshot_parquet(rows: &[CityRow], path: &Path) -> Result<()> {
    let names = [
        "Country",
        "City",
        "AQI Value",
        "CO AQI Value",
        "Ozone AQI Value",
        "NO2 AQI Value",
        "PM2.5 AQI Value",
    ];

    let mut country = StringBuilder::new();
    let mut city = StringBuilder::new();
    let mut values: Vec<Int64Builder> = (0..5).map(|_| Int64Builder::new()).collect();
    for row in rows {
        country.append_value(&row.country);
        city.append_value(&row.city);
        for (builder, value) in values.iter_mut().zip(row.values) {
            builder.append_option(value);
        }
    }

    let mut columns: Vec<ArrayRef> = vec![Arc::new(country.finish()), Arc::new(city.finish())];
    columns.extend(values.iter_mut().map(|b| Arc::new(b.finish()) as ArrayRef));

    let fields: Vec<Field> = names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let data_type = if i < 2 { DataType::Utf8 } else { DataType::Int64 };
            Field::new(*name, data_type, i >= 2)
        })
        .collect();
    let schema = Arc::new(Schema::new(fields));

    let batch = RecordBatch::try_new(schema.clone(), columns).context("building record batch")?;
    let file = std::fs::File::create(path)
        .with_context(|| format!("creating {}", path.display()))?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating parquet writer")?;
    writer.write(&batch).context("writing parquet batch")?;
    writer.close().context("closing parquet writer")?;
    Ok(())
}

fn write_pm25_series(rng: &mut SampleRng, path: &Path) -> Result<usize> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    writer.write_record([
        "Entity",
        "Code",
        "Year",
        "Concentrations of fine particulate matter (PM2.5) - Residence area type: Total",
    ])?;

    let mut n = 0;
    for &(country, code, _, base) in COUNTRIES {
        // concentration in µg/m³, slowly improving year on year
        let mut level = base * 0.4;
        for year in 2005..=2019 {
            level = (level * 0.98 + rng.normal(0.0, 1.5)).max(1.0);
            let cell = if year == 2007 && country == "Chad" {
                String::new()
            } else {
                format!("{level:.2}")
            };
            writer.write_record([country, code, year.to_string().as_str(), cell.as_str()])?;
            n += 1;
        }
    }
    writer.flush()?;
    Ok(n)
}

fn main() -> Result<()> {
    env_logger::init();
    let mut rng = SampleRng(42);

    let out_dir = Path::new(OUT_DIR);
    std::fs::create_dir_all(out_dir).with_context(|| format!("creating {OUT_DIR}"))?;

    let snapshot = generate_snapshot(&mut rng);
    write_snapshot_csv(&snapshot, &out_dir.join("global_air_pollution.csv"))?;
    write_snapshot_parquet(&snapshot, &out_dir.join("global_air_pollution.parquet"))?;
    let n_series = write_pm25_series(&mut rng, &out_dir.join("pm25-air-pollution.csv"))?;

    println!(
        "Wrote {} city rows and {n_series} PM2.5 rows to {OUT_DIR}",
        snapshot.len()
    );
    Ok(())
}
