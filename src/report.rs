//! Plain-text tables for the command-line front end.

use std::fmt::Write;

use crate::data::model::Dataset;
use crate::data::views::AqiSummary;
use crate::state::{CountryView, MapView, Notice, NoticeLevel, TrendView, ViewOutcome};

/// Left-aligned text table with a header rule.
pub fn table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let line = |cells: Vec<&str>| -> String {
        let padded: Vec<String> = cells
            .iter()
            .zip(&widths)
            .map(|(c, &w)| format!("{c:<w$}"))
            .collect();
        padded.join("  ").trim_end().to_string()
    };

    let mut out = String::new();
    let _ = writeln!(out, "{}", line(headers.to_vec()));
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    let _ = writeln!(out, "{}", rule.join("  "));
    for row in rows {
        let _ = writeln!(out, "{}", line(row.iter().map(String::as_str).collect()));
    }
    out
}

pub fn notice(n: &Notice) -> String {
    let tag = match n.level {
        NoticeLevel::Info => "info",
        NoticeLevel::Error => "error",
    };
    let mut out = format!("[{tag}] {}\n", n.message);
    if !n.available_columns.is_empty() {
        let _ = writeln!(out, "Available columns: {}", n.available_columns.join(", "));
    }
    out
}

/// Render a view, or its notice when the view is disabled.
pub fn outcome<T>(outcome: &ViewOutcome<T>, render: impl FnOnce(&T) -> String) -> String {
    match outcome {
        ViewOutcome::Ready(v) => render(v),
        ViewOutcome::Notice(n) => notice(n),
    }
}

fn num(v: f64) -> String {
    format!("{v:.1}")
}

pub fn map(view: &MapView) -> String {
    let min = view.min_value.map_or_else(|| "none".to_string(), num);
    let mut out = format!(
        "Showing {} countries · Metric: {} · Min value: {min}\n\n",
        view.rows.len(),
        view.metric_label
    );
    let rows: Vec<Vec<String>> = view
        .rows
        .iter()
        .map(|r| vec![r.country.clone(), num(r.value)])
        .collect();
    out.push_str(&table(&["Country", view.metric_label.as_str()], &rows));
    out
}

pub fn summary(s: &AqiSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Records: {}", s.records);
    if let Some(v) = s.mean_aqi {
        let _ = writeln!(out, "Global mean AQI: {}", num(v));
    }
    if let Some(v) = s.mean_pm25 {
        let _ = writeln!(out, "Global mean PM2.5 (µg/m³): {}", num(v));
    }
    if !s.category_counts.is_empty() {
        out.push('\n');
        let rows: Vec<Vec<String>> = s
            .category_counts
            .iter()
            .map(|(cat, n)| vec![cat.clone(), n.to_string()])
            .collect();
        out.push_str(&table(&["AQI Category", "Number of records"], &rows));
    }
    out
}

pub fn country(view: &CountryView) -> String {
    let rows: Vec<Vec<String>> = view
        .means
        .iter()
        .map(|m| vec![m.pollutant.label(), num(m.value)])
        .collect();
    format!("{}\n\n{}", view.country, table(&["Pollutant", "Mean value"], &rows))
}

pub fn trend(view: &TrendView) -> String {
    let mut out = format!(
        "{} · {}–{} · values from `{}`\n\n",
        view.countries.join(", "),
        view.years.0,
        view.years.1,
        view.trend.value_column
    );
    let rows: Vec<Vec<String>> = view
        .trend
        .points
        .iter()
        .map(|p| {
            vec![
                p.country.clone(),
                p.year.to_string(),
                p.value.map_or_else(|| "-".to_string(), num),
            ]
        })
        .collect();
    out.push_str(&table(&["Country", "Year", "PM2.5 (µg/m³)"], &rows));
    out
}

/// Columns of `dataset` with the canonical field each one resolved from.
pub fn schema(dataset: &Dataset) -> String {
    let rows: Vec<Vec<String>> = dataset
        .column_names
        .iter()
        .map(|col| {
            let source = dataset
                .schema
                .iter()
                .find(|(field, _)| field.name() == col.as_str())
                .map(|(_, source)| source.clone())
                .unwrap_or_default();
            let kind = if dataset.is_numeric_column(col) { "numeric" } else { "text" };
            vec![col.clone(), source, kind.to_string()]
        })
        .collect();

    let mut out = table(&["Column", "Resolved from", "Type"], &rows);
    for amb in dataset.schema.ambiguities() {
        let _ = writeln!(
            out,
            "note: `{}` taken from `{}`; ignored {}",
            amb.field,
            amb.chosen,
            amb.ignored.join(", ")
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_pads_columns() {
        let out = table(
            &["Country", "AQI"],
            &[
                vec![String::from("USA"), String::from("60.0")],
                vec![String::from("India"), String::from("150.0")],
            ],
        );
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "Country  AQI");
        assert_eq!(lines[1], "-------  -----");
        assert_eq!(lines[2], "USA      60.0");
        assert_eq!(lines[3], "India    150.0");
    }

    #[test]
    fn notice_lists_available_columns() {
        let n = Notice {
            available_columns: vec!["station".to_string(), "aqi_value".to_string()],
            ..Notice::error("Dataset is missing a `country` column.")
        };
        assert_eq!(
            notice(&n),
            "[error] Dataset is missing a `country` column.\nAvailable columns: station, aqi_value\n"
        );
    }
}
