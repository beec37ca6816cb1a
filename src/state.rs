use std::path::PathBuf;
use std::sync::Arc;

use log::warn;
use serde::Serialize;

use crate::config::Config;
use crate::data::aggregate::{filter_aggregate, CountryMean};
use crate::data::cache::DatasetCache;
use crate::data::filter::Predicates;
use crate::data::model::Dataset;
use crate::data::schema::CanonicalField;
use crate::data::views::{
    aqi_summary, default_country, default_trend_countries, default_year_range, pm25_trend,
    pollutant_means, AqiSummary, PollutantMean, Trend,
};
use crate::error::{DataError, Result};

// ---------------------------------------------------------------------------
// Pages and dataset slots
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Map,
    Summary,
    Country,
    Pm25,
}

/// Load state of one input dataset.
#[derive(Debug, Clone)]
pub enum DatasetSlot {
    NotLoaded,
    Loaded(Arc<Dataset>),
    /// Load failed; the message is shown wherever the dataset is needed.
    Failed(String),
}

// ---------------------------------------------------------------------------
// View outcomes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Error,
}

/// Explanatory message shown in place of a disabled view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    /// Columns the dataset does have, when a field was missing.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub available_columns: Vec<String>,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Notice {
            level: NoticeLevel::Info,
            message: message.into(),
            available_columns: Vec::new(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Notice {
            level: NoticeLevel::Error,
            message: message.into(),
            available_columns: Vec::new(),
        }
    }
}

impl From<DataError> for Notice {
    fn from(err: DataError) -> Self {
        match err {
            DataError::MissingField { field, available } => Notice {
                level: NoticeLevel::Error,
                message: format!("Dataset is missing a `{field}` column."),
                available_columns: available,
            },
            other => Notice::error(other.to_string()),
        }
    }
}

/// Either the data a view displays or the reason it cannot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewOutcome<T> {
    Ready(T),
    Notice(Notice),
}

impl<T> ViewOutcome<T> {
    pub fn ready(self) -> Option<T> {
        match self {
            ViewOutcome::Ready(v) => Some(v),
            ViewOutcome::Notice(_) => None,
        }
    }

    pub fn notice(&self) -> Option<&Notice> {
        match self {
            ViewOutcome::Ready(_) => None,
            ViewOutcome::Notice(n) => Some(n),
        }
    }
}

// ---------------------------------------------------------------------------
// View parameters and results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct MapParams {
    /// Metric to map; defaults to the first available metric.
    pub metric: Option<CanonicalField>,
    /// Selected AQI categories; empty means all.
    pub categories: Vec<String>,
    /// Minimum metric value; defaults to the metric's minimum.
    pub min_value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapView {
    pub metric: CanonicalField,
    pub metric_label: String,
    pub min_value: Option<f64>,
    /// Country means, highest first.
    pub rows: Vec<CountryMean>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountryView {
    pub country: String,
    pub means: Vec<PollutantMean>,
}

#[derive(Debug, Clone, Default)]
pub struct TrendParams {
    /// `None` picks the default selection; an empty list selects nothing.
    pub countries: Option<Vec<String>>,
    pub years: Option<(i64, i64)>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendView {
    pub countries: Vec<String>,
    pub years: (i64, i64),
    pub trend: Trend,
}

// ---------------------------------------------------------------------------
// Dashboard state
// ---------------------------------------------------------------------------

/// Everything the dashboard needs between interactions, independent of
/// rendering.
pub struct AppState {
    cache: DatasetCache,
    aqi_path: PathBuf,
    pm25_path: PathBuf,

    /// Global AQI snapshot.
    pub aqi: DatasetSlot,
    /// PM2.5 time series.
    pub pm25: DatasetSlot,

    /// Warnings from failed loads, shown once at the top of the output.
    pub status_messages: Vec<String>,
}

impl AppState {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        Ok(Self {
            cache: DatasetCache::new(config.rule_table()?),
            aqi_path: config.aqi_path.clone(),
            pm25_path: config.pm25_path.clone(),
            aqi: DatasetSlot::NotLoaded,
            pm25: DatasetSlot::NotLoaded,
            status_messages: Vec::new(),
        })
    }

    /// (Re)load both datasets. A failure degrades only the views that need
    /// that dataset.
    pub fn load_all(&mut self) {
        self.status_messages.clear();
        let aqi_path = self.aqi_path.clone();
        let pm25_path = self.pm25_path.clone();
        self.aqi = self.load_slot(&aqi_path, "global AQI");
        self.pm25 = self.load_slot(&pm25_path, "PM2.5");
    }

    fn load_slot(&mut self, path: &std::path::Path, what: &str) -> DatasetSlot {
        match self.cache.get_or_load(path) {
            Ok(ds) => DatasetSlot::Loaded(ds),
            Err(e) => {
                let message = match &e {
                    DataError::NotFound { path } => {
                        format!("Could not find {what} dataset at `{}`.", path.display())
                    }
                    other => format!("Could not load {what} dataset: {other}"),
                };
                warn!("{message}");
                self.status_messages.push(message.clone());
                DatasetSlot::Failed(message)
            }
        }
    }

    pub fn map_view(&self, params: &MapParams) -> ViewOutcome<MapView> {
        with_dataset(&self.aqi, "Global AQI", |ds| {
            let available = metric_options(ds);
            let metric = match params.metric.or_else(|| available.first().copied()) {
                Some(m) => m,
                None => {
                    return Ok(ViewOutcome::Notice(Notice {
                        available_columns: ds.column_names.clone(),
                        ..Notice::error("No metric columns found in this dataset.")
                    }))
                }
            };

            let min_value = params
                .min_value
                .or_else(|| ds.column(metric).and_then(|c| ds.numbers(c).reduce(f64::min)));
            let mut predicates = Predicates::new().with_categories(params.categories.iter().cloned());
            predicates.threshold = min_value;

            let agg = filter_aggregate(ds, metric, &predicates)?;
            if agg.is_empty() {
                return Ok(ViewOutcome::Notice(Notice::info(
                    "No countries match the current filters.",
                )));
            }
            Ok(ViewOutcome::Ready(MapView {
                metric,
                metric_label: metric.label(),
                min_value,
                rows: agg.sorted_desc(),
            }))
        })
    }

    pub fn summary_view(&self) -> ViewOutcome<AqiSummary> {
        with_dataset(&self.aqi, "Global AQI", |ds| {
            Ok(ViewOutcome::Ready(aqi_summary(ds)))
        })
    }

    pub fn country_view(&self, country: Option<&str>) -> ViewOutcome<CountryView> {
        with_dataset(&self.aqi, "Global AQI", |ds| {
            let country_col = ds.require(CanonicalField::Country)?;
            let countries = ds.distinct_keys(country_col);
            let Some(country) = country
                .map(str::to_string)
                .or_else(|| default_country(&countries))
            else {
                return Ok(ViewOutcome::Notice(Notice::info("No countries in this dataset.")));
            };

            let means = pollutant_means(ds, &country)?;
            if means.is_empty() {
                return Ok(ViewOutcome::Notice(Notice::info(format!(
                    "No pollutant values (PM2.5, NO₂, O₃, CO) found for {country}."
                ))));
            }
            Ok(ViewOutcome::Ready(CountryView { country, means }))
        })
    }

    pub fn trend_view(&self, params: &TrendParams) -> ViewOutcome<TrendView> {
        with_dataset(&self.pm25, "PM2.5", |ds| {
            let country_col = ds.require(CanonicalField::Country)?;
            ds.require(CanonicalField::Year)?;

            let countries = match &params.countries {
                Some(selected) => selected.clone(),
                None => default_trend_countries(&ds.distinct_keys(country_col)),
            };
            if countries.is_empty() {
                return Ok(ViewOutcome::Notice(Notice::info(
                    "Select at least one country to see PM2.5 trends.",
                )));
            }
            let Some(years) = params.years.or_else(|| default_year_range(ds)) else {
                return Ok(ViewOutcome::Notice(Notice::info("No years in the PM2.5 dataset.")));
            };

            let trend = pm25_trend(ds, &countries, years)?;
            if trend.points.is_empty() {
                return Ok(ViewOutcome::Notice(Notice::info(
                    "No PM2.5 values for the selected countries and years.",
                )));
            }
            Ok(ViewOutcome::Ready(TrendView {
                countries,
                years,
                trend,
            }))
        })
    }

    pub fn dataset(&self, page: Page) -> Option<&Arc<Dataset>> {
        let slot = match page {
            Page::Pm25 => &self.pm25,
            Page::Map | Page::Summary | Page::Country => &self.aqi,
        };
        match slot {
            DatasetSlot::Loaded(ds) => Some(ds),
            _ => None,
        }
    }
}

/// Metrics the map can show, overall AQI and PM2.5 first.
pub fn metric_options(dataset: &Dataset) -> Vec<CanonicalField> {
    let mut metrics = dataset.schema.metrics();
    let rank = |f: &CanonicalField| match *f {
        CanonicalField::AqiValue => 0,
        CanonicalField::PM25 => 1,
        _ => 2,
    };
    metrics.sort_by_key(rank);
    metrics
}

/// Run `view` against a loaded, non-empty dataset, turning pipeline errors
/// into notices.
fn with_dataset<T>(
    slot: &DatasetSlot,
    name: &str,
    view: impl FnOnce(&Dataset) -> Result<ViewOutcome<T>>,
) -> ViewOutcome<T> {
    let ds = match slot {
        DatasetSlot::Loaded(ds) if !ds.is_empty() => ds,
        DatasetSlot::Failed(message) => return ViewOutcome::Notice(Notice::error(message.clone())),
        _ => {
            return ViewOutcome::Notice(Notice::info(format!(
                "{name} dataset is empty or failed to load."
            )))
        }
    };
    match view(ds.as_ref()) {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!("{name} view disabled: {e}");
            ViewOutcome::Notice(e.into())
        }
    }
}
