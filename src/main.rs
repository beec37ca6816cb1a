use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use rusty_aqi::config::Config;
use rusty_aqi::data::schema::CanonicalField;
use rusty_aqi::report;
use rusty_aqi::state::{AppState, MapParams, Page, TrendParams, ViewOutcome};

#[derive(Parser)]
#[command(name = "rusty-aqi")]
#[command(about = "Global air pollution dashboard data: country means, summaries and PM2.5 trends")]
struct Args {
    /// JSON config file (paths and extra column aliases)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the AQI snapshot path
    #[arg(long)]
    aqi: Option<PathBuf>,

    /// Override the PM2.5 time-series path
    #[arg(long)]
    pm25: Option<PathBuf>,

    /// Print results as JSON instead of text tables
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List columns and the canonical field each one was resolved to
    Columns,
    /// Mean of a metric per country (the map view)
    Map {
        /// Canonical metric name, e.g. aqi_value or pm25_aqi_value
        #[arg(short, long)]
        metric: Option<String>,
        /// AQI categories to keep (repeatable); all when omitted
        #[arg(short = 'c', long = "category")]
        categories: Vec<String>,
        /// Minimum metric value
        #[arg(long)]
        min: Option<f64>,
    },
    /// Global means and AQI category counts
    Summary,
    /// Mean pollutant values for one country
    Country {
        /// Country name; Malaysia or the first country when omitted
        name: Option<String>,
    },
    /// PM2.5 values per country and year
    Trends {
        /// Countries to show (repeatable)
        #[arg(short = 'c', long = "country")]
        countries: Vec<String>,
        /// First year
        #[arg(long, requires = "to")]
        from: Option<i64>,
        /// Last year
        #[arg(long, requires = "from")]
        to: Option<i64>,
    },
}

fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();

    let mut config = Config::load(args.config.as_deref())?;
    if let Some(path) = args.aqi {
        config.aqi_path = path;
    }
    if let Some(path) = args.pm25 {
        config.pm25_path = path;
    }

    let mut state = AppState::new(&config)?;
    state.load_all();
    for message in &state.status_messages {
        eprintln!("warning: {message}");
    }

    let json = args.json;
    let output = match args.command {
        Command::Columns => {
            let mut out = String::new();
            for page in [Page::Map, Page::Pm25] {
                let name = if page == Page::Pm25 { "PM2.5 series" } else { "AQI snapshot" };
                out.push_str(&format!("== {name}\n"));
                match state.dataset(page) {
                    Some(ds) if json => out.push_str(&serde_json::to_string_pretty(&ds.schema)?),
                    Some(ds) => out.push_str(&report::schema(ds)),
                    None => out.push_str("(not loaded)\n"),
                }
                out.push('\n');
            }
            out
        }
        Command::Map {
            metric,
            categories,
            min,
        } => {
            let metric = metric
                .map(|m| m.parse::<CanonicalField>().map_err(|e| anyhow!(e)))
                .transpose()?;
            let params = MapParams {
                metric,
                categories,
                min_value: min,
            };
            render(&state.map_view(&params), json, report::map)?
        }
        Command::Summary => render(&state.summary_view(), json, report::summary)?,
        Command::Country { name } => {
            render(&state.country_view(name.as_deref()), json, report::country)?
        }
        Command::Trends {
            countries,
            from,
            to,
        } => {
            let params = TrendParams {
                countries: (!countries.is_empty()).then_some(countries),
                years: from.zip(to),
            };
            render(&state.trend_view(&params), json, report::trend)?
        }
    };

    println!("{}", output.trim_end());
    Ok(())
}

fn render<T: Serialize>(
    outcome: &ViewOutcome<T>,
    json: bool,
    text: impl FnOnce(&T) -> String,
) -> Result<String> {
    if json {
        Ok(serde_json::to_string_pretty(outcome)?)
    } else {
        Ok(report::outcome(outcome, text))
    }
}
