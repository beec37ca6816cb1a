use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::data::loader::normalize_column_name;
use crate::data::schema::{CanonicalField, RuleTable};

pub const DEFAULT_AQI_PATH: &str = "data/raw/global_air_pollution.csv";
pub const DEFAULT_PM25_PATH: &str = "data/raw/pm25-air-pollution.csv";

/// Runtime configuration, read from an optional JSON file:
///
/// ```json
/// {
///   "aqi_path": "data/raw/global_air_pollution.csv",
///   "pm25_path": "data/raw/pm25-air-pollution.csv",
///   "aliases": { "nation": "country", "pm_2_5_ugm3": "pm25" }
/// }
/// ```
///
/// Alias keys are normalized column names, values are canonical field names.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub aqi_path: PathBuf,
    pub pm25_path: PathBuf,
    pub aliases: BTreeMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            aqi_path: PathBuf::from(DEFAULT_AQI_PATH),
            pm25_path: PathBuf::from(DEFAULT_PM25_PATH),
            aliases: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Read `path`, or fall back to the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Config = serde_json::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        config.rule_table()?;
        Ok(config)
    }

    /// The default resolution rules extended with the configured aliases.
    /// Alias keys go through the same normalization as file headers, so
    /// `"Nation Name"` and `"nation_name"` are the same alias.
    pub fn rule_table(&self) -> Result<RuleTable> {
        let aliases = self
            .aliases
            .iter()
            .map(|(raw, target)| {
                let field: CanonicalField = target
                    .parse()
                    .map_err(anyhow::Error::msg)
                    .with_context(|| format!("alias `{raw}`"))?;
                Ok((normalize_column_name(raw), field))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(RuleTable::with_aliases(&aliases))
    }
}
