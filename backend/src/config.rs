//! Analysis configuration.
//!
//! Values come from, in increasing priority: built-in defaults, an optional
//! JSON file, environment variables (a `.env` file is honoured), CLI flags.
//!
//! | Variable             | Field                          |
//! |----------------------|--------------------------------|
//! | `DTPI_START_QUARTER` | `start_quarter`                |
//! | `DTPI_COUNTRIES`     | `countries` (comma-separated)  |
//! | `DTPI_DATA_DIR`      | `source` = directory provider  |
//! | `DTPI_EUROSTAT_URL`  | `source` = Eurostat base URL   |

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::models::{Metric, PeriodKey};
use crate::transform::stats::{MOVING_AVERAGE_WINDOWS, MOVING_DERIVATIVE_WINDOWS};

/// Eurostat dissemination API endpoint for SDMX 2.1 data.
pub const DEFAULT_EUROSTAT_URL: &str = "https://ec.europa.eu/eurostat/api/dissemination/sdmx/2.1/data";

/// Where the wide tables come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SourceConfig {
    Eurostat { base_url: String },
    Directory { path: PathBuf },
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig::Eurostat {
            base_url: DEFAULT_EUROSTAT_URL.to_string(),
        }
    }
}

/// Configuration of one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// First quarter of the analysis window, inclusive.
    pub start_quarter: PeriodKey,
    pub countries: Vec<String>,
    pub gva_dataset: String,
    pub employment_dataset: String,
    pub labour_demand_dataset: String,
    pub moving_average_window: usize,
    pub moving_derivative_window: usize,
    pub source: SourceConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            start_quarter: PeriodKey::DEFAULT_START,
            countries: vec!["IT".into(), "FR".into(), "DE".into()],
            gva_dataset: "namq_10_a10_e".into(),
            employment_dataset: "namq_10_a10_e".into(),
            labour_demand_dataset: "isoc_sk_oja1".into(),
            moving_average_window: 4,
            moving_derivative_window: 2,
            source: SourceConfig::default(),
        }
    }
}

impl AnalysisConfig {
    /// Load from a JSON file; missing fields take their defaults.
    ///
    /// Country codes are trimmed and upper-cased, as on the other inputs.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let mut config: Self = serde_json::from_str(&content)?;
        config.countries = config
            .countries
            .iter()
            .map(|c| c.trim().to_uppercase())
            .collect();
        Ok(config)
    }

    /// Defaults, then `path` if given, then environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let config = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        config.with_env_overrides(|key| env::var(key).ok())
    }

    /// Apply overrides from a variable lookup.
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(start) = lookup("DTPI_START_QUARTER") {
            self.start_quarter = parse_start_quarter(&start)?;
        }
        if let Some(countries) = lookup("DTPI_COUNTRIES") {
            self.countries = parse_countries(&countries);
        }
        if let Some(url) = lookup("DTPI_EUROSTAT_URL") {
            self.source = SourceConfig::Eurostat { base_url: url };
        }
        if let Some(dir) = lookup("DTPI_DATA_DIR") {
            self.source = SourceConfig::Directory { path: PathBuf::from(dir) };
        }
        Ok(self)
    }

    /// Dataset id for a metric.
    pub fn dataset(&self, metric: Metric) -> &str {
        match metric {
            Metric::Gva => &self.gva_dataset,
            Metric::Employment => &self.employment_dataset,
            Metric::LabourDemand => &self.labour_demand_dataset,
        }
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.countries.is_empty() {
            return Err(invalid("countries", "at least one country is required"));
        }
        if let Some(bad) = self.countries.iter().find(|c| c.trim().is_empty()) {
            return Err(invalid("countries", format!("empty country code '{}'", bad)));
        }
        if let Some(bad) = self.countries.iter().find(|c| c.trim().to_uppercase() != **c) {
            return Err(invalid("countries", format!("country code '{}' must be upper-case", bad)));
        }
        for metric in Metric::ALL {
            if self.dataset(metric).trim().is_empty() {
                return Err(invalid(&format!("{}_dataset", metric.as_str().replace('-', "_")), "dataset id is empty"));
            }
        }
        if !MOVING_AVERAGE_WINDOWS.contains(&self.moving_average_window) {
            return Err(invalid("moving_average_window", "must be 2, 3 or 4"));
        }
        if !MOVING_DERIVATIVE_WINDOWS.contains(&self.moving_derivative_window) {
            return Err(invalid("moving_derivative_window", "must be 2 or 3"));
        }
        Ok(())
    }
}

/// Parse a start quarter, reporting it as a configuration error.
pub fn parse_start_quarter(value: &str) -> Result<PeriodKey, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|e: crate::error::ReshapeError| invalid("start_quarter", e.to_string()))
}

/// Split a comma-separated country list, upper-casing codes.
pub fn parse_countries(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|c| c.trim().to_uppercase())
        .filter(|c| !c.is_empty())
        .collect()
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = AnalysisConfig::default();
        assert_eq!(config.start_quarter.to_string(), "2019Q4");
        assert_eq!(config.countries, vec!["IT", "FR", "DE"]);
        assert_eq!(config.dataset(Metric::LabourDemand), "isoc_sk_oja1");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dtpi.json");
        fs::write(
            &path,
            r#"{ "start_quarter": "2020Q2", "source": { "kind": "directory", "path": "data" } }"#,
        )
        .unwrap();

        let config = AnalysisConfig::from_file(&path).unwrap();
        assert_eq!(config.start_quarter.to_string(), "2020Q2");
        assert_eq!(config.countries.len(), 3);
        assert_eq!(config.source, SourceConfig::Directory { path: PathBuf::from("data") });
    }

    #[test]
    fn test_bad_start_quarter_in_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dtpi.json");
        fs::write(&path, r#"{ "start_quarter": "2020-04" }"#).unwrap();
        assert!(matches!(AnalysisConfig::from_file(&path), Err(ConfigError::JsonError(_))));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("DTPI_START_QUARTER", "2021Q1"),
            ("DTPI_COUNTRIES", "it, es ,"),
            ("DTPI_DATA_DIR", "/tmp/tables"),
        ]);
        let config = AnalysisConfig::default()
            .with_env_overrides(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.start_quarter.to_string(), "2021Q1");
        assert_eq!(config.countries, vec!["IT", "ES"]);
        assert!(matches!(config.source, SourceConfig::Directory { .. }));
    }

    #[test]
    fn test_env_bad_quarter() {
        let result = AnalysisConfig::default()
            .with_env_overrides(|k| (k == "DTPI_START_QUARTER").then(|| "Q4-2019".to_string()));
        assert!(matches!(result, Err(ConfigError::InvalidValue { ref field, .. }) if field == "start_quarter"));
    }

    #[test]
    fn test_validate_windows_and_countries() {
        let mut config = AnalysisConfig::default();
        config.moving_average_window = 5;
        assert!(config.validate().is_err());

        let mut config = AnalysisConfig::default();
        config.moving_derivative_window = 4;
        assert!(config.validate().is_err());

        let mut config = AnalysisConfig::default();
        config.countries.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_file_countries_are_upper_cased() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dtpi.json");
        fs::write(&path, r#"{ "countries": ["it", " fr ", "DE"], "start_quarter": "2020Q1" }"#).unwrap();

        let config = AnalysisConfig::from_file(&path).unwrap();
        assert_eq!(config.countries, vec!["IT", "FR", "DE"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_lower_case_country() {
        let config = AnalysisConfig {
            countries: vec!["IT".into(), "fr".into()],
            ..AnalysisConfig::default()
        };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::InvalidValue { ref message, .. }) if message.contains("'fr'")));

        let padded = AnalysisConfig {
            countries: vec![" IT".into()],
            ..AnalysisConfig::default()
        };
        assert!(padded.validate().is_err());
    }
}
