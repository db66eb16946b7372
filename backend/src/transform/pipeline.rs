//! High-level analysis pipeline.
//!
//! Combines every step for the configured countries:
//! fetch, reshape, window filtering, selection, normalization, composition
//! and auxiliary statistics.
//!
//! # Example
//!
//! ```rust,ignore
//! use dtpi::cache::CachedProvider;
//! use dtpi::config::AnalysisConfig;
//! use dtpi::source::EurostatClient;
//! use dtpi::transform::pipeline::run_analysis;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AnalysisConfig::default();
//!     let provider = CachedProvider::new(EurostatClient::new(dtpi::config::DEFAULT_EUROSTAT_URL));
//!     let report = run_analysis(&provider, &config).await?;
//!
//!     println!("Analysed {} countries", report.countries.len());
//!     Ok(())
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use super::compose::compose;
use super::normalize::{normalize, DEGENERATE_SENTINEL};
use super::reshape::reshape;
use super::select::select_metric;
use super::stats::{series_statistics, SeriesStatistics};
use super::window::filter_from;
use crate::api::logs::{log_country_success, log_country_warning, log_info, log_success, log_warning};
use crate::config::AnalysisConfig;
use crate::error::PipelineResult;
use crate::models::{
    IndexKind, LongObservationRow, MergedCountryRecord, Metric, NormalizedSeriesPoint, PeriodKey,
    WideObservationTable,
};
use crate::source::DataProvider;
use crate::validation::validate_country_report;

/// Long rows per metric, already window-filtered.
pub type MetricRows = BTreeMap<Metric, Vec<LongObservationRow>>;

/// Result of one analysis run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub start_quarter: PeriodKey,
    pub generated_at: DateTime<Utc>,
    /// Countries that were analysed
    pub countries: Vec<CountryReport>,
    /// Countries that could not be analysed, with the reason
    pub failures: Vec<CountryFailure>,
}

impl AnalysisReport {
    /// Find a country's report by code, ignoring case.
    pub fn country(&self, geo: &str) -> Option<&CountryReport> {
        self.countries
            .iter()
            .find(|c| c.country.eq_ignore_ascii_case(geo))
    }

    pub fn failure(&self, geo: &str) -> Option<&CountryFailure> {
        self.failures
            .iter()
            .find(|f| f.country.eq_ignore_ascii_case(geo))
    }
}

/// Everything computed for one country
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CountryReport {
    pub country: String,
    pub gva: Vec<NormalizedSeriesPoint>,
    pub employment: Vec<NormalizedSeriesPoint>,
    pub labour_demand: Vec<NormalizedSeriesPoint>,
    pub records: Vec<MergedCountryRecord>,
    /// Degenerate series and output check findings
    pub warnings: Vec<String>,
    /// Statistics keyed by metric name (`gva`, ...) or index name (`index1`, ...)
    pub statistics: BTreeMap<String, SeriesStatistics>,
}

impl CountryReport {
    pub fn series(&self, metric: Metric) -> &[NormalizedSeriesPoint] {
        match metric {
            Metric::Gva => &self.gva,
            Metric::Employment => &self.employment,
            Metric::LabourDemand => &self.labour_demand,
        }
    }

    /// Normalized values of one metric, ordered by quarter.
    pub fn metric_points(&self, metric: Metric) -> Vec<(PeriodKey, f64)> {
        self.series(metric)
            .iter()
            .map(|p| (p.quarter, p.normalized_value))
            .collect()
    }

    /// Defined values of one index, ordered by quarter.
    pub fn index_points(&self, kind: IndexKind) -> Vec<(PeriodKey, f64)> {
        index_points(&self.records, kind)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountryFailure {
    pub country: String,
    pub reason: String,
}

/// One metric's series for a single country, read from a standalone table.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricSeriesReport {
    pub country: String,
    pub metric: Metric,
    pub points: Vec<NormalizedSeriesPoint>,
    pub degenerate: bool,
    pub statistics: SeriesStatistics,
}

/// Run the full analysis for every configured country.
///
/// Datasets shared by several metrics are fetched once per run. Source,
/// reshape and configuration problems abort the run; anything specific to a
/// country is recorded in [`AnalysisReport::failures`].
pub async fn run_analysis<P: DataProvider + ?Sized>(
    provider: &P,
    config: &AnalysisConfig,
) -> PipelineResult<AnalysisReport> {
    config.validate()?;
    log_info(format!(
        "🚀 Starting analysis from {} for {}",
        config.start_quarter,
        config.countries.join(", ")
    ));

    let mut fetched: HashMap<&str, Arc<WideObservationTable>> = HashMap::new();
    let mut rows = MetricRows::new();

    for metric in Metric::ALL {
        let dataset = config.dataset(metric);
        let table = match fetched.get(dataset) {
            Some(table) => Arc::clone(table),
            None => {
                let table = provider.fetch_shared(dataset, config.start_quarter).await?;
                fetched.insert(dataset, Arc::clone(&table));
                table
            }
        };
        rows.insert(metric, prepare_rows(&table, metric, config.start_quarter)?);
    }

    Ok(analyze_rows(&rows, config))
}

/// Reshape a metric's source table and keep the analysis window.
pub fn prepare_rows(
    table: &WideObservationTable,
    metric: Metric,
    start: PeriodKey,
) -> PipelineResult<Vec<LongObservationRow>> {
    let long = reshape(table, metric.id_columns())?;
    let windowed = filter_from(&long, start);
    log_success(format!(
        "{}: {} observations, {} from {}",
        metric,
        long.len(),
        windowed.len(),
        start
    ));
    Ok(windowed)
}

/// Analyse every configured country over prepared rows.
pub fn analyze_rows(rows: &MetricRows, config: &AnalysisConfig) -> AnalysisReport {
    let mut countries = Vec::new();
    let mut failures = Vec::new();

    for country in &config.countries {
        match analyze_country(country, rows, config) {
            Ok(mut report) => {
                if let Err(violations) = validate_country_report(&report) {
                    for violation in &violations {
                        log_country_warning(country, violation.as_str());
                    }
                    report.warnings.extend(violations);
                }
                log_country_success(
                    country,
                    format!("{}: {} merged quarters", country, report.records.len()),
                );
                countries.push(report);
            }
            Err(reason) => {
                log_country_warning(country, format!("{} skipped: {}", country, reason));
                failures.push(CountryFailure {
                    country: country.clone(),
                    reason,
                });
            }
        }
    }

    if failures.is_empty() {
        log_success(format!("✅ Analysis complete: {} countries", countries.len()));
    } else {
        log_warning(format!(
            "Analysis complete: {} countries, {} failed",
            countries.len(),
            failures.len()
        ));
    }

    AnalysisReport {
        start_quarter: config.start_quarter,
        generated_at: Utc::now(),
        countries,
        failures,
    }
}

/// Analyse one country. The error is a human-readable failure reason.
pub fn analyze_country(
    country: &str,
    rows: &MetricRows,
    config: &AnalysisConfig,
) -> Result<CountryReport, String> {
    let mut warnings = Vec::new();

    let gva = normalized_metric(country, rows, Metric::Gva, &mut warnings)?;
    let employment = normalized_metric(country, rows, Metric::Employment, &mut warnings)?;
    let labour_demand = normalized_metric(country, rows, Metric::LabourDemand, &mut warnings)?;

    let records =
        compose(country, &gva, &employment, &labour_demand).map_err(|e| e.to_string())?;
    if records.is_empty() {
        let message = "no quarter is shared by all three series".to_string();
        log_country_warning(country, format!("{}: {}", country, message));
        warnings.push(message);
    }

    let mut report = CountryReport {
        country: country.to_string(),
        gva,
        employment,
        labour_demand,
        records,
        warnings,
        statistics: BTreeMap::new(),
    };

    let ma = config.moving_average_window;
    let md = config.moving_derivative_window;
    for metric in Metric::ALL {
        let stats = series_statistics(&report.metric_points(metric), ma, md).map_err(|e| e.to_string())?;
        report.statistics.insert(metric.as_str().to_string(), stats);
    }
    for kind in IndexKind::ALL {
        let stats = series_statistics(&report.index_points(kind), ma, md).map_err(|e| e.to_string())?;
        report.statistics.insert(kind.as_str().to_string(), stats);
    }

    Ok(report)
}

/// Read a single metric's series for one country from a standalone table.
pub fn analyze_metric_table(
    table: &WideObservationTable,
    metric: Metric,
    country: &str,
    config: &AnalysisConfig,
) -> PipelineResult<MetricSeriesReport> {
    let rows = prepare_rows(table, metric, config.start_quarter)?;
    let normalized = normalize(&select_metric(&rows, country, metric));
    let points: Vec<(PeriodKey, f64)> = normalized
        .points
        .iter()
        .map(|p| (p.quarter, p.normalized_value))
        .collect();
    let statistics = series_statistics(
        &points,
        config.moving_average_window,
        config.moving_derivative_window,
    )?;

    Ok(MetricSeriesReport {
        country: country.to_string(),
        metric,
        degenerate: normalized.is_degenerate(),
        points: normalized.points,
        statistics,
    })
}

fn normalized_metric(
    country: &str,
    rows: &MetricRows,
    metric: Metric,
    warnings: &mut Vec<String>,
) -> Result<Vec<NormalizedSeriesPoint>, String> {
    let metric_rows = rows.get(&metric).map(Vec::as_slice).unwrap_or_default();
    let points = select_metric(metric_rows, country, metric);
    if points.is_empty() {
        return Err(format!("no {} observations", metric));
    }

    let normalized = normalize(&points);
    if let Some(degenerate) = normalized.warning {
        let message = format!(
            "{} series is constant at {} over {} quarters; normalized to {}",
            metric, degenerate.value, degenerate.points, DEGENERATE_SENTINEL
        );
        log_country_warning(country, format!("{}: {}", country, message));
        warnings.push(message);
    }
    Ok(normalized.points)
}

fn index_points(records: &[MergedCountryRecord], kind: IndexKind) -> Vec<(PeriodKey, f64)> {
    records
        .iter()
        .filter_map(|r| kind.value(&r.indices).map(|v| (r.quarter, v)))
        .collect()
}
