//! REST API types for the presentation layer.
//!
//! Reports are serialized as produced by the pipeline; these types only wrap
//! the smaller views.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::models::{Metric, NormalizedSeriesPoint, PeriodKey};
use crate::transform::pipeline::{AnalysisReport, CountryFailure, CountryReport};
use crate::transform::stats::SeriesStatistics;

/// Configured countries and what became of them
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountriesResponse {
    pub start_quarter: PeriodKey,
    /// Countries from the configuration, in order
    pub countries: Vec<String>,
    /// Countries with a report
    pub analysed: Vec<String>,
    pub failed: Vec<CountryFailureView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountryFailureView {
    pub country: String,
    pub reason: String,
}

impl From<&CountryFailure> for CountryFailureView {
    fn from(failure: &CountryFailure) -> Self {
        Self {
            country: failure.country.clone(),
            reason: failure.reason.clone(),
        }
    }
}

impl CountriesResponse {
    pub fn new(configured: &[String], report: &AnalysisReport) -> Self {
        Self {
            start_quarter: report.start_quarter,
            countries: configured.to_vec(),
            analysed: report.countries.iter().map(|c| c.country.clone()).collect(),
            failed: report.failures.iter().map(CountryFailureView::from).collect(),
        }
    }
}

/// Query of the series endpoint
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesQuery {
    /// Moving-average window (2 to 4)
    pub window: Option<usize>,
    /// Moving-derivative window (2 or 3)
    pub derivative_window: Option<usize>,
}

/// One normalized series with its statistics
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesResponse {
    pub country: String,
    pub metric: Metric,
    pub points: Vec<NormalizedSeriesPoint>,
    pub statistics: SeriesStatistics,
}

impl SeriesResponse {
    pub fn new(report: &CountryReport, metric: Metric, statistics: SeriesStatistics) -> Self {
        Self {
            country: report.country.clone(),
            metric,
            points: report.series(metric).to_vec(),
            statistics,
        }
    }
}

/// Create an error response
pub fn error_response(error: &str) -> Value {
    json!({
        "runId": Uuid::new_v4().to_string(),
        "status": "error",
        "error": error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_shape() {
        let body = error_response("country 'XX' not found");
        assert_eq!(body["status"], "error");
        assert_eq!(body["error"], "country 'XX' not found");
        assert!(Uuid::parse_str(body["runId"].as_str().unwrap()).is_ok());
    }

    #[test]
    fn test_series_query_from_camel_case() {
        let query: SeriesQuery = serde_json::from_value(json!({ "window": 3, "derivativeWindow": 2 })).unwrap();
        assert_eq!(query.window, Some(3));
        assert_eq!(query.derivative_window, Some(2));
    }
}
