//! Series selection from long rows.
//!
//! A series is the slice of rows matching `geo == country` plus an exact
//! conjunction of dimension filters. Missing observations are dropped; the
//! one-point-per-quarter invariant is not enforced here, duplicates surface
//! later as an ambiguous merge.

use crate::models::{DimensionFilters, LongObservationRow, Metric, SeriesPoint};

/// Select one country's series, ordered by quarter.
pub fn select_series(
    rows: &[LongObservationRow],
    country: &str,
    filters: &DimensionFilters,
) -> Vec<SeriesPoint> {
    let mut points: Vec<SeriesPoint> = rows
        .iter()
        .filter(|r| r.geo == country && matches_filters(r, filters))
        .filter_map(|r| {
            r.value.map(|value| SeriesPoint {
                quarter: r.quarter,
                value,
            })
        })
        .collect();

    points.sort_by_key(|p| p.quarter);
    points
}

/// Select a metric's series using its fixed dimension filters.
pub fn select_metric(rows: &[LongObservationRow], country: &str, metric: Metric) -> Vec<SeriesPoint> {
    select_series(rows, country, &metric.dimension_filters())
}

/// Whether a row satisfies every filter. A filter on a column the row does
/// not carry never matches.
pub fn matches_filters(row: &LongObservationRow, filters: &DimensionFilters) -> bool {
    filters
        .iter()
        .all(|(column, required)| row.dimension(column) == Some(required.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn row(geo: &str, unit: &str, nace: &str, quarter: &str, value: Option<f64>) -> LongObservationRow {
        LongObservationRow {
            dimensions: BTreeMap::from([
                ("freq".to_string(), "Q".to_string()),
                ("unit".to_string(), unit.to_string()),
                ("nace_r2".to_string(), nace.to_string()),
                ("s_adj".to_string(), "NSA".to_string()),
                ("na_item".to_string(), "B1G".to_string()),
            ]),
            geo: geo.into(),
            quarter: quarter.parse().unwrap(),
            value,
        }
    }

    #[test]
    fn test_select_applies_country_and_filters() {
        let rows = vec![
            row("IT", "PC_GDP", "J", "2020Q2", Some(2.0)),
            row("IT", "PC_GDP", "J", "2020Q1", Some(1.0)),
            row("IT", "PC_GDP", "K", "2020Q1", Some(9.0)),
            row("IT", "CP_MEUR", "J", "2020Q1", Some(9.0)),
            row("FR", "PC_GDP", "J", "2020Q1", Some(9.0)),
        ];

        let points = select_metric(&rows, "IT", Metric::Gva);
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].quarter.to_string(), "2020Q1");
        assert_eq!(points[0].value, 1.0);
        assert_eq!(points[1].value, 2.0);
    }

    #[test]
    fn test_select_drops_missing_values() {
        let rows = vec![
            row("IT", "PC_GDP", "J", "2020Q1", None),
            row("IT", "PC_GDP", "J", "2020Q2", Some(2.0)),
        ];
        let points = select_metric(&rows, "IT", Metric::Gva);
        assert_eq!(points.len(), 1);
    }

    #[test]
    fn test_filter_on_absent_column_never_matches() {
        let mut r = row("IT", "PC", "J", "2020Q1", Some(1.0));
        r.dimensions.remove("nace_r2");
        let filters = Metric::Employment.dimension_filters();
        assert!(!matches_filters(&r, &filters));

        let ld = Metric::LabourDemand.dimension_filters();
        assert!(matches_filters(&r, &ld));
    }

    #[test]
    fn test_select_keeps_duplicates() {
        let rows = vec![
            row("IT", "PC_GDP", "J", "2020Q1", Some(1.0)),
            row("IT", "PC_GDP", "J", "2020Q1", Some(1.5)),
        ];
        assert_eq!(select_metric(&rows, "IT", Metric::Gva).len(), 2);
    }
}
