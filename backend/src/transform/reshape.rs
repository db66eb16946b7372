//! Wide-to-long reshaping of statistical tables.
//!
//! # Architecture
//!
//! ```text
//! Wide table (one column per period)          →  Long rows (one per observation)
//! ┌──────┬──────┬─────┬────────┬────────┐        ┌──────┬─────┬────────┬───────┐
//! │ freq │ unit │ geo │ 2020Q1 │ 2020Q2 │        │ unit │ geo │ quarter│ value │
//! │ Q    │ PC   │ IT  │ 10     │ 20     │   →    │ PC   │ IT  │ 2020Q1 │ 10    │
//! └──────┴──────┴─────┴────────┴────────┘        │ PC   │ IT  │ 2020Q2 │ 20    │
//!                                                └──────┴─────┴────────┴───────┘
//! ```
//!
//! The compound `geo\TIME_PERIOD` header is renamed to `geo` first. Every column
//! outside `id_columns` is read as a `YYYYQn` period label; one bad label fails
//! the whole reshape. Duplicate period headers are not collapsed.

use std::collections::{BTreeMap, HashSet};

use crate::error::{ReshapeError, ReshapeResult};
use crate::models::{
    LongObservationRow, PeriodKey, WideObservationTable, COMPOUND_GEO_COLUMN, GEO_COLUMN,
};

/// Reshape a wide table into long observation rows.
///
/// `id_columns` must name exactly the table's dimension columns (after the
/// `geo` rename) and must include `geo`.
pub fn reshape<S: AsRef<str>>(
    wide: &WideObservationTable,
    id_columns: &[S],
) -> ReshapeResult<Vec<LongObservationRow>> {
    let headers = normalize_headers(&wide.headers);
    let id_set: HashSet<&str> = id_columns.iter().map(AsRef::as_ref).collect();

    let geo_idx = check_id_columns(&headers, &id_set, id_columns)?;

    let id_positions: Vec<(usize, &str)> = headers
        .iter()
        .enumerate()
        .filter(|(i, h)| *i != geo_idx && id_set.contains(h.as_str()))
        .map(|(i, h)| (i, h.as_str()))
        .collect();

    // Parse every period header before emitting anything.
    let periods: Vec<(usize, PeriodKey)> = headers
        .iter()
        .enumerate()
        .filter(|(_, h)| !id_set.contains(h.as_str()))
        .map(|(i, h)| h.parse::<PeriodKey>().map(|key| (i, key)))
        .collect::<Result<_, _>>()?;

    let mut long = Vec::with_capacity(wide.rows.len() * periods.len());
    for (row_idx, row) in wide.rows.iter().enumerate() {
        if row.len() != headers.len() {
            return Err(ReshapeError::MalformedRow {
                row: row_idx,
                expected: headers.len(),
                found: row.len(),
            });
        }

        let geo = row[geo_idx].as_code();
        let dimensions: BTreeMap<String, String> = id_positions
            .iter()
            .map(|(i, name)| (name.to_string(), row[*i].as_code()))
            .collect();

        for (col, quarter) in &periods {
            long.push(LongObservationRow {
                dimensions: dimensions.clone(),
                geo: geo.clone(),
                quarter: *quarter,
                value: row[*col].as_number(),
            });
        }
    }

    Ok(long)
}

/// Rename the compound geography header to `geo`.
pub fn normalize_headers(headers: &[String]) -> Vec<String> {
    headers
        .iter()
        .map(|h| {
            if h == COMPOUND_GEO_COLUMN {
                GEO_COLUMN.to_string()
            } else {
                h.clone()
            }
        })
        .collect()
}

/// Check that the id columns line up with the table's dimension columns and
/// return the position of `geo`.
///
/// A non-id header that does not start with a digit is treated as an
/// unlisted dimension column (configuration error); a header that starts with
/// a digit is left for period parsing to accept or reject.
fn check_id_columns<S: AsRef<str>>(
    headers: &[String],
    id_set: &HashSet<&str>,
    id_columns: &[S],
) -> ReshapeResult<usize> {
    let dimension_headers: Vec<String> = headers
        .iter()
        .filter(|h| id_set.contains(h.as_str()) || !looks_like_period(h))
        .cloned()
        .collect();

    let mismatch = || ReshapeError::Configuration {
        expected: id_columns.iter().map(|c| c.as_ref().to_string()).collect(),
        found: dimension_headers.clone(),
    };

    let missing = id_set.iter().any(|c| !headers.iter().any(|h| h == c));
    let unlisted = dimension_headers.iter().any(|h| !id_set.contains(h.as_str()));
    let duplicated = dimension_headers.len() != id_set.len() || id_set.len() != id_columns.len();
    if missing || unlisted || duplicated {
        return Err(mismatch());
    }

    headers
        .iter()
        .position(|h| h == GEO_COLUMN)
        .filter(|_| id_set.contains(GEO_COLUMN))
        .ok_or_else(mismatch)
}

fn looks_like_period(header: &str) -> bool {
    header.chars().next().is_some_and(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::strategies::arb_quarter_set;
    use proptest::prelude::*;
    use crate::models::{CellValue, LABOUR_DEMAND_ID_COLUMNS, NATIONAL_ACCOUNTS_ID_COLUMNS};

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    fn national_accounts_table() -> WideObservationTable {
        WideObservationTable::new(
            ["freq", "unit", "nace_r2", "s_adj", "na_item", "geo\\TIME_PERIOD", "2020Q1", "2020Q2", "2020Q3"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            vec![
                vec![text("Q"), text("PC_GDP"), text("J"), text("NSA"), text("B1G"), text("IT"),
                     CellValue::Number(10.0), CellValue::Number(20.0), CellValue::Missing],
                vec![text("Q"), text("PC_GDP"), text("J"), text("NSA"), text("B1G"), text("FR"),
                     CellValue::Number(1.0), CellValue::Number(2.0), CellValue::Number(3.0)],
            ],
        )
    }

    #[test]
    fn test_reshape_row_count_is_rows_times_periods() {
        let table = national_accounts_table();
        let long = reshape(&table, NATIONAL_ACCOUNTS_ID_COLUMNS).unwrap();

        assert_eq!(long.len(), 2 * 3);
        assert_eq!(long[0].geo, "IT");
        assert_eq!(long[0].quarter.to_string(), "2020Q1");
        assert_eq!(long[0].value, Some(10.0));
        assert_eq!(long[2].value, None);
        assert_eq!(long[0].dimension("nace_r2"), Some("J"));
        assert_eq!(long[0].dimension("geo"), Some("IT"));
        assert!(!long[0].dimensions.contains_key("geo"));
    }

    #[test]
    fn test_reshape_plain_geo_column() {
        let table = WideObservationTable::new(
            vec!["freq".into(), "unit".into(), "geo".into(), "2021Q4".into()],
            vec![vec![text("Q"), text("PC"), text("DE"), text("3.2")]],
        );
        let long = reshape(&table, LABOUR_DEMAND_ID_COLUMNS).unwrap();
        assert_eq!(long.len(), 1);
        assert_eq!(long[0].geo, "DE");
        assert_eq!(long[0].value, Some(3.2));
    }

    #[test]
    fn test_reshape_bad_period_label_fails_whole_table() {
        let table = WideObservationTable::new(
            vec!["freq".into(), "unit".into(), "geo".into(), "2020Q1".into(), "2020-06".into()],
            vec![vec![text("Q"), text("PC"), text("IT"), text("1"), text("2")]],
        );
        let err = reshape(&table, LABOUR_DEMAND_ID_COLUMNS).unwrap_err();
        assert!(matches!(err, ReshapeError::Format { ref label } if label == "2020-06"));
    }

    #[test]
    fn test_reshape_wrong_id_columns_is_configuration_error() {
        let table = national_accounts_table();

        // Labour-demand id set against the national accounts table.
        let err = reshape(&table, LABOUR_DEMAND_ID_COLUMNS).unwrap_err();
        assert!(matches!(err, ReshapeError::Configuration { .. }));

        // Id column that is not in the table.
        let err = reshape(&table, &["freq", "unit", "nace_r2", "s_adj", "na_item", "geo", "sector"])
            .unwrap_err();
        assert!(matches!(err, ReshapeError::Configuration { .. }));
    }

    #[test]
    fn test_reshape_without_geo_is_configuration_error() {
        let table = WideObservationTable::new(
            vec!["freq".into(), "unit".into(), "2020Q1".into()],
            vec![vec![text("Q"), text("PC"), text("1")]],
        );
        let err = reshape(&table, &["freq", "unit"]).unwrap_err();
        assert!(matches!(err, ReshapeError::Configuration { .. }));
    }

    #[test]
    fn test_reshape_keeps_duplicate_period_headers() {
        let table = WideObservationTable::new(
            vec!["freq".into(), "unit".into(), "geo".into(), "2020Q1".into(), "2020Q1".into()],
            vec![vec![text("Q"), text("PC"), text("IT"), text("1"), text("2")]],
        );
        let long = reshape(&table, LABOUR_DEMAND_ID_COLUMNS).unwrap();
        assert_eq!(long.len(), 2);
        assert_eq!(long[0].quarter, long[1].quarter);
    }

    #[test]
    fn test_reshape_malformed_row() {
        let table = WideObservationTable::new(
            vec!["freq".into(), "unit".into(), "geo".into(), "2020Q1".into()],
            vec![vec![text("Q"), text("PC"), text("IT")]],
        );
        let err = reshape(&table, LABOUR_DEMAND_ID_COLUMNS).unwrap_err();
        assert!(matches!(err, ReshapeError::MalformedRow { row: 0, expected: 4, found: 3 }));
    }

    fn arb_wide_table() -> impl Strategy<Value = WideObservationTable> {
        (arb_quarter_set(2000..2030, 1..8), 1usize..6)
            .prop_flat_map(|(quarters, n)| {
                let cells = prop::collection::vec(prop::option::of(-1e6f64..1e6), quarters.len());
                (Just(quarters), prop::collection::vec(cells, n))
            })
            .prop_map(|(quarters, values)| {
                let mut headers: Vec<String> =
                    ["freq", "unit", "geo\\TIME_PERIOD"].iter().map(|s| s.to_string()).collect();
                headers.extend(quarters.iter().map(|q| q.to_string()));
                let rows = values
                    .into_iter()
                    .enumerate()
                    .map(|(i, row)| {
                        let mut cells = vec![text("Q"), text("PC"), text(&format!("C{}", i))];
                        cells.extend(row.into_iter().map(|v| v.map_or(CellValue::Missing, CellValue::Number)));
                        cells
                    })
                    .collect();
                WideObservationTable::new(headers, rows)
            })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_reshape_emits_rows_times_periods(table in arb_wide_table()) {
            let periods = table.headers.len() - LABOUR_DEMAND_ID_COLUMNS.len();
            let long = reshape(&table, LABOUR_DEMAND_ID_COLUMNS).unwrap();

            prop_assert_eq!(long.len(), table.rows.len() * periods);
            prop_assert!(long.iter().all(|r| table.headers.contains(&r.quarter.to_string())));
        }
    }
}
