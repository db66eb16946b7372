//! Time-window filtering of long rows.

use crate::models::{LongObservationRow, PeriodKey};

/// Keep the rows observed at or after `start`.
pub fn filter_from(rows: &[LongObservationRow], start: PeriodKey) -> Vec<LongObservationRow> {
    rows.iter().filter(|r| r.quarter >= start).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::strategies::arb_quarter;
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    fn row(quarter: &str, value: f64) -> LongObservationRow {
        LongObservationRow {
            dimensions: BTreeMap::from([("unit".to_string(), "PC".to_string())]),
            geo: "IT".into(),
            quarter: quarter.parse().unwrap(),
            value: Some(value),
        }
    }

    #[test]
    fn test_filter_is_inclusive() {
        let rows = vec![row("2019Q3", 1.0), row("2019Q4", 2.0), row("2020Q1", 3.0)];
        let kept = filter_from(&rows, "2019Q4".parse().unwrap());

        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].quarter.to_string(), "2019Q4");
        assert_eq!(kept[0], rows[1]);
    }

    #[test]
    fn test_filter_twice_equals_once() {
        let rows = vec![row("2018Q1", 1.0), row("2020Q2", 2.0), row("2019Q4", 3.0)];
        let start = "2019Q4".parse().unwrap();
        let once = filter_from(&rows, start);
        let twice = filter_from(&once, start);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_filter_empty_result() {
        let rows = vec![row("2018Q1", 1.0)];
        assert!(filter_from(&rows, "2030Q1".parse().unwrap()).is_empty());
        assert!(filter_from(&[], "2030Q1".parse().unwrap()).is_empty());
    }

    fn arb_rows() -> impl Strategy<Value = Vec<LongObservationRow>> {
        prop::collection::vec((arb_quarter(), prop::option::of(-1e3f64..1e3)), 0..30).prop_map(|pairs| {
            pairs
                .into_iter()
                .map(|(quarter, value)| LongObservationRow {
                    dimensions: BTreeMap::new(),
                    geo: "IT".into(),
                    quarter,
                    value,
                })
                .collect()
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_filter_is_idempotent(rows in arb_rows(), start in arb_quarter()) {
            let once = filter_from(&rows, start);
            let twice = filter_from(&once, start);

            prop_assert_eq!(&once, &twice);
            prop_assert!(once.iter().all(|r| r.quarter >= start));
            prop_assert_eq!(once.len(), rows.iter().filter(|r| r.quarter >= start).count());
        }
    }
}
