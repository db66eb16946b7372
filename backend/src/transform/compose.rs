//! Index composition over the three normalized series of one country.
//!
//! With `G`, `E`, `L` the normalized GVA, employment and labour-demand values
//! and `ε` = [`EPSILON`]:
//!
//! | Index  | Formula                              |
//! |--------|--------------------------------------|
//! | index1 | `(G + E + L) / 3`                    |
//! | index2 | `G * (E + L)`                        |
//! | index3 | `G * (1 + E + L)`                    |
//! | index4 | `(G / (E + ε)) * (1 + delta)`        |
//! | index5 | `ln((G + 1) / (E + ε)) * (1 + delta)` |
//!
//! `delta` is the previous quarter's `L` minus the current one, taken over the
//! merged quarters; index4 and index5 are undefined for the first quarter.

use std::collections::HashMap;

use crate::error::{ComposeError, ComposeResult};
use crate::models::{IndexValues, MergedCountryRecord, Metric, NormalizedSeriesPoint, PeriodKey};

/// Guard added to the employment denominator of index4 and index5.
pub const EPSILON: f64 = 0.001;

/// Inner-join the three series on quarter and evaluate the indices.
///
/// Quarters missing from any input are dropped. A series with two points for
/// the same quarter is rejected as ambiguous.
pub fn compose(
    country: &str,
    gva: &[NormalizedSeriesPoint],
    employment: &[NormalizedSeriesPoint],
    labour_demand: &[NormalizedSeriesPoint],
) -> ComposeResult<Vec<MergedCountryRecord>> {
    let gva_by_quarter = index_by_quarter(Metric::Gva, gva)?;
    let emp_by_quarter = index_by_quarter(Metric::Employment, employment)?;
    let ld_by_quarter = index_by_quarter(Metric::LabourDemand, labour_demand)?;

    let mut quarters: Vec<PeriodKey> = gva_by_quarter
        .keys()
        .filter(|q| emp_by_quarter.contains_key(q) && ld_by_quarter.contains_key(q))
        .copied()
        .collect();
    quarters.sort();

    let mut records = Vec::with_capacity(quarters.len());
    let mut previous_ld: Option<f64> = None;

    for quarter in quarters {
        let g = gva_by_quarter[&quarter];
        let e = emp_by_quarter[&quarter];
        let l = ld_by_quarter[&quarter];

        let delta = previous_ld.map(|prev| prev - l);
        previous_ld = Some(l);

        records.push(MergedCountryRecord {
            country: country.to_string(),
            quarter,
            gva: g,
            employment: e,
            labour_demand: l,
            delta,
            indices: compute_indices(g, e, l, delta),
        });
    }

    Ok(records)
}

/// Evaluate the five index formulas for one quarter.
pub fn compute_indices(g: f64, e: f64, l: f64, delta: Option<f64>) -> IndexValues {
    IndexValues {
        index1: (g + e + l) / 3.0,
        index2: g * (e + l),
        index3: g * (1.0 + e + l),
        index4: delta.map(|d| (g / (e + EPSILON)) * (1.0 + d)),
        index5: delta.map(|d| ((g + 1.0) / (e + EPSILON)).ln() * (1.0 + d)),
    }
}

fn index_by_quarter(
    metric: Metric,
    points: &[NormalizedSeriesPoint],
) -> ComposeResult<HashMap<PeriodKey, f64>> {
    let mut map = HashMap::with_capacity(points.len());
    for p in points {
        if map.insert(p.quarter, p.normalized_value).is_some() {
            return Err(ComposeError::AmbiguousQuarter {
                metric,
                quarter: p.quarter.to_string(),
            });
        }
    }
    Ok(map)
}
