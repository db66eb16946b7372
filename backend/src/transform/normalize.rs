//! Per-series min/max normalization.
//!
//! Each (country, metric) series is rescaled with its own range. A constant
//! series has no range: every point gets [`DEGENERATE_SENTINEL`] and the
//! result carries a [`DegenerateSeries`] warning instead of NaN.

use serde::Serialize;

use crate::models::{NormalizedSeriesPoint, SeriesPoint};

/// Normalized value assigned to every point of a zero-variance series.
pub const DEGENERATE_SENTINEL: f64 = 0.0;

/// Warning for a series whose minimum equals its maximum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DegenerateSeries {
    pub value: f64,
    pub points: usize,
}

/// A normalized series plus its degenerate-range warning, if any.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedSeries {
    pub points: Vec<NormalizedSeriesPoint>,
    pub warning: Option<DegenerateSeries>,
}

impl NormalizedSeries {
    pub fn is_degenerate(&self) -> bool {
        self.warning.is_some()
    }
}

/// Rescale a series to [0, 1] using its own minimum and maximum.
pub fn normalize(points: &[SeriesPoint]) -> NormalizedSeries {
    let Some((min_v, max_v)) = value_range(points) else {
        return NormalizedSeries { points: Vec::new(), warning: None };
    };

    let span = max_v - min_v;
    let degenerate = span == 0.0;

    let normalized = points
        .iter()
        .map(|p| NormalizedSeriesPoint {
            quarter: p.quarter,
            value: p.value,
            normalized_value: if degenerate {
                DEGENERATE_SENTINEL
            } else {
                (p.value - min_v) / span
            },
        })
        .collect();

    NormalizedSeries {
        points: normalized,
        warning: degenerate.then_some(DegenerateSeries {
            value: min_v,
            points: points.len(),
        }),
    }
}

fn value_range(points: &[SeriesPoint]) -> Option<(f64, f64)> {
    points.iter().fold(None, |acc, p| match acc {
        None => Some((p.value, p.value)),
        Some((lo, hi)) => Some((lo.min(p.value), hi.max(p.value))),
    })
}
