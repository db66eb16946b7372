//! Auxiliary statistics over a single quarter-ordered series.
//!
//! All outputs are aligned with the input: position `i` of every vector
//! describes input point `i`, and `None` marks positions where the statistic
//! is undefined.

use serde::Serialize;

use crate::error::{ComposeError, ComposeResult};
use crate::models::PeriodKey;

/// Allowed moving-average windows.
pub const MOVING_AVERAGE_WINDOWS: std::ops::RangeInclusive<usize> = 2..=4;

/// Allowed moving-derivative windows.
pub const MOVING_DERIVATIVE_WINDOWS: std::ops::RangeInclusive<usize> = 2..=3;

/// Statistics for one series.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesStatistics {
    pub quarters: Vec<PeriodKey>,
    pub values: Vec<f64>,
    pub moving_average_window: usize,
    pub moving_average: Vec<Option<f64>>,
    pub derivative: Vec<Option<f64>>,
    pub moving_derivative_window: usize,
    pub moving_derivative: Vec<Option<f64>>,
}

/// Compute every statistic for a quarter-ordered series.
pub fn series_statistics(
    points: &[(PeriodKey, f64)],
    moving_average_window: usize,
    moving_derivative_window: usize,
) -> ComposeResult<SeriesStatistics> {
    let values: Vec<f64> = points.iter().map(|(_, v)| *v).collect();

    Ok(SeriesStatistics {
        quarters: points.iter().map(|(q, _)| *q).collect(),
        moving_average: moving_average(&values, moving_average_window)?,
        derivative: derivative(points),
        moving_derivative: moving_derivative(&values, moving_derivative_window)?,
        values,
        moving_average_window,
        moving_derivative_window,
    })
}

/// Simple trailing mean; the first `window - 1` positions are undefined.
pub fn moving_average(values: &[f64], window: usize) -> ComposeResult<Vec<Option<f64>>> {
    check_window("moving average", window, &MOVING_AVERAGE_WINDOWS, "2, 3 or 4")?;

    Ok((0..values.len())
        .map(|i| {
            (i + 1 >= window)
                .then(|| values[i + 1 - window..=i].iter().sum::<f64>() / window as f64)
        })
        .collect())
}

/// Discrete derivative in value per quarter.
///
/// Interior points use the second-order difference over their two
/// neighbours, weighted by the spacing on each side, so uneven gaps between
/// quarters stay exact for quadratics. The first and last points use
/// one-sided differences. A single point has no derivative.
pub fn derivative(points: &[(PeriodKey, f64)]) -> Vec<Option<f64>> {
    let n = points.len();
    if n < 2 {
        return vec![None; n];
    }

    let slope = |a: usize, b: usize| {
        let (qa, va) = points[a];
        let (qb, vb) = points[b];
        let dt = qb.quarters_since(&qa);
        (dt != 0).then(|| (vb - va) / dt as f64)
    };

    let centered = |i: usize| {
        let (q0, x0) = points[i - 1];
        let (q1, x1) = points[i];
        let (q2, x2) = points[i + 1];
        let h1 = q1.quarters_since(&q0) as f64;
        let h2 = q2.quarters_since(&q1) as f64;
        (h1 != 0.0 && h2 != 0.0 && h1 + h2 != 0.0).then(|| {
            (h1 * h1 * x2 - h2 * h2 * x0 + (h2 * h2 - h1 * h1) * x1) / (h1 * h2 * (h1 + h2))
        })
    };

    (0..n)
        .map(|i| match i {
            0 => slope(0, 1),
            i if i == n - 1 => slope(n - 2, n - 1),
            i => centered(i),
        })
        .collect()
}

/// Trailing mean of the first difference; the first `window` positions are
/// undefined.
pub fn moving_derivative(values: &[f64], window: usize) -> ComposeResult<Vec<Option<f64>>> {
    check_window("moving derivative", window, &MOVING_DERIVATIVE_WINDOWS, "2 or 3")?;

    Ok((0..values.len())
        .map(|i| {
            (i >= window).then(|| {
                let sum: f64 = (i + 1 - window..=i).map(|j| values[j] - values[j - 1]).sum();
                sum / window as f64
            })
        })
        .collect())
}

fn check_window(
    kind: &'static str,
    window: usize,
    allowed_range: &std::ops::RangeInclusive<usize>,
    allowed: &'static str,
) -> ComposeResult<()> {
    if allowed_range.contains(&window) {
        Ok(())
    } else {
        Err(ComposeError::InvalidWindow { kind, window, allowed })
    }
}
