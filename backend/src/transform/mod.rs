//! Transformation module.
//!
//! This module turns wide statistical tables into per-country indices:
//! - Reshape: wide columns to long observation rows
//! - Window: start-quarter filtering
//! - Select: one country's series per metric
//! - Normalize: per-series min/max rescaling
//! - Compose: quarter merge and index formulas
//! - Stats: moving averages and derivatives
//! - Pipeline: the end-to-end analysis

pub mod compose;
pub mod normalize;
pub mod pipeline;
pub mod reshape;
pub mod select;
pub mod stats;
pub mod window;

pub use compose::{compose, compute_indices, EPSILON};
pub use normalize::{normalize, DegenerateSeries, NormalizedSeries, DEGENERATE_SENTINEL};
pub use pipeline::*;
pub use reshape::reshape;
pub use select::{select_metric, select_series};
pub use stats::{series_statistics, SeriesStatistics};
pub use window::filter_from;
