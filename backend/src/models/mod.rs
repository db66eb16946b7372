//! Domain models for the index pipeline.
//!
//! This module contains the core data structures used throughout the pipeline:
//!
//! - [`PeriodKey`] - Calendar quarter identifier (`2019Q4`), totally ordered
//! - [`WideObservationTable`] - Source table with one column per period
//! - [`LongObservationRow`] - One observation per row after reshaping
//! - [`Metric`] - The three analysed series and their fixed dimension filters
//! - [`SeriesPoint`] / [`NormalizedSeriesPoint`] - Per-country series values
//! - [`MergedCountryRecord`] - Joined quarter with the five index values

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::ReshapeError;

/// Canonical geography column name.
pub const GEO_COLUMN: &str = "geo";

/// Compound geography/time header used by Eurostat wide tables.
pub const COMPOUND_GEO_COLUMN: &str = "geo\\TIME_PERIOD";

/// Id columns of the national accounts table (value added, employment).
pub const NATIONAL_ACCOUNTS_ID_COLUMNS: &[&str] =
    &["freq", "unit", "nace_r2", "s_adj", "na_item", "geo"];

/// Id columns of the online labour-demand table (no industry dimension).
pub const LABOUR_DEMAND_ID_COLUMNS: &[&str] = &["freq", "unit", "geo"];

// =============================================================================
// Period Key
// =============================================================================

static QUARTER_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})Q([1-4])$").expect("Invalid quarter label regex"));

/// A calendar quarter. Ordered by year, then quarter number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PeriodKey {
    year: i32,
    quarter: u8,
}

impl PeriodKey {
    /// Default start of the analysis window.
    pub const DEFAULT_START: PeriodKey = PeriodKey { year: 2019, quarter: 4 };

    /// Create a key, returning `None` unless `quarter` is 1-4.
    pub fn new(year: i32, quarter: u8) -> Option<Self> {
        (1..=4).contains(&quarter).then_some(Self { year, quarter })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn quarter(&self) -> u8 {
        self.quarter
    }

    /// Position on a continuous quarter axis.
    pub fn ordinal(&self) -> i64 {
        i64::from(self.year) * 4 + i64::from(self.quarter - 1)
    }

    /// Number of quarters from `earlier` to `self` (negative if `earlier` is later).
    pub fn quarters_since(&self, earlier: &PeriodKey) -> i64 {
        self.ordinal() - earlier.ordinal()
    }

    /// The following quarter.
    pub fn next(&self) -> Self {
        if self.quarter == 4 {
            Self { year: self.year + 1, quarter: 1 }
        } else {
            Self { year: self.year, quarter: self.quarter + 1 }
        }
    }
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}Q{}", self.year, self.quarter)
    }
}

impl FromStr for PeriodKey {
    type Err = ReshapeError;

    /// Parse a strict `YYYYQn` label.
    fn from_str(label: &str) -> Result<Self, Self::Err> {
        let caps = QUARTER_LABEL
            .captures(label)
            .ok_or_else(|| ReshapeError::Format { label: label.to_string() })?;

        let year = caps[1]
            .parse::<i32>()
            .map_err(|_| ReshapeError::Format { label: label.to_string() })?;
        let quarter = caps[2]
            .parse::<u8>()
            .map_err(|_| ReshapeError::Format { label: label.to_string() })?;

        Ok(Self { year, quarter })
    }
}

impl TryFrom<String> for PeriodKey {
    type Error = ReshapeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PeriodKey> for String {
    fn from(key: PeriodKey) -> Self {
        key.to_string()
    }
}

// =============================================================================
// Wide Table
// =============================================================================

/// A single cell of a wide table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Number(f64),
    Text(String),
    Missing,
}

impl CellValue {
    /// Numeric reading of the cell; text cells are parsed, flags ignored.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            CellValue::Text(s) => parse_observation(s),
            CellValue::Missing => None,
        }
    }

    /// Textual reading of the cell, used for dimension codes.
    pub fn as_code(&self) -> String {
        match self {
            CellValue::Number(n) => n.to_string(),
            CellValue::Text(s) => s.clone(),
            CellValue::Missing => String::new(),
        }
    }
}

/// Parse an observation cell such as `12.3`, `12.3 p` or `:`.
///
/// Eurostat appends status flags after the number; `:` marks a missing value.
pub fn parse_observation(raw: &str) -> Option<f64> {
    let token = raw.split_whitespace().next()?;
    if token == ":" {
        return None;
    }
    token.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Wide statistical table: dimension columns plus one column per period.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WideObservationTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl WideObservationTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<CellValue>>) -> Self {
        Self { headers, rows }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// =============================================================================
// Long Rows and Series
// =============================================================================

/// One observation after reshaping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LongObservationRow {
    /// Id-column values other than `geo`.
    pub dimensions: BTreeMap<String, String>,
    pub geo: String,
    pub quarter: PeriodKey,
    pub value: Option<f64>,
}

impl LongObservationRow {
    /// Look up a dimension code by column name, `geo` included.
    pub fn dimension(&self, column: &str) -> Option<&str> {
        if column == GEO_COLUMN {
            Some(self.geo.as_str())
        } else {
            self.dimensions.get(column).map(String::as_str)
        }
    }
}

/// Column to required value, matched as an exact conjunction.
pub type DimensionFilters = BTreeMap<String, String>;

/// A single observation of one country's metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub quarter: PeriodKey,
    pub value: f64,
}

/// A series point rescaled to the unit interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedSeriesPoint {
    pub quarter: PeriodKey,
    pub value: f64,
    pub normalized_value: f64,
}

// =============================================================================
// Metrics
// =============================================================================

/// The three analysed series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Metric {
    /// ICT share of gross value added.
    Gva,
    /// ICT share of total employment.
    Employment,
    /// ICT share of online job advertisements.
    LabourDemand,
}

impl Metric {
    pub const ALL: [Metric; 3] = [Metric::Gva, Metric::Employment, Metric::LabourDemand];

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Gva => "gva",
            Metric::Employment => "employment",
            Metric::LabourDemand => "labour-demand",
        }
    }

    /// Id columns of the source table this metric is read from.
    pub fn id_columns(&self) -> &'static [&'static str] {
        match self {
            Metric::Gva | Metric::Employment => NATIONAL_ACCOUNTS_ID_COLUMNS,
            Metric::LabourDemand => LABOUR_DEMAND_ID_COLUMNS,
        }
    }

    /// Fixed dimension filters selecting this metric's series.
    pub fn dimension_filters(&self) -> DimensionFilters {
        let pairs: &[(&str, &str)] = match self {
            Metric::Gva => &[
                ("nace_r2", "J"),
                ("unit", "PC_GDP"),
                ("na_item", "B1G"),
                ("s_adj", "NSA"),
            ],
            Metric::Employment => &[
                ("nace_r2", "J"),
                ("unit", "PC_TOT_PER"),
                ("na_item", "EMP_DC"),
                ("s_adj", "NSA"),
            ],
            Metric::LabourDemand => &[("unit", "PC")],
        };
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "gva" => Ok(Metric::Gva),
            "employment" | "emp" => Ok(Metric::Employment),
            "labour-demand" | "labor-demand" | "ld" => Ok(Metric::LabourDemand),
            other => Err(format!(
                "unknown metric '{}' (expected gva, employment or labour-demand)",
                other
            )),
        }
    }
}

// =============================================================================
// Indices
// =============================================================================

/// The five candidate composite indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    Index1,
    Index2,
    Index3,
    Index4,
    Index5,
}

impl IndexKind {
    pub const ALL: [IndexKind; 5] = [
        IndexKind::Index1,
        IndexKind::Index2,
        IndexKind::Index3,
        IndexKind::Index4,
        IndexKind::Index5,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IndexKind::Index1 => "index1",
            IndexKind::Index2 => "index2",
            IndexKind::Index3 => "index3",
            IndexKind::Index4 => "index4",
            IndexKind::Index5 => "index5",
        }
    }

    /// Read this index from a record's values.
    pub fn value(&self, indices: &IndexValues) -> Option<f64> {
        match self {
            IndexKind::Index1 => Some(indices.index1),
            IndexKind::Index2 => Some(indices.index2),
            IndexKind::Index3 => Some(indices.index3),
            IndexKind::Index4 => indices.index4,
            IndexKind::Index5 => indices.index5,
        }
    }
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Index values for one quarter. Index4/Index5 depend on `delta` and are
/// undefined for the first merged quarter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndexValues {
    pub index1: f64,
    pub index2: f64,
    pub index3: f64,
    pub index4: Option<f64>,
    pub index5: Option<f64>,
}

/// One merged quarter of a country's analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergedCountryRecord {
    pub country: String,
    pub quarter: PeriodKey,
    pub gva: f64,
    pub employment: f64,
    pub labour_demand: f64,
    /// Previous minus current normalized labour demand.
    pub delta: Option<f64>,
    pub indices: IndexValues,
}

/// Property-test generators shared by the transform tests.
#[cfg(test)]
pub(crate) mod strategies {
    use super::PeriodKey;
    use proptest::prelude::*;
    use std::collections::BTreeSet;
    use std::ops::Range;

    pub fn arb_quarter_in(years: Range<i32>) -> impl Strategy<Value = PeriodKey> {
        (years, 1u8..=4).prop_map(|(year, quarter)| PeriodKey { year, quarter })
    }

    pub fn arb_quarter() -> impl Strategy<Value = PeriodKey> {
        arb_quarter_in(2000..2030)
    }

    /// Distinct quarters, iterated in ascending order.
    pub fn arb_quarter_set(years: Range<i32>, size: Range<usize>) -> impl Strategy<Value = BTreeSet<PeriodKey>> {
        prop::collection::btree_set(arb_quarter_in(years), size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_key_parse_and_display() {
        let key: PeriodKey = "2019Q4".parse().unwrap();
        assert_eq!(key.year(), 2019);
        assert_eq!(key.quarter(), 4);
        assert_eq!(key.to_string(), "2019Q4");
    }

    #[test]
    fn test_period_key_accepts_every_quarter() {
        for quarter in 1..=4u8 {
            let label = format!("2021Q{}", quarter);
            let key: PeriodKey = label.parse().unwrap();
            assert_eq!(key.quarter(), quarter);
            assert_eq!(key.to_string(), label);
        }
        assert_eq!("0999Q1".parse::<PeriodKey>().unwrap().year(), 999);
    }

    #[test]
    fn test_period_key_rejects_other_patterns() {
        for label in ["2019-Q4", "2019Q5", "2019Q0", "2019", "2019M01", " 2019Q4", "19Q1"] {
            let err = label.parse::<PeriodKey>().unwrap_err();
            assert!(matches!(err, ReshapeError::Format { .. }), "{}", label);
        }
    }

    #[test]
    fn test_period_key_ordering() {
        let a: PeriodKey = "2019Q4".parse().unwrap();
        let b: PeriodKey = "2020Q1".parse().unwrap();
        let c: PeriodKey = "2020Q3".parse().unwrap();
        assert!(a < b && b < c);
        assert_eq!(c.quarters_since(&a), 3);
        assert_eq!(a.next(), b);
    }

    #[test]
    fn test_period_key_serde_as_label() {
        let key = PeriodKey::new(2021, 2).unwrap();
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, "\"2021Q2\"");
        let back: PeriodKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);
        assert!(serde_json::from_str::<PeriodKey>("\"2021-06\"").is_err());
    }

    #[test]
    fn test_parse_observation_flags() {
        assert_eq!(parse_observation("12.3"), Some(12.3));
        assert_eq!(parse_observation(" 4.5 p"), Some(4.5));
        assert_eq!(parse_observation(":"), None);
        assert_eq!(parse_observation(": c"), None);
        assert_eq!(parse_observation(""), None);
    }

    #[test]
    fn test_metric_filters() {
        let gva = Metric::Gva.dimension_filters();
        assert_eq!(gva.get("unit").map(String::as_str), Some("PC_GDP"));
        assert_eq!(gva.len(), 4);
        let ld = Metric::LabourDemand.dimension_filters();
        assert_eq!(ld.len(), 1);
        assert!(!Metric::LabourDemand.id_columns().contains(&"nace_r2"));
        assert_eq!("labour_demand".parse::<Metric>().unwrap(), Metric::LabourDemand);
    }
}
