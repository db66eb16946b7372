//! # dtpi - Digital Transformation Potential Index
//!
//! dtpi turns quarterly Eurostat tables (ICT value added, ICT employment share,
//! online labour-demand share) into per-country normalized series and five
//! candidate composite indices.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  Provider   │────▶│   Parser    │────▶│  Transform  │────▶│   Report    │
//! │ (API / dir) │     │ (SDMX TSV)  │     │ (reshape →  │     │ (per        │
//! │   cached    │     │             │     │  indices)   │     │  country)   │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use dtpi::{run_analysis, AnalysisConfig, CachedProvider, DirectoryProvider};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = AnalysisConfig::default();
//!     let provider = CachedProvider::new(DirectoryProvider::new("data"));
//!     let report = run_analysis(&provider, &config).await.unwrap();
//!     println!("Analysed {} countries", report.countries.len());
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Domain models (PeriodKey, observation rows, records)
//! - [`config`] - Analysis configuration
//! - [`parser`] - Wide table parsing with auto-detection
//! - [`source`] - Data providers
//! - [`cache`] - Fetch cache
//! - [`transform`] - Reshape, selection, normalization, indices, pipeline
//! - [`validation`] - Output checks
//! - [`api`] - HTTP API server

// Core modules
pub mod error;
pub mod models;
pub mod config;

// Input
pub mod parser;
pub mod source;
pub mod cache;

// Transformation
pub mod transform;

// Validation
pub mod validation;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ComposeError, ConfigError, PipelineError, ReshapeError, ServerError, SourceError, TableError,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    CellValue, DimensionFilters, IndexKind, IndexValues, LongObservationRow, MergedCountryRecord,
    Metric, NormalizedSeriesPoint, PeriodKey, SeriesPoint, WideObservationTable,
};

// =============================================================================
// Re-exports - Configuration
// =============================================================================

pub use config::{AnalysisConfig, SourceConfig, DEFAULT_EUROSTAT_URL};

// =============================================================================
// Re-exports - Parsing
// =============================================================================

pub use parser::{parse_bytes_auto, parse_table, parse_table_file, ParseResult, TableFormat};

// =============================================================================
// Re-exports - Sources and cache
// =============================================================================

pub use cache::{CacheStats, CachedProvider, FetchCache};
pub use source::{provider_from_config, DataProvider, DirectoryProvider, EurostatClient, StaticProvider};

// =============================================================================
// Re-exports - Transformation
// =============================================================================

pub use transform::{
    analyze_metric_table, compose, filter_from, normalize, reshape, run_analysis, select_series,
    series_statistics, AnalysisReport, CountryFailure, CountryReport, MetricSeriesReport,
    SeriesStatistics,
};

// =============================================================================
// Re-exports - Validation
// =============================================================================

pub use validation::{is_valid_country_report, validate_country_report};

// Server
pub mod server {
    pub use crate::api::server::start_server;
}
