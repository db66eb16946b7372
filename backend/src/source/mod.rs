//! Data providers returning wide tables.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use dtpi::source::{DataProvider, EurostatClient};
//!
//! let client = EurostatClient::new(dtpi::config::DEFAULT_EUROSTAT_URL);
//! let table = client.fetch("isoc_sk_oja1", "2019Q4".parse()?).await?;
//! ```
//!
//! The pipeline only depends on [`DataProvider`]; how a table is obtained is
//! the provider's business.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::api::logs::{log_info, log_warning};
use crate::config::SourceConfig;
use crate::error::{SourceError, SourceResult, TableError};
use crate::models::{PeriodKey, WideObservationTable};
use crate::parser::{parse_bytes_auto, parse_table};

/// Number of attempts for one dataset request
const DEFAULT_MAX_RETRIES: u32 = 3;

/// Delay between retries in milliseconds
const RETRY_DELAY_MS: u64 = 1000;

/// Source of wide statistical tables.
#[async_trait]
pub trait DataProvider: Send + Sync {
    /// Fetch a dataset restricted to periods at or after `start` where the
    /// provider supports it.
    async fn fetch(&self, dataset: &str, start: PeriodKey) -> SourceResult<WideObservationTable>;

    /// Fetch as a shared immutable snapshot. Caching providers override this
    /// to hand out the same snapshot for repeated requests.
    async fn fetch_shared(
        &self,
        dataset: &str,
        start: PeriodKey,
    ) -> SourceResult<Arc<WideObservationTable>> {
        self.fetch(dataset, start).await.map(Arc::new)
    }
}

// =============================================================================
// Eurostat
// =============================================================================

/// Client for the Eurostat SDMX 2.1 dissemination API (TSV output).
#[derive(Clone)]
pub struct EurostatClient {
    client: reqwest::Client,
    base_url: String,
    max_retries: u32,
    retry_delay: Duration,
}

impl EurostatClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: Duration::from_millis(RETRY_DELAY_MS),
        }
    }

    pub fn with_retries(mut self, max_retries: u32, retry_delay: Duration) -> Self {
        self.max_retries = max_retries.max(1);
        self.retry_delay = retry_delay;
        self
    }

    /// Request URL for a dataset.
    pub fn dataset_url(&self, dataset: &str, start: PeriodKey) -> String {
        format!(
            "{}/{}?format=TSV&compressed=false&startPeriod={}",
            self.base_url, dataset, start
        )
    }

    async fn try_fetch(&self, dataset: &str, url: &str) -> SourceResult<WideObservationTable> {
        let response = self
            .client
            .get(url)
            .header("Accept", "text/tab-separated-values, text/plain")
            .send()
            .await
            .map_err(|e| SourceError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                dataset: dataset.to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| SourceError::RequestFailed(e.to_string()))?;

        parse_bytes_auto(&bytes)
            .map(|parsed| parsed.table)
            .map_err(|source| SourceError::Table {
                dataset: dataset.to_string(),
                source,
            })
    }
}

#[async_trait]
impl DataProvider for EurostatClient {
    async fn fetch(&self, dataset: &str, start: PeriodKey) -> SourceResult<WideObservationTable> {
        let url = self.dataset_url(dataset, start);
        log_info(format!("Fetching {} from Eurostat...", dataset));

        let mut last_error = None;
        for attempt in 1..=self.max_retries {
            match self.try_fetch(dataset, &url).await {
                Ok(table) => return Ok(table),
                Err(e) if is_retryable(&e) => {
                    log_warning(format!(
                        "Attempt {}/{} for {} failed: {}",
                        attempt, self.max_retries, dataset, e
                    ));
                    last_error = Some(e);
                    if attempt < self.max_retries {
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| SourceError::RequestFailed("no attempt made".to_string())))
    }
}

/// Transport failures and server-side statuses are worth another attempt.
fn is_retryable(err: &SourceError) -> bool {
    match err {
        SourceError::RequestFailed(_) => true,
        SourceError::Status { status, .. } => *status == 429 || *status >= 500,
        _ => false,
    }
}

// =============================================================================
// Local directory
// =============================================================================

/// Reads `{dir}/{dataset}.tsv`, falling back to `{dir}/{dataset}.csv`.
///
/// Tables are returned whole; window filtering happens in the pipeline.
#[derive(Debug, Clone)]
pub struct DirectoryProvider {
    dir: PathBuf,
}

impl DirectoryProvider {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn locate(&self, dataset: &str) -> Option<PathBuf> {
        ["tsv", "csv"]
            .iter()
            .map(|ext| self.dir.join(format!("{}.{}", dataset, ext)))
            .find(|p| p.is_file())
    }
}

#[async_trait]
impl DataProvider for DirectoryProvider {
    async fn fetch(&self, dataset: &str, _start: PeriodKey) -> SourceResult<WideObservationTable> {
        let path = self.locate(dataset).ok_or_else(|| SourceError::NotFound {
            dataset: dataset.to_string(),
            dir: self.dir.display().to_string(),
        })?;
        log_info(format!("Reading {} from {}", dataset, path.display()));

        let table_err = |source: TableError| SourceError::Table {
            dataset: dataset.to_string(),
            source,
        };
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| table_err(e.into()))?;
        parse_bytes_auto(&bytes).map(|parsed| parsed.table).map_err(table_err)
    }
}

// =============================================================================
// In-memory
// =============================================================================

/// Serves tables held in memory, keyed by dataset id.
#[derive(Debug, Clone, Default)]
pub struct StaticProvider {
    tables: std::collections::HashMap<String, WideObservationTable>,
}

impl StaticProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, dataset: &str, table: WideObservationTable) -> Self {
        self.tables.insert(dataset.to_string(), table);
        self
    }

    /// Parse table text and register it under `dataset`.
    pub fn with_text(self, dataset: &str, text: &str) -> SourceResult<Self> {
        let table = parse_table(text).map_err(|source| SourceError::Table {
            dataset: dataset.to_string(),
            source,
        })?;
        Ok(self.with_table(dataset, table))
    }
}

#[async_trait]
impl DataProvider for StaticProvider {
    async fn fetch(&self, dataset: &str, _start: PeriodKey) -> SourceResult<WideObservationTable> {
        self.tables.get(dataset).cloned().ok_or_else(|| SourceError::NotFound {
            dataset: dataset.to_string(),
            dir: "memory".to_string(),
        })
    }
}

/// Build the provider a configuration asks for.
pub fn provider_from_config(source: &SourceConfig) -> Box<dyn DataProvider> {
    match source {
        SourceConfig::Eurostat { base_url } => Box::new(EurostatClient::new(base_url.clone())),
        SourceConfig::Directory { path } => Box::new(DirectoryProvider::new(path)),
    }
}

#[async_trait]
impl<P: DataProvider + ?Sized> DataProvider for Box<P> {
    async fn fetch(&self, dataset: &str, start: PeriodKey) -> SourceResult<WideObservationTable> {
        (**self).fetch(dataset, start).await
    }

    async fn fetch_shared(
        &self,
        dataset: &str,
        start: PeriodKey,
    ) -> SourceResult<Arc<WideObservationTable>> {
        (**self).fetch_shared(dataset, start).await
    }
}
