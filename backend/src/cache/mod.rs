//! Fetch cache - Reuse downloaded tables within a process
//!
//! Tables are stored as immutable `Arc` snapshots keyed by dataset and start
//! quarter. Entries live for the lifetime of the process and are never
//! invalidated. Each key has its own in-flight cell, so a slow download only
//! holds up requests for the same table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};

use crate::api::logs::log_info;
use crate::error::SourceResult;
use crate::models::{PeriodKey, WideObservationTable};
use crate::source::DataProvider;

/// Identity of a fetched table
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CacheKey {
    pub dataset: String,
    pub start: PeriodKey,
}

impl CacheKey {
    pub fn new(dataset: &str, start: PeriodKey) -> Self {
        Self {
            dataset: dataset.to_string(),
            start,
        }
    }
}

/// A stored table with metadata
#[derive(Debug, Clone)]
pub struct CachedTable {
    pub table: Arc<WideObservationTable>,
    /// When the table was fetched
    pub fetched_at: DateTime<Utc>,
    /// Number of times served from the cache
    pub use_count: u32,
}

/// Hit/miss counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

/// In-memory store of fetched tables
#[derive(Debug, Default)]
pub struct FetchCache {
    entries: HashMap<CacheKey, CachedTable>,
    hits: u64,
    misses: u64,
}

impl FetchCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look a table up, counting the hit or miss.
    pub fn get(&mut self, key: &CacheKey) -> Option<Arc<WideObservationTable>> {
        match self.entries.get_mut(key) {
            Some(entry) => {
                self.hits += 1;
                entry.use_count += 1;
                Some(Arc::clone(&entry.table))
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Store a freshly fetched table and return the shared snapshot.
    pub fn insert(&mut self, key: CacheKey, table: WideObservationTable) -> Arc<WideObservationTable> {
        self.insert_shared(key, Arc::new(table))
    }

    /// Store an already shared table. An existing entry for `key` wins.
    pub fn insert_shared(
        &mut self,
        key: CacheKey,
        table: Arc<WideObservationTable>,
    ) -> Arc<WideObservationTable> {
        let entry = self.entries.entry(key).or_insert_with(|| CachedTable {
            table,
            fetched_at: Utc::now(),
            use_count: 0,
        });
        Arc::clone(&entry.table)
    }

    pub fn entry(&self, key: &CacheKey) -> Option<&CachedTable> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            hits: self.hits,
            misses: self.misses,
        }
    }
}

/// One table being fetched, shared by every request for its key.
type InFlight = Arc<OnceCell<Arc<WideObservationTable>>>;

/// Read-through cache in front of any provider.
///
/// Locks are only held for map lookups. Concurrent requests for the same
/// table wait on that key's cell for a single download; requests for other
/// tables proceed independently.
pub struct CachedProvider<P> {
    inner: P,
    cache: Mutex<FetchCache>,
    in_flight: Mutex<HashMap<CacheKey, InFlight>>,
}

impl<P: DataProvider> CachedProvider<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            cache: Mutex::new(FetchCache::new()),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Misses count every lookup not served from a stored entry.
    pub async fn stats(&self) -> CacheStats {
        self.cache.lock().await.stats()
    }
}

#[async_trait]
impl<P: DataProvider> DataProvider for CachedProvider<P> {
    async fn fetch(&self, dataset: &str, start: PeriodKey) -> SourceResult<WideObservationTable> {
        let shared = self.fetch_shared(dataset, start).await?;
        Ok(WideObservationTable::clone(&shared))
    }

    async fn fetch_shared(
        &self,
        dataset: &str,
        start: PeriodKey,
    ) -> SourceResult<Arc<WideObservationTable>> {
        let key = CacheKey::new(dataset, start);

        let cached = self.cache.lock().await.get(&key);
        if let Some(table) = cached {
            log_info(format!("Using cached {} (from {})", dataset, start));
            return Ok(table);
        }

        let cell: InFlight = Arc::clone(self.in_flight.lock().await.entry(key.clone()).or_default());

        // A failed fetch leaves the cell empty, so the next request retries.
        let inner = &self.inner;
        let table = cell
            .get_or_try_init(|| async move { inner.fetch(dataset, start).await.map(Arc::new) })
            .await
            .map(Arc::clone)?;

        Ok(self.cache.lock().await.insert_shared(key, table))
    }
}
