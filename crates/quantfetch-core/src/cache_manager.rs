//! Administrative operations over the result cache.

use std::sync::Arc;

use quantfetch_cache::{CacheBackend, CacheError, CacheStats, CacheTable};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::IngestError;
use crate::request::FetchRequest;

/// Aggregate cache counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheSummary {
    pub total_entries: u64,
    pub active_entries: u64,
    pub expired_entries: u64,
    pub payload_bytes: u64,
    /// File size when known, payload bytes otherwise.
    pub approximate_bytes: u64,
    #[serde(flatten)]
    pub stats: CacheStats,
}

impl CacheSummary {
    pub fn location(&self) -> &str {
        &self.stats.location
    }

    pub fn expired_ratio(&self) -> f64 {
        if self.total_entries == 0 {
            return 0.0;
        }
        self.expired_entries as f64 / self.total_entries as f64
    }
}

impl From<CacheStats> for CacheSummary {
    fn from(stats: CacheStats) -> Self {
        Self {
            total_entries: stats.total_entries(),
            active_entries: stats.active_entries(),
            expired_entries: stats.expired_entries(),
            payload_bytes: stats.payload_bytes(),
            approximate_bytes: stats.approximate_bytes(),
            stats,
        }
    }
}

/// Result of a destructive operation that needs explicit confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "removed", rename_all = "snake_case")]
pub enum Invalidation {
    /// Nothing was touched; repeat with `confirm = true`.
    ConfirmationRequired,
    Removed(usize),
}

impl Invalidation {
    pub const fn removed(self) -> usize {
        match self {
            Self::ConfirmationRequired => 0,
            Self::Removed(count) => count,
        }
    }
}

/// Outcome of [`CacheManager::auto_cleanup_if_needed`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AutoCleanup {
    pub expired_ratio: f64,
    pub expired_entries: u64,
    /// Rows swept, `None` when the thresholds were not reached.
    pub removed: Option<usize>,
}

#[derive(Clone)]
pub struct CacheManager {
    cache: Arc<dyn CacheBackend>,
}

impl CacheManager {
    pub const DEFAULT_MAX_EXPIRED_RATIO: f64 = 0.2;
    pub const DEFAULT_MIN_EXPIRED: u64 = 10;

    pub fn new(cache: Arc<dyn CacheBackend>) -> Self {
        Self { cache }
    }

    pub fn backend(&self) -> &Arc<dyn CacheBackend> {
        &self.cache
    }

    pub async fn summary(&self) -> Result<CacheSummary, IngestError> {
        let stats = self.blocking(|cache| cache.stats()).await?;
        Ok(CacheSummary::from(stats))
    }

    /// Sweep expired entries from every table.
    pub async fn cleanup_expired_entries(&self) -> Result<usize, IngestError> {
        let removed = self.blocking(|cache| cache.cleanup_expired()).await?;
        info!(removed, "swept expired cache entries");
        Ok(removed)
    }

    /// Sweep only when more than `max_expired_ratio` of the entries are
    /// expired and at least `min_expired` of them are.
    pub async fn auto_cleanup_if_needed(
        &self,
        max_expired_ratio: f64,
        min_expired: u64,
    ) -> Result<AutoCleanup, IngestError> {
        let summary = self.summary().await?;
        let expired_ratio = summary.expired_ratio();
        let removed = if expired_ratio > max_expired_ratio && summary.expired_entries >= min_expired {
            Some(self.cleanup_expired_entries().await?)
        } else {
            None
        };

        Ok(AutoCleanup {
            expired_ratio,
            expired_entries: summary.expired_entries,
            removed,
        })
    }

    /// Drop one table (`equity`, `options_cache`, ...). Without `confirm`
    /// nothing is removed.
    pub async fn invalidate_table(
        &self,
        name: &str,
        confirm: bool,
    ) -> Result<Invalidation, IngestError> {
        let table = name.parse::<CacheTable>()?;
        if !confirm {
            warn!(table = %table, "refusing to invalidate without confirmation");
            return Ok(Invalidation::ConfirmationRequired);
        }

        let removed = self.blocking(move |cache| cache.invalidate_table(table)).await?;
        info!(table = %table, removed, "invalidated cache table");
        Ok(Invalidation::Removed(removed))
    }

    /// Drop every table. Without `confirm` nothing is removed.
    pub async fn invalidate_all(&self, confirm: bool) -> Result<Invalidation, IngestError> {
        if !confirm {
            warn!("refusing to invalidate the whole cache without confirmation");
            return Ok(Invalidation::ConfirmationRequired);
        }

        let removed = self.blocking(|cache| cache.invalidate_all()).await?;
        info!(removed, "invalidated all cache tables");
        Ok(Invalidation::Removed(removed))
    }

    /// Drop the entry a single request would read. Returns whether one existed.
    pub async fn invalidate_request(&self, request: &FetchRequest) -> Result<bool, IngestError> {
        let table = request.kind().table();
        let key = request.cache_key().as_str().to_owned();
        Ok(self.blocking(move |cache| cache.invalidate(table, &key)).await?)
    }

    async fn blocking<T, F>(&self, operation: F) -> Result<T, CacheError>
    where
        T: Send + 'static,
        F: FnOnce(&dyn CacheBackend) -> Result<T, CacheError> + Send + 'static,
    {
        let cache = Arc::clone(&self.cache);
        tokio::task::spawn_blocking(move || operation(cache.as_ref()))
            .await
            .map_err(|e| CacheError::Unavailable(format!("cache worker failed: {e}")))?
    }
}
