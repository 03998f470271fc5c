//! # quantfetch cache
//!
//! Durable result cache for the quantfetch ingestion pipeline.
//!
//! Fetched result sets are stored as serialized payloads keyed by a
//! deterministic request key, one table per data kind:
//!
//! | Table | Contents |
//! |-------|----------|
//! | `equity_cache` | Historical OHLCV frames |
//! | `options_cache` | Option chains |
//! | `fixed_income_cache` | Treasury yield frames |
//!
//! An entry expires once `now > fetched_at + ttl`. Expired rows stay on disk
//! until [`CacheBackend::cleanup_expired`] sweeps them, but [`CacheBackend::get`]
//! never returns them.
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use quantfetch_cache::{CacheBackend, CacheConfig, CacheEntry, CacheTable, DuckDbCache};
//!
//! let cache = DuckDbCache::open(CacheConfig::default())?;
//! let entry = CacheEntry::new("equity:AAPL:2024-01-02:2024-02-01:1d", "AAPL", "{}", Duration::from_secs(3600));
//! cache.put(CacheTable::Equity, &entry)?;
//! assert!(cache.get(CacheTable::Equity, &entry.key)?.is_some());
//! # Ok::<(), quantfetch_cache::CacheError>(())
//! ```

pub mod duckdb;
mod memory;
pub mod migrations;
mod store;

use std::env;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;

pub use crate::duckdb::{DuckDbConnectionManager, PooledConnection};
pub use crate::memory::MemoryCache;
pub use crate::store::DuckDbCache;

/// Errors raised by cache backends.
#[derive(Debug, Error)]
pub enum CacheError {
    /// `DuckDB` database error.
    #[error(transparent)]
    DuckDb(#[from] ::duckdb::Error),

    /// File system error while preparing the cache directory.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A stored payload or its metadata could not be decoded.
    #[error("corrupt cache entry: {0}")]
    Corrupt(String),

    /// Table name does not match any cache table.
    #[error("unknown cache table '{0}'")]
    UnknownTable(String),

    /// The backend could not service the call (worker lost, lock poisoned).
    #[error("cache unavailable: {0}")]
    Unavailable(String),
}

/// One cache table per data kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum CacheTable {
    #[serde(rename = "equity_cache")]
    Equity,
    #[serde(rename = "options_cache")]
    Options,
    #[serde(rename = "fixed_income_cache")]
    FixedIncome,
}

impl CacheTable {
    pub const ALL: [CacheTable; 3] = [Self::Equity, Self::Options, Self::FixedIncome];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Equity => "equity_cache",
            Self::Options => "options_cache",
            Self::FixedIncome => "fixed_income_cache",
        }
    }
}

impl Display for CacheTable {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CacheTable {
    type Err = CacheError;

    /// Accepts the table name (`equity_cache`) or the bare kind (`equity`).
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace('-', "_");
        let kind = normalized.strip_suffix("_cache").unwrap_or(&normalized);
        match kind {
            "equity" => Ok(Self::Equity),
            "options" => Ok(Self::Options),
            "fixed_income" | "fixedincome" => Ok(Self::FixedIncome),
            _ => Err(CacheError::UnknownTable(value.to_string())),
        }
    }
}

/// A stored result set.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    /// Deterministic request key.
    pub key: String,
    /// Symbol or series label, kept for administrative queries.
    pub label: String,
    /// Serialized payload (JSON).
    pub payload: String,
    pub fetched_at: OffsetDateTime,
    pub ttl: Duration,
}

impl CacheEntry {
    /// Build an entry stamped with the current UTC time.
    pub fn new(
        key: impl Into<String>,
        label: impl Into<String>,
        payload: impl Into<String>,
        ttl: Duration,
    ) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            payload: payload.into(),
            fetched_at: OffsetDateTime::now_utc(),
            ttl,
        }
    }

    #[must_use]
    pub fn with_fetched_at(mut self, fetched_at: OffsetDateTime) -> Self {
        self.fetched_at = fetched_at;
        self
    }

    pub fn fetched_at_micros(&self) -> i64 {
        unix_micros(self.fetched_at)
    }

    pub fn expires_at_micros(&self) -> i64 {
        let ttl = i64::try_from(self.ttl.as_micros()).unwrap_or(i64::MAX);
        self.fetched_at_micros().saturating_add(ttl)
    }

    /// An entry is expired strictly after `fetched_at + ttl`.
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        unix_micros(now) > self.expires_at_micros()
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(OffsetDateTime::now_utc())
    }
}

/// Per-table counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableStats {
    pub table: CacheTable,
    pub total: u64,
    pub active: u64,
    pub expired: u64,
    pub payload_bytes: u64,
}

/// Aggregate counters across all tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Database path, or `memory` for the in-process backend.
    pub location: String,
    /// On-disk size of the database file when known.
    pub file_bytes: Option<u64>,
    pub tables: Vec<TableStats>,
}

impl CacheStats {
    pub fn total_entries(&self) -> u64 {
        self.tables.iter().map(|table| table.total).sum()
    }

    pub fn active_entries(&self) -> u64 {
        self.tables.iter().map(|table| table.active).sum()
    }

    pub fn expired_entries(&self) -> u64 {
        self.tables.iter().map(|table| table.expired).sum()
    }

    pub fn payload_bytes(&self) -> u64 {
        self.tables.iter().map(|table| table.payload_bytes).sum()
    }

    /// Approximate footprint: the file size when known, payload bytes otherwise.
    pub fn approximate_bytes(&self) -> u64 {
        self.file_bytes.unwrap_or_else(|| self.payload_bytes())
    }
}

/// Storage contract for fetched result sets.
///
/// Implementations are synchronous; async callers run them on a blocking
/// worker. A write replaces the whole row, so readers observe either the
/// previous entry or the new one.
pub trait CacheBackend: Send + Sync {
    /// Return the entry for `key` unless it is absent or expired.
    fn get(&self, table: CacheTable, key: &str) -> Result<Option<CacheEntry>, CacheError>;

    /// Insert or overwrite the entry with the same key.
    fn put(&self, table: CacheTable, entry: &CacheEntry) -> Result<(), CacheError>;

    /// Remove one key. Returns whether a row was removed.
    fn invalidate(&self, table: CacheTable, key: &str) -> Result<bool, CacheError>;

    /// Remove every entry of one table.
    fn invalidate_table(&self, table: CacheTable) -> Result<usize, CacheError>;

    /// Remove every entry of every table.
    fn invalidate_all(&self) -> Result<usize, CacheError> {
        let mut removed = 0;
        for table in CacheTable::ALL {
            removed += self.invalidate_table(table)?;
        }
        Ok(removed)
    }

    /// Remove entries whose TTL has elapsed.
    fn cleanup_expired(&self) -> Result<usize, CacheError>;

    fn stats(&self) -> Result<CacheStats, CacheError>;
}

/// Location and pool sizing for [`DuckDbCache`].
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Path to the `DuckDB` database file.
    pub db_path: PathBuf,
    /// Maximum number of idle connections kept in the pool.
    pub max_pool_size: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            db_path: resolve_cache_home().join("cache.duckdb"),
            max_pool_size: 4,
        }
    }
}

/// `QUANT_FINANCE_HOME`, else `$HOME/.quant_finance`.
pub fn resolve_cache_home() -> PathBuf {
    if let Some(path) = env::var_os("QUANT_FINANCE_HOME") {
        let path = PathBuf::from(path);
        if !path.as_os_str().is_empty() {
            return path;
        }
    }

    if let Some(home) = env::var_os("HOME") {
        return PathBuf::from(home).join(".quant_finance");
    }

    PathBuf::from(".quant_finance")
}

pub(crate) fn unix_micros(at: OffsetDateTime) -> i64 {
    i64::try_from(at.unix_timestamp_nanos() / 1_000).unwrap_or(i64::MAX)
}

pub(crate) fn from_unix_micros(micros: i64) -> Result<OffsetDateTime, CacheError> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(micros) * 1_000)
        .map_err(|error| CacheError::Corrupt(format!("fetched_at out of range: {error}")))
}
