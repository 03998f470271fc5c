use std::fs;
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use ::duckdb::{Connection, ToSql};
use time::OffsetDateTime;
use tracing::{debug, info};

use crate::duckdb::DuckDbConnectionManager;
use crate::migrations;
use crate::{
    from_unix_micros, unix_micros, CacheBackend, CacheConfig, CacheEntry, CacheError, CacheStats,
    CacheTable, TableStats,
};

/// Cache backed by a `DuckDB` file, surviving process restarts.
///
/// Reads run on independent pooled connections. Writes take `write_lock`
/// so concurrent writers of the same key apply one after another (last
/// writer wins) instead of failing on a transaction conflict.
pub struct DuckDbCache {
    manager: DuckDbConnectionManager,
    write_lock: Mutex<()>,
}

impl DuckDbCache {
    /// Open (creating if needed) the cache database and apply migrations.
    pub fn open(config: CacheConfig) -> Result<Self, CacheError> {
        if let Some(parent) = config.db_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let manager = DuckDbConnectionManager::open(config.db_path.clone(), config.max_pool_size)?;
        let cache = Self {
            manager,
            write_lock: Mutex::new(()),
        };
        cache.initialize()?;
        info!(path = %config.db_path.display(), "cache database ready");
        Ok(cache)
    }

    pub fn initialize(&self) -> Result<(), CacheError> {
        let connection = self.manager.acquire()?;
        migrations::apply_migrations(&connection)?;
        Ok(())
    }

    pub fn db_path(&self) -> &Path {
        self.manager.db_path()
    }

    fn write<T>(
        &self,
        operation: impl FnOnce(&Connection) -> Result<T, CacheError>,
    ) -> Result<T, CacheError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let connection = self.manager.acquire()?;
        connection.execute_batch("BEGIN TRANSACTION")?;
        let result = operation(&connection);
        finalize_transaction(&connection, result)
    }

    fn table_stats(
        connection: &Connection,
        table: CacheTable,
        now_us: i64,
    ) -> Result<TableStats, CacheError> {
        let sql = format!(
            "SELECT COUNT(*), \
                    COUNT(*) FILTER (WHERE expires_at_us < ?), \
                    CAST(COALESCE(SUM(payload_bytes), 0) AS BIGINT) \
             FROM {}",
            table.as_str()
        );
        let params: [&dyn ToSql; 1] = [&now_us];
        let (total, expired, payload_bytes): (i64, i64, i64) =
            connection.query_row(sql.as_str(), params.as_slice(), |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })?;

        let total = non_negative(total);
        let expired = non_negative(expired);
        Ok(TableStats {
            table,
            total,
            active: total.saturating_sub(expired),
            expired,
            payload_bytes: non_negative(payload_bytes),
        })
    }
}

impl CacheBackend for DuckDbCache {
    fn get(&self, table: CacheTable, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        let connection = self.manager.acquire()?;
        let sql = format!(
            "SELECT cache_key, label, payload, fetched_at_us, ttl_us FROM {} WHERE cache_key = ?",
            table.as_str()
        );
        let mut statement = connection.prepare(sql.as_str())?;
        let params: [&dyn ToSql; 1] = [&key];
        let mut rows = statement.query(params.as_slice())?;
        let Some(row) = rows.next()? else {
            debug!(table = %table, cache_key = key, "cache miss");
            return Ok(None);
        };

        let fetched_at_us: i64 = row.get(3)?;
        let ttl_us: i64 = row.get(4)?;
        let entry = CacheEntry {
            key: row.get(0)?,
            label: row.get(1)?,
            payload: row.get(2)?,
            fetched_at: from_unix_micros(fetched_at_us)?,
            ttl: std::time::Duration::from_micros(non_negative(ttl_us)),
        };

        if entry.is_expired() {
            debug!(table = %table, cache_key = key, "cache entry expired");
            return Ok(None);
        }
        Ok(Some(entry))
    }

    fn put(&self, table: CacheTable, entry: &CacheEntry) -> Result<(), CacheError> {
        let sql = format!(
            "INSERT OR REPLACE INTO {} \
             (cache_key, label, payload, payload_bytes, fetched_at_us, ttl_us, expires_at_us) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            table.as_str()
        );
        let payload_bytes = i64::try_from(entry.payload.len()).unwrap_or(i64::MAX);
        let fetched_at_us = entry.fetched_at_micros();
        let ttl_us = i64::try_from(entry.ttl.as_micros()).unwrap_or(i64::MAX);
        let expires_at_us = entry.expires_at_micros();

        self.write(|connection| {
            let params: [&dyn ToSql; 7] = [
                &entry.key,
                &entry.label,
                &entry.payload,
                &payload_bytes,
                &fetched_at_us,
                &ttl_us,
                &expires_at_us,
            ];
            connection.execute(sql.as_str(), params.as_slice())?;
            Ok(())
        })?;
        debug!(table = %table, cache_key = %entry.key, bytes = payload_bytes, "cache entry stored");
        Ok(())
    }

    fn invalidate(&self, table: CacheTable, key: &str) -> Result<bool, CacheError> {
        let sql = format!("DELETE FROM {} WHERE cache_key = ?", table.as_str());
        let removed = self.write(|connection| {
            let params: [&dyn ToSql; 1] = [&key];
            Ok(connection.execute(sql.as_str(), params.as_slice())?)
        })?;
        Ok(removed > 0)
    }

    fn invalidate_table(&self, table: CacheTable) -> Result<usize, CacheError> {
        let sql = format!("DELETE FROM {}", table.as_str());
        let removed = self.write(|connection| {
            Ok(connection.execute(sql.as_str(), [] as [&dyn ToSql; 0])?)
        })?;
        info!(table = %table, removed, "cache table invalidated");
        Ok(removed)
    }

    fn invalidate_all(&self) -> Result<usize, CacheError> {
        let removed = self.write(|connection| {
            let mut removed = 0;
            for table in CacheTable::ALL {
                let sql = format!("DELETE FROM {}", table.as_str());
                removed += connection.execute(sql.as_str(), [] as [&dyn ToSql; 0])?;
            }
            Ok(removed)
        })?;
        info!(removed, "all cache tables invalidated");
        Ok(removed)
    }

    fn cleanup_expired(&self) -> Result<usize, CacheError> {
        let now_us = unix_micros(OffsetDateTime::now_utc());
        let removed = self.write(|connection| {
            let mut removed = 0;
            for table in CacheTable::ALL {
                let sql = format!("DELETE FROM {} WHERE expires_at_us < ?", table.as_str());
                let params: [&dyn ToSql; 1] = [&now_us];
                removed += connection.execute(sql.as_str(), params.as_slice())?;
            }
            Ok(removed)
        })?;
        info!(removed, "expired cache entries removed");
        Ok(removed)
    }

    fn stats(&self) -> Result<CacheStats, CacheError> {
        let now_us = unix_micros(OffsetDateTime::now_utc());
        let connection = self.manager.acquire()?;
        let tables = CacheTable::ALL
            .into_iter()
            .map(|table| Self::table_stats(&connection, table, now_us))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(CacheStats {
            location: self.db_path().display().to_string(),
            file_bytes: fs::metadata(self.db_path()).ok().map(|meta| meta.len()),
            tables,
        })
    }
}

fn finalize_transaction<T>(
    connection: &Connection,
    result: Result<T, CacheError>,
) -> Result<T, CacheError> {
    match result {
        Ok(value) => {
            connection.execute_batch("COMMIT")?;
            Ok(value)
        }
        Err(error) => {
            let _ = connection.execute_batch("ROLLBACK");
            Err(error)
        }
    }
}

fn non_negative(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use tempfile::tempdir;

    fn open(dir: &Path) -> DuckDbCache {
        DuckDbCache::open(CacheConfig {
            db_path: dir.join("nested").join("cache.duckdb"),
            max_pool_size: 2,
        })
        .expect("open cache")
    }

    #[test]
    fn open_creates_parent_directories() {
        let temp = tempdir().expect("tempdir");
        let cache = open(temp.path());
        assert!(cache.db_path().exists());
    }

    #[test]
    fn put_overwrites_existing_key() {
        let temp = tempdir().expect("tempdir");
        let cache = open(temp.path());
        let first = CacheEntry::new("k", "AAPL", r#"{"v":1}"#, Duration::from_secs(60));
        let second = CacheEntry::new("k", "AAPL", r#"{"v":2}"#, Duration::from_secs(60));

        cache.put(CacheTable::Equity, &first).expect("first put");
        cache.put(CacheTable::Equity, &second).expect("second put");

        let stored = cache
            .get(CacheTable::Equity, "k")
            .expect("get")
            .expect("entry");
        assert_eq!(stored.payload, r#"{"v":2}"#);
        assert_eq!(cache.stats().expect("stats").total_entries(), 1);
    }

    #[test]
    fn tables_are_isolated() {
        let temp = tempdir().expect("tempdir");
        let cache = open(temp.path());
        let entry = CacheEntry::new("shared", "AAPL", "{}", Duration::from_secs(60));
        cache.put(CacheTable::Options, &entry).expect("put");

        assert!(cache.get(CacheTable::Equity, "shared").expect("get").is_none());
        assert_eq!(cache.invalidate_table(CacheTable::Equity).expect("clear"), 0);
        assert!(cache.get(CacheTable::Options, "shared").expect("get").is_some());
    }

    #[test]
    fn stats_count_expired_rows_until_swept() {
        let temp = tempdir().expect("tempdir");
        let cache = open(temp.path());
        let stale = CacheEntry::new("old", "MSFT", "{}", Duration::from_secs(1))
            .with_fetched_at(OffsetDateTime::now_utc() - time::Duration::hours(1));
        let fresh = CacheEntry::new("new", "MSFT", "{}", Duration::from_secs(3600));
        cache.put(CacheTable::Equity, &stale).expect("stale");
        cache.put(CacheTable::Equity, &fresh).expect("fresh");

        let stats = cache.stats().expect("stats");
        assert_eq!(stats.total_entries(), 2);
        assert_eq!(stats.expired_entries(), 1);
        assert!(stats.file_bytes.is_some());

        assert_eq!(cache.cleanup_expired().expect("cleanup"), 1);
        assert_eq!(cache.stats().expect("stats").total_entries(), 1);
    }
}
