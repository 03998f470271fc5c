//! In-process cache backend, used for ephemeral sessions and tests.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use time::OffsetDateTime;

use crate::{CacheBackend, CacheEntry, CacheError, CacheStats, CacheTable, TableStats};

#[derive(Debug, Default)]
struct MemoryInner {
    tables: HashMap<CacheTable, HashMap<String, CacheEntry>>,
}

/// Thread-safe in-memory cache. Readers share the lock; writers are exclusive.
#[derive(Debug, Default)]
pub struct MemoryCache {
    inner: RwLock<MemoryInner>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, MemoryInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, MemoryInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of stored entries, including expired ones.
    pub fn len(&self) -> usize {
        self.read().tables.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheBackend for MemoryCache {
    fn get(&self, table: CacheTable, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        let store = self.read();
        Ok(store
            .tables
            .get(&table)
            .and_then(|entries| entries.get(key))
            .filter(|entry| !entry.is_expired())
            .cloned())
    }

    fn put(&self, table: CacheTable, entry: &CacheEntry) -> Result<(), CacheError> {
        self.write()
            .tables
            .entry(table)
            .or_default()
            .insert(entry.key.clone(), entry.clone());
        Ok(())
    }

    fn invalidate(&self, table: CacheTable, key: &str) -> Result<bool, CacheError> {
        Ok(self
            .write()
            .tables
            .get_mut(&table)
            .is_some_and(|entries| entries.remove(key).is_some()))
    }

    fn invalidate_table(&self, table: CacheTable) -> Result<usize, CacheError> {
        Ok(self
            .write()
            .tables
            .remove(&table)
            .map_or(0, |entries| entries.len()))
    }

    fn cleanup_expired(&self) -> Result<usize, CacheError> {
        let now = OffsetDateTime::now_utc();
        let mut store = self.write();
        let mut removed = 0;
        for entries in store.tables.values_mut() {
            let before = entries.len();
            entries.retain(|_, entry| !entry.is_expired_at(now));
            removed += before - entries.len();
        }
        Ok(removed)
    }

    fn stats(&self) -> Result<CacheStats, CacheError> {
        let now = OffsetDateTime::now_utc();
        let store = self.read();
        let tables = CacheTable::ALL
            .into_iter()
            .map(|table| {
                let entries = store.tables.get(&table);
                let total = entries.map_or(0, HashMap::len) as u64;
                let expired = entries.map_or(0, |entries| {
                    entries
                        .values()
                        .filter(|entry| entry.is_expired_at(now))
                        .count()
                }) as u64;
                let payload_bytes = entries.map_or(0, |entries| {
                    entries.values().map(|entry| entry.payload.len()).sum::<usize>()
                }) as u64;
                TableStats {
                    table,
                    total,
                    active: total - expired,
                    expired,
                    payload_bytes,
                }
            })
            .collect();

        Ok(CacheStats {
            location: String::from("memory"),
            file_bytes: None,
            tables,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn expired_entries_are_hidden_but_counted() {
        let cache = MemoryCache::new();
        let stale = CacheEntry::new("stale", "SPY", "{}", Duration::from_secs(5))
            .with_fetched_at(OffsetDateTime::now_utc() - time::Duration::minutes(1));
        cache.put(CacheTable::Equity, &stale).expect("put");

        assert!(cache.get(CacheTable::Equity, "stale").expect("get").is_none());
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().expect("stats").expired_entries(), 1);

        assert_eq!(cache.cleanup_expired().expect("cleanup"), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn invalidate_all_clears_every_table() {
        let cache = MemoryCache::new();
        for table in CacheTable::ALL {
            let entry = CacheEntry::new("k", "X", "{}", Duration::from_secs(60));
            cache.put(table, &entry).expect("put");
        }

        assert_eq!(cache.invalidate_all().expect("invalidate"), 3);
        assert!(cache.is_empty());
        assert!(!cache.invalidate(CacheTable::Equity, "k").expect("invalidate key"));
    }
}
