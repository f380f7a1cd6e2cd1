//! Key-value pool abstraction and its in-memory implementation.
//!
//! A pool stores either scalars or hashes (field → value maps) under string
//! keys, each with an absolute expiry. Hash records support single-field
//! writes so a form can persist one attribute or one widget value without
//! rewriting the whole record.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use lru::LruCache;
use metrics::counter;
use thiserror::Error;
use time::OffsetDateTime;

use crate::domain::Value;

use super::config::CacheConfig;
use super::lock::{rw_read, rw_write};

pub(crate) const METRIC_CACHE_HIT_TOTAL: &str = "stepform_cache_hit_total";
pub(crate) const METRIC_CACHE_MISS_TOTAL: &str = "stepform_cache_miss_total";
pub(crate) const METRIC_CACHE_EVICT_TOTAL: &str = "stepform_cache_evict_total";

pub type Hash = BTreeMap<String, Value>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    #[error("key `{key}` does not exist in pool `{pool}`")]
    KeyNotExist { pool: String, key: String },
    #[error("key `{key}` in pool `{pool}` does not hold a {expected}")]
    WrongType {
        pool: String,
        key: String,
        expected: &'static str,
    },
}

impl CacheError {
    pub fn is_key_not_exist(&self) -> bool {
        matches!(self, CacheError::KeyNotExist { .. })
    }
}

/// One named key-value namespace with per-key expiry.
///
/// Operations are atomic per key; nothing spans keys or pools.
pub trait CachePool: Send + Sync {
    fn name(&self) -> &str;

    fn has(&self, key: &str) -> bool;

    fn get(&self, key: &str) -> Result<Value, CacheError>;

    fn put(&self, key: &str, value: Value, ttl: Duration);

    fn get_hash(&self, key: &str) -> Result<Hash, CacheError>;

    fn put_hash(&self, key: &str, hash: Hash, ttl: Duration);

    /// Write one field into an existing hash, keeping the record's expiry.
    fn put_hash_item(&self, key: &str, field: &str, value: Value) -> Result<(), CacheError>;

    /// Restart a live record's expiry at `ttl` from now. Returns `false` when
    /// there is no live record.
    fn touch(&self, key: &str, ttl: Duration) -> bool;

    /// Returns `true` when a live record was removed.
    fn remove(&self, key: &str) -> bool;

    /// Number of records currently held, expired ones included.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Factory for named pools.
pub trait CacheDriver: Send + Sync {
    fn create_pool(&self, name: &str) -> Arc<dyn CachePool>;
}

/// Process-local driver backed by LRU maps.
#[derive(Debug, Clone)]
pub struct MemoryDriver {
    config: CacheConfig,
}

impl MemoryDriver {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }
}

impl CacheDriver for MemoryDriver {
    fn create_pool(&self, name: &str) -> Arc<dyn CachePool> {
        Arc::new(MemoryPool::new(name, &self.config))
    }
}

#[derive(Debug, Clone)]
enum Record {
    Scalar(Value),
    Hash(Hash),
}

#[derive(Debug, Clone)]
struct Entry {
    record: Record,
    expires_at: OffsetDateTime,
}

impl Entry {
    fn new(record: Record, ttl: Duration) -> Self {
        Self {
            record,
            expires_at: expiry_after(ttl),
        }
    }

    fn is_expired(&self, now: OffsetDateTime) -> bool {
        now >= self.expires_at
    }
}

fn expiry_after(ttl: Duration) -> OffsetDateTime {
    let now = OffsetDateTime::now_utc();
    time::Duration::try_from(ttl)
        .ok()
        .and_then(|ttl| now.checked_add(ttl))
        .unwrap_or(time::PrimitiveDateTime::MAX.assume_utc())
}

pub struct MemoryPool {
    name: String,
    entries: RwLock<LruCache<String, Entry>>,
}

impl MemoryPool {
    pub fn new(name: impl Into<String>, config: &CacheConfig) -> Self {
        Self {
            name: name.into(),
            entries: RwLock::new(LruCache::new(config.pool_capacity_non_zero())),
        }
    }

    fn with_live<R>(
        &self,
        key: &str,
        op: &'static str,
        f: impl FnOnce(&mut Entry) -> Result<R, CacheError>,
    ) -> Result<R, CacheError> {
        let mut entries = rw_write(&self.entries, &self.name, op);
        let now = OffsetDateTime::now_utc();

        let expired = match entries.peek(key) {
            Some(entry) => entry.is_expired(now),
            None => {
                self.record_miss();
                return Err(self.missing(key));
            }
        };
        if expired {
            entries.pop(key);
            self.record_miss();
            return Err(self.missing(key));
        }

        match entries.get_mut(key) {
            Some(entry) => {
                self.record_hit();
                f(entry)
            }
            None => Err(self.missing(key)),
        }
    }

    fn insert(&self, key: &str, entry: Entry, op: &'static str) {
        let evicted = rw_write(&self.entries, &self.name, op).push(key.to_string(), entry);
        if evicted.is_some_and(|(evicted_key, _)| evicted_key != key) {
            counter!(METRIC_CACHE_EVICT_TOTAL, "pool" => self.name.clone()).increment(1);
        }
    }

    fn missing(&self, key: &str) -> CacheError {
        CacheError::KeyNotExist {
            pool: self.name.clone(),
            key: key.to_string(),
        }
    }

    fn wrong_type(&self, key: &str, expected: &'static str) -> CacheError {
        CacheError::WrongType {
            pool: self.name.clone(),
            key: key.to_string(),
            expected,
        }
    }

    fn record_hit(&self) {
        counter!(METRIC_CACHE_HIT_TOTAL, "pool" => self.name.clone()).increment(1);
    }

    fn record_miss(&self) {
        counter!(METRIC_CACHE_MISS_TOTAL, "pool" => self.name.clone()).increment(1);
    }
}

impl fmt::Debug for MemoryPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryPool")
            .field("name", &self.name)
            .field("len", &self.len())
            .finish()
    }
}

impl CachePool for MemoryPool {
    fn name(&self) -> &str {
        &self.name
    }

    fn has(&self, key: &str) -> bool {
        self.with_live(key, "has", |_| Ok(())).is_ok()
    }

    fn get(&self, key: &str) -> Result<Value, CacheError> {
        self.with_live(key, "get", |entry| match &entry.record {
            Record::Scalar(value) => Ok(value.clone()),
            Record::Hash(_) => Err(self.wrong_type(key, "scalar")),
        })
    }

    fn put(&self, key: &str, value: Value, ttl: Duration) {
        self.insert(key, Entry::new(Record::Scalar(value), ttl), "put");
    }

    fn get_hash(&self, key: &str) -> Result<Hash, CacheError> {
        self.with_live(key, "get_hash", |entry| match &entry.record {
            Record::Hash(hash) => Ok(hash.clone()),
            Record::Scalar(_) => Err(self.wrong_type(key, "hash")),
        })
    }

    fn put_hash(&self, key: &str, hash: Hash, ttl: Duration) {
        self.insert(key, Entry::new(Record::Hash(hash), ttl), "put_hash");
    }

    fn put_hash_item(&self, key: &str, field: &str, value: Value) -> Result<(), CacheError> {
        self.with_live(key, "put_hash_item", |entry| match &mut entry.record {
            Record::Hash(hash) => {
                hash.insert(field.to_string(), value);
                Ok(())
            }
            Record::Scalar(_) => Err(self.wrong_type(key, "hash")),
        })
    }

    fn touch(&self, key: &str, ttl: Duration) -> bool {
        self.with_live(key, "touch", |entry| {
            entry.expires_at = expiry_after(ttl);
            Ok(())
        })
        .is_ok()
    }

    fn remove(&self, key: &str) -> bool {
        let removed = rw_write(&self.entries, &self.name, "remove").pop(key);
        removed.is_some_and(|entry| !entry.is_expired(OffsetDateTime::now_utc()))
    }

    fn len(&self) -> usize {
        rw_read(&self.entries, &self.name, "len").len()
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{AssertUnwindSafe, catch_unwind};

    use super::*;

    const HOUR: Duration = Duration::from_secs(3600);

    fn pool() -> MemoryPool {
        MemoryPool::new("test.pool", &CacheConfig::default())
    }

    #[test]
    fn scalar_roundtrip() {
        let pool = pool();
        assert!(!pool.has("k"));
        assert!(pool.get("k").expect_err("missing").is_key_not_exist());

        pool.put("k", Value::from("v"), HOUR);
        assert!(pool.has("k"));
        assert_eq!(pool.get("k").expect("cached"), Value::from("v"));

        assert!(pool.remove("k"));
        assert!(!pool.has("k"));
        assert!(!pool.remove("k"));
    }

    #[test]
    fn hash_items_update_existing_records_only() {
        let pool = pool();
        let err = pool
            .put_hash_item("form", "a", Value::from(1))
            .expect_err("no record yet");
        assert!(err.is_key_not_exist());

        pool.put_hash("form", Hash::new(), HOUR);
        pool.put_hash_item("form", "a", Value::from(1))
            .expect("record exists");
        pool.put_hash_item("form", "b", Value::from(true))
            .expect("record exists");

        let hash = pool.get_hash("form").expect("hash");
        assert_eq!(hash.len(), 2);
        assert_eq!(hash["a"], Value::Int(1));
    }

    #[test]
    fn type_mismatch_is_reported() {
        let pool = pool();
        pool.put("scalar", Value::from(1), HOUR);
        assert!(matches!(
            pool.get_hash("scalar"),
            Err(CacheError::WrongType { expected: "hash", .. })
        ));
        pool.put_hash("hash", Hash::new(), HOUR);
        assert!(matches!(
            pool.get("hash"),
            Err(CacheError::WrongType { expected: "scalar", .. })
        ));
    }

    #[test]
    fn expired_records_read_as_missing() {
        let pool = pool();
        pool.put("gone", Value::from("x"), Duration::ZERO);
        assert!(!pool.has("gone"));
        assert!(pool.get("gone").expect_err("expired").is_key_not_exist());
        assert!(pool.is_empty());
    }

    #[test]
    fn touch_restarts_expiry_of_live_records_only() {
        let pool = pool();
        assert!(!pool.touch("absent", HOUR));

        pool.put("k", Value::from(1), HOUR);
        assert!(pool.touch("k", Duration::ZERO));
        assert!(!pool.has("k"));
        assert!(!pool.touch("k", HOUR));
    }

    #[test]
    fn capacity_evicts_least_recently_used() {
        let config = CacheConfig {
            pool_capacity: 2,
            ..Default::default()
        };
        let pool = MemoryPool::new("small", &config);
        pool.put("a", Value::from(1), HOUR);
        pool.put("b", Value::from(2), HOUR);
        assert!(pool.has("a"));
        pool.put("c", Value::from(3), HOUR);

        assert!(pool.has("a"));
        assert!(!pool.has("b"));
        assert!(pool.has("c"));
    }

    #[test]
    fn pool_recovers_from_poisoned_lock() {
        let pool = pool();
        let _ = catch_unwind(AssertUnwindSafe(|| {
            let _guard = pool
                .entries
                .write()
                .expect("entries lock should be acquired");
            panic!("poison entries lock");
        }));

        pool.put("k", Value::from(1), HOUR);
        assert!(pool.has("k"));
    }

    #[test]
    fn driver_creates_independent_pools() {
        let driver = MemoryDriver::new(&CacheConfig::default());
        let first = driver.create_pool("one");
        let second = driver.create_pool("two");
        first.put("k", Value::from(1), HOUR);
        assert!(!second.has("k"));
        assert_eq!(second.name(), "two");
    }
}
