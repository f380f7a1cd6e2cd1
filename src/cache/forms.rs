//! Form-state records spread over the three form pools.
//!
//! A stateful form owns one record in each pool, all keyed by its form id and
//! all written with the same TTL so none outlives the others.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::domain::Value;

use super::config::CacheConfig;
use super::keys::PoolName;
use super::store::{CacheDriver, CacheError, CachePool, Hash};

pub struct FormCache {
    cids: Arc<dyn CachePool>,
    attrs: Arc<dyn CachePool>,
    values: Arc<dyn CachePool>,
    ttl: Duration,
}

impl FormCache {
    pub fn new(driver: &dyn CacheDriver, config: &CacheConfig) -> Self {
        Self {
            cids: driver.create_pool(PoolName::FormCid.as_str()),
            attrs: driver.create_pool(PoolName::FormAttrs.as_str()),
            values: driver.create_pool(PoolName::FormValues.as_str()),
            ttl: config.ttl(),
        }
    }

    pub fn pool(&self, name: PoolName) -> &Arc<dyn CachePool> {
        match name {
            PoolName::FormCid => &self.cids,
            PoolName::FormAttrs => &self.attrs,
            PoolName::FormValues => &self.values,
        }
    }

    /// Whether a form id is currently taken.
    pub fn contains(&self, form_id: &str) -> bool {
        self.cids.has(form_id)
    }

    /// Write the class-id and attribute records of a stateful form. Stored
    /// values are kept when present, otherwise an empty record is created.
    pub fn register(&self, form_id: &str, class_id: &str, attrs: Hash) {
        self.cids.put(form_id, Value::from(class_id), self.ttl);
        self.attrs.put_hash(form_id, attrs, self.ttl);
        if !self.values.touch(form_id, self.ttl) {
            self.values.put_hash(form_id, Hash::new(), self.ttl);
        }
        debug!(form_id, class_id, "Registered stateful form");
    }

    pub fn class_of(&self, form_id: &str) -> Result<String, CacheError> {
        match self.cids.get(form_id)? {
            Value::Str(class_id) => Ok(class_id),
            _ => Err(CacheError::WrongType {
                pool: self.cids.name().to_string(),
                key: form_id.to_string(),
                expected: "string",
            }),
        }
    }

    pub fn attrs(&self, form_id: &str) -> Result<Hash, CacheError> {
        self.attrs.get_hash(form_id)
    }

    pub fn put_attr(&self, form_id: &str, key: &str, value: Value) -> Result<(), CacheError> {
        self.attrs.put_hash_item(form_id, key, value)
    }

    /// Make sure a value record exists, creating an empty one on first use.
    pub fn ensure_values(&self, form_id: &str) -> Result<(), CacheError> {
        match self.values.get_hash(form_id) {
            Ok(_) => Ok(()),
            Err(err) if err.is_key_not_exist() => {
                self.recreate_values(form_id, Hash::new());
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    pub fn put_value(&self, form_id: &str, uid: &str, value: Value) -> Result<(), CacheError> {
        match self.values.put_hash_item(form_id, uid, value.clone()) {
            Err(err) if err.is_key_not_exist() => {
                let mut hash = Hash::new();
                hash.insert(uid.to_string(), value);
                self.recreate_values(form_id, hash);
                Ok(())
            }
            other => other,
        }
    }

    /// Replace a lost value record. The sibling records get their expiry
    /// restarted too, so the form's three records still expire together.
    fn recreate_values(&self, form_id: &str, hash: Hash) {
        self.values.put_hash(form_id, hash, self.ttl);
        let cid = self.cids.touch(form_id, self.ttl);
        let attrs = self.attrs.touch(form_id, self.ttl);
        debug!(form_id, cid, attrs, "Recreated value record");
    }

    /// Stored widget values; a missing record reads as empty.
    pub fn values(&self, form_id: &str) -> Result<Hash, CacheError> {
        match self.values.get_hash(form_id) {
            Err(err) if err.is_key_not_exist() => Ok(Hash::new()),
            other => other,
        }
    }

    /// Drop all three records of a form.
    pub fn purge(&self, form_id: &str) {
        let attrs = self.attrs.remove(form_id);
        let cid = self.cids.remove(form_id);
        let values = self.values.remove(form_id);
        debug!(form_id, attrs, cid, values, "Purged form records");
    }
}
