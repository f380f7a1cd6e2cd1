//! Form state cache.
//!
//! Stateful forms survive across requests through three independent pools
//! keyed by form id:
//!
//! - **`form.form_cid`**: form id → class identifier
//! - **`form.form_attrs`**: form id → attribute hash
//! - **`form.form_values`**: form id → widget uid → value hash
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! ttl_seconds = 604800
//! pool_capacity = 10000
//! ```

mod config;
mod forms;
mod keys;
mod lock;
mod store;

pub use config::{CacheConfig, DEFAULT_TTL_SECONDS};
pub use forms::FormCache;
pub use keys::PoolName;
pub use store::{CacheDriver, CacheError, CachePool, Hash, MemoryDriver, MemoryPool};

pub(crate) use lock::{rw_read, rw_write};
