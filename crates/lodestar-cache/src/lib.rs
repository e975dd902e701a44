//! Persistent, content-addressed storage of per-file index results.
//!
//! ## On-disk layout
//!
//! Entries are keyed by (absolute path, fingerprint) only, so every project
//! pointed at the same cache root shares them:
//! - `index/*.idx`: [`IndexCache`] entries persisted via `serde` + `bincode`,
//!   gated by [`INDEX_CACHE_SCHEMA_VERSION`] and the crate version
//! - `index/.lock`: cross-process lock serializing writers and GC

mod cache_dir;
mod error;
mod fingerprint;
mod index_cache;
mod lock;
mod util;

pub use cache_dir::{CacheConfig, CacheDir};
pub use error::{CacheError, Result};
pub use fingerprint::Fingerprint;
pub use index_cache::{
    IndexCache, IndexCacheGcReport, IndexCachePolicy, INDEX_CACHE_SCHEMA_VERSION,
};
pub use lock::CacheLock;
pub use util::{atomic_write, now_millis, PAYLOAD_LIMIT_BYTES};
