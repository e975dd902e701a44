use crate::error::CacheError;
use crate::fingerprint::Fingerprint;
use crate::lock::CacheLock;
use crate::util::{
    atomic_write, bincode_options_limited, decode, encode, now_millis, read_entry,
    remove_best_effort,
};
use bincode::Options;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub const INDEX_CACHE_SCHEMA_VERSION: u32 = 1;

const ENTRY_EXTENSION: &str = "idx";
const LOCK_FILE_NAME: &str = ".lock";

/// Persistent store of per-file parse results.
///
/// Each entry is addressed by the source path together with the fingerprint of
/// its contents and compile arguments, so a lookup with a different fingerprint
/// never observes an older result. Entries are versioned (schema + crate
/// version), written atomically under a cross-process lock, and garbage
/// collected by age and total size.
#[derive(Clone, Debug)]
pub struct IndexCache {
    root: PathBuf,
    policy: IndexCachePolicy,
    last_gc_millis: Arc<AtomicU64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IndexCachePolicy {
    /// Entries older than this (by `saved_at_millis`) are removed by GC.
    pub ttl_millis: u64,
    /// Upper bound for the summed size of all entries.
    pub max_bytes: u64,
    /// Minimum time between opportunistic GC passes triggered by `store`.
    pub gc_interval_millis: u64,
}

impl Default for IndexCachePolicy {
    fn default() -> Self {
        Self {
            ttl_millis: 30 * 24 * 60 * 60 * 1000,
            max_bytes: 1024 * 1024 * 1024,
            gc_interval_millis: 10 * 60 * 1000,
        }
    }
}

/// Summary of one [`IndexCache::gc`] pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IndexCacheGcReport {
    pub kept: usize,
    pub removed: usize,
    pub kept_bytes: u64,
}

impl IndexCache {
    pub fn new(root: impl AsRef<Path>) -> Result<Self, CacheError> {
        Self::new_with_policy(root, IndexCachePolicy::default())
    }

    pub fn new_with_policy(
        root: impl AsRef<Path>,
        policy: IndexCachePolicy,
    ) -> Result<Self, CacheError> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            policy,
            last_gc_millis: Arc::new(AtomicU64::new(0)),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn policy(&self) -> IndexCachePolicy {
        self.policy
    }

    /// Returns the cached result for `file_path` parsed with inputs `fingerprint`.
    ///
    /// Corrupt, truncated or version-mismatched entries are deleted and reported
    /// as a miss.
    pub fn lookup<T: DeserializeOwned>(
        &self,
        file_path: &str,
        fingerprint: &Fingerprint,
    ) -> Result<Option<T>, CacheError> {
        let key = entry_key(file_path, fingerprint);
        let path = self.entry_path(&key);
        let Some(bytes) = read_entry(&path) else {
            tracing::trace!(target: "lodestar.cache", file = file_path, "index cache miss");
            return Ok(None);
        };

        let entry: PersistedEntryOwned<T> = match decode(&bytes) {
            Ok(entry) => entry,
            Err(err) => {
                tracing::debug!(
                    target: "lodestar.cache",
                    file = file_path,
                    error = %err,
                    "discarding undecodable index cache entry"
                );
                remove_best_effort(&path, "lookup.corrupt");
                return Ok(None);
            }
        };

        if entry.schema_version != INDEX_CACHE_SCHEMA_VERSION
            || entry.version != lodestar_core::LODESTAR_VERSION
        {
            remove_best_effort(&path, "lookup.version_mismatch");
            return Ok(None);
        }

        if entry.entry_key != key {
            // Contents do not match the file name.
            remove_best_effort(&path, "lookup.key_mismatch");
            return Ok(None);
        }

        if entry.file_path != file_path || &entry.fingerprint != fingerprint {
            // A digest collision must not erase the other entry.
            return Ok(None);
        }

        tracing::trace!(target: "lodestar.cache", file = file_path, "index cache hit");
        Ok(Some(entry.payload))
    }

    /// Persist `payload` as the result for `file_path` under `fingerprint`.
    pub fn store<T: Serialize>(
        &self,
        file_path: &str,
        fingerprint: &Fingerprint,
        payload: &T,
    ) -> Result<(), CacheError> {
        let key = entry_key(file_path, fingerprint);
        let path = self.entry_path(&key);
        let entry = PersistedEntry {
            schema_version: INDEX_CACHE_SCHEMA_VERSION,
            version: lodestar_core::LODESTAR_VERSION,
            saved_at_millis: now_millis(),
            entry_key: &key,
            file_path,
            fingerprint,
            payload,
        };
        let bytes = encode(&entry)?;

        {
            let _lock = CacheLock::lock_exclusive(&self.lock_path())?;
            atomic_write(&path, &bytes)?;
        }
        tracing::trace!(
            target: "lodestar.cache",
            file = file_path,
            bytes = bytes.len(),
            "stored index cache entry"
        );

        self.maybe_gc();
        Ok(())
    }

    fn entry_path(&self, key: &Fingerprint) -> PathBuf {
        self.root.join(format!("{}.{ENTRY_EXTENSION}", key.as_str()))
    }

    fn lock_path(&self) -> PathBuf {
        self.root.join(LOCK_FILE_NAME)
    }

    fn maybe_gc(&self) {
        let now = now_millis();
        let last = self.last_gc_millis.load(Ordering::Relaxed);
        if now.saturating_sub(last) < self.policy.gc_interval_millis {
            return;
        }
        if self
            .last_gc_millis
            .compare_exchange(last, now, Ordering::Relaxed, Ordering::Relaxed)
            .is_err()
        {
            return;
        }
        if let Err(err) = self.gc() {
            tracing::debug!(target: "lodestar.cache", error = %err, "index cache gc failed");
        }
    }

    /// Delete expired, foreign and version-mismatched entries, then evict the
    /// oldest entries until the cache fits in `max_bytes`.
    pub fn gc(&self) -> Result<IndexCacheGcReport, CacheError> {
        let _lock = CacheLock::lock_exclusive(&self.lock_path())?;
        let now = now_millis();
        let mut report = IndexCacheGcReport::default();
        let mut candidates = Vec::new();
        let mut total_bytes: u64 = 0;

        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(report),
            Err(err) => return Err(err.into()),
        };

        for entry in entries.flatten() {
            let path = entry.path();
            let Ok(meta) = std::fs::symlink_metadata(&path) else {
                continue;
            };
            let file_type = meta.file_type();
            if !file_type.is_file() && !file_type.is_symlink() {
                continue;
            }
            if path.file_name().and_then(|name| name.to_str()) == Some(LOCK_FILE_NAME) {
                continue;
            }

            // Leftover temp files and anything else that is not an entry.
            if path.extension().and_then(|ext| ext.to_str()) != Some(ENTRY_EXTENSION) {
                if remove_best_effort(&path, "gc.foreign") {
                    report.removed += 1;
                }
                continue;
            }

            let header = read_header(&path).filter(|header| {
                header.schema_version == INDEX_CACHE_SCHEMA_VERSION
                    && header.version == lodestar_core::LODESTAR_VERSION
                    && path.file_stem().and_then(|stem| stem.to_str())
                        == Some(header.entry_key.as_str())
                    && now.saturating_sub(header.saved_at_millis) <= self.policy.ttl_millis
            });
            let Some(header) = header else {
                if remove_best_effort(&path, "gc.stale") {
                    report.removed += 1;
                }
                continue;
            };

            let len = meta.len();
            total_bytes = total_bytes.saturating_add(len);
            candidates.push(GcCandidate {
                saved_at_millis: header.saved_at_millis,
                len,
                path,
            });
        }

        if total_bytes > self.policy.max_bytes {
            candidates.sort_by(|a, b| {
                a.saved_at_millis
                    .cmp(&b.saved_at_millis)
                    .then_with(|| a.path.cmp(&b.path))
            });
            let mut evict = 0;
            for candidate in &candidates {
                if total_bytes <= self.policy.max_bytes {
                    break;
                }
                if remove_best_effort(&candidate.path, "gc.evict") {
                    total_bytes = total_bytes.saturating_sub(candidate.len);
                    report.removed += 1;
                }
                evict += 1;
            }
            candidates.drain(..evict);
        }

        report.kept = candidates.len();
        report.kept_bytes = total_bytes;
        tracing::debug!(
            target: "lodestar.cache",
            kept = report.kept,
            removed = report.removed,
            kept_bytes = report.kept_bytes,
            "index cache gc finished"
        );
        Ok(report)
    }
}

fn entry_key(file_path: &str, fingerprint: &Fingerprint) -> Fingerprint {
    let mut bytes = Vec::with_capacity(file_path.len() + 1 + fingerprint.as_str().len());
    bytes.extend_from_slice(file_path.as_bytes());
    bytes.push(0);
    bytes.extend_from_slice(fingerprint.as_str().as_bytes());
    Fingerprint::from_bytes(bytes)
}

#[derive(Debug)]
struct GcCandidate {
    saved_at_millis: u64,
    len: u64,
    path: PathBuf,
}

// Field order matters: the header type decodes only the leading fields.
#[derive(Serialize)]
struct PersistedEntry<'a, T> {
    schema_version: u32,
    version: &'a str,
    saved_at_millis: u64,
    entry_key: &'a Fingerprint,
    file_path: &'a str,
    fingerprint: &'a Fingerprint,
    payload: &'a T,
}

#[derive(Deserialize)]
struct PersistedEntryOwned<T> {
    schema_version: u32,
    version: String,
    #[allow(dead_code)]
    saved_at_millis: u64,
    entry_key: Fingerprint,
    file_path: String,
    fingerprint: Fingerprint,
    payload: T,
}

#[derive(Deserialize)]
struct PersistedEntryHeader {
    schema_version: u32,
    version: String,
    saved_at_millis: u64,
    entry_key: Fingerprint,
}

fn read_header(path: &Path) -> Option<PersistedEntryHeader> {
    let bytes = read_entry(path)?;
    let mut cursor = Cursor::new(bytes);
    bincode_options_limited().deserialize_from(&mut cursor).ok()
}
