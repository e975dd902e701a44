use crate::error::CacheError;
use bincode::Options;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

/// Upper bound for any persisted index payload we will attempt to decode.
///
/// A corrupted length prefix must turn into a cache miss, not a huge allocation.
pub const PAYLOAD_LIMIT_BYTES: usize = 64 * 1024 * 1024;

pub fn now_millis() -> u64 {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(elapsed) => elapsed.as_millis() as u64,
        Err(err) => {
            static REPORTED: OnceLock<()> = OnceLock::new();
            if REPORTED.set(()).is_ok() {
                tracing::debug!(
                    target: "lodestar.cache",
                    error = %err,
                    "system clock is before the unix epoch; timestamps fall back to 0"
                );
            }
            0
        }
    }
}

pub(crate) fn bincode_options() -> impl bincode::Options + Copy {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_little_endian()
}

pub(crate) fn bincode_options_limited() -> impl bincode::Options + Copy {
    bincode_options().with_limit(PAYLOAD_LIMIT_BYTES as u64)
}

pub(crate) fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, CacheError> {
    Ok(bincode_options().serialize(value)?)
}

pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CacheError> {
    Ok(bincode_options_limited().deserialize(bytes)?)
}

/// Read a cache entry, refusing symlinks, directories and oversized files.
///
/// Returns `None` on any failure; unexpected errors are logged at `debug`.
pub(crate) fn read_entry(path: &Path) -> Option<Vec<u8>> {
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(err) => {
            if err.kind() != io::ErrorKind::NotFound {
                tracing::debug!(
                    target: "lodestar.cache",
                    path = %path.display(),
                    error = %err,
                    "failed to stat cache entry"
                );
            }
            return None;
        }
    };
    if !meta.is_file() || meta.len() > PAYLOAD_LIMIT_BYTES as u64 {
        remove_best_effort(path, "read_entry.invalid");
        return None;
    }

    match fs::read(path) {
        Ok(bytes) if bytes.len() <= PAYLOAD_LIMIT_BYTES => Some(bytes),
        Ok(_) => {
            remove_best_effort(path, "read_entry.oversize");
            None
        }
        Err(err) => {
            if err.kind() != io::ErrorKind::NotFound {
                tracing::debug!(
                    target: "lodestar.cache",
                    path = %path.display(),
                    error = %err,
                    "failed to read cache entry"
                );
            }
            None
        }
    }
}

pub(crate) fn remove_best_effort(path: &Path, reason: &'static str) -> bool {
    match fs::remove_file(path) {
        Ok(()) => true,
        Err(err) if err.kind() == io::ErrorKind::NotFound => true,
        Err(err) => {
            tracing::debug!(
                target: "lodestar.cache",
                path = %path.display(),
                reason,
                error = %err,
                "failed to remove cache file"
            );
            false
        }
    }
}

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Write `bytes` to `path` so readers observe either the old or the new file.
///
/// The payload goes to a uniquely named sibling first, is synced, then renamed
/// over the destination.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> Result<(), CacheError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        Some(_) => Path::new("."),
        None => return Err(io::Error::other("path has no parent").into()),
    };
    fs::create_dir_all(parent)?;

    let (tmp_path, mut file) = create_tmp_sibling(path, parent)?;
    let written = file.write_all(bytes).and_then(|()| file.sync_all());
    drop(file);
    if let Err(err) = written {
        remove_best_effort(&tmp_path, "atomic_write.write_failed");
        return Err(err.into());
    }

    if cfg!(windows) && path.exists() {
        // `rename` does not replace an existing file there.
        remove_best_effort(path, "atomic_write.replace");
    }
    if let Err(err) = fs::rename(&tmp_path, path) {
        remove_best_effort(&tmp_path, "atomic_write.rename_failed");
        return Err(err.into());
    }

    sync_dir_best_effort(parent);
    Ok(())
}

fn sync_dir_best_effort(dir: &Path) {
    #[cfg(unix)]
    if let Err(err) = fs::File::open(dir).and_then(|dir| dir.sync_all()) {
        static REPORTED: OnceLock<()> = OnceLock::new();
        if err.kind() != io::ErrorKind::NotFound && REPORTED.set(()).is_ok() {
            tracing::debug!(
                target: "lodestar.cache",
                dir = %dir.display(),
                error = %err,
                "failed to sync cache directory"
            );
        }
    }

    #[cfg(not(unix))]
    let _ = dir;
}

fn create_tmp_sibling(dest: &Path, parent: &Path) -> io::Result<(PathBuf, fs::File)> {
    let file_name = dest
        .file_name()
        .ok_or_else(|| io::Error::other("destination path has no file name"))?;
    let pid = std::process::id();

    loop {
        let counter = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        let mut tmp_name = file_name.to_os_string();
        tmp_name.push(format!(".tmp.{pid}.{counter}"));
        let tmp_path = parent.join(tmp_name);

        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&tmp_path)
        {
            Ok(file) => return Ok((tmp_path, file)),
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(err) => return Err(err),
        }
    }
}
