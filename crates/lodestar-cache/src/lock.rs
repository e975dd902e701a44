use crate::error::CacheError;
use fs2::FileExt as _;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, OnceLock};

/// Exclusive lock over a cache directory, shared between threads and processes.
///
/// Released on drop.
#[derive(Debug)]
pub struct CacheLock {
    file: File,
    // `fs2` locks are per process on Unix; the guard excludes other threads.
    _guard: MutexGuard<'static, ()>,
}

impl CacheLock {
    /// Block until the lock file at `path` is held exclusively, creating it if needed.
    pub fn lock_exclusive(path: &Path) -> Result<Self, CacheError> {
        let guard = in_process_lock(path)
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(path)?;
        file.lock_exclusive()?;

        Ok(Self {
            file,
            _guard: guard,
        })
    }
}

impl Drop for CacheLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

fn in_process_lock(path: &Path) -> &'static Mutex<()> {
    static LOCKS: OnceLock<Mutex<HashMap<PathBuf, &'static Mutex<()>>>> = OnceLock::new();
    let mut locks = LOCKS
        .get_or_init(Default::default)
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());

    *locks
        .entry(path.to_path_buf())
        .or_insert_with(|| &*Box::leak(Box::new(Mutex::new(()))))
}
