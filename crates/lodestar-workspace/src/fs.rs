use std::collections::HashMap;
use std::fs;
use std::io;

use parking_lot::RwLock;

/// Source access for the indexing workers.
///
/// A read failing with `ErrorKind::NotFound` means the file was deleted.
pub trait FileSystem: Send + Sync {
    fn read_bytes(&self, path: &str) -> io::Result<Vec<u8>>;

    fn exists(&self, path: &str) -> bool;
}

/// The local OS file system.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFs;

impl LocalFs {
    pub fn new() -> Self {
        Self
    }
}

impl FileSystem for LocalFs {
    fn read_bytes(&self, path: &str) -> io::Result<Vec<u8>> {
        fs::read(path)
    }

    fn exists(&self, path: &str) -> bool {
        fs::metadata(path).is_ok_and(|meta| meta.is_file())
    }
}

/// In-memory file contents keyed by path, for unsaved buffers and tests.
#[derive(Debug, Default)]
pub struct MemoryFs {
    files: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, path: impl Into<String>, contents: impl Into<Vec<u8>>) {
        self.files.write().insert(path.into(), contents.into());
    }

    /// Returns `true` if the file existed.
    pub fn remove(&self, path: &str) -> bool {
        self.files.write().remove(path).is_some()
    }
}

impl FileSystem for MemoryFs {
    fn read_bytes(&self, path: &str) -> io::Result<Vec<u8>> {
        self.files.read().get(path).cloned().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("no such file: {path}"))
        })
    }

    fn exists(&self, path: &str) -> bool {
        self.files.read().contains_key(path)
    }
}
