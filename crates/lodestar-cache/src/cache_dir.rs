use crate::error::CacheError;
use std::path::{Path, PathBuf};

/// Selects where the shared cache directory lives.
#[derive(Clone, Debug, Default)]
pub struct CacheConfig {
    /// Base directory holding `index/`.
    pub cache_root_override: Option<PathBuf>,
}

impl CacheConfig {
    pub fn from_env() -> Self {
        Self {
            cache_root_override: std::env::var_os("LODESTAR_CACHE_DIR").map(PathBuf::from),
        }
    }

    /// Prefer an explicitly configured directory, then `LODESTAR_CACHE_DIR`.
    pub fn with_directory(directory: Option<PathBuf>) -> Self {
        match directory {
            Some(dir) => Self {
                cache_root_override: Some(dir),
            },
            None => Self::from_env(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.cache_root_override.is_some()
    }
}

/// On-disk layout of the cache:
///
/// ```text
/// <base>/
///   index/<entry>.idx
///   index/.lock
/// ```
///
/// Entry names hash the absolute source path and its fingerprint, never the
/// project, so a system header parsed with the same flags is shared by every
/// project using the same base.
#[derive(Clone, Debug)]
pub struct CacheDir {
    root: PathBuf,
}

impl CacheDir {
    /// Returns `Ok(None)` when the config does not name a cache location.
    pub fn new(config: CacheConfig) -> Result<Option<Self>, CacheError> {
        let Some(root) = config.cache_root_override else {
            return Ok(None);
        };
        std::fs::create_dir_all(root.join("index"))?;
        Ok(Some(Self { root }))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn index_dir(&self) -> PathBuf {
        self.root.join("index")
    }
}
