use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use lodestar_cache::{CacheConfig, CacheDir, IndexCache, IndexCachePolicy};
use lodestar_config::{IndexCacheConfig, LodestarConfig};
use lodestar_ide::QueryEngine;
use lodestar_index::MergeEngine;

use crate::frontend::Frontend;
use crate::fs::FileSystem;

/// Everything the pipeline, merge engine and query engine share, passed
/// explicitly instead of living in process globals.
pub struct Context {
    pub config: LodestarConfig,
    pub project_root: PathBuf,
    pub fs: Arc<dyn FileSystem>,
    pub frontend: Arc<dyn Frontend>,
    /// `None` when no cache directory is configured.
    pub cache: Option<IndexCache>,
    pub merge: Arc<MergeEngine>,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("config", &self.config)
            .field("project_root", &self.project_root)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

fn cache_policy(config: &IndexCacheConfig) -> IndexCachePolicy {
    let millis =
        |duration: std::time::Duration| u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
    IndexCachePolicy {
        ttl_millis: millis(config.ttl()),
        max_bytes: config.max_bytes,
        gc_interval_millis: millis(config.gc_interval()),
    }
}

impl Context {
    pub fn new(
        config: LodestarConfig,
        project_root: impl AsRef<Path>,
        fs: Arc<dyn FileSystem>,
        frontend: Arc<dyn Frontend>,
    ) -> anyhow::Result<Self> {
        let project_root = project_root.as_ref().to_path_buf();
        let cache_config = CacheConfig::with_directory(config.cache.directory.clone());
        let cache = match CacheDir::new(cache_config)
            .context("failed to prepare the index cache directory")?
        {
            Some(dir) => Some(
                IndexCache::new_with_policy(dir.index_dir(), cache_policy(&config.cache))
                    .context("failed to open the index cache")?,
            ),
            None => None,
        };

        let merge = Arc::new(MergeEngine::new(config.index.reject_stale_merges));
        Ok(Self {
            config,
            project_root,
            fs,
            frontend,
            cache,
            merge,
        })
    }

    pub fn query_engine(&self) -> QueryEngine {
        QueryEngine::new(self.merge.shared(), self.config.code_lens.clone())
    }
}
