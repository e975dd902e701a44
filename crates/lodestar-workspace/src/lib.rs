//! A project being indexed: configuration, the worker pipeline feeding the
//! shared index, and the query engine reading it.

mod context;
mod frontend;
mod fs;
mod pipeline;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context as _;
use lodestar_config::LodestarConfig;
use lodestar_ide::QueryEngine;
use parking_lot::Mutex;

pub use context::Context;
pub use frontend::{Frontend, ParseError, ParseRequest, ParsedFile};
pub use fs::{FileSystem, LocalFs, MemoryFs};
pub use pipeline::{Pipeline, PipelineStats};

use pipeline::TaskKind;

/// A source file of the project and the arguments it is compiled with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectEntry {
    pub path: String,
    pub args: Vec<String>,
}

impl ProjectEntry {
    pub fn new(path: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            path: path.into(),
            args,
        }
    }
}

#[derive(Debug)]
pub struct Workspace {
    context: Arc<Context>,
    pipeline: Pipeline,
    queries: QueryEngine,
    /// Compile arguments by path, as last given to [`Workspace::index_project`].
    args: Mutex<HashMap<String, Vec<String>>>,
}

impl Workspace {
    /// Open the workspace at `root`, loading its configuration file if one is
    /// present.
    pub fn open(
        root: impl AsRef<Path>,
        fs: Arc<dyn FileSystem>,
        frontend: Arc<dyn Frontend>,
    ) -> anyhow::Result<Self> {
        let root = root.as_ref();
        let (config, _) = lodestar_config::load_for_workspace(root)
            .with_context(|| format!("failed to load configuration for {}", root.display()))?;
        Self::with_config(root, config, fs, frontend)
    }

    pub fn with_config(
        root: impl AsRef<Path>,
        config: LodestarConfig,
        fs: Arc<dyn FileSystem>,
        frontend: Arc<dyn Frontend>,
    ) -> anyhow::Result<Self> {
        let context = Arc::new(Context::new(config, root, fs, frontend)?);
        let pipeline = Pipeline::new(Arc::clone(&context))?;
        let queries = context.query_engine();
        Ok(Self {
            context,
            pipeline,
            queries,
            args: Mutex::new(HashMap::new()),
        })
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn queries(&self) -> &QueryEngine {
        &self.queries
    }

    /// Queue every entry for indexing and remember its compile arguments.
    pub fn index_project(
        &self,
        entries: impl IntoIterator<Item = ProjectEntry>,
    ) -> anyhow::Result<usize> {
        let mut queued = 0;
        for entry in entries {
            self.args
                .lock()
                .insert(entry.path.clone(), entry.args.clone());
            self.pipeline
                .enqueue(&entry.path, TaskKind::Index { args: entry.args })?;
            queued += 1;
        }
        tracing::info!(
            target: "lodestar.workspace",
            files = queued,
            "queued project for indexing"
        );
        Ok(queued)
    }

    /// Re-index `path` after an edit. Returns the generation of the queued task.
    pub fn file_changed(&self, path: &str) -> anyhow::Result<u64> {
        let args = self.args.lock().get(path).cloned().unwrap_or_default();
        self.pipeline.enqueue(path, TaskKind::Index { args })
    }

    /// Retract everything `path` contributed.
    pub fn file_removed(&self, path: &str) -> anyhow::Result<u64> {
        self.args.lock().remove(path);
        self.pipeline.enqueue(path, TaskKind::Remove)
    }

    /// Block until every queued task has been processed.
    pub fn wait_idle(&self) {
        self.pipeline.wait_idle();
    }

    pub fn stats(&self) -> PipelineStats {
        self.pipeline.stats()
    }

    /// Stop taking work without blocking; see [`Pipeline::request_shutdown`].
    pub fn request_shutdown(&self) {
        self.pipeline.request_shutdown();
    }

    pub fn shutdown(mut self) {
        self.pipeline.shutdown();
    }
}
