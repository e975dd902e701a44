//! The indexing worker pool.
//!
//! Tasks flow through one FIFO shared by every worker. Each task carries a
//! generation from a single counter, so the merge engine can tell a late result
//! from an older edit apart from a fresh one.

use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::Context as _;
use crossbeam_channel as channel;
use lodestar_cache::Fingerprint;
use lodestar_config::ParseFailurePolicy;
use lodestar_core::panic_payload_to_str;
use lodestar_index::{IndexFile, MergeOutcome};
use parking_lot::{Condvar, Mutex};

use crate::context::Context;
use crate::frontend::{ParseRequest, ParsedFile};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TaskKind {
    /// Read, parse (or load from cache) and merge the file.
    Index { args: Vec<String> },
    /// Retract everything the file contributed.
    Remove,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct IndexTask {
    pub(crate) path: String,
    pub(crate) generation: u64,
    pub(crate) kind: TaskKind,
}

/// Counters over the lifetime of a pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Files handed to the front-end successfully.
    pub parsed: u64,
    /// Files served from the on-disk cache.
    pub cache_hits: u64,
    /// Front-end errors and panics.
    pub failures: u64,
    /// Results (including retractions) applied to the store.
    pub merged: u64,
    /// Results dropped because a newer generation was already merged.
    pub superseded: u64,
}

#[derive(Debug, Default)]
struct Counters {
    parsed: AtomicU64,
    cache_hits: AtomicU64,
    failures: AtomicU64,
    merged: AtomicU64,
    superseded: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> PipelineStats {
        PipelineStats {
            parsed: self.parsed.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            merged: self.merged.load(Ordering::Relaxed),
            superseded: self.superseded.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Default)]
struct Shared {
    shutdown: AtomicBool,
    next_generation: AtomicU64,
    pending: Mutex<usize>,
    idle: Condvar,
    counters: Counters,
}

impl Shared {
    fn task_done(&self) {
        let mut pending = self.pending.lock();
        *pending = pending.saturating_sub(1);
        if *pending == 0 {
            self.idle.notify_all();
        }
    }
}

pub struct Pipeline {
    sender: Option<channel::Sender<IndexTask>>,
    workers: Vec<JoinHandle<()>>,
    shared: Arc<Shared>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("workers", &self.workers.len())
            .field("shutdown", &self.shared.shutdown.load(Ordering::Relaxed))
            .finish()
    }
}

impl Pipeline {
    /// Start `ctx.config.index.worker_threads()` workers.
    pub fn new(ctx: Arc<Context>) -> anyhow::Result<Self> {
        let (sender, receiver) = channel::unbounded::<IndexTask>();
        let shared = Arc::new(Shared::default());
        let threads = ctx.config.index.worker_threads();

        let mut pipeline = Self {
            sender: Some(sender),
            workers: Vec::with_capacity(threads),
            shared: Arc::clone(&shared),
        };
        for i in 0..threads {
            let ctx = Arc::clone(&ctx);
            let receiver = receiver.clone();
            let shared = Arc::clone(&shared);
            let handle = thread::Builder::new()
                .name(format!("lodestar-indexer-{i}"))
                .spawn(move || worker_loop(&ctx, &receiver, &shared))
                .context("failed to spawn indexing worker thread")?;
            pipeline.workers.push(handle);
        }

        tracing::info!(
            target: "lodestar.pipeline",
            threads,
            cache = ?ctx.cache.as_ref().map(|cache| cache.root().display().to_string()),
            "indexing pipeline started"
        );
        Ok(pipeline)
    }

    pub(crate) fn enqueue(&self, path: &str, kind: TaskKind) -> anyhow::Result<u64> {
        let Some(sender) = self.sender.as_ref() else {
            anyhow::bail!("indexing pipeline is shut down");
        };
        if self.shared.shutdown.load(Ordering::SeqCst) {
            anyhow::bail!("indexing pipeline is shutting down");
        }
        let generation = self.shared.next_generation.fetch_add(1, Ordering::SeqCst);
        *self.shared.pending.lock() += 1;
        let task = IndexTask {
            path: path.to_string(),
            generation,
            kind,
        };
        if sender.send(task).is_err() {
            self.shared.task_done();
            anyhow::bail!("indexing workers have exited");
        }
        Ok(generation)
    }

    /// Block until every task enqueued so far has completed.
    pub fn wait_idle(&self) {
        let mut pending = self.shared.pending.lock();
        while *pending > 0 {
            self.shared.idle.wait(&mut pending);
        }
    }

    pub fn stats(&self) -> PipelineStats {
        self.shared.counters.snapshot()
    }

    /// Raise the shutdown flag without waiting. Parses already running finish
    /// and are merged; queued tasks are drained unprocessed, and new ones are
    /// refused.
    pub fn request_shutdown(&self) {
        if !self.shared.shutdown.swap(true, Ordering::SeqCst) {
            tracing::info!(target: "lodestar.pipeline", "indexing pipeline shutting down");
        }
    }

    /// [`Pipeline::request_shutdown`], then join the workers.
    pub fn shutdown(&mut self) {
        self.request_shutdown();
        self.sender = None;
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                tracing::error!(target: "lodestar.pipeline", "indexing worker panicked");
            }
        }
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(ctx: &Context, receiver: &channel::Receiver<IndexTask>, shared: &Shared) {
    while let Ok(task) = receiver.recv() {
        if !shared.shutdown.load(Ordering::SeqCst) {
            process(ctx, shared, task);
        }
        shared.task_done();
    }
}

fn process(ctx: &Context, shared: &Shared, task: IndexTask) {
    let IndexTask {
        path,
        generation,
        kind,
    } = task;
    let args = match kind {
        TaskKind::Remove => {
            record(shared, ctx.merge.remove_file(generation, &path));
            return;
        }
        TaskKind::Index { args } => args,
    };

    let contents = match ctx.fs.read_bytes(&path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            tracing::debug!(target: "lodestar.pipeline", path = %path, "file is gone; retracting");
            record(shared, ctx.merge.remove_file(generation, &path));
            return;
        }
        Err(err) => {
            tracing::warn!(
                target: "lodestar.pipeline",
                path = %path,
                error = %err,
                "failed to read file"
            );
            on_failure(ctx, shared, generation, &path);
            return;
        }
    };

    let fingerprint = Fingerprint::for_source(&contents, &args);
    if let Some(index) = cached(ctx, &path, &fingerprint) {
        Counters::bump(&shared.counters.cache_hits);
        record(shared, ctx.merge.merge(generation, index));
        return;
    }

    let request = ParseRequest {
        path: &path,
        contents: &contents,
        args: &args,
    };
    let parsed = panic::catch_unwind(AssertUnwindSafe(|| ctx.frontend.parse(request)));
    let index = match parsed {
        Ok(Ok(parsed)) => {
            Counters::bump(&shared.counters.parsed);
            finish_parse(ctx, &request, parsed)
        }
        Ok(Err(err)) => {
            tracing::warn!(target: "lodestar.pipeline", path = %path, error = %err, "parse failed");
            on_failure(ctx, shared, generation, &path);
            return;
        }
        Err(panic) => {
            tracing::error!(
                target: "lodestar.pipeline",
                path = %path,
                panic = %panic_payload_to_str(panic.as_ref()),
                "front-end panicked"
            );
            on_failure(ctx, shared, generation, &path);
            return;
        }
    };

    if let Some(cache) = ctx.cache.as_ref() {
        if let Err(err) = cache.store(&path, &fingerprint, &index) {
            tracing::debug!(
                target: "lodestar.pipeline",
                path = %path,
                error = %err,
                "cache store failed"
            );
        }
    }
    record(shared, ctx.merge.merge(generation, index));
}

/// Normalize a front-end result: the file's identity and size come from the
/// request, and the fingerprints of its includes are recorded.
fn finish_parse(ctx: &Context, request: &ParseRequest<'_>, parsed: ParsedFile) -> IndexFile {
    let ParsedFile {
        mut index,
        includes,
    } = parsed;
    let path = request.path;
    index.path = path.to_string();
    index.args = request.args.to_vec();
    index.line_count = line_count(request.contents);
    for include in includes {
        match ctx.fs.read_bytes(&include) {
            Ok(bytes) => {
                index
                    .dependencies
                    .insert(include, Fingerprint::for_source(&bytes, &[]));
            }
            Err(err) => {
                tracing::debug!(
                    target: "lodestar.pipeline",
                    path,
                    include = %include,
                    error = %err,
                    "include not readable; not tracked"
                );
            }
        }
    }
    index
}

/// Lines in `contents` as an editor counts them: a trailing newline opens an
/// empty last line.
fn line_count(contents: &[u8]) -> u32 {
    let newlines = contents.iter().filter(|&&byte| byte == b'\n').count();
    u32::try_from(newlines).map_or(u32::MAX, |n| n.saturating_add(1))
}

/// A cached result for `path`, provided every include it was parsed against is
/// unchanged.
fn cached(ctx: &Context, path: &str, fingerprint: &Fingerprint) -> Option<IndexFile> {
    let cache = ctx.cache.as_ref()?;
    let index: IndexFile = match cache.lookup(path, fingerprint) {
        Ok(Some(index)) => index,
        Ok(None) => return None,
        Err(err) => {
            tracing::debug!(target: "lodestar.pipeline", path, error = %err, "cache lookup failed");
            return None;
        }
    };

    let stale = index.dependencies.iter().find(|(dep, expected)| {
        ctx.fs
            .read_bytes(dep)
            .map_or(true, |bytes| Fingerprint::for_source(&bytes, &[]) != **expected)
    });
    if let Some((dep, _)) = stale {
        tracing::debug!(
            target: "lodestar.pipeline",
            path,
            dep = %dep,
            "cached result has a stale include"
        );
        return None;
    }
    Some(index)
}

fn on_failure(ctx: &Context, shared: &Shared, generation: u64, path: &str) {
    Counters::bump(&shared.counters.failures);
    match ctx.config.index.on_parse_failure {
        ParseFailurePolicy::Retain => {}
        ParseFailurePolicy::Retract => record(shared, ctx.merge.remove_file(generation, path)),
    }
}

fn record(shared: &Shared, outcome: MergeOutcome) {
    match outcome {
        MergeOutcome::Applied { .. } => Counters::bump(&shared.counters.merged),
        MergeOutcome::Superseded { .. } => Counters::bump(&shared.counters.superseded),
    }
}
