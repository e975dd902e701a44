//! Read-only navigation queries over the shared index.
//!
//! Every query takes the store's read lock once and answers from the state left
//! by the last completed merge. Files that are not (yet) indexed and symbols the
//! store does not know produce empty results rather than errors.

mod code_lens;
mod error;
mod goto;
mod navigate;
mod source_header;
mod symbols;

use std::collections::HashSet;

use lodestar_config::CodeLensConfig;
use lodestar_core::{Kind, Position, Range, Usr};
use lodestar_index::{Db, ExtentRef, FileId, QueryFile, SharedIndex};
use serde::{Deserialize, Serialize};

pub use code_lens::{CodeLens, Xref};
pub use error::QueryError;
pub use navigate::Direction;
pub use source_header::compute_guess_score;

/// A range in a named file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Location {
    pub path: String,
    pub range: Range,
}

impl Location {
    pub fn new(path: impl Into<String>, range: Range) -> Self {
        Self {
            path: path.into(),
            range,
        }
    }
}

/// Answers navigation requests against a [`SharedIndex`].
#[derive(Debug, Clone)]
pub struct QueryEngine {
    index: SharedIndex,
    code_lens: CodeLensConfig,
}

impl QueryEngine {
    pub fn new(index: SharedIndex, code_lens: CodeLensConfig) -> Self {
        Self { index, code_lens }
    }

    /// Live symbols whose range contains `pos`, tightest first.
    pub fn symbols_at(&self, path: &str, pos: Position) -> Vec<ExtentRef> {
        let db = self.index.read();
        match indexed_file(&db, path) {
            Some(file) => symbols::symbols_at(file, pos),
            None => Vec::new(),
        }
    }

    pub fn goto_definition(&self, path: &str, pos: Position) -> Vec<Location> {
        let db = self.index.read();
        match indexed_file(&db, path) {
            Some(file) => goto::definition(&db, file, pos),
            None => Vec::new(),
        }
    }

    pub fn goto_declaration(&self, path: &str, pos: Position) -> Vec<Location> {
        let db = self.index.read();
        match indexed_file(&db, path) {
            Some(file) => goto::declaration(&db, file, pos),
            None => Vec::new(),
        }
    }

    pub fn goto_type_definition(&self, path: &str, pos: Position) -> Vec<Location> {
        let db = self.index.read();
        match indexed_file(&db, path) {
            Some(file) => goto::type_definition(&db, file, pos),
            None => Vec::new(),
        }
    }

    pub fn find_references(
        &self,
        path: &str,
        pos: Position,
        include_declaration: bool,
    ) -> Vec<Location> {
        let db = self.index.read();
        match indexed_file(&db, path) {
            Some(file) => goto::references(&db, file, pos, include_declaration),
            None => Vec::new(),
        }
    }

    /// Structural navigation from `pos`. `direction` is one of `U`, `D`, `L`,
    /// `R` and defaults to `U`.
    pub fn navigate(
        &self,
        path: &str,
        pos: Position,
        direction: Option<&str>,
    ) -> Result<Vec<Location>, QueryError> {
        let direction = Direction::parse(direction)?;
        let db = self.index.read();
        let Some(file) = indexed_file(&db, path) else {
            return Ok(Vec::new());
        };
        let mut out = Locations::new(&db);
        if let Some(target) = navigate::navigate(file, pos, direction) {
            out.push(file.id, target);
        }
        Ok(out.finish())
    }

    /// The best counterpart of `path` (header for an implementation file and
    /// vice versa), if any candidate scored.
    pub fn toggle_source_header(&self, path: &str) -> Option<Location> {
        self.rank_source_header(path)
            .into_iter()
            .next()
            .map(|(path, _)| Location::new(path, Range::default()))
    }

    /// Every counterpart candidate with its score, best first.
    pub fn rank_source_header(&self, path: &str) -> Vec<(String, i64)> {
        let db = self.index.read();
        match indexed_file(&db, path) {
            Some(file) => source_header::rank(&db, file),
            None => Vec::new(),
        }
    }

    pub fn code_lens(&self, path: &str) -> Vec<CodeLens> {
        let db = self.index.read();
        match indexed_file(&db, path) {
            Some(file) => code_lens::code_lens(&db, file, &self.code_lens),
            None => Vec::new(),
        }
    }

    /// Expand a code-lens command into the locations it stands for.
    pub fn xref(&self, usr: Usr, kind: Kind, field: &str) -> Result<Vec<Location>, QueryError> {
        let db = self.index.read();
        code_lens::xref(&db, usr, kind, field)
    }
}

/// The file at `path`, provided it is currently indexed.
fn indexed_file<'db>(db: &'db Db, path: &str) -> Option<&'db QueryFile> {
    match db.file_by_path(path) {
        Ok(file) if file.def.is_some() => Some(file),
        Ok(_) => None,
        Err(err) => {
            tracing::trace!(target: "lodestar.ide", error = %err, "query on unindexed file");
            None
        }
    }
}

/// Result collector: drops duplicates and ranges past the end of their file as
/// last indexed.
pub(crate) struct Locations<'db> {
    db: &'db Db,
    seen: HashSet<(FileId, Range)>,
    out: Vec<Location>,
}

impl<'db> Locations<'db> {
    pub(crate) fn new(db: &'db Db) -> Self {
        Self {
            db,
            seen: HashSet::new(),
            out: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, file_id: FileId, range: Range) {
        let file = self.db.file(file_id);
        let Some(line_count) = file.line_count() else {
            return;
        };
        if range.start.line >= line_count {
            return;
        }
        if self.seen.insert((file_id, range)) {
            self.out.push(Location::new(file.path.clone(), range));
        }
    }

    pub(crate) fn extend(&mut self, refs: impl IntoIterator<Item = (FileId, Range)>) {
        for (file_id, range) in refs {
            self.push(file_id, range);
        }
    }

    pub(crate) fn finish(self) -> Vec<Location> {
        self.out
    }
}
