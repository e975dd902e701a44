use lodestar_index::IndexFile;
use thiserror::Error;

/// One translation unit to parse.
#[derive(Debug, Clone, Copy)]
pub struct ParseRequest<'a> {
    pub path: &'a str,
    pub contents: &'a [u8],
    /// Compile arguments for the translation unit.
    pub args: &'a [String],
}

/// What a front-end produced for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFile {
    /// Occurrences in the parsed file. The pipeline overwrites its `path`,
    /// `args` and `line_count` from the request and fills in `dependencies`
    /// from [`ParsedFile::includes`].
    pub index: IndexFile,
    /// Paths of every file included while parsing.
    pub includes: Vec<String>,
}

impl ParsedFile {
    pub fn new(index: IndexFile) -> Self {
        Self {
            index,
            includes: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to parse {path}: {message}")]
pub struct ParseError {
    pub path: String,
    pub message: String,
}

impl ParseError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// The language front-end: turns a translation unit into per-file occurrences.
///
/// Called concurrently from every indexing worker.
pub trait Frontend: Send + Sync {
    fn parse(&self, request: ParseRequest<'_>) -> Result<ParsedFile, ParseError>;
}
