//! Core shared types for Lodestar.
//!
//! This crate is intentionally small: source positions, symbol identities and the
//! closed set of entity kinds that every other crate agrees on.

use std::any::Any;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Version string stamped into persisted artifacts.
///
/// Cache entries written by a different version are treated as misses.
pub const LODESTAR_VERSION: &str = env!("CARGO_PKG_VERSION");

/// A zero-based position in a source file expressed as (line, column).
///
/// Ordering is lexicographic on `(line, character)`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

impl Position {
    #[inline]
    pub const fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line + 1, self.character + 1)
    }
}

/// A half-open source range `[start, end)`.
///
/// Ranges order by `(start, end)`, which is the ordering structural navigation
/// relies on for stable results.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    #[inline]
    pub const fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// Shorthand for `Range::new(Position::new(..), Position::new(..))`.
    #[inline]
    pub const fn from_coords(
        start_line: u32,
        start_character: u32,
        end_line: u32,
        end_character: u32,
    ) -> Self {
        Self {
            start: Position::new(start_line, start_character),
            end: Position::new(end_line, end_character),
        }
    }

    /// Returns `true` if `pos` lies within `[start, end)`.
    #[inline]
    pub fn contains(&self, pos: Position) -> bool {
        self.start <= pos && pos < self.end
    }

    /// Returns `true` if the range does not run backwards.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.start <= self.end
    }

    /// Width used to rank overlapping candidates: the column span of a
    /// single-line range, `u32::MAX` for ranges crossing lines.
    pub fn width(&self) -> u32 {
        if self.start.line != self.end.line {
            return u32::MAX;
        }
        self.end.character.saturating_sub(self.start.character)
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Stable, position-independent identity of a symbol.
///
/// Two occurrences of the same logical entity map to the same `Usr` regardless of
/// which translation unit observed them or where they were spelled.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Usr(u64);

impl Usr {
    #[inline]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn to_raw(self) -> u64 {
        self.0
    }

    /// Derive the identity of a symbol from its fully-qualified name (for example a
    /// front-end's USR string such as `c:@N@ns@F@foo#I#`).
    pub fn from_qualified_name(name: &str) -> Self {
        let hash = blake3::hash(name.as_bytes());
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&hash.as_bytes()[..8]);
        Self(u64::from_le_bytes(raw))
    }
}

impl fmt::Display for Usr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Closed category of indexed entity.
///
/// `Usr`s are only ever compared together with their kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    File,
    Type,
    Func,
    Var,
}

impl Kind {
    pub fn as_str(self) -> &'static str {
        match self {
            Kind::File => "file",
            Kind::Type => "type",
            Kind::Func => "func",
            Kind::Var => "var",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a symbol occurs at a given site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Definition,
    Declaration,
    Reference,
}

/// Best-effort extraction of a human readable panic message.
pub fn panic_payload_to_str(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        return message;
    }
    if let Some(message) = payload.downcast_ref::<String>() {
        return message.as_str();
    }
    "<non-string panic payload>"
}
