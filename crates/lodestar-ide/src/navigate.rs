//! Structural navigation over the extents of a single file.
//!
//! Only definitions and declarations carry an extent; plain references never
//! take part.

use lodestar_core::{Position, Range};
use lodestar_index::QueryFile;

use crate::error::QueryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// To the tightest extent enclosing the cursor.
    #[default]
    Up,
    /// To the first extent nested inside the enclosing one.
    Down,
    /// To the previous sibling extent.
    Left,
    /// To the next sibling extent.
    Right,
}

impl Direction {
    /// Parse a direction code. An absent or empty code means [`Direction::Up`].
    pub fn parse(code: Option<&str>) -> Result<Self, QueryError> {
        match code {
            None | Some("" | "U") => Ok(Direction::Up),
            Some("D") => Ok(Direction::Down),
            Some("L") => Ok(Direction::Left),
            Some("R") => Ok(Direction::Right),
            Some(other) => Err(QueryError::invalid(format!(
                "unknown navigation direction {other:?}"
            ))),
        }
    }
}

fn live_extents(file: &QueryFile) -> impl Iterator<Item = Range> + '_ {
    file.live_symbols()
        .filter_map(|sym| sym.extent)
        .filter(Range::is_valid)
}

/// The tightest extent containing `pos`; of two with the same start the longer
/// one wins.
fn find_parent(file: &QueryFile, pos: Position) -> Option<Range> {
    let mut parent: Option<Range> = None;
    for ext in live_extents(file) {
        if !ext.contains(pos) {
            continue;
        }
        let better = match parent {
            None => true,
            Some(parent) if parent.start == ext.start => parent.end < ext.end,
            Some(parent) => parent.start < ext.start,
        };
        if better {
            parent = Some(ext);
        }
    }
    parent
}

/// The extent a move lands on.
pub(crate) fn navigate(file: &QueryFile, pos: Position, direction: Direction) -> Option<Range> {
    match direction {
        Direction::Up => up(file, pos),
        Direction::Down => down(file, pos),
        Direction::Left => left(file, pos),
        Direction::Right => right(file, pos),
    }
}

fn up(file: &QueryFile, pos: Position) -> Option<Range> {
    let mut res: Option<Range> = None;
    for ext in live_extents(file) {
        if ext.start < pos && pos < ext.end && res.map_or(true, |res| res.start < ext.start) {
            res = Some(ext);
        }
    }
    res
}

fn down(file: &QueryFile, pos: Position) -> Option<Range> {
    let parent = find_parent(file, pos);
    let mut res: Option<Range> = None;
    for ext in live_extents(file) {
        if pos < ext.start
            && parent.map_or(true, |parent| ext.end <= parent.end)
            && res.map_or(true, |res| ext.start < res.start)
        {
            res = Some(ext);
        }
    }
    res
}

fn left(file: &QueryFile, pos: Position) -> Option<Range> {
    let mut res: Option<Range> = None;
    for ext in live_extents(file) {
        if ext.end > pos {
            continue;
        }
        let better = match res {
            None => true,
            Some(res) if res.end == ext.end => ext.start < res.start,
            Some(res) => res.end < ext.end,
        };
        if better {
            res = Some(ext);
        }
    }
    res
}

fn right(file: &QueryFile, mut pos: Position) -> Option<Range> {
    // Starting on the first line of a construct skips over the whole construct.
    if let Some(parent) = find_parent(file, pos) {
        if parent.start.line == pos.line && pos < parent.end {
            pos = parent.end;
            pos.character = pos.character.saturating_sub(1);
        }
    }

    let mut res: Option<Range> = None;
    for ext in live_extents(file) {
        if pos >= ext.start {
            continue;
        }
        let better = match res {
            None => true,
            Some(res) if ext.start == res.start => res.end < ext.end,
            Some(res) => ext.start < res.start,
        };
        if better {
            res = Some(ext);
        }
    }
    res
}
