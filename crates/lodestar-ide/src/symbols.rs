use std::cmp::Reverse;

use lodestar_core::{Position, Role};
use lodestar_index::{ExtentRef, QueryFile};

/// Live occurrences whose range contains `pos`.
///
/// Ordered by range width (multi-line ranges last), definitions before other
/// roles, variables and functions before types, then by `Usr`.
pub(crate) fn symbols_at(file: &QueryFile, pos: Position) -> Vec<ExtentRef> {
    let mut symbols: Vec<ExtentRef> = file
        .live_symbols()
        .filter(|sym| sym.range.contains(pos))
        .copied()
        .collect();
    symbols.sort_by_key(|sym| {
        (
            sym.range.width(),
            sym.role != Role::Definition,
            Reverse(sym.kind),
            sym.usr,
        )
    });
    symbols
}

/// The leading group of [`symbols_at`] sharing the tightest range and kind.
pub(crate) fn smallest_symbols_at(file: &QueryFile, pos: Position) -> Vec<ExtentRef> {
    let mut symbols = symbols_at(file, pos);
    if let Some(first) = symbols.first().copied() {
        let keep = symbols
            .iter()
            .take_while(|sym| sym.range == first.range && sym.kind == first.kind)
            .count();
        symbols.truncate(keep);
    }
    symbols
}
