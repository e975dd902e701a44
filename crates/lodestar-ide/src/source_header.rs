//! Header/implementation correspondence.

use std::collections::{BTreeSet, HashSet};
use std::path::Path;

use indexmap::IndexMap;
use lodestar_core::Kind;
use lodestar_index::{Db, QueryFile};

const IMPLEMENTATION_EXTENSIONS: &[&str] = &["c", "cc", "cpp", "cxx"];

fn is_implementation(path: &str) -> bool {
    Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMPLEMENTATION_EXTENSIONS.contains(&ext))
}

fn stem(path: &str) -> &str {
    Path::new(path)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(path)
}

/// Similarity of two file stems: common prefix length weighs ten times the
/// common suffix length, and a large penalty applies when the two do not cover
/// the longer name between them.
pub fn compute_guess_score(a: &str, b: &str) -> i64 {
    let (a, b) = if a.len() > b.len() { (b, a) } else { (a, b) };
    let (a, b) = (a.as_bytes(), b.as_bytes());
    let prefix = a.iter().zip(b).take_while(|(x, y)| x == y).count();
    let suffix = a
        .iter()
        .rev()
        .zip(b.iter().rev())
        .take_while(|(x, y)| x == y)
        .count();

    let mut score = 10 * prefix as i64 + suffix as i64;
    if prefix + suffix < b.len() {
        score -= 100 * (b.len() - a.len()) as i64;
    }
    score
}

/// Candidate counterparts of `file` with their scores, best first; equal scores
/// keep the order in which the candidates were first seen.
///
/// For an implementation file every other file declaring one of the functions
/// it defines scores one point per such function. For a header, implementation
/// files defining a function it declares are scored by name similarity.
pub(crate) fn rank(db: &Db, file: &QueryFile) -> Vec<(String, i64)> {
    let header = !is_implementation(&file.path);
    let file_stem = stem(&file.path);

    let mut scores: IndexMap<String, i64> = IndexMap::new();
    let mut seen = HashSet::new();
    for sym in file.live_symbols() {
        if sym.kind != Kind::Func || !seen.insert(sym.usr) {
            continue;
        }
        let Ok(func) = db.func(sym.usr) else {
            continue;
        };

        if header {
            if !func.declarations.iter().any(|decl| decl.file_id == file.id) {
                continue;
            }
            for def in &func.defs {
                let def_path = db.path(def.file_id);
                if def.file_id == file.id || !is_implementation(def_path) {
                    continue;
                }
                let score = compute_guess_score(file_stem, stem(def_path));
                scores.insert(def_path.to_string(), score);
            }
        } else {
            let defines_here = func
                .defs
                .iter()
                .any(|def| def.file_id == file.id && def.def.spell.is_some());
            if !defines_here {
                continue;
            }
            let decl_files: BTreeSet<_> = func
                .declarations
                .iter()
                .map(|decl| decl.file_id)
                .filter(|file_id| *file_id != file.id)
                .collect();
            for file_id in decl_files {
                *scores.entry(db.path(file_id).to_string()).or_insert(0) += 1;
            }
        }
    }

    let mut ranked: Vec<(String, i64)> = scores.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    if let Some((best, score)) = ranked.first() {
        tracing::debug!(
            target: "lodestar.ide",
            file = %file.path,
            best = %best,
            score,
            "source/header counterpart"
        );
    }
    ranked
}
