//! Reference-count annotations and the cross-reference lists behind them.

use std::collections::HashSet;

use lodestar_config::CodeLensConfig;
use lodestar_core::{Kind, Range, Usr};
use lodestar_index::{Db, EntityRef, FileId, QueryFile, QueryFunc, Use, VarKind};
use serde::{Deserialize, Serialize};

use crate::error::QueryError;
use crate::{Location, Locations};

/// Argument of a lens command: which list of which entity to expand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Xref {
    pub usr: Usr,
    pub kind: Kind,
    pub field: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeLens {
    pub range: Range,
    pub title: String,
    pub xref: Xref,
}

struct LensBuilder {
    line_count: u32,
    out: Vec<CodeLens>,
}

impl LensBuilder {
    fn add(
        &mut self,
        label: &str,
        xref: (Usr, Kind, &str),
        range: Range,
        count: usize,
        force: bool,
    ) {
        if count == 0 && !force {
            return;
        }
        if range.start.line >= self.line_count {
            return;
        }
        let plural = count > 1 && !label.ends_with('d');
        let (usr, kind, field) = xref;
        self.out.push(CodeLens {
            range,
            title: format!("{count} {label}{}", if plural { "s" } else { "" }),
            xref: Xref {
                usr,
                kind,
                field: field.to_string(),
            },
        });
    }
}

/// Transitive closure over `next`, starting from `root` (excluded), collecting
/// the uses of every function reached.
fn uses_for_all<'db>(
    db: &'db Db,
    root: &'db QueryFunc,
    next: impl Fn(&QueryFunc) -> Vec<Usr>,
) -> Vec<Use> {
    let mut seen = HashSet::from([root.usr]);
    let mut stack = vec![root];
    let mut out = Vec::new();
    while let Some(func) = stack.pop() {
        for usr in next(func) {
            if !seen.insert(usr) {
                continue;
            }
            if let Ok(related) = db.func(usr) {
                out.extend_from_slice(&related.uses);
                stack.push(related);
            }
        }
    }
    out
}

fn bases_of(func: &QueryFunc) -> Vec<Usr> {
    func.any_def().map(|def| def.bases.clone()).unwrap_or_default()
}

fn derived_of(func: &QueryFunc) -> Vec<Usr> {
    func.derived.iter().collect()
}

pub(crate) fn uses_for_all_bases(db: &Db, func: &QueryFunc) -> Vec<Use> {
    uses_for_all(db, func, bases_of)
}

pub(crate) fn uses_for_all_derived(db: &Db, func: &QueryFunc) -> Vec<Use> {
    uses_for_all(db, func, derived_of)
}

pub(crate) fn code_lens(db: &Db, file: &QueryFile, config: &CodeLensConfig) -> Vec<CodeLens> {
    let mut lenses = LensBuilder {
        line_count: file.line_count().unwrap_or(0),
        out: Vec::new(),
    };
    let mut seen = HashSet::new();
    for sym in file.live_symbols() {
        let has_extent = sym.extent.is_some_and(|extent| extent.is_valid());
        if !has_extent || !seen.insert(sym.range) {
            continue;
        }
        let (usr, range) = (sym.usr, sym.range);
        match db.entity(usr, sym.kind) {
            Ok(EntityRef::Func(func)) => {
                let Some(def) = func.any_def() else {
                    continue;
                };
                let base_uses = uses_for_all_bases(db, func);
                let derived_uses = uses_for_all_derived(db, func);

                let base_name = def
                    .bases
                    .first()
                    .and_then(|base| db.func(*base).ok())
                    .and_then(QueryFunc::any_def)
                    .map(|base| base.short_name.clone());
                if let Some(base_name) = base_name {
                    let count = def.bases.len();
                    lenses.add(&base_name, (usr, Kind::Func, "bases"), range, count, false);
                }
                lenses.add(
                    "ref",
                    (usr, Kind::Func, "uses"),
                    range,
                    func.uses.len(),
                    base_uses.is_empty(),
                );
                if !base_uses.is_empty() {
                    let count = base_uses.len();
                    lenses.add("b.ref", (usr, Kind::Func, "bases uses"), range, count, false);
                }
                if !derived_uses.is_empty() {
                    lenses.add(
                        "d.ref",
                        (usr, Kind::Func, "derived uses"),
                        range,
                        derived_uses.len(),
                        false,
                    );
                }
                let count = func.derived.len();
                lenses.add("derived", (usr, Kind::Func, "derived"), range, count, false);
            }
            Ok(EntityRef::Type(ty)) => {
                lenses.add("ref", (usr, Kind::Type, "uses"), range, ty.uses.len(), true);
                let (derived, instances) = (ty.derived.len(), ty.instances.len());
                lenses.add("derived", (usr, Kind::Type, "derived"), range, derived, false);
                lenses.add("var", (usr, Kind::Type, "instances"), range, instances, false);
            }
            Ok(EntityRef::Var(var)) => {
                let Some(def) = var.any_def() else {
                    continue;
                };
                if def.is_local() && !config.local_variables {
                    continue;
                }
                lenses.add(
                    "ref",
                    (usr, Kind::Var, "uses"),
                    range,
                    var.uses.len(),
                    def.kind != VarKind::Macro,
                );
            }
            Err(err) => {
                tracing::trace!(target: "lodestar.ide", error = %err, "lens for unindexed symbol");
            }
        }
    }
    lenses.out
}

/// First definition spelling of each entity, or all its declarations when it has
/// no spelled definition.
fn declarations_of(
    db: &Db,
    kind: Kind,
    usrs: impl IntoIterator<Item = Usr>,
) -> Vec<(FileId, Range)> {
    let mut out = Vec::new();
    for usr in usrs {
        let Ok(entity) = db.entity(usr, kind) else {
            continue;
        };
        match entity.def_spells().first() {
            Some(spell) => out.push((spell.file_id, spell.range)),
            None => out.extend(
                entity
                    .declarations()
                    .iter()
                    .map(|decl| (decl.file_id, decl.range)),
            ),
        }
    }
    out
}

fn use_sites(uses: &[Use]) -> impl Iterator<Item = (FileId, Range)> + '_ {
    uses.iter().map(|site| (site.file_id, site.range))
}

pub(crate) fn xref(
    db: &Db,
    usr: Usr,
    kind: Kind,
    field: &str,
) -> Result<Vec<Location>, QueryError> {
    let mut out = Locations::new(db);
    let unknown_field = || QueryError::invalid(format!("unknown {kind} xref field {field:?}"));
    match kind {
        Kind::Func => {
            let func = db.func(usr).ok();
            match field {
                "uses" => {
                    if let Some(func) = func {
                        out.extend(use_sites(&func.uses));
                    }
                }
                "bases" => {
                    let bases = func.map(bases_of).unwrap_or_default();
                    out.extend(declarations_of(db, Kind::Func, bases));
                }
                "bases uses" => {
                    if let Some(func) = func {
                        out.extend(use_sites(&uses_for_all_bases(db, func)));
                    }
                }
                "derived" => {
                    if let Some(func) = func {
                        out.extend(declarations_of(db, Kind::Func, func.derived.iter()));
                    }
                }
                "derived uses" => {
                    if let Some(func) = func {
                        out.extend(use_sites(&uses_for_all_derived(db, func)));
                    }
                }
                _ => return Err(unknown_field()),
            }
        }
        Kind::Type => {
            let ty = db.type_(usr).ok();
            match field {
                "uses" => {
                    if let Some(ty) = ty {
                        out.extend(use_sites(&ty.uses));
                    }
                }
                "derived" => {
                    if let Some(ty) = ty {
                        out.extend(declarations_of(db, Kind::Type, ty.derived.iter()));
                    }
                }
                "instances" => {
                    if let Some(ty) = ty {
                        out.extend(declarations_of(db, Kind::Var, ty.instances.iter()));
                    }
                }
                _ => return Err(unknown_field()),
            }
        }
        Kind::Var => match field {
            "uses" => {
                if let Ok(var) = db.var(usr) {
                    out.extend(use_sites(&var.uses));
                }
            }
            _ => return Err(unknown_field()),
        },
        Kind::File => return Err(unknown_field()),
    }
    Ok(out.finish())
}
